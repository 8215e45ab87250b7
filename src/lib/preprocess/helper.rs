/*
 * Project::Augur, epidemiological forecasting and trend analysis in the browser
 * Copyright (C) 2025 Athaariq A. Ramadhani <foss@athaariq.my.id>
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with this program.  If not, see <http://www.gnu.org/licenses/>.
 */

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone};
use parse_datetime::parse_datetime_at_date;

use super::typedef::{ColumnType, CANONICAL_FORMAT};
use crate::typedef::CellValue;

enum TimestampFormat {
	DateTime(&'static str),
	Date(&'static str),
	YearMonth,
	MonthYear,
	Year,
}

// Month-first wins over day-first when both read the whole column
const TIMESTAMP_FORMATS: [TimestampFormat; 19] = [
	TimestampFormat::DateTime(CANONICAL_FORMAT),
	TimestampFormat::DateTime("%Y-%m-%d %H:%M:%S%.f"),
	TimestampFormat::DateTime("%Y-%m-%dT%H:%M:%S%.f"),
	TimestampFormat::DateTime("%Y-%m-%dT%H:%M:%S%.fZ"),
	TimestampFormat::DateTime("%Y-%m-%d %H:%M"),
	TimestampFormat::DateTime("%Y-%m-%dT%H:%M"),
	TimestampFormat::Date("%Y-%m-%d"),
	TimestampFormat::Date("%Y/%m/%d"),
	TimestampFormat::DateTime("%m/%d/%Y %H:%M:%S"),
	TimestampFormat::DateTime("%m/%d/%Y %H:%M"),
	TimestampFormat::Date("%m/%d/%Y"),
	TimestampFormat::DateTime("%d/%m/%Y %H:%M:%S"),
	TimestampFormat::DateTime("%d/%m/%Y %H:%M"),
	TimestampFormat::Date("%d/%m/%Y"),
	TimestampFormat::Date("%d-%m-%Y"),
	TimestampFormat::Date("%d.%m.%Y"),
	TimestampFormat::YearMonth,
	TimestampFormat::MonthYear,
	TimestampFormat::Year,
];

impl TimestampFormat {
	fn parse(&self, text: &str) -> Option<NaiveDateTime> {
		match self {
			TimestampFormat::DateTime(format) => NaiveDateTime::parse_from_str(text, format).ok(),
			TimestampFormat::Date(format) => NaiveDate::parse_from_str(text, format)
				.ok()?
				.and_hms_opt(0, 0, 0),
			TimestampFormat::YearMonth => {
				NaiveDate::parse_from_str(&format!("{}-01", text), "%Y-%m-%d")
					.ok()?
					.and_hms_opt(0, 0, 0)
			}
			TimestampFormat::MonthYear => {
				NaiveDate::parse_from_str(&format!("01/{}", text), "%d/%m/%Y")
					.ok()?
					.and_hms_opt(0, 0, 0)
			}
			TimestampFormat::Year => {
				if text.len() != 4 || !text.bytes().all(|each| each.is_ascii_digit()) {
					return None;
				}
				year_start(text.parse::<i32>().ok()?)
			}
		}
	}
}

fn year_start(year: i32) -> Option<NaiveDateTime> {
	NaiveDate::from_ymd_opt(year, 1, 1)?.and_hms_opt(0, 0, 0)
}

fn parse_any(text: &str) -> Option<NaiveDateTime> {
	TIMESTAMP_FORMATS
		.iter()
		.find_map(|each| each.parse(text))
		.or_else(|| parse_absolute(text))
}

fn reference_midnight(year: i32, month: u32, day: u32) -> Option<DateTime<Local>> {
	Local.with_ymd_and_hms(year, month, day, 0, 0, 0).single()
}

/// Free-form text such as `15 March 2020`, read against two unrelated reference dates.
///
/// Relative input (`now`, `yesterday`, `3 days ago`, a bare `14:00`) lands on different
/// instants for the two references and is rejected, so the result never depends on the clock.
fn parse_absolute(text: &str) -> Option<NaiveDateTime> {
	let first = reference_midnight(2001, 2, 3)?;
	let second = reference_midnight(2013, 10, 27)?;

	let read = |reference: DateTime<Local>| {
		parse_datetime_at_date(reference, text)
			.ok()
			.map(|found| found.naive_local())
	};

	match (read(first)?, read(second)?) {
		(left, right) if left == right => Some(left),
		_ => None,
	}
}

/// Reads every cell of a time column, `None` where a cell is not a point in time.
///
/// Text cells are read with the first format that fits all of them, so `03/04/2020`
/// means the same day in every row of one column.
pub(super) fn parse_time_column(cells: &[&CellValue]) -> Vec<Option<NaiveDateTime>> {
	let texts = cells
		.iter()
		.filter_map(|each| match each {
			CellValue::String(text) => Some(text.trim()),
			_ => None,
		})
		.collect::<Vec<_>>();

	let column_format = match texts.is_empty() {
		true => None,
		false => TIMESTAMP_FORMATS
			.iter()
			.find(|format| texts.iter().all(|text| format.parse(text).is_some())),
	};

	cells
		.iter()
		.map(|each| match each {
			CellValue::DateTime(datetime_value) => Some(*datetime_value),
			CellValue::Number(number_value)
				if number_value.fract() == 0.0 && (1000.0..=9999.0).contains(number_value) =>
			{
				year_start(*number_value as i32)
			}
			CellValue::String(text) => {
				let text = text.trim();
				column_format
					.and_then(|format| format.parse(text))
					.or_else(|| parse_any(text))
			}
			_ => None,
		})
		.collect::<Vec<_>>()
}

pub(super) fn format_timestamp(datetime: &NaiveDateTime) -> String {
	datetime.format(CANONICAL_FORMAT).to_string()
}

pub(super) fn coerce_number(cell: &CellValue) -> Option<f64> {
	match cell {
		CellValue::Number(number_value) => Some(*number_value),
		CellValue::String(text) => text
			.trim()
			.parse::<f64>()
			.ok()
			.filter(|found| found.is_finite()),
		CellValue::Boolean(boolean_value) => Some(if *boolean_value { 1.0 } else { 0.0 }),
		_ => None,
	}
}

/// Picks the narrowest type holding every non-empty cell.
pub(super) fn infer_column_type(cells: &[CellValue]) -> ColumnType {
	let mut filled = cells.iter().filter(|each| **each != CellValue::Empty).peekable();
	if filled.peek().is_none() {
		return ColumnType::NUMBER;
	}

	let filled = filled.collect::<Vec<_>>();
	if filled.iter().all(|each| matches!(each, CellValue::Number(_))) {
		ColumnType::NUMBER
	} else if filled.iter().all(|each| matches!(each, CellValue::DateTime(_))) {
		ColumnType::DATETIME
	} else if filled.iter().all(|each| matches!(each, CellValue::Boolean(_))) {
		ColumnType::BOOLEAN
	} else {
		ColumnType::STRING
	}
}
