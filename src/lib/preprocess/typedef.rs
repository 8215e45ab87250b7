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

use chrono::{Months, NaiveDateTime, TimeDelta};
use serde::Serialize;
use strum_macros::{Display, EnumIter, EnumString};

/// How every timestamp leaves the normalizer.
pub(crate) const CANONICAL_FORMAT: &'static str = "%Y-%m-%d %H:%M:%S";

#[derive(Default, PartialEq, Eq, Serialize, Clone, Copy, Debug)]
#[serde(rename_all = "lowercase")]
pub(crate) enum ColumnType {
	#[default]
	STRING,
	NUMBER,
	#[serde(rename = "dateTime")]
	DATETIME,
	BOOLEAN,
}

#[derive(Default, Serialize, Clone, Debug, PartialEq)]
pub(crate) struct ColumnInfo {
	pub name: String,
	#[serde(rename = "type")]
	pub column_type: ColumnType,
}

/// Columns split by what they can be used for, in table order.
#[derive(Default, Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Classification {
	pub columns: Vec<ColumnInfo>,
	pub time_candidates: Vec<String>,
	pub value_candidates: Vec<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct ColumnSelection {
	pub time_column: String,
	pub value_column: String,
}

#[derive(
	Default, PartialEq, Eq, EnumIter, EnumString, Display, Serialize, Clone, Copy, Debug,
)]
#[strum(ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub(crate) enum PeriodUnit {
	#[default]
	#[strum(to_string = "year", serialize = "y")]
	YEAR,
	#[strum(to_string = "month", serialize = "m")]
	MONTH,
	#[strum(to_string = "day", serialize = "d")]
	DAY,
	#[strum(to_string = "hour", serialize = "h")]
	HOUR,
}

impl PeriodUnit {
	/// Moves `from` forward by `periods` whole units. Calendar units keep the day of month
	/// where it exists and clamp to the month end otherwise.
	pub fn step(&self, from: NaiveDateTime, periods: u32) -> Option<NaiveDateTime> {
		match self {
			PeriodUnit::YEAR => from.checked_add_months(Months::new(periods.checked_mul(12)?)),
			PeriodUnit::MONTH => from.checked_add_months(Months::new(periods)),
			PeriodUnit::DAY => from.checked_add_signed(TimeDelta::try_days(periods as i64)?),
			PeriodUnit::HOUR => from.checked_add_signed(TimeDelta::try_hours(periods as i64)?),
		}
	}
}

/// A fifth of the rows, rounded down.
pub(crate) fn max_horizon(row_count: usize) -> usize {
	row_count / 5
}

#[derive(Serialize, Clone, Copy, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PredictionParameters {
	pub unit: PeriodUnit,
	pub horizon: usize,
	pub max_horizon: usize,
}

impl PredictionParameters {
	pub fn new(unit: PeriodUnit, requested_horizon: usize, row_count: usize) -> Self {
		let max_horizon = max_horizon(row_count);
		PredictionParameters {
			unit,
			horizon: requested_horizon.min(max_horizon),
			max_horizon,
		}
	}
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub(crate) struct SeriesPoint {
	pub timestamp: String,
	pub metric: Option<f64>,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub(crate) struct NormalizedSeries {
	pub time_column: String,
	pub value_column: String,
	pub points: Vec<SeriesPoint>,
}

impl NormalizedSeries {
	pub fn metrics(&self) -> impl Iterator<Item = Option<f64>> + '_ {
		self.points.iter().map(|each| each.metric)
	}
}

/// Whether validation findings stop the pipeline or only warn about it.
#[derive(Default, PartialEq, Eq, Clone, Copy, Debug)]
pub(crate) enum ValidationPolicy {
	#[default]
	Lenient,
	Strict,
}

/// Which action is preparing the series, it decides which form fields matter.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub(crate) enum Purpose {
	Forecast,
	TrendTest,
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::NaiveDate;
	use std::str::FromStr;

	fn at(year: i32, month: u32, day: u32) -> NaiveDateTime {
		NaiveDate::from_ymd_opt(year, month, day)
			.unwrap()
			.and_hms_opt(0, 0, 0)
			.unwrap()
	}

	#[test]
	fn test_parse_units_and_frequency_codes() {
		assert_eq!(PeriodUnit::from_str("Month"), Ok(PeriodUnit::MONTH));
		assert_eq!(PeriodUnit::from_str("m"), Ok(PeriodUnit::MONTH));
		assert_eq!(PeriodUnit::from_str("Y"), Ok(PeriodUnit::YEAR));
		assert_eq!(PeriodUnit::from_str("HOUR"), Ok(PeriodUnit::HOUR));
		assert!(PeriodUnit::from_str("week").is_err());
		assert_eq!(PeriodUnit::DAY.to_string(), "day");
	}

	#[test]
	fn test_step_calendar_units() {
		assert_eq!(PeriodUnit::MONTH.step(at(2020, 1, 31), 1), Some(at(2020, 2, 29)));
		assert_eq!(PeriodUnit::YEAR.step(at(2020, 2, 29), 1), Some(at(2021, 2, 28)));
		assert_eq!(PeriodUnit::DAY.step(at(2020, 12, 31), 1), Some(at(2021, 1, 1)));
		assert_eq!(
			PeriodUnit::HOUR.step(at(2020, 1, 1), 25),
			Some(at(2020, 1, 2) + TimeDelta::hours(1))
		);
	}

	#[test]
	fn test_horizon_is_clamped_to_a_fifth() {
		let clamped = PredictionParameters::new(PeriodUnit::MONTH, 30, 100);
		assert_eq!(clamped.horizon, 20);
		assert_eq!(clamped.max_horizon, 20);

		let kept = PredictionParameters::new(PeriodUnit::MONTH, 5, 100);
		assert_eq!(kept.horizon, 5);

		assert_eq!(PredictionParameters::new(PeriodUnit::DAY, 5, 4).horizon, 0);
	}
}
