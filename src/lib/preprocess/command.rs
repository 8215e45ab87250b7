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

use std::str::FromStr;

use super::helper::*;
use super::typedef::*;
use crate::data::command::load_submission;
use crate::data::typedef::Submission;
use crate::typedef::{AppState, CellValue, Context, ErrorKind, RawTable};

const DEFAULT_HORIZON: usize = 5;

pub(crate) fn classify(table: &RawTable) -> Classification {
	let mut classification = Classification::default();

	for each in &table.columns {
		let column_type = infer_column_type(&each.cells);
		match column_type {
			ColumnType::NUMBER => classification.value_candidates.push(each.name.clone()),
			_ => classification.time_candidates.push(each.name.clone()),
		}

		classification.columns.push(ColumnInfo {
			name: each.name.clone(),
			column_type,
		});
	}

	classification
}

/// Validates the selected columns and turns them into a clean time series.
///
/// Every finding becomes a notice. Blocking findings also end the run with `Err`, the rest
/// are reported and the pipeline carries on with what is usable.
pub(crate) fn normalize(
	ctx: &mut Context,
	table: &RawTable,
	selection: &ColumnSelection,
	params: &PredictionParameters,
	policy: ValidationPolicy,
) -> Result<NormalizedSeries, ErrorKind> {
	let (time_column, value_column) = match (
		table.column(&selection.time_column),
		table.column(&selection.value_column),
	) {
		(Some(time_column), Some(value_column)) => (time_column, value_column),
		(None, _) => return Err(block(ctx, ErrorKind::UnknownColumn(selection.time_column.clone()))),
		(_, None) => return Err(block(ctx, ErrorKind::UnknownColumn(selection.value_column.clone()))),
	};

	let kept_rows = time_column
		.cells
		.iter()
		.enumerate()
		.filter(|(_, each)| **each != CellValue::Empty)
		.map(|(row_index, _)| row_index)
		.collect::<Vec<_>>();

	if kept_rows.is_empty() {
		return Err(block(ctx, ErrorKind::EmptyAfterCleaning(time_column.name.clone())));
	}

	let has_numeric_cell = kept_rows
		.iter()
		.any(|row_index| matches!(value_column.cells[*row_index], CellValue::Number(_)));

	if infer_column_type(&value_column.cells) != ColumnType::NUMBER || !has_numeric_cell {
		ctx.warning(&ErrorKind::NonNumericValueColumn(value_column.name.clone()));
	}

	let metrics = kept_rows
		.iter()
		.map(|row_index| coerce_number(&value_column.cells[*row_index]))
		.collect::<Vec<_>>();

	if metrics.iter().all(Option::is_none) {
		return Err(block(ctx, ErrorKind::CoercionFailed(value_column.name.clone())));
	}

	let time_cells = kept_rows
		.iter()
		.map(|row_index| &time_column.cells[*row_index])
		.collect::<Vec<_>>();
	let timestamps = parse_time_column(&time_cells);

	let unreadable = timestamps.iter().filter(|each| each.is_none()).count();
	if unreadable > 0 {
		let finding = ErrorKind::NotATimeColumn {
			column: time_column.name.clone(),
			count: unreadable,
		};

		if unreadable == timestamps.len() || policy == ValidationPolicy::Strict {
			return Err(block(ctx, finding));
		}
		ctx.warning(&finding);
	}

	let points = timestamps
		.iter()
		.zip(metrics)
		.filter_map(|(timestamp, metric)| {
			Some(SeriesPoint {
				timestamp: format_timestamp(timestamp.as_ref()?),
				metric,
			})
		})
		.collect::<Vec<_>>();

	if points.len() < params.max_horizon {
		let finding = ErrorKind::InsufficientData {
			rows: points.len(),
			required: params.max_horizon,
		};

		if policy == ValidationPolicy::Strict {
			return Err(block(ctx, finding));
		}
		ctx.warning(&finding);
	}

	tracing::info!(
		time_column = %time_column.name,
		value_column = %value_column.name,
		points = points.len(),
		"Normalized series"
	);

	Ok(NormalizedSeries {
		time_column: time_column.name.clone(),
		value_column: value_column.name.clone(),
		points,
	})
}

fn block(ctx: &mut Context, err: ErrorKind) -> ErrorKind {
	ctx.error(&err);
	err
}

/// Everything between an uploaded form and a series ready for the adapters.
pub(crate) fn prepare(
	ctx: &mut Context,
	state: &AppState,
	submission: &Submission,
	purpose: Purpose,
) -> Option<(NormalizedSeries, PredictionParameters)> {
	let table = load_submission(ctx, state, submission)?;
	let selection = read_selection(ctx, submission)?;

	let row_count = table.row_count();
	let params = match purpose {
		Purpose::Forecast => {
			let (unit, requested_horizon) = read_forecast_fields(ctx, submission)?;
			let params = PredictionParameters::new(unit, requested_horizon, row_count);
			if params.horizon < requested_horizon {
				ctx.emit(
					crate::event::DIALOG_INFO,
					"Horizon Adjusted",
					format!(
						"{} rows allow at most {} {}(s) ahead, forecasting {} instead of {}",
						row_count, params.max_horizon, unit, params.horizon, requested_horizon
					),
				);
			}

			ctx.emit(
				crate::event::DIALOG_INFO,
				"Forecast Setup",
				format!(
					"Forecasting \"{}\" over \"{}\", {} {}(s) ahead",
					selection.value_column, selection.time_column, params.horizon, unit
				),
			);
			params
		}
		Purpose::TrendTest => {
			ctx.emit(
				crate::event::DIALOG_INFO,
				"Trend Test Setup",
				format!(
					"Testing \"{}\" ordered by \"{}\" for a monotonic trend",
					selection.value_column, selection.time_column
				),
			);
			PredictionParameters::new(PeriodUnit::default(), 0, row_count)
		}
	};

	let series = normalize(
		ctx,
		&table,
		&selection,
		&params,
		state.config.validation_policy,
	)
	.ok()?;

	Some((series, params))
}

fn read_selection(ctx: &mut Context, submission: &Submission) -> Option<ColumnSelection> {
	let time_column = require_field(ctx, submission, "time_column", "time column")?;
	let value_column = require_field(ctx, submission, "value_column", "value column")?;

	Some(ColumnSelection {
		time_column,
		value_column,
	})
}

fn require_field(
	ctx: &mut Context,
	submission: &Submission,
	key: &str,
	field: &'static str,
) -> Option<String> {
	match submission.field(key) {
		Some(found) => Some(found.to_string()),
		None => {
			ctx.error(&ErrorKind::InvalidParameter {
				field,
				value: String::new(),
			});
			None
		}
	}
}

fn read_forecast_fields(ctx: &mut Context, submission: &Submission) -> Option<(PeriodUnit, usize)> {
	let unit = match submission.field("unit") {
		Some(raw) => match PeriodUnit::from_str(raw) {
			Ok(ok) => ok,
			Err(_) => {
				ctx.error(&ErrorKind::InvalidParameter {
					field: "period unit",
					value: raw.to_string(),
				});
				return None;
			}
		},
		None => PeriodUnit::default(),
	};

	let horizon = match submission.field("horizon") {
		Some(raw) => match raw.parse::<usize>() {
			Ok(ok) => ok,
			Err(_) => {
				ctx.error(&ErrorKind::InvalidParameter {
					field: "horizon",
					value: raw.to_string(),
				});
				return None;
			}
		},
		None => DEFAULT_HORIZON,
	};

	Some((unit, horizon))
}
