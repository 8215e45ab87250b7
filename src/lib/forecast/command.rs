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

use axum::{
	extract::{Multipart, State},
	Json,
};
use chrono::NaiveDateTime;

use super::model::{AdditiveModel, Observation};
use super::typedef::*;
use crate::data::command::dispatch;
use crate::data::typedef::Submission;
use crate::preprocess::command::prepare;
use crate::preprocess::typedef::{NormalizedSeries, PeriodUnit, Purpose, CANONICAL_FORMAT};
use crate::typedef::{AppState, Context, ErrorKind, Report};

/// Fits the additive model on `series` and extends it `horizon` units past its last date.
pub(crate) fn forecast(
	ctx: &mut Context,
	series: &NormalizedSeries,
	unit: PeriodUnit,
	horizon: usize,
	config: &ForecastConfig,
) -> Result<ForecastResult, ErrorKind> {
	let result = fit_and_extend(series, unit, horizon, config);

	match &result {
		Ok(found) => ctx.emit(
			crate::event::DIALOG_SUCCESS,
			"Forecast Ready",
			format!(
				"\"{}\" forecast {} {}(s) past {} historical rows",
				series.value_column, found.horizon, unit, found.history_length
			),
		),
		Err(err) => ctx.error(err),
	}

	result
}

fn fit_and_extend(
	series: &NormalizedSeries,
	unit: PeriodUnit,
	horizon: usize,
	config: &ForecastConfig,
) -> Result<ForecastResult, ErrorKind> {
	let mut dates = Vec::<NaiveDateTime>::with_capacity(series.points.len() + horizon);
	let mut history = Vec::<Observation>::new();
	for each in &series.points {
		let ds = NaiveDateTime::parse_from_str(&each.timestamp, CANONICAL_FORMAT).map_err(|err| {
			ErrorKind::ForecastFailure(format!("Malformed timestamp \"{}\": {}", each.timestamp, err))
		})?;

		dates.push(ds);
		if let Some(y) = each.metric {
			history.push(Observation { ds, y });
		}
	}

	dates.sort_unstable();
	dates.dedup();

	let model = AdditiveModel::fit(&history, config).map_err(ErrorKind::ForecastFailure)?;

	let last = match dates.last() {
		Some(found) => *found,
		None => return Err(ErrorKind::ForecastFailure(String::from("The series has no dates"))),
	};

	// Each future date is measured from the last one, so month ends stay put
	for periods in 1..=horizon {
		let next = u32::try_from(periods)
			.ok()
			.and_then(|found| unit.step(last, found))
			.ok_or_else(|| {
				ErrorKind::ForecastFailure(format!(
					"Cannot move {} {}(s) past {}",
					periods, unit, last
				))
			})?;
		dates.push(next);
	}

	let rows = model.predict(&dates, config).map_err(ErrorKind::ForecastFailure)?;

	tracing::info!(
		history = history.len(),
		horizon,
		rows = rows.len(),
		"Forecast computed"
	);

	Ok(ForecastResult {
		rows,
		history_length: history.len(),
		horizon,
		unit,
		seasonalities: model.seasonality_names(),
	})
}

pub(crate) fn predict(
	ctx: &mut Context,
	state: &AppState,
	submission: Submission,
) -> Option<ForecastReport> {
	let report = prepare(ctx, state, &submission, Purpose::Forecast).and_then(|(series, parameters)| {
		let forecast = forecast(
			ctx,
			&series,
			parameters.unit,
			parameters.horizon,
			&state.config.forecast,
		)
		.ok()?;

		Some(ForecastReport {
			series,
			parameters,
			forecast,
		})
	});

	ctx.emit(
		crate::event::OPERATION_FINISHED,
		"Forecast Finished",
		match &report {
			Some(found) => format!("{} rows ready", found.forecast.rows.len()),
			None => String::from("No forecast was produced, see the messages above"),
		},
	);

	report
}

pub(crate) async fn run_forecast(
	State(state): State<AppState>,
	multipart: Multipart,
) -> Json<Report<ForecastReport>> {
	dispatch(state, multipart, predict).await
}
