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

use super::helper::original_test;
use super::typedef::*;
use crate::data::command::dispatch;
use crate::data::typedef::Submission;
use crate::preprocess::command::prepare;
use crate::preprocess::typedef::{NormalizedSeries, Purpose};
use crate::typedef::{AppState, Context, ErrorKind, Report};

pub(crate) fn trend(
	ctx: &mut Context,
	series: &NormalizedSeries,
	alpha: f64,
) -> Result<TrendVerdict, ErrorKind> {
	let values = series
		.metrics()
		.map(|each| each.unwrap_or(f64::NAN))
		.collect::<Vec<_>>();

	let result = original_test(&values, alpha).map_err(ErrorKind::TrendTestFailure);
	match &result {
		Ok(verdict) if verdict.trend == TrendCategory::NoTrend => ctx.emit(
			crate::event::DIALOG_INFO,
			"No Significant Trend",
			format!(
				"\"{}\" shows no trend at the {} significance level (p = {:.4})",
				series.value_column, alpha, verdict.p
			),
		),
		Ok(verdict) => ctx.emit(
			crate::event::DIALOG_SUCCESS,
			"Trend Detected",
			format!(
				"\"{}\" is {} (p = {:.4}, Sen's slope {:.4} per row)",
				series.value_column, verdict.trend, verdict.p, verdict.slope
			),
		),
		Err(err) => ctx.error(err),
	}

	result
}

pub(crate) fn analyze(
	ctx: &mut Context,
	state: &AppState,
	submission: Submission,
) -> Option<TrendReport> {
	let report = prepare(ctx, state, &submission, Purpose::TrendTest).and_then(|(series, _)| {
		let verdict = trend(ctx, &series, state.config.trend_alpha).ok()?;
		tracing::info!(value_column = %series.value_column, trend = %verdict.trend, "Trend tested");

		Some(TrendReport {
			sample_size: series.metrics().flatten().count(),
			time_column: series.time_column,
			value_column: series.value_column,
			verdict,
		})
	});

	ctx.emit(
		crate::event::OPERATION_FINISHED,
		"Trend Test Finished",
		match &report {
			Some(found) => format!("Tested {} values", found.sample_size),
			None => String::from("No verdict was reached, see the messages above"),
		},
	);

	report
}

pub(crate) async fn run_trend_test(
	State(state): State<AppState>,
	multipart: Multipart,
) -> Json<Report<TrendReport>> {
	dispatch(state, multipart, analyze).await
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::config::Config;
	use crate::data::typedef::UploadedFile;
	use crate::preprocess::typedef::SeriesPoint;
	use crate::trend::helper::MAX_TREND_ROWS;

	fn series(values: &[Option<f64>]) -> NormalizedSeries {
		NormalizedSeries {
			time_column: String::from("data"),
			value_column: String::from("casos"),
			points: values
				.iter()
				.enumerate()
				.map(|(index, metric)| SeriesPoint {
					timestamp: format!("{}-01-01 00:00:00", 2000 + index),
					metric: *metric,
				})
				.collect(),
		}
	}

	#[test]
	fn test_mostly_increasing_is_detected() {
		let mut values = (1..=19).map(|each| Some(each as f64)).collect::<Vec<_>>();
		values.insert(10, Some(3.0));
		assert_eq!(values.len(), 20);

		let mut ctx = Context::default();
		let verdict = trend(&mut ctx, &series(&values), 0.05).unwrap();

		assert_ne!(verdict.trend, TrendCategory::NoTrend);
		assert_eq!(verdict.trend, TrendCategory::Increasing);
		assert_eq!(ctx.count(crate::event::DIALOG_SUCCESS), 1);
		assert!(ctx.has_title("Trend Detected"));
	}

	#[test]
	fn test_flat_series_is_neutral() {
		let values = [Some(4.0), Some(6.0), Some(4.0), Some(6.0), Some(4.0), Some(6.0)];
		let mut ctx = Context::default();

		let verdict = trend(&mut ctx, &series(&values), 0.05).unwrap();

		assert_eq!(verdict.trend, TrendCategory::NoTrend);
		assert_eq!(ctx.count(crate::event::DIALOG_INFO), 1);
		assert_eq!(ctx.count(crate::event::DIALOG_SUCCESS), 0);
	}

	#[test]
	fn test_oversized_series_fails_with_notice() {
		let values = (0..=MAX_TREND_ROWS).map(|each| Some(each as f64)).collect::<Vec<_>>();
		let mut ctx = Context::default();

		let result = trend(&mut ctx, &series(&values), 0.05);

		assert!(matches!(result, Err(ErrorKind::TrendTestFailure(_))));
		assert_eq!(ctx.count(crate::event::DIALOG_ERROR), 1);
		assert!(ctx.has_title("Trend Test Failed"));
	}

	#[test]
	fn test_single_value_fails() {
		let mut ctx = Context::default();
		let result = trend(&mut ctx, &series(&[Some(1.0), None]), 0.05);

		assert!(matches!(result, Err(ErrorKind::TrendTestFailure(_))));
		assert!(ctx.has_title("Trend Test Failed"));
	}

	#[test]
	fn test_analyze_from_upload() {
		let mut content = String::from("ano;casos\n");
		for (index, value) in [12, 15, 14, 18, 21, 20, 25, 27, 30, 29, 33, 35].iter().enumerate() {
			content.push_str(&format!("{};{}\n", 2010 + index, value));
		}
		let submission = Submission {
			file: Some(UploadedFile {
				name: String::from("casos.csv"),
				content_type: Some(String::from("text/csv")),
				bytes: content.into_bytes(),
			}),
			fields: [("time_column", "ano"), ("value_column", "casos")]
				.iter()
				.map(|(key, value)| (key.to_string(), value.to_string()))
				.collect(),
		};
		let state = AppState::new(Config::default());
		let mut ctx = Context::default();

		let report = analyze(&mut ctx, &state, submission).unwrap();

		assert_eq!(report.sample_size, 12);
		assert_eq!(report.verdict.trend, TrendCategory::Increasing);
		assert_eq!(ctx.count(crate::event::OPERATION_FINISHED), 1);
	}

	#[test]
	fn test_analyze_always_finishes() {
		let state = AppState::new(Config::default());
		let mut ctx = Context::default();

		assert!(analyze(&mut ctx, &state, Submission::default()).is_none());
		assert_eq!(ctx.count(crate::event::OPERATION_FINISHED), 1);
		assert!(ctx.has_title("Trend Test Finished"));
	}
}
