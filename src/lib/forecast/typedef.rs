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

use serde::Serialize;

use crate::preprocess::typedef::{NormalizedSeries, PeriodUnit, PredictionParameters};

/// Fitting knobs of the additive model. Only the last three are exposed as settings.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct ForecastConfig {
	pub changepoint_count: usize,
	pub changepoint_range: f64,
	pub changepoint_prior_scale: f64,
	pub seasonality_prior_scale: f64,
	pub interval_width: f64,
	pub uncertainty_samples: usize,
	pub seed: u64,
}

impl Default for ForecastConfig {
	fn default() -> Self {
		Self {
			changepoint_count: 25,
			changepoint_range: 0.8,
			changepoint_prior_scale: 0.05,
			seasonality_prior_scale: 10.0,
			interval_width: 0.8,
			uncertainty_samples: 1000,
			seed: 0,
		}
	}
}

/// One row of the output frame. Field names follow the usual `ds`/`yhat` forecast contract.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub(crate) struct ForecastRow {
	pub ds: String,
	pub trend: f64,
	pub trend_lower: f64,
	pub trend_upper: f64,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub yearly: Option<f64>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub weekly: Option<f64>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub daily: Option<f64>,
	pub additive_terms: f64,
	pub yhat: f64,
	pub yhat_lower: f64,
	pub yhat_upper: f64,
}

#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ForecastResult {
	pub rows: Vec<ForecastRow>,
	pub history_length: usize,
	pub horizon: usize,
	pub unit: PeriodUnit,
	pub seasonalities: Vec<&'static str>,
}

#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ForecastReport {
	pub series: NormalizedSeries,
	pub parameters: PredictionParameters,
	pub forecast: ForecastResult,
}
