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
use strum_macros::Display;

#[derive(Default, PartialEq, Eq, Serialize, Display, Clone, Copy, Debug)]
pub(crate) enum TrendCategory {
	#[serde(rename = "increasing")]
	#[strum(to_string = "increasing")]
	Increasing,
	#[serde(rename = "decreasing")]
	#[strum(to_string = "decreasing")]
	Decreasing,
	#[default]
	#[serde(rename = "no trend")]
	#[strum(to_string = "no trend")]
	NoTrend,
}

/// Outcome of the Mann-Kendall test plus the Sen's slope line through the data.
#[derive(Default, Serialize, Clone, Copy, Debug, PartialEq)]
pub(crate) struct TrendVerdict {
	pub trend: TrendCategory,
	pub h: bool,
	pub p: f64,
	pub z: f64,
	pub tau: f64,
	pub s: f64,
	pub var_s: f64,
	pub slope: f64,
	pub intercept: f64,
}

#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TrendReport {
	pub time_column: String,
	pub value_column: String,
	pub sample_size: usize,
	pub verdict: TrendVerdict,
}
