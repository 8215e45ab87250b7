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

use chrono::NaiveDateTime;
use nalgebra::{DMatrix, DVector};
use rand::{rngs::StdRng, Rng, SeedableRng};
use rand_distr::{Distribution, Exp, Normal, Poisson};
use std::f64::consts::PI;

use super::typedef::{ForecastConfig, ForecastRow};
use crate::preprocess::typedef::CANONICAL_FORMAT;

const SECONDS_PER_DAY: f64 = 86_400.0;
const TREND_PRIOR_SCALE: f64 = 5.0;
const INITIAL_NOISE_VARIANCE: f64 = 0.25;
const MIN_NOISE_VARIANCE: f64 = 1e-6;
const FIT_PASSES: usize = 3;
const MAX_FUTURE_CHANGEPOINTS: f64 = 1_000.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub(super) struct Seasonality {
	pub name: &'static str,
	pub period_days: f64,
	pub order: usize,
}

const YEARLY: Seasonality = Seasonality {
	name: "yearly",
	period_days: 365.25,
	order: 10,
};

const WEEKLY: Seasonality = Seasonality {
	name: "weekly",
	period_days: 7.0,
	order: 3,
};

const DAILY: Seasonality = Seasonality {
	name: "daily",
	period_days: 1.0,
	order: 4,
};

#[derive(Clone, Copy, Debug)]
pub(super) struct Observation {
	pub ds: NaiveDateTime,
	pub y: f64,
}

/// Piecewise-linear trend plus Fourier seasonalities, fitted by penalised least squares.
///
/// Time is scaled so the history spans `[0, 1]` and `y` is divided by its largest magnitude.
/// Every parameter below lives in those scaled units.
#[derive(Debug)]
pub(super) struct AdditiveModel {
	start: NaiveDateTime,
	span_seconds: f64,
	y_scale: f64,
	changepoints: Vec<f64>,
	offset: f64,
	slope: f64,
	deltas: Vec<f64>,
	seasonalities: Vec<(Seasonality, Vec<f64>)>,
	noise_scale: f64,
}

impl AdditiveModel {
	pub fn fit(history: &[Observation], config: &ForecastConfig) -> Result<Self, String> {
		if history.len() < 2 {
			return Err(format!(
				"At least 2 rows with a value are needed, only {} found",
				history.len()
			));
		}

		let mut history = history.to_vec();
		history.sort_by_key(|each| each.ds);

		let start = history[0].ds;
		let end = history[history.len() - 1].ds;
		let span_seconds = (end - start).num_seconds() as f64;
		if span_seconds <= 0.0 {
			return Err(String::from(
				"Every row has the same timestamp, there is no time span to learn from",
			));
		}

		let largest = history.iter().map(|each| each.y.abs()).fold(0f64, f64::max);
		let y_scale = if largest > 0.0 { largest } else { 1.0 };

		let scaled_times = history
			.iter()
			.map(|each| (each.ds - start).num_seconds() as f64 / span_seconds)
			.collect::<Vec<_>>();

		let changepoints = place_changepoints(&scaled_times, config);
		let active = pick_seasonalities(&history);

		let row_count = history.len();
		let column_count = 2
			+ changepoints.len()
			+ active.iter().map(|each| each.order * 2).sum::<usize>();

		let design = DMatrix::from_row_iterator(
			row_count,
			column_count,
			history
				.iter()
				.zip(&scaled_times)
				.flat_map(|(each, t)| features(*t, &each.ds, &changepoints, &active)),
		);
		let target = DVector::from_iterator(row_count, history.iter().map(|each| each.y / y_scale));

		// Gaussian priors as ridge weights, the changepoint one matches the Laplace variance
		let precision = [TREND_PRIOR_SCALE.powi(-2); 2]
			.into_iter()
			.chain(
				std::iter::repeat(1.0 / (2.0 * config.changepoint_prior_scale.powi(2)))
					.take(changepoints.len()),
			)
			.chain(
				std::iter::repeat(config.seasonality_prior_scale.powi(-2))
					.take(column_count - 2 - changepoints.len()),
			)
			.collect::<Vec<_>>();

		let gram = design.transpose() * &design;
		let moment = design.transpose() * &target;

		let mut noise_variance = INITIAL_NOISE_VARIANCE;
		let mut beta = DVector::<f64>::zeros(column_count);
		for _ in 0..FIT_PASSES {
			let mut system = gram.clone();
			for (index, each) in precision.iter().enumerate() {
				system[(index, index)] += noise_variance * each;
			}

			beta = solve(system, &moment)
				.ok_or_else(|| String::from("The model equations have no unique solution"))?;

			let residual = &target - &design * &beta;
			noise_variance = (residual.norm_squared() / row_count as f64).max(MIN_NOISE_VARIANCE);
		}

		if beta.iter().any(|each| !each.is_finite()) {
			return Err(String::from("Fitting diverged, the values may be too large"));
		}

		let mut cursor = 2 + changepoints.len();
		let seasonalities = active
			.into_iter()
			.map(|each| {
				let coefficients = beta.rows(cursor, each.order * 2).iter().copied().collect::<Vec<_>>();
				cursor += each.order * 2;
				(each, coefficients)
			})
			.collect::<Vec<_>>();

		let model = AdditiveModel {
			start,
			span_seconds,
			y_scale,
			offset: beta[0],
			slope: beta[1],
			deltas: beta.rows(2, changepoints.len()).iter().copied().collect::<Vec<_>>(),
			changepoints,
			seasonalities,
			noise_scale: noise_variance.sqrt(),
		};

		tracing::debug!(?model, "Fitted additive model");
		Ok(model)
	}

	pub fn seasonality_names(&self) -> Vec<&'static str> {
		self.seasonalities
			.iter()
			.map(|(each, _)| each.name)
			.collect::<Vec<_>>()
	}

	fn scaled_time(&self, ds: &NaiveDateTime) -> f64 {
		(*ds - self.start).num_seconds() as f64 / self.span_seconds
	}

	/// Trend in scaled units.
	fn trend_at(&self, t: f64) -> f64 {
		let bends = self
			.changepoints
			.iter()
			.zip(&self.deltas)
			.map(|(at, delta)| delta * (t - at).max(0.0))
			.sum::<f64>();

		self.offset + self.slope * t + bends
	}

	fn seasonal_terms(&self, ds: &NaiveDateTime) -> Vec<(&'static str, f64)> {
		self.seasonalities
			.iter()
			.map(|(each, coefficients)| {
				let value = fourier_terms(ds, each)
					.zip(coefficients)
					.map(|(feature, coefficient)| feature * coefficient)
					.sum::<f64>();
				(each.name, value * self.y_scale)
			})
			.collect::<Vec<_>>()
	}

	/// Changepoints each simulated future may add after the history ends.
	///
	/// They arrive as a Poisson process at the historical rate, with Laplace-distributed
	/// slope changes as large on average as the fitted ones. The expected count per future is
	/// capped at [`MAX_FUTURE_CHANGEPOINTS`], so a short history stretched over a long horizon
	/// still samples in bounded memory.
	fn sample_future_changepoints(
		&self,
		rng: &mut StdRng,
		t_max: f64,
		samples: usize,
	) -> Result<Vec<Vec<(f64, f64)>>, String> {
		let future_span = t_max - 1.0;
		if future_span <= 0.0 {
			return Ok(vec![Vec::new(); samples]);
		}

		let historical_rate = self.changepoints.len() as f64 * future_span;
		if historical_rate > MAX_FUTURE_CHANGEPOINTS {
			tracing::warn!(
				historical_rate,
				cap = MAX_FUTURE_CHANGEPOINTS,
				"Horizon is far longer than the history, future changepoints are capped"
			);
		}
		let rate = historical_rate.min(MAX_FUTURE_CHANGEPOINTS);
		let arrivals = Poisson::new(rate).map_err(|err| err.to_string())?;

		let mean_delta = self.deltas.iter().map(|each| each.abs()).sum::<f64>()
			/ self.deltas.len().max(1) as f64
			+ 1e-8;
		let magnitude = Exp::new(1.0 / mean_delta).map_err(|err| err.to_string())?;

		let mut simulations = Vec::with_capacity(samples);
		for _ in 0..samples {
			let count = arrivals.sample(rng) as usize;
			let mut changes = (0..count)
				.map(|_| {
					let at = rng.random_range(1.0..t_max);
					let delta = magnitude.sample(rng);
					(at, if rng.random_bool(0.5) { delta } else { -delta })
				})
				.collect::<Vec<_>>();
			changes.sort_by(|left, right| left.0.total_cmp(&right.0));
			simulations.push(changes);
		}

		Ok(simulations)
	}

	/// Point forecast, components and uncertainty bounds for every date, in order.
	pub fn predict(
		&self,
		dates: &[NaiveDateTime],
		config: &ForecastConfig,
	) -> Result<Vec<ForecastRow>, String> {
		let scaled_times = dates
			.iter()
			.map(|each| self.scaled_time(each))
			.collect::<Vec<_>>();
		let t_max = scaled_times.iter().copied().fold(1f64, f64::max);

		let mut rng = StdRng::seed_from_u64(config.seed);
		let simulations = self.sample_future_changepoints(&mut rng, t_max, config.uncertainty_samples)?;
		let noise = Normal::new(0.0, self.noise_scale).map_err(|err| err.to_string())?;

		let lower_quantile = (1.0 - config.interval_width) / 2.0;
		let upper_quantile = (1.0 + config.interval_width) / 2.0;

		// One row at a time, so only a single row of samples is ever held
		let mut trend_samples = Vec::<f64>::with_capacity(simulations.len());
		let mut yhat_samples = Vec::<f64>::with_capacity(simulations.len());

		// Per simulation: changes passed so far, their summed slope and summed `delta * at`
		let mut passed = vec![(0usize, 0f64, 0f64); simulations.len()];
		let mut previous_t = f64::NEG_INFINITY;

		let mut rows = Vec::with_capacity(dates.len());
		for (ds, t) in dates.iter().zip(scaled_times) {
			if t < previous_t {
				passed.fill((0, 0.0, 0.0));
			}
			previous_t = t;

			let base_trend = self.trend_at(t);
			let trend = base_trend * self.y_scale;
			let terms = self.seasonal_terms(ds);
			let additive_terms = terms.iter().map(|(_, value)| value).sum::<f64>();
			let term = |name: &str| {
				terms
					.iter()
					.find(|(each, _)| *each == name)
					.map(|(_, value)| *value)
			};

			trend_samples.clear();
			yhat_samples.clear();
			for (changes, (cursor, slope_change, anchor)) in simulations.iter().zip(passed.iter_mut()) {
				while let Some((at, delta)) = changes.get(*cursor) {
					if *at > t {
						break;
					}
					*slope_change += delta;
					*anchor += delta * at;
					*cursor += 1;
				}

				let sampled_trend = (base_trend + *slope_change * t - *anchor) * self.y_scale;
				trend_samples.push(sampled_trend);
				yhat_samples.push(sampled_trend + additive_terms + noise.sample(&mut rng) * self.y_scale);
			}

			let yhat = trend + additive_terms;
			let [trend_lower, trend_upper] = bounds(&mut trend_samples, trend, lower_quantile, upper_quantile);
			let [yhat_lower, yhat_upper] = bounds(&mut yhat_samples, yhat, lower_quantile, upper_quantile);

			rows.push(ForecastRow {
				ds: ds.format(CANONICAL_FORMAT).to_string(),
				trend,
				trend_lower,
				trend_upper,
				yearly: term(YEARLY.name),
				weekly: term(WEEKLY.name),
				daily: term(DAILY.name),
				additive_terms,
				yhat,
				yhat_lower,
				yhat_upper,
			});
		}

		Ok(rows)
	}
}

fn solve(system: DMatrix<f64>, rhs: &DVector<f64>) -> Option<DVector<f64>> {
	match system.clone().cholesky() {
		Some(found) => Some(found.solve(rhs)),
		None => system.lu().solve(rhs),
	}
}

/// Up to `changepoint_count` evenly spread over the first `changepoint_range` of the rows.
fn place_changepoints(scaled_times: &[f64], config: &ForecastConfig) -> Vec<f64> {
	let candidate_rows = (scaled_times.len() as f64 * config.changepoint_range).floor() as usize;
	let count = config
		.changepoint_count
		.min(candidate_rows.saturating_sub(1));

	// A lone bend at the origin keeps the trend terms the same shape
	if count == 0 {
		return vec![0.0];
	}

	let last_row = (candidate_rows - 1) as f64;
	(1..=count)
		.map(|index| {
			let row_index = (last_row * index as f64 / count as f64).round_ties_even() as usize;
			scaled_times[row_index]
		})
		.collect::<Vec<_>>()
}

fn pick_seasonalities(sorted_history: &[Observation]) -> Vec<Seasonality> {
	let days_between = |from: &NaiveDateTime, to: &NaiveDateTime| {
		(*to - *from).num_seconds() as f64 / SECONDS_PER_DAY
	};

	let span_days = match (sorted_history.first(), sorted_history.last()) {
		(Some(first), Some(last)) => days_between(&first.ds, &last.ds),
		_ => return Vec::new(),
	};

	let min_spacing = sorted_history
		.windows(2)
		.map(|pair| days_between(&pair[0].ds, &pair[1].ds))
		.filter(|each| *each > 0.0)
		.fold(f64::INFINITY, f64::min);

	let mut active = Vec::new();
	if span_days >= 730.0 {
		active.push(YEARLY);
	}
	if span_days >= 14.0 && min_spacing < 7.0 {
		active.push(WEEKLY);
	}
	if span_days >= 2.0 && min_spacing < 1.0 {
		active.push(DAILY);
	}
	active
}

fn fourier_terms(ds: &NaiveDateTime, seasonality: &Seasonality) -> impl Iterator<Item = f64> {
	let days = ds.and_utc().timestamp() as f64 / SECONDS_PER_DAY;
	let period = seasonality.period_days;
	(1..=seasonality.order).flat_map(move |harmonic| {
		let angle = 2.0 * PI * harmonic as f64 * days / period;
		[angle.sin(), angle.cos()]
	})
}

fn features(
	t: f64,
	ds: &NaiveDateTime,
	changepoints: &[f64],
	seasonalities: &[Seasonality],
) -> Vec<f64> {
	[1.0, t]
		.into_iter()
		.chain(changepoints.iter().map(|at| (t - at).max(0.0)))
		.chain(seasonalities.iter().flat_map(|each| fourier_terms(ds, each)))
		.collect::<Vec<_>>()
}

fn bounds(samples: &mut [f64], point: f64, lower: f64, upper: f64) -> [f64; 2] {
	if samples.is_empty() {
		return [point, point];
	}

	samples.sort_by(f64::total_cmp);
	[quantile(samples, lower), quantile(samples, upper)]
}

/// Linear interpolation between the closest ranks of an already sorted slice.
fn quantile(sorted: &[f64], q: f64) -> f64 {
	let position = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
	let below = position.floor() as usize;
	let above = (below + 1).min(sorted.len() - 1);
	let fraction = position - below as f64;
	sorted[below] + fraction * (sorted[above] - sorted[below])
}
