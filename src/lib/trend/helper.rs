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

use statrs::distribution::{ContinuousCDF, Normal};
use std::collections::HashMap;

use super::typedef::*;

/// Sen's slope holds every pairwise slope at once, about 100 MB at this many rows.
pub(super) const MAX_TREND_ROWS: usize = 5_000;

/// Mann-Kendall trend test without any serial correlation adjustment.
///
/// `values` is in observation order and may hold `NaN` for missing observations. The test
/// skips them, while Sen's slope keeps every value at its original position.
pub(super) fn original_test(values: &[f64], alpha: f64) -> Result<TrendVerdict, String> {
	if values.len() > MAX_TREND_ROWS {
		return Err(format!(
			"The trend test handles at most {} rows, the series has {}",
			MAX_TREND_ROWS,
			values.len()
		));
	}

	let observed = values
		.iter()
		.copied()
		.filter(|each| !each.is_nan())
		.collect::<Vec<_>>();

	let n = observed.len();
	if n < 2 {
		return Err(format!(
			"The trend test needs at least 2 values, only {} found",
			n
		));
	}

	let s = score(&observed);
	let var_s = variance(&observed);
	let tau = s / (0.5 * n as f64 * (n as f64 - 1.0));

	let z = if s > 0.0 {
		(s - 1.0) / var_s.sqrt()
	} else if s < 0.0 {
		(s + 1.0) / var_s.sqrt()
	} else {
		0.0
	};

	let standard = Normal::standard();
	let p = 2.0 * (1.0 - standard.cdf(z.abs()));
	let h = z.abs() > standard.inverse_cdf(1.0 - alpha / 2.0);

	let trend = match (h, z) {
		(true, z) if z > 0.0 => TrendCategory::Increasing,
		(true, z) if z < 0.0 => TrendCategory::Decreasing,
		_ => TrendCategory::NoTrend,
	};

	let (slope, intercept) = sens_slope(values);

	Ok(TrendVerdict {
		trend,
		h,
		p,
		z,
		tau,
		s,
		var_s,
		slope,
		intercept,
	})
}

fn score(values: &[f64]) -> f64 {
	let mut s = 0i64;
	for (index, earlier) in values.iter().enumerate() {
		for later in &values[index + 1..] {
			s += match later.partial_cmp(earlier) {
				Some(std::cmp::Ordering::Greater) => 1,
				Some(std::cmp::Ordering::Less) => -1,
				_ => 0,
			};
		}
	}
	s as f64
}

/// Variance of S, reduced for every group of tied values.
fn variance(values: &[f64]) -> f64 {
	let n = values.len() as f64;
	let mut ties = HashMap::<u64, usize>::new();
	for each in values {
		// -0.0 and 0.0 are the same value
		*ties.entry((each + 0.0).to_bits()).or_insert(0) += 1;
	}

	let tie_correction = ties
		.values()
		.filter(|count| **count > 1)
		.map(|count| {
			let tp = *count as f64;
			tp * (tp - 1.0) * (2.0 * tp + 5.0)
		})
		.sum::<f64>();

	(n * (n - 1.0) * (2.0 * n + 5.0) - tie_correction) / 18.0
}

fn sens_slope(values: &[f64]) -> (f64, f64) {
	let mut pairwise = Vec::<f64>::with_capacity(values.len() * values.len().saturating_sub(1) / 2);
	for (i, earlier) in values.iter().enumerate() {
		for (offset, later) in values[i + 1..].iter().enumerate() {
			let slope = (later - earlier) / (offset + 1) as f64;
			if !slope.is_nan() {
				pairwise.push(slope);
			}
		}
	}

	let slope = median(&mut pairwise);

	let mut observed = values
		.iter()
		.copied()
		.filter(|each| !each.is_nan())
		.collect::<Vec<_>>();
	let mut positions = values
		.iter()
		.enumerate()
		.filter(|(_, each)| !each.is_nan())
		.map(|(index, _)| index as f64)
		.collect::<Vec<_>>();

	let intercept = median(&mut observed) - median(&mut positions) * slope;
	(slope, intercept)
}

fn median(values: &mut [f64]) -> f64 {
	if values.is_empty() {
		return f64::NAN;
	}

	values.sort_by(f64::total_cmp);
	let middle = values.len() / 2;
	match values.len() % 2 {
		0 => (values[middle - 1] + values[middle]) / 2.0,
		_ => values[middle],
	}
}
