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

use std::{
	fmt::Display,
	net::{IpAddr, Ipv4Addr, SocketAddr},
	str::FromStr,
};
use thiserror::Error;

use crate::forecast::typedef::ForecastConfig;
use crate::preprocess::typedef::ValidationPolicy;

const BYTES_PER_MEGABYTE: usize = 1024 * 1024;

#[derive(Error, Debug)]
pub enum ConfigError {
	#[error("Invalid value \"{value}\" for {key}: {reason}")]
	Invalid {
		key: &'static str,
		value: String,
		reason: String,
	},
}

#[derive(Error, Debug)]
pub enum StartupError {
	#[error("{0}")]
	Config(#[from] ConfigError),

	#[error("{0}")]
	Io(#[from] std::io::Error),
}

#[derive(Clone, Debug)]
pub(crate) struct Config {
	pub host: IpAddr,
	pub port: u16,
	pub cache_capacity: usize,
	pub max_upload_bytes: usize,
	pub validation_policy: ValidationPolicy,
	pub forecast: ForecastConfig,
	pub trend_alpha: f64,
}

impl Default for Config {
	fn default() -> Self {
		Self {
			host: IpAddr::V4(Ipv4Addr::LOCALHOST),
			port: 8501,
			cache_capacity: 8,
			max_upload_bytes: 20 * BYTES_PER_MEGABYTE,
			validation_policy: ValidationPolicy::default(),
			forecast: ForecastConfig::default(),
			trend_alpha: 0.05,
		}
	}
}

impl Config {
	/// Reads the process environment, after loading `.env` when one exists.
	pub fn from_env() -> Result<Self, ConfigError> {
		dotenvy::dotenv().ok();
		Self::from_lookup(|key| std::env::var(key).ok())
	}

	pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
		let fallback = Config::default();

		let upload_megabytes = read(
			&lookup,
			"AUGUR_MAX_UPLOAD_MB",
			fallback.max_upload_bytes / BYTES_PER_MEGABYTE,
		)?;

		let strict = match lookup("AUGUR_STRICT_VALIDATION") {
			Some(raw) => parse_flag(&raw).ok_or_else(|| ConfigError::Invalid {
				key: "AUGUR_STRICT_VALIDATION",
				value: raw.clone(),
				reason: String::from("expected true or false"),
			})?,
			None => fallback.validation_policy == ValidationPolicy::Strict,
		};

		let config = Config {
			host: read(&lookup, "AUGUR_HOST", fallback.host)?,
			port: read(&lookup, "AUGUR_PORT", fallback.port)?,
			cache_capacity: read(&lookup, "AUGUR_CACHE_CAPACITY", fallback.cache_capacity)?,
			max_upload_bytes: upload_megabytes * BYTES_PER_MEGABYTE,
			validation_policy: match strict {
				true => ValidationPolicy::Strict,
				false => ValidationPolicy::Lenient,
			},
			forecast: ForecastConfig {
				interval_width: read(
					&lookup,
					"AUGUR_INTERVAL_WIDTH",
					fallback.forecast.interval_width,
				)?,
				uncertainty_samples: read(
					&lookup,
					"AUGUR_UNCERTAINTY_SAMPLES",
					fallback.forecast.uncertainty_samples,
				)?,
				seed: read(&lookup, "AUGUR_SEED", fallback.forecast.seed)?,
				..fallback.forecast
			},
			trend_alpha: read(&lookup, "AUGUR_TREND_ALPHA", fallback.trend_alpha)?,
		};

		ensure_fraction("AUGUR_INTERVAL_WIDTH", config.forecast.interval_width)?;
		ensure_fraction("AUGUR_TREND_ALPHA", config.trend_alpha)?;
		if config.cache_capacity == 0 {
			return Err(ConfigError::Invalid {
				key: "AUGUR_CACHE_CAPACITY",
				value: String::from("0"),
				reason: String::from("the cache must hold at least one file"),
			});
		}

		Ok(config)
	}

	pub fn socket_addr(&self) -> SocketAddr {
		SocketAddr::new(self.host, self.port)
	}
}

fn read<T>(lookup: &impl Fn(&str) -> Option<String>, key: &'static str, default: T) -> Result<T, ConfigError>
where
	T: FromStr,
	T::Err: Display,
{
	match lookup(key) {
		Some(raw) => raw.trim().parse::<T>().map_err(|err| ConfigError::Invalid {
			key,
			value: raw.clone(),
			reason: err.to_string(),
		}),
		None => Ok(default),
	}
}

fn parse_flag(raw: &str) -> Option<bool> {
	match raw.trim().to_lowercase().as_str() {
		"1" | "true" | "yes" | "on" => Some(true),
		"0" | "false" | "no" | "off" => Some(false),
		_ => None,
	}
}

fn ensure_fraction(key: &'static str, value: f64) -> Result<(), ConfigError> {
	if value > 0.0 && value < 1.0 {
		return Ok(());
	}

	Err(ConfigError::Invalid {
		key,
		value: value.to_string(),
		reason: String::from("must lie strictly between 0 and 1"),
	})
}
