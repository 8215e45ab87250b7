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
	extract::DefaultBodyLimit,
	response::Html,
	routing::{get, post},
	Json, Router,
};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod config;
use config::Config;
pub use config::{ConfigError, StartupError};

mod typedef;
use typedef::*;

mod event;

mod data;
mod forecast;
mod preprocess;
mod trend;

use data::command::*;
use forecast::command::*;
use trend::command::*;

const DEFAULT_LOG_FILTER: &'static str = "project_augur_lib=info,tower_http=info";

async fn index() -> Html<&'static str> {
	Html(include_str!("../../ui/index.html"))
}

async fn health() -> Json<serde_json::Value> {
	Json(serde_json::json!({
		"status": "alive",
		"version": env!("CARGO_PKG_VERSION"),
	}))
}

pub(crate) fn router(state: AppState) -> Router {
	let upload_limit = state.config.max_upload_bytes;

	Router::new()
		.route("/", get(index))
		.route("/health", get(health))
		.route("/api/inspect", post(inspect_upload))
		.route("/api/forecast", post(run_forecast))
		.route("/api/trend", post(run_trend_test))
		.layer(DefaultBodyLimit::max(upload_limit))
		.layer(TraceLayer::new_for_http())
		.with_state(state)
}

/// Reads the settings, starts logging, then serves the page until the process is stopped.
pub fn run() -> Result<(), StartupError> {
	let config = Config::from_env()?;

	tracing_subscriber::registry()
		.with(tracing_subscriber::fmt::layer())
		.with(EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()))
		.init();

	tokio::runtime::Builder::new_multi_thread()
		.enable_all()
		.build()?
		.block_on(serve(config))
}

async fn serve(config: Config) -> Result<(), StartupError> {
	let address = config.socket_addr();
	let app = router(AppState::new(config));

	let listener = tokio::net::TcpListener::bind(address).await?;
	tracing::info!(
		"Project::Augur v{} listening on http://{}",
		env!("CARGO_PKG_VERSION"),
		address
	);

	axum::serve(listener, app).await?;
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::forecast::typedef::ForecastConfig;
	use axum::{
		body::Body,
		http::{Request, StatusCode},
	};
	use serde_json::Value;
	use tower::ServiceExt;

	const BOUNDARY: &str = "augur-test-boundary";

	enum Part<'a> {
		File {
			name: &'a str,
			content_type: &'a str,
			bytes: &'a [u8],
		},
		Field(&'a str, &'a str),
	}

	fn multipart(parts: &[Part]) -> Vec<u8> {
		let mut body = Vec::<u8>::new();
		for each in parts {
			body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
			match each {
				Part::File {
					name,
					content_type,
					bytes,
				} => {
					body.extend_from_slice(
						format!(
							"Content-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
							name, content_type
						)
						.as_bytes(),
					);
					body.extend_from_slice(bytes);
				}
				Part::Field(key, value) => {
					body.extend_from_slice(
						format!(
							"Content-Disposition: form-data; name=\"{}\"\r\n\r\n{}",
							key, value
						)
						.as_bytes(),
					);
				}
			}
			body.extend_from_slice(b"\r\n");
		}
		body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
		body
	}

	fn test_state() -> AppState {
		AppState::new(Config {
			forecast: ForecastConfig {
				uncertainty_samples: 100,
				..Default::default()
			},
			..Default::default()
		})
	}

	async fn post_form(state: AppState, uri: &str, parts: &[Part<'_>]) -> Value {
		let request = Request::builder()
			.method("POST")
			.uri(uri)
			.header(
				"content-type",
				format!("multipart/form-data; boundary={}", BOUNDARY),
			)
			.body(Body::from(multipart(parts)))
			.unwrap();

		let response = router(state).oneshot(request).await.unwrap();
		assert_eq!(response.status(), StatusCode::OK);

		let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
			.await
			.unwrap();
		serde_json::from_slice::<Value>(&bytes).unwrap()
	}

	fn titles(report: &Value) -> Vec<String> {
		report["notices"]
			.as_array()
			.unwrap()
			.iter()
			.map(|each| each["title"].as_str().unwrap().to_string())
			.collect::<Vec<_>>()
	}

	fn monthly_csv(rows: usize, empty_values: bool) -> String {
		let mut content = String::from("data,casos\n");
		for index in 0..rows {
			let value = match empty_values {
				true => String::new(),
				false => (40 + index % 12 + index / 3).to_string(),
			};
			content.push_str(&format!(
				"{}-{:02}-01,{}\n",
				2012 + index / 12,
				index % 12 + 1,
				value
			));
		}
		content
	}

	#[tokio::test]
	async fn test_health_and_index() {
		let app = router(test_state());
		let response = app
			.clone()
			.oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
			.await
			.unwrap();
		assert_eq!(response.status(), StatusCode::OK);

		let response = app
			.oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
			.await
			.unwrap();
		let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
			.await
			.unwrap();
		assert!(String::from_utf8_lossy(&bytes).contains("Project::Augur"));
	}

	#[tokio::test]
	async fn test_inspect_csv() {
		let content = monthly_csv(30, false);
		let report = post_form(
			test_state(),
			"/api/inspect",
			&[Part::File {
				name: "casos.csv",
				content_type: "text/csv",
				bytes: content.as_bytes(),
			}],
		)
		.await;

		assert_eq!(report["result"]["rowCount"], 30);
		assert_eq!(report["result"]["maxHorizon"], 6);
		assert_eq!(report["result"]["timeCandidates"][0], "data");
		assert_eq!(report["result"]["valueCandidates"][0], "casos");
		assert_eq!(report["result"]["columns"][1]["type"], "number");
		assert_eq!(report["result"]["head"].as_array().unwrap().len(), 6);
	}

	#[tokio::test]
	async fn test_docx_upload_is_rejected() {
		let report = post_form(
			test_state(),
			"/api/inspect",
			&[Part::File {
				name: "relatorio.docx",
				content_type: "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
				bytes: b"PK\x03\x04not really a document",
			}],
		)
		.await;

		assert!(report["result"]["columns"].as_array().unwrap().is_empty());
		assert!(report["result"]["timeCandidates"].as_array().unwrap().is_empty());
		assert_eq!(report["notices"][0]["event"], "dialog-error");
		assert_eq!(report["notices"][0]["title"], "File Type Unsupported");
	}

	#[tokio::test]
	async fn test_forecast_hundred_months() {
		let content = monthly_csv(100, false);
		let report = post_form(
			test_state(),
			"/api/forecast",
			&[
				Part::File {
					name: "casos.csv",
					content_type: "text/csv",
					bytes: content.as_bytes(),
				},
				Part::Field("time_column", "data"),
				Part::Field("value_column", "casos"),
				Part::Field("unit", "month"),
				Part::Field("horizon", "5"),
			],
		)
		.await;

		let rows = report["result"]["forecast"]["rows"].as_array().unwrap();
		assert_eq!(rows.len(), 105);
		assert_eq!(rows[104]["ds"], "2020-09-01 00:00:00");
		assert!(rows[104]["yhat_lower"].as_f64() <= rows[104]["yhat"].as_f64());
		assert_eq!(report["result"]["parameters"]["horizon"], 5);
		assert!(titles(&report).contains(&String::from("Forecast Finished")));
	}

	#[tokio::test]
	async fn test_forecast_without_values() {
		let content = monthly_csv(10, true);
		let report = post_form(
			test_state(),
			"/api/forecast",
			&[
				Part::File {
					name: "casos.csv",
					content_type: "text/csv",
					bytes: content.as_bytes(),
				},
				Part::Field("time_column", "data"),
				Part::Field("value_column", "casos"),
				Part::Field("unit", "month"),
				Part::Field("horizon", "2"),
			],
		)
		.await;

		assert!(report["result"].is_null());
		let titles = titles(&report);
		assert!(titles.contains(&String::from("Value Column is not Numeric")));
		assert!(titles.contains(&String::from("Cannot Convert Values")));

		let notices = report["notices"].as_array().unwrap();
		assert_eq!(notices.last().unwrap()["event"], "operation-finished");
		assert_eq!(
			notices
				.iter()
				.filter(|each| each["event"] == "operation-finished")
				.count(),
			1
		);
	}

	#[tokio::test]
	async fn test_trend_on_rising_counts() {
		let mut content = String::from("semana;casos\n");
		for index in 0..20 {
			let value = if index == 12 { 5 } else { 10 + index * 4 };
			content.push_str(&format!(
				"{}-{:02}-01;{}\n",
				2023 + index / 12,
				index % 12 + 1,
				value
			));
		}
		let report = post_form(
			test_state(),
			"/api/trend",
			&[
				Part::File {
					name: "casos.csv",
					content_type: "application/vnd.ms-excel",
					bytes: content.as_bytes(),
				},
				Part::Field("time_column", "semana"),
				Part::Field("value_column", "casos"),
			],
		)
		.await;

		assert_eq!(report["result"]["verdict"]["trend"], "increasing");
		assert_eq!(report["result"]["sampleSize"], 20);
		assert!(titles(&report).contains(&String::from("Trend Detected")));
		assert!(titles(&report).contains(&String::from("Trend Test Finished")));
	}

	#[tokio::test]
	async fn test_upload_over_limit() {
		let state = AppState::new(Config {
			max_upload_bytes: 256,
			..Default::default()
		});
		let content = monthly_csv(100, false);
		let report = post_form(
			state,
			"/api/inspect",
			&[Part::File {
				name: "casos.csv",
				content_type: "text/csv",
				bytes: content.as_bytes(),
			}],
		)
		.await;

		assert!(report["result"].is_null());
		assert_eq!(report["notices"][0]["event"], "dialog-error");
	}
}
