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
use serde::Serialize;
use std::{
	borrow::Cow,
	collections::HashMap,
	sync::{Arc, Mutex},
};
use thiserror::Error;

use crate::config::Config;
use crate::data::cache::TableCache;

#[derive(Serialize, Clone, Debug, PartialEq)]
pub(crate) struct Notice {
	pub event: &'static str,
	pub title: Cow<'static, str>,
	pub message: String,
}

/// Everything a single user action reports back to the page.
///
/// One `Context` lives exactly as long as one request, so nothing leaks between uploads.
#[derive(Default, Debug)]
pub(crate) struct Context {
	pub notices: Vec<Notice>,
}

impl Context {
	pub fn emit(
		&mut self,
		event: &'static str,
		title: impl Into<Cow<'static, str>>,
		message: impl Into<String>,
	) {
		let title = title.into();
		let message = message.into();

		match event {
			crate::event::DIALOG_ERROR => tracing::error!(%title, %message),
			crate::event::DIALOG_WARNING => tracing::warn!(%title, %message),
			_ => tracing::info!(event, %title, %message),
		}

		self.notices.push(Notice {
			event,
			title,
			message,
		});
	}

	pub fn error(&mut self, err: &ErrorKind) {
		self.emit(crate::event::DIALOG_ERROR, err.title(), err.to_string());
	}

	pub fn warning(&mut self, err: &ErrorKind) {
		self.emit(crate::event::DIALOG_WARNING, err.title(), err.to_string());
	}

	pub fn count(&self, event: &str) -> usize {
		self.notices.iter().filter(|each| each.event == event).count()
	}

	#[cfg(test)]
	pub fn has_title(&self, title: &str) -> bool {
		self.notices.iter().any(|each| each.title == title)
	}
}

#[derive(Error, Debug, Clone, PartialEq)]
pub(crate) enum ErrorKind {
	#[error("Cannot read \"{0}\" files, upload a CSV or spreadsheet file instead")]
	UnsupportedFormat(String),

	#[error("The uploaded file has no data rows")]
	EmptyFile,

	#[error("{0}")]
	MalformedFile(String),

	#[error("No rows are left after dropping rows without a value in \"{0}\"")]
	EmptyAfterCleaning(String),

	#[error("Column \"{0}\" does not hold numbers, its cells will be converted where possible")]
	NonNumericValueColumn(String),

	#[error("No cell in column \"{0}\" can be read as a number")]
	CoercionFailed(String),

	#[error("{count} value(s) in column \"{column}\" cannot be read as a date or time")]
	NotATimeColumn { column: String, count: usize },

	#[error("Only {rows} rows are usable, the prediction horizon expects at least {required}")]
	InsufficientData { rows: usize, required: usize },

	#[error("{0}")]
	ForecastFailure(String),

	#[error("{0}")]
	TrendTestFailure(String),

	#[error("Column \"{0}\" does not exist in the uploaded file")]
	UnknownColumn(String),

	#[error("\"{value}\" is not a valid {field}")]
	InvalidParameter { field: &'static str, value: String },
}

impl ErrorKind {
	pub fn title(&self) -> &'static str {
		match self {
			ErrorKind::UnsupportedFormat(_) => "File Type Unsupported",
			ErrorKind::EmptyFile => "File is Empty",
			ErrorKind::MalformedFile(_) => "Failed to Read Content",
			ErrorKind::EmptyAfterCleaning(_) => "Nothing Left after Cleaning",
			ErrorKind::NonNumericValueColumn(_) => "Value Column is not Numeric",
			ErrorKind::CoercionFailed(_) => "Cannot Convert Values",
			ErrorKind::NotATimeColumn { .. } => "Not a Date/Time Column",
			ErrorKind::InsufficientData { .. } => "Not Enough Rows",
			ErrorKind::ForecastFailure(_) => "Forecast Failed",
			ErrorKind::TrendTestFailure(_) => "Trend Test Failed",
			ErrorKind::UnknownColumn(_) => "Selected Column is Gone",
			ErrorKind::InvalidParameter { .. } => "Invalid Parameter",
		}
	}
}

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(untagged)]
pub(crate) enum CellValue {
	Empty,
	Number(f64),
	Boolean(bool),
	DateTime(NaiveDateTime),
	String(String),
}

impl Default for CellValue {
	fn default() -> Self {
		CellValue::Empty
	}
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Column {
	pub name: String,
	pub cells: Vec<CellValue>,
}

#[derive(Default, Clone, Debug, PartialEq)]
pub(crate) struct RawTable {
	pub columns: Vec<Column>,
}

impl RawTable {
	/// Builds a column-major table out of parsed rows.
	///
	/// Blank headers become `Unnamed: {index}` and repeated headers get a `.1`, `.2`, ... suffix,
	/// so column names are always unique. Short rows are padded with [`CellValue::Empty`].
	pub fn from_rows(headers: Vec<String>, rows: Vec<Vec<CellValue>>) -> Self {
		let mut seen = HashMap::<String, usize>::new();
		let names = headers
			.into_iter()
			.enumerate()
			.map(|(index, header)| {
				let base = match header.trim() {
					"" => format!("Unnamed: {}", index),
					trimmed => trimmed.to_string(),
				};

				let occurrence = seen.entry(base.clone()).or_insert(0);
				let name = match *occurrence {
					0 => base,
					nth => format!("{}.{}", base, nth),
				};
				*occurrence += 1;
				name
			})
			.collect::<Vec<_>>();

		let mut columns = names
			.into_iter()
			.map(|name| Column {
				name,
				cells: Vec::with_capacity(rows.len()),
			})
			.collect::<Vec<_>>();

		for row in rows {
			let mut cells = row.into_iter();
			for column in columns.iter_mut() {
				column.cells.push(cells.next().unwrap_or_default());
			}
		}

		RawTable { columns }
	}

	pub fn row_count(&self) -> usize {
		self.columns
			.first()
			.map(|found| found.cells.len())
			.unwrap_or_default()
	}

	pub fn is_empty(&self) -> bool {
		self.row_count() == 0
	}

	pub fn column(&self, name: &str) -> Option<&Column> {
		self.columns.iter().find(|each| each.name == name)
	}

	pub fn head(&self, count: usize) -> Vec<Vec<CellValue>> {
		(0..self.row_count().min(count))
			.map(|row_index| {
				self.columns
					.iter()
					.map(|each| each.cells[row_index].clone())
					.collect::<Vec<_>>()
			})
			.collect::<Vec<_>>()
	}
}

/// What every API call answers with: the outcome (if any) plus the notices raised on the way.
#[derive(Serialize, Debug)]
pub(crate) struct Report<T> {
	pub result: Option<T>,
	pub notices: Vec<Notice>,
}

impl<T> Report<T> {
	pub fn new(result: Option<T>, ctx: Context) -> Self {
		Report {
			result,
			notices: ctx.notices,
		}
	}

	pub fn failed(title: &'static str, message: String) -> Self {
		let mut ctx = Context::default();
		ctx.emit(crate::event::DIALOG_ERROR, title, message);
		Report::new(None, ctx)
	}
}

#[derive(Clone)]
pub(crate) struct AppState {
	pub config: Arc<Config>,
	pub cache: Arc<Mutex<TableCache>>,
}

impl AppState {
	pub fn new(config: Config) -> Self {
		AppState {
			cache: Arc::new(Mutex::new(TableCache::new(config.cache_capacity))),
			config: Arc::new(config),
		}
	}
}
