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
use std::sync::Arc;
use strum::IntoEnumIterator;

use super::cache::cache_key;
use super::helper::*;
use super::typedef::*;
use crate::preprocess::command::classify;
use crate::preprocess::typedef::{max_horizon, PeriodUnit};
use crate::typedef::{AppState, Context, RawTable, Report};

const ERROR_NO_FILE: &'static str = "No File Uploaded";
const ERROR_UPLOAD: &'static str = "Cannot Receive Upload";
const ERROR_THREAD: &'static str = "Cannot Create New Process Thread";
const ERROR_CACHE: &'static str = "Cache Inaccessible";
const ERROR_INCOMPLETE: &'static str = "Data is Incomplete";
const PREVIEW_ROWS: usize = 6;

/// Turns an upload into a table, or into an empty table plus an error notice.
pub(crate) fn load(ctx: &mut Context, state: &AppState, file: &UploadedFile) -> Arc<RawTable> {
	let kind = match detect_file_kind(file) {
		Ok(ok) => ok,
		Err(err) => {
			ctx.error(&err);
			return Default::default();
		}
	};

	let key = cache_key(kind, &file.bytes);
	let cached = match state.cache.lock() {
		Ok(mut guarded_cache) => guarded_cache.get(&key),
		Err(err) => {
			ctx.emit(crate::event::DIALOG_WARNING, ERROR_CACHE, err.to_string());
			None
		}
	};

	if let Some(found) = cached {
		tracing::debug!(name = %file.name, "Reusing parsed table");
		return found;
	}

	let parsed = match kind {
		FileKind::Csv => read_csv(&file.bytes),
		FileKind::Spreadsheet => read_spreadsheet(&file.bytes),
	};

	let table = match parsed {
		Ok(ok) => Arc::new(ok),
		Err(err) => {
			ctx.error(&err);
			return Default::default();
		}
	};

	tracing::info!(
		name = %file.name,
		rows = table.row_count(),
		columns = table.columns.len(),
		"Loaded table"
	);

	// Already reported above when poisoned
	if let Ok(mut guarded_cache) = state.cache.lock() {
		guarded_cache.insert(key, table.clone());
		tracing::debug!(cached = guarded_cache.len(), "Cached table");
	}

	table
}

/// Loads the submitted file, `None` when there is nothing usable in it.
pub(crate) fn load_submission(
	ctx: &mut Context,
	state: &AppState,
	submission: &Submission,
) -> Option<Arc<RawTable>> {
	let file = match &submission.file {
		Some(found) => found,
		None => {
			ctx.emit(
				crate::event::DIALOG_ERROR,
				ERROR_NO_FILE,
				"Choose a CSV or spreadsheet file first",
			);
			return None;
		}
	};

	let table = load(ctx, state, file);
	match table.is_empty() {
		true => None,
		false => Some(table),
	}
}

pub(crate) fn inspect(
	ctx: &mut Context,
	state: &AppState,
	submission: Submission,
) -> Option<SheetInfo> {
	let file = match &submission.file {
		Some(found) => found,
		None => {
			ctx.emit(
				crate::event::DIALOG_ERROR,
				ERROR_NO_FILE,
				"Choose a CSV or spreadsheet file first",
			);
			return None;
		}
	};

	let mut sheet_info = SheetInfo {
		name: file.name.clone(),
		..Default::default()
	};

	let table = load(ctx, state, file);
	if table.is_empty() {
		return Some(sheet_info);
	}

	let classification = classify(&table);
	if classification.time_candidates.is_empty() || classification.value_candidates.is_empty() {
		ctx.emit(
			crate::event::DIALOG_WARNING,
			ERROR_INCOMPLETE,
			format!(
				"\"{}\" needs at least one date/time column and one numeric column",
				file.name
			),
		);
	}

	let row_count = table.row_count();
	sheet_info.file_kind = detect_file_kind(file).ok();
	sheet_info.columns = classification.columns;
	sheet_info.time_candidates = classification.time_candidates;
	sheet_info.value_candidates = classification.value_candidates;
	sheet_info.head = table.head(PREVIEW_ROWS);
	sheet_info.row_count = row_count;
	sheet_info.max_horizon = max_horizon(row_count);
	sheet_info.period_units = PeriodUnit::iter().collect::<Vec<_>>();

	Some(sheet_info)
}

/// Reads the form, then runs `action` off the async workers with a fresh [`Context`].
pub(crate) async fn dispatch<T, F>(state: AppState, multipart: Multipart, action: F) -> Json<Report<T>>
where
	T: Send + 'static,
	F: FnOnce(&mut Context, &AppState, Submission) -> Option<T> + Send + 'static,
{
	let submission = match read_submission(multipart).await {
		Ok(ok) => ok,
		Err(err) => return Json(Report::failed(ERROR_UPLOAD, err.to_string())),
	};

	let joined = tokio::task::spawn_blocking(move || {
		let mut ctx = Context::default();
		let result = action(&mut ctx, &state, submission);
		tracing::debug!(
			errors = ctx.count(crate::event::DIALOG_ERROR),
			warnings = ctx.count(crate::event::DIALOG_WARNING),
			"Action done"
		);
		Report::new(result, ctx)
	})
	.await;

	match joined {
		Ok(report) => Json(report),
		Err(err) => Json(Report::failed(ERROR_THREAD, err.to_string())),
	}
}

pub(crate) async fn inspect_upload(
	State(state): State<AppState>,
	multipart: Multipart,
) -> Json<Report<SheetInfo>> {
	dispatch(state, multipart, inspect).await
}
