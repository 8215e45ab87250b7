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
use std::collections::HashMap;

use crate::preprocess::typedef::{ColumnInfo, PeriodUnit};
use crate::typedef::CellValue;

#[derive(PartialEq, Eq, Hash, Serialize, Clone, Copy, Debug)]
#[serde(rename_all = "lowercase")]
pub(crate) enum FileKind {
	Csv,
	Spreadsheet,
}

#[derive(Default, Clone, Debug)]
pub(crate) struct UploadedFile {
	pub name: String,
	pub content_type: Option<String>,
	pub bytes: Vec<u8>,
}

/// One browser form post: the uploaded file plus every plain field next to it.
#[derive(Default, Debug)]
pub(crate) struct Submission {
	pub file: Option<UploadedFile>,
	pub fields: HashMap<String, String>,
}

impl Submission {
	pub fn field(&self, key: &str) -> Option<&str> {
		self.fields
			.get(key)
			.map(|found| found.trim())
			.filter(|found| !found.is_empty())
	}
}

#[derive(Default, Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SheetInfo {
	pub name: String,
	pub file_kind: Option<FileKind>,
	pub columns: Vec<ColumnInfo>,
	pub time_candidates: Vec<String>,
	pub value_candidates: Vec<String>,
	pub head: Vec<Vec<CellValue>>,
	pub row_count: usize,
	pub max_horizon: usize,
	pub period_units: Vec<PeriodUnit>,
}
