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

use axum::extract::{multipart::MultipartError, Multipart};
use calamine::{Data, DataType, Reader};
use std::{borrow::Cow, io::Cursor, path::Path};

use super::typedef::*;
use crate::typedef::{CellValue, ErrorKind, RawTable};

const DELIMITER_CANDIDATES: [u8; 4] = [b',', b';', b'\t', b'|'];
const SNIFF_LINE_COUNT: usize = 20;
const NA_TOKENS: [&str; 11] = [
	"", "NA", "N/A", "n/a", "NaN", "nan", "null", "NULL", "None", "#N/A", "-",
];
const UTF8_BOM: &str = "\u{feff}";
const ZIP_SIGNATURE: [u8; 4] = [0x50, 0x4b, 0x03, 0x04];
const OLE_SIGNATURE: [u8; 8] = [0xd0, 0xcf, 0x11, 0xe0, 0xa1, 0xb1, 0x1a, 0xe1];

pub(super) async fn read_submission(mut multipart: Multipart) -> Result<Submission, MultipartError> {
	let mut submission = Submission::default();

	while let Some(field) = multipart.next_field().await? {
		let name = field.name().unwrap_or_default().to_string();
		if name != "file" {
			let value = field.text().await?;
			submission.fields.insert(name, value);
			continue;
		}

		let file_name = field.file_name().unwrap_or_default().to_string();
		let content_type = field.content_type().map(str::to_string);
		let bytes = field.bytes().await?;

		// Browsers still post the field when nothing was picked
		if file_name.is_empty() && bytes.is_empty() {
			continue;
		}

		submission.file = Some(UploadedFile {
			name: file_name,
			content_type,
			bytes: bytes.to_vec(),
		});
	}

	Ok(submission)
}

/// Decides how to parse an upload from the type the browser declared for it.
pub(super) fn detect_file_kind(file: &UploadedFile) -> Result<FileKind, ErrorKind> {
	let declared = file
		.content_type
		.as_deref()
		.unwrap_or_default()
		.split(';')
		.next()
		.unwrap_or_default()
		.trim()
		.to_lowercase();

	let kind = if declared.is_empty() || declared == "application/octet-stream" {
		kind_from_extension(&file.name)
	} else if declared.contains("csv") {
		Some(FileKind::Csv)
	} else if declared.contains("sheet") || declared.contains("excel") || declared.contains("xls") {
		Some(FileKind::Spreadsheet)
	} else {
		None
	};

	match kind {
		// Windows reports plain CSV files as Excel
		Some(FileKind::Spreadsheet)
			if declared == "application/vnd.ms-excel" && !has_workbook_signature(&file.bytes) =>
		{
			Ok(FileKind::Csv)
		}
		Some(found) => Ok(found),
		None if declared.is_empty() => Err(ErrorKind::UnsupportedFormat(file.name.clone())),
		None => Err(ErrorKind::UnsupportedFormat(declared)),
	}
}

fn kind_from_extension(name: &str) -> Option<FileKind> {
	let extension = Path::new(name).extension()?.to_str()?.to_lowercase();
	match extension.as_str() {
		"csv" => Some(FileKind::Csv),
		"xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => Some(FileKind::Spreadsheet),
		_ => None,
	}
}

fn has_workbook_signature(bytes: &[u8]) -> bool {
	bytes.starts_with(&ZIP_SIGNATURE) || bytes.starts_with(&OLE_SIGNATURE)
}

/// UTF-8 first, then ISO-8859-1, which is what most legacy spreadsheet exports are written in.
pub(super) fn decode_text(bytes: &[u8]) -> Cow<'_, str> {
	match std::str::from_utf8(bytes) {
		Ok(text) => Cow::Borrowed(text.strip_prefix(UTF8_BOM).unwrap_or(text)),
		Err(_) => Cow::Owned(bytes.iter().map(|each| *each as char).collect::<String>()),
	}
}

/// Picks the separator that splits the leading lines into the same number of fields.
///
/// Occurrences inside double quotes are ignored. Falls back to a comma, which reads
/// a single-column file correctly.
pub(super) fn sniff_delimiter(text: &str) -> u8 {
	let lines = text
		.lines()
		.filter(|each| !each.trim().is_empty())
		.take(SNIFF_LINE_COUNT)
		.collect::<Vec<_>>();

	let mut best: Option<(u8, usize, usize)> = None;
	for candidate in DELIMITER_CANDIDATES {
		let counts = lines
			.iter()
			.map(|line| count_unquoted(line, candidate))
			.collect::<Vec<_>>();

		let header_count = counts.first().copied().unwrap_or_default();
		if header_count == 0 {
			continue;
		}

		let consistent = counts.iter().filter(|each| **each == header_count).count();
		let is_better = match best {
			None => true,
			Some((_, best_consistent, best_count)) => {
				consistent > best_consistent
					|| (consistent == best_consistent && header_count > best_count)
			}
		};

		if is_better {
			best = Some((candidate, consistent, header_count));
		}
	}

	best.map(|(delimiter, _, _)| delimiter).unwrap_or(b',')
}

fn count_unquoted(line: &str, delimiter: u8) -> usize {
	let mut is_quoted = false;
	let mut count = 0usize;
	for byte in line.bytes() {
		if byte == b'"' {
			is_quoted = !is_quoted;
		} else if byte == delimiter && !is_quoted {
			count += 1;
		}
	}
	count
}

pub(crate) fn parse_cell(cell: &str) -> CellValue {
	let trimmed = cell.trim();
	if NA_TOKENS.contains(&trimmed) {
		CellValue::Empty
	} else if let Some(number_value) = trimmed.parse::<f64>().ok().filter(|found| found.is_finite()) {
		CellValue::Number(number_value)
	} else if trimmed.eq_ignore_ascii_case("true") {
		CellValue::Boolean(true)
	} else if trimmed.eq_ignore_ascii_case("false") {
		CellValue::Boolean(false)
	} else {
		CellValue::String(trimmed.to_string())
	}
}

pub(super) fn read_csv(bytes: &[u8]) -> Result<RawTable, ErrorKind> {
	let text = decode_text(bytes);
	if text.trim().is_empty() {
		return Err(ErrorKind::EmptyFile);
	}

	let delimiter = sniff_delimiter(&text);
	let mut reader = csv::ReaderBuilder::new()
		.delimiter(delimiter)
		.has_headers(true)
		.flexible(true)
		.from_reader(text.as_bytes());

	let headers = match reader.headers() {
		Ok(ok) => ok.iter().map(|each| each.to_string()).collect::<Vec<_>>(),
		Err(err) => return Err(ErrorKind::MalformedFile(err.to_string())),
	};

	let column_count = headers.len();
	let mut rows = Vec::<Vec<CellValue>>::new();
	for each in reader.records() {
		let record = each.map_err(|err| ErrorKind::MalformedFile(err.to_string()))?;
		if record.len() > column_count {
			return Err(ErrorKind::MalformedFile(format!(
				"Expected {} fields in line {}, saw {}",
				column_count,
				record.position().map(|found| found.line()).unwrap_or_default(),
				record.len()
			)));
		}

		rows.push(record.iter().map(parse_cell).collect::<Vec<_>>());
	}

	if rows.is_empty() {
		return Err(ErrorKind::EmptyFile);
	}

	Ok(RawTable::from_rows(headers, rows))
}

/// Reads the first worksheet, taking its first row as the header.
pub(super) fn read_spreadsheet(bytes: &[u8]) -> Result<RawTable, ErrorKind> {
	let mut sheets = calamine::open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
		.map_err(|err| ErrorKind::MalformedFile(err.to_string()))?;

	let first_tab = match sheets.sheet_names().first() {
		Some(found) => found.clone(),
		None => return Err(ErrorKind::EmptyFile),
	};

	let sheet = sheets
		.worksheet_range(&first_tab)
		.map_err(|err| ErrorKind::MalformedFile(err.to_string()))?;

	let mut sheet_rows = sheet.rows();
	let headers = match sheet_rows.next() {
		Some(found) => found
			.iter()
			.map(|each| each.to_string())
			.collect::<Vec<_>>(),
		None => return Err(ErrorKind::EmptyFile),
	};

	let rows = sheet_rows
		.map(|each_row| each_row.iter().map(read_sheet_cell).collect::<Vec<_>>())
		.collect::<Vec<_>>();

	if rows.is_empty() {
		return Err(ErrorKind::EmptyFile);
	}

	Ok(RawTable::from_rows(headers, rows))
}

fn read_sheet_cell(cell: &Data) -> CellValue {
	match cell {
		Data::Empty | Data::Error(_) => CellValue::Empty,
		Data::Int(value) => CellValue::Number(*value as f64),
		Data::Float(value) if value.is_finite() => CellValue::Number(*value),
		Data::Float(_) => CellValue::Empty,
		Data::Bool(value) => CellValue::Boolean(*value),
		Data::String(value) => parse_cell(value),
		_ => match cell.as_datetime() {
			Some(datetime_value) => CellValue::DateTime(datetime_value),
			None => parse_cell(&cell.to_string()),
		},
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn upload(name: &str, content_type: Option<&str>, bytes: &[u8]) -> UploadedFile {
		UploadedFile {
			name: name.to_string(),
			content_type: content_type.map(str::to_string),
			bytes: bytes.to_vec(),
		}
	}

	#[test]
	fn test_detect_csv_and_spreadsheet_types() {
		let csv = upload("casos.csv", Some("text/csv"), b"a,b\n1,2\n");
		let csv_charset = upload("casos.csv", Some("text/csv; charset=utf-8"), b"a,b\n");
		let xlsx = upload(
			"casos.xlsx",
			Some("application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"),
			&ZIP_SIGNATURE,
		);
		let ods = upload(
			"casos.ods",
			Some("application/vnd.oasis.opendocument.spreadsheet"),
			&ZIP_SIGNATURE,
		);

		assert_eq!(detect_file_kind(&csv), Ok(FileKind::Csv));
		assert_eq!(detect_file_kind(&csv_charset), Ok(FileKind::Csv));
		assert_eq!(detect_file_kind(&xlsx), Ok(FileKind::Spreadsheet));
		assert_eq!(detect_file_kind(&ods), Ok(FileKind::Spreadsheet));
	}

	#[test]
	fn test_docx_is_unsupported() {
		let docx = upload(
			"relatorio.docx",
			Some("application/vnd.openxmlformats-officedocument.wordprocessingml.document"),
			&ZIP_SIGNATURE,
		);

		assert!(matches!(
			detect_file_kind(&docx),
			Err(ErrorKind::UnsupportedFormat(_))
		));
	}

	#[test]
	fn test_excel_typed_csv_is_read_as_csv() {
		let disguised = upload("casos.csv", Some("application/vnd.ms-excel"), b"a;b\n1;2\n");
		let legacy = upload("casos.xls", Some("application/vnd.ms-excel"), &OLE_SIGNATURE);

		assert_eq!(detect_file_kind(&disguised), Ok(FileKind::Csv));
		assert_eq!(detect_file_kind(&legacy), Ok(FileKind::Spreadsheet));
	}

	#[test]
	fn test_missing_type_falls_back_to_extension() {
		let by_name = upload("casos.XLSX", None, &ZIP_SIGNATURE);
		let octet = upload("casos.csv", Some("application/octet-stream"), b"a\n1\n");
		let unknown = upload("casos.txt", None, b"a\n1\n");

		assert_eq!(detect_file_kind(&by_name), Ok(FileKind::Spreadsheet));
		assert_eq!(detect_file_kind(&octet), Ok(FileKind::Csv));
		assert_eq!(
			detect_file_kind(&unknown),
			Err(ErrorKind::UnsupportedFormat(String::from("casos.txt")))
		);
	}

	#[test]
	fn test_sniff_common_delimiters() {
		assert_eq!(sniff_delimiter("data;casos\n2020-01-01;3\n2020-02-01;4\n"), b';');
		assert_eq!(sniff_delimiter("data,casos\n2020-01-01,3\n"), b',');
		assert_eq!(sniff_delimiter("data\tcasos\n2020-01-01\t3\n"), b'\t');
		assert_eq!(sniff_delimiter("data|casos|obitos\n2020|3|1\n"), b'|');
	}

	#[test]
	fn test_sniff_ignores_quoted_and_decimal_commas() {
		let text = "municipio;casos\n\"Natal, RN\";1,5\n\"Mossoro, RN\";2,5\n";
		assert_eq!(sniff_delimiter(text), b';');
	}

	#[test]
	fn test_sniff_single_column_defaults_to_comma() {
		assert_eq!(sniff_delimiter("casos\n1\n2\n"), b',');
	}

	#[test]
	fn test_parse_cell_types() {
		assert_eq!(parse_cell(" 42 "), CellValue::Number(42.0));
		assert_eq!(parse_cell("1e3"), CellValue::Number(1000.0));
		assert_eq!(parse_cell("NaN"), CellValue::Empty);
		assert_eq!(parse_cell("  "), CellValue::Empty);
		assert_eq!(parse_cell("-"), CellValue::Empty);
		assert_eq!(parse_cell("TRUE"), CellValue::Boolean(true));
		assert_eq!(parse_cell("inf"), CellValue::String(String::from("inf")));
		assert_eq!(
			parse_cell("2020-01-01"),
			CellValue::String(String::from("2020-01-01"))
		);
	}

	#[test]
	fn test_read_csv_semicolon_file() {
		let table = read_csv(b"data;casos\n2020-01-01;3\n2020-02-01;\n2020-03-01;5\n").unwrap();

		assert_eq!(table.row_count(), 3);
		assert_eq!(table.columns.len(), 2);
		assert_eq!(
			table.column("casos").unwrap().cells,
			vec![
				CellValue::Number(3.0),
				CellValue::Empty,
				CellValue::Number(5.0)
			]
		);
	}

	#[test]
	fn test_read_csv_with_bom_and_latin1() {
		let with_bom = read_csv("\u{feff}data,casos\n2020,1\n".as_bytes()).unwrap();
		assert!(with_bom.column("data").is_some());

		// "município" encoded as ISO-8859-1
		let latin1 = b"munic\xedpio;casos\nNatal;3\n";
		let table = read_csv(latin1).unwrap();
		assert!(table.column("munic\u{ed}pio").is_some());
	}

	#[test]
	fn test_read_csv_rejects_long_rows() {
		let result = read_csv(b"a,b\n1,2\n1,2,3\n");
		assert!(matches!(result, Err(ErrorKind::MalformedFile(_))));
	}

	#[test]
	fn test_read_csv_header_only_is_empty() {
		assert_eq!(read_csv(b"data,casos\n"), Err(ErrorKind::EmptyFile));
		assert_eq!(read_csv(b""), Err(ErrorKind::EmptyFile));
	}

	#[test]
	fn test_read_spreadsheet_rejects_garbage() {
		let result = read_spreadsheet(b"definitely not a workbook");
		assert!(matches!(result, Err(ErrorKind::MalformedFile(_))));
	}

	#[test]
	fn test_read_spreadsheet_first_sheet() {
		use simple_excel_writer::{row, Row, Workbook};

		let mut workbook = Workbook::create_in_memory();
		let mut sheet = workbook.create_sheet("Casos");
		workbook
			.write_sheet(&mut sheet, |sheet_writer| {
				sheet_writer.append_row(row!["data", "casos"])?;
				sheet_writer.append_row(row!["2020-01-01", 3.0])?;
				sheet_writer.append_row(row!["2020-02-01", 7.0])
			})
			.unwrap();
		let bytes = workbook.close().unwrap().unwrap();

		let table = read_spreadsheet(&bytes).unwrap();
		assert_eq!(table.row_count(), 2);
		assert_eq!(
			table.column("casos").unwrap().cells,
			vec![CellValue::Number(3.0), CellValue::Number(7.0)]
		);
		assert_eq!(
			table.column("data").unwrap().cells[0],
			CellValue::String(String::from("2020-01-01"))
		);
	}
}
