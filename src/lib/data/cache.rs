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

use sha2::{Digest, Sha256};
use std::{
	collections::{HashMap, VecDeque},
	sync::Arc,
};

use super::typedef::FileKind;
use crate::typedef::RawTable;

pub(crate) type CacheKey = (FileKind, [u8; 32]);

pub(crate) fn cache_key(kind: FileKind, bytes: &[u8]) -> CacheKey {
	(kind, Sha256::digest(bytes).into())
}

/// Parsed uploads, keyed by what the bytes are rather than which request carried them.
///
/// The page re-posts the same file with every action, so a hit here skips the whole parse.
/// Holds at most `capacity` tables and evicts the least recently used one.
pub(crate) struct TableCache {
	capacity: usize,
	entries: HashMap<CacheKey, Arc<RawTable>>,
	recency: VecDeque<CacheKey>,
}

impl TableCache {
	pub fn new(capacity: usize) -> Self {
		TableCache {
			capacity: capacity.max(1),
			entries: HashMap::with_capacity(capacity),
			recency: VecDeque::with_capacity(capacity),
		}
	}

	pub fn get(&mut self, key: &CacheKey) -> Option<Arc<RawTable>> {
		let found = self.entries.get(key).cloned()?;
		self.touch(key);
		Some(found)
	}

	pub fn insert(&mut self, key: CacheKey, table: Arc<RawTable>) {
		if self.entries.insert(key, table).is_some() {
			self.touch(&key);
			return;
		}

		self.recency.push_back(key);
		while self.entries.len() > self.capacity {
			match self.recency.pop_front() {
				Some(oldest) => {
					self.entries.remove(&oldest);
				}
				None => break,
			}
		}
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	fn touch(&mut self, key: &CacheKey) {
		if let Some(position) = self.recency.iter().position(|each| each == key) {
			self.recency.remove(position);
		}
		self.recency.push_back(*key);
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::typedef::CellValue;

	fn table(value: f64) -> Arc<RawTable> {
		Arc::new(RawTable::from_rows(
			vec![String::from("casos")],
			vec![vec![CellValue::Number(value)]],
		))
	}

	#[test]
	fn test_same_bytes_same_key() {
		let first = cache_key(FileKind::Csv, b"data;casos\n2020-01-01;3\n");
		let second = cache_key(FileKind::Csv, b"data;casos\n2020-01-01;3\n");
		let other_kind = cache_key(FileKind::Spreadsheet, b"data;casos\n2020-01-01;3\n");

		assert_eq!(first, second);
		assert_ne!(first, other_kind);
	}

	#[test]
	fn test_evicts_least_recently_used() {
		let mut cache = TableCache::new(2);
		let a = cache_key(FileKind::Csv, b"a");
		let b = cache_key(FileKind::Csv, b"b");
		let c = cache_key(FileKind::Csv, b"c");

		cache.insert(a, table(1.0));
		cache.insert(b, table(2.0));
		assert!(cache.get(&a).is_some()); // b is now the oldest
		cache.insert(c, table(3.0));

		assert_eq!(cache.len(), 2);
		assert!(cache.get(&a).is_some());
		assert!(cache.get(&b).is_none());
		assert!(cache.get(&c).is_some());
	}

	#[test]
	fn test_reinsert_does_not_grow() {
		let mut cache = TableCache::new(1);
		let a = cache_key(FileKind::Csv, b"a");

		cache.insert(a, table(1.0));
		cache.insert(a, table(2.0));

		assert_eq!(cache.len(), 1);
		assert_eq!(
			cache.get(&a).unwrap().column("casos").unwrap().cells[0],
			CellValue::Number(2.0)
		);
	}
}
