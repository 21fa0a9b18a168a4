use std::sync::Arc;

use rustc_hash::FxHashMap as HashMap;

use crate::entry::{Code, LabeledEntry};
use crate::error::ConversionWarning;

/// One generation of a dictionary's cache.
///
/// The ordered entries, the label index and the entry index always describe
/// the same generation; a snapshot is never mutated once published.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
	generation: u64,
	entries: Vec<Arc<LabeledEntry>>,
	labels: HashMap<Code, String>,
	index: HashMap<Code, Arc<LabeledEntry>>,
}

impl Snapshot {
	/// Builds a snapshot, keeping the first entry for each value.
	pub(crate) fn build(ty: &str, generation: u64, entries: impl IntoIterator<Item = Arc<LabeledEntry>>) -> Self {
		let entries = entries.into_iter();
		let (lower, _) = entries.size_hint();
		let mut snap = Self {
			generation,
			entries: Vec::with_capacity(lower),
			labels: HashMap::with_capacity_and_hasher(lower, Default::default()),
			index: HashMap::with_capacity_and_hasher(lower, Default::default()),
		};

		for entry in entries {
			if snap.index.contains_key(&entry.value) {
				let warning = ConversionWarning::DuplicateValue {
					ty: ty.to_owned(),
					value: entry.value.to_string(),
				};
				tracing::warn!(dict = ty, value = %entry.value, "{warning}");
				continue;
			}
			snap.labels.insert(entry.value.clone(), entry.label.clone());
			snap.index.insert(entry.value.clone(), Arc::clone(&entry));
			snap.entries.push(entry);
		}
		snap
	}

	/// Rebinds the label of `value` in all three projections.
	///
	/// Returns `false` if no entry has that value.
	pub(crate) fn rebind_label(&mut self, value: &Code, label: &str) -> bool {
		let Some(existing) = self.index.get(value) else {
			return false;
		};
		let rebound = Arc::new(LabeledEntry {
			label: label.to_owned(),
			value: existing.value.clone(),
			raw: existing.raw.clone(),
		});

		if let Some(slot) = self.entries.iter_mut().find(|e| e.value == *value) {
			*slot = Arc::clone(&rebound);
		}
		self.labels.insert(value.clone(), label.to_owned());
		self.index.insert(value.clone(), rebound);
		true
	}

	/// Load generation; 0 for the empty initial snapshot.
	pub fn generation(&self) -> u64 {
		self.generation
	}

	/// Entries in converter order.
	pub fn entries(&self) -> &[Arc<LabeledEntry>] {
		&self.entries
	}

	/// Value to label projection.
	pub fn labels(&self) -> &HashMap<Code, String> {
		&self.labels
	}

	/// Value to entry projection.
	pub fn index(&self) -> &HashMap<Code, Arc<LabeledEntry>> {
		&self.index
	}

	/// Label bound to `value`.
	pub fn label(&self, value: &Code) -> Option<&str> {
		self.labels.get(value).map(String::as_str)
	}

	/// Entry keyed by `value`.
	pub fn entry(&self, value: &Code) -> Option<&Arc<LabeledEntry>> {
		self.index.get(value)
	}

	/// Number of entries.
	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}
}
