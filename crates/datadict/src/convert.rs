//! Response conversion into labeled entries.
//!
//! A [`Convert`] turns a raw response into [`Converted`] output. Typed output
//! ([`Converted::Entries`]) is trusted; JSON output is checked against the
//! entry shape and downgraded to an empty result when it does not fit.

use std::sync::Arc;

use serde_json::Value;

use crate::entry::{Code, LabeledEntry};
use crate::error::ConversionWarning;
use crate::spec::DictSpec;

/// Label keys probed after the spec's own `label_field`.
pub const DEFAULT_LABEL_FIELDS: &[&str] = &["label", "name", "title"];
/// Value keys probed after the spec's own `value_field`.
pub const DEFAULT_VALUE_FIELDS: &[&str] = &["value", "id", "uid", "key"];

/// Output of a converter.
#[derive(Debug, Clone, PartialEq)]
pub enum Converted {
	Entries(Vec<LabeledEntry>),
	/// Untyped output; must be an array of entry-shaped objects.
	Json(Value),
}

impl From<Vec<LabeledEntry>> for Converted {
	fn from(entries: Vec<LabeledEntry>) -> Self {
		Self::Entries(entries)
	}
}

impl From<Value> for Converted {
	fn from(value: Value) -> Self {
		Self::Json(value)
	}
}

impl Converted {
	/// Validates the output, yielding the entries or the reason it was discarded.
	pub fn into_entries(self, ty: &str) -> Result<Vec<LabeledEntry>, ConversionWarning> {
		let items = match self {
			Self::Entries(entries) => return Ok(entries),
			Self::Json(Value::Array(items)) => items,
			Self::Json(other) => {
				return Err(ConversionWarning::NotASequence {
					ty: ty.to_owned(),
					got: json_kind(&other),
				});
			}
		};

		items
			.into_iter()
			.enumerate()
			.map(|(position, item)| {
				serde_json::from_value::<LabeledEntry>(item).map_err(|_| ConversionWarning::NotAnEntry {
					ty: ty.to_owned(),
					position,
				})
			})
			.collect()
	}
}

/// Converts a raw response into entries.
pub trait Convert: Send + Sync {
	fn convert(&self, response: &Value, spec: &DictSpec) -> Converted;
}

impl<F> Convert for F
where
	F: Fn(&Value, &DictSpec) -> Converted + Send + Sync,
{
	fn convert(&self, response: &Value, spec: &DictSpec) -> Converted {
		self(response, spec)
	}
}

/// Wraps a converter closure as a shareable capability.
pub fn convert_fn<F>(f: F) -> Arc<dyn Convert>
where
	F: Fn(&Value, &DictSpec) -> Converted + Send + Sync + 'static,
{
	Arc::new(f)
}

/// Heuristic converter used when no layer provides one.
///
/// An array response is a list of records, anything else is a single record.
/// Each record is mapped with [`convert_record`].
#[derive(Debug, Clone)]
pub struct DefaultConvert {
	label_fields: Arc<[String]>,
	value_fields: Arc<[String]>,
}

impl Default for DefaultConvert {
	fn default() -> Self {
		Self::new(
			DEFAULT_LABEL_FIELDS.iter().map(|s| (*s).to_owned()).collect(),
			DEFAULT_VALUE_FIELDS.iter().map(|s| (*s).to_owned()).collect(),
		)
	}
}

impl DefaultConvert {
	pub fn new(label_fields: Vec<String>, value_fields: Vec<String>) -> Self {
		Self {
			label_fields: label_fields.into(),
			value_fields: value_fields.into(),
		}
	}
}

impl Convert for DefaultConvert {
	fn convert(&self, response: &Value, spec: &DictSpec) -> Converted {
		let records = match response {
			Value::Array(items) => items.as_slice(),
			other => std::slice::from_ref(other),
		};

		let entries = records
			.iter()
			.enumerate()
			.filter_map(|(position, record)| {
				let entry = convert_record(record, spec, &self.label_fields, &self.value_fields);
				if entry.is_none() {
					let warning = ConversionWarning::MissingValue {
						ty: spec.ty.clone(),
						position,
					};
					tracing::warn!(dict = %spec.ty, position, "{warning}");
				}
				entry
			})
			.collect();

		Converted::Entries(entries)
	}
}

/// Maps one raw record into an entry using the field heuristic.
///
/// The label is read from the first present key among the spec's
/// `label_field` and `label_fields`; the value likewise from `value_field`
/// and `value_fields`. Returns `None` when no usable value is present. A
/// missing label becomes the empty string.
pub fn convert_record(record: &Value, spec: &DictSpec, label_fields: &[String], value_fields: &[String]) -> Option<LabeledEntry> {
	let obj = record.as_object()?;

	let value_key = determine_field(obj, spec.value_field.as_deref(), value_fields)?;
	let value = Code::from_json(&obj[value_key])?;

	let label = determine_field(obj, spec.label_field.as_deref(), label_fields)
		.map(|key| render_label(&obj[key]))
		.unwrap_or_default();

	Some(LabeledEntry::new(label, value, record.clone()))
}

fn determine_field<'a>(obj: &serde_json::Map<String, Value>, preferred: Option<&'a str>, fallbacks: &'a [String]) -> Option<&'a str> {
	preferred
		.into_iter()
		.chain(fallbacks.iter().map(String::as_str))
		.find(|key| obj.contains_key(*key))
}

fn render_label(value: &Value) -> String {
	match value {
		Value::String(s) => s.clone(),
		Value::Null => String::new(),
		other => other.to_string(),
	}
}

fn json_kind(value: &Value) -> &'static str {
	match value {
		Value::Null => "null",
		Value::Bool(_) => "bool",
		Value::Number(_) => "number",
		Value::String(_) => "string",
		Value::Array(_) => "array",
		Value::Object(_) => "object",
	}
}
