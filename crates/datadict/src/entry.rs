//! Dictionary entries and their lookup codes.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lookup key of a dictionary entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Code {
	Int(i64),
	/// Unsigned integers beyond `i64::MAX`.
	UInt(u64),
	Text(String),
	Bool(bool),
}

impl Code {
	/// Converts a raw JSON scalar into a code.
	///
	/// Integers that fit `i64` become [`Code::Int`], larger unsigned ones
	/// [`Code::UInt`]. Floats, nulls and structured values are rejected.
	pub fn from_json(value: &Value) -> Option<Self> {
		match value {
			Value::Number(n) => n.as_i64().map(Self::Int).or_else(|| n.as_u64().map(Self::UInt)),
			Value::String(s) => Some(Self::Text(s.clone())),
			Value::Bool(b) => Some(Self::Bool(*b)),
			_ => None,
		}
	}
}

impl fmt::Display for Code {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Int(i) => write!(f, "{i}"),
			Self::UInt(u) => write!(f, "{u}"),
			Self::Text(s) => f.write_str(s),
			Self::Bool(b) => write!(f, "{b}"),
		}
	}
}

impl From<i64> for Code {
	fn from(value: i64) -> Self {
		Self::Int(value)
	}
}

impl From<u64> for Code {
	fn from(value: u64) -> Self {
		i64::try_from(value).map_or(Self::UInt(value), Self::Int)
	}
}

impl From<i32> for Code {
	fn from(value: i32) -> Self {
		Self::Int(value.into())
	}
}

impl From<bool> for Code {
	fn from(value: bool) -> Self {
		Self::Bool(value)
	}
}

impl From<&str> for Code {
	fn from(value: &str) -> Self {
		Self::Text(value.to_owned())
	}
}

impl From<String> for Code {
	fn from(value: String) -> Self {
		Self::Text(value)
	}
}

/// One code-to-label pair plus the record it was extracted from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LabeledEntry {
	pub label: String,
	pub value: Code,
	#[serde(default)]
	pub raw: Value,
}

impl LabeledEntry {
	pub fn new(label: impl Into<String>, value: impl Into<Code>, raw: Value) -> Self {
		Self {
			label: label.into(),
			value: value.into(),
			raw,
		}
	}
}
