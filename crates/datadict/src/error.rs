//! Error types for dictionary resolution and loading.

use std::error::Error as StdError;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

/// Boxed error produced by an injected fetch capability.
pub type FetchSource = Arc<dyn StdError + Send + Sync + 'static>;

/// Errors surfaced by registries and dictionaries.
///
/// Cloneable so a single load outcome can be handed to every caller that
/// joined the same in-flight load.
#[derive(Debug, Clone, Error)]
pub enum DictError {
	/// A dictionary request did not name a type.
	#[error("invalid dictionary configuration: {0}")]
	Configuration(String),

	/// `wait`/`reload` was asked for a type that was never registered.
	#[error("the dict of \"{ty}\" type was not found")]
	NotFound {
		/// Requested dictionary type.
		ty: String,
	},

	/// The fetch capability failed.
	#[error("failed to fetch dict \"{ty}\": {source}")]
	Fetch {
		/// Dictionary type being loaded.
		ty: String,
		/// Error returned by the fetcher.
		#[source]
		source: FetchSource,
	},

	/// The spawned load task did not run to completion.
	#[error("load task for dict \"{ty}\" did not complete: {message}")]
	Join {
		/// Dictionary type being loaded.
		ty: String,
		/// Runtime-provided reason.
		message: String,
	},
}

impl DictError {
	/// Wraps a fetcher failure for the given type.
	pub fn fetch(ty: impl Into<String>, source: impl StdError + Send + Sync + 'static) -> Self {
		Self::Fetch {
			ty: ty.into(),
			source: Arc::new(source),
		}
	}

	pub fn not_found(ty: impl Into<String>) -> Self {
		Self::NotFound { ty: ty.into() }
	}

	/// Returns the dictionary type this error concerns, if any.
	pub fn dict_type(&self) -> Option<&str> {
		match self {
			Self::Configuration(_) => None,
			Self::NotFound { ty } | Self::Fetch { ty, .. } | Self::Join { ty, .. } => Some(ty),
		}
	}
}

/// Non-fatal diagnostic for converter output that breaks the entry contract.
///
/// Never returned to callers; the offending load is downgraded to an empty
/// generation and this is logged instead.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConversionWarning {
	#[error("the converter of dict \"{ty}\" must return a sequence of labeled entries, got {got}")]
	NotASequence { ty: String, got: &'static str },

	#[error("element {position} returned by the converter of dict \"{ty}\" is not a labeled entry")]
	NotAnEntry { ty: String, position: usize },

	#[error("record {position} of dict \"{ty}\" has no usable value")]
	MissingValue { ty: String, position: usize },

	#[error("dict \"{ty}\" has a duplicate value {value}; keeping the first occurrence")]
	DuplicateValue { ty: String, value: String },
}

/// Errors that can occur when loading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("TOML parse error: {0}")]
	Toml(#[from] toml::de::Error),

	/// Error reading a configuration file.
	#[error("I/O error reading {path}: {error}")]
	Io {
		/// Path to the file that failed to read.
		path: PathBuf,
		/// The underlying I/O error.
		error: std::io::Error,
	},
}

/// Result type for dictionary operations.
pub type Result<T> = std::result::Result<T, DictError>;
