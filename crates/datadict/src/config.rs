//! Process-wide dictionary configuration.
//!
//! [`DictConfig`] is the layered default table consulted by spec resolution:
//! global defaults, per-type overrides, the field-heuristic candidate lists
//! and registry lifecycle hooks. Scalar parts can be loaded from TOML;
//! fetchers and converters are attached in code.
//!
//! Registries capture [`current`] at construction, so installing a new config
//! only affects registries created afterwards.

use std::fmt;
use std::path::Path;
use std::sync::{Arc, LazyLock};

use arc_swap::ArcSwap;
use rustc_hash::FxHashMap as HashMap;
use serde::Deserialize;

use crate::convert::{DEFAULT_LABEL_FIELDS, DEFAULT_VALUE_FIELDS, DefaultConvert};
use crate::error::ConfigError;
use crate::registry::{DictionaryRegistry, InitReport};
use crate::spec::DictOptions;

/// Invoked when a registry starts its first initialization round.
pub type CreatedHook = Arc<dyn Fn(&DictionaryRegistry) + Send + Sync>;
/// Invoked when a registry's initialization barrier completes.
pub type ReadyHook = Arc<dyn Fn(&DictionaryRegistry, &InitReport) + Send + Sync>;

#[derive(Clone, Default)]
pub struct RegistryHooks {
	pub on_created: Option<CreatedHook>,
	pub on_ready: Option<ReadyHook>,
}

impl fmt::Debug for RegistryHooks {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("RegistryHooks")
			.field("on_created", &self.on_created.is_some())
			.field("on_ready", &self.on_ready.is_some())
			.finish()
	}
}

/// Layered default table for dictionary resolution.
///
/// Options left unset in every layer fall back to the built-ins: the
/// [`DefaultFetch`](crate::fetch::DefaultFetch) fetcher, the heuristic
/// [`DefaultConvert`] converter, `label`/`value` fields, eager loading and no
/// ancestor lookup.
#[derive(Debug, Clone, Default)]
pub struct DictConfig {
	pub defaults: DictOptions,
	pub types: HashMap<String, DictOptions>,
	/// Label keys probed by the default converter after the spec's `label_field`.
	pub label_fields: Option<Vec<String>>,
	/// Value keys probed by the default converter after the spec's `value_field`.
	pub value_fields: Option<Vec<String>>,
	pub hooks: RegistryHooks,
}

/// Serialized form of the scalar parts of a [`DictConfig`].
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
	label_fields: Option<Vec<String>>,
	value_fields: Option<Vec<String>>,
	defaults: DictOptions,
	types: HashMap<String, DictOptions>,
}

impl DictConfig {
	pub fn new() -> Self {
		Self::default()
	}

	/// Parses a TOML document and layers it over the built-in defaults.
	pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
		let file: ConfigFile = toml::from_str(input)?;
		let mut config = Self::default();
		config.apply_file(file);
		Ok(config)
	}

	/// Reads and parses a TOML configuration file.
	pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let path = path.as_ref();
		let input = std::fs::read_to_string(path).map_err(|error| ConfigError::Io {
			path: path.to_path_buf(),
			error,
		})?;
		Self::from_toml_str(&input)
	}

	fn apply_file(&mut self, file: ConfigFile) {
		if file.label_fields.is_some() {
			self.label_fields = file.label_fields;
		}
		if file.value_fields.is_some() {
			self.value_fields = file.value_fields;
		}
		self.defaults.layer(&file.defaults);
		for (ty, opts) in &file.types {
			self.types.entry(ty.clone()).or_default().layer(opts);
		}
	}

	/// Registers (or layers onto) the override for one type.
	pub fn with_type(mut self, ty: impl Into<String>, options: DictOptions) -> Self {
		self.types.entry(ty.into()).or_default().layer(&options);
		self
	}

	pub fn with_defaults(mut self, options: DictOptions) -> Self {
		self.defaults.layer(&options);
		self
	}

	pub fn on_created(mut self, hook: impl Fn(&DictionaryRegistry) + Send + Sync + 'static) -> Self {
		self.hooks.on_created = Some(Arc::new(hook));
		self
	}

	pub fn on_ready(mut self, hook: impl Fn(&DictionaryRegistry, &InitReport) + Send + Sync + 'static) -> Self {
		self.hooks.on_ready = Some(Arc::new(hook));
		self
	}

	pub fn label_fields(mut self, fields: impl IntoIterator<Item = impl Into<String>>) -> Self {
		self.label_fields = Some(fields.into_iter().map(Into::into).collect());
		self
	}

	pub fn value_fields(mut self, fields: impl IntoIterator<Item = impl Into<String>>) -> Self {
		self.value_fields = Some(fields.into_iter().map(Into::into).collect());
		self
	}

	/// Builds the heuristic converter from the configured candidate lists.
	pub fn default_converter(&self) -> DefaultConvert {
		let labels = self
			.label_fields
			.clone()
			.unwrap_or_else(|| DEFAULT_LABEL_FIELDS.iter().map(|s| (*s).to_owned()).collect());
		let values = self
			.value_fields
			.clone()
			.unwrap_or_else(|| DEFAULT_VALUE_FIELDS.iter().map(|s| (*s).to_owned()).collect());
		DefaultConvert::new(labels, values)
	}

	/// Layers `other` on top of `self`.
	///
	/// Option layers merge as in spec resolution; candidate lists and hooks
	/// set on `other` replace those on `self`.
	pub fn merge(&mut self, other: &DictConfig) {
		self.defaults.layer(&other.defaults);
		for (ty, opts) in &other.types {
			self.types.entry(ty.clone()).or_default().layer(opts);
		}
		if other.label_fields.is_some() {
			self.label_fields = other.label_fields.clone();
		}
		if other.value_fields.is_some() {
			self.value_fields = other.value_fields.clone();
		}
		if let Some(hook) = &other.hooks.on_created {
			self.hooks.on_created = Some(Arc::clone(hook));
		}
		if let Some(hook) = &other.hooks.on_ready {
			self.hooks.on_ready = Some(Arc::clone(hook));
		}
	}
}

static GLOBAL: LazyLock<ArcSwap<DictConfig>> = LazyLock::new(|| ArcSwap::from_pointee(DictConfig::default()));

/// Returns the installed process-wide configuration.
pub fn current() -> Arc<DictConfig> {
	GLOBAL.load_full()
}

/// Replaces the process-wide configuration.
pub fn install(config: DictConfig) {
	GLOBAL.store(Arc::new(config));
}

/// Merges `config` into the process-wide configuration.
pub fn merge_global(config: &DictConfig) {
	GLOBAL.rcu(|cur| {
		let mut next = DictConfig::clone(cur);
		next.merge(config);
		next
	});
}
