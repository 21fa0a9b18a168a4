//! Dictionary specifications and their layered resolution.
//!
//! A [`DictSpec`] is resolved from three [`DictOptions`] layers, later layers
//! winning:
//!
//! 1. The global defaults of the [`DictConfig`]
//! 2. The per-type override registered under the requested type
//! 3. The inline options carried by the [`DictRequest`]
//!
//! Scalar options are replaced; the free-form `extra` object is merged
//! recursively.

use std::fmt;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::config::DictConfig;
use crate::convert::{Convert, DefaultConvert};
use crate::error::{DictError, Result};
use crate::fetch::{DefaultFetch, Fetch};
use crate::merge::merge_map;

/// One layer of dictionary options. Unset fields defer to lower layers.
#[derive(Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DictOptions {
	#[serde(skip)]
	pub fetch: Option<Arc<dyn Fetch>>,
	#[serde(skip)]
	pub convert: Option<Arc<dyn Convert>>,
	pub label_field: Option<String>,
	pub value_field: Option<String>,
	pub lazy: Option<bool>,
	pub lookup_ancestors: Option<bool>,
	/// Free-form parameters for the fetcher, merged recursively across layers.
	pub extra: Map<String, Value>,
}

impl fmt::Debug for DictOptions {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("DictOptions")
			.field("fetch", &self.fetch.as_ref().map(|_| "<fetch>"))
			.field("convert", &self.convert.as_ref().map(|_| "<convert>"))
			.field("label_field", &self.label_field)
			.field("value_field", &self.value_field)
			.field("lazy", &self.lazy)
			.field("lookup_ancestors", &self.lookup_ancestors)
			.field("extra", &self.extra)
			.finish()
	}
}

impl DictOptions {
	/// Applies `over` on top of `self`.
	pub fn layer(&mut self, over: &DictOptions) {
		if let Some(fetch) = &over.fetch {
			self.fetch = Some(Arc::clone(fetch));
		}
		if let Some(convert) = &over.convert {
			self.convert = Some(Arc::clone(convert));
		}
		if let Some(field) = &over.label_field {
			self.label_field = Some(field.clone());
		}
		if let Some(field) = &over.value_field {
			self.value_field = Some(field.clone());
		}
		if let Some(lazy) = over.lazy {
			self.lazy = Some(lazy);
		}
		if let Some(lookup) = over.lookup_ancestors {
			self.lookup_ancestors = Some(lookup);
		}
		merge_map(&mut self.extra, &over.extra);
	}

	pub fn fetch(mut self, fetch: Arc<dyn Fetch>) -> Self {
		self.fetch = Some(fetch);
		self
	}

	pub fn convert(mut self, convert: Arc<dyn Convert>) -> Self {
		self.convert = Some(convert);
		self
	}

	pub fn label_field(mut self, field: impl Into<String>) -> Self {
		self.label_field = Some(field.into());
		self
	}

	pub fn value_field(mut self, field: impl Into<String>) -> Self {
		self.value_field = Some(field.into());
		self
	}

	pub fn lazy(mut self, lazy: bool) -> Self {
		self.lazy = Some(lazy);
		self
	}

	pub fn lookup_ancestors(mut self, lookup: bool) -> Self {
		self.lookup_ancestors = Some(lookup);
		self
	}

	pub fn extra(mut self, key: impl Into<String>, value: Value) -> Self {
		self.extra.insert(key.into(), value);
		self
	}
}

/// A request for one dictionary: a bare type name or a type plus inline options.
#[derive(Debug, Clone, Default)]
pub struct DictRequest {
	pub ty: Option<String>,
	pub options: DictOptions,
}

impl DictRequest {
	pub fn new(ty: impl Into<String>) -> Self {
		Self {
			ty: Some(ty.into()),
			options: DictOptions::default(),
		}
	}

	/// Request carrying only options; resolves only if a type is set later.
	pub fn untyped(options: DictOptions) -> Self {
		Self { ty: None, options }
	}

	pub fn with(mut self, f: impl FnOnce(DictOptions) -> DictOptions) -> Self {
		self.options = f(self.options);
		self
	}
}

impl From<&str> for DictRequest {
	fn from(ty: &str) -> Self {
		Self::new(ty)
	}
}

impl From<String> for DictRequest {
	fn from(ty: String) -> Self {
		Self::new(ty)
	}
}

impl From<&String> for DictRequest {
	fn from(ty: &String) -> Self {
		Self::new(ty.as_str())
	}
}

/// Fully resolved specification of one dictionary.
#[derive(Clone)]
pub struct DictSpec {
	pub ty: String,
	pub fetch: Arc<dyn Fetch>,
	pub convert: Arc<dyn Convert>,
	pub label_field: Option<String>,
	pub value_field: Option<String>,
	pub lazy: bool,
	pub lookup_ancestors: bool,
	pub extra: Map<String, Value>,
}

impl fmt::Debug for DictSpec {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("DictSpec")
			.field("ty", &self.ty)
			.field("label_field", &self.label_field)
			.field("value_field", &self.value_field)
			.field("lazy", &self.lazy)
			.field("lookup_ancestors", &self.lookup_ancestors)
			.field("extra", &self.extra)
			.finish_non_exhaustive()
	}
}

impl DictSpec {
	/// Spec built from the built-in defaults alone; the base layer of [`resolve`](Self::resolve).
	pub fn for_type(ty: impl Into<String>) -> Self {
		Self {
			ty: ty.into(),
			fetch: Arc::new(DefaultFetch),
			convert: Arc::new(DefaultConvert::default()),
			label_field: Some("label".to_owned()),
			value_field: Some("value".to_owned()),
			lazy: false,
			lookup_ancestors: false,
			extra: Map::new(),
		}
	}

	/// Resolves a request against the layered configuration.
	///
	/// Fails with [`DictError::Configuration`] when no non-empty type can be
	/// determined.
	pub fn resolve(request: &DictRequest, config: &DictConfig) -> Result<Self> {
		let ty = match request.ty.as_deref() {
			Some(ty) if !ty.is_empty() => ty,
			Some(_) => return Err(DictError::Configuration("dictionary type must not be empty".into())),
			None => return Err(DictError::Configuration("dictionary request carries no type".into())),
		};

		let mut opts = config.defaults.clone();
		if let Some(type_opts) = config.types.get(ty) {
			opts.layer(type_opts);
		}
		opts.layer(&request.options);

		let mut spec = Self::for_type(ty);
		if let Some(fetch) = opts.fetch {
			spec.fetch = fetch;
		}
		spec.convert = match opts.convert {
			Some(convert) => convert,
			None => Arc::new(config.default_converter()),
		};
		if opts.label_field.is_some() {
			spec.label_field = opts.label_field;
		}
		if opts.value_field.is_some() {
			spec.value_field = opts.value_field;
		}
		spec.lazy = opts.lazy.unwrap_or(spec.lazy);
		spec.lookup_ancestors = opts.lookup_ancestors.unwrap_or(spec.lookup_ancestors);
		spec.extra = opts.extra;
		Ok(spec)
	}
}
