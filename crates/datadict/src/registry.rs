//! Per-context dictionary container.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::future::join_all;
use indexmap::IndexMap;
use parking_lot::RwLock;

use crate::config::DictConfig;
use crate::context::ContextHandle;
use crate::dictionary::{Dictionary, Snapshot};
use crate::entry::{Code, LabeledEntry};
use crate::error::{DictError, Result};
use crate::spec::{DictRequest, DictSpec};

/// Outcome of one [`DictionaryRegistry::initialize`] round.
#[derive(Debug, Clone, Default)]
pub struct InitReport {
	/// Types that reached a terminal state without error, in request order.
	pub ready: Vec<String>,
	/// Requests that failed to resolve or whose load failed.
	pub failed: Vec<DictError>,
}

impl InitReport {
	/// Whether every request resolved and loaded.
	pub fn is_ok(&self) -> bool {
		self.failed.is_empty()
	}
}

/// The dictionaries owned by one consuming context, keyed by type.
///
/// Dictionaries are never shared by identity across registries; a child that
/// inherits from an ancestor copies the ancestor's entries into its own
/// dictionary.
pub struct DictionaryRegistry {
	/// Enclosing context searched by ancestor lookup.
	scope: Option<Arc<dyn ContextHandle>>,
	config: Arc<DictConfig>,
	dicts: RwLock<IndexMap<String, Arc<Dictionary>>>,
	created_fired: AtomicBool,
}

impl fmt::Debug for DictionaryRegistry {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("DictionaryRegistry")
			.field("types", &self.types())
			.field("has_scope", &self.scope.is_some())
			.finish_non_exhaustive()
	}
}

impl DictionaryRegistry {
	/// Creates an empty registry whose ancestor lookups start at `scope`.
	pub fn new(scope: Option<Arc<dyn ContextHandle>>, config: Arc<DictConfig>) -> Self {
		Self {
			scope,
			config,
			dicts: RwLock::new(IndexMap::new()),
			created_fired: AtomicBool::new(false),
		}
	}

	/// Creates a registry with no enclosing context.
	pub fn detached(config: Arc<DictConfig>) -> Self {
		Self::new(None, config)
	}

	/// Configuration captured when the registry was created.
	pub fn config(&self) -> &Arc<DictConfig> {
		&self.config
	}

	/// Registers every request and waits until each has reached a terminal state.
	///
	/// A failing dictionary does not hold back the others; its error is listed
	/// in the report and stays observable through its own `wait`.
	pub async fn initialize<I>(&self, requests: I) -> InitReport
	where
		I: IntoIterator,
		I::Item: Into<DictRequest>,
	{
		if !self.created_fired.swap(true, Ordering::AcqRel)
			&& let Some(hook) = &self.config.hooks.on_created
		{
			hook(self);
		}

		let mut report = InitReport::default();
		let mut registered = Vec::new();
		for request in requests {
			match self.register(request) {
				Ok(dict) => registered.push(dict),
				Err(err) => {
					tracing::warn!(error = %err, "dict.register.rejected");
					report.failed.push(err);
				}
			}
		}

		let outcomes = join_all(registered.iter().map(|dict| dict.wait())).await;
		for (dict, outcome) in registered.iter().zip(outcomes) {
			match outcome {
				Ok(_) => report.ready.push(dict.ty().to_owned()),
				Err(err) => report.failed.push(err),
			}
		}

		tracing::debug!(ready = report.ready.len(), failed = report.failed.len(), "dict.registry.initialized");
		if let Some(hook) = &self.config.hooks.on_ready {
			hook(self, &report);
		}
		report
	}

	/// Registers one dictionary and starts its initial load.
	///
	/// Idempotent per type: if the type is already registered the existing
	/// dictionary is returned and the request's options are ignored.
	pub fn register(&self, request: impl Into<DictRequest>) -> Result<Arc<Dictionary>> {
		let spec = DictSpec::resolve(&request.into(), &self.config)?;

		let dict = {
			let mut dicts = self.dicts.write();
			if let Some(existing) = dicts.get(&spec.ty) {
				tracing::debug!(dict = %spec.ty, "dict.register.existing");
				return Ok(Arc::clone(existing));
			}
			let dict = Dictionary::new(spec, self.scope.clone());
			dicts.insert(dict.ty().to_owned(), Arc::clone(&dict));
			dict
		};

		tracing::debug!(dict = %dict.ty(), lazy = dict.spec().lazy, "dict.register");
		dict.init();
		Ok(dict)
	}

	/// Dictionary registered under `ty`.
	pub fn get(&self, ty: &str) -> Option<Arc<Dictionary>> {
		self.dicts.read().get(ty).cloned()
	}

	/// Whether `ty` has been registered.
	pub fn contains(&self, ty: &str) -> bool {
		self.dicts.read().contains_key(ty)
	}

	/// Registered types in registration order.
	pub fn types(&self) -> Vec<String> {
		self.dicts.read().keys().cloned().collect()
	}

	/// Number of registered dictionaries.
	pub fn len(&self) -> usize {
		self.dicts.read().len()
	}

	pub fn is_empty(&self) -> bool {
		self.dicts.read().is_empty()
	}

	/// Waits for the dictionary of `ty`; fails with [`DictError::NotFound`] if unregistered.
	pub async fn wait(&self, ty: &str) -> Result<Arc<Snapshot>> {
		let dict = self.get(ty).ok_or_else(|| DictError::not_found(ty))?;
		dict.wait().await
	}

	/// Reloads the dictionary of `ty`; fails with [`DictError::NotFound`] if unregistered.
	pub async fn reload(&self, ty: &str) -> Result<Arc<Snapshot>> {
		let dict = self.get(ty).ok_or_else(|| DictError::not_found(ty))?;
		dict.reload().await
	}

	/// Current snapshot of `ty`.
	pub fn snapshot(&self, ty: &str) -> Option<Arc<Snapshot>> {
		self.get(ty).map(|dict| dict.snapshot())
	}

	/// Label of `value` in the dictionary of `ty`.
	pub fn label(&self, ty: &str, value: &Code) -> Option<String> {
		self.get(ty)?.label(value)
	}

	/// Entry of `value` in the dictionary of `ty`.
	pub fn entry(&self, ty: &str, value: &Code) -> Option<Arc<LabeledEntry>> {
		self.get(ty)?.entry(value)
	}

	/// Entries of `ty` in converter order.
	pub fn entries(&self, ty: &str) -> Option<Vec<Arc<LabeledEntry>>> {
		self.snapshot(ty).map(|snap| snap.entries().to_vec())
	}
}
