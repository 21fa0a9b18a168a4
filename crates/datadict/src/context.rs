//! Consuming contexts and ancestor resolution.
//!
//! A host arranges its consumers (components, views, request scopes) in a
//! tree. Each node is a [`ContextHandle`] that knows its parent and may own a
//! [`DictionaryRegistry`]. Dictionaries that opt into ancestor lookup walk this
//! chain outward to reuse an enclosing context's dictionary of the same type.

use std::fmt;
use std::sync::Arc;

use crate::config::{self, DictConfig};
use crate::dictionary::Dictionary;
use crate::registry::DictionaryRegistry;

/// Host-side view of one node in the consuming-context tree.
pub trait ContextHandle: Send + Sync {
	/// Enclosing context, or `None` at the root.
	fn parent(&self) -> Option<&dyn ContextHandle>;

	/// Registry owned by this context, if it declared dictionaries.
	fn registry(&self) -> Option<&DictionaryRegistry>;
}

/// Walks from `start` outward and returns the first existing dictionary of type `ty`.
///
/// Only dictionaries an ancestor already registered are considered; nothing
/// is created on the way.
pub fn lookup_ancestor(start: Option<&dyn ContextHandle>, ty: &str) -> Option<Arc<Dictionary>> {
	let mut cursor = start;
	while let Some(ctx) = cursor {
		if let Some(dict) = ctx.registry().and_then(|registry| registry.get(ty)) {
			return Some(dict);
		}
		cursor = ctx.parent();
	}
	None
}

/// Reference [`ContextHandle`] built from explicit parent links.
///
/// Each context receives its parent at construction; a context with
/// dictionaries owns a registry whose ancestor scope is that parent.
pub struct Context {
	name: String,
	parent: Option<Arc<Context>>,
	registry: Option<DictionaryRegistry>,
}

impl fmt::Debug for Context {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Context")
			.field("name", &self.name)
			.field("parent", &self.parent.as_ref().map(|p| p.name.as_str()))
			.field("registry", &self.registry)
			.finish()
	}
}

impl Context {
	/// Creates a context without dictionaries.
	pub fn new(name: impl Into<String>, parent: Option<&Arc<Context>>) -> Arc<Self> {
		Arc::new(Self {
			name: name.into(),
			parent: parent.cloned(),
			registry: None,
		})
	}

	/// Creates a context owning a registry bound to the installed configuration.
	pub fn with_dicts(name: impl Into<String>, parent: Option<&Arc<Context>>) -> Arc<Self> {
		Self::with_config(name, parent, config::current())
	}

	/// Creates a context owning a registry bound to `config`.
	pub fn with_config(name: impl Into<String>, parent: Option<&Arc<Context>>, config: Arc<DictConfig>) -> Arc<Self> {
		let scope = parent.map(|p| Arc::clone(p) as Arc<dyn ContextHandle>);
		Arc::new(Self {
			name: name.into(),
			parent: parent.cloned(),
			registry: Some(DictionaryRegistry::new(scope, config)),
		})
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn parent_context(&self) -> Option<&Arc<Context>> {
		self.parent.as_ref()
	}

	/// Registry of this context, if it declared dictionaries.
	pub fn dicts(&self) -> Option<&DictionaryRegistry> {
		self.registry.as_ref()
	}
}

impl ContextHandle for Context {
	fn parent(&self) -> Option<&dyn ContextHandle> {
		self.parent.as_deref().map(|p| p as &dyn ContextHandle)
	}

	fn registry(&self) -> Option<&DictionaryRegistry> {
		self.registry.as_ref()
	}
}
