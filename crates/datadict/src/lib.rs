//! Named, lazily loaded lookup tables shared through a tree of contexts.
//!
//! A *dictionary* maps stable codes to human-readable labels, keeping the raw
//! record each entry came from. Dictionaries are fetched through an injected
//! [`Fetch`] capability, converted into [`LabeledEntry`] records by a
//! [`Convert`] capability, and cached per consuming context.
//!
//! # Pieces
//!
//! - [`DictSpec`] - a dictionary's resolved specification, layered from the
//!   [`DictConfig`] defaults, per-type overrides and the call-site request
//! - [`Dictionary`] - the loading state machine and its published [`Snapshot`]
//! - [`DictionaryRegistry`] - the dictionaries owned by one context
//! - [`ContextHandle`] - the host's context tree, used for ancestor lookup
//!
//! # Example
//!
//! ```ignore
//! let root = Context::with_dicts("root", None);
//! let dicts = root.dicts().unwrap();
//! dicts.initialize(["status"]).await;
//! let label = dicts.label("status", &Code::from(1));
//! ```

pub mod config;
pub mod context;
pub mod convert;
pub mod dictionary;
pub mod entry;
pub mod error;
pub mod fetch;
pub mod merge;
pub mod registry;
pub mod spec;

mod spawn;

pub use config::{DictConfig, RegistryHooks};
pub use context::{Context, ContextHandle, lookup_ancestor};
pub use convert::{Convert, Converted, DefaultConvert, convert_fn, convert_record};
pub use dictionary::{DictStatus, Dictionary, Snapshot};
pub use entry::{Code, LabeledEntry};
pub use error::{ConfigError, ConversionWarning, DictError, Result};
pub use fetch::{BoxError, DefaultFetch, Fetch, fetch_async, fetch_fn};
pub use registry::{DictionaryRegistry, InitReport};
pub use spec::{DictOptions, DictRequest, DictSpec};
