//! Injected fetch capability.
//!
//! A [`Fetch`] produces the raw response for one dictionary. Synchronous
//! closures are normalized into the async interface with [`fetch_fn`], async
//! ones are adapted with [`fetch_async`].

use std::error::Error as StdError;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::spec::DictSpec;

/// Error type returned by fetchers.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Produces the raw response of a dictionary.
#[async_trait]
pub trait Fetch: Send + Sync {
	async fn fetch(&self, spec: &DictSpec) -> Result<Value, BoxError>;
}

/// Fetcher used when no layer provides one: logs the request and yields no records.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultFetch;

#[async_trait]
impl Fetch for DefaultFetch {
	async fn fetch(&self, spec: &DictSpec) -> Result<Value, BoxError> {
		tracing::info!(dict = %spec.ty, "load dict {}", spec.ty);
		Ok(Value::Array(Vec::new()))
	}
}

/// Adapter for synchronous fetch closures.
pub struct FnFetch<F>(F);

#[async_trait]
impl<F> Fetch for FnFetch<F>
where
	F: Fn(&DictSpec) -> Result<Value, BoxError> + Send + Sync,
{
	async fn fetch(&self, spec: &DictSpec) -> Result<Value, BoxError> {
		(self.0)(spec)
	}
}

/// Adapter for closures returning a future.
///
/// The closure receives an owned spec so the returned future can be `'static`.
pub struct AsyncFnFetch<F>(F);

#[async_trait]
impl<F, Fut> Fetch for AsyncFnFetch<F>
where
	F: Fn(DictSpec) -> Fut + Send + Sync,
	Fut: Future<Output = Result<Value, BoxError>> + Send + 'static,
{
	async fn fetch(&self, spec: &DictSpec) -> Result<Value, BoxError> {
		(self.0)(spec.clone()).await
	}
}

/// Wraps a synchronous closure as a shareable fetcher.
pub fn fetch_fn<F>(f: F) -> Arc<dyn Fetch>
where
	F: Fn(&DictSpec) -> Result<Value, BoxError> + Send + Sync + 'static,
{
	Arc::new(FnFetch(f))
}

/// Wraps an async closure as a shareable fetcher.
pub fn fetch_async<F, Fut>(f: F) -> Arc<dyn Fetch>
where
	F: Fn(DictSpec) -> Fut + Send + Sync + 'static,
	Fut: Future<Output = Result<Value, BoxError>> + Send + 'static,
{
	Arc::new(AsyncFnFetch(f))
}
