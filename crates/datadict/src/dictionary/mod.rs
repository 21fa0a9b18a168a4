//! Per-type dictionary state machine.
//!
//! A [`Dictionary`] moves through `Empty -> Loading -> Ready -> Loading -> ...`.
//! Loads run on a spawned task and publish a whole [`Snapshot`] at once, so
//! readers never observe a partially replaced cache.
//!
//! # In-flight loads
//!
//! At most one load exists at a time. `load`, `reload` and `wait` issued while
//! a load is running join it and receive the same outcome; a reload does not
//! cancel or restart the running load. A failed load leaves the previous
//! snapshot in place and its error is reported to every joined caller and to
//! later `wait` calls until the next successful load.

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use arc_swap::ArcSwap;
use futures::FutureExt;
use parking_lot::Mutex;
use tokio::sync::watch;

use crate::context::{ContextHandle, lookup_ancestor};
use crate::entry::{Code, LabeledEntry};
use crate::error::{DictError, Result};
use crate::spawn::spawn_load;
use crate::spec::DictSpec;

mod snapshot;

pub use snapshot::Snapshot;

#[cfg(test)]
mod tests;

type LoadOutcome = Result<Arc<Snapshot>>;

/// Observable loading status, derived from the in-flight slot and generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DictStatus {
	/// Never loaded.
	Empty,
	/// A fetch or ancestor wait is in flight.
	Loading,
	/// At least one generation has been published.
	Ready,
}

struct InFlight {
	attempt: u64,
	done: watch::Receiver<Option<LoadOutcome>>,
}

#[derive(Default)]
struct LoadState {
	in_flight: Option<InFlight>,
	last_error: Option<DictError>,
	attempts: u64,
}

/// One named dictionary owned by a [`DictionaryRegistry`](crate::DictionaryRegistry).
pub struct Dictionary {
	spec: DictSpec,
	/// Enclosing context searched by ancestor lookup.
	scope: Option<Arc<dyn ContextHandle>>,
	snap: ArcSwap<Snapshot>,
	state: Mutex<LoadState>,
	version: watch::Sender<u64>,
}

impl fmt::Debug for Dictionary {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Dictionary")
			.field("ty", &self.spec.ty)
			.field("status", &self.status())
			.field("generation", &self.generation())
			.finish_non_exhaustive()
	}
}

impl Dictionary {
	pub(crate) fn new(spec: DictSpec, scope: Option<Arc<dyn ContextHandle>>) -> Arc<Self> {
		let (version, _) = watch::channel(0);
		Arc::new(Self {
			spec,
			scope,
			snap: ArcSwap::from_pointee(Snapshot::default()),
			state: Mutex::new(LoadState::default()),
			version,
		})
	}

	/// Resolved specification this dictionary loads with.
	pub fn spec(&self) -> &DictSpec {
		&self.spec
	}

	/// Dictionary type name.
	pub fn ty(&self) -> &str {
		&self.spec.ty
	}

	/// Current loading status.
	pub fn status(&self) -> DictStatus {
		if self.state.lock().in_flight.is_some() {
			DictStatus::Loading
		} else if self.generation() > 0 {
			DictStatus::Ready
		} else {
			DictStatus::Empty
		}
	}

	/// Generation of the published snapshot; 0 until the first successful load.
	pub fn generation(&self) -> u64 {
		self.snap.load().generation()
	}

	/// Current snapshot. Never blocks and never triggers a load.
	pub fn snapshot(&self) -> Arc<Snapshot> {
		self.snap.load_full()
	}

	/// Label bound to `value` in the current snapshot.
	pub fn label(&self, value: &Code) -> Option<String> {
		self.snap.load().label(value).map(str::to_owned)
	}

	/// Entry keyed by `value` in the current snapshot.
	pub fn entry(&self, value: &Code) -> Option<Arc<LabeledEntry>> {
		self.snap.load().entry(value).cloned()
	}

	/// Receiver tracking the generation, for hosts that bind it to their own observers.
	pub fn subscribe(&self) -> watch::Receiver<u64> {
		self.version.subscribe()
	}

	/// Error of the most recent load attempt, if it failed.
	pub fn last_error(&self) -> Option<DictError> {
		self.state.lock().last_error.clone()
	}

	/// Starts the initial load unless the dictionary is lazy. Does not wait for it.
	pub fn init(self: &Arc<Self>) {
		if self.spec.lazy {
			tracing::debug!(dict = %self.spec.ty, "dict.init.lazy");
			return;
		}
		let _ = self.begin_load();
	}

	/// Loads the dictionary, joining a load already in flight.
	pub async fn load(self: &Arc<Self>) -> Result<Arc<Snapshot>> {
		let done = self.begin_load();
		self.await_outcome(done).await
	}

	/// Reloads the dictionary.
	///
	/// A reload issued while a load is in flight joins that load rather than
	/// starting a second fetch.
	pub async fn reload(self: &Arc<Self>) -> Result<Arc<Snapshot>> {
		self.load().await
	}

	/// Waits for the in-flight load, if any, and returns the resulting snapshot.
	///
	/// With nothing in flight this resolves immediately with the current
	/// snapshot, or with the error of the most recent attempt if it failed.
	pub async fn wait(&self) -> Result<Arc<Snapshot>> {
		let done = {
			let state = self.state.lock();
			match (&state.in_flight, &state.last_error) {
				(Some(in_flight), _) => in_flight.done.clone(),
				(None, Some(err)) => return Err(err.clone()),
				(None, None) => return Ok(self.snapshot()),
			}
		};
		self.await_outcome(done).await
	}

	/// Rebinds the label of one entry without a reload.
	///
	/// The entry's value and raw record are kept and the generation is not
	/// bumped. Returns `false` if no entry has that value.
	pub fn rebind_label(&self, value: &Code, label: impl Into<String>) -> bool {
		if self.snap.load().entry(value).is_none() {
			return false;
		}
		let label = label.into();
		let mut rebound = false;
		self.snap.rcu(|cur| {
			let mut next = Snapshot::clone(cur);
			rebound = next.rebind_label(value, &label);
			next
		});
		rebound
	}

	fn begin_load(self: &Arc<Self>) -> watch::Receiver<Option<LoadOutcome>> {
		let (tx, done, attempt) = {
			let mut state = self.state.lock();
			if let Some(in_flight) = &state.in_flight {
				tracing::debug!(dict = %self.spec.ty, attempt = in_flight.attempt, "dict.load.join");
				return in_flight.done.clone();
			}
			state.attempts += 1;
			let attempt = state.attempts;
			let (tx, done) = watch::channel(None);
			state.in_flight = Some(InFlight {
				attempt,
				done: done.clone(),
			});
			(tx, done, attempt)
		};

		tracing::debug!(dict = %self.spec.ty, attempt, "dict.load.start");
		// Built outside the task so an unpolled, dropped task still releases the slot.
		let guard = LoadGuard {
			dict: Arc::clone(self),
			attempt,
			tx: Some(tx),
		};
		spawn_load(&self.spec.ty, async move {
			let outcome = AssertUnwindSafe(guard.dict.run_load())
				.catch_unwind()
				.await
				.unwrap_or_else(|_| Err(guard.dict.join_error("load task panicked")));
			guard.complete(outcome);
		});
		done
	}

	fn join_error(&self, message: &str) -> DictError {
		DictError::Join {
			ty: self.spec.ty.clone(),
			message: message.to_owned(),
		}
	}

	async fn run_load(&self) -> LoadOutcome {
		let ty = &self.spec.ty;

		if self.spec.lookup_ancestors
			&& let Some(ancestor) = lookup_ancestor(self.scope.as_deref(), ty)
		{
			// A failed ancestor reload leaves its last good generation readable.
			let inherited = match ancestor.wait().await {
				Ok(snap) => snap,
				Err(err) => {
					let snap = ancestor.snapshot();
					if snap.generation() == 0 {
						return Err(err);
					}
					tracing::debug!(dict = %ty, error = %err, "dict.load.inherit_stale");
					snap
				}
			};
			if inherited.generation() > 0 {
				tracing::debug!(dict = %ty, ancestor_generation = inherited.generation(), "dict.load.inherit");
				return Ok(self.commit(inherited.entries().iter().cloned()));
			}
			tracing::debug!(dict = %ty, "dict.load.ancestor_empty");
		}

		let response = self
			.spec
			.fetch
			.fetch(&self.spec)
			.await
			.map_err(|source| DictError::Fetch {
				ty: ty.clone(),
				source: Arc::from(source),
			})?;

		let entries = match self.spec.convert.convert(&response, &self.spec).into_entries(ty) {
			Ok(entries) => entries,
			Err(warning) => {
				tracing::warn!(dict = %ty, "{warning}");
				Vec::new()
			}
		};

		Ok(self.commit(entries.into_iter().map(Arc::new)))
	}

	/// Publishes the next generation.
	fn commit(&self, entries: impl IntoIterator<Item = Arc<LabeledEntry>>) -> Arc<Snapshot> {
		let generation = self.generation() + 1;
		let next = Arc::new(Snapshot::build(&self.spec.ty, generation, entries));
		self.snap.store(Arc::clone(&next));
		self.version.send_replace(generation);
		tracing::debug!(dict = %self.spec.ty, generation, entries = next.len(), "dict.load.ready");
		next
	}

	fn finish(&self, attempt: u64, outcome: LoadOutcome, tx: watch::Sender<Option<LoadOutcome>>) {
		{
			let mut state = self.state.lock();
			if state.in_flight.as_ref().is_some_and(|f| f.attempt == attempt) {
				state.in_flight = None;
			}
			match &outcome {
				Ok(_) => state.last_error = None,
				Err(err) => {
					tracing::debug!(dict = %self.spec.ty, attempt, error = %err, "dict.load.failed");
					state.last_error = Some(err.clone());
				}
			}
		}
		tx.send_replace(Some(outcome));
	}

	async fn await_outcome(&self, mut done: watch::Receiver<Option<LoadOutcome>>) -> LoadOutcome {
		let outcome = done.wait_for(Option::is_some).await.map(|outcome| outcome.clone());
		match outcome {
			Ok(Some(outcome)) => outcome,
			_ => Err(self.join_error("load task dropped before reporting")),
		}
	}
}

/// Owns the completion side of one load attempt.
///
/// Dropping it without [`complete`](Self::complete), as happens when the
/// runtime shuts down under a pending load, reports a `Join` error and frees
/// the in-flight slot.
struct LoadGuard {
	dict: Arc<Dictionary>,
	attempt: u64,
	tx: Option<watch::Sender<Option<LoadOutcome>>>,
}

impl LoadGuard {
	fn complete(mut self, outcome: LoadOutcome) {
		if let Some(tx) = self.tx.take() {
			self.dict.finish(self.attempt, outcome, tx);
		}
	}
}

impl Drop for LoadGuard {
	fn drop(&mut self) {
		if let Some(tx) = self.tx.take() {
			let err = self.dict.join_error("load task dropped before completing");
			self.dict.finish(self.attempt, Err(err), tx);
		}
	}
}
