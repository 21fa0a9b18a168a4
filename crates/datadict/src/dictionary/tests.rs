use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use tokio::sync::Notify;

use super::*;
use crate::convert::{Converted, convert_fn};
use crate::fetch::{BoxError, fetch_async, fetch_fn};

fn colors() -> Value {
	json!([{ "value": 1, "label": "Red" }, { "value": 2, "label": "Green" }])
}

fn spec_with(ty: &str, f: impl FnOnce(&mut DictSpec)) -> DictSpec {
	let mut spec = DictSpec::for_type(ty);
	f(&mut spec);
	spec
}

fn counting_fetch(response: Value) -> (Arc<dyn crate::fetch::Fetch>, Arc<AtomicUsize>) {
	let calls = Arc::new(AtomicUsize::new(0));
	let counter = Arc::clone(&calls);
	let fetch = fetch_fn(move |_| {
		counter.fetch_add(1, Ordering::SeqCst);
		Ok(response.clone())
	});
	(fetch, calls)
}

/// Fetcher that blocks until released, counting invocations.
fn gated_fetch(response: Value) -> (Arc<dyn crate::fetch::Fetch>, Arc<AtomicUsize>, Arc<Notify>) {
	let calls = Arc::new(AtomicUsize::new(0));
	let gate = Arc::new(Notify::new());
	let counter = Arc::clone(&calls);
	let release = Arc::clone(&gate);
	let fetch = fetch_async(move |_| {
		counter.fetch_add(1, Ordering::SeqCst);
		let release = Arc::clone(&release);
		let response = response.clone();
		async move {
			release.notified().await;
			Ok::<_, BoxError>(response)
		}
	});
	(fetch, calls, gate)
}

#[derive(Debug)]
struct Boom;

impl fmt::Display for Boom {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("boom")
	}
}

impl std::error::Error for Boom {}

#[tokio::test]
async fn load_publishes_first_generation() {
	let (fetch, calls) = counting_fetch(colors());
	let dict = Dictionary::new(spec_with("color", |s| s.fetch = fetch), None);
	assert_eq!(dict.status(), DictStatus::Empty);

	let snap = dict.load().await.unwrap();
	assert_eq!(snap.generation(), 1);
	assert_eq!(snap.len(), 2);
	assert_eq!(snap.label(&Code::Int(1)), Some("Red"));
	assert_eq!(dict.status(), DictStatus::Ready);
	assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn every_reload_bumps_generation_by_one() {
	let (fetch, calls) = counting_fetch(colors());
	let dict = Dictionary::new(spec_with("color", |s| s.fetch = fetch), None);

	for expected in 1..=3 {
		let snap = dict.reload().await.unwrap();
		assert_eq!(snap.generation(), expected);
		assert_eq!(dict.generation(), expected);
	}
	assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn reads_never_bump_generation() {
	let (fetch, _) = counting_fetch(colors());
	let dict = Dictionary::new(spec_with("color", |s| s.fetch = fetch), None);
	dict.load().await.unwrap();

	let _ = dict.snapshot();
	let _ = dict.label(&Code::Int(1));
	let _ = dict.entry(&Code::Int(2));
	let _ = dict.wait().await.unwrap();
	assert_eq!(dict.generation(), 1);
}

#[tokio::test]
async fn concurrent_loads_share_one_fetch() {
	let (fetch, calls, gate) = gated_fetch(colors());
	let dict = Dictionary::new(spec_with("color", |s| s.fetch = fetch), None);

	let mut waiters = Vec::new();
	for _ in 0..8 {
		let dict = Arc::clone(&dict);
		waiters.push(tokio::spawn(async move { dict.load().await }));
	}
	let waiter = {
		let dict = Arc::clone(&dict);
		tokio::spawn(async move { dict.wait().await })
	};

	tokio::time::sleep(Duration::from_millis(20)).await;
	assert_eq!(dict.status(), DictStatus::Loading);
	gate.notify_one();

	let mut generations = Vec::new();
	for waiter in waiters {
		generations.push(waiter.await.unwrap().unwrap().generation());
	}
	generations.push(waiter.await.unwrap().unwrap().generation());

	assert!(generations.iter().all(|g| *g == 1), "{generations:?}");
	assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn reload_joins_in_flight_load() {
	let (fetch, calls, gate) = gated_fetch(colors());
	let dict = Dictionary::new(spec_with("color", |s| s.fetch = fetch), None);

	dict.init();
	let reload = {
		let dict = Arc::clone(&dict);
		tokio::spawn(async move { dict.reload().await })
	};
	tokio::time::sleep(Duration::from_millis(20)).await;
	gate.notify_one();

	let snap = reload.await.unwrap().unwrap();
	assert_eq!(snap.generation(), 1);
	assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn lazy_init_does_not_fetch() {
	let (fetch, calls) = counting_fetch(colors());
	let dict = Dictionary::new(
		spec_with("color", |s| {
			s.fetch = fetch;
			s.lazy = true;
		}),
		None,
	);

	dict.init();
	tokio::time::sleep(Duration::from_millis(20)).await;
	assert_eq!(dict.status(), DictStatus::Empty);
	assert!(dict.snapshot().is_empty());

	let snap = dict.wait().await.unwrap();
	assert_eq!(snap.generation(), 0);
	assert_eq!(calls.load(Ordering::SeqCst), 0);

	let snap = dict.reload().await.unwrap();
	assert_eq!(snap.generation(), 1);
	assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn eager_init_is_observable_through_wait() {
	let (fetch, calls) = counting_fetch(colors());
	let dict = Dictionary::new(spec_with("color", |s| s.fetch = fetch), None);

	dict.init();
	let snap = dict.wait().await.unwrap();
	assert_eq!(snap.generation(), 1);
	assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn failed_first_load_stays_empty() {
	let fetch = fetch_fn(|_| Err(Box::new(Boom) as BoxError));
	let dict = Dictionary::new(spec_with("color", |s| s.fetch = fetch), None);

	let err = dict.load().await.unwrap_err();
	assert!(matches!(err, DictError::Fetch { ref ty, .. } if ty == "color"));
	assert_eq!(err.to_string(), "failed to fetch dict \"color\": boom");
	assert_eq!(dict.status(), DictStatus::Empty);
	assert_eq!(dict.generation(), 0);
	assert!(dict.wait().await.is_err());
}

#[tokio::test]
async fn failed_reload_keeps_previous_generation() {
	let fail = Arc::new(AtomicUsize::new(0));
	let flag = Arc::clone(&fail);
	let fetch = fetch_fn(move |_| {
		if flag.load(Ordering::SeqCst) > 0 {
			Err(Box::new(Boom) as BoxError)
		} else {
			Ok(colors())
		}
	});
	let dict = Dictionary::new(spec_with("color", |s| s.fetch = fetch), None);
	dict.load().await.unwrap();

	fail.store(1, Ordering::SeqCst);
	assert!(dict.reload().await.is_err());
	assert_eq!(dict.status(), DictStatus::Ready);
	assert_eq!(dict.generation(), 1);
	assert_eq!(dict.label(&Code::Int(2)).as_deref(), Some("Green"));
	assert!(dict.last_error().is_some());

	fail.store(0, Ordering::SeqCst);
	let snap = dict.reload().await.unwrap();
	assert_eq!(snap.generation(), 2);
	assert!(dict.last_error().is_none());
	assert!(dict.wait().await.is_ok());
}

#[tokio::test]
async fn non_sequence_conversion_downgrades_to_empty() {
	let (fetch, _) = counting_fetch(colors());
	let convert = convert_fn(|_, _| Converted::Json(json!({ "label": "x", "value": 1 })));
	let dict = Dictionary::new(
		spec_with("color", |s| {
			s.fetch = fetch;
			s.convert = convert;
		}),
		None,
	);

	let snap = dict.load().await.unwrap();
	assert_eq!(dict.status(), DictStatus::Ready);
	assert_eq!(snap.generation(), 1);
	assert!(snap.is_empty());
}

#[tokio::test]
async fn malformed_elements_downgrade_to_empty() {
	let (fetch, _) = counting_fetch(colors());
	let convert = convert_fn(|_, _| Converted::Json(json!([{ "label": "ok", "value": 1 }, 42])));
	let dict = Dictionary::new(
		spec_with("color", |s| {
			s.fetch = fetch;
			s.convert = convert;
		}),
		None,
	);

	assert!(dict.load().await.unwrap().is_empty());
}

#[tokio::test]
async fn duplicate_values_keep_first() {
	let (fetch, _) = counting_fetch(json!([
		{ "value": 1, "label": "first" },
		{ "value": 1, "label": "second" },
		{ "value": 2, "label": "other" },
	]));
	let dict = Dictionary::new(spec_with("dup", |s| s.fetch = fetch), None);

	let snap = dict.load().await.unwrap();
	assert_eq!(snap.len(), 2);
	assert_eq!(snap.label(&Code::Int(1)), Some("first"));
	assert_eq!(snap.labels().len(), snap.index().len());
}

#[tokio::test]
async fn projections_are_consistent() {
	let (fetch, _) = counting_fetch(colors());
	let dict = Dictionary::new(spec_with("color", |s| s.fetch = fetch), None);
	let snap = dict.load().await.unwrap();

	for entry in snap.entries() {
		assert_eq!(snap.label(&entry.value), Some(entry.label.as_str()));
		assert!(Arc::ptr_eq(snap.entry(&entry.value).unwrap(), entry));
	}
	assert_eq!(snap.entries().len(), snap.labels().len());
}

#[tokio::test]
async fn rebind_label_keeps_generation_and_raw() {
	let (fetch, _) = counting_fetch(colors());
	let dict = Dictionary::new(spec_with("color", |s| s.fetch = fetch), None);
	dict.load().await.unwrap();
	let before = dict.snapshot();

	assert!(dict.rebind_label(&Code::Int(1), "Crimson"));
	assert!(!dict.rebind_label(&Code::Int(99), "Nothing"));

	let after = dict.snapshot();
	assert_eq!(after.generation(), 1);
	assert_eq!(after.label(&Code::Int(1)), Some("Crimson"));
	let entry = after.entry(&Code::Int(1)).unwrap();
	assert_eq!(entry.label, "Crimson");
	assert_eq!(entry.value, Code::Int(1));
	assert_eq!(entry.raw, json!({ "value": 1, "label": "Red" }));
	assert_eq!(after.entries()[0].label, "Crimson");

	// Published snapshots are immutable.
	assert_eq!(before.label(&Code::Int(1)), Some("Red"));
}

#[tokio::test]
async fn subscribers_see_generation_changes() {
	let (fetch, _) = counting_fetch(colors());
	let dict = Dictionary::new(spec_with("color", |s| s.fetch = fetch), None);
	let mut rx = dict.subscribe();
	assert_eq!(*rx.borrow(), 0);

	dict.load().await.unwrap();
	tokio::time::timeout(Duration::from_millis(100), rx.changed()).await.unwrap().unwrap();
	assert_eq!(*rx.borrow_and_update(), 1);

	dict.rebind_label(&Code::Int(1), "Crimson");
	assert!(!rx.has_changed().unwrap());
}

#[tokio::test]
async fn panicking_fetch_reports_join_error() {
	let fetch = fetch_fn(|_| panic!("fetcher bug"));
	let dict = Dictionary::new(spec_with("color", |s| s.fetch = fetch), None);

	let err = dict.load().await.unwrap_err();
	assert!(matches!(err, DictError::Join { .. }));
	assert_eq!(dict.status(), DictStatus::Empty);
}

#[test]
fn load_dropped_with_its_runtime_frees_the_slot() {
	let calls = Arc::new(AtomicUsize::new(0));
	let counter = Arc::clone(&calls);
	let fetch = fetch_async(move |_| {
		let first = counter.fetch_add(1, Ordering::SeqCst) == 0;
		async move {
			if first {
				std::future::pending::<()>().await;
			}
			Ok::<_, BoxError>(colors())
		}
	});

	let dict = {
		let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
		rt.block_on(async {
			let dict = Dictionary::new(spec_with("color", |s| s.fetch = fetch), None);
			dict.init();
			tokio::task::yield_now().await;
			assert_eq!(dict.status(), DictStatus::Loading);
			dict
		})
	};

	assert_eq!(dict.status(), DictStatus::Empty);
	assert!(matches!(dict.last_error(), Some(DictError::Join { .. })));

	let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
	let snap = rt.block_on(dict.reload()).unwrap();
	assert_eq!(snap.generation(), 1);
	assert_eq!(dict.status(), DictStatus::Ready);
	assert_eq!(calls.load(Ordering::SeqCst), 2);
}
