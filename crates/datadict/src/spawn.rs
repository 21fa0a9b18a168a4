use std::future::Future;
use std::sync::OnceLock;

use tokio::runtime::{Builder, Handle, Runtime};
use tokio::task::JoinHandle;

/// Runtime used when a load is started outside any tokio context.
///
/// Dictionaries may be registered from synchronous host code (construction
/// hooks), so loads cannot assume a runtime is entered.
fn fallback_runtime() -> &'static Runtime {
	static LOAD_RT: OnceLock<Runtime> = OnceLock::new();
	LOAD_RT.get_or_init(|| {
		Builder::new_multi_thread()
			.enable_all()
			.worker_threads(1)
			.thread_name("datadict-load")
			.build()
			.expect("failed to build datadict fallback tokio runtime")
	})
}

/// Spawns a dictionary load that runs to completion independently of its callers.
pub(crate) fn spawn_load<F>(ty: &str, fut: F) -> JoinHandle<F::Output>
where
	F: Future + Send + 'static,
	F::Output: Send + 'static,
{
	match Handle::try_current() {
		Ok(handle) => {
			tracing::trace!(dict = ty, "dict.spawn_load");
			handle.spawn(fut)
		}
		Err(_) => {
			tracing::trace!(dict = ty, "dict.spawn_load.fallback");
			fallback_runtime().spawn(fut)
		}
	}
}
