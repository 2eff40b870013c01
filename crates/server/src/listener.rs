//! Backend initialization listeners.
//!
//! Subsystems that keep per-backend state (monitoring, caches, plugins) hook
//! into backend registration through [`BackendInitializationListener`]. The
//! coordinator notifies listeners in registration order; a failing or
//! panicking listener is logged and skipped, never propagated.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::warn;

use crate::backend::Backend;

/// Callbacks around backend registration and deregistration.
///
/// All methods default to doing nothing.
pub trait BackendInitializationListener: Send + Sync {
	/// Before a backend becomes routable.
	fn pre_init(&self, _backend: &dyn Backend) -> anyhow::Result<()> {
		Ok(())
	}

	/// After a backend became routable.
	fn post_init(&self, _backend: &dyn Backend) -> anyhow::Result<()> {
		Ok(())
	}

	/// Before a backend stops being routable.
	fn pre_finalize(&self, _backend: &dyn Backend) -> anyhow::Result<()> {
		Ok(())
	}

	/// After a backend stopped being routable.
	fn post_finalize(&self, _backend: &dyn Backend) -> anyhow::Result<()> {
		Ok(())
	}
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum Phase {
	PreInit,
	PostInit,
	PreFinalize,
	PostFinalize,
}

impl Phase {
	fn name(self) -> &'static str {
		match self {
			Self::PreInit => "pre-init",
			Self::PostInit => "post-init",
			Self::PreFinalize => "pre-finalize",
			Self::PostFinalize => "post-finalize",
		}
	}
}

/// Ordered listener set.
#[derive(Default)]
pub(crate) struct Listeners {
	list: RwLock<Vec<Arc<dyn BackendInitializationListener>>>,
}

impl Listeners {
	pub(crate) fn add(&self, listener: Arc<dyn BackendInitializationListener>) {
		self.list.write().push(listener);
	}

	/// Removes `listener` by identity. Returns false if it was not registered.
	pub(crate) fn remove(&self, listener: &Arc<dyn BackendInitializationListener>) -> bool {
		let mut list = self.list.write();
		let before = list.len();
		list.retain(|l| !std::ptr::addr_eq(Arc::as_ptr(l), Arc::as_ptr(listener)));
		list.len() != before
	}

	pub(crate) fn len(&self) -> usize {
		self.list.read().len()
	}

	pub(crate) fn notify(&self, phase: Phase, backend: &dyn Backend) {
		// Snapshot so that a listener may (de)register listeners.
		let list = self.list.read().clone();
		for listener in list {
			let outcome = catch_unwind(AssertUnwindSafe(|| match phase {
				Phase::PreInit => listener.pre_init(backend),
				Phase::PostInit => listener.post_init(backend),
				Phase::PreFinalize => listener.pre_finalize(backend),
				Phase::PostFinalize => listener.post_finalize(backend),
			}));
			match outcome {
				Ok(Ok(())) => {}
				Ok(Err(error)) => warn!(
					backend = backend.backend_id(),
					phase = phase.name(),
					error = %error,
					"backend initialization listener failed"
				),
				Err(_) => warn!(
					backend = backend.backend_id(),
					phase = phase.name(),
					"backend initialization listener panicked"
				),
			}
		}
	}
}
