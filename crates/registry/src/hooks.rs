//! Side effects of registry mutations.
//!
//! A live registry notifies the backend of its private flag, asks the parent
//! backend whether it already holds data at a new sub-suffix, and reports
//! hierarchy gaps after a removal. The checking variant does none of these.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use suffixd_primitives::Dn;

use crate::{RegistryWarning, RoutedBackend};

/// Strategy invoked by the shared mutation code at its three side-effect points.
pub trait RegistryHooks<B: ?Sized + RoutedBackend>: Clone {
	/// A top-level base DN was registered for `backend`.
	fn set_private_backend(&self, backend: &B, private: bool);

	/// `base_dn` is being registered for `backend` below `parent`.
	fn entries_in_multiple_backends(&self, parent: &B, base_dn: &Dn, backend: &B) -> Option<RegistryWarning>;

	/// `base_dn` of `backend` was removed while it had subordinates, below another base DN.
	fn missing_hierarchy(&self, base_dn: &Dn, backend: &B) -> Option<RegistryWarning>;
}

/// Hooks of the published registry.
#[derive(Debug, Clone, Default)]
pub struct LiveHooks {
	shutting_down: Arc<AtomicBool>,
}

impl LiveHooks {
	/// Shares `shutting_down` with the server; the missing-hierarchy warning is
	/// suppressed once it is set.
	pub fn new(shutting_down: Arc<AtomicBool>) -> Self {
		Self { shutting_down }
	}

	pub fn is_shutting_down(&self) -> bool {
		self.shutting_down.load(Ordering::Acquire)
	}
}

impl<B: ?Sized + RoutedBackend> RegistryHooks<B> for LiveHooks {
	fn set_private_backend(&self, backend: &B, private: bool) {
		backend.set_private_backend(private);
	}

	fn entries_in_multiple_backends(&self, parent: &B, base_dn: &Dn, backend: &B) -> Option<RegistryWarning> {
		if !parent.is_local() || !parent.entry_exists(base_dn) {
			return None;
		}
		Some(RegistryWarning::EntriesInMultipleBackends {
			parent_backend: parent.backend_id().to_string(),
			base_dn: base_dn.clone(),
			backend: backend.backend_id().to_string(),
		})
	}

	fn missing_hierarchy(&self, base_dn: &Dn, backend: &B) -> Option<RegistryWarning> {
		if self.is_shutting_down() {
			return None;
		}
		Some(RegistryWarning::MissingHierarchy {
			base_dn: base_dn.clone(),
			backend: backend.backend_id().to_string(),
		})
	}
}

/// Hooks of a disposable validation copy: all no-ops.
#[derive(Debug, Clone, Copy, Default)]
pub struct CheckingHooks;

impl<B: ?Sized + RoutedBackend> RegistryHooks<B> for CheckingHooks {
	fn set_private_backend(&self, _backend: &B, _private: bool) {}

	fn entries_in_multiple_backends(&self, _parent: &B, _base_dn: &Dn, _backend: &B) -> Option<RegistryWarning> {
		None
	}

	fn missing_hierarchy(&self, _base_dn: &Dn, _backend: &B) -> Option<RegistryWarning> {
		None
	}
}
