use std::fmt;
use std::sync::Arc;

use suffixd_primitives::Dn;

/// The view of a backend the routing table works with.
///
/// Backends are shared as `Arc`s and compared by identity, see [`same_backend`].
pub trait RoutedBackend: Send + Sync {
	/// Unique identifier of the backend.
	fn backend_id(&self) -> &str;

	/// Returns true if the backend answers queries from local storage.
	///
	/// Only local backends are consulted for entry existence and appear in the
	/// local routing map.
	fn is_local(&self) -> bool {
		true
	}

	/// Returns true if the backend holds an entry named `dn`.
	fn entry_exists(&self, dn: &Dn) -> bool;

	/// Records whether the backend serves a private naming context.
	fn set_private_backend(&self, private: bool);
}

/// Returns true when `a` and `b` are the same backend object.
pub fn same_backend<B: ?Sized>(a: &Arc<B>, b: &Arc<B>) -> bool {
	std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

/// A backend together with the one base DN of it that matched a lookup.
pub struct BackendAndName<B: ?Sized> {
	pub backend: Arc<B>,
	pub base_dn: Dn,
}

impl<B: ?Sized> Clone for BackendAndName<B> {
	fn clone(&self) -> Self {
		Self {
			backend: Arc::clone(&self.backend),
			base_dn: self.base_dn.clone(),
		}
	}
}

impl<B: ?Sized + RoutedBackend> fmt::Debug for BackendAndName<B> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("BackendAndName")
			.field("backend", &self.backend.backend_id())
			.field("base_dn", &self.base_dn)
			.finish()
	}
}
