//! Routing of entry DNs to naming contexts.

use std::iter;
use std::sync::Arc;

use suffixd_primitives::Dn;

use super::Registry;
use crate::{BackendAndName, RoutedBackend, same_backend};

impl<B: ?Sized + RoutedBackend, H> Registry<B, H> {
	/// The base DN of the most specific naming context holding `entry_dn`.
	///
	/// The root DN maps to itself. Walks the ancestors of `entry_dn` when the
	/// DN is no deeper than the number of registered base DNs and scans the
	/// registered base DNs otherwise, so the cost is bounded by the smaller of
	/// the two.
	pub fn find_naming_context_for_entry(&self, entry_dn: &Dn) -> Option<Dn> {
		if entry_dn.is_root() {
			return Some(Dn::root());
		}

		if entry_dn.size() <= self.backends_by_name.len() {
			iter::once(entry_dn.clone())
				.chain(entry_dn.ancestors())
				.find(|dn| self.backends_by_name.contains_key(dn))
		} else {
			self.backends_by_name
				.keys()
				.filter(|base| entry_dn.is_subordinate_or_equal_to(base))
				.max_by_key(|base| base.size())
				.cloned()
		}
	}

	/// The backend holding `entry_dn` and the base DN it matched.
	///
	/// `None` for the root DN and for DNs outside every naming context.
	pub fn backend_and_name(&self, entry_dn: &Dn) -> Option<BackendAndName<B>> {
		let base_dn = self.find_naming_context_for_entry(entry_dn)?;
		let backend = self.backends_by_name.get(&base_dn)?;
		Some(BackendAndName {
			backend: Arc::clone(backend),
			base_dn,
		})
	}

	/// Like [`backend_and_name`](Self::backend_and_name), restricted to a
	/// matching backend that is local.
	pub fn local_backend_and_name(&self, entry_dn: &Dn) -> Option<BackendAndName<B>> {
		let base_dn = self.find_naming_context_for_entry(entry_dn)?;
		let backend = self.local_backends_by_name.get(&base_dn)?;
		Some(BackendAndName {
			backend: Arc::clone(backend),
			base_dn,
		})
	}

	/// Backends owning base DNs directly below any base DN of the backend
	/// registered at `base_dn`.
	pub fn subordinate_backends(&self, base_dn: &Dn) -> Vec<Arc<B>> {
		let Some(owner) = self.backends_by_name.get(base_dn) else {
			return Vec::new();
		};

		let mut out: Vec<Arc<B>> = Vec::new();
		for dn in self.base_dns_of(owner) {
			let Some(children) = self.subordinates.get(&dn) else {
				continue;
			};
			for child in children {
				if let Some(backend) = self.backends_by_name.get(child)
					&& !out.iter().any(|b| same_backend(b, backend))
				{
					out.push(Arc::clone(backend));
				}
			}
		}
		out
	}
}
