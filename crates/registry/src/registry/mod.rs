//! The routing table value and its read-side API.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use suffixd_primitives::Dn;

use crate::{CheckingHooks, LiveHooks, NamingContext, RoutedBackend, same_backend};

mod invariants;
mod lookup;
mod mutate;

#[cfg(test)]
mod tests;

/// Mapping of registered base DNs to backends, plus the naming-context and
/// subordinate bookkeeping derived from it.
pub struct Registry<B: ?Sized, H = LiveHooks> {
	/// Every registered base DN.
	backends_by_name: BTreeMap<Dn, Arc<B>>,
	/// Registered base DNs whose backend is local.
	local_backends_by_name: BTreeMap<Dn, Arc<B>>,
	/// Base DN → base DNs whose nearest registered ancestor it is.
	subordinates: BTreeMap<Dn, BTreeSet<Dn>>,
	naming_contexts: BTreeMap<Dn, NamingContext>,
	hooks: H,
}

impl<B: ?Sized + RoutedBackend, H: Default> Default for Registry<B, H> {
	fn default() -> Self {
		Self::with_hooks(H::default())
	}
}

impl<B: ?Sized + RoutedBackend, H> Registry<B, H> {
	/// Creates an empty registry using `hooks` for mutation side effects.
	pub fn with_hooks(hooks: H) -> Self {
		Self {
			backends_by_name: BTreeMap::new(),
			local_backends_by_name: BTreeMap::new(),
			subordinates: BTreeMap::new(),
			naming_contexts: BTreeMap::new(),
			hooks,
		}
	}

	pub fn hooks(&self) -> &H {
		&self.hooks
	}

	/// Clones the routing state under a different hook strategy.
	fn clone_with_hooks<H2>(&self, hooks: H2) -> Registry<B, H2> {
		Registry {
			backends_by_name: self.backends_by_name.clone(),
			local_backends_by_name: self.local_backends_by_name.clone(),
			subordinates: self.subordinates.clone(),
			naming_contexts: self.naming_contexts.clone(),
			hooks,
		}
	}

	/// Full structural copy with the same hooks; the basis of every live update.
	pub fn copy(&self) -> Self
	where
		H: Clone,
	{
		self.clone_with_hooks(self.hooks.clone())
	}

	/// Full structural copy whose mutations have no side effects.
	pub fn copy_for_checking_changes(&self) -> Registry<B, CheckingHooks> {
		self.clone_with_hooks(CheckingHooks)
	}

	/// Number of registered base DNs.
	pub fn len(&self) -> usize {
		self.backends_by_name.len()
	}

	pub fn is_empty(&self) -> bool {
		self.backends_by_name.is_empty()
	}

	/// Registered base DNs, parents before children.
	pub fn base_dns(&self) -> impl Iterator<Item = &Dn> + '_ {
		self.backends_by_name.keys()
	}

	/// Registered base DNs with their backends.
	pub fn iter(&self) -> impl Iterator<Item = (&Dn, &Arc<B>)> + '_ {
		self.backends_by_name.iter()
	}

	pub fn contains_base_dn(&self, dn: &Dn) -> bool {
		self.backends_by_name.contains_key(dn)
	}

	/// The backend registered with exactly `base_dn`.
	pub fn backend_with_base_dn(&self, base_dn: &Dn) -> Option<&Arc<B>> {
		self.backends_by_name.get(base_dn)
	}

	/// The local backend registered with exactly `base_dn`.
	pub fn local_backend_with_base_dn(&self, base_dn: &Dn) -> Option<&Arc<B>> {
		self.local_backends_by_name.get(base_dn)
	}

	/// Distinct registered backends, in base DN order of first appearance.
	pub fn backends(&self) -> Vec<Arc<B>> {
		let mut out: Vec<Arc<B>> = Vec::new();
		for backend in self.backends_by_name.values() {
			if !out.iter().any(|b| same_backend(b, backend)) {
				out.push(Arc::clone(backend));
			}
		}
		out
	}

	/// Base DNs registered for `backend`.
	pub fn base_dns_of(&self, backend: &Arc<B>) -> Vec<Dn> {
		self.backends_by_name
			.iter()
			.filter(|(_, b)| same_backend(b, backend))
			.map(|(dn, _)| dn.clone())
			.collect()
	}

	/// Base DNs directly below `base_dn` in the registered hierarchy.
	pub fn subordinates_of(&self, base_dn: &Dn) -> Option<&BTreeSet<Dn>> {
		self.subordinates.get(base_dn)
	}

	/// Returns true if any base DN of `backend` has subordinate base DNs.
	pub fn has_subordinates(&self, backend: &Arc<B>) -> bool {
		self.base_dns_of(backend)
			.iter()
			.any(|dn| self.subordinates.contains_key(dn))
	}

	/// The closest strict ancestor of `dn` that is a registered base DN.
	pub fn nearest_registered_ancestor(&self, dn: &Dn) -> Option<Dn> {
		dn.ancestors().find(|a| self.backends_by_name.contains_key(a))
	}

	pub fn naming_context(&self, base_dn: &Dn) -> Option<&NamingContext> {
		self.naming_contexts.get(base_dn)
	}

	/// All naming contexts, parents before children.
	pub fn naming_contexts(&self) -> impl Iterator<Item = &NamingContext> + '_ {
		self.naming_contexts.values()
	}

	/// Returns true if `dn` is a registered top-level naming context.
	pub fn contains_naming_context(&self, dn: &Dn) -> bool {
		self.naming_contexts
			.get(dn)
			.is_some_and(|nc| !nc.is_sub_suffix())
	}

	/// Top-level public naming contexts.
	pub fn public_naming_contexts(&self) -> BTreeMap<Dn, Arc<B>> {
		self.contexts_where(|nc| !nc.is_private() && !nc.is_sub_suffix())
	}

	/// Public naming contexts including sub-suffixes.
	pub fn all_public_naming_contexts(&self) -> BTreeMap<Dn, Arc<B>> {
		self.contexts_where(|nc| !nc.is_private())
	}

	/// Top-level private naming contexts.
	pub fn private_naming_contexts(&self) -> BTreeMap<Dn, Arc<B>> {
		self.contexts_where(|nc| nc.is_private() && !nc.is_sub_suffix())
	}

	fn contexts_where(&self, pred: impl Fn(&NamingContext) -> bool) -> BTreeMap<Dn, Arc<B>> {
		self.naming_contexts
			.values()
			.filter(|nc| pred(nc))
			.filter_map(|nc| {
				self.backends_by_name
					.get(nc.base_dn())
					.map(|b| (nc.base_dn().clone(), Arc::clone(b)))
			})
			.collect()
	}
}

impl<B: ?Sized, H: Clone> Clone for Registry<B, H> {
	fn clone(&self) -> Self {
		Self {
			backends_by_name: self.backends_by_name.clone(),
			local_backends_by_name: self.local_backends_by_name.clone(),
			subordinates: self.subordinates.clone(),
			naming_contexts: self.naming_contexts.clone(),
			hooks: self.hooks.clone(),
		}
	}
}

/// Structural equality: same DNs mapped to the same backend objects.
impl<B: ?Sized, H, H2> PartialEq<Registry<B, H2>> for Registry<B, H> {
	fn eq(&self, other: &Registry<B, H2>) -> bool {
		fn same_map<B: ?Sized>(a: &BTreeMap<Dn, Arc<B>>, b: &BTreeMap<Dn, Arc<B>>) -> bool {
			a.len() == b.len()
				&& a
					.iter()
					.zip(b.iter())
					.all(|((da, ba), (db, bb))| da == db && same_backend(ba, bb))
		}

		same_map(&self.backends_by_name, &other.backends_by_name)
			&& same_map(&self.local_backends_by_name, &other.local_backends_by_name)
			&& self.subordinates == other.subordinates
			&& self.naming_contexts == other.naming_contexts
	}
}

impl<B: ?Sized + RoutedBackend, H> fmt::Debug for Registry<B, H> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_map()
			.entries(
				self.backends_by_name
					.iter()
					.map(|(dn, b)| (dn.to_string(), b.backend_id().to_string())),
			)
			.finish()
	}
}
