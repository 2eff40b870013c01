//! Registration and deregistration of base DNs.
//!
//! Both operations run every check before the first write, so a returned error
//! always leaves the registry as it was.

use std::collections::BTreeSet;
use std::sync::Arc;

use suffixd_primitives::Dn;

use super::Registry;
use crate::{NamingContext, RegistryError, RegistryHooks, RegistryWarning, RoutedBackend};

impl<B: ?Sized + RoutedBackend, H: RegistryHooks<B>> Registry<B, H> {
	/// Registers `base_dn` for `backend`.
	///
	/// Returns the advisory warnings the caller should log if it publishes this
	/// registry.
	///
	/// # Errors
	///
	/// Returns a [`RegistryError`] (result code `unwillingToPerform`) when the
	/// DN is taken, conflicts with the backend's other base DNs, or would leave
	/// a backend's base DNs below different parents.
	pub fn register_base_dn(
		&mut self,
		base_dn: &Dn,
		backend: &Arc<B>,
		is_private: bool,
	) -> Result<Vec<RegistryWarning>, RegistryError> {
		let backend_id = || backend.backend_id().to_string();

		if base_dn.is_root() {
			return Err(RegistryError::RootDn { backend: backend_id() });
		}

		if let Some(existing) = self.backends_by_name.get(base_dn) {
			return Err(RegistryError::AlreadyRegistered {
				base_dn: base_dn.clone(),
				backend: backend_id(),
				existing: existing.backend_id().to_string(),
			});
		}

		let other_base_dns = self.base_dns_of(backend);
		if let Some(other) = other_base_dns
			.iter()
			.find(|dn| base_dn.is_superior_or_equal_to(dn) || base_dn.is_subordinate_or_equal_to(dn))
		{
			return Err(RegistryError::HierarchyConflict {
				base_dn: base_dn.clone(),
				backend: backend_id(),
				other: other.clone(),
			});
		}

		let parent = self.nearest_registered_ancestor(base_dn);
		for other in &other_base_dns {
			let other_parent = self.nearest_registered_ancestor(other);
			if other_parent == parent {
				continue;
			}
			return Err(match (&parent, other_parent) {
				(None, Some(other_parent)) => RegistryError::NewBaseNotSubordinate {
					base_dn: base_dn.clone(),
					backend: backend_id(),
					other: other.clone(),
					parent_backend: self
						.backends_by_name
						.get(&other_parent)
						.map(|b| b.backend_id().to_string())
						.unwrap_or_default(),
				},
				_ => RegistryError::DifferentParentBases {
					base_dn: base_dn.clone(),
					backend: backend_id(),
					other: other.clone(),
				},
			});
		}

		let adopted: BTreeSet<Dn> = self
			.backends_by_name
			.keys()
			.filter(|dn| self.would_be_adopted_by(dn, base_dn))
			.cloned()
			.collect();
		self.check_no_split(base_dn, backend, &adopted)?;

		let parent_backend = parent
			.as_ref()
			.and_then(|p| self.backends_by_name.get(p))
			.cloned();

		let mut warnings = Vec::new();
		if let Some(parent_backend) = &parent_backend
			&& let Some(warning) = self
				.hooks
				.entries_in_multiple_backends(parent_backend, base_dn, backend)
		{
			warnings.push(warning);
		}

		// Checks are done; commit.
		let is_local = backend.is_local();
		self.backends_by_name
			.insert(base_dn.clone(), Arc::clone(backend));
		if is_local {
			self.local_backends_by_name
				.insert(base_dn.clone(), Arc::clone(backend));
		}
		if parent.is_none() {
			self.hooks.set_private_backend(backend, is_private);
		}
		self.naming_contexts.insert(
			base_dn.clone(),
			NamingContext::new(base_dn.clone(), is_private, parent.is_some(), is_local),
		);

		if let Some(parent) = &parent {
			let siblings = self.subordinates.entry(parent.clone()).or_default();
			for dn in &adopted {
				siblings.remove(dn);
			}
			siblings.insert(base_dn.clone());
		}
		for dn in &adopted {
			if let Some(nc) = self.naming_contexts.get_mut(dn) {
				*nc = nc.with_sub_suffix(true);
			}
		}
		if !adopted.is_empty() {
			self.subordinates.insert(base_dn.clone(), adopted);
		}

		Ok(warnings)
	}

	/// Deregisters `base_dn`, promoting or re-parenting its subordinates.
	///
	/// # Errors
	///
	/// Returns [`RegistryError::NotRegistered`] if `base_dn` is not registered.
	pub fn deregister_base_dn(&mut self, base_dn: &Dn) -> Result<Vec<RegistryWarning>, RegistryError> {
		let Some(backend) = self.backends_by_name.get(base_dn).cloned() else {
			return Err(RegistryError::NotRegistered {
				base_dn: base_dn.clone(),
			});
		};
		let parent = self.nearest_registered_ancestor(base_dn);

		self.backends_by_name.remove(base_dn);
		self.local_backends_by_name.remove(base_dn);
		self.naming_contexts.remove(base_dn);
		let orphans = self.subordinates.remove(base_dn).unwrap_or_default();

		let mut warnings = Vec::new();
		match parent {
			None => {
				for dn in &orphans {
					if let Some(nc) = self.naming_contexts.get_mut(dn) {
						*nc = nc.with_sub_suffix(false);
					}
				}
			}
			Some(parent) => {
				let had_orphans = !orphans.is_empty();
				let siblings = self.subordinates.entry(parent.clone()).or_default();
				siblings.remove(base_dn);
				siblings.extend(orphans);
				if siblings.is_empty() {
					self.subordinates.remove(&parent);
				}

				if had_orphans
					&& let Some(warning) = self.hooks.missing_hierarchy(base_dn, &backend)
				{
					warnings.push(warning);
				}
			}
		}

		Ok(warnings)
	}

	/// Returns true if `dn` would have `base_dn` as its nearest registered
	/// ancestor once `base_dn` is registered.
	fn would_be_adopted_by(&self, dn: &Dn, base_dn: &Dn) -> bool {
		for ancestor in dn.ancestors() {
			if ancestor == *base_dn {
				return true;
			}
			if self.backends_by_name.contains_key(&ancestor) {
				return false;
			}
		}
		false
	}

	/// Rejects a registration that would move only part of another backend's
	/// base DNs below `base_dn`.
	fn check_no_split(&self, base_dn: &Dn, backend: &Arc<B>, adopted: &BTreeSet<Dn>) -> Result<(), RegistryError> {
		for dn in adopted {
			let Some(owner) = self.backends_by_name.get(dn) else {
				continue;
			};
			if let Some(left_behind) = self
				.base_dns_of(owner)
				.into_iter()
				.find(|other| !adopted.contains(other))
			{
				return Err(RegistryError::SplitsBackend {
					base_dn: base_dn.clone(),
					backend: backend.backend_id().to_string(),
					other: left_behind,
					other_backend: owner.backend_id().to_string(),
				});
			}
		}
		Ok(())
	}
}
