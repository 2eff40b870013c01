use std::collections::{BTreeMap, BTreeSet};

use suffixd_primitives::Dn;

use super::Registry;
use crate::{RoutedBackend, same_backend};

impl<B: ?Sized + RoutedBackend, H> Registry<B, H> {
	/// Recomputes every derived structure and compares it with the stored one.
	///
	/// # Errors
	///
	/// Returns a description of the first violated invariant.
	pub fn check_invariants(&self) -> Result<(), String> {
		if self.backends_by_name.contains_key(&Dn::root()) {
			return Err("root DN is registered".into());
		}

		for backend in self.backends() {
			let dns = self.base_dns_of(&backend);
			for (i, a) in dns.iter().enumerate() {
				for b in &dns[i + 1..] {
					if a.is_ancestor_of(b) || b.is_ancestor_of(a) {
						return Err(format!(
							"backend {} has related base DNs \"{a}\" and \"{b}\"",
							backend.backend_id()
						));
					}
				}
			}

			let parents: BTreeSet<Option<Dn>> = dns
				.iter()
				.map(|dn| self.nearest_registered_ancestor(dn))
				.collect();
			if parents.len() > 1 {
				return Err(format!(
					"base DNs of backend {} have different parents: {parents:?}",
					backend.backend_id()
				));
			}
		}

		let mut expected: BTreeMap<Dn, BTreeSet<Dn>> = BTreeMap::new();
		for dn in self.backends_by_name.keys() {
			if let Some(parent) = self.nearest_registered_ancestor(dn) {
				expected.entry(parent).or_default().insert(dn.clone());
			}
		}
		if expected != self.subordinates {
			return Err(format!(
				"subordinates {:?} differ from recomputed {expected:?}",
				self.subordinates
			));
		}

		if !self
			.naming_contexts
			.keys()
			.eq(self.backends_by_name.keys())
		{
			return Err("naming contexts and registered base DNs differ".into());
		}
		for (dn, nc) in &self.naming_contexts {
			if nc.base_dn() != dn {
				return Err(format!("naming context keyed \"{dn}\" names \"{}\"", nc.base_dn()));
			}
			let has_parent = self.nearest_registered_ancestor(dn).is_some();
			if nc.is_sub_suffix() != has_parent {
				return Err(format!(
					"naming context \"{dn}\" has is_sub_suffix={} but registered ancestor={has_parent}",
					nc.is_sub_suffix()
				));
			}
			let is_local = self.backends_by_name.get(dn).is_some_and(|b| b.is_local());
			if nc.is_local() != is_local {
				return Err(format!("naming context \"{dn}\" has a stale is_local flag"));
			}
		}

		let expected_local: Vec<(&Dn, _)> = self
			.backends_by_name
			.iter()
			.filter(|(_, b)| b.is_local())
			.collect();
		let local_matches = expected_local.len() == self.local_backends_by_name.len()
			&& expected_local
				.into_iter()
				.zip(self.local_backends_by_name.iter())
				.all(|((da, ba), (db, bb))| da == db && same_backend(ba, bb));
		if !local_matches {
			return Err("local backend map is not the local subset of the main map".into());
		}

		Ok(())
	}
}
