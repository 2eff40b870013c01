use std::fmt;

use suffixd_primitives::{Dn, ResultCode};

/// Rejection of a registry mutation. The registry is unchanged when one is returned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
	/// The base DN is already claimed.
	#[error(
		"unable to register base DN \"{base_dn}\" for backend {backend}: it is already registered for backend {existing}"
	)]
	AlreadyRegistered {
		base_dn: Dn,
		backend: String,
		existing: String,
	},

	/// The new base DN is an ancestor or descendant of another base DN of the same backend.
	#[error(
		"unable to register base DN \"{base_dn}\" for backend {backend}: it has a hierarchical relationship with base DN \"{other}\" of the same backend"
	)]
	HierarchyConflict {
		base_dn: Dn,
		backend: String,
		other: Dn,
	},

	/// The new base DN would sit below a different registered ancestor than
	/// the backend's other base DNs.
	#[error(
		"unable to register base DN \"{base_dn}\" for backend {backend}: base DN \"{other}\" of the same backend has a different parent base DN"
	)]
	DifferentParentBases {
		base_dn: Dn,
		backend: String,
		other: Dn,
	},

	/// The new base DN is top-level while the backend's other base DNs are
	/// sub-suffixes.
	#[error(
		"unable to register base DN \"{base_dn}\" for backend {backend}: base DN \"{other}\" of the same backend is subordinate to backend {parent_backend} but the new base DN is not"
	)]
	NewBaseNotSubordinate {
		base_dn: Dn,
		backend: String,
		other: Dn,
		parent_backend: String,
	},

	/// The new base DN would become the parent of only part of another
	/// backend's base DNs.
	#[error(
		"unable to register base DN \"{base_dn}\" for backend {backend}: base DN \"{other}\" of backend {other_backend} would no longer share a parent base DN with the other base DNs of that backend"
	)]
	SplitsBackend {
		base_dn: Dn,
		backend: String,
		other: Dn,
		other_backend: String,
	},

	/// The root DN belongs to the root DSE and cannot be registered.
	#[error("unable to register the root DN for backend {backend}: it is reserved for the root DSE")]
	RootDn { backend: String },

	/// Deregistration of a DN that is not registered.
	#[error("unable to deregister base DN \"{base_dn}\": it is not registered")]
	NotRegistered { base_dn: Dn },
}

impl RegistryError {
	/// Every namespace conflict is reported as `unwillingToPerform`.
	pub fn result_code(&self) -> ResultCode {
		ResultCode::UnwillingToPerform
	}
}

/// Advisory outcome of a successful mutation. Never blocks the mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryWarning {
	/// The parent backend already holds an entry at the newly registered base DN.
	EntriesInMultipleBackends {
		parent_backend: String,
		base_dn: Dn,
		backend: String,
	},
	/// A base DN with subordinate base DNs was removed below another base DN;
	/// searches may miss the structural entries in between.
	MissingHierarchy { base_dn: Dn, backend: String },
}

impl fmt::Display for RegistryWarning {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::EntriesInMultipleBackends {
				parent_backend,
				base_dn,
				backend,
			} => write!(
				f,
				"backend {parent_backend} already contains entry \"{base_dn}\" which is now the base DN of backend {backend}; reinitialize {parent_backend} to remove the duplicated entries"
			),
			Self::MissingHierarchy { base_dn, backend } => write!(
				f,
				"base DN \"{base_dn}\" of backend {backend} was removed while it had subordinate base DNs; search results may be missing the entries in between"
			),
		}
	}
}
