use suffixd_primitives::Dn;

/// Metadata of one registered base DN.
///
/// Values are immutable; a change of the sub-suffix flag replaces the value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NamingContext {
	base_dn: Dn,
	is_private: bool,
	is_sub_suffix: bool,
	is_local: bool,
}

impl NamingContext {
	pub fn new(base_dn: Dn, is_private: bool, is_sub_suffix: bool, is_local: bool) -> Self {
		Self {
			base_dn,
			is_private,
			is_sub_suffix,
			is_local,
		}
	}

	pub fn base_dn(&self) -> &Dn {
		&self.base_dn
	}

	/// Private naming contexts (configuration, schema, monitoring) are not
	/// advertised to clients.
	pub fn is_private(&self) -> bool {
		self.is_private
	}

	/// True when another registered base DN is an ancestor of this one.
	pub fn is_sub_suffix(&self) -> bool {
		self.is_sub_suffix
	}

	/// True when the owning backend is served locally.
	pub fn is_local(&self) -> bool {
		self.is_local
	}

	/// Returns a copy with the sub-suffix flag replaced.
	pub fn with_sub_suffix(&self, is_sub_suffix: bool) -> Self {
		Self {
			is_sub_suffix,
			..self.clone()
		}
	}
}
