use std::sync::atomic::{AtomicBool, Ordering};

use suffixd_primitives::{Dn, WritabilityMode};
use suffixd_registry::RoutedBackend;

use super::Backend;
use crate::config::BackendCfg;
use crate::context::ServerContext;
use crate::coordinator::BackendCoordinator;
use crate::error::BackendError;

/// Serves the root DSE, the entry named by the empty DN.
///
/// It is never registered in the routing table; the coordinator routes the
/// root DN to it directly.
pub struct RootDseBackend {
	open: AtomicBool,
}

impl RootDseBackend {
	pub const BACKEND_ID: &'static str = "rootDSE";
	pub const CLASS: &'static str = "root-dse";

	pub fn new() -> Self {
		Self {
			open: AtomicBool::new(false),
		}
	}

	/// Values of the root DSE `namingContexts` attribute: the public
	/// top-level naming contexts.
	pub fn naming_contexts(&self, coordinator: &BackendCoordinator) -> Vec<Dn> {
		coordinator.public_naming_contexts().into_keys().collect()
	}
}

impl Default for RootDseBackend {
	fn default() -> Self {
		Self::new()
	}
}

impl RoutedBackend for RootDseBackend {
	fn backend_id(&self) -> &str {
		Self::BACKEND_ID
	}

	fn entry_exists(&self, dn: &Dn) -> bool {
		dn.is_root() && self.open.load(Ordering::Acquire)
	}

	fn set_private_backend(&self, _private: bool) {}
}

impl Backend for RootDseBackend {
	fn class_name(&self) -> &str {
		Self::CLASS
	}

	fn configure(&self, _cfg: &BackendCfg, _ctx: &ServerContext) -> Result<(), BackendError> {
		Ok(())
	}

	fn open(&self) -> Result<(), BackendError> {
		self.open.store(true, Ordering::Release);
		Ok(())
	}

	fn finalize(&self) -> Result<(), BackendError> {
		self.open.store(false, Ordering::Release);
		Ok(())
	}

	fn base_dns(&self) -> Vec<Dn> {
		vec![Dn::root()]
	}

	fn set_base_dns(&self, _base_dns: Vec<Dn>) {}

	fn is_configuration_acceptable(&self, _cfg: &BackendCfg, _reasons: &mut Vec<String>) -> bool {
		true
	}

	fn writability_mode(&self) -> WritabilityMode {
		WritabilityMode::Disabled
	}

	fn set_writability_mode(&self, _mode: WritabilityMode) {}
}
