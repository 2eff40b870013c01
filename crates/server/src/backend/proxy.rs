use parking_lot::RwLock;
use suffixd_primitives::{Dn, WritabilityMode};
use suffixd_registry::RoutedBackend;

use super::{Backend, BackendFactories};
use crate::config::BackendCfg;
use crate::context::ServerContext;
use crate::error::BackendError;

/// Placeholder for a backend served by a remote server.
///
/// Requests below its base DNs are routed to it, but it holds no entries and
/// is never consulted by local-only lookups.
pub struct ProxyBackend {
	id: String,
	base_dns: RwLock<Vec<Dn>>,
	writability: RwLock<WritabilityMode>,
}

impl ProxyBackend {
	pub fn new(backend_id: impl Into<String>) -> Self {
		Self {
			id: backend_id.into(),
			base_dns: RwLock::new(Vec::new()),
			writability: RwLock::new(WritabilityMode::default()),
		}
	}
}

impl RoutedBackend for ProxyBackend {
	fn backend_id(&self) -> &str {
		&self.id
	}

	fn is_local(&self) -> bool {
		false
	}

	fn entry_exists(&self, _dn: &Dn) -> bool {
		false
	}

	fn set_private_backend(&self, _private: bool) {}
}

impl Backend for ProxyBackend {
	fn class_name(&self) -> &str {
		BackendFactories::PROXY
	}

	fn configure(&self, cfg: &BackendCfg, _ctx: &ServerContext) -> Result<(), BackendError> {
		*self.base_dns.write() = cfg.base_dns.clone();
		Ok(())
	}

	fn open(&self) -> Result<(), BackendError> {
		Ok(())
	}

	fn finalize(&self) -> Result<(), BackendError> {
		Ok(())
	}

	fn base_dns(&self) -> Vec<Dn> {
		self.base_dns.read().clone()
	}

	fn set_base_dns(&self, base_dns: Vec<Dn>) {
		*self.base_dns.write() = base_dns;
	}

	fn is_configuration_acceptable(&self, cfg: &BackendCfg, reasons: &mut Vec<String>) -> bool {
		if cfg.base_dns.is_empty() {
			reasons.push(format!("backend {}: at least one base DN is required", cfg.backend_id));
			return false;
		}
		true
	}

	fn writability_mode(&self) -> WritabilityMode {
		*self.writability.read()
	}

	fn set_writability_mode(&self, mode: WritabilityMode) {
		*self.writability.write() = mode;
	}
}
