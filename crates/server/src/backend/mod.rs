//! Backend contract and built-in implementations.
//!
//! # Mental model
//!
//! * A backend is created by a factory looked up by the configured class
//!   name, then configured, then opened. Only an open backend is registered
//!   with the coordinator.
//! * Backends are shared as `Arc<dyn Backend>` and mutate through interior
//!   mutability; the coordinator and the published registry snapshots hold
//!   references to the same object.
//!
//! # Key types
//!
//! | Type | Meaning |
//! |---|---|
//! | [`Backend`] | Lifecycle contract on top of the routing view [`RoutedBackend`] |
//! | [`BackendFactories`] | Class name → constructor |
//! | [`MemoryBackend`] | Local backend holding entry names in memory |
//! | [`ProxyBackend`] | Non-local placeholder; routes but serves nothing |
//! | [`RootDseBackend`] | Serves the root DSE (the empty DN) |

use std::sync::Arc;

use rustc_hash::FxHashMap;
use suffixd_primitives::{Dn, WritabilityMode};
use suffixd_registry::RoutedBackend;

use crate::config::BackendCfg;
use crate::context::ServerContext;
use crate::error::BackendError;

mod memory;
mod proxy;
mod root_dse;

#[cfg(test)]
mod tests;

pub use memory::MemoryBackend;
pub use proxy::ProxyBackend;
pub use root_dse::RootDseBackend;

/// Lifecycle contract of a backend implementation.
pub trait Backend: RoutedBackend {
	/// Class name the backend was instantiated from.
	fn class_name(&self) -> &str;

	/// Applies `cfg`. Called once, before [`open`](Self::open).
	fn configure(&self, cfg: &BackendCfg, ctx: &ServerContext) -> Result<(), BackendError>;

	/// Acquires the resources needed to serve requests.
	fn open(&self) -> Result<(), BackendError>;

	/// Releases resources. Errors are logged by the caller and otherwise ignored.
	fn finalize(&self) -> Result<(), BackendError>;

	/// Base DNs the backend is configured for.
	fn base_dns(&self) -> Vec<Dn>;

	/// Replaces the base DNs after the coordinator re-registered them.
	fn set_base_dns(&self, base_dns: Vec<Dn>);

	/// Implementation-specific validation of `cfg`. Reasons for rejection are
	/// appended to `reasons`.
	fn is_configuration_acceptable(&self, cfg: &BackendCfg, reasons: &mut Vec<String>) -> bool;

	fn writability_mode(&self) -> WritabilityMode;

	fn set_writability_mode(&self, mode: WritabilityMode);
}

/// Constructor of one backend class.
pub type BackendFactory = Arc<dyn Fn(&BackendCfg) -> Result<Arc<dyn Backend>, BackendError> + Send + Sync>;

/// Registry of backend constructors by class name.
#[derive(Clone, Default)]
pub struct BackendFactories {
	by_class: FxHashMap<String, BackendFactory>,
}

impl BackendFactories {
	/// Class name of [`MemoryBackend`].
	pub const MEMORY: &'static str = "memory";
	/// Class name of [`ProxyBackend`].
	pub const PROXY: &'static str = "proxy";

	/// An empty registry.
	pub fn new() -> Self {
		Self::default()
	}

	/// A registry with the built-in classes.
	pub fn with_builtins() -> Self {
		let mut factories = Self::new();
		factories.register(Self::MEMORY, |cfg| {
			Ok(Arc::new(MemoryBackend::new(&cfg.backend_id)) as Arc<dyn Backend>)
		});
		factories.register(Self::PROXY, |cfg| {
			Ok(Arc::new(ProxyBackend::new(&cfg.backend_id)) as Arc<dyn Backend>)
		});
		factories
	}

	/// Registers `factory` for `class`, replacing any previous one.
	pub fn register<F>(&mut self, class: impl Into<String>, factory: F)
	where
		F: Fn(&BackendCfg) -> Result<Arc<dyn Backend>, BackendError> + Send + Sync + 'static,
	{
		self.by_class.insert(class.into(), Arc::new(factory));
	}

	pub fn contains(&self, class: &str) -> bool {
		self.by_class.contains_key(class)
	}

	/// Creates an unconfigured backend for `cfg.class`.
	///
	/// # Errors
	///
	/// [`BackendError::UnknownClass`] if no factory is registered, otherwise
	/// whatever the factory reports.
	pub fn instantiate(&self, cfg: &BackendCfg) -> Result<Arc<dyn Backend>, BackendError> {
		let factory = self
			.by_class
			.get(&cfg.class)
			.ok_or_else(|| BackendError::UnknownClass {
				class: cfg.class.clone(),
			})?;
		factory(cfg)
	}
}
