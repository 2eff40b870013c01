use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;
use suffixd_primitives::{Dn, WritabilityMode};
use suffixd_registry::RoutedBackend;

use super::{Backend, BackendFactories};
use crate::config::BackendCfg;
use crate::context::ServerContext;
use crate::error::BackendError;

/// Property listing the entries loaded when the backend opens.
const ENTRIES_PROPERTY: &str = "entries";

#[derive(Default)]
struct State {
	base_dns: Vec<Dn>,
	preload: Vec<Dn>,
	entries: BTreeSet<Dn>,
	writability: WritabilityMode,
	open: bool,
}

/// Local backend keeping the names of its entries in memory.
///
/// Entries listed in the `entries` property are loaded on open and dropped on
/// finalize.
pub struct MemoryBackend {
	id: String,
	private: AtomicBool,
	state: RwLock<State>,
}

impl MemoryBackend {
	pub fn new(backend_id: impl Into<String>) -> Self {
		Self {
			id: backend_id.into(),
			private: AtomicBool::new(false),
			state: RwLock::new(State::default()),
		}
	}

	/// Returns true if the registry marked this backend as serving a private
	/// naming context.
	pub fn is_private(&self) -> bool {
		self.private.load(Ordering::Acquire)
	}

	pub fn is_open(&self) -> bool {
		self.state.read().open
	}

	pub fn entry_count(&self) -> usize {
		self.state.read().entries.len()
	}

	/// Adds an entry. `internal` marks writes issued by the server itself.
	///
	/// # Errors
	///
	/// Fails when the backend is closed, refuses the write by its writability
	/// mode, or `dn` lies outside its base DNs.
	pub fn add_entry(&self, dn: Dn, internal: bool) -> Result<bool, BackendError> {
		let mut state = self.state.write();
		self.check_write(&state, &dn, internal)?;
		Ok(state.entries.insert(dn))
	}

	/// Removes an entry; same rules as [`add_entry`](Self::add_entry).
	pub fn remove_entry(&self, dn: &Dn, internal: bool) -> Result<bool, BackendError> {
		let mut state = self.state.write();
		self.check_write(&state, dn, internal)?;
		Ok(state.entries.remove(dn))
	}

	fn check_write(&self, state: &State, dn: &Dn, internal: bool) -> Result<(), BackendError> {
		if !state.open {
			return Err(BackendError::NotOpen {
				backend: self.id.clone(),
			});
		}
		if !state.writability.allows_write(internal) {
			return Err(BackendError::NotWritable {
				backend: self.id.clone(),
				mode: state.writability,
			});
		}
		if !state.base_dns.iter().any(|base| dn.is_subordinate_or_equal_to(base)) {
			return Err(BackendError::OutsideBaseDns {
				backend: self.id.clone(),
				dn: dn.clone(),
			});
		}
		Ok(())
	}

	/// Validates `cfg` and returns the entries to preload.
	fn check_config(cfg: &BackendCfg) -> Result<Vec<Dn>, String> {
		if cfg.base_dns.is_empty() {
			return Err("at least one base DN is required".into());
		}
		let entries = cfg.dn_list_property(ENTRIES_PROPERTY)?;
		if let Some(stray) = entries
			.iter()
			.find(|e| !cfg.base_dns.iter().any(|base| e.is_subordinate_or_equal_to(base)))
		{
			return Err(format!("entry \"{stray}\" is not below any configured base DN"));
		}
		Ok(entries)
	}
}

impl RoutedBackend for MemoryBackend {
	fn backend_id(&self) -> &str {
		&self.id
	}

	fn entry_exists(&self, dn: &Dn) -> bool {
		self.state.read().entries.contains(dn)
	}

	fn set_private_backend(&self, private: bool) {
		self.private.store(private, Ordering::Release);
	}
}

impl Backend for MemoryBackend {
	fn class_name(&self) -> &str {
		BackendFactories::MEMORY
	}

	fn configure(&self, cfg: &BackendCfg, _ctx: &ServerContext) -> Result<(), BackendError> {
		let preload = Self::check_config(cfg).map_err(|reason| BackendError::Config {
			backend: self.id.clone(),
			reason,
		})?;
		let mut state = self.state.write();
		state.base_dns.clone_from(&cfg.base_dns);
		state.preload = preload;
		Ok(())
	}

	fn open(&self) -> Result<(), BackendError> {
		let mut state = self.state.write();
		if state.base_dns.is_empty() {
			return Err(BackendError::Open {
				backend: self.id.clone(),
				reason: "backend has not been configured".into(),
			});
		}
		state.entries = state.preload.iter().cloned().collect();
		state.open = true;
		Ok(())
	}

	fn finalize(&self) -> Result<(), BackendError> {
		let mut state = self.state.write();
		state.entries.clear();
		state.open = false;
		Ok(())
	}

	fn base_dns(&self) -> Vec<Dn> {
		self.state.read().base_dns.clone()
	}

	fn set_base_dns(&self, base_dns: Vec<Dn>) {
		self.state.write().base_dns = base_dns;
	}

	fn is_configuration_acceptable(&self, cfg: &BackendCfg, reasons: &mut Vec<String>) -> bool {
		match Self::check_config(cfg) {
			Ok(_) => true,
			Err(reason) => {
				reasons.push(format!("backend {}: {reason}", cfg.backend_id));
				false
			}
		}
	}

	fn writability_mode(&self) -> WritabilityMode {
		self.state.read().writability
	}

	fn set_writability_mode(&self, mode: WritabilityMode) {
		self.state.write().writability = mode;
	}
}
