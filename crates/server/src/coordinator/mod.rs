//! Backend coordinator: owner of the live routing table.
//!
//! # Purpose
//!
//! Start, reconfigure and stop backends while request threads keep routing
//! DNs against a consistent view of the namespace.
//!
//! # Mental model
//!
//! * Two snapshots are published through [`ArcSwap`]: the base DN
//!   [`Registry`] and the backend index (active backends by ID plus tracked
//!   configuration entries by name). Readers load them without locking.
//! * Every mutation takes the coordinator's single write lock, copies the
//!   current snapshot, mutates the copy and stores it. A failed mutation stores
//!   nothing.
//! * Internal helpers receive the write guard by reference; nothing re-locks.
//! * Validation (`is_configuration_*_acceptable`) never takes the write lock.
//!   It works on [`Registry::copy_for_checking_changes`], which touches no
//!   backend object and logs nothing.
//!
//! # Invariants
//!
//! * The ID index holds exactly the backends whose base DNs are registered.
//! * An active backend holds its shared advisory lock; the lock is released
//!   after the backend is deregistered and finalized.
//! * Listener notifications happen only on live changes, never during
//!   validation.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use arc_swap::{ArcSwap, ArcSwapOption};
use parking_lot::{Mutex, MutexGuard};
use suffixd_primitives::{Dn, ResultCode};
use suffixd_registry::{BackendAndName, LiveHooks, NamingContext, Registry, RegistryWarning, RoutedBackend};
use tracing::warn;

use crate::backend::{Backend, RootDseBackend};
use crate::config::BackendCfg;
use crate::error::DirectoryError;
use crate::listener::{BackendInitializationListener, Listeners};

mod config_listener;
mod index;
mod lifecycle;


pub use config_listener::BackendConfigListener;
pub use index::BackendState;
use index::BackendIndex;

/// The live routing table type.
pub type LiveRegistry = Registry<dyn Backend, LiveHooks>;

type WriteGuard<'a> = MutexGuard<'a, ()>;

/// Owner of the live registry snapshot and of backend lifecycles.
pub struct BackendCoordinator {
	registry: ArcSwap<LiveRegistry>,
	index: ArcSwap<BackendIndex>,
	write_lock: Mutex<()>,
	listeners: Listeners,
	shutting_down: Arc<AtomicBool>,
	root_dse: ArcSwapOption<RootDseBackend>,
}

impl Default for BackendCoordinator {
	fn default() -> Self {
		Self::new()
	}
}

impl BackendCoordinator {
	pub fn new() -> Self {
		let shutting_down = Arc::new(AtomicBool::new(false));
		let registry = Registry::with_hooks(LiveHooks::new(Arc::clone(&shutting_down)));
		Self {
			registry: ArcSwap::from_pointee(registry),
			index: ArcSwap::from_pointee(BackendIndex::default()),
			write_lock: Mutex::new(()),
			listeners: Listeners::default(),
			shutting_down,
			root_dse: ArcSwapOption::empty(),
		}
	}

	/// The current routing table snapshot.
	pub fn registry(&self) -> Arc<LiveRegistry> {
		self.registry.load_full()
	}

	pub fn is_shutting_down(&self) -> bool {
		self.shutting_down.load(Ordering::Acquire)
	}

	pub fn register_initialization_listener(&self, listener: Arc<dyn BackendInitializationListener>) {
		self.listeners.add(listener);
	}

	/// Returns false if `listener` was not registered.
	pub fn deregister_initialization_listener(&self, listener: &Arc<dyn BackendInitializationListener>) -> bool {
		self.listeners.remove(listener)
	}

	pub fn initialization_listener_count(&self) -> usize {
		self.listeners.len()
	}

	/// Registers `base_dn` for `backend` and publishes the new routing table.
	///
	/// # Errors
	///
	/// `unwillingToPerform` if the registration would break a namespace
	/// invariant. The published table is unchanged in that case.
	pub fn register_base_dn(
		&self,
		base_dn: &Dn,
		backend: &Arc<dyn Backend>,
		is_private: bool,
	) -> Result<(), DirectoryError> {
		let guard = self.write_lock.lock();
		let mut registry = self.registry.load().copy();
		let warnings = registry.register_base_dn(base_dn, backend, is_private)?;
		self.publish_registry(&guard, registry, warnings);
		Ok(())
	}

	/// Deregisters `base_dn` and publishes the new routing table.
	///
	/// # Errors
	///
	/// `unwillingToPerform` if `base_dn` is not registered.
	pub fn deregister_base_dn(&self, base_dn: &Dn) -> Result<(), DirectoryError> {
		let guard = self.write_lock.lock();
		let mut registry = self.registry.load().copy();
		let warnings = registry.deregister_base_dn(base_dn)?;
		self.publish_registry(&guard, registry, warnings);
		Ok(())
	}

	/// Adds `backend` to the ID index.
	///
	/// # Errors
	///
	/// `unwillingToPerform` if a backend with the same ID is already active.
	pub fn register_local_backend(&self, backend: &Arc<dyn Backend>) -> Result<(), DirectoryError> {
		let guard = self.write_lock.lock();
		self.register_local_backend_locked(&guard, backend)
	}

	/// Removes `backend` from the ID index.
	pub fn deregister_local_backend(&self, backend: &Arc<dyn Backend>) {
		let guard = self.write_lock.lock();
		self.deregister_local_backend_locked(&guard, backend);
	}

	fn register_local_backend_locked(
		&self,
		guard: &WriteGuard<'_>,
		backend: &Arc<dyn Backend>,
	) -> Result<(), DirectoryError> {
		let id = backend.backend_id();
		if self.index.load().by_id.contains_key(id) {
			return Err(DirectoryError::new(
				ResultCode::UnwillingToPerform,
				format!("a backend with ID {id} is already registered"),
			));
		}
		self.update_index(guard, |index| {
			index.by_id.insert(id.to_string(), Arc::clone(backend));
		});
		Ok(())
	}

	fn deregister_local_backend_locked(&self, guard: &WriteGuard<'_>, backend: &Arc<dyn Backend>) {
		self.update_index(guard, |index| {
			let id = backend.backend_id();
			if index
				.by_id
				.get(id)
				.is_some_and(|b| std::ptr::addr_eq(Arc::as_ptr(b), Arc::as_ptr(backend)))
			{
				index.by_id.remove(id);
			}
		});
	}

	fn publish_registry(&self, _guard: &WriteGuard<'_>, registry: LiveRegistry, warnings: Vec<RegistryWarning>) {
		debug_assert!(registry.check_invariants().is_ok());
		self.registry.store(Arc::new(registry));
		for warning in warnings {
			warn!(warning = %warning, "base DN registry");
		}
	}

	fn update_index(&self, _guard: &WriteGuard<'_>, f: impl FnOnce(&mut BackendIndex)) {
		let mut index = BackendIndex::clone(&self.index.load());
		f(&mut index);
		self.index.store(Arc::new(index));
	}

	/// All active backends, local or not.
	pub fn all_backends(&self) -> Vec<Arc<dyn Backend>> {
		self.index.load().by_id.values().cloned().collect()
	}

	/// Active local backends.
	pub fn local_backends(&self) -> Vec<Arc<dyn Backend>> {
		self.index
			.load()
			.by_id
			.values()
			.filter(|b| b.is_local())
			.cloned()
			.collect()
	}

	/// The active local backend with ID `backend_id`.
	pub fn local_backend(&self, backend_id: &str) -> Option<Arc<dyn Backend>> {
		self.index
			.load()
			.by_id
			.get(backend_id)
			.filter(|b| b.is_local())
			.cloned()
	}

	/// Returns true if a local backend with ID `backend_id` is active.
	pub fn has_local_backend(&self, backend_id: &str) -> bool {
		self.local_backend(backend_id).is_some()
	}

	/// Lifecycle state of the configuration entry `name`.
	pub fn backend_state(&self, name: &str) -> Option<BackendState> {
		self.index.load().configured.get(name).map(|c| c.state)
	}

	/// Last applied configuration of the entry `name`.
	pub fn backend_config(&self, name: &str) -> Option<BackendCfg> {
		self.index.load().configured.get(name).map(|c| c.cfg.clone())
	}

	/// Names of the tracked configuration entries.
	pub fn configured_backend_names(&self) -> Vec<String> {
		self.index.load().configured.keys().cloned().collect()
	}

	pub fn root_dse_backend(&self) -> Option<Arc<RootDseBackend>> {
		self.root_dse.load_full()
	}

	pub fn backend_with_base_dn(&self, base_dn: &Dn) -> Option<Arc<dyn Backend>> {
		self.registry.load().backend_with_base_dn(base_dn).cloned()
	}

	pub fn local_backend_with_base_dn(&self, base_dn: &Dn) -> Option<Arc<dyn Backend>> {
		self.registry.load().local_backend_with_base_dn(base_dn).cloned()
	}

	pub fn find_naming_context_for_entry(&self, entry_dn: &Dn) -> Option<Dn> {
		self.registry.load().find_naming_context_for_entry(entry_dn)
	}

	/// The backend (local or not) holding `entry_dn`, with the matched base DN.
	/// The root DN routes to the root DSE backend.
	pub fn backend_and_name(&self, entry_dn: &Dn) -> Option<BackendAndName<dyn Backend>> {
		if entry_dn.is_root() {
			return self.root_dse_and_name();
		}
		self.registry.load().backend_and_name(entry_dn)
	}

	/// The local backend holding `entry_dn`, with the matched base DN. The
	/// root DN routes to the root DSE backend.
	pub fn local_backend_and_name(&self, entry_dn: &Dn) -> Option<BackendAndName<dyn Backend>> {
		if entry_dn.is_root() {
			return self.root_dse_and_name();
		}
		self.registry.load().local_backend_and_name(entry_dn)
	}

	/// The local backend holding `entry_dn`.
	pub fn local_backend_for_entry(&self, entry_dn: &Dn) -> Option<Arc<dyn Backend>> {
		self.local_backend_and_name(entry_dn).map(|b| b.backend)
	}

	fn root_dse_and_name(&self) -> Option<BackendAndName<dyn Backend>> {
		let root_dse: Arc<dyn Backend> = self.root_dse.load_full()?;
		Some(BackendAndName {
			backend: root_dse,
			base_dn: Dn::root(),
		})
	}

	/// Base DNs registered directly below any base DN of the backend that owns
	/// `base_dn`, with their backends.
	pub fn subordinate_backends(&self, base_dn: &Dn) -> Vec<BackendAndName<dyn Backend>> {
		let registry = self.registry.load();
		let Some(owner) = registry.backend_with_base_dn(base_dn) else {
			return Vec::new();
		};
		registry
			.base_dns_of(owner)
			.iter()
			.filter_map(|dn| registry.subordinates_of(dn))
			.flatten()
			.filter_map(|child| {
				registry.backend_with_base_dn(child).map(|backend| BackendAndName {
					backend: Arc::clone(backend),
					base_dn: child.clone(),
				})
			})
			.collect()
	}

	pub fn public_naming_contexts(&self) -> BTreeMap<Dn, Arc<dyn Backend>> {
		self.registry.load().public_naming_contexts()
	}

	pub fn all_public_naming_contexts(&self) -> BTreeMap<Dn, Arc<dyn Backend>> {
		self.registry.load().all_public_naming_contexts()
	}

	pub fn private_naming_contexts(&self) -> BTreeMap<Dn, Arc<dyn Backend>> {
		self.registry.load().private_naming_contexts()
	}

	pub fn contains_naming_context(&self, dn: &Dn) -> bool {
		self.registry.load().contains_naming_context(dn)
	}

	/// Every registered naming context, parents before children.
	pub fn naming_contexts(&self) -> Vec<NamingContext> {
		self.registry.load().naming_contexts().cloned().collect()
	}
}
