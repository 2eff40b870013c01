//! Starting and stopping backends.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use suffixd_primitives::ResultCode;
use suffixd_registry::{RoutedBackend, same_backend};
use tracing::{debug, error, info, warn};

use super::index::ConfiguredBackend;
use super::{BackendCoordinator, BackendState, WriteGuard};
use crate::backend::{Backend, RootDseBackend};
use crate::change::ConfigChangeResult;
use crate::config::{BackendCfg, RootCfg};
use crate::context::ServerContext;
use crate::error::{BackendError, DirectoryError};
use crate::listener::Phase;
use crate::lock::backend_lock_file_name;

impl BackendCoordinator {
	/// Opens the root DSE backend and routes the root DN to it.
	///
	/// Calling it again while the root DSE is installed does nothing.
	pub fn initialize_root_dse_backend(&self, ctx: &ServerContext) -> Result<(), BackendError> {
		let _guard = self.write_lock.lock();
		if self.root_dse.load().is_some() {
			return Ok(());
		}
		let root_dse = Arc::new(RootDseBackend::new());
		let cfg = BackendCfg::new(RootDseBackend::BACKEND_ID, RootDseBackend::CLASS);
		root_dse.configure(&cfg, ctx)?;
		root_dse.open()?;
		root_dse.set_private_backend(true);
		self.root_dse.store(Some(root_dse));
		debug!("root DSE backend initialized");
		Ok(())
	}

	/// Starts the configured backends whose IDs are listed in `ids_to_start`
	/// (all of them when empty) and that are not already active.
	///
	/// One failing backend never prevents the others from starting. Returns
	/// the outcome per configuration entry name.
	pub fn initialize_backends(
		&self,
		ctx: &ServerContext,
		ids_to_start: &[String],
		root: &RootCfg,
	) -> BTreeMap<String, ConfigChangeResult> {
		let guard = self.write_lock.lock();
		let mut results = BTreeMap::new();
		for (name, cfg) in &root.backends {
			if !ids_to_start.is_empty() && !ids_to_start.contains(&cfg.backend_id) {
				continue;
			}
			if self.index.load().by_id.contains_key(&cfg.backend_id) {
				debug!(backend = %cfg.backend_id, "backend is already active");
				continue;
			}

			let mut ccr = ConfigChangeResult::new();
			if !cfg.enabled {
				debug!(backend = %cfg.backend_id, "backend is disabled and will not be initialized");
				ccr.add_message(format!("backend {} is disabled", cfg.backend_id));
				self.track(&guard, cfg, BackendState::Disabled, None);
				results.insert(name.clone(), ccr);
				continue;
			}

			match ctx.factories().instantiate(cfg) {
				Ok(backend) => {
					self.initialize_backend(&guard, ctx, &backend, cfg, &mut ccr);
				}
				Err(e) => {
					error!(backend = %cfg.backend_id, error = %e, "cannot instantiate backend");
					ccr.fail(ResultCode::server_error(), e.to_string());
					self.track(&guard, cfg, BackendState::Unconfigured, None);
				}
			}
			results.insert(name.clone(), ccr);
		}
		results
	}

	/// Finalizes every active backend and releases its lock.
	///
	/// Failures are logged; the remaining backends are still shut down.
	pub fn shutdown_local_backends(&self, ctx: &ServerContext) {
		let guard = self.write_lock.lock();
		self.shutting_down.store(true, Ordering::Release);

		let index = self.index.load_full();
		for backend in index.by_id.values() {
			let name = index
				.configured
				.iter()
				.find(|(_, c)| c.active.as_ref().is_some_and(|a| same_backend(a, backend)))
				.map(|(name, _)| name.clone());

			self.deregister_backend(&guard, backend);
			match name {
				Some(name) => {
					finalize_and_unlock(ctx, backend.as_ref());
					self.update_index(&guard, |index| {
						if let Some(configured) = index.configured.get_mut(&name) {
							configured.state = BackendState::Finalized;
							configured.active = None;
						}
					});
				}
				None => finalize(backend.as_ref()),
			}
		}

		if let Some(root_dse) = self.root_dse.swap(None) {
			finalize(root_dse.as_ref());
		}
		info!(count = index.by_id.len(), "local backends shut down");
	}

	/// Locks, configures, opens and registers `backend`. On failure every
	/// completed step is undone, the reason lands in `ccr` and the entry is
	/// tracked as unconfigured.
	pub(super) fn initialize_backend(
		&self,
		guard: &WriteGuard<'_>,
		ctx: &ServerContext,
		backend: &Arc<dyn Backend>,
		cfg: &BackendCfg,
		ccr: &mut ConfigChangeResult,
	) -> bool {
		let id = cfg.backend_id.as_str();
		backend.set_writability_mode(cfg.writability_mode);

		let lock_name = backend_lock_file_name(id);
		if let Err(e) = ctx.locks().acquire_shared_lock(&lock_name) {
			error!(backend = id, error = %e, "cannot acquire shared backend lock");
			ccr.fail(
				ResultCode::ConstraintViolation,
				format!("cannot acquire a shared lock on {lock_name} for backend {id}: {e}"),
			);
			ccr.set_admin_action_required();
			self.track(guard, cfg, BackendState::Unconfigured, None);
			return false;
		}

		if let Err(e) = backend.configure(cfg, ctx).and_then(|()| backend.open()) {
			error!(backend = id, class = %cfg.class, error = %e, "cannot initialize backend");
			ccr.fail(ResultCode::server_error(), e.to_string());
			release_lock(ctx, id);
			self.track(guard, cfg, BackendState::Unconfigured, None);
			return false;
		}

		if let Err(e) = self.register_backend(guard, backend, cfg) {
			error!(backend = id, error = %e, "cannot register backend");
			ccr.fail(e.result_code, format!("cannot register backend {id}: {e}"));
			finalize_and_unlock(ctx, backend.as_ref());
			self.track(guard, cfg, BackendState::Unconfigured, None);
			return false;
		}

		self.track(guard, cfg, BackendState::Registered, Some(Arc::clone(backend)));
		info!(backend = id, class = %cfg.class, base_dns = cfg.base_dns.len(), "backend registered");
		true
	}

	/// Makes `backend` routable: its ID and every configured base DN are
	/// published together. Nothing is published if any base DN is rejected.
	fn register_backend(
		&self,
		guard: &WriteGuard<'_>,
		backend: &Arc<dyn Backend>,
		cfg: &BackendCfg,
	) -> Result<(), DirectoryError> {
		// The live hooks touch the backend, so the whole batch must pass on a
		// checking copy first.
		let mut checked = self.registry.load().copy_for_checking_changes();
		for base_dn in &cfg.base_dns {
			checked.register_base_dn(base_dn, backend, cfg.private)?;
		}

		let mut registry = self.registry.load().copy();
		let mut warnings = Vec::new();
		for base_dn in &cfg.base_dns {
			warnings.extend(registry.register_base_dn(base_dn, backend, cfg.private)?);
		}

		self.register_local_backend_locked(guard, backend)?;
		self.listeners.notify(Phase::PreInit, backend.as_ref());
		self.publish_registry(guard, registry, warnings);
		self.listeners.notify(Phase::PostInit, backend.as_ref());
		Ok(())
	}

	/// Removes `backend` from routing. The caller finalizes it afterwards.
	pub(super) fn deregister_backend(&self, guard: &WriteGuard<'_>, backend: &Arc<dyn Backend>) {
		self.listeners.notify(Phase::PreFinalize, backend.as_ref());

		let mut registry = self.registry.load().copy();
		let mut warnings = Vec::new();
		for base_dn in registry.base_dns_of(backend) {
			match registry.deregister_base_dn(&base_dn) {
				Ok(w) => warnings.extend(w),
				Err(e) => warn!(backend = backend.backend_id(), error = %e, "cannot deregister base DN"),
			}
		}
		self.publish_registry(guard, registry, warnings);
		self.deregister_local_backend_locked(guard, backend);

		self.listeners.notify(Phase::PostFinalize, backend.as_ref());
	}

	/// Records the configuration entry `cfg` with `state`.
	pub(super) fn track(
		&self,
		guard: &WriteGuard<'_>,
		cfg: &BackendCfg,
		state: BackendState,
		active: Option<Arc<dyn Backend>>,
	) {
		self.update_index(guard, |index| {
			index
				.configured
				.insert(cfg.name.clone(), ConfiguredBackend::new(cfg.clone(), state, active));
		});
	}
}

pub(super) fn finalize(backend: &dyn Backend) {
	if let Err(e) = backend.finalize() {
		warn!(backend = backend.backend_id(), error = %e, "cannot finalize backend");
	}
}

pub(super) fn release_lock(ctx: &ServerContext, backend_id: &str) {
	if let Err(e) = ctx.locks().release_lock(&backend_lock_file_name(backend_id)) {
		warn!(backend = backend_id, error = %e, "cannot release shared backend lock");
	}
}

pub(super) fn finalize_and_unlock(ctx: &ServerContext, backend: &dyn Backend) {
	finalize(backend);
	release_lock(ctx, backend.backend_id());
}
