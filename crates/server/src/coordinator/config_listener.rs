//! Reaction to backend configuration entries being added, changed or deleted.
//!
//! Every change arrives in two steps. The `is_configuration_*_acceptable`
//! step validates against a checking copy of the routing table and leaves all
//! published state alone; the `apply_configuration_*` step takes the write
//! lock and commits.

use std::sync::Arc;

use suffixd_primitives::ResultCode;
use suffixd_registry::{Registry, RegistryError, RegistryHooks, RegistryWarning, RoutedBackend};
use tracing::{debug, info, warn};

use super::lifecycle::finalize_and_unlock;
use super::{BackendCoordinator, BackendState, WriteGuard};
use crate::backend::Backend;
use crate::change::ConfigChangeResult;
use crate::config::BackendCfg;
use crate::context::ServerContext;

/// Configuration-listener contract for backend entries.
pub trait BackendConfigListener {
	/// Validates a new backend entry without side effects.
	fn is_configuration_add_acceptable(&self, ctx: &ServerContext, cfg: &BackendCfg) -> ConfigChangeResult;

	/// Starts the backend described by a new entry, unless it is disabled.
	fn apply_configuration_add(&self, ctx: &ServerContext, cfg: &BackendCfg) -> ConfigChangeResult;

	/// Validates a modified backend entry without side effects.
	fn is_configuration_change_acceptable(&self, ctx: &ServerContext, cfg: &BackendCfg) -> ConfigChangeResult;

	/// Enables, disables or reconfigures the backend of a modified entry.
	fn apply_configuration_change(&self, ctx: &ServerContext, cfg: &BackendCfg) -> ConfigChangeResult;

	/// Validates the removal of a backend entry without side effects.
	fn is_configuration_delete_acceptable(&self, ctx: &ServerContext, cfg: &BackendCfg) -> ConfigChangeResult;

	/// Stops the backend of a removed entry and forgets the entry.
	fn apply_configuration_delete(&self, ctx: &ServerContext, cfg: &BackendCfg) -> ConfigChangeResult;
}

impl BackendConfigListener for BackendCoordinator {
	fn is_configuration_add_acceptable(&self, ctx: &ServerContext, cfg: &BackendCfg) -> ConfigChangeResult {
		self.check_new_backend(ctx, cfg)
	}

	fn apply_configuration_add(&self, ctx: &ServerContext, cfg: &BackendCfg) -> ConfigChangeResult {
		let guard = self.write_lock.lock();
		let mut ccr = ConfigChangeResult::new();

		if !cfg.enabled {
			debug!(backend = %cfg.backend_id, "backend is disabled and will not be initialized");
			ccr.add_message(format!("backend {} is disabled", cfg.backend_id));
			self.track(&guard, cfg, BackendState::Disabled, None);
			return ccr;
		}

		if self.index.load().by_id.contains_key(&cfg.backend_id) {
			warn!(entry = %cfg.name, backend = %cfg.backend_id, "duplicate backend ID, entry ignored");
			ccr.add_message(format!(
				"backend entry {} uses ID {} which is already in use; the entry is ignored",
				cfg.name, cfg.backend_id
			));
			if self.active_backend(&cfg.name).is_none() {
				self.track(&guard, cfg, BackendState::Unconfigured, None);
			}
			return ccr;
		}

		match ctx.factories().instantiate(cfg) {
			Ok(backend) => {
				self.initialize_backend(&guard, ctx, &backend, cfg, &mut ccr);
			}
			Err(e) => {
				ccr.fail(ResultCode::server_error(), format!("backend entry {}: {e}", cfg.name));
				self.track(&guard, cfg, BackendState::Unconfigured, None);
			}
		}
		ccr
	}

	fn is_configuration_change_acceptable(&self, ctx: &ServerContext, cfg: &BackendCfg) -> ConfigChangeResult {
		let Some(backend) = self.active_backend(&cfg.name) else {
			if cfg.enabled {
				return self.check_new_backend(ctx, cfg);
			}
			return ConfigChangeResult::new();
		};
		if !cfg.enabled {
			return ConfigChangeResult::new();
		}

		let mut registry = self.registry.load().copy_for_checking_changes();
		if let Err(e) = apply_base_dn_diff(&mut registry, &backend, cfg) {
			return ConfigChangeResult::failure(e.result_code(), e.to_string());
		}

		if cfg.class == backend.class_name() {
			let mut reasons = Vec::new();
			if !backend.is_configuration_acceptable(cfg, &mut reasons) {
				return rejected(cfg, reasons);
			}
		}
		ConfigChangeResult::new()
	}

	fn apply_configuration_change(&self, ctx: &ServerContext, cfg: &BackendCfg) -> ConfigChangeResult {
		let guard = self.write_lock.lock();
		let mut ccr = ConfigChangeResult::new();
		let active = self.active_backend(&cfg.name);

		let Some(backend) = active else {
			if !cfg.enabled {
				self.track(&guard, cfg, BackendState::Disabled, None);
				return ccr;
			}
			match ctx.factories().instantiate(cfg) {
				Ok(backend) => {
					self.initialize_backend(&guard, ctx, &backend, cfg, &mut ccr);
				}
				Err(e) => {
					ccr.fail(ResultCode::ConstraintViolation, format!("backend entry {}: {e}", cfg.name));
					self.track(&guard, cfg, BackendState::Unconfigured, None);
				}
			}
			return ccr;
		};

		if !cfg.enabled {
			self.deregister_backend(&guard, &backend);
			finalize_and_unlock(ctx, backend.as_ref());
			self.track(&guard, cfg, BackendState::Disabled, None);
			info!(backend = %cfg.backend_id, "backend disabled");
			return ccr;
		}

		if cfg.class != backend.class_name() {
			self.report_class_change(ctx, &backend, cfg, &mut ccr);
			return ccr;
		}

		if let Err(e) = self.apply_base_dn_changes(&guard, &backend, cfg) {
			ccr.fail(e.result_code(), e.to_string());
			return ccr;
		}
		backend.set_writability_mode(cfg.writability_mode);
		self.track(&guard, cfg, BackendState::Registered, Some(backend));
		ccr
	}

	fn is_configuration_delete_acceptable(&self, _ctx: &ServerContext, cfg: &BackendCfg) -> ConfigChangeResult {
		match self.active_backend(&cfg.name) {
			Some(backend) if self.registry.load().has_subordinates(&backend) => has_subordinates(cfg),
			_ => ConfigChangeResult::new(),
		}
	}

	fn apply_configuration_delete(&self, ctx: &ServerContext, cfg: &BackendCfg) -> ConfigChangeResult {
		let guard = self.write_lock.lock();
		if let Some(backend) = self.active_backend(&cfg.name) {
			if self.registry.load().has_subordinates(&backend) {
				return has_subordinates(cfg);
			}
			self.deregister_backend(&guard, &backend);
			finalize_and_unlock(ctx, backend.as_ref());
			info!(backend = backend.backend_id(), "backend deleted");
		}
		self.update_index(&guard, |index| {
			index.configured.remove(&cfg.name);
		});
		ConfigChangeResult::new()
	}
}

impl BackendCoordinator {
	fn active_backend(&self, name: &str) -> Option<Arc<dyn Backend>> {
		self.index.load().configured.get(name).and_then(|c| c.active.clone())
	}

	/// Validation shared by a new entry and an entry being enabled.
	fn check_new_backend(&self, ctx: &ServerContext, cfg: &BackendCfg) -> ConfigChangeResult {
		if self.index.load().by_id.contains_key(&cfg.backend_id) {
			return ConfigChangeResult::failure(
				ResultCode::UnwillingToPerform,
				format!(
					"backend entry {}: a backend with ID {} is already registered",
					cfg.name, cfg.backend_id
				),
			);
		}

		let backend = match ctx.factories().instantiate(cfg) {
			Ok(backend) => backend,
			Err(e) => {
				return ConfigChangeResult::failure(
					ResultCode::server_error(),
					format!("backend entry {}: {e}", cfg.name),
				);
			}
		};

		let mut registry = self.registry.load().copy_for_checking_changes();
		for base_dn in &cfg.base_dns {
			if let Err(e) = registry.register_base_dn(base_dn, &backend, cfg.private) {
				return ConfigChangeResult::failure(e.result_code(), e.to_string());
			}
		}

		let mut reasons = Vec::new();
		if !backend.is_configuration_acceptable(cfg, &mut reasons) {
			return rejected(cfg, reasons);
		}
		ConfigChangeResult::new()
	}

	/// A new class only takes effect after a restart; the running backend is
	/// left as is.
	fn report_class_change(
		&self,
		ctx: &ServerContext,
		backend: &Arc<dyn Backend>,
		cfg: &BackendCfg,
		ccr: &mut ConfigChangeResult,
	) {
		match ctx.factories().instantiate(cfg) {
			Ok(candidate) if candidate.is_local() => {
				ccr.add_message(format!(
					"backend {} must be restarted to change its class from {} to {}",
					cfg.backend_id,
					backend.class_name(),
					cfg.class
				));
				ccr.set_admin_action_required();
			}
			Ok(_) => ccr.fail(
				ResultCode::ConstraintViolation,
				format!("class {} of backend entry {} is not a local backend", cfg.class, cfg.name),
			),
			Err(e) => ccr.fail(ResultCode::server_error(), format!("backend entry {}: {e}", cfg.name)),
		}
	}

	/// Re-registers the base DNs of an active backend and publishes the
	/// result as one snapshot. The diff is replayed on the live copy only once
	/// it succeeded on a checking copy.
	fn apply_base_dn_changes(
		&self,
		guard: &WriteGuard<'_>,
		backend: &Arc<dyn Backend>,
		cfg: &BackendCfg,
	) -> Result<(), RegistryError> {
		apply_base_dn_diff(&mut self.registry.load().copy_for_checking_changes(), backend, cfg)?;
		let mut registry = self.registry.load().copy();
		let warnings = apply_base_dn_diff(&mut registry, backend, cfg)?;
		self.publish_registry(guard, registry, warnings);
		backend.set_base_dns(cfg.base_dns.clone());
		debug!(backend = backend.backend_id(), "base DNs updated");
		Ok(())
	}
}

/// Deregisters the base DNs `backend` no longer has in `cfg`, then registers
/// the new ones.
fn apply_base_dn_diff<H: RegistryHooks<dyn Backend>>(
	registry: &mut Registry<dyn Backend, H>,
	backend: &Arc<dyn Backend>,
	cfg: &BackendCfg,
) -> Result<Vec<RegistryWarning>, RegistryError> {
	let current = registry.base_dns_of(backend);
	let mut warnings = Vec::new();
	for base_dn in current.iter().filter(|dn| !cfg.base_dns.contains(dn)) {
		warnings.extend(registry.deregister_base_dn(base_dn)?);
	}
	for base_dn in cfg.base_dns.iter().filter(|dn| !current.contains(dn)) {
		warnings.extend(registry.register_base_dn(base_dn, backend, cfg.private)?);
	}
	Ok(warnings)
}

fn rejected(cfg: &BackendCfg, mut reasons: Vec<String>) -> ConfigChangeResult {
	if reasons.is_empty() {
		reasons.push(format!("backend {} rejected its configuration", cfg.backend_id));
	}
	ConfigChangeResult {
		result_code: ResultCode::ConstraintViolation,
		admin_action_required: false,
		messages: reasons,
	}
}

fn has_subordinates(cfg: &BackendCfg) -> ConfigChangeResult {
	ConfigChangeResult::failure(
		ResultCode::UnwillingToPerform,
		format!(
			"backend {} cannot be removed while other backends are registered below its base DNs",
			cfg.backend_id
		),
	)
}
