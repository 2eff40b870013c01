use std::collections::BTreeMap;
use std::sync::Arc;

use crate::backend::Backend;
use crate::config::BackendCfg;

/// Observable lifecycle state of a configured backend.
///
/// Lock acquisition and opening happen inside one write-locked step, so the
/// intermediate states are never visible to readers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendState {
	/// Known to the coordinator but never started, or its last start failed.
	Unconfigured,
	/// Locked, opened and routable.
	Registered,
	/// Disabled by configuration; the configuration entry is kept.
	Disabled,
	/// Shut down with the server.
	Finalized,
}

/// A configuration entry the coordinator tracks, keyed by entry name.
#[derive(Clone)]
pub(super) struct ConfiguredBackend {
	pub(super) cfg: BackendCfg,
	pub(super) active: Option<Arc<dyn Backend>>,
	pub(super) state: BackendState,
}

impl ConfiguredBackend {
	pub(super) fn new(cfg: BackendCfg, state: BackendState, active: Option<Arc<dyn Backend>>) -> Self {
		Self { cfg, active, state }
	}
}

/// Published alongside the registry: active backends by ID and configuration
/// entries by name.
#[derive(Clone, Default)]
pub(super) struct BackendIndex {
	pub(super) by_id: BTreeMap<String, Arc<dyn Backend>>,
	pub(super) configured: BTreeMap<String, ConfiguredBackend>,
}
