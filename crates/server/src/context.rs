use std::sync::Arc;

use crate::backend::BackendFactories;
use crate::coordinator::BackendCoordinator;
use crate::lock::LockManager;

/// Handles to the server subsystems, passed explicitly to every operation
/// that needs them.
///
/// Cloning is cheap; clones share the subsystems.
#[derive(Clone)]
pub struct ServerContext {
	coordinator: Arc<BackendCoordinator>,
	locks: Arc<dyn LockManager>,
	factories: Arc<BackendFactories>,
}

impl ServerContext {
	/// A context with a fresh, empty coordinator.
	pub fn new(locks: Arc<dyn LockManager>, factories: BackendFactories) -> Self {
		Self {
			coordinator: Arc::new(BackendCoordinator::new()),
			locks,
			factories: Arc::new(factories),
		}
	}

	pub fn coordinator(&self) -> &Arc<BackendCoordinator> {
		&self.coordinator
	}

	pub fn locks(&self) -> &dyn LockManager {
		self.locks.as_ref()
	}

	pub fn factories(&self) -> &BackendFactories {
		&self.factories
	}
}
