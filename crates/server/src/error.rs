//! Error types for backend lifecycle operations.

use suffixd_primitives::{Dn, ResultCode, WritabilityMode};
use suffixd_registry::RegistryError;
use thiserror::Error;

/// Failures reported by backend implementations and the backend factory.
#[derive(Debug, Error)]
pub enum BackendError {
	/// No factory is registered for the configured class.
	#[error("no backend implementation is registered for class \"{class}\"")]
	UnknownClass { class: String },

	/// The configuration cannot be applied to the backend.
	#[error("invalid configuration for backend {backend}: {reason}")]
	Config { backend: String, reason: String },

	/// The backend failed to open.
	#[error("backend {backend} could not be opened: {reason}")]
	Open { backend: String, reason: String },

	/// The backend failed to release its resources.
	#[error("backend {backend} could not be finalized: {reason}")]
	Finalize { backend: String, reason: String },

	/// A write was refused by the backend's writability mode.
	#[error("backend {backend} does not accept this write (writability mode {mode:?})")]
	NotWritable { backend: String, mode: WritabilityMode },

	/// An entry lies outside every base DN of the backend.
	#[error("entry \"{dn}\" is not below any base DN of backend {backend}")]
	OutsideBaseDns { backend: String, dn: Dn },

	/// The operation needs an open backend.
	#[error("backend {backend} is not open")]
	NotOpen { backend: String },
}

/// Rejection of a direct registration API call, carried as a result code and
/// a message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct DirectoryError {
	pub result_code: ResultCode,
	pub message: String,
}

impl DirectoryError {
	pub fn new(result_code: ResultCode, message: impl Into<String>) -> Self {
		Self {
			result_code,
			message: message.into(),
		}
	}
}

impl From<RegistryError> for DirectoryError {
	fn from(err: RegistryError) -> Self {
		Self::new(err.result_code(), err.to_string())
	}
}
