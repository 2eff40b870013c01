use serde::{Deserialize, Serialize};

/// Which write operations a backend accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WritabilityMode {
	/// All writes are accepted.
	#[default]
	Enabled,
	/// No writes are accepted.
	Disabled,
	/// Only internal operations (replication, server tasks) may write.
	InternalOnly,
}

impl WritabilityMode {
	/// Returns true if a write originating from `internal` code is accepted.
	pub fn allows_write(self, internal: bool) -> bool {
		match self {
			Self::Enabled => true,
			Self::Disabled => false,
			Self::InternalOnly => internal,
		}
	}
}
