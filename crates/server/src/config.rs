//! Backend configuration.
//!
//! The configuration is a TOML document with one table per backend, keyed by
//! the name of the configuration entry:
//!
//! ```toml
//! lock-directory = "/var/lib/suffixd/locks"
//!
//! [backends.userRoot]
//! backend-id = "userRoot"
//! class = "memory"
//! base-dns = ["dc=example,dc=com"]
//! writability-mode = "enabled"
//!
//! [backends.userRoot.properties]
//! entries = ["dc=example,dc=com", "ou=people,dc=example,dc=com"]
//! ```
//!
//! The entry name is the stable identity the coordinator tracks a backend by;
//! the backend ID is the runtime identifier and the lock file key.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use suffixd_primitives::{Dn, WritabilityMode};
use thiserror::Error;

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error reading a configuration file.
	#[error("I/O error reading {path}: {error}")]
	Io {
		path: PathBuf,
		error: std::io::Error,
	},

	/// Error decoding TOML.
	#[error("TOML parse error: {0}")]
	Toml(#[from] toml::de::Error),

	/// A backend entry has an empty backend ID.
	#[error("backend entry \"{name}\" has an empty backend-id")]
	EmptyBackendId { name: String },

	/// A backend entry has an empty class.
	#[error("backend entry \"{name}\" has an empty class")]
	EmptyClass { name: String },
}

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Root of the server configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct RootCfg {
	/// Directory holding the advisory backend lock files.
	#[serde(default)]
	pub lock_directory: Option<PathBuf>,
	/// Backend entries keyed by entry name.
	#[serde(default)]
	pub backends: BTreeMap<String, BackendCfg>,
}

impl RootCfg {
	/// Parses a configuration document.
	///
	/// # Errors
	///
	/// Returns [`ConfigError::Toml`] for malformed documents (including base
	/// DNs that do not parse) and a validation error for empty identifiers.
	pub fn from_toml_str(s: &str) -> Result<Self> {
		let mut root: RootCfg = toml::from_str(s)?;
		for (name, backend) in &mut root.backends {
			backend.name.clone_from(name);
			if backend.backend_id.trim().is_empty() {
				return Err(ConfigError::EmptyBackendId { name: name.clone() });
			}
			if backend.class.trim().is_empty() {
				return Err(ConfigError::EmptyClass { name: name.clone() });
			}
		}
		Ok(root)
	}

	/// Reads and parses a configuration file.
	pub fn load(path: &Path) -> Result<Self> {
		let content = std::fs::read_to_string(path).map_err(|error| ConfigError::Io {
			path: path.to_path_buf(),
			error,
		})?;
		Self::from_toml_str(&content)
	}

	/// Adds or replaces a backend entry under its own name.
	pub fn with_backend(mut self, backend: BackendCfg) -> Self {
		self.backends.insert(backend.name.clone(), backend);
		self
	}

	pub fn backend(&self, name: &str) -> Option<&BackendCfg> {
		self.backends.get(name)
	}
}

fn default_enabled() -> bool {
	true
}

/// Configuration of one backend entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct BackendCfg {
	/// Name of the configuration entry, filled in from the table key.
	#[serde(skip)]
	pub name: String,
	pub backend_id: String,
	/// Implementation class, resolved through the backend factories.
	pub class: String,
	#[serde(default = "default_enabled")]
	pub enabled: bool,
	#[serde(default)]
	pub base_dns: Vec<Dn>,
	#[serde(default)]
	pub writability_mode: WritabilityMode,
	/// Registers top-level base DNs as private naming contexts.
	#[serde(default)]
	pub private: bool,
	/// Implementation-specific settings.
	#[serde(default)]
	pub properties: toml::Table,
}

impl BackendCfg {
	/// An enabled entry whose backend ID equals its name.
	pub fn new(name: impl Into<String>, class: impl Into<String>) -> Self {
		let name = name.into();
		Self {
			backend_id: name.clone(),
			name,
			class: class.into(),
			enabled: true,
			base_dns: Vec::new(),
			writability_mode: WritabilityMode::default(),
			private: false,
			properties: toml::Table::new(),
		}
	}

	pub fn with_backend_id(mut self, backend_id: impl Into<String>) -> Self {
		self.backend_id = backend_id.into();
		self
	}

	pub fn with_class(mut self, class: impl Into<String>) -> Self {
		self.class = class.into();
		self
	}

	pub fn with_base_dns(mut self, base_dns: impl IntoIterator<Item = Dn>) -> Self {
		self.base_dns = base_dns.into_iter().collect();
		self
	}

	pub fn with_enabled(mut self, enabled: bool) -> Self {
		self.enabled = enabled;
		self
	}

	pub fn with_private(mut self, private: bool) -> Self {
		self.private = private;
		self
	}

	pub fn with_writability_mode(mut self, mode: WritabilityMode) -> Self {
		self.writability_mode = mode;
		self
	}

	pub fn with_property(mut self, key: impl Into<String>, value: impl Into<toml::Value>) -> Self {
		self.properties.insert(key.into(), value.into());
		self
	}

	/// Reads a property holding an array of DN strings. Absent means empty.
	///
	/// # Errors
	///
	/// Returns a description of the first malformed element.
	pub fn dn_list_property(&self, key: &str) -> std::result::Result<Vec<Dn>, String> {
		let Some(value) = self.properties.get(key) else {
			return Ok(Vec::new());
		};
		let Some(items) = value.as_array() else {
			return Err(format!("property \"{key}\" must be an array of DN strings"));
		};
		items
			.iter()
			.map(|item| {
				let s = item
					.as_str()
					.ok_or_else(|| format!("property \"{key}\" must be an array of DN strings"))?;
				Dn::parse(s).map_err(|e| format!("property \"{key}\": {e}"))
			})
			.collect()
	}
}
