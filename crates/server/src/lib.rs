//! Backend lifecycle and request routing for the suffixd directory server.
//!
//! # Purpose
//!
//! Start the configured backends, keep the namespace they serve consistent as
//! configuration entries come and go, and route every DN to the backend that
//! owns it.
//!
//! # Key types
//!
//! | Type | Meaning |
//! |---|---|
//! | [`ServerContext`] | Handles to the coordinator, lock manager and backend factories |
//! | [`BackendCoordinator`] | Owner of the live routing table and of backend lifecycles |
//! | [`BackendConfigListener`] | Validate/apply contract for backend configuration entries |
//! | [`Backend`] | Lifecycle contract of a backend implementation |
//! | [`LockManager`] | Advisory per-backend locks shared with offline tools |
//! | [`ConfigChangeResult`] | Result code, admin-action flag and messages of a change |
//!
//! # Lifecycle of a configured backend
//!
//! ```text
//! Unconfigured ─lock─▶ Locked ─configure+open─▶ Registered ⇄ Disabled
//!       ▲                 │                        │
//!       └──── failure ────┘                        └─ delete / shutdown ─▶ Finalized
//! ```
//!
//! `Locked` is never observable: the coordinator holds its write lock from
//! lock acquisition until the backend is registered or rolled back.

pub mod backend;
mod change;
pub mod config;
mod context;
pub mod coordinator;
mod error;
mod listener;
pub mod lock;

pub use backend::{Backend, BackendFactories, BackendFactory, MemoryBackend, ProxyBackend, RootDseBackend};
pub use change::ConfigChangeResult;
pub use config::{BackendCfg, ConfigError, RootCfg};
pub use context::ServerContext;
pub use coordinator::{BackendConfigListener, BackendCoordinator, BackendState, LiveRegistry};
pub use error::{BackendError, DirectoryError};
pub use listener::BackendInitializationListener;
pub use lock::{FileLockManager, LockError, LockManager, backend_lock_file_name};
