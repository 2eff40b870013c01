//! Base DN registry: the routing table that maps directory namespaces to the
//! backends that own them.
//!
//! # Purpose
//!
//! Answer "which backend owns DN X" for every request, and validate changes to
//! that mapping without ever exposing a half-applied state.
//!
//! # Mental model
//!
//! * A [`Registry`] is a value. Mutating methods take `&mut self` and either
//!   apply a change completely or return a [`RegistryError`] having touched
//!   nothing.
//! * The owner of the live registry never mutates the published value. It
//!   [`copy`](Registry::copy)s it, mutates the copy and publishes the copy.
//! * Validation runs on [`Registry::copy_for_checking_changes`], which swaps the
//!   [`LiveHooks`] strategy for [`CheckingHooks`]. The checking variant never
//!   calls into backend objects and never produces warnings.
//!
//! # Key types
//!
//! | Type | Meaning | Constraints |
//! |---|---|---|
//! | [`Registry`] | DN → backend routing table | Invariants below hold after every successful mutation |
//! | [`NamingContext`] | Metadata of one registered base DN | Replaced, never mutated |
//! | [`RoutedBackend`] | What the registry needs from a backend | Compared by identity |
//! | [`RegistryHooks`] | Side effects of a mutation | No-ops in the checking variant |
//!
//! # Invariants
//!
//! 1. A DN is registered for at most one backend.
//! 2. No two base DNs of one backend are ancestor and descendant.
//! 3. All base DNs of one backend share the same nearest registered ancestor
//!    (or all have none).
//! 4. `subordinates[p]` holds exactly the base DNs whose nearest registered
//!    strict ancestor is `p`, and is absent rather than empty.
//! 5. A naming context is a sub-suffix iff its base DN has a registered ancestor.
//! 6. The local map holds exactly the entries of the main map whose backend is local.
//!
//! [`Registry::check_invariants`] verifies all of them.

mod backend;
mod error;
mod hooks;
mod naming_context;
mod registry;

pub use backend::{BackendAndName, RoutedBackend, same_backend};
pub use error::{RegistryError, RegistryWarning};
pub use hooks::{CheckingHooks, LiveHooks, RegistryHooks};
pub use naming_context::NamingContext;
pub use registry::Registry;
