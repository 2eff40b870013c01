use std::sync::Arc;

use pretty_assertions::assert_eq;
use suffixd_primitives::{Dn, WritabilityMode};
use suffixd_registry::RoutedBackend;

use super::*;
use crate::lock::FileLockManager;

fn dn(s: &str) -> Dn {
	Dn::parse(s).unwrap()
}

fn context() -> (tempfile::TempDir, ServerContext) {
	let dir = tempfile::tempdir().unwrap();
	let locks = Arc::new(FileLockManager::new(dir.path()).unwrap());
	let ctx = ServerContext::new(locks, BackendFactories::with_builtins());
	(dir, ctx)
}

fn open_memory(cfg: &BackendCfg) -> MemoryBackend {
	let (_dir, ctx) = context();
	let backend = MemoryBackend::new(&cfg.backend_id);
	backend.configure(cfg, &ctx).unwrap();
	backend.open().unwrap();
	backend
}

#[test]
fn test_memory_backend_preloads_entries() {
	let cfg = BackendCfg::new("userRoot", BackendFactories::MEMORY)
		.with_base_dns([dn("dc=example,dc=com")])
		.with_property("entries", vec!["dc=example,dc=com", "ou=people,dc=example,dc=com"]);
	let backend = open_memory(&cfg);

	assert!(backend.is_open());
	assert_eq!(backend.entry_count(), 2);
	assert!(backend.entry_exists(&dn("OU=People,DC=Example,DC=Com")));
	assert!(!backend.entry_exists(&dn("cn=bob,ou=people,dc=example,dc=com")));

	backend.finalize().unwrap();
	assert!(!backend.is_open());
	assert_eq!(backend.entry_count(), 0);
}

#[test]
fn test_memory_backend_write_rules() {
	let cfg = BackendCfg::new("userRoot", BackendFactories::MEMORY).with_base_dns([dn("dc=example,dc=com")]);
	let backend = open_memory(&cfg);

	assert!(backend.add_entry(dn("cn=a,dc=example,dc=com"), false).unwrap());
	assert!(!backend.add_entry(dn("cn=a,dc=example,dc=com"), false).unwrap());
	assert!(matches!(
		backend.add_entry(dn("cn=a,dc=example,dc=org"), false),
		Err(BackendError::OutsideBaseDns { .. })
	));

	backend.set_writability_mode(WritabilityMode::InternalOnly);
	assert!(matches!(
		backend.add_entry(dn("cn=b,dc=example,dc=com"), false),
		Err(BackendError::NotWritable { .. })
	));
	assert!(backend.add_entry(dn("cn=b,dc=example,dc=com"), true).unwrap());

	backend.set_writability_mode(WritabilityMode::Disabled);
	assert!(matches!(
		backend.remove_entry(&dn("cn=b,dc=example,dc=com"), true),
		Err(BackendError::NotWritable { .. })
	));

	backend.finalize().unwrap();
	assert!(matches!(
		backend.add_entry(dn("cn=c,dc=example,dc=com"), true),
		Err(BackendError::NotOpen { .. })
	));
}

#[test]
fn test_memory_backend_configuration_checks() {
	let (_dir, ctx) = context();
	let backend = MemoryBackend::new("userRoot");
	let mut reasons = Vec::new();

	let no_base = BackendCfg::new("userRoot", BackendFactories::MEMORY);
	assert!(!backend.is_configuration_acceptable(&no_base, &mut reasons));
	assert!(matches!(backend.configure(&no_base, &ctx), Err(BackendError::Config { .. })));
	assert!(matches!(backend.open(), Err(BackendError::Open { .. })));

	let stray = no_base
		.clone()
		.with_base_dns([dn("dc=example,dc=com")])
		.with_property("entries", vec!["o=elsewhere"]);
	assert!(!backend.is_configuration_acceptable(&stray, &mut reasons));
	assert_eq!(reasons.len(), 2);
	assert!(reasons.iter().all(|r| r.starts_with("backend userRoot:")));

	let good = no_base.with_base_dns([dn("dc=example,dc=com")]);
	assert!(backend.is_configuration_acceptable(&good, &mut reasons));
	assert_eq!(reasons.len(), 2);
}

#[test]
fn test_memory_backend_records_private_flag() {
	let backend = MemoryBackend::new("schema");
	assert!(!backend.is_private());
	backend.set_private_backend(true);
	assert!(backend.is_private());
}

#[test]
fn test_proxy_backend_is_remote_and_empty() {
	let (_dir, ctx) = context();
	let cfg = BackendCfg::new("remote", BackendFactories::PROXY).with_base_dns([dn("o=remote")]);
	let backend = ProxyBackend::new("remote");
	let mut reasons = Vec::new();

	assert!(backend.is_configuration_acceptable(&cfg, &mut reasons));
	backend.configure(&cfg, &ctx).unwrap();
	backend.open().unwrap();
	assert!(!backend.is_local());
	assert!(!backend.entry_exists(&dn("o=remote")));
	assert_eq!(backend.base_dns(), vec![dn("o=remote")]);

	assert!(!backend.is_configuration_acceptable(
		&BackendCfg::new("remote", BackendFactories::PROXY),
		&mut reasons
	));
	assert_eq!(reasons.len(), 1);
}

#[test]
fn test_root_dse_serves_only_the_root_entry() {
	let backend = RootDseBackend::new();
	assert!(!backend.entry_exists(&Dn::root()));
	backend.open().unwrap();
	assert!(backend.entry_exists(&Dn::root()));
	assert!(!backend.entry_exists(&dn("dc=com")));
	assert_eq!(backend.base_dns(), vec![Dn::root()]);
	assert_eq!(backend.writability_mode(), WritabilityMode::Disabled);
}

#[test]
fn test_factories_resolve_by_class() {
	let factories = BackendFactories::with_builtins();
	assert!(factories.contains(BackendFactories::MEMORY));
	assert!(factories.contains(BackendFactories::PROXY));

	let memory = factories
		.instantiate(&BackendCfg::new("userRoot", BackendFactories::MEMORY))
		.unwrap();
	assert_eq!(memory.backend_id(), "userRoot");
	assert_eq!(memory.class_name(), BackendFactories::MEMORY);
	assert!(memory.is_local());

	let proxy = factories
		.instantiate(&BackendCfg::new("remote", BackendFactories::PROXY).with_backend_id("remote1"))
		.unwrap();
	assert_eq!(proxy.backend_id(), "remote1");
	assert!(!proxy.is_local());

	let err = factories
		.instantiate(&BackendCfg::new("x", "ldif"))
		.err()
		.unwrap();
	assert_eq!(err.to_string(), "no backend implementation is registered for class \"ldif\"");
	assert!(BackendFactories::new().instantiate(&BackendCfg::new("x", "memory")).is_err());
}
