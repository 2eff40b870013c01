use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use suffixd_primitives::{Dn, ResultCode};

use super::Registry;
use crate::{CheckingHooks, LiveHooks, RegistryError, RegistryWarning, RoutedBackend};

struct TestBackend {
	id: String,
	local: bool,
	entries: Vec<Dn>,
	private: AtomicBool,
	private_calls: AtomicUsize,
}

impl TestBackend {
	fn new(id: &str) -> Arc<Self> {
		Self::build(id, true, &[])
	}

	fn remote(id: &str) -> Arc<Self> {
		Self::build(id, false, &[])
	}

	fn with_entries(id: &str, entries: &[&str]) -> Arc<Self> {
		Self::build(id, true, entries)
	}

	/// A distinct backend object with the same ID.
	fn clone_for_test(&self) -> Arc<Self> {
		Self::build(&self.id, self.local, &[])
	}

	fn build(id: &str, local: bool, entries: &[&str]) -> Arc<Self> {
		Arc::new(Self {
			id: id.to_string(),
			local,
			entries: entries.iter().map(|e| dn(e)).collect(),
			private: AtomicBool::new(false),
			private_calls: AtomicUsize::new(0),
		})
	}
}

impl RoutedBackend for TestBackend {
	fn backend_id(&self) -> &str {
		&self.id
	}

	fn is_local(&self) -> bool {
		self.local
	}

	fn entry_exists(&self, dn: &Dn) -> bool {
		self.entries.contains(dn)
	}

	fn set_private_backend(&self, private: bool) {
		self.private.store(private, Ordering::SeqCst);
		self.private_calls.fetch_add(1, Ordering::SeqCst);
	}
}

type TestRegistry = Registry<TestBackend>;

fn dn(s: &str) -> Dn {
	Dn::parse(s).unwrap()
}

fn register(reg: &mut TestRegistry, base: &str, backend: &Arc<TestBackend>) -> Vec<RegistryWarning> {
	let warnings = reg.register_base_dn(&dn(base), backend, false).unwrap();
	reg.check_invariants().unwrap();
	warnings
}

fn subordinates(reg: &TestRegistry, base: &str) -> Vec<String> {
	reg.subordinates_of(&dn(base))
		.map(|set| set.iter().map(ToString::to_string).collect())
		.unwrap_or_default()
}

fn is_sub_suffix(reg: &TestRegistry, base: &str) -> bool {
	reg.naming_context(&dn(base)).unwrap().is_sub_suffix()
}

#[test]
fn test_sub_suffix_routing() {
	let x = TestBackend::new("X");
	let y = TestBackend::new("Y");
	let mut reg = TestRegistry::default();

	register(&mut reg, "dc=com", &x);
	register(&mut reg, "ou=people,dc=com", &y);

	assert_eq!(subordinates(&reg, "dc=com"), vec!["ou=people,dc=com"]);
	assert_eq!(
		reg.find_naming_context_for_entry(&dn("cn=bob,ou=people,dc=com")),
		Some(dn("ou=people,dc=com"))
	);
	assert_eq!(
		reg.find_naming_context_for_entry(&dn("ou=groups,dc=com")),
		Some(dn("dc=com"))
	);
	assert!(!is_sub_suffix(&reg, "dc=com"));
	assert!(is_sub_suffix(&reg, "ou=people,dc=com"));
}

#[test]
fn test_related_base_dns_of_one_backend_rejected() {
	let x = TestBackend::new("X");
	let mut reg = TestRegistry::default();
	register(&mut reg, "dc=com", &x);
	register(&mut reg, "o=other", &x);
	let before = reg.copy();

	let err = reg
		.register_base_dn(&dn("dc=example,dc=com"), &x, false)
		.unwrap_err();

	assert_eq!(
		err,
		RegistryError::HierarchyConflict {
			base_dn: dn("dc=example,dc=com"),
			backend: "X".into(),
			other: dn("dc=com"),
		}
	);
	assert_eq!(err.result_code(), ResultCode::UnwillingToPerform);
	assert!(reg == before);
}

#[test]
fn test_subordinates_block_backend_removal_until_deregistered() {
	let x = TestBackend::new("X");
	let y = TestBackend::new("Y");
	let mut reg = TestRegistry::default();
	register(&mut reg, "dc=com", &x);
	register(&mut reg, "ou=a,dc=com", &y);
	register(&mut reg, "ou=b,dc=com", &y);

	assert!(reg.has_subordinates(&x));
	assert!(!reg.has_subordinates(&y));

	reg.deregister_base_dn(&dn("ou=a,dc=com")).unwrap();
	reg.deregister_base_dn(&dn("ou=b,dc=com")).unwrap();
	reg.check_invariants().unwrap();
	assert!(!reg.has_subordinates(&x));

	reg.deregister_base_dn(&dn("dc=com")).unwrap();
	assert!(reg.is_empty());
	reg.check_invariants().unwrap();
}

#[test]
fn test_deregistration_promotes_subordinates() {
	let a = TestBackend::new("A");
	let b = TestBackend::new("B");
	let c = TestBackend::new("C");
	let mut reg = TestRegistry::default();
	register(&mut reg, "dc=com", &a);
	register(&mut reg, "dc=example,dc=com", &b);
	register(&mut reg, "ou=people,dc=example,dc=com", &c);

	let warnings = reg.deregister_base_dn(&dn("dc=example,dc=com")).unwrap();
	reg.check_invariants().unwrap();
	assert_eq!(
		warnings,
		vec![RegistryWarning::MissingHierarchy {
			base_dn: dn("dc=example,dc=com"),
			backend: "B".into(),
		}]
	);
	assert_eq!(
		reg.nearest_registered_ancestor(&dn("ou=people,dc=example,dc=com")),
		Some(dn("dc=com"))
	);
	assert_eq!(subordinates(&reg, "dc=com"), vec!["ou=people,dc=example,dc=com"]);
	assert!(is_sub_suffix(&reg, "ou=people,dc=example,dc=com"));

	let warnings = reg.deregister_base_dn(&dn("dc=com")).unwrap();
	reg.check_invariants().unwrap();
	assert!(warnings.is_empty());
	assert!(!is_sub_suffix(&reg, "ou=people,dc=example,dc=com"));
	assert!(reg.subordinates_of(&dn("dc=com")).is_none());
}

#[test]
fn test_intermediate_base_dn_adopts_existing_subordinates() {
	let x = TestBackend::new("X");
	let y = TestBackend::new("Y");
	let z = TestBackend::new("Z");
	let mut reg = TestRegistry::default();
	register(&mut reg, "dc=com", &x);
	register(&mut reg, "cn=a,ou=people,dc=com", &z);
	register(&mut reg, "cn=b,ou=people,dc=com", &z);
	register(&mut reg, "ou=groups,dc=com", &x.clone_for_test());

	register(&mut reg, "ou=people,dc=com", &y);

	assert_eq!(
		subordinates(&reg, "ou=people,dc=com"),
		vec!["cn=a,ou=people,dc=com", "cn=b,ou=people,dc=com"]
	);
	assert_eq!(subordinates(&reg, "dc=com"), vec!["ou=groups,dc=com", "ou=people,dc=com"]);
	assert!(is_sub_suffix(&reg, "ou=people,dc=com"));
	assert_eq!(
		reg.find_naming_context_for_entry(&dn("uid=u,cn=a,ou=people,dc=com")),
		Some(dn("cn=a,ou=people,dc=com"))
	);
}

#[test]
fn test_top_level_base_dn_adopts_existing_top_level() {
	let x = TestBackend::new("X");
	let y = TestBackend::new("Y");
	let mut reg = TestRegistry::default();
	register(&mut reg, "ou=people,dc=com", &y);
	assert!(!is_sub_suffix(&reg, "ou=people,dc=com"));

	register(&mut reg, "dc=com", &x);

	assert!(is_sub_suffix(&reg, "ou=people,dc=com"));
	assert_eq!(subordinates(&reg, "dc=com"), vec!["ou=people,dc=com"]);
	assert_eq!(reg.public_naming_contexts().len(), 1);
}

#[test]
fn test_registration_may_not_split_another_backend() {
	let x = TestBackend::new("X");
	let y = TestBackend::new("Y");
	let z = TestBackend::new("Z");
	let mut reg = TestRegistry::default();
	register(&mut reg, "dc=com", &x);
	register(&mut reg, "ou=a,o=one,dc=com", &z);
	register(&mut reg, "ou=b,dc=com", &z);
	let before = reg.copy();

	let err = reg.register_base_dn(&dn("o=one,dc=com"), &y, false).unwrap_err();

	assert_eq!(
		err,
		RegistryError::SplitsBackend {
			base_dn: dn("o=one,dc=com"),
			backend: "Y".into(),
			other: dn("ou=b,dc=com"),
			other_backend: "Z".into(),
		}
	);
	assert!(reg == before);
}

#[test]
fn test_base_dns_of_one_backend_share_a_parent() {
	let x = TestBackend::new("X");
	let y = TestBackend::new("Y");
	let z = TestBackend::new("Z");
	let mut reg = TestRegistry::default();
	register(&mut reg, "dc=com", &x);
	register(&mut reg, "dc=org", &y);
	register(&mut reg, "ou=a,dc=com", &z);
	let before = reg.copy();

	assert_eq!(
		reg.register_base_dn(&dn("ou=b,dc=org"), &z, false),
		Err(RegistryError::DifferentParentBases {
			base_dn: dn("ou=b,dc=org"),
			backend: "Z".into(),
			other: dn("ou=a,dc=com"),
		})
	);
	assert_eq!(
		reg.register_base_dn(&dn("o=top"), &z, false),
		Err(RegistryError::NewBaseNotSubordinate {
			base_dn: dn("o=top"),
			backend: "Z".into(),
			other: dn("ou=a,dc=com"),
			parent_backend: "X".into(),
		})
	);
	assert!(reg == before);

	register(&mut reg, "ou=c,dc=com", &z);
	assert_eq!(reg.base_dns_of(&z), vec![dn("ou=a,dc=com"), dn("ou=c,dc=com")]);
}

#[test]
fn test_top_level_backend_cannot_gain_sub_suffix() {
	let x = TestBackend::new("X");
	let z = TestBackend::new("Z");
	let mut reg = TestRegistry::default();
	register(&mut reg, "dc=com", &x);
	register(&mut reg, "o=top", &z);

	assert_eq!(
		reg.register_base_dn(&dn("ou=a,dc=com"), &z, false),
		Err(RegistryError::DifferentParentBases {
			base_dn: dn("ou=a,dc=com"),
			backend: "Z".into(),
			other: dn("o=top"),
		})
	);
}

#[test]
fn test_simple_rejections() {
	let x = TestBackend::new("X");
	let y = TestBackend::new("Y");
	let mut reg = TestRegistry::default();
	register(&mut reg, "dc=com", &x);

	assert_eq!(
		reg.register_base_dn(&dn("DC=COM"), &y, false),
		Err(RegistryError::AlreadyRegistered {
			base_dn: dn("dc=com"),
			backend: "Y".into(),
			existing: "X".into(),
		})
	);
	assert_eq!(
		reg.register_base_dn(&Dn::root(), &y, false),
		Err(RegistryError::RootDn { backend: "Y".into() })
	);
	assert_eq!(
		reg.deregister_base_dn(&dn("dc=org")),
		Err(RegistryError::NotRegistered { base_dn: dn("dc=org") })
	);
	assert_eq!(reg.len(), 1);
}

#[test]
fn test_private_flag_set_only_for_top_level() {
	let x = TestBackend::new("X");
	let y = TestBackend::new("Y");
	let mut reg = TestRegistry::default();

	reg.register_base_dn(&dn("cn=config"), &x, true).unwrap();
	reg.register_base_dn(&dn("ou=sub,cn=config"), &y, true).unwrap();

	assert_eq!(x.private_calls.load(Ordering::SeqCst), 1);
	assert!(x.private.load(Ordering::SeqCst));
	assert_eq!(y.private_calls.load(Ordering::SeqCst), 0);

	assert!(reg.public_naming_contexts().is_empty());
	assert!(reg.all_public_naming_contexts().is_empty());
	let private: Vec<Dn> = reg.private_naming_contexts().into_keys().collect();
	assert_eq!(private, vec![dn("cn=config")]);
	assert!(reg.contains_naming_context(&dn("cn=config")));
	assert!(!reg.contains_naming_context(&dn("ou=sub,cn=config")));
}

#[test]
fn test_naming_context_views() {
	let x = TestBackend::new("X");
	let y = TestBackend::new("Y");
	let mut reg = TestRegistry::default();
	register(&mut reg, "dc=com", &x);
	register(&mut reg, "ou=people,dc=com", &y);
	reg.register_base_dn(&dn("cn=monitor"), &y.clone_for_test(), true)
		.unwrap();

	let public: Vec<Dn> = reg.public_naming_contexts().into_keys().collect();
	assert_eq!(public, vec![dn("dc=com")]);
	let all_public: Vec<Dn> = reg.all_public_naming_contexts().into_keys().collect();
	assert_eq!(all_public, vec![dn("dc=com"), dn("ou=people,dc=com")]);
	assert_eq!(reg.naming_contexts().count(), 3);
	assert_eq!(reg.backends().len(), 3);
}

#[test]
fn test_non_local_backend_is_routed_but_not_local() {
	let x = TestBackend::new("X");
	let proxy = TestBackend::remote("P");
	let mut reg = TestRegistry::default();
	register(&mut reg, "dc=com", &x);
	register(&mut reg, "ou=remote,dc=com", &proxy);

	let entry = dn("cn=a,ou=remote,dc=com");
	let routed = reg.backend_and_name(&entry).unwrap();
	assert_eq!(routed.backend.backend_id(), "P");
	assert_eq!(routed.base_dn, dn("ou=remote,dc=com"));
	assert!(reg.local_backend_and_name(&entry).is_none());
	assert!(reg.local_backend_with_base_dn(&dn("ou=remote,dc=com")).is_none());
	assert!(!reg.naming_context(&dn("ou=remote,dc=com")).unwrap().is_local());

	let local = reg.local_backend_and_name(&dn("cn=a,dc=com")).unwrap();
	assert_eq!(local.backend.backend_id(), "X");
}

#[test]
fn test_root_and_unknown_dns() {
	let x = TestBackend::new("X");
	let mut reg = TestRegistry::default();
	assert_eq!(reg.find_naming_context_for_entry(&Dn::root()), Some(Dn::root()));
	assert_eq!(reg.find_naming_context_for_entry(&dn("dc=com")), None);

	register(&mut reg, "dc=com", &x);
	assert_eq!(reg.find_naming_context_for_entry(&dn("dc=org")), None);
	assert!(reg.backend_and_name(&Dn::root()).is_none());
}

#[test]
fn test_lookup_branches_agree() {
	let mut reg = TestRegistry::default();
	let backends: Vec<_> = (0..6).map(|i| TestBackend::new(&format!("b{i}"))).collect();
	register(&mut reg, "dc=com", &backends[0]);
	register(&mut reg, "ou=a,dc=com", &backends[1]);
	register(&mut reg, "cn=x,ou=a,dc=com", &backends[2]);
	register(&mut reg, "dc=org", &backends[3]);
	register(&mut reg, "ou=b,dc=org", &backends[4]);
	register(&mut reg, "o=solo", &backends[5]);

	// Shallow probe: ancestor walk. Deep probe: base DN scan.
	let shallow = dn("uid=u,cn=x,ou=a,dc=com");
	let deep = dn("a=1,a=2,a=3,a=4,a=5,uid=u,cn=x,ou=a,dc=com");
	assert!(shallow.size() <= reg.len());
	assert!(deep.size() > reg.len());
	assert_eq!(reg.find_naming_context_for_entry(&shallow), Some(dn("cn=x,ou=a,dc=com")));
	assert_eq!(reg.find_naming_context_for_entry(&deep), Some(dn("cn=x,ou=a,dc=com")));
	assert_eq!(
		reg.find_naming_context_for_entry(&dn("a=1,a=2,a=3,a=4,a=5,a=6,ou=b,dc=org")),
		Some(dn("ou=b,dc=org"))
	);
}

#[test]
fn test_subordinate_backends() {
	let x = TestBackend::new("X");
	let y = TestBackend::new("Y");
	let z = TestBackend::new("Z");
	let mut reg = TestRegistry::default();
	register(&mut reg, "dc=com", &x);
	register(&mut reg, "dc=org", &x);
	register(&mut reg, "ou=a,dc=com", &y);
	register(&mut reg, "ou=b,dc=com", &y);
	register(&mut reg, "ou=c,dc=org", &z);

	let ids: Vec<String> = reg
		.subordinate_backends(&dn("dc=org"))
		.iter()
		.map(|b| b.backend_id().to_string())
		.collect();
	assert_eq!(ids, vec!["Y", "Z"]);
	assert!(reg.subordinate_backends(&dn("ou=a,dc=com")).is_empty());
	assert!(reg.subordinate_backends(&dn("o=none")).is_empty());
}

#[test]
fn test_entries_in_multiple_backends_warning() {
	let parent = TestBackend::with_entries("parent", &["dc=com", "ou=people,dc=com"]);
	let child = TestBackend::new("child");
	let mut reg = TestRegistry::default();
	register(&mut reg, "dc=com", &parent);

	let mut checking = reg.copy_for_checking_changes();
	assert!(
		checking
			.register_base_dn(&dn("ou=people,dc=com"), &child, false)
			.unwrap()
			.is_empty()
	);

	let warnings = register(&mut reg, "ou=people,dc=com", &child);
	assert_eq!(
		warnings,
		vec![RegistryWarning::EntriesInMultipleBackends {
			parent_backend: "parent".into(),
			base_dn: dn("ou=people,dc=com"),
			backend: "child".into(),
		}]
	);
	assert!(register(&mut reg, "ou=groups,dc=com", &TestBackend::new("other")).is_empty());
}

#[test]
fn test_missing_hierarchy_warning_suppressed_while_shutting_down() {
	let flag = Arc::new(AtomicBool::new(false));
	let mut reg: TestRegistry = Registry::with_hooks(LiveHooks::new(Arc::clone(&flag)));
	let a = TestBackend::new("A");
	let b = TestBackend::new("B");
	let c = TestBackend::new("C");
	reg.register_base_dn(&dn("dc=com"), &a, false).unwrap();
	reg.register_base_dn(&dn("ou=b,dc=com"), &b, false).unwrap();
	reg.register_base_dn(&dn("ou=c,ou=b,dc=com"), &c, false).unwrap();

	flag.store(true, Ordering::SeqCst);
	assert!(reg.hooks().is_shutting_down());
	assert!(reg.deregister_base_dn(&dn("ou=b,dc=com")).unwrap().is_empty());
	reg.check_invariants().unwrap();
}

#[test]
fn test_checking_copy_leaves_live_registry_and_backends_alone() {
	let x = TestBackend::new("X");
	let y = TestBackend::new("Y");
	let mut reg = TestRegistry::default();
	register(&mut reg, "dc=com", &x);
	register(&mut reg, "ou=a,dc=com", &y);
	register(&mut reg, "ou=b,ou=a,dc=com", &TestBackend::new("Z"));
	let calls_before = x.private_calls.load(Ordering::SeqCst);
	let before = reg.copy();

	let mut checking: Registry<TestBackend, CheckingHooks> = reg.copy_for_checking_changes();
	assert!(checking == reg);
	checking
		.register_base_dn(&dn("dc=org"), &x, true)
		.unwrap();
	assert!(checking.deregister_base_dn(&dn("ou=a,dc=com")).unwrap().is_empty());
	checking.check_invariants().unwrap();

	assert!(reg == before);
	assert!(checking != reg);
	assert_eq!(x.private_calls.load(Ordering::SeqCst), calls_before);
}

#[test]
fn test_copy_is_independent() {
	let x = TestBackend::new("X");
	let mut reg = TestRegistry::default();
	register(&mut reg, "dc=com", &x);
	let mut copy = reg.copy();
	register(&mut copy, "ou=a,dc=com", &TestBackend::new("Y"));

	assert_eq!(reg.len(), 1);
	assert!(reg.subordinates_of(&dn("dc=com")).is_none());
	assert_eq!(copy.len(), 2);
}

const UNIVERSE: &[&str] = &[
	"dc=a",
	"dc=b",
	"ou=x,dc=a",
	"ou=y,dc=a",
	"ou=x,dc=b",
	"cn=1,ou=x,dc=a",
	"cn=2,ou=x,dc=a",
	"cn=1,ou=y,dc=a",
	"cn=1,ou=x,dc=b",
	"uid=z,cn=1,ou=x,dc=a",
];

const PROBES: &[&str] = &[
	"",
	"dc=c",
	"uid=q,ou=x,dc=b",
	"uid=z,cn=1,ou=x,dc=a",
	"a=1,a=2,a=3,a=4,a=5,a=6,a=7,a=8,a=9,a=10,uid=z,cn=1,ou=x,dc=a",
	"a=1,a=2,a=3,a=4,a=5,a=6,a=7,a=8,a=9,a=10,a=11,cn=2,ou=x,dc=a",
];

#[derive(Debug, Clone)]
enum Op {
	Register { dn: usize, backend: usize, private: bool },
	Deregister { dn: usize },
}

fn arb_op() -> impl Strategy<Value = Op> {
	prop_oneof![
		3 => (0..UNIVERSE.len(), 0..4usize, any::<bool>())
			.prop_map(|(dn, backend, private)| Op::Register { dn, backend, private }),
		1 => (0..UNIVERSE.len()).prop_map(|dn| Op::Deregister { dn }),
	]
}

fn brute_force_find(reg: &TestRegistry, entry: &Dn) -> Option<Dn> {
	if entry.is_root() {
		return Some(Dn::root());
	}
	reg.base_dns()
		.filter(|base| entry.is_subordinate_or_equal_to(base))
		.max_by_key(|base| base.size())
		.cloned()
}

proptest! {
	/// Every step keeps the invariants, rejected steps change nothing, and the
	/// checking variant reaches the same routing state without side effects.
	#[test]
	fn prop_random_mutations_keep_invariants(ops in prop::collection::vec(arb_op(), 1..40)) {
		let backends = [
			TestBackend::new("b0"),
			TestBackend::new("b1"),
			TestBackend::new("b2"),
			TestBackend::remote("b3"),
		];
		let mut live = TestRegistry::default();
		let mut checking = live.copy_for_checking_changes();

		for op in ops {
			let before = live.copy();
			let (live_result, checking_result) = match op {
				Op::Register { dn: i, backend, private } => {
					let base = dn(UNIVERSE[i]);
					(
						live.register_base_dn(&base, &backends[backend], private).map(|_| ()),
						checking.register_base_dn(&base, &backends[backend], private).map(|_| ()),
					)
				}
				Op::Deregister { dn: i } => {
					let base = dn(UNIVERSE[i]);
					(
						live.deregister_base_dn(&base).map(|_| ()),
						checking.deregister_base_dn(&base).map(|_| ()),
					)
				}
			};

			prop_assert_eq!(&live_result, &checking_result);
			if live_result.is_err() {
				prop_assert!(live == before);
			}
			prop_assert_eq!(live.check_invariants(), Ok(()));
			prop_assert!(checking == live);
		}

		for probe in UNIVERSE.iter().chain(PROBES) {
			let probe = dn(probe);
			prop_assert_eq!(
				live.find_naming_context_for_entry(&probe),
				brute_force_find(&live, &probe)
			);
		}
	}
}
