//! suffixd command line tool.
//!
//! Starts the backends of a configuration file, runs one inspection command
//! against the resulting routing table and shuts the backends down again.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use suffixd_primitives::Dn;
use suffixd_registry::RoutedBackend;
use suffixd_server::{BackendCoordinator, BackendFactories, FileLockManager, RootCfg, ServerContext};
use tracing::{info, warn};

/// suffixd command line arguments.
#[derive(Parser, Debug)]
#[command(name = "suffixd")]
#[command(about = "Start directory backends and inspect how DNs are routed to them")]
struct Args {
	/// Server configuration file
	#[arg(short, long, value_name = "FILE")]
	config: PathBuf,

	/// Start only these backend IDs (repeatable; default all)
	#[arg(short, long = "backend", value_name = "ID")]
	backends: Vec<String>,

	/// Directory for backend lock files, overriding the configuration
	#[arg(long, value_name = "DIR")]
	lock_dir: Option<PathBuf>,

	/// Verbose logging
	#[arg(short, long)]
	verbose: bool,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Command {
	/// List the registered naming contexts
	Contexts,
	/// Show the naming context and backend each DN routes to
	Route {
		#[arg(required = true, value_name = "DN")]
		dns: Vec<String>,
	},
}

fn main() -> anyhow::Result<()> {
	let args = Args::parse();
	setup_tracing(args.verbose);

	let root = RootCfg::load(&args.config).with_context(|| format!("loading {}", args.config.display()))?;
	let lock_dir = args
		.lock_dir
		.clone()
		.or_else(|| root.lock_directory.clone())
		.unwrap_or_else(|| std::env::temp_dir().join("suffixd").join("locks"));
	let locks = FileLockManager::new(&lock_dir).with_context(|| format!("lock directory {}", lock_dir.display()))?;
	info!(locks = %lock_dir.display(), backends = root.backends.len(), "starting backends");

	let ctx = ServerContext::new(Arc::new(locks), BackendFactories::with_builtins());
	let coordinator = ctx.coordinator();
	coordinator.initialize_root_dse_backend(&ctx)?;
	for (name, result) in coordinator.initialize_backends(&ctx, &args.backends, &root) {
		if !result.is_success() {
			warn!(entry = %name, result = %result, "backend did not start");
		}
	}

	let outcome = run(coordinator, &args.command);
	coordinator.shutdown_local_backends(&ctx);
	outcome
}

fn run(coordinator: &BackendCoordinator, command: &Command) -> anyhow::Result<()> {
	match command {
		Command::Contexts => {
			for nc in coordinator.naming_contexts() {
				let backend = coordinator
					.backend_with_base_dn(nc.base_dn())
					.map(|b| b.backend_id().to_string())
					.unwrap_or_default();
				println!(
					"{}\t{backend}\t{}\t{}\t{}",
					display_dn(nc.base_dn()),
					if nc.is_private() { "private" } else { "public" },
					if nc.is_sub_suffix() { "sub-suffix" } else { "top-level" },
					if nc.is_local() { "local" } else { "remote" },
				);
			}
		}
		Command::Route { dns } => {
			let mut unparsed = 0;
			for raw in dns {
				let dn = match Dn::parse(raw) {
					Ok(dn) => dn,
					Err(e) => {
						eprintln!("{raw}: {e}");
						unparsed += 1;
						continue;
					}
				};
				match coordinator.backend_and_name(&dn) {
					Some(routed) => println!(
						"{}\t{}\t{}",
						display_dn(&dn),
						display_dn(&routed.base_dn),
						routed.backend.backend_id()
					),
					None => println!("{}\t-\t-", display_dn(&dn)),
				}
			}
			if unparsed > 0 {
				bail!("{unparsed} DN(s) could not be parsed");
			}
		}
	}
	Ok(())
}

fn display_dn(dn: &Dn) -> String {
	if dn.is_root() { "\"\"".to_string() } else { dn.to_string() }
}

fn setup_tracing(verbose: bool) {
	use tracing_subscriber::EnvFilter;

	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
		if verbose {
			EnvFilter::new("suffixd=debug,info")
		} else {
			EnvFilter::new("warn")
		}
	});
	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(std::io::stderr)
		.init();
}
