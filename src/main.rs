//! Plugboard CLI entry point.
//!
//! Inspection tool over scenario files: `generate` runs a generation pass
//! for one snap and prints the finished policy, `check` sanitizes every snap
//! and reports which plugs would be auto-connected at install time.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{debug, info};

use plugboard::config::{load_config, load_default_config, Config, EnvironmentMode};
use plugboard::interfaces::{builtin_registry, GeneratedPolicy};
use plugboard::logging::{self, LoggingGuard};
use plugboard::release::ExecutionEnvironment;
use plugboard::scenario::Scenario;

/// Plugboard: confinement policy composition for sandboxed applications.
#[derive(Parser)]
#[command(name = "plugboard", version, about)]
struct Cli {
    /// Config file to use instead of the default location.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Execution environment, overriding the config.
    #[arg(long, global = true)]
    environment: Option<EnvironmentMode>,

    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

/// Available CLI subcommands.
#[derive(Subcommand)]
enum Command {
    /// Generate the policy of one snap in a scenario.
    Generate {
        /// Scenario file.
        scenario: PathBuf,
        /// Target snap.
        #[arg(long)]
        snap: String,
        /// Print the policy as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Sanitize a scenario and report auto-connect candidates.
    Check {
        /// Scenario file.
        scenario: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => {
            let mut config = load_config(path)
                .with_context(|| format!("failed to load {}", path.display()))?;
            config.apply_overrides(|key| std::env::var(key).ok());
            config
        }
        None => load_default_config().context("failed to load configuration")?,
    };
    if let Some(mode) = cli.environment {
        config.environment.mode = mode;
    }

    let _logging_guard = init_logging(&config)?;
    let env = config
        .environment
        .resolve()
        .context("failed to determine execution environment")?;
    debug!(environment = %env, "execution environment resolved");

    match cli.command {
        Command::Generate {
            scenario,
            snap,
            json,
        } => handle_generate(&scenario, &snap, json, env),
        Command::Check { scenario } => handle_check(&scenario, env),
    }
}

fn init_logging(config: &Config) -> anyhow::Result<Option<LoggingGuard>> {
    match &config.logging.logs_dir {
        Some(dir) => logging::init_production(dir, &config.logging.level).map(Some),
        None => {
            logging::init_cli(&config.logging.level);
            Ok(None)
        }
    }
}

/// Run one generation pass and print the result.
fn handle_generate(
    path: &Path,
    snap: &str,
    json: bool,
    env: ExecutionEnvironment,
) -> anyhow::Result<()> {
    let registry = builtin_registry();
    let scenario = Scenario::load(path, registry)
        .with_context(|| format!("failed to load scenario {}", path.display()))?;

    let policy = scenario
        .generate(registry, env, snap)?
        .into_result()
        .with_context(|| format!("failed to generate policy for {snap:?}"))?;
    info!(snap, tags = policy.apparmor.security_tags().len(), "policy generated");

    if json {
        let rendered =
            serde_json::to_string_pretty(&policy).context("failed to serialize policy")?;
        println!("{rendered}");
    } else {
        print_policy(&policy);
    }
    Ok(())
}

fn print_policy(policy: &GeneratedPolicy) {
    for tag in policy.apparmor.security_tags() {
        println!("# apparmor: {tag}");
        println!("{}", policy.apparmor.snippet_for_tag(tag));
    }
    if !policy.mount.is_empty() {
        println!("# mount: snap.{}", policy.snap);
        print!("{}", policy.mount.fstab());
    }
}

/// Sanitize every snap and print auto-connect decisions.
fn handle_check(path: &Path, env: ExecutionEnvironment) -> anyhow::Result<()> {
    let registry = builtin_registry();
    let scenario = Scenario::load(path, registry)
        .with_context(|| format!("failed to load scenario {}", path.display()))?;

    println!("environment: {env}");
    for snap in scenario.snaps() {
        println!(
            "snap {}: {} plug(s), {} slot(s) sanitized",
            snap.name,
            snap.plugs.len(),
            snap.slots.len()
        );
    }

    let plugs = scenario.plugs();
    let slots = scenario.slots();
    for decision in Scenario::auto_connect_decisions(registry, env, &plugs, &slots) {
        let verdict = if decision.auto_connect {
            "auto-connect"
        } else {
            "manual"
        };
        println!(
            "{} -> {} [{}]: {verdict}",
            **decision.plug, **decision.slot, decision.plug.interface
        );
    }

    for conn in scenario.connections() {
        println!("connected: {} [{}]", conn.conn_ref(), conn.interface());
    }
    Ok(())
}
