//! Marketplace CLI: publish, inspect and manage packages in a local registry.

mod commands;
mod config;

use std::path::{Path, PathBuf};
use std::process;

use anyhow::Context;
use clap::{Parser, Subcommand};
use marketplace_registry::ActorId;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the default acting identity.
const ACTOR_ENV: &str = "MARKETPLACE_ACTOR";
/// Environment variable holding the log filter.
const LOG_ENV: &str = "MARKETPLACE_LOG";

#[derive(Parser)]
#[command(name = "marketplace", version, about = "Package marketplace registry")]
struct Cli {
    /// Registry root directory (overrides marketplace.toml)
    #[arg(long, global = true)]
    registry: Option<PathBuf>,
    /// Path to marketplace.toml (default: search upward from the current directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Act as this identity (default: $MARKETPLACE_ACTOR)
    #[arg(long = "as", global = true, value_name = "ACTOR")]
    actor: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default marketplace.toml in the current directory
    Init,
    /// Manage namespaces
    Namespace {
        #[command(subcommand)]
        action: NamespaceAction,
    },
    /// Publish a package descriptor
    Publish {
        /// Descriptor file (TOML)
        descriptor: PathBuf,
        /// Resolve and validate without writing anything
        #[arg(long)]
        dry_run: bool,
        /// Output format (human, json)
        #[arg(long)]
        format: Option<String>,
    },
    /// List all versions of a package
    Versions {
        package: String,
        /// Output format (human, json)
        #[arg(long)]
        format: Option<String>,
    },
    /// Print the locked manifest of a version
    Manifest { package: String, version: String },
    /// Re-check a locked manifest against the registry
    Verify {
        package: Option<String>,
        version: Option<String>,
        /// Verify a manifest JSON file instead of a stored one
        #[arg(long)]
        manifest: Option<PathBuf>,
        /// Output format (human, json)
        #[arg(long)]
        format: Option<String>,
    },
    /// Show the install order of a version's dependencies
    InstallOrder {
        package: String,
        version: String,
        /// Output format (human, json)
        #[arg(long)]
        format: Option<String>,
    },
    /// Re-hash stored content against its recorded checksum
    Audit { package: String, version: String },
    /// Withdraw a version from new resolutions
    Yank {
        package: String,
        version: String,
        /// Why the version is being yanked
        #[arg(long)]
        reason: String,
    },
    /// Restore a yanked version
    Unyank { package: String, version: String },
}

#[derive(Subcommand)]
enum NamespaceAction {
    /// Claim an unowned namespace
    Claim {
        name: String,
        /// Protection level (public, protected, private)
        #[arg(long)]
        protection: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    /// Show a namespace
    Show {
        name: String,
        /// Output format (human, json)
        #[arg(long)]
        format: Option<String>,
    },
    /// Change protection or description (owner only)
    Update {
        name: String,
        #[arg(long)]
        protection: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let result = run(cli);
    if let Err(e) = result {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let cwd = std::env::current_dir()?;

    let command = match cli.command {
        Commands::Init => return commands::init::run(&cwd),
        command => command,
    };

    let session = config::open(&cwd, cli.config.as_deref(), cli.registry.as_deref())?;
    let actor = resolve_actor(cli.actor.as_deref());
    dispatch(command, &session, actor, &cwd)
}

fn dispatch(
    command: Commands,
    session: &config::Session,
    actor: Option<ActorId>,
    cwd: &Path,
) -> anyhow::Result<()> {
    match command {
        Commands::Init => commands::init::run(cwd),

        Commands::Namespace { action } => match action {
            NamespaceAction::Claim {
                name,
                protection,
                description,
            } => commands::namespace::claim(
                session,
                &require_actor(actor)?,
                &name,
                protection.as_deref(),
                description,
            ),
            NamespaceAction::Show { name, format } => {
                commands::namespace::show(session, actor.as_ref(), &name, format.as_deref())
            }
            NamespaceAction::Update {
                name,
                protection,
                description,
            } => commands::namespace::update(
                session,
                &require_actor(actor)?,
                &name,
                protection.as_deref(),
                description,
            ),
        },

        Commands::Publish {
            descriptor,
            dry_run,
            format,
        } => commands::publish::run(
            session,
            &require_actor(actor)?,
            &resolve_path(cwd, &descriptor),
            dry_run,
            format.as_deref(),
        ),

        Commands::Versions { package, format } => {
            commands::inspect::versions(session, actor.as_ref(), &package, format.as_deref())
        }

        Commands::Manifest { package, version } => {
            commands::inspect::manifest(session, actor.as_ref(), &package, &version)
        }

        Commands::Verify {
            package,
            version,
            manifest,
            format,
        } => {
            let target = match (&package, &version) {
                (Some(p), Some(v)) => Some((p.as_str(), v.as_str())),
                (None, None) => None,
                _ => anyhow::bail!("pass both <PACKAGE> and <VERSION>"),
            };
            let manifest = manifest.map(|m| resolve_path(cwd, &m));
            commands::inspect::verify_manifest(
                session,
                actor.as_ref(),
                target,
                manifest.as_deref(),
                format.as_deref(),
            )
        }

        Commands::InstallOrder {
            package,
            version,
            format,
        } => commands::inspect::order(session, actor.as_ref(), &package, &version, format.as_deref()),

        Commands::Audit { package, version } => {
            commands::inspect::audit(session, &package, &version)
        }

        Commands::Yank {
            package,
            version,
            reason,
        } => commands::lifecycle::yank(session, &require_actor(actor)?, &package, &version, &reason),

        Commands::Unyank { package, version } => {
            commands::lifecycle::unyank(session, &require_actor(actor)?, &package, &version)
        }
    }
}

/// `--as` wins over the environment; blank values count as unset.
fn resolve_actor(flag: Option<&str>) -> Option<ActorId> {
    flag.map(str::to_string)
        .or_else(|| std::env::var(ACTOR_ENV).ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .map(ActorId::new)
}

fn require_actor(actor: Option<ActorId>) -> anyhow::Result<ActorId> {
    actor
        .with_context(|| format!("no identity given: pass --as <ACTOR> or set {ACTOR_ENV}"))
}

fn resolve_path(cwd: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    }
}
