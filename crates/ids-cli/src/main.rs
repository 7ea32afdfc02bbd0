mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::config::ConfigSubcommand;
use cmd::gate::GateKind;
use ids_core::gates::GateContext;
use ids_core::updater::RegistrationMetadata;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "ids",
    about = "Incremental decision system: reuse, adapt, or create, checked against the entity registry",
    version,
    propagate_version = true
)]
struct Cli {
    /// Repository root (default: auto-detect from .ids/ or .git/)
    #[arg(long, global = true, env = "IDS_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create .ids/ with a default config and an empty registry
    Init,

    /// Recommend REUSE, ADAPT, or CREATE for an intent
    Check {
        /// What you are about to build
        intent: String,
        /// Only consider entities of this type
        #[arg(long = "type", value_name = "TYPE")]
        entity_type: Option<String>,
    },

    /// Show what a change to an entity would affect
    Impact {
        /// Entity id
        id: String,
    },

    /// Register a produced artifact in the registry
    Register {
        /// File path relative to the repository root
        path: String,
        /// Entity id (default: derived from the file name)
        #[arg(long)]
        id: Option<String>,
        #[arg(long = "type", value_name = "TYPE")]
        entity_type: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        purpose: Option<String>,
        /// Repeatable; default: the most frequent words of the file
        #[arg(long = "keyword")]
        keywords: Vec<String>,
        /// Repeatable: ids of entities that consume this one
        #[arg(long = "used-by")]
        used_by: Vec<String>,
        /// Repeatable: ids of entities this one depends on
        #[arg(long = "depends-on")]
        dependencies: Vec<String>,
    },

    /// Check registry integrity
    Health,

    /// Repair auto-healable registry issues
    Heal {
        /// Attempt every issue, not only auto-healable ones
        #[arg(long)]
        all: bool,
        /// Report what would change without writing
        #[arg(long)]
        dry_run: bool,
    },

    /// Restore the registry from a healing batch's backup
    Rollback {
        /// Healing batch id
        batch: String,
    },

    /// Query the healing audit log, newest first
    Log {
        #[arg(long)]
        batch: Option<String>,
        #[arg(long)]
        entity: Option<String>,
        /// heal, skip, or rollback
        #[arg(long)]
        action: Option<String>,
        #[arg(long)]
        limit: Option<usize>,
    },

    /// List registry backups, newest first
    Backups,

    /// Registry and governor statistics
    Stats,

    /// Review CREATE decisions for promotion or deprecation
    Review {
        /// Review a single entity
        #[arg(long)]
        entity: Option<String>,
    },

    /// Run a verification gate
    Gate {
        #[arg(value_enum)]
        kind: GateKind,
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long = "type", value_name = "TYPE")]
        entity_type: Option<String>,
        /// Repeatable: entity ids the work references
        #[arg(long = "ref")]
        refs: Vec<String>,
        /// Accept a failing or flagged validation, recording why
        #[arg(long = "override", value_name = "REASON")]
        override_reason: Option<String>,
    },

    /// Inspect and validate .ids/config.yaml
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());
    let json = cli.json;

    let result = match cli.command {
        Commands::Init => cmd::init::run(&root),
        Commands::Check {
            intent,
            entity_type,
        } => cmd::advise::check(&root, &intent, entity_type.as_deref(), json),
        Commands::Impact { id } => cmd::advise::impact(&root, &id, json),
        Commands::Register {
            path,
            id,
            entity_type,
            category,
            purpose,
            keywords,
            used_by,
            dependencies,
        } => {
            let metadata = RegistrationMetadata {
                id,
                entity_type,
                category,
                purpose,
                keywords,
                used_by,
                dependencies,
                justification: None,
            };
            cmd::advise::register(&root, &path, metadata, json)
        }
        Commands::Health => cmd::health::health(&root, json),
        Commands::Heal { all, dry_run } => cmd::health::heal(&root, all, dry_run, json),
        Commands::Rollback { batch } => cmd::health::rollback(&root, &batch, json),
        Commands::Log {
            batch,
            entity,
            action,
            limit,
        } => cmd::health::log(&root, batch, entity, action, limit, json),
        Commands::Backups => cmd::health::backups(&root, json),
        Commands::Stats => cmd::registry::stats(&root, json),
        Commands::Review { entity } => cmd::registry::review(&root, entity.as_deref(), json),
        Commands::Gate {
            kind,
            title,
            description,
            entity_type,
            refs,
            override_reason,
        } => {
            let ctx = GateContext {
                title,
                description,
                entity_type,
                referenced_entities: refs,
                override_reason,
            };
            cmd::gate::run(&root, kind, ctx, json)
        }
        Commands::Config { subcommand } => cmd::config::run(&root, subcommand, json),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
