mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{backup::BackupSubcommand, knowledge::KnowledgeSubcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "stencil",
    about = "Assemble project configuration artifacts and integrate them without clobbering user files",
    version,
    propagate_version = true
)]
struct Cli {
    /// Target repository root (default: auto-detect from .stencil/ or .git/)
    #[arg(long, global = true, env = "STENCIL_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Declare the project stack and write .stencil/config.yaml
    Init {
        /// Project name (default: directory name)
        #[arg(long)]
        name: Option<String>,

        /// Primary language of the target project
        #[arg(long)]
        language: String,

        /// Framework in the target stack (repeatable)
        #[arg(long = "framework")]
        frameworks: Vec<String>,

        /// Pin a blueprint id instead of letting the matcher choose
        #[arg(long)]
        blueprint: Option<String>,

        /// Template variable as KEY=VALUE (repeatable)
        #[arg(long = "var")]
        variables: Vec<String>,
    },

    /// Report the repository scenario and ranked blueprint matches (no writes)
    Analyze,

    /// Compute and display the full integration plan without writing anything
    Preview {
        /// Override the blueprint for this run
        #[arg(long)]
        blueprint: Option<String>,
    },

    /// Integrate the generated artifact set into the repository
    Apply {
        /// Prompt per conflicting file instead of applying defaults
        #[arg(long)]
        interactive: bool,

        /// Proceed even when no blueprint scores above the match threshold
        #[arg(long)]
        force: bool,

        /// Override the blueprint for this run
        #[arg(long)]
        blueprint: Option<String>,
    },

    /// Restore the repository from a backup taken by a previous apply
    Rollback {
        /// Backup id, as printed by apply or 'backup list'
        backup_id: String,
    },

    /// Manage apply backups
    Backup {
        #[command(subcommand)]
        subcommand: BackupSubcommand,
    },

    /// Merge knowledge updates from configured source feeds
    Knowledge {
        #[command(subcommand)]
        subcommand: KnowledgeSubcommand,
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
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Init {
            name,
            language,
            frameworks,
            blueprint,
            variables,
        } => cmd::init::run(
            &root,
            name.as_deref(),
            &language,
            &frameworks,
            blueprint.as_deref(),
            &variables,
        ),
        Commands::Analyze => cmd::analyze::run(&root, cli.json),
        Commands::Preview { blueprint } => cmd::preview::run(&root, blueprint.as_deref(), cli.json),
        Commands::Apply {
            interactive,
            force,
            blueprint,
        } => cmd::apply::run(&root, interactive, force, blueprint.as_deref(), cli.json),
        Commands::Rollback { backup_id } => cmd::rollback::run(&root, &backup_id, cli.json),
        Commands::Backup { subcommand } => cmd::backup::run(&root, subcommand, cli.json),
        Commands::Knowledge { subcommand } => cmd::knowledge::run(&root, subcommand, cli.json),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
