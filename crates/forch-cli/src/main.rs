mod cmd;
mod handoff;
mod output;
mod root;
mod skills_fetch;

use clap::{Parser, Subcommand};
use cmd::{config::ConfigSubcommand, skills::SkillsSubcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "forch",
    about = "Feature orchestrator: hand backlog features to an AI agent and verify the result",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from .forch/ or .git/)
    #[arg(long, global = true, env = "FORCH_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create .forch/settings.yaml and a backlog from the feature template
    Init,

    /// Show backlog status and the next feature
    Status,

    /// List every feature in the backlog
    List,

    /// Print the prompt for the next unchecked feature
    Prompt {
        /// Prepend the installed skills manifest
        #[arg(long)]
        skills: bool,
    },

    /// Append a feature to the backlog
    Add {
        /// Append an empty stub instead of the template
        #[arg(long)]
        empty: bool,
    },

    /// Verify the next unchecked feature once (exit 1 on failure)
    Verify,

    /// Interactive handoff / verify loop
    Run,

    /// Inspect and change settings
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },

    /// Manage agent skills
    Skills {
        #[command(subcommand)]
        subcommand: SkillsSubcommand,
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

    let result = match cli.command {
        Commands::Init => cmd::init::run(&root),
        Commands::Status => cmd::status::run(&root, cli.json),
        Commands::List => cmd::list::run(&root, cli.json),
        Commands::Prompt { skills } => cmd::prompt::run(&root, skills, cli.json),
        Commands::Add { empty } => cmd::add::run(&root, empty, cli.json),
        Commands::Verify => cmd::verify::run(&root, cli.json),
        Commands::Run => cmd::run::run(&root),
        Commands::Config { subcommand } => cmd::config::run(&root, subcommand, cli.json),
        Commands::Skills { subcommand } => cmd::skills::run(&root, subcommand, cli.json),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
