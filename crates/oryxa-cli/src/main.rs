use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::Context;

#[derive(Parser)]
#[command(name = "oryxa-cli", version, about = "Oryxa prayer-conflict autopilot CLI")]
struct Cli {
    /// Database file (default: ~/.config/oryxa/autopilot.db)
    #[arg(long, global = true, env = "ORYXA_DB")]
    db: Option<PathBuf>,

    /// Config file (default: ~/.config/oryxa/autopilot.toml)
    #[arg(long, global = true, env = "ORYXA_CONFIG")]
    config: Option<PathBuf>,

    /// Owner whose calendar is processed
    #[arg(long, global = true, env = "ORYXA_OWNER", default_value = "local")]
    owner: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Calendar events
    Event {
        #[command(subcommand)]
        action: commands::event::EventAction,
    },
    /// Prayer times and windows
    Prayer {
        #[command(subcommand)]
        action: commands::prayer::PrayerAction,
    },
    /// Conflict detection and answers to suggestions
    Conflict {
        #[command(subcommand)]
        action: commands::conflict::ConflictAction,
    },
    /// Autopilot runs and undo
    Autopilot {
        #[command(subcommand)]
        action: commands::autopilot::AutopilotAction,
    },
    /// Feedback statistics
    Learning {
        #[command(subcommand)]
        action: commands::learning::LearningAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

/// Logs go to stderr so stdout stays machine-readable.
fn init_tracing() {
    let filter = EnvFilter::try_from_env("ORYXA_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("oryxa_autopilot=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    init_tracing();

    let cli = Cli::parse();
    let ctx = Context {
        db_path: cli.db,
        config_path: cli.config,
        owner: cli.owner,
    };
    let result = match cli.command {
        Commands::Event { action } => commands::event::run(action, &ctx),
        Commands::Prayer { action } => commands::prayer::run(action, &ctx),
        Commands::Conflict { action } => commands::conflict::run(action, &ctx),
        Commands::Autopilot { action } => commands::autopilot::run(action, &ctx),
        Commands::Learning { action } => commands::learning::run(action, &ctx),
        Commands::Config { action } => commands::config::run(action, &ctx),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
