pub mod handlers;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "testvault")]
#[command(about = "Tamper-evident test-case registry — write-once artifacts, audit log, integrity gate")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the state directory and establish the integrity baseline
    Init {
        /// Protected tree to baseline (default: <root>/core)
        #[arg(long)]
        protected: Option<PathBuf>,
    },
    /// Add a test case from a JSON definition file
    Add {
        /// Path to the definition JSON
        definition: PathBuf,
    },
    /// List registered test cases
    List {
        /// Filter by status: active or inactive
        #[arg(long)]
        status: Option<String>,
        /// Filter by tag (any match; repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,
        /// Only tests created strictly after this RFC 3339 timestamp
        #[arg(long)]
        after: Option<String>,
    },
    /// Verify one test case, or the whole registry with --all
    Verify {
        /// Test id to verify
        id: Option<String>,
        /// Verify every registered test
        #[arg(long, conflicts_with = "id")]
        all: bool,
    },
    /// Audit log inspection
    Logs {
        #[command(subcommand)]
        action: LogsAction,
    },
    /// Show registry, audit, and integrity status
    Status,
}

#[derive(Subcommand)]
pub enum LogsAction {
    /// Verify a day's audit log checksums (default: today)
    Verify {
        /// Date to verify, YYYY-MM-DD
        #[arg(long)]
        date: Option<String>,
    },
    /// Show recent audit entries from today's log
    Recent {
        /// Maximum entries to show
        #[arg(long, default_value_t = 10)]
        count: usize,
        /// Filter by action name, e.g. TEST_ADDED
        #[arg(long)]
        action: Option<String>,
    },
}

/// Run the CLI against the resolved state directory.
pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Init { protected } => handlers::init(protected)?,
        Commands::Add { definition } => handlers::add(&definition)?,
        Commands::List {
            status,
            tags,
            after,
        } => handlers::list(status.as_deref(), tags, after.as_deref())?,
        Commands::Verify { id, all } => handlers::verify(id.as_deref(), all)?,
        Commands::Logs { action } => match action {
            LogsAction::Verify { date } => handlers::logs_verify(date.as_deref())?,
            LogsAction::Recent { count, action } => {
                handlers::logs_recent(count, action.as_deref())?
            }
        },
        Commands::Status => handlers::status()?,
    }

    Ok(())
}
