use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;

#[derive(Parser)]
#[command(name = "tickler", version, about = "Persistent reminders for AI agents")]
struct Cli {
    /// Path to the reminder database (defaults to the platform data dir)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a reminder
    Add(commands::AddArgs),
    /// List reminders
    List(commands::ListArgs),
    /// Show one reminder
    Get {
        /// Reminder ID
        id: String,
    },
    /// Complete a reminder (schedules the next occurrence if recurring)
    Complete {
        /// Reminder ID
        id: String,
    },
    /// Snooze a reminder
    Snooze {
        /// Reminder ID
        id: String,
        /// Snooze duration in minutes
        #[arg(long, default_value = "60")]
        minutes: i64,
    },
    /// Delete a reminder
    Delete {
        /// Reminder ID
        id: String,
    },
    /// Show a reminder's audit history
    History {
        /// Reminder ID
        id: String,
        /// Maximum entries to show
        #[arg(long, default_value = "20")]
        limit: usize,
    },
    /// Run one evaluation pass
    Evaluate(commands::EvaluateArgs),
    /// Run the continuous watch loop
    Watch(commands::WatchArgs),
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tickler=info")))
        .with(fmt::layer().with_target(false))
        .init();

    let cli = Cli::parse();
    let db_path = cli
        .db
        .unwrap_or_else(tickler_core::default_db_path);

    let result = match cli.command {
        Commands::Add(args) => commands::add(&db_path, args),
        Commands::List(args) => commands::list(&db_path, args),
        Commands::Get { id } => commands::get(&db_path, &id),
        Commands::Complete { id } => commands::complete(&db_path, &id),
        Commands::Snooze { id, minutes } => commands::snooze(&db_path, &id, minutes),
        Commands::Delete { id } => commands::delete(&db_path, &id),
        Commands::History { id, limit } => commands::history(&db_path, &id, limit),
        Commands::Evaluate(args) => commands::evaluate(&db_path, args).await,
        Commands::Watch(args) => commands::watch(&db_path, args).await,
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
