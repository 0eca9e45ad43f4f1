//! Command handlers for the tickler CLI.

use std::error::Error;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use clap::Args;
use uuid::Uuid;

use tickler_core::{
    CommandNotifier, Engine, EngineConfig, EvaluateOptions, HookConfig, MatchMode, Originator,
    Priority, Recurrence, RecurrenceUnit, Reminder, ReminderFilter, ShellHookRunner, SqliteStore,
    Status, TriggerKind, TriggerSpec, WatchConfig, WatchLoop, WatchState,
};

type CliResult = Result<(), Box<dyn Error>>;

fn open_engine(db_path: &Path) -> Result<Engine, Box<dyn Error>> {
    let store = Arc::new(SqliteStore::new(db_path)?);
    Ok(Engine::new(store, EngineConfig::from_env()))
}

fn parse_id(id: &str) -> Result<Uuid, Box<dyn Error>> {
    Ok(Uuid::parse_str(id)?)
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, Box<dyn Error>> {
    Ok(DateTime::parse_from_rfc3339(s)?.with_timezone(&Utc))
}

fn print_reminder(reminder: &Reminder) {
    println!(
        "{}  [P{}] {:<9} {:<9} {}",
        reminder.id,
        reminder.priority,
        reminder.status,
        reminder.kind(),
        reminder.content
    );
}

#[derive(Args)]
pub struct AddArgs {
    /// Reminder content
    content: String,
    /// Owning agent namespace
    #[arg(long, default_value = "default")]
    agent: String,
    /// Priority 1 (most urgent) through 5
    #[arg(long, default_value = "3")]
    priority: u8,
    /// Due timestamp (RFC 3339) — makes this a time trigger
    #[arg(long)]
    due: Option<String>,
    /// Comma-separated keywords — makes this a keyword trigger
    #[arg(long)]
    keywords: Option<String>,
    /// Keyword match mode: any, all, or regex
    #[arg(long, default_value = "any")]
    match_mode: String,
    /// Check command — makes this a condition trigger
    #[arg(long)]
    command: Option<String>,
    /// Expected command output for condition triggers
    #[arg(long, default_value = "")]
    expected: String,
    /// Trigger kind when no time/keyword/condition config is given:
    /// session, heartbeat, or manual
    #[arg(long, default_value = "manual")]
    kind: String,
    /// Maximum number of fires before auto-completion
    #[arg(long)]
    max_fires: Option<u32>,
    /// Recurrence interval (used with --unit)
    #[arg(long)]
    every: Option<u32>,
    /// Recurrence unit: day, week, or month
    #[arg(long, default_value = "day")]
    unit: String,
    /// Prerequisite reminder ID
    #[arg(long)]
    depends_on: Option<String>,
    /// Auto-expire timestamp (RFC 3339)
    #[arg(long)]
    decay: Option<String>,
}

pub fn add(db_path: &Path, args: AddArgs) -> CliResult {
    let engine = open_engine(db_path)?;

    let trigger = if let Some(due) = &args.due {
        TriggerSpec::time(parse_timestamp(due)?)
    } else if let Some(keywords) = &args.keywords {
        TriggerSpec::Keyword {
            keywords: keywords.split(',').map(|k| k.trim().to_string()).collect(),
            match_mode: MatchMode::from_str(&args.match_mode)
                .map_err(|_| format!("unknown match mode '{}'", args.match_mode))?,
        }
    } else if let Some(command) = &args.command {
        TriggerSpec::condition(command.clone(), args.expected.clone())
    } else {
        match TriggerKind::from_str(&args.kind) {
            Ok(TriggerKind::Session) => TriggerSpec::Session,
            Ok(TriggerKind::Heartbeat) => TriggerSpec::Heartbeat,
            Ok(TriggerKind::Manual) => TriggerSpec::Manual,
            _ => return Err(format!("unsupported trigger kind '{}'", args.kind).into()),
        }
    };

    let mut reminder = Reminder::new(args.agent, args.content, trigger)
        .with_priority(Priority::new(args.priority)?);
    if let Some(max) = args.max_fires {
        reminder = reminder.with_max_fires(max);
    }
    if let Some(every) = args.every {
        let unit = RecurrenceUnit::from_str(&args.unit)
            .map_err(|_| format!("unknown recurrence unit '{}'", args.unit))?;
        reminder = reminder.with_recurrence(Recurrence::new(every, unit)?);
    }
    if let Some(dep) = &args.depends_on {
        reminder = reminder.with_depends_on(parse_id(dep)?);
    }
    if let Some(decay) = &args.decay {
        reminder = reminder.with_decay_at(parse_timestamp(decay)?);
    }

    let added = engine.add(reminder, Originator::User)?;
    print_reminder(&added);
    Ok(())
}

#[derive(Args)]
pub struct ListArgs {
    /// Filter by status
    #[arg(long)]
    status: Option<String>,
    /// Filter by trigger kind
    #[arg(long)]
    kind: Option<String>,
    /// Filter by agent namespace
    #[arg(long)]
    agent: Option<String>,
    /// Output as JSON
    #[arg(long)]
    json: bool,
}

pub fn list(db_path: &Path, args: ListArgs) -> CliResult {
    let engine = open_engine(db_path)?;

    let mut filter = ReminderFilter::default();
    if let Some(status) = &args.status {
        filter = filter.with_status(
            Status::from_str(status).map_err(|_| format!("unknown status '{}'", status))?,
        );
    }
    if let Some(kind) = &args.kind {
        filter = filter.with_kind(
            TriggerKind::from_str(kind).map_err(|_| format!("unknown trigger kind '{}'", kind))?,
        );
    }
    if let Some(agent) = &args.agent {
        filter = filter.with_agent(agent.clone());
    }

    let reminders = engine.list(&filter)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&reminders)?);
    } else {
        for reminder in &reminders {
            print_reminder(reminder);
        }
        if reminders.is_empty() {
            println!("no reminders");
        }
    }
    Ok(())
}

pub fn get(db_path: &Path, id: &str) -> CliResult {
    let engine = open_engine(db_path)?;
    let reminder = engine.get(parse_id(id)?)?;
    println!("{}", serde_json::to_string_pretty(&reminder)?);
    Ok(())
}

pub fn complete(db_path: &Path, id: &str) -> CliResult {
    let engine = open_engine(db_path)?;
    let (completed, successor) = engine.complete(parse_id(id)?, Originator::User)?;
    println!("completed {}", completed.id);
    if let Some(next) = successor {
        println!(
            "next occurrence {} due {}",
            next.id,
            next.trigger
                .due_at()
                .map(|dt| dt.to_rfc3339())
                .unwrap_or_else(|| "on trigger".to_string())
        );
    }
    Ok(())
}

pub fn snooze(db_path: &Path, id: &str, minutes: i64) -> CliResult {
    let engine = open_engine(db_path)?;
    let until = Utc::now() + chrono::Duration::minutes(minutes);
    let reminder = engine.snooze(parse_id(id)?, until, Originator::User)?;
    println!("snoozed {} until {}", reminder.id, until.to_rfc3339());
    Ok(())
}

pub fn delete(db_path: &Path, id: &str) -> CliResult {
    let engine = open_engine(db_path)?;
    engine.delete(parse_id(id)?, Originator::User)?;
    println!("deleted {}", id);
    Ok(())
}

pub fn history(db_path: &Path, id: &str, limit: usize) -> CliResult {
    let engine = open_engine(db_path)?;
    let entries = engine.history(parse_id(id)?, limit)?;
    for entry in &entries {
        println!(
            "{}  {:<11} {}",
            entry.created_at.to_rfc3339(),
            entry.action,
            entry.actor
        );
    }
    if entries.is_empty() {
        println!("no history");
    }
    Ok(())
}

#[derive(Args)]
pub struct EvaluateArgs {
    /// Comma-separated trigger kinds to evaluate
    #[arg(long, default_value = "time,heartbeat,session,condition")]
    kinds: String,
    /// Restrict to one agent namespace
    #[arg(long)]
    agent: Option<String>,
    /// Message text for keyword matching
    #[arg(long)]
    message: Option<String>,
    /// Size budget in units
    #[arg(long, default_value = "500")]
    budget: u32,
    /// Disable priority escalation
    #[arg(long)]
    no_escalate: bool,
    /// Dry run: evaluate without mutating anything
    #[arg(long)]
    preview: bool,
    /// Output as JSON
    #[arg(long)]
    json: bool,
}

pub async fn evaluate(db_path: &Path, args: EvaluateArgs) -> CliResult {
    let engine = open_engine(db_path)?;

    let kinds = args
        .kinds
        .split(',')
        .map(|k| {
            TriggerKind::from_str(k.trim())
                .map_err(|_| format!("unknown trigger kind '{}'", k.trim()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut options = EvaluateOptions::default()
        .with_kinds(kinds)
        .with_budget_units(args.budget);
    if let Some(agent) = args.agent {
        options = options.with_agent(agent);
    }
    if let Some(message) = args.message {
        options = options.with_message(message);
    }
    if args.no_escalate {
        options = options.without_escalation();
    }
    if args.preview {
        options = options.preview();
    }

    let evaluation = engine.evaluate(Utc::now(), &options).await?;

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "included": evaluation.included,
                "overflow": evaluation.overflow,
                "total_triggered": evaluation.total_triggered,
            }))?
        );
    } else {
        for reminder in &evaluation.included {
            print_reminder(reminder);
        }
        println!(
            "{} included, {} triggered, overflow: {:?}",
            evaluation.included.len(),
            evaluation.total_triggered,
            evaluation.overflow
        );
    }
    Ok(())
}

#[derive(Args)]
pub struct WatchArgs {
    /// Seconds between ticks
    #[arg(long, default_value = "30")]
    interval_secs: u64,
    /// Per-reminder notification cooldown in seconds
    #[arg(long, default_value = "300")]
    cooldown_secs: u64,
    /// Size budget per tick, in units
    #[arg(long, default_value = "500")]
    budget: u32,
    /// Restrict to one agent namespace
    #[arg(long)]
    agent: Option<String>,
    /// Run a single tick and exit
    #[arg(long)]
    once: bool,
    /// On-fire hook command
    #[arg(long)]
    hook: Option<String>,
    /// Hook execution timeout in seconds
    #[arg(long, default_value = "5")]
    hook_timeout_secs: u64,
    /// File to append hook failures to
    #[arg(long)]
    hook_log: Option<std::path::PathBuf>,
}

pub async fn watch(db_path: &Path, args: WatchArgs) -> CliResult {
    let engine = Arc::new(open_engine(db_path)?);

    let mut config = WatchConfig::default()
        .with_interval(Duration::from_secs(args.interval_secs))
        .with_cooldown(Duration::from_secs(args.cooldown_secs))
        .with_budget_units(args.budget);
    if let Some(agent) = args.agent {
        config = config.with_agent(agent);
    }
    if args.once {
        config = config.once();
    }
    if let Some(hook) = args.hook {
        config = config.with_hook(
            HookConfig::new(hook).with_timeout(Duration::from_secs(args.hook_timeout_secs)),
        );
    }

    let mut hooks = ShellHookRunner::new();
    if let Some(log) = args.hook_log {
        hooks = hooks.with_log_path(log);
    }

    let state = Arc::new(Mutex::new(WatchState::new()));
    let watch = WatchLoop::new(
        engine,
        Arc::new(CommandNotifier::new()),
        Arc::new(hooks),
        config,
        state,
    );

    let handle = watch.spawn();
    if args.once {
        handle.join().await;
    } else {
        tokio::signal::ctrl_c().await.ok();
        handle.stop().await;
    }
    Ok(())
}
