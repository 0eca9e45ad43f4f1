//! tickler-core - Core library for tickler.
//!
//! This crate provides a persistent reminder store for autonomous agents:
//! multi-trigger due-detection, dependency gating, time-based priority
//! escalation, greedy budget packing, fire-count bookkeeping, recurrence
//! scheduling, and a continuous watch loop with notification cooldown and
//! on-fire hooks.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tickler_core::{
//!     Engine, EngineConfig, EvaluateOptions, Originator, Reminder, SqliteStore, TriggerSpec,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(SqliteStore::new("tickler.db")?);
//! let engine = Engine::new(store, EngineConfig::default());
//!
//! // Add a reminder that fires whenever "deploy" comes up.
//! let reminder = Reminder::new(
//!     "default",
//!     "run the smoke tests before deploying",
//!     TriggerSpec::keyword(vec!["deploy".to_string()]),
//! );
//! engine.add(reminder, Originator::User)?;
//!
//! // One evaluation pass against a message.
//! let options = EvaluateOptions::default().with_message("ready to deploy?");
//! let evaluation = engine.evaluate(chrono::Utc::now(), &options).await?;
//! println!("{} reminder(s) due", evaluation.included.len());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod hooks;
pub mod notify;
pub mod store;
pub mod types;
pub mod watch;

// Re-export commonly used types
pub use config::{default_db_path, EngineConfig};
pub use engine::{
    BudgetAllocation, BudgetAllocator, Engine, EvaluateOptions, Evaluation, TriggerEvaluator,
};
pub use error::{ErrorCode, TicklerError, TicklerResult};
pub use hooks::{HookRunner, ShellHookRunner};
pub use notify::{CommandNotifier, LogNotifier, Notification, Notifier};
pub use store::{ReminderFilter, ReminderStore, SqliteStore};
pub use types::{
    HistoryAction, HistoryEntry, MatchMode, Originator, Priority, Recurrence, RecurrenceUnit,
    Reminder, Status, TriggerKind, TriggerSpec,
};
pub use watch::{wait_for_due, HookConfig, WatchConfig, WatchHandle, WatchLoop, WatchState};
