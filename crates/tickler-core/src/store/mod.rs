//! Reminder persistence.
//!
//! The engine talks to storage through the [`ReminderStore`] trait; the
//! default implementation is SQLite-backed. Store failures are fatal to the
//! operation that hit them and always propagate — the engine has no way to
//! route around an unavailable store.

mod sqlite;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::TicklerResult;
use crate::types::{HistoryEntry, Reminder, Status, TriggerKind};

pub use sqlite::SqliteStore;

/// Query filter for listing reminders. All fields are conjunctive.
#[derive(Debug, Clone, Default)]
pub struct ReminderFilter {
    pub status: Option<Status>,
    pub kind: Option<TriggerKind>,
    pub agent: Option<String>,
}

impl ReminderFilter {
    /// Filter by lifecycle status.
    pub fn with_status(mut self, status: Status) -> Self {
        self.status = Some(status);
        self
    }

    /// Filter by trigger kind.
    pub fn with_kind(mut self, kind: TriggerKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Filter by owning agent namespace.
    pub fn with_agent(mut self, agent: impl Into<String>) -> Self {
        self.agent = Some(agent.into());
        self
    }
}

/// Trait for reminder storage operations.
pub trait ReminderStore: Send + Sync {
    /// Add a new reminder.
    fn add(&self, reminder: &Reminder) -> TicklerResult<()>;

    /// Get a reminder by id.
    fn get(&self, id: Uuid) -> TicklerResult<Option<Reminder>>;

    /// Update an existing reminder.
    fn update(&self, reminder: &Reminder) -> TicklerResult<()>;

    /// List reminders matching the filter, oldest first.
    fn list(&self, filter: &ReminderFilter) -> TicklerResult<Vec<Reminder>>;

    /// Hard-delete reminders in the given statuses last updated before the
    /// cutoff, together with their history. Returns the number removed.
    fn purge_older_than(&self, statuses: &[Status], cutoff: DateTime<Utc>)
        -> TicklerResult<usize>;

    /// Append an audit record.
    fn append_history(&self, entry: &HistoryEntry) -> TicklerResult<()>;

    /// Audit records for a reminder, newest first.
    fn history_for(&self, reminder_id: Uuid, limit: usize) -> TicklerResult<Vec<HistoryEntry>>;
}
