//! Append-only audit history for reminder mutations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

use crate::types::Reminder;

/// What happened to a reminder.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum HistoryAction {
    Created,
    Updated,
    Snoozed,
    Reactivated,
    Escalated,
    Fired,
    Completed,
    Expired,
    Deleted,
}

/// Who caused a mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Originator {
    /// A specific agent namespace.
    Agent(String),
    /// A human operator (e.g. via the CLI).
    User,
    /// The engine itself (escalation, auto-completion, decay).
    System,
}

impl std::fmt::Display for Originator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Agent(name) => write!(f, "agent:{}", name),
            Self::User => f.write_str("user"),
            Self::System => f.write_str("system"),
        }
    }
}

impl std::str::FromStr for Originator {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "user" => Self::User,
            "system" => Self::System,
            other => Self::Agent(
                other
                    .strip_prefix("agent:")
                    .unwrap_or(other)
                    .to_string(),
            ),
        })
    }
}

/// An append-only audit record. Written by every core mutation and never
/// mutated afterward.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Record identifier.
    pub id: Uuid,
    /// The reminder this record refers to.
    pub reminder_id: Uuid,
    /// What happened.
    pub action: HistoryAction,
    /// Snapshot of the reminder before the mutation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub before: Option<serde_json::Value>,
    /// Snapshot of the reminder after the mutation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after: Option<serde_json::Value>,
    /// Who caused the mutation.
    pub actor: Originator,
    /// When the record was written.
    pub created_at: DateTime<Utc>,
}

impl HistoryEntry {
    /// Create a new history record stamped now.
    pub fn new(reminder_id: Uuid, action: HistoryAction, actor: Originator) -> Self {
        Self {
            id: Uuid::new_v4(),
            reminder_id,
            action,
            before: None,
            after: None,
            actor,
            created_at: Utc::now(),
        }
    }

    /// Attach a before snapshot.
    pub fn with_before(mut self, reminder: &Reminder) -> Self {
        self.before = serde_json::to_value(reminder).ok();
        self
    }

    /// Attach an after snapshot.
    pub fn with_after(mut self, reminder: &Reminder) -> Self {
        self.after = serde_json::to_value(reminder).ok();
        self
    }
}
