//! Core types for the reminder system.
//!
//! - [`Reminder`]: the unit of work, with a trigger, priority, and lifecycle
//! - [`TriggerSpec`]: the condition under which a reminder becomes due
//! - [`HistoryEntry`]: append-only audit record written by every core mutation

mod history;
mod reminder;

pub use history::{HistoryAction, HistoryEntry, Originator};
pub use reminder::{
    MatchMode, Priority, Recurrence, RecurrenceUnit, Reminder, Status, TriggerKind, TriggerSpec,
};
