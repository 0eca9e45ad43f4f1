//! Recurrence scheduling: spawning the next occurrence when a recurring
//! reminder is completed.
//!
//! Runs from the `complete` operation, never from an evaluation tick.

use chrono::{DateTime, Utc};
use tracing::info;

use crate::error::TicklerResult;
use crate::store::ReminderStore;
use crate::types::{HistoryAction, HistoryEntry, Originator, Reminder, TriggerSpec};

/// Build the successor of a completed recurring reminder, or `None` when it
/// has no recurrence rule.
///
/// The next due time advances from the reminder's previous due time (or now,
/// for triggers without one) by the rule's period; month is a fixed 30-day
/// approximation. All non-temporal fields are cloned; the successor gets a
/// fresh id, a zero fire count, and a `recurrence_parent` pointing at the
/// chain root, so chains flatten rather than nest.
pub fn next_occurrence(completed: &Reminder, now: DateTime<Utc>) -> Option<Reminder> {
    let rule = completed.recurrence?;
    let base = completed.trigger.due_at().unwrap_or(now);
    let next_due = base + rule.period();

    let trigger = match &completed.trigger {
        TriggerSpec::Time { .. } => TriggerSpec::time(next_due),
        other => other.clone(),
    };

    let mut successor = Reminder::new(completed.agent.clone(), completed.content.clone(), trigger)
        .with_priority(completed.priority)
        .with_recurrence(rule);
    successor.max_fires = completed.max_fires;
    successor.depends_on = completed.depends_on;
    successor.recurrence_parent = Some(completed.recurrence_parent.unwrap_or(completed.id));

    Some(successor)
}

/// Create and persist the successor of a just-completed reminder, recording
/// a "created" history entry for it.
pub fn spawn_successor(
    store: &dyn ReminderStore,
    completed: &Reminder,
    now: DateTime<Utc>,
) -> TicklerResult<Option<Reminder>> {
    let Some(successor) = next_occurrence(completed, now) else {
        return Ok(None);
    };

    store.add(&successor)?;
    store.append_history(
        &HistoryEntry::new(successor.id, HistoryAction::Created, Originator::System)
            .with_after(&successor),
    )?;
    info!(
        completed = %completed.id,
        successor = %successor.id,
        "scheduled next occurrence of recurring reminder"
    );

    Ok(Some(successor))
}
