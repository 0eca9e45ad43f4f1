//! Fire-count bookkeeping for included reminders.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::TicklerResult;
use crate::store::ReminderStore;
use crate::types::{HistoryAction, HistoryEntry, Originator, Reminder, Status};

/// Record a fire for every included reminder and auto-complete those that
/// reach their fire cap.
///
/// In preview mode this is a no-op: the pipeline still ran in full, but no
/// record is mutated.
pub fn record_fires(
    store: &dyn ReminderStore,
    included: Vec<Reminder>,
    now: DateTime<Utc>,
    preview: bool,
) -> TicklerResult<Vec<Reminder>> {
    if preview {
        return Ok(included);
    }

    let mut fired = Vec::with_capacity(included.len());
    for mut reminder in included {
        let before = reminder.clone();

        reminder.fire_count += 1;
        reminder.last_fired_at = Some(now);
        reminder.updated_at = now;

        let capped = reminder
            .max_fires
            .is_some_and(|max| reminder.fire_count >= max);
        if capped {
            reminder.status = Status::Completed;
            reminder.completed_at = Some(now);
        }

        store.update(&reminder)?;
        store.append_history(
            &HistoryEntry::new(reminder.id, HistoryAction::Fired, Originator::System)
                .with_before(&before)
                .with_after(&reminder),
        )?;
        if capped {
            store.append_history(&HistoryEntry::new(
                reminder.id,
                HistoryAction::Completed,
                Originator::System,
            ))?;
            debug!(
                reminder = %reminder.id,
                fire_count = reminder.fire_count,
                "fire cap reached, reminder completed"
            );
        }

        fired.push(reminder);
    }
    Ok(fired)
}
