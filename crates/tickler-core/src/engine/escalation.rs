//! Time-based priority escalation for overdue reminders.

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::error::TicklerResult;
use crate::store::ReminderStore;
use crate::types::{HistoryAction, HistoryEntry, Originator, Priority, Reminder, Status};

/// Promote the priority of overdue time-triggered candidates in place.
///
/// Both rules run in the same pass, in order: a reminder promoted from 3 to 2
/// is immediately re-checked against the 2-to-1 rule, so a sufficiently
/// overdue reminder jumps two levels in one evaluation.
///
/// Promotions are persisted (with a history entry) unless `preview` is set;
/// in preview the promoted priorities still flow into allocation but no
/// record is mutated.
pub fn escalate(
    store: &dyn ReminderStore,
    candidates: &mut [Reminder],
    now: DateTime<Utc>,
    preview: bool,
) -> TicklerResult<()> {
    for reminder in candidates.iter_mut() {
        if reminder.status != Status::Active {
            continue;
        }
        let Some(due_at) = reminder.trigger.due_at() else {
            continue;
        };
        let overdue = now - due_at;
        if overdue <= Duration::zero() {
            continue;
        }

        let before = reminder.clone();

        // Priority 3 escalates after 48h overdue, priority 2 after 24h.
        if reminder.priority.get() == 3 && overdue >= Duration::hours(48) {
            reminder.priority = Priority::new(2)?;
        }
        if reminder.priority.get() == 2 && overdue >= Duration::hours(24) {
            reminder.priority = Priority::new(1)?;
        }

        if reminder.priority != before.priority {
            debug!(
                reminder = %reminder.id,
                from = %before.priority,
                to = %reminder.priority,
                overdue_hours = overdue.num_hours(),
                "escalating overdue reminder"
            );
            if !preview {
                reminder.updated_at = now;
                store.update(reminder)?;
                store.append_history(
                    &HistoryEntry::new(reminder.id, HistoryAction::Escalated, Originator::System)
                        .with_before(&before)
                        .with_after(reminder),
                )?;
            }
        }
    }
    Ok(())
}
