//! Dependency gating: a reminder with a prerequisite is only eligible once
//! the prerequisite completes.

use tracing::debug;

use crate::error::TicklerResult;
use crate::store::ReminderStore;
use crate::types::{Reminder, Status};

/// Drop candidates whose dependency is missing or not completed.
///
/// No cycle detection is performed: two reminders depending on each other
/// gate each other indefinitely.
pub fn apply(
    store: &dyn ReminderStore,
    candidates: Vec<Reminder>,
) -> TicklerResult<Vec<Reminder>> {
    let mut eligible = Vec::with_capacity(candidates.len());

    for reminder in candidates {
        let Some(dep_id) = reminder.depends_on else {
            eligible.push(reminder);
            continue;
        };
        match store.get(dep_id)? {
            Some(dep) if dep.status == Status::Completed => eligible.push(reminder),
            Some(_) => {
                debug!(reminder = %reminder.id, dependency = %dep_id, "dependency not completed, gated");
            }
            None => {
                debug!(reminder = %reminder.id, dependency = %dep_id, "dependency missing, gated");
            }
        }
    }

    Ok(eligible)
}
