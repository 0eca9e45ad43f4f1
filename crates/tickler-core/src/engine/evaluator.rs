//! Trigger evaluation: which reminders are currently due.

use std::collections::HashSet;
use std::process::Stdio;
use std::time::Duration;

use chrono::{DateTime, Utc};
use regex::RegexBuilder;
use tracing::debug;

use crate::error::TicklerResult;
use crate::store::{ReminderFilter, ReminderStore};
use crate::types::{
    HistoryAction, HistoryEntry, MatchMode, Originator, Reminder, Status, TriggerKind, TriggerSpec,
};

/// Determines which reminders are due for a requested set of trigger kinds at
/// a point in time.
///
/// Every call first performs two store-side housekeeping passes: expired
/// snoozes are reactivated, and decayed reminders are expired. A failure
/// specific to one candidate (malformed pattern, hung condition check)
/// degrades only that candidate to not-due.
pub struct TriggerEvaluator<'a> {
    store: &'a dyn ReminderStore,
    condition_timeout: Duration,
}

impl<'a> TriggerEvaluator<'a> {
    /// Create an evaluator over the given store.
    pub fn new(store: &'a dyn ReminderStore, condition_timeout: Duration) -> Self {
        Self {
            store,
            condition_timeout,
        }
    }

    /// Evaluate which reminders are due.
    ///
    /// The result is de-duplicated by id: a reminder matched by more than one
    /// requested kind appears once.
    pub async fn evaluate_due(
        &self,
        now: DateTime<Utc>,
        kinds: &[TriggerKind],
        agent: Option<&str>,
        message: Option<&str>,
    ) -> TicklerResult<Vec<Reminder>> {
        self.reactivate_snoozed(now)?;
        self.expire_decayed(now)?;

        let mut seen: HashSet<uuid::Uuid> = HashSet::new();
        let mut due = Vec::new();

        for kind in kinds {
            // Manual reminders are never auto-included.
            if *kind == TriggerKind::Manual {
                continue;
            }

            let mut filter = ReminderFilter::default()
                .with_status(Status::Active)
                .with_kind(*kind);
            if let Some(agent) = agent {
                filter = filter.with_agent(agent);
            }

            for reminder in self.store.list(&filter)? {
                if !reminder.can_fire() || seen.contains(&reminder.id) {
                    continue;
                }
                if self.is_due(&reminder, now, message).await {
                    seen.insert(reminder.id);
                    due.push(reminder);
                }
            }
        }

        Ok(due)
    }

    async fn is_due(&self, reminder: &Reminder, now: DateTime<Utc>, message: Option<&str>) -> bool {
        match &reminder.trigger {
            TriggerSpec::Time { due_at } => *due_at <= now,
            TriggerSpec::Keyword {
                keywords,
                match_mode,
            } => message.is_some_and(|m| keywords_match(m, keywords, *match_mode)),
            TriggerSpec::Condition {
                command,
                expected_output,
            } => self.check_condition(reminder, command, expected_output).await,
            // Each session/heartbeat evaluation counts as one occurrence.
            TriggerSpec::Session | TriggerSpec::Heartbeat => true,
            TriggerSpec::Manual => false,
        }
    }

    /// Run a condition-check command, bounded by the configured timeout.
    ///
    /// Due only when the command exits zero and its trimmed stdout equals the
    /// expected string. Spawn failures, non-zero exits, and timeouts are all
    /// treated as non-matching.
    async fn check_condition(&self, reminder: &Reminder, command: &str, expected: &str) -> bool {
        let output = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        match tokio::time::timeout(self.condition_timeout, output).await {
            Err(_) => {
                debug!(reminder = %reminder.id, command, "condition check timed out");
                false
            }
            Ok(Err(e)) => {
                debug!(reminder = %reminder.id, error = %e, "condition check failed to run");
                false
            }
            Ok(Ok(output)) => {
                if !output.status.success() {
                    return false;
                }
                let stdout = String::from_utf8_lossy(&output.stdout);
                stdout.trim() == expected.trim()
            }
        }
    }

    /// Reactivate any snoozed reminder whose snooze has expired.
    fn reactivate_snoozed(&self, now: DateTime<Utc>) -> TicklerResult<()> {
        let snoozed = self
            .store
            .list(&ReminderFilter::default().with_status(Status::Snoozed))?;

        for mut reminder in snoozed {
            let expired = reminder.snooze_until.map_or(true, |until| until <= now);
            if !expired {
                continue;
            }
            reminder.status = Status::Active;
            reminder.snooze_until = None;
            reminder.updated_at = now;
            self.store.update(&reminder)?;
            self.store.append_history(&HistoryEntry::new(
                reminder.id,
                HistoryAction::Reactivated,
                Originator::System,
            ))?;
            debug!(reminder = %reminder.id, "snooze expired, reminder reactivated");
        }
        Ok(())
    }

    /// Expire any active reminder whose decay timestamp has passed.
    fn expire_decayed(&self, now: DateTime<Utc>) -> TicklerResult<()> {
        let active = self
            .store
            .list(&ReminderFilter::default().with_status(Status::Active))?;

        for mut reminder in active {
            let decayed = reminder.decay_at.is_some_and(|at| at <= now);
            if !decayed {
                continue;
            }
            let before = reminder.clone();
            reminder.status = Status::Expired;
            reminder.updated_at = now;
            self.store.update(&reminder)?;
            self.store.append_history(
                &HistoryEntry::new(reminder.id, HistoryAction::Expired, Originator::System)
                    .with_before(&before)
                    .with_after(&reminder),
            )?;
            debug!(reminder = %reminder.id, "reminder decayed, expired");
        }
        Ok(())
    }
}

/// Match message text against a keyword list.
///
/// A malformed regex pattern is treated as non-matching, never an error.
pub(crate) fn keywords_match(message: &str, keywords: &[String], mode: MatchMode) -> bool {
    if keywords.is_empty() {
        return false;
    }
    let haystack = message.to_lowercase();
    match mode {
        MatchMode::Any => keywords
            .iter()
            .any(|k| haystack.contains(&k.to_lowercase())),
        MatchMode::All => keywords
            .iter()
            .all(|k| haystack.contains(&k.to_lowercase())),
        MatchMode::Regex => keywords.iter().any(|pattern| {
            RegexBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .map(|re| re.is_match(message))
                .unwrap_or(false)
        }),
    }
}
