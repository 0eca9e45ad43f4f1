//! The evaluation pipeline and high-level reminder operations.
//!
//! One evaluation runs: trigger evaluation (which reminders are due) ->
//! optional escalation -> dependency gating -> budget allocation ->
//! fire-count bookkeeping. The pipeline is synchronous within a call and
//! single-threaded by policy.

mod budget;
mod escalation;
mod evaluator;
mod fire;
mod gate;
mod recurrence;

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

pub use budget::{BudgetAllocation, BudgetAllocator};
pub use evaluator::TriggerEvaluator;
pub use recurrence::next_occurrence;

use crate::config::EngineConfig;
use crate::error::TicklerResult;
use crate::store::{ReminderFilter, ReminderStore};
use crate::types::{
    HistoryAction, HistoryEntry, Originator, Reminder, Status, TriggerKind,
};

/// Options for a single evaluation pass.
#[derive(Debug, Clone)]
pub struct EvaluateOptions {
    /// Trigger kinds to consider.
    pub kinds: Vec<TriggerKind>,
    /// Restrict to one agent namespace (None = all agents).
    pub agent: Option<String>,
    /// Free text for keyword matching.
    pub message: Option<String>,
    /// Size budget, in abstract units (one unit = four characters).
    pub budget_units: u32,
    /// Promote overdue time reminders before allocation.
    pub escalate: bool,
    /// Run the full pipeline without mutating any record.
    pub preview: bool,
}

impl Default for EvaluateOptions {
    fn default() -> Self {
        Self {
            kinds: vec![
                TriggerKind::Time,
                TriggerKind::Heartbeat,
                TriggerKind::Session,
                TriggerKind::Condition,
            ],
            agent: None,
            message: None,
            budget_units: 500,
            escalate: true,
            preview: false,
        }
    }
}

impl EvaluateOptions {
    /// Set the requested trigger kinds.
    pub fn with_kinds(mut self, kinds: Vec<TriggerKind>) -> Self {
        self.kinds = kinds;
        self
    }

    /// Restrict evaluation to one agent namespace.
    pub fn with_agent(mut self, agent: impl Into<String>) -> Self {
        self.agent = Some(agent.into());
        self
    }

    /// Provide message text for keyword matching.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Set the size budget in units.
    pub fn with_budget_units(mut self, units: u32) -> Self {
        self.budget_units = units;
        self
    }

    /// Disable priority escalation.
    pub fn without_escalation(mut self) -> Self {
        self.escalate = false;
        self
    }

    /// Enable preview (dry-run) mode.
    pub fn preview(mut self) -> Self {
        self.preview = true;
        self
    }
}

/// Result of one evaluation pass.
#[derive(Debug, Clone)]
pub struct Evaluation {
    /// Reminders that fit the budget, in priority order.
    pub included: Vec<Reminder>,
    /// Candidates excluded purely for budget reasons, per priority.
    pub overflow: BTreeMap<u8, usize>,
    /// Total due candidates before gating and trimming.
    pub total_triggered: usize,
}

impl Evaluation {
    /// Overflow count for a priority level.
    pub fn overflow_for(&self, priority: u8) -> usize {
        self.overflow.get(&priority).copied().unwrap_or(0)
    }
}

/// The reminder engine: evaluation pipeline plus the operations the outer
/// surfaces (CLI, API) call.
pub struct Engine {
    store: Arc<dyn ReminderStore>,
    config: EngineConfig,
}

impl Engine {
    /// Create an engine over the given store.
    pub fn new(store: Arc<dyn ReminderStore>, config: EngineConfig) -> Self {
        Self { store, config }
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<dyn ReminderStore> {
        &self.store
    }

    /// The engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run one evaluation pass.
    ///
    /// Store failures propagate; everything else degrades per candidate.
    pub async fn evaluate(
        &self,
        now: DateTime<Utc>,
        options: &EvaluateOptions,
    ) -> TicklerResult<Evaluation> {
        let evaluator = TriggerEvaluator::new(self.store.as_ref(), self.config.condition_timeout);
        let mut candidates = evaluator
            .evaluate_due(
                now,
                &options.kinds,
                options.agent.as_deref(),
                options.message.as_deref(),
            )
            .await?;
        let total_triggered = candidates.len();

        if options.escalate {
            escalation::escalate(self.store.as_ref(), &mut candidates, now, options.preview)?;
        }

        let eligible = gate::apply(self.store.as_ref(), candidates)?;
        let allocation = BudgetAllocator::new(options.budget_units).allocate(eligible);
        let included =
            fire::record_fires(self.store.as_ref(), allocation.included, now, options.preview)?;

        debug!(
            included = included.len(),
            total_triggered,
            preview = options.preview,
            "evaluation pass complete"
        );

        Ok(Evaluation {
            included,
            overflow: allocation.overflow,
            total_triggered,
        })
    }

    /// Add a new reminder.
    pub fn add(&self, reminder: Reminder, actor: Originator) -> TicklerResult<Reminder> {
        reminder.validate()?;
        self.store.add(&reminder)?;
        self.store.append_history(
            &HistoryEntry::new(reminder.id, HistoryAction::Created, actor).with_after(&reminder),
        )?;
        Ok(reminder)
    }

    /// Get a reminder by id.
    pub fn get(&self, id: Uuid) -> TicklerResult<Reminder> {
        self.store
            .get(id)?
            .ok_or_else(|| crate::error::TicklerError::not_found(id.to_string()))
    }

    /// List reminders matching the filter.
    pub fn list(&self, filter: &ReminderFilter) -> TicklerResult<Vec<Reminder>> {
        self.store.list(filter)
    }

    /// Complete a reminder. If it carries a recurrence rule, the next
    /// occurrence is created and returned alongside it.
    ///
    /// Completing an already-completed reminder is a no-op.
    pub fn complete(
        &self,
        id: Uuid,
        actor: Originator,
    ) -> TicklerResult<(Reminder, Option<Reminder>)> {
        let mut reminder = self.get(id)?;
        if reminder.status == Status::Completed {
            return Ok((reminder, None));
        }

        let now = Utc::now();
        let before = reminder.clone();
        reminder.status = Status::Completed;
        reminder.completed_at = Some(now);
        reminder.updated_at = now;
        self.store.update(&reminder)?;
        self.store.append_history(
            &HistoryEntry::new(reminder.id, HistoryAction::Completed, actor)
                .with_before(&before)
                .with_after(&reminder),
        )?;

        let successor = recurrence::spawn_successor(self.store.as_ref(), &reminder, now)?;
        Ok((reminder, successor))
    }

    /// Snooze a reminder until the given time.
    pub fn snooze(
        &self,
        id: Uuid,
        until: DateTime<Utc>,
        actor: Originator,
    ) -> TicklerResult<Reminder> {
        let mut reminder = self.get(id)?;
        let before = reminder.clone();
        reminder.status = Status::Snoozed;
        reminder.snooze_until = Some(until);
        reminder.updated_at = Utc::now();
        self.store.update(&reminder)?;
        self.store.append_history(
            &HistoryEntry::new(reminder.id, HistoryAction::Snoozed, actor)
                .with_before(&before)
                .with_after(&reminder),
        )?;
        Ok(reminder)
    }

    /// Soft-delete a reminder.
    pub fn delete(&self, id: Uuid, actor: Originator) -> TicklerResult<()> {
        let mut reminder = self.get(id)?;
        let before = reminder.clone();
        reminder.status = Status::Deleted;
        reminder.updated_at = Utc::now();
        self.store.update(&reminder)?;
        self.store.append_history(
            &HistoryEntry::new(reminder.id, HistoryAction::Deleted, actor).with_before(&before),
        )?;
        Ok(())
    }

    /// Audit history for a reminder, newest first.
    pub fn history(&self, id: Uuid, limit: usize) -> TicklerResult<Vec<HistoryEntry>> {
        self.store.history_for(id, limit)
    }

    /// Garbage-collect completed/expired/deleted records older than the
    /// configured retention window. Returns the number removed.
    pub fn maintenance(&self, now: DateTime<Utc>) -> TicklerResult<usize> {
        let cutoff = now - chrono::Duration::days(i64::from(self.config.retention_days));
        let purged = self.store.purge_older_than(
            &[Status::Completed, Status::Expired, Status::Deleted],
            cutoff,
        )?;
        if purged > 0 {
            debug!(purged, "maintenance removed old records");
        }
        Ok(purged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteStore;
    use crate::types::{Priority, Recurrence, RecurrenceUnit, TriggerSpec};
    use chrono::Duration;

    fn engine() -> Engine {
        Engine::new(
            Arc::new(SqliteStore::in_memory().unwrap()),
            EngineConfig::default(),
        )
    }

    #[test]
    fn test_add_validates_trigger() {
        let engine = engine();
        let bad = Reminder::new("default", "no keywords", TriggerSpec::keyword(vec![]));
        assert!(engine.add(bad, Originator::User).is_err());
    }

    #[test]
    fn test_add_records_history() {
        let engine = engine();
        let reminder = engine
            .add(
                Reminder::new("default", "new task", TriggerSpec::Session),
                Originator::User,
            )
            .unwrap();

        let history = engine.history(reminder.id, 10).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].action, HistoryAction::Created);
        assert_eq!(history[0].actor, Originator::User);
    }

    #[test]
    fn test_get_missing_is_not_found() {
        let engine = engine();
        let err = engine.get(Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, crate::error::TicklerError::NotFound { .. }));
    }

    #[test]
    fn test_complete_without_recurrence() {
        let engine = engine();
        let reminder = engine
            .add(
                Reminder::new("default", "finish report", TriggerSpec::Session),
                Originator::User,
            )
            .unwrap();

        let (completed, successor) = engine.complete(reminder.id, Originator::User).unwrap();
        assert_eq!(completed.status, Status::Completed);
        assert!(completed.completed_at.is_some());
        assert!(successor.is_none());

        // Completing again is a no-op.
        let (again, successor) = engine.complete(reminder.id, Originator::User).unwrap();
        assert_eq!(again.completed_at, completed.completed_at);
        assert!(successor.is_none());
    }

    #[test]
    fn test_complete_recurring_spawns_successor() {
        let engine = engine();
        let due = Utc::now() - Duration::hours(2);
        let reminder = engine
            .add(
                Reminder::new("default", "daily check-in", TriggerSpec::time(due))
                    .with_recurrence(Recurrence::new(1, RecurrenceUnit::Day).unwrap()),
                Originator::User,
            )
            .unwrap();

        let (_, successor) = engine.complete(reminder.id, Originator::User).unwrap();
        let successor = successor.unwrap();

        assert_eq!(successor.trigger.due_at(), Some(due + Duration::days(1)));
        assert_eq!(successor.fire_count, 0);
        assert_eq!(successor.recurrence_parent, Some(reminder.id));

        // Exactly one successor exists.
        let active = engine
            .list(&ReminderFilter::default().with_status(Status::Active))
            .unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, successor.id);
    }

    #[test]
    fn test_snooze_and_delete() {
        let engine = engine();
        let reminder = engine
            .add(
                Reminder::new("default", "ping the vendor", TriggerSpec::Session),
                Originator::User,
            )
            .unwrap();

        let until = Utc::now() + Duration::hours(4);
        let snoozed = engine.snooze(reminder.id, until, Originator::User).unwrap();
        assert_eq!(snoozed.status, Status::Snoozed);
        assert_eq!(snoozed.snooze_until, Some(until));

        engine.delete(reminder.id, Originator::User).unwrap();
        let deleted = engine.get(reminder.id).unwrap();
        assert_eq!(deleted.status, Status::Deleted);
    }

    #[tokio::test]
    async fn test_evaluate_pipeline_end_to_end() {
        let engine = engine();
        let now = Utc::now();

        engine
            .add(
                Reminder::new(
                    "default",
                    "overdue and urgent",
                    TriggerSpec::time(now - Duration::hours(1)),
                )
                .with_priority(Priority::new(1).unwrap()),
                Originator::User,
            )
            .unwrap();

        let evaluation = engine
            .evaluate(now, &EvaluateOptions::default())
            .await
            .unwrap();

        assert_eq!(evaluation.included.len(), 1);
        assert_eq!(evaluation.total_triggered, 1);
        assert_eq!(evaluation.included[0].fire_count, 1);
    }

    #[tokio::test]
    async fn test_dependency_gating_through_evaluate() {
        let engine = engine();
        let now = Utc::now();

        let first = engine
            .add(
                Reminder::new("default", "first step", TriggerSpec::Manual),
                Originator::User,
            )
            .unwrap();
        let second = engine
            .add(
                Reminder::new("default", "second step", TriggerSpec::Session)
                    .with_depends_on(first.id),
                Originator::User,
            )
            .unwrap();

        let opts = EvaluateOptions::default().with_kinds(vec![TriggerKind::Session]);

        let gated = engine.evaluate(now, &opts).await.unwrap();
        assert!(gated.included.is_empty());

        engine.complete(first.id, Originator::User).unwrap();

        let open = engine.evaluate(now, &opts).await.unwrap();
        assert_eq!(open.included.len(), 1);
        assert_eq!(open.included[0].id, second.id);
    }

    #[tokio::test]
    async fn test_preview_leaves_no_trace() {
        let engine = engine();
        let now = Utc::now();

        let reminder = engine
            .add(
                Reminder::new("default", "observe only", TriggerSpec::Heartbeat),
                Originator::User,
            )
            .unwrap();

        let evaluation = engine
            .evaluate(
                now,
                &EvaluateOptions::default()
                    .with_kinds(vec![TriggerKind::Heartbeat])
                    .preview(),
            )
            .await
            .unwrap();
        assert_eq!(evaluation.included.len(), 1);

        let untouched = engine.get(reminder.id).unwrap();
        assert_eq!(untouched.fire_count, 0);
        assert!(untouched.last_fired_at.is_none());
    }

    #[test]
    fn test_maintenance_purges_old_records() {
        let engine = engine();

        let mut old = Reminder::new("default", "ancient", TriggerSpec::Session);
        old.status = Status::Completed;
        old.updated_at = Utc::now() - Duration::days(90);
        engine.store().add(&old).unwrap();

        let purged = engine.maintenance(Utc::now()).unwrap();
        assert_eq!(purged, 1);
        assert!(engine.store().get(old.id).unwrap().is_none());
    }
}
