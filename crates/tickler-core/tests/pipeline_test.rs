//! End-to-end pipeline scenarios: evaluation, escalation, budgeting,
//! fire caps, and recurrence working together against a real store.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tickler_core::{
    Engine, EngineConfig, EvaluateOptions, Originator, Priority, Recurrence, RecurrenceUnit,
    Reminder, SqliteStore, Status, TriggerKind, TriggerSpec,
};

fn engine() -> Engine {
    Engine::new(
        Arc::new(SqliteStore::in_memory().unwrap()),
        EngineConfig::default(),
    )
}

fn time_reminder(engine: &Engine, priority: u8, overdue_hours: i64, content: &str) -> Reminder {
    engine
        .add(
            Reminder::new(
                "default",
                content,
                TriggerSpec::time(Utc::now() - Duration::hours(overdue_hours)),
            )
            .with_priority(Priority::new(priority).unwrap()),
            Originator::User,
        )
        .unwrap()
}

#[tokio::test]
async fn priority_5_never_included_for_any_budget() {
    let engine = engine();
    time_reminder(&engine, 5, 1, "background noise");

    for budget in [0, 10, 100, 10_000, 1_000_000] {
        let evaluation = engine
            .evaluate(
                Utc::now(),
                &EvaluateOptions::default().with_budget_units(budget),
            )
            .await
            .unwrap();
        assert!(evaluation.included.is_empty(), "budget {}", budget);
        assert_eq!(evaluation.overflow_for(5), 0);
    }
}

#[tokio::test]
async fn priority_1_included_even_with_zero_budget() {
    let engine = engine();
    time_reminder(&engine, 1, 1, "critical incident follow-up");
    time_reminder(&engine, 4, 1, "someday maybe");

    let evaluation = engine
        .evaluate(Utc::now(), &EvaluateOptions::default().with_budget_units(0))
        .await
        .unwrap();

    assert_eq!(evaluation.included.len(), 1);
    assert_eq!(evaluation.included[0].priority.get(), 1);
    assert_eq!(evaluation.overflow_for(4), 1);
}

#[tokio::test]
async fn overdue_priority_3_escalates_to_1_in_one_pass() {
    let engine = engine();
    let reminder = time_reminder(&engine, 3, 50, "escalating task");

    let evaluation = engine
        .evaluate(Utc::now(), &EvaluateOptions::default())
        .await
        .unwrap();

    assert_eq!(evaluation.included.len(), 1);
    assert_eq!(evaluation.included[0].priority.get(), 1);

    let persisted = engine.get(reminder.id).unwrap();
    assert_eq!(persisted.priority.get(), 1);
}

#[tokio::test]
async fn escalation_disabled_leaves_priority_alone() {
    let engine = engine();
    let reminder = time_reminder(&engine, 3, 50, "stays put");

    engine
        .evaluate(Utc::now(), &EvaluateOptions::default().without_escalation())
        .await
        .unwrap();

    assert_eq!(engine.get(reminder.id).unwrap().priority.get(), 3);
}

#[tokio::test]
async fn fifty_p3_candidates_against_small_budget() {
    let engine = engine();
    for i in 0..50 {
        time_reminder(&engine, 3, 1, &format!("routine follow-up {} with extra detail", i));
    }

    let evaluation = engine
        .evaluate(
            Utc::now(),
            &EvaluateOptions::default()
                .without_escalation()
                .with_budget_units(100),
        )
        .await
        .unwrap();

    assert_eq!(evaluation.total_triggered, 50);
    assert!(evaluation.included.len() < 50);
    assert!(evaluation.overflow_for(3) > 0);
}

#[tokio::test]
async fn fire_cap_of_one_completes_on_first_evaluation() {
    let engine = engine();
    let reminder = engine
        .add(
            Reminder::new("default", "nudge once", TriggerSpec::Heartbeat).with_max_fires(1),
            Originator::User,
        )
        .unwrap();

    // Preview first: no mutation.
    let preview = engine
        .evaluate(
            Utc::now(),
            &EvaluateOptions::default()
                .with_kinds(vec![TriggerKind::Heartbeat])
                .preview(),
        )
        .await
        .unwrap();
    assert_eq!(preview.included.len(), 1);
    assert_eq!(engine.get(reminder.id).unwrap().status, Status::Active);

    // Real evaluation: fires and auto-completes.
    let real = engine
        .evaluate(
            Utc::now(),
            &EvaluateOptions::default().with_kinds(vec![TriggerKind::Heartbeat]),
        )
        .await
        .unwrap();
    assert_eq!(real.included.len(), 1);

    let completed = engine.get(reminder.id).unwrap();
    assert_eq!(completed.status, Status::Completed);
    assert_eq!(completed.fire_count, 1);

    // Gone from subsequent evaluations.
    let after = engine
        .evaluate(
            Utc::now(),
            &EvaluateOptions::default().with_kinds(vec![TriggerKind::Heartbeat]),
        )
        .await
        .unwrap();
    assert!(after.included.is_empty());
}

#[tokio::test]
async fn completing_daily_reminder_creates_exactly_one_successor() {
    let engine = engine();
    let due = Utc::now() - Duration::hours(1);
    let reminder = engine
        .add(
            Reminder::new("default", "daily standup notes", TriggerSpec::time(due))
                .with_recurrence(Recurrence::new(1, RecurrenceUnit::Day).unwrap()),
            Originator::User,
        )
        .unwrap();

    let (completed, successor) = engine.complete(reminder.id, Originator::User).unwrap();
    let successor = successor.expect("recurring completion spawns a successor");

    assert_eq!(completed.status, Status::Completed);
    assert_eq!(successor.trigger.due_at(), Some(due + Duration::days(1)));
    assert_eq!(successor.fire_count, 0);
    assert_eq!(successor.recurrence_parent, Some(reminder.id));

    // The successor's own completion flattens to the same chain root.
    let (_, third) = engine.complete(successor.id, Originator::User).unwrap();
    assert_eq!(third.unwrap().recurrence_parent, Some(reminder.id));
}

#[tokio::test]
async fn keyword_evaluation_with_message_text() {
    let engine = engine();
    engine
        .add(
            Reminder::new(
                "default",
                "remember the migration plan",
                TriggerSpec::keyword(vec!["migration".to_string()]),
            ),
            Originator::User,
        )
        .unwrap();

    let options = EvaluateOptions::default()
        .with_kinds(vec![TriggerKind::Keyword])
        .with_message("starting the database migration now");
    let evaluation = engine.evaluate(Utc::now(), &options).await.unwrap();
    assert_eq!(evaluation.included.len(), 1);

    let unrelated = EvaluateOptions::default()
        .with_kinds(vec![TriggerKind::Keyword])
        .with_message("lunch?");
    let evaluation = engine.evaluate(Utc::now(), &unrelated).await.unwrap();
    assert!(evaluation.included.is_empty());
}

#[tokio::test]
async fn dependency_chain_unblocks_in_order() {
    let engine = engine();

    let first = engine
        .add(
            Reminder::new("default", "draft the proposal", TriggerSpec::Manual),
            Originator::User,
        )
        .unwrap();
    let second = engine
        .add(
            Reminder::new("default", "send the proposal", TriggerSpec::Session)
                .with_depends_on(first.id),
            Originator::User,
        )
        .unwrap();

    let options = EvaluateOptions::default().with_kinds(vec![TriggerKind::Session]);

    let before = engine.evaluate(Utc::now(), &options).await.unwrap();
    assert!(before.included.is_empty());

    engine.complete(first.id, Originator::User).unwrap();

    let after = engine.evaluate(Utc::now(), &options).await.unwrap();
    assert_eq!(after.included.len(), 1);
    assert_eq!(after.included[0].id, second.id);
}
