//! The continuous watch loop.
//!
//! A timer-driven loop that repeatedly runs the evaluation pipeline, applies
//! a per-reminder notification cooldown, dispatches side effects
//! (notification, optional on-fire hook), and triggers periodic maintenance.
//! No failure inside a tick may stop the loop: pipeline errors, notifier
//! errors, hook errors, and maintenance errors are all contained.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::engine::{Engine, EvaluateOptions};
use crate::error::TicklerResult;
use crate::hooks::HookRunner;
use crate::notify::{Notification, Notifier};
use crate::types::{Reminder, TriggerKind};

/// Process-lifetime state owned by the watch loop: when each reminder was
/// last notified, and when maintenance last succeeded.
///
/// The caller constructs and owns this (behind the shared handle), so it can
/// be inspected or reset; the loop is its only writer. It is not persisted —
/// a restart forgets cooldown history, which is an accepted tradeoff.
#[derive(Debug, Default)]
pub struct WatchState {
    last_notified: HashMap<Uuid, DateTime<Utc>>,
    last_maintenance: Option<DateTime<Utc>>,
}

impl WatchState {
    /// Create empty state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a reminder is still within its notification cooldown.
    pub fn is_cooling_down(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
        cooldown: chrono::Duration,
    ) -> bool {
        self.last_notified
            .get(&id)
            .is_some_and(|last| now - *last < cooldown)
    }

    /// Record that a reminder was notified.
    pub fn record_notified(&mut self, id: Uuid, at: DateTime<Utc>) {
        self.last_notified.insert(id, at);
    }

    /// When a reminder was last notified, if ever.
    pub fn last_notified(&self, id: Uuid) -> Option<DateTime<Utc>> {
        self.last_notified.get(&id).copied()
    }

    /// Whether maintenance should run now.
    pub fn maintenance_due(&self, now: DateTime<Utc>, interval: chrono::Duration) -> bool {
        self.last_maintenance
            .map_or(true, |last| now - last >= interval)
    }

    /// Record a successful maintenance run.
    pub fn record_maintenance(&mut self, at: DateTime<Utc>) {
        self.last_maintenance = Some(at);
    }

    /// When maintenance last succeeded, if ever.
    pub fn last_maintenance(&self) -> Option<DateTime<Utc>> {
        self.last_maintenance
    }

    /// Forget all cooldown and maintenance history.
    pub fn reset(&mut self) {
        self.last_notified.clear();
        self.last_maintenance = None;
    }
}

/// An on-fire hook command and its execution bound.
#[derive(Debug, Clone)]
pub struct HookConfig {
    pub command: String,
    pub timeout: Duration,
}

impl HookConfig {
    /// Create a hook config with the default 5 second timeout.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            timeout: Duration::from_secs(5),
        }
    }

    /// Set the execution timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Configuration for the watch loop.
#[derive(Debug, Clone)]
pub struct WatchConfig {
    /// Time between ticks (default: 30s). The first tick runs immediately.
    pub interval: Duration,
    /// Minimum time before the same reminder is re-notified (default: 5min).
    pub cooldown: Duration,
    /// Time between maintenance runs (default: 24h).
    pub maintenance_interval: Duration,
    /// Size budget per tick, in units.
    pub budget_units: u32,
    /// Restrict evaluation to one agent namespace.
    pub agent: Option<String>,
    /// Promote overdue time reminders (default: on).
    pub escalate: bool,
    /// Run a single tick and stop.
    pub once: bool,
    /// Optional on-fire hook run after each notification.
    pub hook: Option<HookConfig>,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            cooldown: Duration::from_secs(300),
            maintenance_interval: Duration::from_secs(24 * 60 * 60),
            budget_units: 500,
            agent: None,
            escalate: true,
            once: false,
            hook: None,
        }
    }
}

impl WatchConfig {
    /// Set the tick interval.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Set the per-reminder notification cooldown.
    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    /// Set the maintenance interval.
    pub fn with_maintenance_interval(mut self, interval: Duration) -> Self {
        self.maintenance_interval = interval;
        self
    }

    /// Set the per-tick budget.
    pub fn with_budget_units(mut self, units: u32) -> Self {
        self.budget_units = units;
        self
    }

    /// Restrict to one agent namespace.
    pub fn with_agent(mut self, agent: impl Into<String>) -> Self {
        self.agent = Some(agent.into());
        self
    }

    /// Configure an on-fire hook.
    pub fn with_hook(mut self, hook: HookConfig) -> Self {
        self.hook = Some(hook);
        self
    }

    /// Run a single tick and stop.
    pub fn once(mut self) -> Self {
        self.once = true;
        self
    }

    /// Create config from environment variables.
    ///
    /// Reads:
    /// - `TICKLER_WATCH_INTERVAL_SECS` (default: 30)
    /// - `TICKLER_COOLDOWN_SECS` (default: 300)
    /// - `TICKLER_MAINTENANCE_INTERVAL_SECS` (default: 86400)
    /// - `TICKLER_ON_FIRE_HOOK` (default: none)
    /// - `TICKLER_HOOK_TIMEOUT_SECS` (default: 5)
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(secs) = std::env::var("TICKLER_WATCH_INTERVAL_SECS") {
            if let Ok(secs) = secs.parse() {
                config.interval = Duration::from_secs(secs);
            }
        }
        if let Ok(secs) = std::env::var("TICKLER_COOLDOWN_SECS") {
            if let Ok(secs) = secs.parse() {
                config.cooldown = Duration::from_secs(secs);
            }
        }
        if let Ok(secs) = std::env::var("TICKLER_MAINTENANCE_INTERVAL_SECS") {
            if let Ok(secs) = secs.parse() {
                config.maintenance_interval = Duration::from_secs(secs);
            }
        }
        if let Ok(command) = std::env::var("TICKLER_ON_FIRE_HOOK") {
            let mut hook = HookConfig::new(command);
            if let Ok(secs) = std::env::var("TICKLER_HOOK_TIMEOUT_SECS") {
                if let Ok(secs) = secs.parse() {
                    hook.timeout = Duration::from_secs(secs);
                }
            }
            config.hook = Some(hook);
        }

        config
    }
}

/// Handle to a running watch loop.
pub struct WatchHandle {
    cancel: CancellationToken,
    join: JoinHandle<()>,
}

impl WatchHandle {
    /// A token that stops the loop when cancelled.
    pub fn stop_signal(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stop the loop and wait for the pending tick to settle.
    pub async fn stop(self) {
        self.cancel.cancel();
        let _ = self.join.await;
    }

    /// Wait for the loop to finish on its own (single-run mode or external
    /// cancellation).
    pub async fn join(self) {
        let _ = self.join.await;
    }

    /// Whether the loop task has finished.
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}

/// The watch loop itself: engine + side-effect capabilities + state.
pub struct WatchLoop {
    engine: Arc<Engine>,
    notifier: Arc<dyn Notifier>,
    hooks: Arc<dyn HookRunner>,
    config: WatchConfig,
    state: Arc<Mutex<WatchState>>,
}

impl WatchLoop {
    /// Create a watch loop. The caller supplies (and keeps) the state handle.
    pub fn new(
        engine: Arc<Engine>,
        notifier: Arc<dyn Notifier>,
        hooks: Arc<dyn HookRunner>,
        config: WatchConfig,
        state: Arc<Mutex<WatchState>>,
    ) -> Self {
        Self {
            engine,
            notifier,
            hooks,
            config,
            state,
        }
    }

    /// Start the loop. The first tick runs immediately; later ticks follow
    /// the configured interval. Stopping via the handle clears the timer and
    /// lets the pending tick settle — due reminders are simply picked up by
    /// the next invocation.
    pub fn spawn(self) -> WatchHandle {
        let cancel = CancellationToken::new();
        let loop_cancel = cancel.clone();

        let join = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.config.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(
                interval_secs = self.config.interval.as_secs(),
                once = self.config.once,
                "watch loop started"
            );

            loop {
                tokio::select! {
                    _ = loop_cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        self.tick(Utc::now()).await;
                        if self.config.once {
                            break;
                        }
                    }
                }
            }

            info!("watch loop stopped");
        });

        WatchHandle { cancel, join }
    }

    /// Run one tick: maintenance check, evaluation, side-effect dispatch.
    ///
    /// Never returns an error; every failure is contained here.
    pub async fn tick(&self, now: DateTime<Utc>) {
        self.run_maintenance(now);

        let options = EvaluateOptions {
            kinds: vec![
                TriggerKind::Time,
                TriggerKind::Heartbeat,
                TriggerKind::Session,
                TriggerKind::Condition,
            ],
            agent: self.config.agent.clone(),
            message: None,
            budget_units: self.config.budget_units,
            escalate: self.config.escalate,
            preview: false,
        };

        let evaluation = match self.engine.evaluate(now, &options).await {
            Ok(evaluation) => evaluation,
            Err(e) => {
                error!(error = %e, "evaluation failed, skipping tick");
                return;
            }
        };

        debug!(
            included = evaluation.included.len(),
            total_triggered = evaluation.total_triggered,
            "tick evaluated"
        );

        for reminder in &evaluation.included {
            self.dispatch(reminder, now).await;
        }
    }

    /// Run maintenance if it is due. A failure is logged and does NOT
    /// advance the last-maintenance timestamp, so the next tick retries.
    fn run_maintenance(&self, now: DateTime<Utc>) {
        let interval = chrono_duration(self.config.maintenance_interval);
        let due = self.state.lock().unwrap().maintenance_due(now, interval);
        if !due {
            return;
        }

        match self.engine.maintenance(now) {
            Ok(purged) => {
                self.state.lock().unwrap().record_maintenance(now);
                info!(purged, "maintenance complete");
            }
            Err(e) => {
                warn!(error = %e, "maintenance failed, will retry next tick");
            }
        }
    }

    /// Dispatch side effects for one included reminder, respecting its
    /// cooldown. Hooks run sequentially, one reminder at a time.
    async fn dispatch(&self, reminder: &Reminder, now: DateTime<Utc>) {
        let cooldown = chrono_duration(self.config.cooldown);
        let cooling = self
            .state
            .lock()
            .unwrap()
            .is_cooling_down(reminder.id, now, cooldown);
        if cooling {
            debug!(reminder = %reminder.id, "within cooldown, skipping notification");
            return;
        }

        self.notifier
            .notify(&Notification::for_reminder(reminder))
            .await;

        if let Some(hook) = &self.config.hook {
            let env = hook_env(reminder);
            let ok = self.hooks.run(&hook.command, &env, hook.timeout).await;
            if !ok {
                // Already recorded by the runner; the notification still
                // counts as delivered.
                debug!(reminder = %reminder.id, "on-fire hook reported failure");
            }
        }

        self.state.lock().unwrap().record_notified(reminder.id, now);
    }
}

/// Environment passed to on-fire hooks.
fn hook_env(reminder: &Reminder) -> Vec<(String, String)> {
    vec![
        ("TICKLER_REMINDER_ID".to_string(), reminder.id.to_string()),
        ("TICKLER_CONTENT".to_string(), reminder.content.clone()),
        ("TICKLER_PRIORITY".to_string(), reminder.priority.to_string()),
        ("TICKLER_AGENT".to_string(), reminder.agent.clone()),
    ]
}

/// Block until a due reminder appears, a hard timeout elapses, or the token
/// is cancelled. Cancellation and timeout resolve to an empty result, never
/// an error; store failures still propagate.
pub async fn wait_for_due(
    engine: &Engine,
    options: &EvaluateOptions,
    poll_interval: Duration,
    timeout: Duration,
    cancel: &CancellationToken,
) -> TicklerResult<Vec<Reminder>> {
    let deadline = tokio::time::Instant::now() + timeout;

    loop {
        let evaluation = engine.evaluate(Utc::now(), options).await?;
        if !evaluation.included.is_empty() {
            return Ok(evaluation.included);
        }

        tokio::select! {
            _ = cancel.cancelled() => return Ok(Vec::new()),
            _ = tokio::time::sleep_until(deadline) => return Ok(Vec::new()),
            _ = tokio::time::sleep(poll_interval) => {}
        }
    }
}

fn chrono_duration(d: Duration) -> chrono::Duration {
    chrono::Duration::from_std(d).unwrap_or(chrono::Duration::MAX)
}
