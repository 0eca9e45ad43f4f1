//! Reminder types: trigger specifications, priority, lifecycle status,
//! and recurrence rules.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

use crate::error::{TicklerError, TicklerResult};

/// Reminder priority: 1 is the most urgent, 5 the least.
///
/// Validated at construction; deserialization rejects out-of-range values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Priority(u8);

impl Priority {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    /// Create a priority, rejecting values outside [1, 5].
    pub fn new(value: u8) -> TicklerResult<Self> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Ok(Self(value))
        } else {
            Err(TicklerError::invalid_priority(value))
        }
    }

    /// The numeric priority value.
    pub fn get(self) -> u8 {
        self.0
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self(3)
    }
}

impl TryFrom<u8> for Priority {
    type Error = TicklerError;

    fn try_from(value: u8) -> TicklerResult<Self> {
        Self::new(value)
    }
}

impl From<Priority> for u8 {
    fn from(p: Priority) -> u8 {
        p.0
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The due-detection mechanism class of a trigger.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TriggerKind {
    Time,
    Keyword,
    Condition,
    Session,
    Heartbeat,
    Manual,
}

/// How a keyword list is matched against message text.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MatchMode {
    /// Any keyword present as a case-insensitive substring.
    #[default]
    Any,
    /// Every keyword present as a case-insensitive substring.
    All,
    /// Each keyword is a case-insensitive regex; any match counts.
    Regex,
}

/// Trigger specification: the kind plus its kind-specific configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TriggerSpec {
    /// Due once the timestamp is reached.
    Time { due_at: DateTime<Utc> },
    /// Due when message text matches the keyword list per the match mode.
    Keyword {
        keywords: Vec<String>,
        #[serde(default)]
        match_mode: MatchMode,
    },
    /// Due when running the command produces exactly the expected output.
    Condition {
        command: String,
        expected_output: String,
    },
    /// Due whenever a session evaluation requests this kind.
    Session,
    /// Due whenever a heartbeat evaluation requests this kind.
    Heartbeat,
    /// Never auto-included; surfaced only by explicit request.
    Manual,
}

impl TriggerSpec {
    /// Create a time trigger.
    pub fn time(due_at: DateTime<Utc>) -> Self {
        Self::Time { due_at }
    }

    /// Create a keyword trigger with the default (any-substring) match mode.
    pub fn keyword(keywords: Vec<String>) -> Self {
        Self::Keyword {
            keywords,
            match_mode: MatchMode::Any,
        }
    }

    /// Create a condition trigger.
    pub fn condition(command: impl Into<String>, expected_output: impl Into<String>) -> Self {
        Self::Condition {
            command: command.into(),
            expected_output: expected_output.into(),
        }
    }

    /// The trigger kind of this spec.
    pub fn kind(&self) -> TriggerKind {
        match self {
            Self::Time { .. } => TriggerKind::Time,
            Self::Keyword { .. } => TriggerKind::Keyword,
            Self::Condition { .. } => TriggerKind::Condition,
            Self::Session => TriggerKind::Session,
            Self::Heartbeat => TriggerKind::Heartbeat,
            Self::Manual => TriggerKind::Manual,
        }
    }

    /// The due timestamp, for time triggers.
    pub fn due_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Time { due_at } => Some(*due_at),
            _ => None,
        }
    }

    /// Check that kind-specific configuration is present and well-formed.
    pub fn validate(&self) -> TicklerResult<()> {
        match self {
            Self::Keyword { keywords, .. } => {
                if keywords.is_empty() {
                    return Err(TicklerError::invalid_trigger(
                        "keyword trigger requires at least one keyword",
                    ));
                }
                if keywords.iter().any(|k| k.trim().is_empty()) {
                    return Err(TicklerError::invalid_trigger(
                        "keyword trigger contains an empty keyword",
                    ));
                }
                Ok(())
            }
            Self::Condition { command, .. } => {
                if command.trim().is_empty() {
                    return Err(TicklerError::invalid_trigger(
                        "condition trigger requires a non-empty command",
                    ));
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

/// Lifecycle status of a reminder.
///
/// Transitions are one-directional except `Snoozed -> Active`, which happens
/// automatically once the snooze expires.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Status {
    Active,
    Snoozed,
    Completed,
    Expired,
    Deleted,
}

/// Unit of a recurrence interval.
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
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RecurrenceUnit {
    Day,
    Week,
    /// Approximated as a fixed 30 days; not calendar-aware.
    Month,
}

impl RecurrenceUnit {
    fn days(self) -> i64 {
        match self {
            Self::Day => 1,
            Self::Week => 7,
            Self::Month => 30,
        }
    }
}

/// Recurrence rule: re-create the reminder `interval * unit` after each
/// completion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Recurrence {
    pub interval: u32,
    pub unit: RecurrenceUnit,
}

impl Recurrence {
    /// Create a recurrence rule; the interval must be at least 1.
    pub fn new(interval: u32, unit: RecurrenceUnit) -> TicklerResult<Self> {
        if interval == 0 {
            return Err(TicklerError::validation(
                "recurrence interval must be at least 1",
            ));
        }
        Ok(Self { interval, unit })
    }

    /// The duration between occurrences.
    pub fn period(&self) -> Duration {
        Duration::days(self.unit.days() * i64::from(self.interval))
    }
}

/// A reminder: the unit of work the engine evaluates, surfaces, and tracks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reminder {
    /// Unique identifier.
    pub id: Uuid,
    /// Owning agent namespace.
    pub agent: String,
    /// Free-text content surfaced when the reminder fires.
    pub content: String,
    /// The condition under which this reminder becomes due.
    pub trigger: TriggerSpec,
    /// Priority 1 (most urgent) through 5.
    #[serde(default)]
    pub priority: Priority,
    /// Lifecycle status.
    pub status: Status,
    /// While set and in the future, the reminder is snoozed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snooze_until: Option<DateTime<Utc>>,
    /// Auto-expire timestamp; the reminder decays once this passes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decay_at: Option<DateTime<Utc>>,
    /// Number of times this reminder has fired. Monotonic, never reset.
    pub fire_count: u32,
    /// Last time this reminder fired.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_fired_at: Option<DateTime<Utc>>,
    /// Maximum times to fire before auto-completion (None = unlimited).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_fires: Option<u32>,
    /// Recurrence rule applied on completion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recurrence: Option<Recurrence>,
    /// Root of the recurrence chain this reminder was spawned from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recurrence_parent: Option<Uuid>,
    /// Prerequisite reminder; this one is eligible only once it completes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depends_on: Option<Uuid>,
    /// When this reminder was created.
    pub created_at: DateTime<Utc>,
    /// When this reminder was last updated.
    pub updated_at: DateTime<Utc>,
    /// When this reminder was completed, if it was.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Reminder {
    /// Create a new active reminder with default priority.
    pub fn new(agent: impl Into<String>, content: impl Into<String>, trigger: TriggerSpec) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            agent: agent.into(),
            content: content.into(),
            trigger,
            priority: Priority::default(),
            status: Status::Active,
            snooze_until: None,
            decay_at: None,
            fire_count: 0,
            last_fired_at: None,
            max_fires: None,
            recurrence: None,
            recurrence_parent: None,
            depends_on: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    /// Builder method to set the priority.
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Builder method to set the fire cap.
    pub fn with_max_fires(mut self, max: u32) -> Self {
        self.max_fires = Some(max);
        self
    }

    /// Builder method to set the recurrence rule.
    pub fn with_recurrence(mut self, recurrence: Recurrence) -> Self {
        self.recurrence = Some(recurrence);
        self
    }

    /// Builder method to set the dependency link.
    pub fn with_depends_on(mut self, id: Uuid) -> Self {
        self.depends_on = Some(id);
        self
    }

    /// Builder method to set the decay timestamp.
    pub fn with_decay_at(mut self, decay_at: DateTime<Utc>) -> Self {
        self.decay_at = Some(decay_at);
        self
    }

    /// The trigger kind of this reminder.
    pub fn kind(&self) -> TriggerKind {
        self.trigger.kind()
    }

    /// Check if this reminder can still fire.
    pub fn can_fire(&self) -> bool {
        if self.status != Status::Active {
            return false;
        }
        self.max_fires.map_or(true, |max| self.fire_count < max)
    }

    /// Check that the reminder is well-formed.
    pub fn validate(&self) -> TicklerResult<()> {
        self.trigger.validate()?;
        if let Some(r) = &self.recurrence {
            Recurrence::new(r.interval, r.unit)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_bounds() {
        assert!(Priority::new(1).is_ok());
        assert!(Priority::new(5).is_ok());
        assert!(Priority::new(0).is_err());
        assert!(Priority::new(6).is_err());
        assert_eq!(Priority::default().get(), 3);
    }

    #[test]
    fn test_priority_deserialization_rejects_out_of_range() {
        let ok: Result<Priority, _> = serde_json::from_str("2");
        assert_eq!(ok.unwrap().get(), 2);

        let bad: Result<Priority, _> = serde_json::from_str("7");
        assert!(bad.is_err());
    }

    #[test]
    fn test_reminder_creation() {
        let reminder = Reminder::new(
            "default",
            "review the deployment checklist",
            TriggerSpec::keyword(vec!["deploy".to_string()]),
        );

        assert_eq!(reminder.status, Status::Active);
        assert_eq!(reminder.fire_count, 0);
        assert_eq!(reminder.priority.get(), 3);
        assert!(reminder.can_fire());
    }

    #[test]
    fn test_reminder_builder() {
        let dep = Uuid::new_v4();
        let reminder = Reminder::new("default", "ship it", TriggerSpec::Session)
            .with_priority(Priority::new(1).unwrap())
            .with_max_fires(2)
            .with_depends_on(dep);

        assert_eq!(reminder.priority.get(), 1);
        assert_eq!(reminder.max_fires, Some(2));
        assert_eq!(reminder.depends_on, Some(dep));
    }

    #[test]
    fn test_can_fire_respects_max_fires() {
        let mut reminder =
            Reminder::new("default", "check builds", TriggerSpec::Heartbeat).with_max_fires(2);

        assert!(reminder.can_fire());

        reminder.fire_count = 2;
        assert!(!reminder.can_fire());

        reminder.fire_count = 1;
        reminder.status = Status::Completed;
        assert!(!reminder.can_fire());
    }

    #[test]
    fn test_trigger_validation() {
        assert!(TriggerSpec::keyword(vec![]).validate().is_err());
        assert!(TriggerSpec::keyword(vec!["  ".to_string()]).validate().is_err());
        assert!(TriggerSpec::condition("", "ok").validate().is_err());
        assert!(TriggerSpec::condition("true", "").validate().is_ok());
        assert!(TriggerSpec::Session.validate().is_ok());
    }

    #[test]
    fn test_trigger_serialization() {
        let keyword = TriggerSpec::keyword(vec!["rust".to_string()]);
        let json = serde_json::to_string(&keyword).unwrap();
        assert!(json.contains("\"type\":\"keyword\""));
        assert!(json.contains("rust"));

        let time = TriggerSpec::time(Utc::now());
        let json = serde_json::to_string(&time).unwrap();
        assert!(json.contains("\"type\":\"time\""));

        // Default match mode may be omitted on the wire
        let spec: TriggerSpec =
            serde_json::from_str(r#"{"type":"keyword","keywords":["a"]}"#).unwrap();
        match spec {
            TriggerSpec::Keyword { match_mode, .. } => assert_eq!(match_mode, MatchMode::Any),
            _ => panic!("wrong trigger type"),
        }
    }

    #[test]
    fn test_recurrence_period() {
        let daily = Recurrence::new(1, RecurrenceUnit::Day).unwrap();
        assert_eq!(daily.period(), Duration::days(1));

        let biweekly = Recurrence::new(2, RecurrenceUnit::Week).unwrap();
        assert_eq!(biweekly.period(), Duration::days(14));

        // Month is a fixed 30-day approximation
        let monthly = Recurrence::new(1, RecurrenceUnit::Month).unwrap();
        assert_eq!(monthly.period(), Duration::days(30));

        assert!(Recurrence::new(0, RecurrenceUnit::Day).is_err());
    }

    #[test]
    fn test_kind_round_trip() {
        use std::str::FromStr;
        assert_eq!(TriggerKind::Heartbeat.to_string(), "heartbeat");
        assert_eq!(TriggerKind::from_str("keyword").unwrap(), TriggerKind::Keyword);
        assert_eq!(Status::from_str("snoozed").unwrap(), Status::Snoozed);
    }
}
