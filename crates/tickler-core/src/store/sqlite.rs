//! SQLite-backed reminder store.

use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, types::Value, Connection, OptionalExtension};
use std::path::Path;
use std::str::FromStr;
use std::sync::Mutex;
use uuid::Uuid;

use crate::error::{TicklerError, TicklerResult};
use crate::store::{ReminderFilter, ReminderStore};
use crate::types::{
    HistoryAction, HistoryEntry, Originator, Priority, Recurrence, Reminder, Status, TriggerSpec,
};

/// SQLite-backed store holding reminders and their audit history.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Create or open a store at the given path.
    pub fn new(path: impl AsRef<Path>) -> TicklerResult<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory store (for testing).
    pub fn in_memory() -> TicklerResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> TicklerResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS reminders (
                id TEXT PRIMARY KEY,
                agent TEXT NOT NULL,
                content TEXT NOT NULL,
                trigger_type TEXT NOT NULL,
                trigger_data TEXT NOT NULL,
                priority INTEGER NOT NULL DEFAULT 3,
                status TEXT NOT NULL DEFAULT 'active',
                snooze_until TEXT,
                decay_at TEXT,
                fire_count INTEGER NOT NULL DEFAULT 0,
                last_fired_at TEXT,
                max_fires INTEGER,
                recurrence TEXT,
                recurrence_parent TEXT,
                depends_on TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                completed_at TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_reminders_status ON reminders(status);
            CREATE INDEX IF NOT EXISTS idx_reminders_agent ON reminders(agent);
            CREATE INDEX IF NOT EXISTS idx_reminders_trigger ON reminders(trigger_type);

            CREATE TABLE IF NOT EXISTS history (
                id TEXT PRIMARY KEY,
                reminder_id TEXT NOT NULL,
                action TEXT NOT NULL,
                before_state TEXT,
                after_state TEXT,
                actor TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_history_reminder ON history(reminder_id);
            CREATE INDEX IF NOT EXISTS idx_history_time ON history(created_at);
        "#,
        )?;
        Ok(())
    }

    fn row_to_reminder(row: &rusqlite::Row<'_>) -> TicklerResult<Reminder> {
        let id: String = row.get(0)?;
        let agent: String = row.get(1)?;
        let content: String = row.get(2)?;
        let trigger_data: String = row.get(3)?;
        let priority: u8 = row.get(4)?;
        let status: String = row.get(5)?;
        let snooze_until: Option<String> = row.get(6)?;
        let decay_at: Option<String> = row.get(7)?;
        let fire_count: u32 = row.get(8)?;
        let last_fired_at: Option<String> = row.get(9)?;
        let max_fires: Option<u32> = row.get(10)?;
        let recurrence: Option<String> = row.get(11)?;
        let recurrence_parent: Option<String> = row.get(12)?;
        let depends_on: Option<String> = row.get(13)?;
        let created_at: String = row.get(14)?;
        let updated_at: String = row.get(15)?;
        let completed_at: Option<String> = row.get(16)?;

        Ok(Reminder {
            id: parse_uuid(&id)?,
            agent,
            content,
            trigger: serde_json::from_str::<TriggerSpec>(&trigger_data)?,
            priority: Priority::new(priority)?,
            status: Status::from_str(&status)
                .map_err(|_| TicklerError::parse(format!("unknown status '{}'", status)))?,
            snooze_until: parse_ts_opt(snooze_until)?,
            decay_at: parse_ts_opt(decay_at)?,
            fire_count,
            last_fired_at: parse_ts_opt(last_fired_at)?,
            max_fires,
            recurrence: recurrence
                .map(|s| serde_json::from_str::<Recurrence>(&s))
                .transpose()?,
            recurrence_parent: recurrence_parent.map(|s| parse_uuid(&s)).transpose()?,
            depends_on: depends_on.map(|s| parse_uuid(&s)).transpose()?,
            created_at: parse_ts(&created_at)?,
            updated_at: parse_ts(&updated_at)?,
            completed_at: parse_ts_opt(completed_at)?,
        })
    }
}

const REMINDER_COLUMNS: &str = "id, agent, content, trigger_data, priority, status, \
     snooze_until, decay_at, fire_count, last_fired_at, max_fires, \
     recurrence, recurrence_parent, depends_on, created_at, updated_at, completed_at";

fn parse_uuid(s: &str) -> TicklerResult<Uuid> {
    Uuid::parse_str(s).map_err(|e| TicklerError::parse(e.to_string()))
}

fn parse_ts(s: &str) -> TicklerResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| TicklerError::parse(e.to_string()))
}

fn parse_ts_opt(s: Option<String>) -> TicklerResult<Option<DateTime<Utc>>> {
    s.map(|s| parse_ts(&s)).transpose()
}

impl ReminderStore for SqliteStore {
    fn add(&self, reminder: &Reminder) -> TicklerResult<()> {
        let conn = self.conn.lock().unwrap();
        let trigger_data = serde_json::to_string(&reminder.trigger)?;
        let recurrence = reminder
            .recurrence
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        conn.execute(
            r#"INSERT INTO reminders
               (id, agent, content, trigger_type, trigger_data, priority, status,
                snooze_until, decay_at, fire_count, last_fired_at, max_fires,
                recurrence, recurrence_parent, depends_on, created_at, updated_at, completed_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)"#,
            params![
                reminder.id.to_string(),
                reminder.agent,
                reminder.content,
                reminder.kind().as_ref(),
                trigger_data,
                reminder.priority.get(),
                reminder.status.as_ref(),
                reminder.snooze_until.map(|dt| dt.to_rfc3339()),
                reminder.decay_at.map(|dt| dt.to_rfc3339()),
                reminder.fire_count,
                reminder.last_fired_at.map(|dt| dt.to_rfc3339()),
                reminder.max_fires,
                recurrence,
                reminder.recurrence_parent.map(|id| id.to_string()),
                reminder.depends_on.map(|id| id.to_string()),
                reminder.created_at.to_rfc3339(),
                reminder.updated_at.to_rfc3339(),
                reminder.completed_at.map(|dt| dt.to_rfc3339()),
            ],
        )?;
        Ok(())
    }

    fn get(&self, id: Uuid) -> TicklerResult<Option<Reminder>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM reminders WHERE id = ?1",
            REMINDER_COLUMNS
        ))?;

        stmt.query_row(params![id.to_string()], |row| Ok(Self::row_to_reminder(row)))
            .optional()?
            .transpose()
    }

    fn update(&self, reminder: &Reminder) -> TicklerResult<()> {
        let conn = self.conn.lock().unwrap();
        let trigger_data = serde_json::to_string(&reminder.trigger)?;
        let recurrence = reminder
            .recurrence
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let changed = conn.execute(
            r#"UPDATE reminders SET
               agent = ?2, content = ?3, trigger_type = ?4, trigger_data = ?5,
               priority = ?6, status = ?7, snooze_until = ?8, decay_at = ?9,
               fire_count = ?10, last_fired_at = ?11, max_fires = ?12,
               recurrence = ?13, recurrence_parent = ?14, depends_on = ?15,
               updated_at = ?16, completed_at = ?17
               WHERE id = ?1"#,
            params![
                reminder.id.to_string(),
                reminder.agent,
                reminder.content,
                reminder.kind().as_ref(),
                trigger_data,
                reminder.priority.get(),
                reminder.status.as_ref(),
                reminder.snooze_until.map(|dt| dt.to_rfc3339()),
                reminder.decay_at.map(|dt| dt.to_rfc3339()),
                reminder.fire_count,
                reminder.last_fired_at.map(|dt| dt.to_rfc3339()),
                reminder.max_fires,
                recurrence,
                reminder.recurrence_parent.map(|id| id.to_string()),
                reminder.depends_on.map(|id| id.to_string()),
                reminder.updated_at.to_rfc3339(),
                reminder.completed_at.map(|dt| dt.to_rfc3339()),
            ],
        )?;

        if changed == 0 {
            return Err(TicklerError::not_found(reminder.id.to_string()));
        }
        Ok(())
    }

    fn list(&self, filter: &ReminderFilter) -> TicklerResult<Vec<Reminder>> {
        let conn = self.conn.lock().unwrap();

        let mut clauses: Vec<String> = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        if let Some(status) = filter.status {
            values.push(Value::Text(status.as_ref().to_string()));
            clauses.push(format!("status = ?{}", values.len()));
        }
        if let Some(kind) = filter.kind {
            values.push(Value::Text(kind.as_ref().to_string()));
            clauses.push(format!("trigger_type = ?{}", values.len()));
        }
        if let Some(agent) = &filter.agent {
            values.push(Value::Text(agent.clone()));
            clauses.push(format!("agent = ?{}", values.len()));
        }

        let where_clause = if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        };

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM reminders{} ORDER BY created_at ASC",
            REMINDER_COLUMNS, where_clause
        ))?;

        let results = stmt.query_map(params_from_iter(values), |row| {
            Ok(Self::row_to_reminder(row))
        })?;

        results
            .map(|r| r.map_err(|e| e.into()).and_then(|inner| inner))
            .collect()
    }

    fn purge_older_than(
        &self,
        statuses: &[Status],
        cutoff: DateTime<Utc>,
    ) -> TicklerResult<usize> {
        if statuses.is_empty() {
            return Ok(0);
        }
        let conn = self.conn.lock().unwrap();

        let placeholders: Vec<String> = (2..=statuses.len() + 1).map(|i| format!("?{}", i)).collect();
        let mut values: Vec<Value> = vec![Value::Text(cutoff.to_rfc3339())];
        values.extend(
            statuses
                .iter()
                .map(|s| Value::Text(s.as_ref().to_string())),
        );

        conn.execute(
            &format!(
                "DELETE FROM history WHERE reminder_id IN
                 (SELECT id FROM reminders WHERE updated_at < ?1 AND status IN ({}))",
                placeholders.join(", ")
            ),
            params_from_iter(values.iter()),
        )?;

        let count = conn.execute(
            &format!(
                "DELETE FROM reminders WHERE updated_at < ?1 AND status IN ({})",
                placeholders.join(", ")
            ),
            params_from_iter(values.iter()),
        )?;

        Ok(count)
    }

    fn append_history(&self, entry: &HistoryEntry) -> TicklerResult<()> {
        let conn = self.conn.lock().unwrap();
        let before = entry.before.as_ref().map(serde_json::to_string).transpose()?;
        let after = entry.after.as_ref().map(serde_json::to_string).transpose()?;

        conn.execute(
            r#"INSERT INTO history (id, reminder_id, action, before_state, after_state, actor, created_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"#,
            params![
                entry.id.to_string(),
                entry.reminder_id.to_string(),
                entry.action.as_ref(),
                before,
                after,
                entry.actor.to_string(),
                entry.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn history_for(&self, reminder_id: Uuid, limit: usize) -> TicklerResult<Vec<HistoryEntry>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            r#"SELECT id, reminder_id, action, before_state, after_state, actor, created_at
               FROM history
               WHERE reminder_id = ?1
               ORDER BY created_at DESC
               LIMIT ?2"#,
        )?;

        let results = stmt.query_map(params![reminder_id.to_string(), limit as i64], |row| {
            let id: String = row.get(0)?;
            let reminder_id: String = row.get(1)?;
            let action: String = row.get(2)?;
            let before: Option<String> = row.get(3)?;
            let after: Option<String> = row.get(4)?;
            let actor: String = row.get(5)?;
            let created_at: String = row.get(6)?;
            Ok((id, reminder_id, action, before, after, actor, created_at))
        })?;

        results
            .map(|r| {
                let (id, reminder_id, action, before, after, actor, created_at) = r?;
                Ok(HistoryEntry {
                    id: parse_uuid(&id)?,
                    reminder_id: parse_uuid(&reminder_id)?,
                    action: HistoryAction::from_str(&action)
                        .map_err(|_| TicklerError::parse(format!("unknown action '{}'", action)))?,
                    before: before.map(|s| serde_json::from_str(&s)).transpose()?,
                    after: after.map(|s| serde_json::from_str(&s)).transpose()?,
                    actor: Originator::from_str(&actor).unwrap_or(Originator::System),
                    created_at: parse_ts(&created_at)?,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TriggerSpec;
    use chrono::Duration;

    fn sample(agent: &str, trigger: TriggerSpec) -> Reminder {
        Reminder::new(agent, "check the release notes", trigger)
    }

    #[test]
    fn test_store_crud() {
        let store = SqliteStore::in_memory().unwrap();

        let reminder = sample("default", TriggerSpec::keyword(vec!["release".to_string()]));
        store.add(&reminder).unwrap();

        let retrieved = store.get(reminder.id).unwrap().unwrap();
        assert_eq!(retrieved.content, "check the release notes");
        assert_eq!(retrieved.kind(), crate::types::TriggerKind::Keyword);

        let mut updated = retrieved;
        updated.content = "check the changelog".to_string();
        updated.fire_count = 2;
        store.update(&updated).unwrap();

        let retrieved2 = store.get(reminder.id).unwrap().unwrap();
        assert_eq!(retrieved2.content, "check the changelog");
        assert_eq!(retrieved2.fire_count, 2);
    }

    #[test]
    fn test_update_missing_is_not_found() {
        let store = SqliteStore::in_memory().unwrap();
        let reminder = sample("default", TriggerSpec::Session);
        let err = store.update(&reminder).unwrap_err();
        assert!(matches!(err, TicklerError::NotFound { .. }));
    }

    #[test]
    fn test_list_filters() {
        let store = SqliteStore::in_memory().unwrap();

        let a = sample("alpha", TriggerSpec::time(Utc::now()));
        let mut b = sample("beta", TriggerSpec::Session);
        b.status = Status::Snoozed;
        store.add(&a).unwrap();
        store.add(&b).unwrap();

        let actives = store
            .list(&ReminderFilter::default().with_status(Status::Active))
            .unwrap();
        assert_eq!(actives.len(), 1);
        assert_eq!(actives[0].agent, "alpha");

        let by_kind = store
            .list(&ReminderFilter::default().with_kind(crate::types::TriggerKind::Session))
            .unwrap();
        assert_eq!(by_kind.len(), 1);
        assert_eq!(by_kind[0].agent, "beta");

        let by_agent = store
            .list(&ReminderFilter::default().with_agent("alpha"))
            .unwrap();
        assert_eq!(by_agent.len(), 1);

        let all = store.list(&ReminderFilter::default()).unwrap();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn test_round_trip_preserves_links() {
        let store = SqliteStore::in_memory().unwrap();

        let parent = sample("default", TriggerSpec::time(Utc::now()));
        store.add(&parent).unwrap();

        let child = sample("default", TriggerSpec::time(Utc::now() + Duration::days(1)))
            .with_depends_on(parent.id)
            .with_recurrence(Recurrence::new(1, crate::types::RecurrenceUnit::Week).unwrap());
        store.add(&child).unwrap();

        let loaded = store.get(child.id).unwrap().unwrap();
        assert_eq!(loaded.depends_on, Some(parent.id));
        assert_eq!(loaded.recurrence.unwrap().interval, 1);
    }

    #[test]
    fn test_purge_older_than() {
        let store = SqliteStore::in_memory().unwrap();

        let mut old = sample("default", TriggerSpec::Session);
        old.status = Status::Completed;
        old.updated_at = Utc::now() - Duration::days(90);
        store.add(&old).unwrap();
        store
            .append_history(&HistoryEntry::new(
                old.id,
                HistoryAction::Completed,
                Originator::System,
            ))
            .unwrap();

        let mut fresh = sample("default", TriggerSpec::Session);
        fresh.status = Status::Completed;
        store.add(&fresh).unwrap();

        let active = sample("default", TriggerSpec::Session);
        store.add(&active).unwrap();

        let purged = store
            .purge_older_than(
                &[Status::Completed, Status::Expired, Status::Deleted],
                Utc::now() - Duration::days(30),
            )
            .unwrap();
        assert_eq!(purged, 1);

        assert!(store.get(old.id).unwrap().is_none());
        assert!(store.get(fresh.id).unwrap().is_some());
        assert!(store.get(active.id).unwrap().is_some());
        assert!(store.history_for(old.id, 10).unwrap().is_empty());
    }

    #[test]
    fn test_history_append_and_read() {
        let store = SqliteStore::in_memory().unwrap();

        let reminder = sample("default", TriggerSpec::Heartbeat);
        store.add(&reminder).unwrap();

        store
            .append_history(
                &HistoryEntry::new(reminder.id, HistoryAction::Created, Originator::User)
                    .with_after(&reminder),
            )
            .unwrap();
        store
            .append_history(&HistoryEntry::new(
                reminder.id,
                HistoryAction::Fired,
                Originator::System,
            ))
            .unwrap();

        let history = store.history_for(reminder.id, 10).unwrap();
        assert_eq!(history.len(), 2);
        assert!(history.iter().any(|h| h.action == HistoryAction::Created));
        assert!(history.iter().any(|h| h.action == HistoryAction::Fired));
    }

    #[test]
    fn test_file_backed_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tickler.db");

        let reminder = sample("default", TriggerSpec::Session);
        {
            let store = SqliteStore::new(&path).unwrap();
            store.add(&reminder).unwrap();
        }

        let reopened = SqliteStore::new(&path).unwrap();
        assert!(reopened.get(reminder.id).unwrap().is_some());
    }
}
