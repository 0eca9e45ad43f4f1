//! Notification dispatch.
//!
//! Notifications are fire-and-forget with at-most-effort delivery: the
//! engine hands a rendered notification to the [`Notifier`] and moves on.
//! Implementations must swallow their own failures.

use async_trait::async_trait;
use once_cell::sync::OnceCell;
use std::path::Path;
use std::process::Stdio;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::types::{Priority, Reminder};

/// A rendered notification, ready for display.
#[derive(Debug, Clone)]
pub struct Notification {
    pub reminder_id: Uuid,
    pub title: String,
    pub body: String,
    pub priority: Priority,
}

impl Notification {
    /// Render a notification for a reminder.
    pub fn for_reminder(reminder: &Reminder) -> Self {
        Self {
            reminder_id: reminder.id,
            title: format!("Reminder ({})", reminder.agent),
            body: reminder.content.clone(),
            priority: reminder.priority,
        }
    }
}

/// Capability for delivering notifications. Never raises.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Dispatch a notification. Fire-and-forget; failures are logged by the
    /// implementation and never propagate.
    async fn notify(&self, notification: &Notification);
}

/// Notifier that only writes to the log. Used when no desktop backend is
/// available and as the default in headless environments.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notification: &Notification) {
        info!(
            reminder = %notification.reminder_id,
            priority = %notification.priority,
            title = %notification.title,
            body = %notification.body,
            "reminder due"
        );
    }
}

/// Desktop notification backends, in detection order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NotifyBackend {
    /// `notify-send` (Linux desktops).
    NotifySend,
    /// `osascript` (macOS).
    OsaScript,
}

/// Notifier that shells out to the first detected desktop backend.
///
/// Backend detection is memoized per instance, not process-wide, so separate
/// engine instances (and tests) stay independent. The spawned process is
/// detached and never awaited: delivery is at-most-effort.
#[derive(Debug, Default)]
pub struct CommandNotifier {
    backend: OnceCell<Option<NotifyBackend>>,
}

impl CommandNotifier {
    /// Create a notifier; detection runs lazily on first use.
    pub fn new() -> Self {
        Self::default()
    }

    fn backend(&self) -> Option<NotifyBackend> {
        *self.backend.get_or_init(|| {
            let backend = if binary_on_path("notify-send") {
                Some(NotifyBackend::NotifySend)
            } else if binary_on_path("osascript") {
                Some(NotifyBackend::OsaScript)
            } else {
                None
            };
            debug!(?backend, "notification backend detected");
            backend
        })
    }
}

#[async_trait]
impl Notifier for CommandNotifier {
    async fn notify(&self, notification: &Notification) {
        let Some(backend) = self.backend() else {
            debug!(
                reminder = %notification.reminder_id,
                "no notification backend available, logging only"
            );
            LogNotifier.notify(notification).await;
            return;
        };

        let mut command = match backend {
            NotifyBackend::NotifySend => {
                let mut c = tokio::process::Command::new("notify-send");
                c.arg(&notification.title).arg(&notification.body);
                c
            }
            NotifyBackend::OsaScript => {
                let script = format!(
                    "display notification \"{}\" with title \"{}\"",
                    escape_osascript(&notification.body),
                    escape_osascript(&notification.title),
                );
                let mut c = tokio::process::Command::new("osascript");
                c.arg("-e").arg(script);
                c
            }
        };

        // Detached: spawn and let go. The display either happens or it
        // doesn't; the loop must not block on it.
        let spawned = command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();
        if let Err(e) = spawned {
            warn!(
                reminder = %notification.reminder_id,
                error = %e,
                "failed to spawn notification command"
            );
        }
    }
}

fn escape_osascript(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Check whether an executable is reachable on PATH.
fn binary_on_path(name: &str) -> bool {
    let Some(path) = std::env::var_os("PATH") else {
        return false;
    };
    std::env::split_paths(&path).any(|dir| is_executable(&dir.join(name)))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
