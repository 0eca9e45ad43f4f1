//! On-fire hook execution.
//!
//! Hooks are user-configured external commands run as a side effect when a
//! reminder fires. Execution is bounded by a timeout, output is captured,
//! and every failure is recorded to the log sink instead of raised.

use async_trait::async_trait;
use chrono::Utc;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tracing::{debug, warn};

/// Capability for running on-fire hook commands. Never raises.
#[async_trait]
pub trait HookRunner: Send + Sync {
    /// Run a hook command with the given environment. Returns whether it
    /// completed successfully within the timeout.
    async fn run(&self, command: &str, env: &[(String, String)], timeout: Duration) -> bool;
}

/// Hook runner that executes commands through `sh -c`.
#[derive(Debug, Default)]
pub struct ShellHookRunner {
    log_path: Option<PathBuf>,
}

impl ShellHookRunner {
    /// Create a runner that records failures only to tracing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Also append failures to a log file.
    pub fn with_log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_path = Some(path.into());
        self
    }

    async fn log_failure(&self, command: &str, reason: &str) {
        warn!(command, reason, "on-fire hook failed");
        let Some(path) = &self.log_path else {
            return;
        };
        let line = format!("{} hook failed ({}): {}\n", Utc::now().to_rfc3339(), reason, command);
        let result = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await;
        match result {
            Ok(mut file) => {
                use tokio::io::AsyncWriteExt;
                if let Err(e) = file.write_all(line.as_bytes()).await {
                    warn!(error = %e, "could not append to hook log");
                }
            }
            Err(e) => warn!(error = %e, "could not open hook log"),
        }
    }
}

#[async_trait]
impl HookRunner for ShellHookRunner {
    async fn run(&self, command: &str, env: &[(String, String)], timeout: Duration) -> bool {
        let mut cmd = tokio::process::Command::new("sh");
        cmd.arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // The child is killed if the future is dropped at the timeout, so
            // a hung hook cannot outlive its tick.
            .kill_on_drop(true);
        for (key, value) in env {
            cmd.env(key, value);
        }

        match tokio::time::timeout(timeout, cmd.output()).await {
            Err(_) => {
                self.log_failure(command, "timed out").await;
                false
            }
            Ok(Err(e)) => {
                self.log_failure(command, &format!("spawn error: {}", e)).await;
                false
            }
            Ok(Ok(output)) => {
                if output.status.success() {
                    debug!(command, "on-fire hook completed");
                    true
                } else {
                    let stderr = String::from_utf8_lossy(&output.stderr);
                    let reason = format!(
                        "exit {}{}",
                        output.status.code().unwrap_or(-1),
                        if stderr.trim().is_empty() {
                            String::new()
                        } else {
                            format!(": {}", stderr.trim())
                        }
                    );
                    self.log_failure(command, &reason).await;
                    false
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env() -> Vec<(String, String)> {
        vec![("TICKLER_TEST".to_string(), "1".to_string())]
    }

    #[tokio::test]
    async fn test_successful_hook() {
        let runner = ShellHookRunner::new();
        assert!(runner.run("true", &env(), Duration::from_secs(5)).await);
    }

    #[tokio::test]
    async fn test_hook_sees_environment() {
        let runner = ShellHookRunner::new();
        assert!(
            runner
                .run("test \"$TICKLER_TEST\" = 1", &env(), Duration::from_secs(5))
                .await
        );
    }

    #[tokio::test]
    async fn test_failing_hook_reports_false() {
        let runner = ShellHookRunner::new();
        assert!(!runner.run("exit 7", &env(), Duration::from_secs(5)).await);
    }

    #[tokio::test]
    async fn test_timeout_reports_false() {
        let runner = ShellHookRunner::new();
        assert!(
            !runner
                .run("sleep 5", &env(), Duration::from_millis(100))
                .await
        );
    }

    #[tokio::test]
    async fn test_failures_appended_to_log() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("hooks.log");
        let runner = ShellHookRunner::new().with_log_path(&log);

        assert!(!runner.run("exit 1", &env(), Duration::from_secs(5)).await);
        assert!(
            !runner
                .run("sleep 5", &env(), Duration::from_millis(100))
                .await
        );

        let contents = tokio::fs::read_to_string(&log).await.unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("exit 1"));
        assert!(lines[1].contains("timed out"));
    }
}
