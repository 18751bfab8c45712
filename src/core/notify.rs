//! User notifications. Delivery is fire-and-forget: callers log failures and
//! carry on.

use std::process::{Command, Stdio};

use anyhow::Context;

/// Something that can tell the user about usage events.
pub trait Notifier: Send + Sync {
    fn notify(&self, title: &str, body: &str) -> anyhow::Result<()>;
}

/// Deliver a notification, logging rather than propagating failure.
pub fn notify_or_log(notifier: &dyn Notifier, title: &str, body: &str) {
    if let Err(e) = notifier.notify(title, body) {
        tracing::warn!("Failed to deliver notification \"{title}\": {e:#}");
    }
}

/// Writes notifications to the log. Used when no hook command is configured.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, title: &str, body: &str) -> anyhow::Result<()> {
        tracing::info!("{title}: {body}");
        Ok(())
    }
}

/// Runs an external program as `<program> <title> <body>` (e.g. `notify-send`).
#[derive(Debug, Clone)]
pub struct CommandNotifier {
    program: String,
}

impl CommandNotifier {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Notifier for CommandNotifier {
    fn notify(&self, title: &str, body: &str) -> anyhow::Result<()> {
        let mut child = Command::new(&self.program)
            .arg(title)
            .arg(body)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("failed to spawn notification hook {}", self.program))?;
        tracing::debug!("Notification hook {} spawned for \"{title}\"", self.program);

        // A hook that is never waited on stays a zombie until the agent exits.
        let program = self.program.clone();
        let reaper = std::thread::Builder::new()
            .name("notify-hook".into())
            .spawn(move || match child.wait() {
                Ok(status) if !status.success() => {
                    tracing::warn!("Notification hook {program} exited with {status}")
                }
                Ok(_) => {}
                Err(e) => tracing::warn!("Failed to wait for notification hook {program}: {e}"),
            });
        if let Err(e) = reaper {
            // The closure, and the child with it, was dropped unwaited.
            tracing::warn!("Failed to start notification hook reaper: {e}");
        }
        Ok(())
    }
}
