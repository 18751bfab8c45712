//! The accounting coordinator and its command queue.
//!
//! - `state`: the `Coordinator` that owns the live traffic monitor
//! - `traffic`: interface selection and usage queries
//! - `system`: startup, threshold changes and shutdown
//! - `logic`: pure decision functions (unit-testable)
//!
//! Callers never touch the monitor directly: they send a [`Command`] through a
//! [`CoordinatorHandle`] and await the reply.

mod logic;
mod state;
mod system;
mod traffic;

use serde::Serialize;
use tokio::sync::{mpsc, oneshot};

use crate::capture::InterfaceInfo;
use crate::core::UsageReport;
use crate::error::AppError;

pub use logic::{parse_command, pick_default_interface};
pub use state::Coordinator;

/// Requests understood by the coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Tear down the current session and bind a new one.
    SelectInterface(String),
    Usage,
    ListInterfaces,
    SetThreshold(u64),
    /// Stop monitoring, persist the ledger, end the command loop.
    Shutdown,
}

/// Successful command results.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Reply {
    Selected { interface: String },
    Usage(UsageReport),
    Interfaces(Vec<InterfaceInfo>),
    Threshold { threshold_bytes: u64 },
    Stopped,
}

struct Request {
    command: Command,
    reply: oneshot::Sender<Result<Reply, AppError>>,
}

/// Cloneable sender side of the coordinator's command queue.
#[derive(Debug, Clone)]
pub struct CoordinatorHandle {
    tx: mpsc::Sender<Request>,
}

impl CoordinatorHandle {
    /// Queue a command and wait for its result.
    pub async fn execute(&self, command: Command) -> Result<Reply, AppError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Request { command, reply })
            .await
            .map_err(|_| AppError::InvalidInput("Coordinator is not running".into()))?;
        rx.await
            .map_err(|_| AppError::InvalidInput("Coordinator stopped before replying".into()))?
    }

    pub async fn select_interface(&self, name: impl Into<String>) -> Result<Reply, AppError> {
        self.execute(Command::SelectInterface(name.into())).await
    }

    pub async fn usage(&self) -> Result<UsageReport, AppError> {
        match self.execute(Command::Usage).await? {
            Reply::Usage(report) => Ok(report),
            other => Err(AppError::InvalidInput(format!(
                "Unexpected reply to usage query: {other:?}"
            ))),
        }
    }

    pub async fn shutdown(&self) -> Result<Reply, AppError> {
        self.execute(Command::Shutdown).await
    }
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Request")
            .field("command", &self.command)
            .finish_non_exhaustive()
    }
}
