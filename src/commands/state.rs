//! The coordinator: sole owner of the live traffic monitor.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::capture::{CaptureProvider, TrafficMonitor};
use crate::config;
use crate::core::{Notifier, SharedStatus};
use crate::error::AppError;
use crate::store::StatusStore;

use super::{Command, CoordinatorHandle, Reply, Request};

/// Binds at most one live [`TrafficMonitor`] to the ledger's interface.
///
/// Constructed once at startup; after [`Coordinator::spawn`] it is only
/// reachable through its [`CoordinatorHandle`].
pub struct Coordinator {
    pub(super) status: SharedStatus,
    pub(super) store: StatusStore,
    pub(super) provider: Arc<dyn CaptureProvider>,
    pub(super) notifier: Arc<dyn Notifier>,
    pub(super) monitor: Option<TrafficMonitor>,
    pub(super) drain: Option<JoinHandle<u64>>,
}

impl Coordinator {
    pub fn new(
        status: SharedStatus,
        store: StatusStore,
        provider: Arc<dyn CaptureProvider>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            status,
            store,
            provider,
            notifier,
            monitor: None,
            drain: None,
        }
    }

    /// Interface of the live monitor, if one is running.
    pub fn active_interface(&self) -> Option<&str> {
        self.monitor
            .as_ref()
            .filter(|m| m.is_running())
            .map(TrafficMonitor::interface_name)
    }

    /// Move the coordinator onto its own task and return the command handle.
    pub fn spawn(self) -> (CoordinatorHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(config::COMMAND_QUEUE_SIZE);
        let task = tokio::spawn(self.run(rx));
        (CoordinatorHandle { tx }, task)
    }

    async fn run(mut self, mut requests: mpsc::Receiver<Request>) {
        while let Some(Request { command, reply }) = requests.recv().await {
            let is_shutdown = command == Command::Shutdown;
            let result = self.execute(command).await;
            if let Err(e) = &result {
                tracing::warn!("Command failed: {e}");
            }
            // The requester may have given up waiting; nothing to do then.
            let _ = reply.send(result);
            if is_shutdown {
                return;
            }
        }

        tracing::debug!("All coordinator handles dropped");
        self.shutdown().await;
    }

    pub async fn execute(&mut self, command: Command) -> Result<Reply, AppError> {
        match command {
            Command::SelectInterface(name) => self
                .select_interface(&name)
                .map(|interface| Reply::Selected { interface }),
            Command::Usage => Ok(Reply::Usage(self.current_usage())),
            Command::ListInterfaces => self.list_interfaces().map(Reply::Interfaces),
            Command::SetThreshold(bytes) => {
                self.set_threshold(bytes);
                Ok(Reply::Threshold {
                    threshold_bytes: bytes,
                })
            }
            Command::Shutdown => {
                self.shutdown().await;
                Ok(Reply::Stopped)
            }
        }
    }
}
