//! Interface selection and usage queries.

use std::sync::Arc;

use crate::capture::{InterfaceInfo, TrafficMonitor};
use crate::core::{lock_status, notify_or_log, UsageReport};
use crate::error::AppError;
use crate::services::{BackgroundServices, START_TITLE};

use super::logic::validate_interface_name;
use super::state::Coordinator;

impl Coordinator {
    /// Stop the current monitor and bind a new one to `name`.
    ///
    /// The ledger's interface is only updated once the new session has started.
    /// On failure the previous monitor stays stopped and the error is returned.
    pub fn select_interface(&mut self, name: &str) -> Result<String, AppError> {
        let name = validate_interface_name(name)?;

        if let Some(previous) = self.monitor.take() {
            previous.stop();
        }

        let mut monitor = TrafficMonitor::new(name, true);
        if let Err(e) = monitor.start(self.provider.as_ref()) {
            tracing::error!("Failed to start monitoring {name}: {e}");
            return Err(e);
        }
        let events = monitor.take_output().ok_or_else(|| {
            AppError::InvalidInput(format!("event stream for {name} already taken"))
        })?;

        // The previous drain worker finishes on its own once its stream closes.
        self.drain = Some(BackgroundServices::start_drain(
            Arc::clone(&self.status),
            events,
            name.to_string(),
        ));
        self.monitor = Some(monitor);

        let snapshot = {
            let mut status = lock_status(&self.status);
            status.interface_name = name.to_string();
            status.clone()
        };
        if let Err(e) = self.store.save(&snapshot) {
            tracing::warn!("Failed to persist interface selection: {e}");
        }

        tracing::info!("Monitoring interface: {name}");
        notify_or_log(
            self.notifier.as_ref(),
            START_TITLE,
            &format!("Current usage: {}", snapshot.usage_summary()),
        );
        Ok(name.to_string())
    }

    pub fn current_usage(&self) -> UsageReport {
        lock_status(&self.status).report()
    }

    pub fn list_interfaces(&self) -> Result<Vec<InterfaceInfo>, AppError> {
        self.provider.list_interfaces()
    }
}
