//! Startup interface binding, threshold changes and orderly shutdown.

use std::time::Duration;

use crate::config;
use crate::core::lock_status;
use crate::error::AppError;

use super::logic::resolve_startup_interface;
use super::state::Coordinator;

impl Coordinator {
    /// Bind the first monitor at startup.
    ///
    /// Only `NoInterfaceAvailable` is returned as an error: a capture failure on
    /// the chosen interface is logged and the agent keeps running so another
    /// interface can be selected.
    pub fn bootstrap(&mut self, preferred: Option<&str>) -> Result<(), AppError> {
        let persisted = lock_status(&self.status).interface_name.clone();

        let interfaces = match self.provider.list_interfaces() {
            Ok(list) => list,
            Err(e) => {
                tracing::warn!("Interface enumeration failed: {e}");
                Vec::new()
            }
        };

        let name = resolve_startup_interface(preferred, &persisted, &interfaces)
            .ok_or(AppError::NoInterfaceAvailable)?;

        if let Err(e) = self.select_interface(&name) {
            tracing::error!("Monitoring is not running: {e}");
        }
        Ok(())
    }

    /// Change the threshold. The notified flag is left alone, so lowering the
    /// threshold after today's notification does not notify again.
    pub fn set_threshold(&mut self, threshold_bytes: u64) {
        let snapshot = {
            let mut status = lock_status(&self.status);
            status.threshold_bytes = threshold_bytes;
            status.clone()
        };
        tracing::info!("Notification threshold set to {threshold_bytes} B");
        if let Err(e) = self.store.save(&snapshot) {
            tracing::warn!("Failed to persist threshold: {e}");
        }
    }

    /// Stop the monitor, let its drain worker finish, persist the ledger.
    pub async fn shutdown(&mut self) {
        if let Some(monitor) = self.monitor.take() {
            monitor.stop();
        }

        if let Some(drain) = self.drain.take() {
            let wait = Duration::from_millis(config::SHUTDOWN_DRAIN_TIMEOUT_MS);
            match tokio::time::timeout(wait, drain).await {
                Ok(Ok(bytes)) => tracing::debug!("Drain worker finished ({bytes} B)"),
                Ok(Err(e)) => tracing::warn!("Drain worker failed: {e}"),
                Err(_) => tracing::warn!("Drain worker still busy after {wait:?}, not waiting"),
            }
        }

        let snapshot = lock_status(&self.status).clone();
        match self.store.save(&snapshot) {
            Ok(()) => tracing::info!("Ledger saved: {}", snapshot.usage_summary()),
            Err(e) => tracing::warn!("Failed to persist ledger on shutdown: {e}"),
        }
    }
}
