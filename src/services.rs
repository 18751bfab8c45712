//! Background workers of the accounting loop.
//!
//! - Drain worker: one per traffic monitor, adds each accepted packet's size to
//!   the ledger as soon as it arrives.
//! - Status ticker: wakes on a fixed interval, runs the rollover/breach state
//!   machine and persists the ledger.
//!
//! Both work against the same `SharedStatus`; every read-modify-write happens
//! under its lock, while file I/O and notification delivery happen after the
//! lock is released.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Local};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::capture::PacketInfo;
use crate::core::{lock_status, notify_or_log, Notifier, SharedStatus, Status, TickOutcome};
use crate::store::StatusStore;

/// Title of the one-shot breach notification.
pub const BREACH_TITLE: &str = "Traffic Threshold Exceeded";

/// Title of the notification sent when monitoring (re)starts on an interface.
pub const START_TITLE: &str = "Start monitoring";

/// Spawns the accounting loop's background tasks.
pub struct BackgroundServices;

impl BackgroundServices {
    /// Spawn the periodic rollover/threshold/persist task. The first tick runs
    /// immediately, so a stale ledger is rolled over at startup.
    pub fn start_status_ticker(
        status: SharedStatus,
        store: StatusStore,
        notifier: Arc<dyn Notifier>,
        interval: Duration,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let (status, store, notifier) =
                    (Arc::clone(&status), store.clone(), Arc::clone(&notifier));
                // The persist step does file I/O and the notifier may spawn a process.
                let tick = tokio::task::spawn_blocking(move || {
                    run_status_tick(&status, &store, notifier.as_ref(), Local::now())
                });
                if let Err(e) = tick.await {
                    tracing::error!("Status tick failed: {e}");
                }
            }
        })
    }

    /// Spawn a drain worker for one monitor's event stream. Resolves to the
    /// number of bytes drained once the stream closes.
    pub fn start_drain(
        status: SharedStatus,
        events: mpsc::Receiver<PacketInfo>,
        interface: String,
    ) -> JoinHandle<u64> {
        tokio::spawn(drain_events(status, events, interface))
    }
}

async fn drain_events(
    status: SharedStatus,
    mut events: mpsc::Receiver<PacketInfo>,
    interface: String,
) -> u64 {
    let mut drained = 0u64;
    while let Some(info) = events.recv().await {
        lock_status(&status).record_bytes(info.size);
        drained = drained.saturating_add(info.size);
    }
    tracing::info!("Event stream for {interface} closed after {drained} bytes");
    drained
}

/// One tick of the status state machine: rollover, breach, persist.
pub fn run_status_tick(
    status: &Mutex<Status>,
    store: &StatusStore,
    notifier: &dyn Notifier,
    now: DateTime<Local>,
) -> TickOutcome {
    let (outcome, snapshot) = {
        let mut guard = lock_status(status);
        let outcome = guard.tick(now);
        (outcome, guard.clone())
    };

    if outcome.rolled_over {
        tracing::info!("New day {}: daily total reset", now.date_naive());
    }

    if let Some(breach) = outcome.breach {
        let body = breach.message();
        tracing::info!("Threshold exceeded on {}: {body}", snapshot.interface_name);
        notify_or_log(notifier, BREACH_TITLE, &body);
    }

    if let Err(e) = store.save(&snapshot) {
        tracing::warn!("Failed to persist ledger to {}: {e}", store.path().display());
    }

    outcome
}

#[cfg(test)]
mod tests {
    use chrono::Duration as ChronoDuration;

    use super::*;
    use crate::core::notify::testing::RecordingNotifier;

    fn shared(total: u64, threshold: u64, notified: bool, date: DateTime<Local>) -> SharedStatus {
        Arc::new(Mutex::new(Status {
            interface_name: "eth0".into(),
            total_bytes: total,
            threshold_bytes: threshold,
            notified,
            date,
        }))
    }

    fn temp_store() -> (tempfile::TempDir, StatusStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = StatusStore::new(dir.path().join("status.json"));
        (dir, store)
    }

    fn packet(size: u64) -> PacketInfo {
        PacketInfo {
            src: "192.168.1.2".into(),
            dst: "1.1.1.1".into(),
            size,
        }
    }

    #[test]
    fn test_tick_on_new_day_resets_without_notifying() {
        let (_dir, store) = temp_store();
        let notifier = RecordingNotifier::default();
        let now = Local::now();
        let status = shared(900_000, 1_000_000, false, now - ChronoDuration::days(1));

        let outcome = run_status_tick(&status, &store, &notifier, now);

        assert!(outcome.rolled_over);
        let s = lock_status(&status).clone();
        assert_eq!(s.total_bytes, 0);
        assert!(!s.notified);
        assert_eq!(s.date, now);
        assert!(notifier.titles().is_empty());
    }

    #[test]
    fn test_breach_notifies_once_and_persists() {
        let (_dir, store) = temp_store();
        let notifier = RecordingNotifier::default();
        let now = Local::now();
        let status = shared(500_000, 1_000_000, false, now);

        lock_status(&status).record_bytes(600_000);
        run_status_tick(&status, &store, &notifier, now);

        {
            let s = lock_status(&status);
            assert_eq!(s.total_bytes, 1_100_000);
            assert!(s.notified);
        }
        assert_eq!(notifier.count_titled(BREACH_TITLE), 1);
        let persisted = store.load_or_default(1).unwrap();
        assert_eq!(persisted.total_bytes, 1_100_000);
        assert!(persisted.notified);

        lock_status(&status).record_bytes(50_000);
        run_status_tick(&status, &store, &notifier, now);
        run_status_tick(&status, &store, &notifier, now);

        {
            let s = lock_status(&status);
            assert_eq!(s.total_bytes, 1_150_000);
            assert!(s.notified);
        }
        assert_eq!(notifier.count_titled(BREACH_TITLE), 1);
        assert_eq!(store.load_or_default(1).unwrap().total_bytes, 1_150_000);
    }

    #[test]
    fn test_stale_over_threshold_total_rolls_over_silently() {
        let (_dir, store) = temp_store();
        let notifier = RecordingNotifier::default();
        let now = Local::now();
        let status = shared(9_000_000, 1_000_000, false, now - ChronoDuration::days(2));

        let outcome = run_status_tick(&status, &store, &notifier, now);

        assert!(outcome.rolled_over);
        assert!(outcome.breach.is_none());
        assert!(notifier.titles().is_empty());
    }

    #[test]
    fn test_persist_failure_keeps_in_memory_state() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();
        let store = StatusStore::new(blocker.join("status.json"));
        let notifier = RecordingNotifier::default();
        let now = Local::now();
        let status = shared(2_000_000, 1_000_000, false, now);

        let outcome = run_status_tick(&status, &store, &notifier, now);

        assert!(outcome.breach.is_some());
        assert!(lock_status(&status).notified);
        assert_eq!(notifier.count_titled(BREACH_TITLE), 1);
    }

    #[tokio::test]
    async fn test_drain_adds_every_packet_size() {
        let status = shared(1_000, 1_000_000, false, Local::now());
        let (tx, rx) = mpsc::channel(8);
        let handle = BackgroundServices::start_drain(Arc::clone(&status), rx, "eth0".into());

        let sizes = [1514u64, 60, 98, 0, 9000, 1514];
        for size in sizes {
            tx.send(packet(size)).await.unwrap();
        }
        drop(tx);

        let drained = handle.await.unwrap();
        assert_eq!(drained, sizes.iter().sum::<u64>());
        assert_eq!(lock_status(&status).total_bytes, 1_000 + drained);
    }

    #[tokio::test]
    async fn test_status_ticker_persists_periodically() {
        let (_dir, store) = temp_store();
        let notifier = Arc::new(RecordingNotifier::default());
        let status = shared(5_000, 1_000, false, Local::now());

        let ticker = BackgroundServices::start_status_ticker(
            Arc::clone(&status),
            store.clone(),
            notifier.clone(),
            Duration::from_millis(10),
        );
        tokio::time::sleep(Duration::from_millis(100)).await;
        ticker.abort();

        assert!(lock_status(&status).notified);
        assert_eq!(notifier.count_titled(BREACH_TITLE), 1);
        assert!(store.load_or_default(1).unwrap().notified);
    }

    /// Records the thread each notification was delivered on.
    #[derive(Default)]
    struct ThreadRecorder {
        threads: Mutex<Vec<std::thread::ThreadId>>,
    }

    impl Notifier for ThreadRecorder {
        fn notify(&self, _title: &str, _body: &str) -> anyhow::Result<()> {
            self.threads.lock().unwrap().push(std::thread::current().id());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_status_ticker_runs_tick_off_the_async_thread() {
        let (_dir, store) = temp_store();
        let notifier = Arc::new(ThreadRecorder::default());
        let status = shared(5_000, 1_000, false, Local::now());

        let ticker = BackgroundServices::start_status_ticker(
            Arc::clone(&status),
            store.clone(),
            notifier.clone(),
            Duration::from_millis(10),
        );
        for _ in 0..100 {
            if store.load_or_default(1).unwrap().notified {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        ticker.abort();

        let threads = notifier.threads.lock().unwrap().clone();
        assert_eq!(threads.len(), 1);
        // Single-threaded test runtime: async tasks all run on this thread.
        assert_ne!(threads[0], std::thread::current().id());
        assert!(store.load_or_default(1).unwrap().notified);
    }
}
