//! The usage ledger: today's byte total, the threshold, and the one-shot
//! notification flag, plus the rollover/breach state machine evaluated on
//! every status tick.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Persisted accounting state. One record per installation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Status {
    /// Interface currently monitored. Empty means "unset, pick a default".
    pub interface_name: String,
    /// Bytes accounted since `date`'s calendar day began.
    pub total_bytes: u64,
    /// A notification fires once `total_bytes` exceeds this value.
    pub threshold_bytes: u64,
    /// Set when the breach notification for the current day has fired.
    pub notified: bool,
    /// The calendar day `total_bytes` and `notified` apply to.
    pub date: DateTime<Local>,
}

/// Ledger shared between the drain worker, the status ticker and the coordinator.
pub type SharedStatus = Arc<Mutex<Status>>;

/// Lock the ledger. A panic in another holder leaves the counters valid, so a
/// poisoned lock is recovered rather than propagated.
pub fn lock_status(status: &Mutex<Status>) -> MutexGuard<'_, Status> {
    status.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Values captured at the moment a breach was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Breach {
    pub total_bytes: u64,
    pub threshold_bytes: u64,
}

impl Breach {
    pub fn message(&self) -> String {
        format!(
            "You have exceeded your threshold: {} / {}",
            format_bytes(self.total_bytes),
            format_bytes(self.threshold_bytes)
        )
    }
}

/// What a single tick changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickOutcome {
    pub rolled_over: bool,
    pub breach: Option<Breach>,
}

/// Usage figures handed to the control surface.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageReport {
    pub interface_name: String,
    pub total_bytes: u64,
    pub threshold_bytes: u64,
    pub notified: bool,
    pub date: DateTime<Local>,
    /// `"<total> / <threshold>"` in human-readable units.
    pub usage: String,
}

impl Status {
    pub fn new(interface_name: impl Into<String>, threshold_bytes: u64, now: DateTime<Local>) -> Self {
        Self {
            interface_name: interface_name.into(),
            total_bytes: 0,
            threshold_bytes,
            notified: false,
            date: now,
        }
    }

    /// Account one accepted packet. Called by the drain worker.
    pub fn record_bytes(&mut self, size: u64) {
        self.total_bytes = self.total_bytes.saturating_add(size);
    }

    /// Whether the counters belong to the calendar day of `now`.
    pub fn is_current(&self, now: DateTime<Local>) -> bool {
        self.date.date_naive() == now.date_naive()
    }

    /// Reset the counters if they belong to a different day. Returns true on reset.
    pub fn roll_over(&mut self, now: DateTime<Local>) -> bool {
        if self.is_current(now) {
            return false;
        }
        self.total_bytes = 0;
        self.notified = false;
        self.date = now;
        true
    }

    /// Run one tick of the state machine.
    ///
    /// Rollover is evaluated before the breach check, so a stale total from a
    /// previous day never produces a notification.
    pub fn tick(&mut self, now: DateTime<Local>) -> TickOutcome {
        let rolled_over = self.roll_over(now);

        let breach = if self.total_bytes > self.threshold_bytes && !self.notified {
            self.notified = true;
            Some(Breach {
                total_bytes: self.total_bytes,
                threshold_bytes: self.threshold_bytes,
            })
        } else {
            None
        };

        TickOutcome {
            rolled_over,
            breach,
        }
    }

    /// `"<total> / <threshold>"`, e.g. `"1.05MB / 2.00MB"`.
    pub fn usage_summary(&self) -> String {
        format!(
            "{} / {}",
            format_bytes(self.total_bytes),
            format_bytes(self.threshold_bytes)
        )
    }

    pub fn report(&self) -> UsageReport {
        UsageReport {
            interface_name: self.interface_name.clone(),
            total_bytes: self.total_bytes,
            threshold_bytes: self.threshold_bytes,
            notified: self.notified,
            date: self.date,
            usage: self.usage_summary(),
        }
    }
}

/// Format a byte count with binary units (`B`, `KB`, `MB`, `GB`).
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1 << 10;
    const MB: u64 = 1 << 20;
    const GB: u64 = 1 << 30;

    if bytes >= GB {
        format!("{:.2}GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2}MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2}KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes}B")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn ledger(total: u64, threshold: u64, notified: bool, date: DateTime<Local>) -> Status {
        Status {
            interface_name: "eth0".into(),
            total_bytes: total,
            threshold_bytes: threshold,
            notified,
            date,
        }
    }

    #[test]
    fn test_new_ledger_starts_empty() {
        let now = Local::now();
        let s = Status::new("", 1_000_000, now);
        assert_eq!(s.total_bytes, 0);
        assert!(!s.notified);
        assert_eq!(s.date, now);
        assert!(s.interface_name.is_empty());
    }

    #[test]
    fn test_record_bytes_accumulates_sum() {
        let mut s = Status::new("eth0", 1_000_000, Local::now());
        let sizes = [60u64, 1514, 0, 9000, 42];
        for size in sizes {
            s.record_bytes(size);
        }
        assert_eq!(s.total_bytes, sizes.iter().sum::<u64>());
    }

    #[test]
    fn test_record_bytes_saturates() {
        let mut s = ledger(u64::MAX - 1, 10, false, Local::now());
        s.record_bytes(100);
        assert_eq!(s.total_bytes, u64::MAX);
    }

    #[test]
    fn test_stale_day_rolls_over_without_notifying() {
        let now = Local::now();
        let mut s = ledger(900_000, 1_000_000, false, now - Duration::days(1));

        let outcome = s.tick(now);

        assert!(outcome.rolled_over);
        assert_eq!(outcome.breach, None);
        assert_eq!(s.total_bytes, 0);
        assert!(!s.notified);
        assert_eq!(s.date, now);
    }

    #[test]
    fn test_rollover_precedes_breach_for_stale_over_threshold_total() {
        let now = Local::now();
        let mut s = ledger(5_000_000, 1_000_000, false, now - Duration::days(1));

        let outcome = s.tick(now);

        assert!(outcome.rolled_over);
        assert_eq!(outcome.breach, None);
        assert_eq!(s.total_bytes, 0);
        assert!(!s.notified);
    }

    #[test]
    fn test_rollover_clears_notified_flag() {
        let now = Local::now();
        let mut s = ledger(2_000_000, 1_000_000, true, now - Duration::days(3));
        s.tick(now);
        assert!(!s.notified);
        assert_eq!(s.total_bytes, 0);
    }

    #[test]
    fn test_same_day_in_another_month_still_rolls_over() {
        let now = Local::now();
        let mut s = ledger(10, 1_000_000, false, now - Duration::days(31));
        assert!(s.tick(now).rolled_over);
    }

    #[test]
    fn test_breach_fires_once_per_day() {
        let now = Local::now();
        let mut s = ledger(500_000, 1_000_000, false, now);

        s.record_bytes(600_000);
        let first = s.tick(now);
        assert_eq!(
            first.breach,
            Some(Breach {
                total_bytes: 1_100_000,
                threshold_bytes: 1_000_000
            })
        );
        assert_eq!(s.total_bytes, 1_100_000);
        assert!(s.notified);

        s.record_bytes(50_000);
        let second = s.tick(now);
        assert_eq!(second.breach, None);
        assert_eq!(s.total_bytes, 1_150_000);
        assert!(s.notified);

        for _ in 0..10 {
            s.record_bytes(1_000_000);
            assert_eq!(s.tick(now).breach, None);
        }
        assert!(s.notified);
    }

    #[test]
    fn test_total_equal_to_threshold_is_not_a_breach() {
        let now = Local::now();
        let mut s = ledger(1_000_000, 1_000_000, false, now);
        assert_eq!(s.tick(now).breach, None);
        assert!(!s.notified);
    }

    #[test]
    fn test_zero_threshold_breaches_on_first_byte() {
        let now = Local::now();
        let mut s = ledger(0, 0, false, now);
        assert_eq!(s.tick(now).breach, None);
        s.record_bytes(1);
        assert!(s.tick(now).breach.is_some());
    }

    #[test]
    fn test_tick_on_current_day_is_idempotent() {
        let now = Local::now();
        let mut s = ledger(123_456, 1_000_000, false, now);
        let before = s.clone();

        assert_eq!(s.tick(now), TickOutcome::default());
        assert_eq!(s.tick(now), TickOutcome::default());
        assert_eq!(s, before);
    }

    #[test]
    fn test_breach_message_formats_both_values() {
        let breach = Breach {
            total_bytes: 3 << 20,
            threshold_bytes: 1 << 20,
        };
        assert_eq!(
            breach.message(),
            "You have exceeded your threshold: 3.00MB / 1.00MB"
        );
    }

    #[test]
    fn test_report_carries_formatted_usage() {
        let now = Local::now();
        let report = ledger(2048, 1 << 20, true, now).report();
        assert_eq!(report.interface_name, "eth0");
        assert_eq!(report.usage, "2.00KB / 1.00MB");
        assert!(report.notified);
    }

    #[test]
    fn test_status_json_field_names() {
        let s = ledger(7, 9, true, Local::now());
        let json = serde_json::to_value(&s).unwrap();
        let obj = json.as_object().unwrap();
        for key in ["interface_name", "total_bytes", "threshold_bytes", "notified", "date"] {
            assert!(obj.contains_key(key), "missing {key}");
        }
        assert_eq!(obj.len(), 5);
    }

    #[test]
    fn test_status_accepts_rfc3339_with_offset_and_nanos() {
        let raw = r#"{
            "interface_name": "en0",
            "total_bytes": 42,
            "threshold_bytes": 1000000,
            "notified": false,
            "date": "2024-03-05T21:14:07.123456789+01:00"
        }"#;
        let s: Status = serde_json::from_str(raw).unwrap();
        assert_eq!(s.interface_name, "en0");
        assert_eq!(s.total_bytes, 42);
        assert_eq!(s.date.timestamp(), 1_709_669_647);
    }

    #[test]
    fn test_negative_total_is_rejected() {
        let raw = r#"{"interface_name":"","total_bytes":-1,"threshold_bytes":1,"notified":false,"date":"2024-03-05T00:00:00Z"}"#;
        assert!(serde_json::from_str::<Status>(raw).is_err());
    }

    #[test]
    fn test_format_bytes_units() {
        assert_eq!(format_bytes(0), "0B");
        assert_eq!(format_bytes(1023), "1023B");
        assert_eq!(format_bytes(1024), "1.00KB");
        assert_eq!(format_bytes(1536), "1.50KB");
        assert_eq!(format_bytes(1 << 20), "1.00MB");
        assert_eq!(format_bytes(5 * (1 << 30) / 2), "2.50GB");
    }

    #[test]
    fn test_poisoned_lock_is_recovered() {
        let shared: SharedStatus = Arc::new(Mutex::new(Status::new("eth0", 10, Local::now())));
        let clone = Arc::clone(&shared);
        let _ = std::thread::spawn(move || {
            let _guard = clone.lock().unwrap();
            panic!("poison the ledger");
        })
        .join();

        lock_status(&shared).record_bytes(5);
        assert_eq!(lock_status(&shared).total_bytes, 5);
    }
}
