//! Core logic: endpoint classification, the usage ledger, and notifications.
//!
//! - [`classifier`]: private-address test for source/destination pairs
//! - [`Status`]: daily byte total with the rollover/breach state machine
//! - [`Notifier`]: fire-and-forget user notifications

pub mod classifier;
pub mod ledger;
pub mod notify;

pub use ledger::{format_bytes, lock_status, SharedStatus, Status, TickOutcome, UsageReport};
pub use notify::{notify_or_log, CommandNotifier, LogNotifier, Notifier};
