//! Centralized runtime constants for the accounting agent.
//!
//! All tunable intervals, thresholds, and sizes are collected here so they can
//! be found and adjusted in a single place rather than scattered across modules.

/// Interval at which the status ticker evaluates rollover/threshold and persists the ledger (seconds).
pub const TICK_INTERVAL_SECS: u64 = 10;

/// Threshold used when no ledger has been persisted yet (bytes).
pub const DEFAULT_THRESHOLD_BYTES: u64 = 1_000_000;

/// Bytes captured per frame. Only link + IP headers are inspected; the wire length
/// is taken from the capture header, so a short snap length loses nothing.
pub const CAPTURE_SNAPLEN: i32 = 128;

/// Read timeout of the live capture handle (milliseconds). Bounds how long a
/// stopped monitor keeps its capture thread alive on an idle interface.
pub const CAPTURE_READ_TIMEOUT_MS: i32 = 500;

/// Boundary filter applied to every capture session.
pub const CAPTURE_FILTER: &str = "ip or ip6";

/// Capacity of the monitor → drain worker event channel. When full, the capture
/// thread blocks until the drain worker catches up.
pub const EVENT_BUFFER_SIZE: usize = 4096;

/// Capacity of the coordinator command queue.
pub const COMMAND_QUEUE_SIZE: usize = 32;

/// How long shutdown waits for the drain worker to empty the event stream (milliseconds).
pub const SHUTDOWN_DRAIN_TIMEOUT_MS: u64 = 2_000;

/// Directory (under the platform data directory) holding the ledger record.
pub const APP_DIR_NAME: &str = "traffic-ledger";

/// File name of the persisted ledger record.
pub const STATUS_FILE_NAME: &str = "status.json";
