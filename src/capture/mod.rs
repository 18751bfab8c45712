//! Packet observation: capture sources and the traffic monitor.
//!
//! - [`CaptureProvider`] / [`FrameSource`]: seam over the live capture library
//! - [`pcap_backend`]: libpcap implementation of that seam
//! - [`frame`]: link-layer and IP header decoding
//! - [`TrafficMonitor`]: one capture thread per interface, emitting accepted
//!   packets to a single consumer

pub mod frame;
pub mod pcap_backend;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;

use crate::config;
use crate::core::classifier;
use crate::error::AppError;

pub use frame::LinkKind;

/// One accepted packet, as handed to the accounting loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketInfo {
    pub src: String,
    pub dst: String,
    /// Full frame length on the wire, link-layer header included.
    pub size: u64,
}

/// A capture-capable interface as reported by the capture library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InterfaceInfo {
    pub name: String,
    /// Human-readable label; falls back to the name.
    pub description: String,
    /// At least one address is bound to the interface.
    pub has_address: bool,
    pub is_loopback: bool,
}

/// One captured frame. `data` may be truncated to the snap length; `wire_len`
/// never is.
#[derive(Debug, Clone)]
pub struct Frame {
    pub data: Vec<u8>,
    pub wire_len: u64,
}

/// A live stream of frames from one interface.
pub trait FrameSource: Send {
    fn link_kind(&self) -> LinkKind;

    /// `Ok(None)` is a transient empty read (timeout); the caller retries.
    /// `Err` means the session is dead.
    fn next_frame(&mut self) -> Result<Option<Frame>, AppError>;
}

/// Opens capture sessions and enumerates interfaces.
pub trait CaptureProvider: Send + Sync {
    fn list_interfaces(&self) -> Result<Vec<InterfaceInfo>, AppError>;

    /// Open `interface` restricted to IP/IPv6 traffic.
    fn open(&self, interface: &str) -> Result<Box<dyn FrameSource>, AppError>;
}

/// Observes one interface on a background thread.
///
/// Not restartable: once stopped, a new monitor must be constructed.
/// Dropping the monitor stops it.
pub struct TrafficMonitor {
    interface_name: String,
    exclude_local: bool,
    shutdown: Arc<AtomicBool>,
    sender: Option<mpsc::Sender<PacketInfo>>,
    output: Option<mpsc::Receiver<PacketInfo>>,
    capture_thread: Option<std::thread::JoinHandle<()>>,
}

impl TrafficMonitor {
    pub fn new(interface_name: impl Into<String>, exclude_local: bool) -> Self {
        let (tx, rx) = mpsc::channel(config::EVENT_BUFFER_SIZE);
        Self {
            interface_name: interface_name.into(),
            exclude_local,
            shutdown: Arc::new(AtomicBool::new(false)),
            sender: Some(tx),
            output: Some(rx),
            capture_thread: None,
        }
    }

    pub fn interface_name(&self) -> &str {
        &self.interface_name
    }

    pub fn is_stopped(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }

    /// True while the capture thread is alive and no stop was requested.
    pub fn is_running(&self) -> bool {
        !self.is_stopped()
            && self
                .capture_thread
                .as_ref()
                .is_some_and(|thread| !thread.is_finished())
    }

    /// Open the interface through `provider` and start the capture thread.
    /// A second call on a started monitor is a no-op.
    pub fn start(&mut self, provider: &dyn CaptureProvider) -> Result<(), AppError> {
        if self.is_stopped() {
            return Err(AppError::InvalidInput(format!(
                "monitor for {} was stopped and cannot be restarted",
                self.interface_name
            )));
        }
        if self.capture_thread.is_some() {
            return Ok(());
        }

        let source = provider.open(&self.interface_name)?;
        self.spawn_capture(source)
    }

    fn spawn_capture(&mut self, source: Box<dyn FrameSource>) -> Result<(), AppError> {
        let Some(sender) = self.sender.take() else {
            return Ok(());
        };
        let interface = self.interface_name.clone();
        let exclude_local = self.exclude_local;
        let shutdown = Arc::clone(&self.shutdown);

        let thread = std::thread::Builder::new()
            .name(format!("capture-{interface}"))
            .spawn(move || run_capture_loop(source, &interface, exclude_local, &shutdown, sender))
            .map_err(|e| {
                self.shutdown.store(true, Ordering::Relaxed);
                AppError::CaptureUnavailable(format!("failed to spawn capture thread: {e}"))
            })?;

        tracing::info!(
            "Traffic monitor started on {} (exclude local: {})",
            self.interface_name,
            self.exclude_local
        );
        self.capture_thread = Some(thread);
        Ok(())
    }

    /// Hand over the event stream. Only the first call returns it.
    pub fn take_output(&mut self) -> Option<mpsc::Receiver<PacketInfo>> {
        self.output.take()
    }

    /// Request the capture loop to exit. Idempotent, never blocks.
    pub fn stop(&self) {
        if !self.shutdown.swap(true, Ordering::Relaxed) {
            tracing::info!("Stopping traffic monitor on {}", self.interface_name);
        }
    }
}

impl Drop for TrafficMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Decode a frame and apply the local-traffic exclusion.
pub fn accept_frame(link: LinkKind, frame: &Frame, exclude_local: bool) -> Option<PacketInfo> {
    let (src, dst) = frame::decode_endpoints(link, &frame.data)?;
    if exclude_local && classifier::is_local_ip(&src) && classifier::is_local_ip(&dst) {
        return None;
    }
    Some(PacketInfo {
        src: src.to_string(),
        dst: dst.to_string(),
        size: frame.wire_len,
    })
}

/// Capture loop running on the monitor's dedicated thread. Returning drops
/// `output`, which closes the event stream for the consumer.
fn run_capture_loop(
    mut source: Box<dyn FrameSource>,
    interface: &str,
    exclude_local: bool,
    shutdown: &AtomicBool,
    output: mpsc::Sender<PacketInfo>,
) {
    let link = source.link_kind();
    if let LinkKind::Unsupported(dlt) = link {
        tracing::warn!("{interface}: link type {dlt} is not decoded, no packets will be counted");
    }

    let mut accepted = 0u64;
    while !shutdown.load(Ordering::Relaxed) {
        match source.next_frame() {
            Ok(Some(frame)) => {
                let Some(info) = accept_frame(link, &frame, exclude_local) else {
                    continue;
                };
                tracing::trace!("{} -> {} ({} B)", info.src, info.dst, info.size);
                if output.blocking_send(info).is_err() {
                    tracing::debug!("{interface}: event consumer gone, ending capture");
                    break;
                }
                accepted += 1;
            }
            Ok(None) => continue,
            Err(e) => {
                if !shutdown.load(Ordering::Relaxed) {
                    tracing::error!("Capture on {interface} failed: {e}");
                }
                break;
            }
        }
    }

    tracing::info!("Capture on {interface} stopped after {accepted} accepted packets");
}
