//! Live capture through libpcap (Npcap on Windows).
//!
//! Opening a device usually requires elevated privileges (root, CAP_NET_RAW,
//! or membership in the platform's capture group). Failures surface as
//! `CaptureUnavailable`.

use pcap::{Active, Capture, Device};

use crate::capture::{CaptureProvider, Frame, FrameSource, InterfaceInfo, LinkKind};
use crate::config;
use crate::error::AppError;

/// [`CaptureProvider`] backed by the system packet capture library.
#[derive(Debug, Default)]
pub struct PcapProvider;

impl CaptureProvider for PcapProvider {
    fn list_interfaces(&self) -> Result<Vec<InterfaceInfo>, AppError> {
        let devices = Device::list()
            .map_err(|e| AppError::CaptureUnavailable(format!("failed to list devices: {e}")))?;

        Ok(devices
            .into_iter()
            .map(|device| InterfaceInfo {
                description: device.desc.clone().unwrap_or_else(|| device.name.clone()),
                has_address: !device.addresses.is_empty(),
                is_loopback: device.flags.is_loopback(),
                name: device.name,
            })
            .collect())
    }

    fn open(&self, interface: &str) -> Result<Box<dyn FrameSource>, AppError> {
        tracing::info!("Opening capture on {interface} with filter: {}", config::CAPTURE_FILTER);

        let mut cap = Capture::from_device(interface)
            .and_then(|inactive| {
                inactive
                    .promisc(true)
                    .snaplen(config::CAPTURE_SNAPLEN)
                    .timeout(config::CAPTURE_READ_TIMEOUT_MS)
                    .open()
            })
            .map_err(|e| {
                AppError::CaptureUnavailable(format!(
                    "failed to open {interface}: {e}. \
                     Capturing usually requires root or CAP_NET_RAW."
                ))
            })?;

        cap.filter(config::CAPTURE_FILTER, true).map_err(|e| {
            AppError::CaptureUnavailable(format!(
                "failed to apply filter \"{}\" on {interface}: {e}",
                config::CAPTURE_FILTER
            ))
        })?;

        let link = LinkKind::from_dlt(cap.get_datalink().0);
        tracing::debug!("{interface}: link type {link:?}");
        Ok(Box::new(PcapSource { cap, link }))
    }
}

struct PcapSource {
    cap: Capture<Active>,
    link: LinkKind,
}

impl FrameSource for PcapSource {
    fn link_kind(&self) -> LinkKind {
        self.link
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, AppError> {
        match self.cap.next_packet() {
            Ok(packet) if packet.data.is_empty() => Ok(None),
            Ok(packet) => Ok(Some(Frame {
                data: packet.data.to_vec(),
                wire_len: u64::from(packet.header.len),
            })),
            Err(pcap::Error::TimeoutExpired) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
