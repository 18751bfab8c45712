//! Link-layer and IP header decoding for captured frames.
//!
//! Only as much of each frame is inspected as needed to find the IPv4/IPv6
//! source and destination addresses. Anything else yields `None`.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

const ETHERTYPE_IPV4: u16 = 0x0800;
const ETHERTYPE_IPV6: u16 = 0x86DD;
const ETHERTYPE_VLAN: u16 = 0x8100;
const ETHERTYPE_QINQ: u16 = 0x88A8;

const ETHERNET_TYPE_OFFSET: usize = 12;
const NULL_HEADER_LEN: usize = 4;
const SLL_HEADER_LEN: usize = 16;
const SLL_PROTOCOL_OFFSET: usize = 14;
const SLL2_HEADER_LEN: usize = 20;

/// Link-layer framing of a capture session, derived from its DLT value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    Ethernet,
    /// BSD loopback with a 4-byte address-family header (DLT_NULL / DLT_LOOP).
    Null,
    /// Bare IP packets, no link header.
    Raw,
    /// Linux cooked capture v1.
    LinuxSll,
    /// Linux cooked capture v2.
    LinuxSll2,
    Unsupported(i32),
}

impl LinkKind {
    pub fn from_dlt(dlt: i32) -> Self {
        match dlt {
            1 => LinkKind::Ethernet,
            0 | 108 => LinkKind::Null,
            12 | 14 | 101 | 228 | 229 => LinkKind::Raw,
            113 => LinkKind::LinuxSll,
            276 => LinkKind::LinuxSll2,
            other => LinkKind::Unsupported(other),
        }
    }
}

/// Strip the link-layer header, returning the IP packet it carries.
pub fn network_payload(link: LinkKind, frame: &[u8]) -> Option<&[u8]> {
    match link {
        LinkKind::Ethernet => ethernet_payload(frame),
        LinkKind::Null => frame.get(NULL_HEADER_LEN..),
        LinkKind::Raw => Some(frame),
        LinkKind::LinuxSll => {
            let proto = read_u16(frame, SLL_PROTOCOL_OFFSET)?;
            is_ip_ethertype(proto).then(|| frame.get(SLL_HEADER_LEN..))?
        }
        LinkKind::LinuxSll2 => {
            let proto = read_u16(frame, 0)?;
            is_ip_ethertype(proto).then(|| frame.get(SLL2_HEADER_LEN..))?
        }
        LinkKind::Unsupported(_) => None,
    }
}

fn ethernet_payload(frame: &[u8]) -> Option<&[u8]> {
    let mut offset = ETHERNET_TYPE_OFFSET;
    loop {
        match read_u16(frame, offset)? {
            ETHERTYPE_IPV4 | ETHERTYPE_IPV6 => return frame.get(offset + 2..),
            // 802.1Q / 802.1ad: skip the 4-byte tag, the inner ethertype follows.
            ETHERTYPE_VLAN | ETHERTYPE_QINQ => offset += 4,
            _ => return None,
        }
    }
}

fn is_ip_ethertype(proto: u16) -> bool {
    proto == ETHERTYPE_IPV4 || proto == ETHERTYPE_IPV6
}

fn read_u16(data: &[u8], offset: usize) -> Option<u16> {
    let bytes = data.get(offset..offset + 2)?;
    Some(u16::from_be_bytes([bytes[0], bytes[1]]))
}

/// Read source and destination addresses from an IPv4 or IPv6 header.
pub fn parse_ip_endpoints(packet: &[u8]) -> Option<(IpAddr, IpAddr)> {
    let version = packet.first()? >> 4;
    match version {
        4 => {
            let header = packet.get(..20)?;
            let src: [u8; 4] = header[12..16].try_into().ok()?;
            let dst: [u8; 4] = header[16..20].try_into().ok()?;
            Some((Ipv4Addr::from(src).into(), Ipv4Addr::from(dst).into()))
        }
        6 => {
            let header = packet.get(..40)?;
            let src: [u8; 16] = header[8..24].try_into().ok()?;
            let dst: [u8; 16] = header[24..40].try_into().ok()?;
            Some((Ipv6Addr::from(src).into(), Ipv6Addr::from(dst).into()))
        }
        _ => None,
    }
}

/// Link-layer strip followed by IP endpoint extraction.
pub fn decode_endpoints(link: LinkKind, frame: &[u8]) -> Option<(IpAddr, IpAddr)> {
    parse_ip_endpoints(network_payload(link, frame)?)
}
