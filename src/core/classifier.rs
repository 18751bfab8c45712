//! Endpoint classification: is a packet's source/destination pair local traffic?
//!
//! "Local" means private, non-globally-routable address space:
//! 10.0.0.0/8, 172.16.0.0/12, 192.168.0.0/16 and the IPv6 unique-local range
//! fc00::/7. IPv4-mapped IPv6 addresses are judged by their IPv4 form.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Returns true when both endpoints are private addresses.
///
/// Strings that do not parse as IP literals are treated as non-local, so the
/// packet is counted rather than silently excluded.
pub fn is_local_pair(src: &str, dst: &str) -> bool {
    is_local_str(src) && is_local_str(dst)
}

fn is_local_str(addr: &str) -> bool {
    addr.trim()
        .parse::<IpAddr>()
        .map(|ip| is_local_ip(&ip))
        .unwrap_or(false)
}

/// Returns true for addresses in private address space.
pub fn is_local_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_private_v4(v4),
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => is_private_v4(&v4),
            None => is_unique_local_v6(v6),
        },
    }
}

fn is_private_v4(ip: &Ipv4Addr) -> bool {
    let [a, b, ..] = ip.octets();
    a == 10 || (a == 172 && (b & 0xF0) == 16) || (a == 192 && b == 168)
}

fn is_unique_local_v6(ip: &Ipv6Addr) -> bool {
    (ip.segments()[0] & 0xFE00) == 0xFC00
}
