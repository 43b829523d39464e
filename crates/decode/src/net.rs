use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Decodes a 16 byte address slot. IPv4 addresses are stored either in the
/// first four bytes with the rest zeroed or as IPv4-mapped IPv6. An all-zero
/// slot means nothing was captured.
pub fn ip_from_bytes(raw: [u8; 16]) -> Option<IpAddr> {
    if raw.iter().all(|b| *b == 0) {
        return None;
    }
    if raw[4..].iter().all(|b| *b == 0) {
        return Some(IpAddr::V4(Ipv4Addr::new(raw[0], raw[1], raw[2], raw[3])));
    }

    let v6 = Ipv6Addr::from(raw);
    Some(match v6.to_ipv4_mapped() {
        Some(v4) => IpAddr::V4(v4),
        None => IpAddr::V6(v6),
    })
}
