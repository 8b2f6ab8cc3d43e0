// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Address resolution — derives the src/dst MAC and IP addresses baked
//! into a stream's packet header, either from a per-port offset into a
//! shared network block (modifier-based flow creation) or from the
//! peer's configured address (stream-based flow creation), mirroring
//! `get_address_collection` (§4.2.2, §4.3).

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use crate::config::PortConfiguration;

/// Resolved addressing for one stream's packet header.
#[derive(Debug, Clone, Default)]
pub struct AddressCollection {
    pub smac: [u8; 6],
    pub dmac: [u8; 6],
    pub src_ipv4: Option<Ipv4Addr>,
    pub dst_ipv4: Option<Ipv4Addr>,
    pub src_ipv6: Option<Ipv6Addr>,
    pub dst_ipv6: Option<Ipv6Addr>,
}

/// Per-flow offset used under modifier-based flow creation: the same
/// tx stream carries `multi_stream_number` logical flows, each numbered
/// by this offset into the shared `mac_base_address`/network block.
#[derive(Debug, Clone, Copy, Default)]
pub struct StreamOffset {
    pub tx_offset: u32,
    pub rx_offset: u32,
}

fn mac_plus_offset(base: [u8; 6], offset: u32) -> [u8; 6] {
    let mut value = u64::from_be_bytes([0, 0, base[0], base[1], base[2], base[3], base[4], base[5]]);
    value += offset as u64;
    let bytes = value.to_be_bytes();
    [bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7]]
}

fn ipv4_plus_offset(base: Ipv4Addr, offset: u32) -> Ipv4Addr {
    Ipv4Addr::from(u32::from(base).wrapping_add(offset))
}

fn ipv6_plus_offset(base: Ipv6Addr, offset: u32) -> Ipv6Addr {
    let mut segments = base.segments();
    let low = (segments[6] as u32) << 16 | segments[7] as u32;
    let low = low.wrapping_add(offset);
    segments[6] = (low >> 16) as u16;
    segments[7] = low as u16;
    Ipv6Addr::from(segments)
}

fn first_ipv4(network: &[IpAddr]) -> Option<Ipv4Addr> {
    network.iter().find_map(|addr| match addr {
        IpAddr::V4(v4) => Some(*v4),
        IpAddr::V6(_) => None,
    })
}

fn first_ipv6(network: &[IpAddr]) -> Option<Ipv6Addr> {
    network.iter().find_map(|addr| match addr {
        IpAddr::V6(v6) => Some(*v6),
        IpAddr::V4(_) => None,
    })
}

/// Derives addressing from a shared `mac_base_address` and each port's
/// network block plus a per-flow offset — used under modifier-based
/// flow creation, where many logical flows share one hardware stream.
pub fn from_stream_offset(
    mac_base_address: [u8; 6],
    own: &PortConfiguration,
    peer: &PortConfiguration,
    offset: StreamOffset,
) -> AddressCollection {
    let smac = mac_plus_offset(mac_base_address, offset.tx_offset);
    let dmac = mac_plus_offset(mac_base_address, offset.rx_offset);

    let src_ipv4 = first_ipv4(&own.ipv4.network).map(|net| ipv4_plus_offset(net, offset.tx_offset));
    let dst_ipv4 = first_ipv4(&peer.ipv4.network).map(|net| ipv4_plus_offset(net, offset.rx_offset));
    let src_ipv6 = first_ipv6(&own.ipv6.network).map(|net| ipv6_plus_offset(net, offset.tx_offset));
    let dst_ipv6 = first_ipv6(&peer.ipv6.network).map(|net| ipv6_plus_offset(net, offset.rx_offset));

    AddressCollection {
        smac,
        dmac,
        src_ipv4,
        dst_ipv4,
        src_ipv6,
        dst_ipv6,
    }
}

/// Derives addressing from the port's own and its peer's directly
/// configured addresses — used under stream-based flow creation, one
/// hardware stream per logical flow. When `use_gateway_mac_as_dmac` is
/// set and the own port has a learned gateway MAC, that MAC is used in
/// place of the peer's own MAC (routed topology).
pub fn from_configured_addresses(
    own_mac: [u8; 6],
    own: &PortConfiguration,
    peer_mac: [u8; 6],
    peer: &PortConfiguration,
    use_gateway_mac_as_dmac: bool,
) -> AddressCollection {
    let dmac = if use_gateway_mac_as_dmac {
        own.ipv4
            .gateway_mac
            .or(own.ipv6.gateway_mac)
            .unwrap_or(peer_mac)
    } else {
        peer_mac
    };

    let src_ipv4 = match own.ipv4.address {
        Some(IpAddr::V4(v4)) => Some(v4),
        _ => None,
    };
    let dst_ipv4 = match peer.ipv4.address {
        Some(IpAddr::V4(v4)) => Some(v4),
        _ => None,
    };
    let src_ipv6 = match own.ipv6.address {
        Some(IpAddr::V6(v6)) => Some(v6),
        _ => None,
    };
    let dst_ipv6 = match peer.ipv6.address {
        Some(IpAddr::V6(v6)) => Some(v6),
        _ => None,
    };

    AddressCollection {
        smac: own_mac,
        dmac,
        src_ipv4,
        dst_ipv4,
        src_ipv6,
        dst_ipv6,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IpProperties;

    fn port_with_ipv4_network(base: &str) -> PortConfiguration {
        let mut port = PortConfiguration::default();
        port.ipv4 = IpProperties {
            network: vec![base.parse::<Ipv4Addr>().unwrap().into()],
            ..IpProperties::default()
        };
        port
    }

    #[test]
    fn stream_offset_addresses_are_distinct_per_flow() {
        let tx = port_with_ipv4_network("10.0.0.0");
        let rx = port_with_ipv4_network("10.0.1.0");
        let mac_base = [0x04, 0xf4, 0xbc, 0x00, 0x00, 0x00];

        let flow0 = from_stream_offset(mac_base, &tx, &rx, StreamOffset { tx_offset: 0, rx_offset: 0 });
        let flow1 = from_stream_offset(mac_base, &tx, &rx, StreamOffset { tx_offset: 1, rx_offset: 1 });

        assert_ne!(flow0.smac, flow1.smac);
        assert_eq!(flow0.src_ipv4.unwrap(), "10.0.0.0".parse::<Ipv4Addr>().unwrap());
        assert_eq!(flow1.src_ipv4.unwrap(), "10.0.0.1".parse::<Ipv4Addr>().unwrap());
        assert_eq!(flow1.dst_ipv4.unwrap(), "10.0.1.1".parse::<Ipv4Addr>().unwrap());
    }

    #[test]
    fn configured_addresses_use_gateway_mac_when_requested() {
        let mut own = PortConfiguration::default();
        own.ipv4.gateway_mac = Some([0xaa; 6]);
        let peer = PortConfiguration::default();

        let resolved = from_configured_addresses([1; 6], &own, [2; 6], &peer, true);
        assert_eq!(resolved.dmac, [0xaa; 6]);

        let resolved = from_configured_addresses([1; 6], &own, [2; 6], &peer, false);
        assert_eq!(resolved.dmac, [2; 6]);
    }
}
