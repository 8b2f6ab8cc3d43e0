// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Packet header assembly — substitutes resolved addressing into a
//! materialized segment profile's templates and patches checksums,
//! mirroring `StreamStruct.set_packet_header` (§4.2.1).

use crate::address::AddressCollection;
use crate::checksum;
use crate::segment::{ProtocolSegmentProfile, SegmentType};

fn substitute_ethernet(bytes: &mut [u8], addresses: &AddressCollection) {
    bytes[0..6].copy_from_slice(&addresses.dmac);
    bytes[6..12].copy_from_slice(&addresses.smac);
}

fn substitute_ipv4(bytes: &mut [u8], addresses: &AddressCollection) {
    if let Some(src) = addresses.src_ipv4 {
        bytes[12..16].copy_from_slice(&src.octets());
    }
    if let Some(dst) = addresses.dst_ipv4 {
        bytes[16..20].copy_from_slice(&dst.octets());
    }
    checksum::patch_ipv4_checksum(bytes);
}

fn substitute_ipv6(bytes: &mut [u8], addresses: &AddressCollection) {
    if let Some(src) = addresses.src_ipv6 {
        bytes[8..24].copy_from_slice(&src.octets());
    }
    if let Some(dst) = addresses.dst_ipv6 {
        bytes[24..40].copy_from_slice(&dst.octets());
    }
}

/// Assembles the full packet header: concatenated segment templates
/// with addressing substituted in and checksums patched. TCP checksum
/// insertion is a hardware-only capability — software never computes
/// one, whether the segment is `Tcp` or the hardware-substituted
/// `TcpCheck` (§4.2.1; the only checksum kinds software patches are
/// IPv4, UDP and ICMP).
pub fn assemble(profile: &ProtocolSegmentProfile, addresses: &AddressCollection) -> Vec<u8> {
    let mut out = Vec::with_capacity(profile.packet_header_length());
    let mut ipv4_endpoints = None;

    for segment in &profile.segments {
        let mut bytes = segment.template.clone();
        match segment.segment_type {
            SegmentType::Ethernet => substitute_ethernet(&mut bytes, addresses),
            SegmentType::Ip => {
                substitute_ipv4(&mut bytes, addresses);
                if let (Some(src), Some(dst)) = (addresses.src_ipv4, addresses.dst_ipv4) {
                    ipv4_endpoints = Some((src.octets(), dst.octets()));
                }
            }
            SegmentType::Ipv6 => substitute_ipv6(&mut bytes, addresses),
            SegmentType::Udp => {
                if let Some((src, dst)) = ipv4_endpoints {
                    checksum::patch_udp_checksum(src, dst, &mut bytes);
                }
            }
            SegmentType::Tcp | SegmentType::TcpCheck | SegmentType::Vlan | SegmentType::Raw => {}
        }
        out.extend_from_slice(&bytes);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::HeaderSegment;
    use std::net::Ipv4Addr;

    fn profile() -> ProtocolSegmentProfile {
        let eth = HeaderSegment::new(SegmentType::Ethernet, vec![0u8; 14]);
        let ip = HeaderSegment::new(
            SegmentType::Ip,
            vec![
                0x45, 0x00, 0x00, 0x1c, 0x00, 0x00, 0x40, 0x00, 0x40, 0x11, 0x00, 0x00, 0x00,
                0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            ],
        );
        let udp = HeaderSegment::new(SegmentType::Udp, vec![0, 0, 0, 0, 0, 8, 0, 0]);
        ProtocolSegmentProfile::new("test", vec![eth, ip, udp])
    }

    fn addresses() -> AddressCollection {
        AddressCollection {
            smac: [1, 2, 3, 4, 5, 6],
            dmac: [6, 5, 4, 3, 2, 1],
            src_ipv4: Some(Ipv4Addr::new(10, 0, 0, 1)),
            dst_ipv4: Some(Ipv4Addr::new(10, 0, 0, 2)),
            src_ipv6: None,
            dst_ipv6: None,
        }
    }

    #[test]
    fn assembled_header_has_addresses_and_nonzero_checksums() {
        let mut p = profile();
        p.materialize().unwrap();
        let bytes = assemble(&p, &addresses());
        assert_eq!(bytes.len(), 14 + 20 + 8);
        assert_eq!(&bytes[0..6], &[6, 5, 4, 3, 2, 1]);
        assert_eq!(&bytes[6..12], &[1, 2, 3, 4, 5, 6]);
        assert_eq!(&bytes[14 + 12..14 + 16], &[10, 0, 0, 1]);
        assert_eq!(&bytes[14 + 16..14 + 20], &[10, 0, 0, 2]);
        let ip_checksum = &bytes[14 + 10..14 + 12];
        assert_ne!(ip_checksum, &[0, 0]);
    }
}
