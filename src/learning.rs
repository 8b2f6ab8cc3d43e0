// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! MAC learning and address-refresh scheduling (§4.5, §4.6).
//!
//! MAC learning sends a handful of broadcast frames so switches along
//! the path learn this port's MAC before a trial starts.
//! Address refresh periodically re-sends ARP requests / NDP neighbor
//! solicitations so peer MAC tables don't expire mid-run; tokens are
//! batched into bursts when the configured period would otherwise
//! require sub-[`MIN_REFRESH_TIMER_INTERNAL_MS`] spacing.

use std::net::{Ipv4Addr, Ipv6Addr};

use crate::config::MIN_REFRESH_TIMER_INTERNAL_MS;
use crate::error::{Error, Result};

const MAC_LEARNING_FRAME_LENGTH: usize = 128;

/// Builds the broadcast MAC-learning frame: all-ones destination, the
/// port's own MAC as source, a reserved EtherType, and zero padding out
/// to [`MAC_LEARNING_FRAME_LENGTH`] bytes.
pub fn mac_learning_frame(own_mac: [u8; 6], max_xmit_one_packet_length: usize) -> Result<Vec<u8>> {
    if MAC_LEARNING_FRAME_LENGTH > max_xmit_one_packet_length {
        return Err(Error::PacketLengthExceed {
            length: MAC_LEARNING_FRAME_LENGTH,
            max: max_xmit_one_packet_length,
        });
    }
    let mut frame = Vec::with_capacity(MAC_LEARNING_FRAME_LENGTH);
    frame.extend_from_slice(&[0xFF; 6]);
    frame.extend_from_slice(&own_mac);
    frame.extend_from_slice(&[0xFF, 0xFF]);
    frame.resize(MAC_LEARNING_FRAME_LENGTH, 0);
    Ok(frame)
}

/// Builds an IPv4 ARP request: who-has `target`, tell `sender`, from
/// `sender_mac`.
pub fn arp_request(sender_mac: [u8; 6], sender_ip: Ipv4Addr, target_ip: Ipv4Addr) -> Vec<u8> {
    let mut frame = Vec::with_capacity(28);
    frame.extend_from_slice(&[0x00, 0x01]); // HTYPE: Ethernet
    frame.extend_from_slice(&[0x08, 0x00]); // PTYPE: IPv4
    frame.push(6); // HLEN
    frame.push(4); // PLEN
    frame.extend_from_slice(&[0x00, 0x01]); // OPER: request
    frame.extend_from_slice(&sender_mac);
    frame.extend_from_slice(&sender_ip.octets());
    frame.extend_from_slice(&[0x00; 6]); // target MAC: unknown
    frame.extend_from_slice(&target_ip.octets());
    frame
}

/// Derives the IPv6 solicited-node multicast address for `target`
/// (`ff02::1:ffXX:XXXX`, the low 24 bits of `target`).
pub fn solicited_node_multicast(target: Ipv6Addr) -> Ipv6Addr {
    let octets = target.octets();
    Ipv6Addr::new(
        0xff02,
        0,
        0,
        0,
        0,
        0x0001,
        0xff00 | octets[13] as u16,
        u16::from_be_bytes([octets[14], octets[15]]),
    )
}

/// Derives the link-local IPv6 address for a MAC via the modified
/// EUI-64 transform: split the MAC, insert `fffe`, and flip the
/// universal/local bit in the first byte.
pub fn link_local_from_mac(mac: [u8; 6]) -> Ipv6Addr {
    let mut eui64 = [0u8; 8];
    eui64[0] = mac[0] | 0x02;
    eui64[1] = mac[1];
    eui64[2] = mac[2];
    eui64[3] = 0xff;
    eui64[4] = 0xfe;
    eui64[5] = mac[3];
    eui64[6] = mac[4];
    eui64[7] = mac[5];
    Ipv6Addr::new(
        0xfe80,
        0,
        0,
        0,
        u16::from_be_bytes([eui64[0], eui64[1]]),
        u16::from_be_bytes([eui64[2], eui64[3]]),
        u16::from_be_bytes([eui64[4], eui64[5]]),
        u16::from_be_bytes([eui64[6], eui64[7]]),
    )
}

/// Builds an IPv6 neighbor solicitation for `target`, from `own_mac`/
/// `own_ip` (source address; typically the port's link-local address).
pub fn neighbor_solicitation(own_mac: [u8; 6], own_ip: Ipv6Addr, target: Ipv6Addr) -> Vec<u8> {
    let mut frame = Vec::with_capacity(32);
    frame.push(135); // ICMPv6 type: neighbor solicitation
    frame.push(0); // code
    frame.extend_from_slice(&[0x00, 0x00]); // checksum: patched by caller
    frame.extend_from_slice(&[0x00; 4]); // reserved
    frame.extend_from_slice(&target.octets());
    frame.push(1); // option type: source link-layer address
    frame.push(1); // option length: 1 * 8 bytes
    frame.extend_from_slice(&own_mac);
    let _ = own_ip;
    frame
}

/// One address-refresh target: the (request-building) data needed to
/// re-announce this port's presence to one peer.
#[derive(Debug, Clone)]
pub enum RefreshToken {
    Arp {
        sender_mac: [u8; 6],
        sender_ip: Ipv4Addr,
        target_ip: Ipv4Addr,
    },
    Ndp {
        sender_mac: [u8; 6],
        sender_ip: Ipv6Addr,
        target_ip: Ipv6Addr,
    },
}

impl RefreshToken {
    pub fn to_frame(&self) -> Vec<u8> {
        match self {
            RefreshToken::Arp {
                sender_mac,
                sender_ip,
                target_ip,
            } => arp_request(*sender_mac, *sender_ip, *target_ip),
            RefreshToken::Ndp {
                sender_mac,
                sender_ip,
                target_ip,
            } => neighbor_solicitation(*sender_mac, *sender_ip, *target_ip),
        }
    }
}

/// Whether a token is still eligible to be refreshed given the
/// current run phase (§4.6): during L3 learning every token refreshes,
/// during the timed run only rx-only ports' tokens do (a tx port's own
/// MAC doesn't need to stay learned on its own egress switch).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshPhase {
    L3Learning,
    RunningTest,
}

/// Schedules address-refresh tokens into fixed-size batches fired at a
/// fixed interval, mirroring `AddressRefreshHandler` (§4.6).
#[derive(Debug, Clone)]
pub struct AddressRefreshHandler {
    tokens: Vec<(RefreshToken, bool)>, // (token, is_rx_only)
    cursor: usize,
    pub burst_size: usize,
    pub interval_ms: u64,
}

impl AddressRefreshHandler {
    /// Computes burst size/interval from a desired refresh `period`
    /// spread evenly over `token_count` tokens, with an
    /// [`MIN_REFRESH_TIMER_INTERNAL_MS`] floor — below that, tokens are
    /// grouped into larger bursts fired at the floor interval instead
    /// of being fired individually more often than the floor allows.
    pub fn new(tokens: Vec<(RefreshToken, bool)>, period_ms: u64) -> Self {
        let token_count = tokens.len().max(1) as u64;
        let mut interval_ms = period_ms / token_count;
        let mut burst_size = 1u64;
        if interval_ms < MIN_REFRESH_TIMER_INTERNAL_MS {
            burst_size = (MIN_REFRESH_TIMER_INTERNAL_MS + interval_ms.max(1) - 1) / interval_ms.max(1);
            interval_ms = MIN_REFRESH_TIMER_INTERNAL_MS;
        }
        Self {
            tokens,
            cursor: 0,
            burst_size: burst_size as usize,
            interval_ms,
        }
    }

    /// Returns the next `burst_size` tokens eligible under `phase`,
    /// advancing the circular cursor by `burst_size` regardless of how
    /// many were eligible (so the cursor always progresses).
    pub fn get_batch(&mut self, phase: RefreshPhase) -> Vec<RefreshToken> {
        if self.tokens.is_empty() {
            return Vec::new();
        }
        let mut batch = Vec::with_capacity(self.burst_size);
        for step in 0..self.burst_size {
            let index = (self.cursor + step) % self.tokens.len();
            let (token, is_rx_only) = &self.tokens[index];
            let eligible = phase == RefreshPhase::L3Learning || *is_rx_only;
            if eligible {
                batch.push(token.clone());
            }
        }
        self.cursor = (self.cursor + self.burst_size) % self.tokens.len();
        batch
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mac_learning_frame_is_128_bytes_with_own_mac_as_source() {
        let own_mac = [1, 2, 3, 4, 5, 6];
        let frame = mac_learning_frame(own_mac, 256).unwrap();
        assert_eq!(frame.len(), 128);
        assert_eq!(&frame[0..6], &[0xFF; 6]);
        assert_eq!(&frame[6..12], &own_mac);
    }

    #[test]
    fn mac_learning_frame_rejects_short_port_limit() {
        let result = mac_learning_frame([0; 6], 64);
        assert!(result.is_err());
    }

    #[test]
    fn solicited_node_multicast_uses_low_24_bits() {
        let target: Ipv6Addr = "2001:db8::1:2:3".parse().unwrap();
        let multicast = solicited_node_multicast(target);
        assert_eq!(multicast.octets()[0..2], [0xff, 0x02]);
        assert_eq!(multicast.octets()[13], target.octets()[13]);
        assert_eq!(multicast.octets()[14..16], target.octets()[14..16]);
    }

    #[test]
    fn link_local_sets_universal_local_bit() {
        let mac = [0x04, 0xf4, 0xbc, 0x11, 0x22, 0x33];
        let link_local = link_local_from_mac(mac);
        assert_eq!(link_local.segments()[0], 0xfe80);
        assert_eq!(link_local.octets()[8], 0x04 | 0x02);
    }

    fn sample_tokens() -> Vec<(RefreshToken, bool)> {
        (0..4)
            .map(|i| {
                (
                    RefreshToken::Arp {
                        sender_mac: [0; 6],
                        sender_ip: Ipv4Addr::new(10, 0, 0, 1),
                        target_ip: Ipv4Addr::new(10, 0, 0, 2 + i),
                    },
                    i % 2 == 0,
                )
            })
            .collect()
    }

    #[test]
    fn burst_size_grows_when_period_is_tight() {
        let handler = AddressRefreshHandler::new(sample_tokens(), 40);
        assert_eq!(handler.interval_ms, MIN_REFRESH_TIMER_INTERNAL_MS);
        assert!(handler.burst_size >= 1);
    }

    #[test]
    fn running_test_phase_only_refreshes_rx_only_tokens() {
        let mut handler = AddressRefreshHandler::new(sample_tokens(), 4000);
        handler.burst_size = 4;
        let batch = handler.get_batch(RefreshPhase::RunningTest);
        assert_eq!(batch.len(), 2);
    }

    #[test]
    fn cursor_advances_circularly() {
        let mut handler = AddressRefreshHandler::new(sample_tokens(), 4000);
        handler.burst_size = 3;
        let _ = handler.get_batch(RefreshPhase::L3Learning);
        assert_eq!(handler.cursor, 3);
        let _ = handler.get_batch(RefreshPhase::L3Learning);
        assert_eq!(handler.cursor, 2);
    }
}
