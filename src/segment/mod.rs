// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Protocol-Segment model — declarative packet-header segments, field
//! value ranges, and hardware modifier offsets.
//!
//! A [`ProtocolSegmentProfile`] is an ordered list of [`HeaderSegment`]s.
//! Each segment carries a template byte pattern plus the modifiers and
//! field-value-ranges that mutate it. [`ProtocolSegmentProfile::materialize`]
//! computes every segment's byte offset and, from it, every modifier's
//! and field-value-range's absolute position — this is the only place
//! those positions are written (§9 design note on the source's
//! self-referential `byte_offset` setter: we treat it as a plain
//! derived field, written once here).

pub mod field_range;
pub mod modifier;

pub use field_range::FieldValueRange;
pub use modifier::{HwModifier, ModifierAction};

use crate::error::Result;

/// Closed set of segment kinds. Routing on segment kind (e.g.
/// `is_raw`, `is_tcp`) is a pure function over this tag — §9 design
/// note on polymorphism over "segment" variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentType {
    Ethernet,
    Vlan,
    Ip,
    Ipv6,
    Udp,
    Tcp,
    /// TCP with hardware checksum insertion — substituted for `Tcp` at
    /// header-assembly time when the port declares the capability
    /// (§4.2.1).
    TcpCheck,
    Raw,
}

impl SegmentType {
    pub fn is_raw(self) -> bool {
        matches!(self, SegmentType::Raw)
    }
    pub fn is_tcp(self) -> bool {
        matches!(self, SegmentType::Tcp)
    }
    pub fn is_ip(self) -> bool {
        matches!(self, SegmentType::Ip)
    }
    pub fn is_ipv6(self) -> bool {
        matches!(self, SegmentType::Ipv6)
    }
    pub fn is_udp(self) -> bool {
        matches!(self, SegmentType::Udp)
    }
}

/// Known field layout within one segment kind. Looked up by field name
/// when materializing modifiers and field-value-ranges; `Raw` segments
/// have no known fields (modifiers/ranges on raw segments must supply
/// their own offsets directly and are not validated here).
#[derive(Debug, Clone, Copy)]
pub struct FieldDefinition {
    pub byte_offset: u32,
    pub bit_offset: u32,
    pub bit_length: u32,
}

/// Static field tables for the segment kinds the design names.
fn field_definition(segment_type: SegmentType, field_name: &str) -> Option<FieldDefinition> {
    let table: &[(&str, FieldDefinition)] = match segment_type {
        SegmentType::Ethernet => &[
            (
                "Dst MAC addr",
                FieldDefinition {
                    byte_offset: 0,
                    bit_offset: 0,
                    bit_length: 48,
                },
            ),
            (
                "Src MAC addr",
                FieldDefinition {
                    byte_offset: 6,
                    bit_offset: 0,
                    bit_length: 48,
                },
            ),
            (
                "EtherType",
                FieldDefinition {
                    byte_offset: 12,
                    bit_offset: 0,
                    bit_length: 16,
                },
            ),
        ],
        SegmentType::Vlan => &[(
            "VLAN ID",
            FieldDefinition {
                byte_offset: 0,
                bit_offset: 4,
                bit_length: 12,
            },
        )],
        SegmentType::Ip => &[
            (
                "Identification",
                FieldDefinition {
                    byte_offset: 4,
                    bit_offset: 0,
                    bit_length: 16,
                },
            ),
            (
                "TTL",
                FieldDefinition {
                    byte_offset: 8,
                    bit_offset: 0,
                    bit_length: 8,
                },
            ),
            (
                "Protocol",
                FieldDefinition {
                    byte_offset: 9,
                    bit_offset: 0,
                    bit_length: 8,
                },
            ),
            (
                "Src IP Addr",
                FieldDefinition {
                    byte_offset: 12,
                    bit_offset: 0,
                    bit_length: 32,
                },
            ),
            (
                "Dest IP Addr",
                FieldDefinition {
                    byte_offset: 16,
                    bit_offset: 0,
                    bit_length: 32,
                },
            ),
        ],
        SegmentType::Ipv6 => &[
            (
                "Src IPv6 Addr",
                FieldDefinition {
                    byte_offset: 8,
                    bit_offset: 0,
                    bit_length: 128,
                },
            ),
            (
                "Dest IPv6 Addr",
                FieldDefinition {
                    byte_offset: 24,
                    bit_offset: 0,
                    bit_length: 128,
                },
            ),
        ],
        SegmentType::Udp => &[
            (
                "Src Port",
                FieldDefinition {
                    byte_offset: 0,
                    bit_offset: 0,
                    bit_length: 16,
                },
            ),
            (
                "Dst Port",
                FieldDefinition {
                    byte_offset: 2,
                    bit_offset: 0,
                    bit_length: 16,
                },
            ),
        ],
        SegmentType::Tcp | SegmentType::TcpCheck => &[
            (
                "Src Port",
                FieldDefinition {
                    byte_offset: 0,
                    bit_offset: 0,
                    bit_length: 16,
                },
            ),
            (
                "Dst Port",
                FieldDefinition {
                    byte_offset: 2,
                    bit_offset: 0,
                    bit_length: 16,
                },
            ),
            (
                "Sequence Number",
                FieldDefinition {
                    byte_offset: 4,
                    bit_offset: 0,
                    bit_length: 32,
                },
            ),
        ],
        SegmentType::Raw => &[],
    };
    table
        .iter()
        .find(|(name, _)| *name == field_name)
        .map(|(_, def)| *def)
}

/// One segment in a [`ProtocolSegmentProfile`]: a template byte pattern
/// plus the modifiers/ranges that mutate it.
#[derive(Debug, Clone)]
pub struct HeaderSegment {
    pub segment_type: SegmentType,
    /// Template bytes for this segment (before AddressCollection
    /// substitution or checksumming).
    pub template: Vec<u8>,
    pub hw_modifiers: Vec<HwModifier>,
    pub field_value_ranges: Vec<FieldValueRange>,
    /// Byte offset of this segment within the concatenated header.
    /// Written once by `ProtocolSegmentProfile::materialize`.
    pub segment_byte_offset: usize,
}

impl HeaderSegment {
    pub fn new(segment_type: SegmentType, template: Vec<u8>) -> Self {
        Self {
            segment_type,
            template,
            hw_modifiers: Vec::new(),
            field_value_ranges: Vec::new(),
            segment_byte_offset: 0,
        }
    }
}

/// Ordered sequence of [`HeaderSegment`]s describing one port's flow
/// header. Once materialized, every offset/position the stream engine
/// needs is precomputed and stable for the run.
#[derive(Debug, Clone, Default)]
pub struct ProtocolSegmentProfile {
    pub description: String,
    pub segments: Vec<HeaderSegment>,
}

impl ProtocolSegmentProfile {
    pub fn new(description: impl Into<String>, segments: Vec<HeaderSegment>) -> Self {
        Self {
            description: description.into(),
            segments,
        }
    }

    /// Computes `segment_byte_offset` for each segment, then every
    /// modifier's `position`/`byte_offset` and every field-value-range's
    /// `position_bits`/`bit_offset`/`bit_length` — §8 property 1 — and
    /// validates every field-value-range's bounds — §8 property 2.
    pub fn materialize(&mut self) -> Result<()> {
        let mut offset = 0usize;
        for segment in &mut self.segments {
            segment.segment_byte_offset = offset;
            let segment_type = segment.segment_type;

            for modifier in &mut segment.hw_modifiers {
                if let Some(def) = field_definition(segment_type, &modifier.field_name) {
                    modifier.byte_offset = def.byte_offset;
                }
                modifier.position = offset as u32 + modifier.byte_offset;
                if modifier.field_name == "Src IP Addr" || modifier.field_name == "Dest IP Addr" {
                    modifier.position = (modifier.position as i64 + modifier.offset) as u32;
                }
            }

            for fvr in &mut segment.field_value_ranges {
                if let Some(def) = field_definition(segment_type, &fvr.field_name) {
                    fvr.bit_length = def.bit_length;
                    fvr.bit_offset = def.bit_offset;
                }
                fvr.position_bits = offset as u64 * 8 + fvr.bit_offset as u64;
                fvr.check_bounds()?;
            }

            offset += segment.template.len();
        }
        Ok(())
    }

    pub fn modifier_count(&self) -> usize {
        self.segments.iter().map(|s| s.hw_modifiers.len()).sum()
    }

    pub fn packet_header_length(&self) -> usize {
        self.segments.iter().map(|s| s.template.len()).sum()
    }

    pub fn segment_type_list(&self) -> Vec<SegmentType> {
        self.segments.iter().map(|s| s.segment_type).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eth_ip_udp() -> ProtocolSegmentProfile {
        let eth = HeaderSegment::new(SegmentType::Ethernet, vec![0u8; 14]);
        let ip = HeaderSegment::new(SegmentType::Ip, vec![0u8; 20]);
        let udp = HeaderSegment::new(SegmentType::Udp, vec![0u8; 8]);
        ProtocolSegmentProfile::new("eth/ip/udp", vec![eth, ip, udp])
    }

    #[test]
    fn segment_offsets_are_cumulative() {
        let mut profile = eth_ip_udp();
        profile.materialize().unwrap();
        assert_eq!(profile.segments[0].segment_byte_offset, 0);
        assert_eq!(profile.segments[1].segment_byte_offset, 14);
        assert_eq!(profile.segments[2].segment_byte_offset, 34);
    }

    #[test]
    fn modifier_position_includes_segment_offset_and_address_fine_offset() {
        let mut profile = eth_ip_udp();
        let mut m = HwModifier::new("Dest IP Addr", "0xFF", ModifierAction::Inc, 0, 9);
        m.offset = 3;
        profile.segments[1].hw_modifiers.push(m);
        profile.materialize().unwrap();
        let programmed = &profile.segments[1].hw_modifiers[0];
        // segment offset 14 + field byte_offset 16 + fine offset 3 = 33
        assert_eq!(programmed.position, 33);
    }

    #[test]
    fn field_value_range_position_bits() {
        let mut profile = eth_ip_udp();
        profile.segments[2]
            .field_value_ranges
            .push(FieldValueRange::new(
                "Dst Port",
                1024,
                2048,
                1,
                ModifierAction::Inc,
                false,
            ));
        profile.materialize().unwrap();
        let fvr = &profile.segments[2].field_value_ranges[0];
        // segment offset 34 * 8 + bit_offset 0 = 272
        assert_eq!(fvr.position_bits, 272);
    }

    #[test]
    fn oversized_range_is_rejected() {
        let mut profile = eth_ip_udp();
        profile.segments[2]
            .field_value_ranges
            .push(FieldValueRange::new(
                "Dst Port", 0, 70000, 1, ModifierAction::Inc, false,
            ));
        assert!(profile.materialize().is_err());
    }
}
