// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Port state — one test port's configuration, topology role, and
//! owned streams, layered on top of a driver [`PortHandle`].

use std::collections::HashSet;

use crate::config::PortConfiguration;
use crate::driver::PortHandle;
use crate::identity::PortIdentity;
use crate::stream::StreamStruct;

/// Runtime state assigned by the resource manager during
/// `resolve_port_relations` / the toggle-port-sync preamble — not part
/// of the caller-supplied configuration (§4.1).
#[derive(Debug, Clone, Default)]
pub struct PortProperties {
    /// Last polled PHY sync status; written by
    /// `add_toggle_port_sync_state_steps` and by `should_quit`'s
    /// per-iteration poll, read by `should_quit`'s loss-of-signal check
    /// (§4.1, §8 property 9).
    pub sync_status: bool,
    /// Set once a loss-of-signal warning has fired for the current
    /// false-sync episode, so `should_quit` warns only on the
    /// true->false transition rather than on every poll.
    pub los_warned: bool,
    pub traffic_status: bool,
    /// This port's index in the topology's tx/rx ordering; used by
    /// mesh topology to derive per-pair stream identities.
    pub test_port_index: usize,
    /// Indices into the resource manager's port list this port sends
    /// to or receives from, per the resolved topology.
    pub peers: Vec<usize>,
    pub arp_trunks: HashSet<std::net::Ipv4Addr>,
    pub ndp_trunks: HashSet<std::net::Ipv6Addr>,
}

/// One test port: its driver handle, desired configuration, resolved
/// topology role, owned streams, and accumulated statistics.
pub struct PortStruct<P: PortHandle> {
    pub identity: PortIdentity,
    pub handle: P,
    pub config: PortConfiguration,
    pub properties: PortProperties,
    pub streams: Vec<StreamStruct>,
}

impl<P: PortHandle> PortStruct<P> {
    pub fn new(identity: PortIdentity, handle: P, config: PortConfiguration) -> Self {
        Self {
            identity,
            handle,
            config,
            properties: PortProperties::default(),
            streams: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::mock::MockPort;
    use crate::driver::Capabilities;

    #[test]
    fn new_port_has_no_streams_and_default_properties() {
        let port = PortStruct::new(
            crate::identity::PortIdentity::new("chassis-a", 0, 0, "p0"),
            MockPort::new(Capabilities {
                can_tcp_checksum: true,
                max_xmit_one_packet_length: 128,
                supports_speed_reduction: true,
            }),
            PortConfiguration::default(),
        );
        assert!(port.streams.is_empty());
        assert!(!port.properties.sync_status);
        assert!(!port.properties.los_warned);
    }
}
