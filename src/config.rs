// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Global configuration — test-wide and per-port descriptors, plus the
//! timing constants the rest of the crate is built against.
//!
//! # Architecture
//!
//! - **Level 1 (static)**: timing/protocol constants fixed by the design.
//! - **Level 2 (descriptors)**: [`TestConfiguration`] and
//!   [`PortConfiguration`], built once by the caller and treated as
//!   immutable for the duration of a run.
//!
//! **Never hardcode these constants elsewhere** — `ResourceManager` and
//! `learning` both read from here.

use std::time::Duration;

// =======================================================================
// Timing constants
// =======================================================================

/// Delay observed after issuing `stop_traffic` during `init_resource`,
/// before ports are configured.
pub const DELAY_STOPPED_TRAFFIC: Duration = Duration::from_millis(500);

/// Poll interval while waiting for all ports to report `sync_status`
/// during the toggle-port-sync preamble.
pub const DELAY_CHECK_SYNC: Duration = Duration::from_millis(100);

/// Settle delay after `clear_statistic`.
pub const DELAY_CLEAR_STATISTICS: Duration = Duration::from_millis(200);

/// Bound on the toggle-port-sync preamble's `WAIT_SYNC` state.
pub const SYNC_TIMEOUT: Duration = Duration::from_secs(30);

/// Guard added to `actual_duration` in `should_quit`'s elapsed-time check.
pub const QUIT_DURATION_GUARD: Duration = Duration::from_secs(5);

/// Offset added to each chassis's local clock when scheduling a
/// multi-chassis synchronized traffic start.
pub const START_TRAFFIC_SYNC_DELTA: Duration = Duration::from_secs(2);

/// Floor on the address-refresh scheduler's per-token interval; below
/// this, tokens are sent in bursts instead of one-at-a-time.
pub const MIN_REFRESH_TIMER_INTERNAL_MS: u64 = 100;

/// Interval between successive MAC-learning broadcast frames on a port.
pub const MAC_LEARNING_FRAME_INTERVAL: Duration = Duration::from_secs(1);

// =======================================================================
// Topology & frame-size policy
// =======================================================================

/// How tx ports are paired with rx ports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topology {
    /// Every tx-capable port sends to every other tx-capable port.
    Mesh,
    /// Ports are paired up in configuration order.
    Pair,
    /// Ports are partitioned into east/west groups; every east port
    /// talks to every west port and vice versa.
    Blocks,
}

impl Topology {
    pub fn is_mesh(self) -> bool {
        matches!(self, Topology::Mesh)
    }
    pub fn is_pair(self) -> bool {
        matches!(self, Topology::Pair)
    }
}

/// East/west partition tag used by non-mesh topologies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Group {
    East,
    West,
    Undefined,
}

impl Group {
    pub fn is_east(self) -> bool {
        matches!(self, Group::East)
    }
    pub fn is_west(self) -> bool {
        matches!(self, Group::West)
    }
}

/// Fixed, ranged, or swept frame-size policy for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameSizePolicy {
    Fixed,
    Range,
    Mixed,
}

impl FrameSizePolicy {
    pub fn is_fixed(self) -> bool {
        matches!(self, FrameSizePolicy::Fixed)
    }
}

/// When MAC-learning bursts are fired during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacLearningMode {
    Never,
    Once,
    EveryTrial,
}

/// Whether one hardware stream models one flow, or one stream models
/// many logical flows via a destination-MAC modifier (§4.2.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowCreationType {
    StreamBased,
    ModifierBased,
}

impl FlowCreationType {
    pub fn is_stream_based(self) -> bool {
        matches!(self, FlowCreationType::StreamBased)
    }
}

/// Port-sync toggle preamble configuration (§4.1 state machine).
#[derive(Debug, Clone, Copy)]
pub struct TogglePortSyncConfig {
    pub toggle_port_sync: bool,
    pub sync_off_duration: Duration,
    pub delay_after_sync_on: Duration,
}

impl Default for TogglePortSyncConfig {
    fn default() -> Self {
        Self {
            toggle_port_sync: false,
            sync_off_duration: Duration::from_secs(1),
            delay_after_sync_on: Duration::from_millis(0),
        }
    }
}

/// Global, run-wide knobs. Immutable once a run starts.
#[derive(Debug, Clone)]
pub struct TestConfiguration {
    pub topology: Topology,
    pub frame_size_policy: FrameSizePolicy,
    pub mac_base_address: [u8; 6],
    pub payload_pattern: Vec<u8>,
    pub arp_refresh_enabled: bool,
    pub arp_refresh_period: Duration,
    pub mac_learning_mode: MacLearningMode,
    pub mac_learning_frame_count: u32,
    pub use_gateway_mac_as_dmac: bool,
    pub flow_creation_type: FlowCreationType,
    pub learning_rate_pct: u32,
    pub learning_duration: Duration,
    pub toggle_port_sync: TogglePortSyncConfig,
    pub stop_on_los: bool,
    pub enable_speed_reduction_sweep: bool,
    /// Number of logical flows encoded per tx stream under
    /// modifier-based flow creation; sizes the synthetic `Dst MAC addr`
    /// modifier's range.
    pub multi_stream_number: u32,
}

impl Default for TestConfiguration {
    fn default() -> Self {
        Self {
            topology: Topology::Mesh,
            frame_size_policy: FrameSizePolicy::Fixed,
            mac_base_address: [0x04, 0xf4, 0xbc, 0x00, 0x00, 0x00],
            payload_pattern: vec![0u8; 4],
            arp_refresh_enabled: false,
            arp_refresh_period: Duration::from_secs(1),
            mac_learning_mode: MacLearningMode::Once,
            mac_learning_frame_count: 1,
            use_gateway_mac_as_dmac: false,
            flow_creation_type: FlowCreationType::StreamBased,
            learning_rate_pct: 10,
            learning_duration: Duration::from_secs(1),
            toggle_port_sync: TogglePortSyncConfig::default(),
            stop_on_los: false,
            enable_speed_reduction_sweep: false,
            multi_stream_number: 1,
        }
    }
}

/// IPv4/IPv6 address properties attached to a port.
#[derive(Debug, Clone, Default)]
pub struct IpProperties {
    pub address: Option<std::net::IpAddr>,
    pub gateway: Option<std::net::IpAddr>,
    /// Network block the port's per-stream offsets are drawn from.
    pub network: Vec<std::net::IpAddr>,
    pub gateway_mac: Option<[u8; 6]>,
}

/// Per-port desired state, immutable for the duration of a run.
#[derive(Debug, Clone)]
pub struct PortConfiguration {
    pub is_tx: bool,
    pub is_rx: bool,
    pub group: Group,
    pub ipv4: IpProperties,
    pub ipv6: IpProperties,
    pub inter_frame_gap: u32,
    /// Assigned by `setup_sweep_reduction`; consumed by the driver.
    pub port_speed_reduction_ppm: Option<u32>,
    pub comment: Option<String>,
    /// True when the underlying module is a Chimera impairment module,
    /// which `collect_control_ports` rejects — it isn't a traffic-
    /// generating L23 port.
    pub is_chimera: bool,
}

impl Default for PortConfiguration {
    fn default() -> Self {
        Self {
            is_tx: true,
            is_rx: true,
            group: Group::Undefined,
            ipv4: IpProperties::default(),
            ipv6: IpProperties::default(),
            inter_frame_gap: 20,
            port_speed_reduction_ppm: None,
            comment: None,
            is_chimera: false,
        }
    }
}
