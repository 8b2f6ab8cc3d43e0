// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Driver interface — the boundary between this crate and whatever
//! owns the actual chassis/module/port RPC link.
//!
//! # Architecture
//!
//! ```text
//! ChassisHandle            PortHandle
//! +-- time()                +-- statistics()
//! +-- set_traffic()          +-- set_stream()
//! +-- schedule_traffic_sync()+-- remove_stream()
//!                            +-- transmit_one()
//!                            +-- program_header()
//!                            +-- capabilities()
//! ```
//!
//! Implementations talk to real hardware; [`mock`] is an in-memory
//! stand-in used by this crate's own integration tests.

use std::future::Future;
use std::time::Duration;

use crate::error::Result;
use crate::stream::PRStatistic;

/// Per-port capability flags the resource manager and stream engine
/// consult before programming a flow (§4.2.1, §6).
#[derive(Debug, Clone, Copy)]
pub struct Capabilities {
    pub can_tcp_checksum: bool,
    pub max_xmit_one_packet_length: usize,
    pub supports_speed_reduction: bool,
}

/// One chassis's control-plane operations: clock and traffic
/// start/stop across every port it owns. `set_traffic`/
/// `schedule_traffic_sync` take the `(module_index, port_index)` list
/// the command is scoped to (§6: `traffic.set(on|off, [module_port…])`)
/// rather than applying chassis-wide, so a single-chassis atomic start
/// can be limited to the ports actually under test.
pub trait ChassisHandle: Send + Sync {
    /// Chassis-local monotonic clock, used to compute the
    /// scheduled-start delta for multi-chassis synchronized traffic.
    fn time(&self) -> impl Future<Output = Result<Duration>> + Send;

    /// Starts or stops traffic on the given `(module, port)` list,
    /// atomically (single-chassis synced start, §4.1).
    fn set_traffic(&self, on: bool, ports: &[(u16, u16)]) -> impl Future<Output = Result<()>> + Send;

    /// Schedules a synchronized traffic start at `at` (chassis-local
    /// time) for the given `(module, port)` list — multi-chassis
    /// synced start (§4.1).
    fn schedule_traffic_sync(&self, at: Duration, ports: &[(u16, u16)]) -> impl Future<Output = Result<()>> + Send;
}

/// One port's control-plane operations.
pub trait PortHandle: Send + Sync {
    fn capabilities(&self) -> Capabilities;

    fn sync_status(&self) -> impl Future<Output = Result<bool>> + Send;
    fn traffic_status(&self) -> impl Future<Output = Result<bool>> + Send;
    fn loss_of_signal(&self) -> impl Future<Output = Result<bool>> + Send;

    /// Starts or stops traffic on this port alone (unsynced per-port
    /// start, §4.1).
    fn set_traffic(&self, on: bool) -> impl Future<Output = Result<()>> + Send;

    fn clear_statistics(&self) -> impl Future<Output = Result<()>> + Send;
    fn query_statistics(&self) -> impl Future<Output = Result<PRStatistic>> + Send;

    /// Programs the packet header bytes and modifier table for a
    /// stream (§4.2.1).
    fn program_header(&self, stream_id: u32, header: &[u8]) -> impl Future<Output = Result<()>> + Send;

    fn create_stream(&self) -> impl Future<Output = Result<u32>> + Send;
    fn remove_stream(&self, stream_id: u32) -> impl Future<Output = Result<()>> + Send;

    /// Transmits exactly one raw frame, independent of any programmed
    /// stream — used for MAC learning and address-refresh bursts
    /// (§4.5, §4.6).
    fn transmit_one(&self, frame: &[u8]) -> impl Future<Output = Result<()>> + Send;

    fn set_rate_pct(&self, rate_pct: f64) -> impl Future<Output = Result<()>> + Send;
    fn set_tx_time_limit(&self, limit: Duration) -> impl Future<Output = Result<()>> + Send;

    /// Sets the burst/frame cap for one specific stream (back-to-back
    /// convergence, and the plain `set_frame_limit` fan-out) — scoped
    /// per-stream rather than per-port, since one port can host several
    /// streams with independent limits (§4.1).
    fn set_frame_limit(&self, stream_id: u32, frames: u64) -> impl Future<Output = Result<()>> + Send;
}

#[cfg(any(test, feature = "test-util"))]
pub mod mock {
    //! In-memory chassis/port stand-ins used only by this crate's own
    //! tests — never shipped against real hardware.

    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct Inner {
        synced: AtomicBool,
        running: AtomicBool,
        los: AtomicBool,
        next_stream_id: AtomicU32,
        headers: Mutex<std::collections::HashMap<u32, Vec<u8>>>,
        tx_frames: AtomicU32,
        rx_frames: AtomicU32,
    }

    #[derive(Clone, Default)]
    pub struct MockPort {
        inner: Arc<Inner>,
        caps: Capabilities,
    }

    impl MockPort {
        pub fn new(caps: Capabilities) -> Self {
            Self {
                inner: Arc::new(Inner::default()),
                caps,
            }
        }

        pub fn set_synced(&self, synced: bool) {
            self.inner.synced.store(synced, Ordering::SeqCst);
        }

        pub fn set_loss_of_signal(&self, los: bool) {
            self.inner.los.store(los, Ordering::SeqCst);
        }

        pub fn deliver_rx(&self, frames: u32) {
            self.inner.rx_frames.fetch_add(frames, Ordering::SeqCst);
        }

        pub fn tx_frame_count(&self) -> u32 {
            self.inner.tx_frames.load(Ordering::SeqCst)
        }
    }

    impl Default for Capabilities {
        fn default() -> Self {
            Self {
                can_tcp_checksum: true,
                max_xmit_one_packet_length: 128,
                supports_speed_reduction: true,
            }
        }
    }

    impl PortHandle for MockPort {
        fn capabilities(&self) -> Capabilities {
            self.caps
        }

        fn sync_status(&self) -> impl Future<Output = Result<bool>> + Send {
            let synced = self.inner.synced.load(Ordering::SeqCst);
            async move { Ok(synced) }
        }

        fn traffic_status(&self) -> impl Future<Output = Result<bool>> + Send {
            let running = self.inner.running.load(Ordering::SeqCst);
            async move { Ok(running) }
        }

        fn loss_of_signal(&self) -> impl Future<Output = Result<bool>> + Send {
            let los = self.inner.los.load(Ordering::SeqCst);
            async move { Ok(los) }
        }

        fn set_traffic(&self, on: bool) -> impl Future<Output = Result<()>> + Send {
            self.inner.running.store(on, Ordering::SeqCst);
            if on {
                self.inner.tx_frames.fetch_add(1, Ordering::SeqCst);
            }
            async move { Ok(()) }
        }

        fn clear_statistics(&self) -> impl Future<Output = Result<()>> + Send {
            self.inner.tx_frames.store(0, Ordering::SeqCst);
            self.inner.rx_frames.store(0, Ordering::SeqCst);
            async move { Ok(()) }
        }

        fn query_statistics(&self) -> impl Future<Output = Result<PRStatistic>> + Send {
            let tx = self.inner.tx_frames.load(Ordering::SeqCst) as u64;
            let rx = self.inner.rx_frames.load(Ordering::SeqCst) as u64;
            async move {
                Ok(PRStatistic {
                    tx_frames: tx,
                    rx_frames: rx,
                    fcs_errors: 0,
                    loss_frames: tx.saturating_sub(rx),
                    min_latency_ns: 0,
                    max_latency_ns: 0,
                    avg_latency_ns: 0,
                    jitter_ns: 0,
                })
            }
        }

        fn program_header(&self, stream_id: u32, header: &[u8]) -> impl Future<Output = Result<()>> + Send {
            self.inner.headers.lock().insert(stream_id, header.to_vec());
            async move { Ok(()) }
        }

        fn create_stream(&self) -> impl Future<Output = Result<u32>> + Send {
            let id = self.inner.next_stream_id.fetch_add(1, Ordering::SeqCst);
            async move { Ok(id) }
        }

        fn remove_stream(&self, stream_id: u32) -> impl Future<Output = Result<()>> + Send {
            self.inner.headers.lock().remove(&stream_id);
            async move { Ok(()) }
        }

        fn transmit_one(&self, frame: &[u8]) -> impl Future<Output = Result<()>> + Send {
            let too_long = frame.len() > self.caps.max_xmit_one_packet_length;
            let length = frame.len();
            let max = self.caps.max_xmit_one_packet_length;
            self.inner.tx_frames.fetch_add(1, Ordering::SeqCst);
            async move {
                if too_long {
                    return Err(crate::error::Error::PacketLengthExceed { length, max });
                }
                Ok(())
            }
        }

        fn set_rate_pct(&self, _rate_pct: f64) -> impl Future<Output = Result<()>> + Send {
            async move { Ok(()) }
        }

        fn set_tx_time_limit(&self, _limit: Duration) -> impl Future<Output = Result<()>> + Send {
            async move { Ok(()) }
        }

        fn set_frame_limit(&self, _stream_id: u32, _frames: u64) -> impl Future<Output = Result<()>> + Send {
            async move { Ok(()) }
        }
    }

    #[derive(Clone, Default)]
    pub struct MockChassis {
        synced_calls: Arc<Mutex<Vec<(Duration, Vec<(u16, u16)>)>>>,
        set_traffic_calls: Arc<Mutex<Vec<(bool, Vec<(u16, u16)>)>>>,
    }

    impl MockChassis {
        pub fn synced_start_calls(&self) -> Vec<(Duration, Vec<(u16, u16)>)> {
            self.synced_calls.lock().clone()
        }

        pub fn set_traffic_calls(&self) -> Vec<(bool, Vec<(u16, u16)>)> {
            self.set_traffic_calls.lock().clone()
        }
    }

    impl ChassisHandle for MockChassis {
        fn time(&self) -> impl Future<Output = Result<Duration>> + Send {
            async move { Ok(Duration::from_secs(0)) }
        }

        fn set_traffic(&self, on: bool, ports: &[(u16, u16)]) -> impl Future<Output = Result<()>> + Send {
            self.set_traffic_calls.lock().push((on, ports.to_vec()));
            async move { Ok(()) }
        }

        fn schedule_traffic_sync(&self, at: Duration, ports: &[(u16, u16)]) -> impl Future<Output = Result<()>> + Send {
            self.synced_calls.lock().push((at, ports.to_vec()));
            async move { Ok(()) }
        }
    }
}
