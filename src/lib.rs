// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Execution core for an RFC-2544-style network benchmarking run.
//!
//! # Architecture
//!
//! ```text
//! ResourceManager                  owns every port, drives the lifecycle
//! +-- PortStruct<PortHandle>       one port: config, streams, peers
//! |   +-- StreamStruct             one flow: header + addressing
//! |       +-- segment::ProtocolSegmentProfile
//! |       +-- address::AddressCollection
//! +-- learning                     MAC learning, ARP/NDP refresh
//! +-- b2b::ConvergenceController   binary-search convergence (back-to-back,
//!                                  throughput, latency all reuse this)
//! +-- driver::{ChassisHandle, PortHandle}  the hardware boundary
//! +-- telemetry::TelemetrySink     progress/result/warning/fatal out
//! ```
//!
//! Everything here is transport-agnostic: `driver` defines the traits
//! a caller implements against its own chassis/port RPC link, and
//! `driver::mock` (test-only) is this crate's own stand-in for them.

pub mod address;
pub mod b2b;
pub mod checksum;
pub mod config;
pub mod driver;
pub mod error;
pub mod identity;
pub mod learning;
pub mod port;
pub mod resource_manager;
pub mod scheduler;
pub mod segment;
pub mod stream;
pub mod telemetry;

pub use error::{Error, Result};
