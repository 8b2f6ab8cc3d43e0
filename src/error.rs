// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Crate-wide error type.
//!
//! Mirrors the error-kind taxonomy the design calls for: configuration
//! errors are fatal before any traffic starts, runtime I/O errors are
//! surfaced upstream without local retry, and loss-of-signal is
//! observable and policy-driven rather than an error in the usual sense.

use std::fmt;

/// Convenient alias for core operations using the public [`Error`] type.
pub type Result<T> = core::result::Result<T, Error>;

/// Errors produced by the benchmarking execution core.
#[derive(Debug)]
pub enum Error {
    /// Inconsistent or invalid test/port descriptor (wrong module type,
    /// unsupported capability, speed/FEC mismatch, ...).
    Configuration(String),
    /// A `FieldValueRange`'s start/stop exceeds the field's bit width.
    FieldValueRangeExceed { field_name: String, bit_length: u32 },
    /// A MAC-learning (or any one-shot) frame exceeds the port's
    /// `max_xmit_one_packet_length`.
    PacketLengthExceed { length: usize, max: usize },
    /// The toggle-port-sync preamble did not reach all-synced within the
    /// bound (30 s).
    SyncTimeout { port_name: String },
    /// PHY lost link/sync. Not necessarily fatal; see [`Error::is_los`].
    LossOfSignal { port_name: String },
    /// Driver RPC failure. Not recovered locally.
    Transport(String),
}

impl Error {
    /// True for the loss-of-signal variant, which callers may choose to
    /// treat as a warning rather than an abort depending on policy.
    pub fn is_los(&self) -> bool {
        matches!(self, Error::LossOfSignal { .. })
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Configuration(msg) => write!(f, "configuration error: {msg}"),
            Error::FieldValueRangeExceed {
                field_name,
                bit_length,
            } => write!(
                f,
                "field value range exceeds {bit_length}-bit width for field \"{field_name}\""
            ),
            Error::PacketLengthExceed { length, max } => write!(
                f,
                "packet length {length} exceeds port's max_xmit_one_packet_length {max}"
            ),
            Error::SyncTimeout { port_name } => {
                write!(f, "waiting for {port_name} sync timeout")
            }
            Error::LossOfSignal { port_name } => write!(f, "loss of signal on {port_name}"),
            Error::Transport(msg) => write!(f, "transport error: {msg}"),
        }
    }
}

impl std::error::Error for Error {}
