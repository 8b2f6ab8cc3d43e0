// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Telemetry sink — the outward-facing reporting interface a caller
//! implements to receive progress, results, and warnings as a run
//! executes (the `xoa_out` boundary, §6).

use crate::stream::PRStatistic;

/// Receives progress and result events from a running test. All
/// methods take `&self`; implementations are expected to hand events
/// off to a channel or log sink rather than block.
pub trait TelemetrySink: Send + Sync {
    /// A human-readable progress line (e.g. "port 0/0/1: ramping to 64B @ 50%").
    fn progress(&self, message: &str);

    /// A completed measurement for one port at one trial.
    fn result(&self, port_name: &str, stat: PRStatistic);

    /// A non-fatal anomaly — loss of signal, a sync timeout that was
    /// retried, a dropped sample.
    fn warning(&self, message: &str);

    /// An unrecoverable condition; the run is about to abort.
    fn fatal(&self, message: &str);
}

/// Sink that forwards everything to the `log` crate at the
/// conventional levels — the default when a caller doesn't need
/// structured telemetry.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingSink;

impl TelemetrySink for LoggingSink {
    fn progress(&self, message: &str) {
        log::debug!("{message}");
    }

    fn result(&self, port_name: &str, stat: PRStatistic) {
        log::info!(
            "{port_name}: tx={} rx={} loss={} ({:.4}%)",
            stat.tx_frames,
            stat.rx_frames,
            stat.loss_frames,
            stat.loss_pct()
        );
    }

    fn warning(&self, message: &str) {
        log::warn!("{message}");
    }

    fn fatal(&self, message: &str) {
        log::error!("{message}");
    }
}
