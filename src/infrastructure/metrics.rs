//! Call counters

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Lock-free counters shared by a registry and everything built on it
#[derive(Debug)]
pub struct CallStats {
    prepared: AtomicU64,
    invoked: AtomicU64,
    decode_failures: AtomicU64,
    signature_mismatches: AtomicU64,
    store_errors: AtomicU64,
    start_time: Instant,
}

impl Default for CallStats {
    fn default() -> Self {
        Self {
            prepared: AtomicU64::new(0),
            invoked: AtomicU64::new(0),
            decode_failures: AtomicU64::new(0),
            signature_mismatches: AtomicU64::new(0),
            store_errors: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }
}

impl CallStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_prepared(&self) {
        self.prepared.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_invoked(&self) {
        self.invoked.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_decode_failure(&self) {
        self.decode_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_signature_mismatch(&self) {
        self.signature_mismatches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_store_error(&self) {
        self.store_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            prepared: self.prepared.load(Ordering::Relaxed),
            invoked: self.invoked.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            signature_mismatches: self.signature_mismatches.load(Ordering::Relaxed),
            store_errors: self.store_errors.load(Ordering::Relaxed),
            uptime_ms: self.start_time.elapsed().as_millis() as u64,
        }
    }

    pub fn reset(&self) {
        for counter in [
            &self.prepared,
            &self.invoked,
            &self.decode_failures,
            &self.signature_mismatches,
            &self.store_errors,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

/// Point-in-time copy of `CallStats`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub prepared: u64,
    pub invoked: u64,
    pub decode_failures: u64,
    pub signature_mismatches: u64,
    pub store_errors: u64,
    pub uptime_ms: u64,
}

impl StatsSnapshot {
    /// Prepared calls not yet invoked (saturating; replays can exceed prepares)
    pub fn pending(&self) -> u64 {
        self.prepared.saturating_sub(self.invoked)
    }

    pub fn report(&self) -> String {
        format!(
            "Call Statistics:\n  \
             Prepared: {}\n  \
             Invoked: {}\n  \
             Decode failures: {}\n  \
             Signature mismatches: {}\n  \
             Store errors: {}\n  \
             Uptime: {}ms",
            self.prepared,
            self.invoked,
            self.decode_failures,
            self.signature_mismatches,
            self.store_errors,
            self.uptime_ms
        )
    }
}
