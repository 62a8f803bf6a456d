//! Per-node dispatch statistics.
//!
//! Conversion and invocation failures inside a dispatch pass do not stop
//! the graph; they are logged and counted here so long-running pipelines
//! can be observed without a debugger attached.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic counters updated by the dispatcher. One instance lives on each
/// [`Node`](crate::node::Node).
#[derive(Debug, Default)]
pub struct DispatchStats {
    passes: AtomicU64,
    invocations: AtomicU64,
    conversion_failures: AtomicU64,
    invocation_failures: AtomicU64,
    packets_dropped: AtomicU64,
}

impl DispatchStats {
    pub(crate) fn record_pass(&self) {
        self.passes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_invocation(&self) {
        self.invocations.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_conversion_failure(&self) {
        self.conversion_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_invocation_failure(&self) {
        self.invocation_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped(&self, count: u64) {
        self.packets_dropped.fetch_add(count, Ordering::Relaxed);
    }

    /// Consistent point-in-time copy of the counters.
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            passes: self.passes.load(Ordering::Relaxed),
            invocations: self.invocations.load(Ordering::Relaxed),
            conversion_failures: self.conversion_failures.load(Ordering::Relaxed),
            invocation_failures: self.invocation_failures.load(Ordering::Relaxed),
            packets_dropped: self.packets_dropped.load(Ordering::Relaxed),
        }
    }
}

/// Plain copy of a node's dispatch counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Dispatch passes executed while opened.
    pub passes: u64,
    /// Successful method invocations.
    pub invocations: u64,
    /// Invocations skipped because an argument failed to convert.
    pub conversion_failures: u64,
    /// Invocations that panicked (caught at the dispatch boundary).
    pub invocation_failures: u64,
    /// Packets dropped by queue bounds or sync alignment.
    pub packets_dropped: u64,
}
