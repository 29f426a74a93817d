//! Lifecycle counters.
//!
//! Counters are plain relaxed atomics: they only ever count up (reset aside)
//! and no decision is made on a cross-counter invariant, so there is nothing
//! to order. Snapshots are taken field by field and may be torn across
//! fields; each individual value is exact.

use std::sync::atomic::{AtomicU64, Ordering};

/// Sentinel for "no loss recorded yet".
const NEVER: u64 = u64::MAX;

/// Cumulative lifecycle counters, shared process-wide.
///
/// These deliberately survive manager disposal: a page that tears down one
/// manager and builds another keeps its failure history, which is what the
/// viability gate wants to see.
#[derive(Debug)]
pub struct ContextMetrics {
    creations_attempted: AtomicU64,
    creations_succeeded: AtomicU64,
    creation_failures: AtomicU64,
    context_losses: AtomicU64,
    context_restores: AtomicU64,
    creation_nanos_total: AtomicU64,
    creation_samples: AtomicU64,
    last_loss_at_ms: AtomicU64,
}

impl Default for ContextMetrics {
    fn default() -> Self {
        ContextMetrics {
            creations_attempted: AtomicU64::new(0),
            creations_succeeded: AtomicU64::new(0),
            creation_failures: AtomicU64::new(0),
            context_losses: AtomicU64::new(0),
            context_restores: AtomicU64::new(0),
            creation_nanos_total: AtomicU64::new(0),
            creation_samples: AtomicU64::new(0),
            last_loss_at_ms: AtomicU64::new(NEVER),
        }
    }
}

impl ContextMetrics {
    pub(crate) fn record_creation_attempt(&self) {
        self.creations_attempted.fetch_add(1, Ordering::Relaxed);
    }

    /// `elapsed_ns` covers the full acquisition walk, not a single flavor
    /// attempt. Only successes feed the latency average; failures often bail
    /// out instantly and would drag it toward zero.
    pub(crate) fn record_creation_success(&self, elapsed_ns: u64) {
        self.creations_succeeded.fetch_add(1, Ordering::Relaxed);
        self.creation_nanos_total
            .fetch_add(elapsed_ns, Ordering::Relaxed);
        self.creation_samples.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_creation_failure(&self) {
        self.creation_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_loss(&self, now_ms: u64) {
        self.context_losses.fetch_add(1, Ordering::Relaxed);
        self.last_loss_at_ms.store(now_ms, Ordering::Relaxed);
    }

    pub(crate) fn record_restore(&self) {
        self.context_restores.fetch_add(1, Ordering::Relaxed);
    }

    /// Cumulative creation failures, the viability gate's input.
    pub fn creation_failures(&self) -> u64 {
        self.creation_failures.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let samples = self.creation_samples.load(Ordering::Relaxed);
        let total_ns = self.creation_nanos_total.load(Ordering::Relaxed);
        let avg_creation_latency_ms = if samples == 0 {
            0.0
        } else {
            total_ns as f64 / samples as f64 / 1_000_000.0
        };
        let last_loss = self.last_loss_at_ms.load(Ordering::Relaxed);
        MetricsSnapshot {
            creations_attempted: self.creations_attempted.load(Ordering::Relaxed),
            creations_succeeded: self.creations_succeeded.load(Ordering::Relaxed),
            creation_failures: self.creation_failures.load(Ordering::Relaxed),
            context_losses: self.context_losses.load(Ordering::Relaxed),
            context_restores: self.context_restores.load(Ordering::Relaxed),
            avg_creation_latency_ms,
            last_loss_at_ms: (last_loss != NEVER).then_some(last_loss),
        }
    }

    pub(crate) fn reset(&self) {
        self.creations_attempted.store(0, Ordering::Relaxed);
        self.creations_succeeded.store(0, Ordering::Relaxed);
        self.creation_failures.store(0, Ordering::Relaxed);
        self.context_losses.store(0, Ordering::Relaxed);
        self.context_restores.store(0, Ordering::Relaxed);
        self.creation_nanos_total.store(0, Ordering::Relaxed);
        self.creation_samples.store(0, Ordering::Relaxed);
        self.last_loss_at_ms.store(NEVER, Ordering::Relaxed);
    }

    /// Returns a JSON object as a string.
    pub fn to_json(&self) -> String {
        self.snapshot().to_json()
    }
}

/// Point-in-time copy of [`ContextMetrics`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricsSnapshot {
    pub creations_attempted: u64,
    pub creations_succeeded: u64,
    pub creation_failures: u64,
    pub context_losses: u64,
    pub context_restores: u64,
    /// Mean wall-clock time of a successful acquisition walk. Zero until the
    /// first success.
    pub avg_creation_latency_ms: f64,
    /// Clock timestamp of the most recent loss, if any.
    pub last_loss_at_ms: Option<u64>,
}

impl MetricsSnapshot {
    pub fn to_json(self) -> String {
        // Note: This is hand-built JSON so diagnostics do not pull a
        // serializer into every embedder.
        let last_loss = match self.last_loss_at_ms {
            Some(ms) => ms.to_string(),
            None => "null".to_string(),
        };
        format!(
            "{{\"creations_attempted\":{},\"creations_succeeded\":{},\"creation_failures\":{},\"context_losses\":{},\"context_restores\":{},\"avg_creation_latency_ms\":{},\"last_loss_at_ms\":{}}}",
            self.creations_attempted,
            self.creations_succeeded,
            self.creation_failures,
            self.context_losses,
            self.context_restores,
            self.avg_creation_latency_ms,
            last_loss,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let metrics = ContextMetrics::default();
        metrics.record_creation_attempt();
        metrics.record_creation_attempt();
        metrics.record_creation_success(2_000_000);
        metrics.record_creation_failure();
        metrics.record_loss(1234);
        metrics.record_restore();

        let snap = metrics.snapshot();
        assert_eq!(snap.creations_attempted, 2);
        assert_eq!(snap.creations_succeeded, 1);
        assert_eq!(snap.creation_failures, 1);
        assert_eq!(snap.context_losses, 1);
        assert_eq!(snap.context_restores, 1);
        assert_eq!(snap.last_loss_at_ms, Some(1234));
    }

    #[test]
    fn latency_average_is_over_successes_only() {
        let metrics = ContextMetrics::default();
        assert_eq!(metrics.snapshot().avg_creation_latency_ms, 0.0);

        metrics.record_creation_success(1_000_000);
        metrics.record_creation_success(3_000_000);
        metrics.record_creation_failure();
        assert_eq!(metrics.snapshot().avg_creation_latency_ms, 2.0);
    }

    #[test]
    fn no_loss_reads_as_none() {
        let metrics = ContextMetrics::default();
        assert_eq!(metrics.snapshot().last_loss_at_ms, None);
        metrics.record_loss(0);
        assert_eq!(metrics.snapshot().last_loss_at_ms, Some(0));
    }

    #[test]
    fn reset_returns_to_defaults() {
        let metrics = ContextMetrics::default();
        metrics.record_creation_attempt();
        metrics.record_creation_success(5);
        metrics.record_loss(9);
        metrics.reset();

        let snap = metrics.snapshot();
        assert_eq!(snap.creations_attempted, 0);
        assert_eq!(snap.creations_succeeded, 0);
        assert_eq!(snap.avg_creation_latency_ms, 0.0);
        assert_eq!(snap.last_loss_at_ms, None);
    }

    #[test]
    fn json_shape_is_stable() {
        let snap = MetricsSnapshot {
            creations_attempted: 3,
            creations_succeeded: 2,
            creation_failures: 1,
            context_losses: 1,
            context_restores: 1,
            avg_creation_latency_ms: 1.5,
            last_loss_at_ms: Some(42),
        };
        assert_eq!(
            snap.to_json(),
            "{\"creations_attempted\":3,\"creations_succeeded\":2,\
             \"creation_failures\":1,\"context_losses\":1,\"context_restores\":1,\
             \"avg_creation_latency_ms\":1.5,\"last_loss_at_ms\":42}"
        );

        let never_lost = MetricsSnapshot {
            last_loss_at_ms: None,
            ..snap
        };
        assert!(never_lost.to_json().ends_with("\"last_loss_at_ms\":null}"));
    }
}
