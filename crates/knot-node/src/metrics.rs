//! Prometheus metrics for the consensus service

use crate::error::Result;
use knot_consensus::{ConsensusStats, Rejection};
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

/// Consensus counters and gauges in a private registry
#[derive(Clone)]
pub struct ConsensusMetrics {
    registry: Registry,
    admitted: IntCounter,
    rejected: IntCounterVec,
    ordered: IntCounter,
    orphans: IntGauge,
    max_round: IntGauge,
}

impl ConsensusMetrics {
    pub fn new(namespace: &str) -> Result<Self> {
        let registry = Registry::new();

        let admitted = IntCounter::with_opts(
            Opts::new("events_admitted_total", "Events admitted to the graph").namespace(namespace),
        )?;
        let rejected = IntCounterVec::new(
            Opts::new("events_rejected_total", "Rejected submissions by reason").namespace(namespace),
            &["reason"],
        )?;
        let ordered = IntCounter::with_opts(
            Opts::new("events_ordered_total", "Events with a consensus position").namespace(namespace),
        )?;
        let orphans = IntGauge::with_opts(
            Opts::new("orphans", "Events waiting for parents").namespace(namespace),
        )?;
        let max_round = IntGauge::with_opts(
            Opts::new("max_round", "Highest assigned round").namespace(namespace),
        )?;

        registry.register(Box::new(admitted.clone()))?;
        registry.register(Box::new(rejected.clone()))?;
        registry.register(Box::new(ordered.clone()))?;
        registry.register(Box::new(orphans.clone()))?;
        registry.register(Box::new(max_round.clone()))?;

        Ok(Self {
            registry,
            admitted,
            rejected,
            ordered,
            orphans,
            max_round,
        })
    }

    pub fn record_admitted(&self, count: u64) {
        self.admitted.inc_by(count);
    }

    pub fn record_rejection(&self, rejection: &Rejection) {
        self.rejected.with_label_values(&[rejection.reason()]).inc();
    }

    pub fn record_ordered(&self, count: usize) {
        self.ordered.inc_by(count as u64);
    }

    /// Refresh gauges from an engine snapshot
    pub fn observe(&self, stats: &ConsensusStats) {
        self.orphans.set(stats.orphans as i64);
        self.max_round.set(stats.max_round as i64);
    }

    pub fn admitted(&self) -> u64 {
        self.admitted.get()
    }

    pub fn rejected(&self, reason: &str) -> u64 {
        self.rejected.with_label_values(&[reason]).get()
    }

    pub fn ordered(&self) -> u64 {
        self.ordered.get()
    }

    /// Text exposition format
    pub fn render(&self) -> Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use knot_core::EventId;

    #[test]
    fn test_render_contains_namespaced_metrics() {
        let metrics = ConsensusMetrics::new("knot").unwrap();
        metrics.record_admitted(3);
        metrics.record_rejection(&Rejection::Duplicate(EventId::new([0u8; 32])));
        metrics.record_ordered(2);

        assert_eq!(metrics.admitted(), 3);
        assert_eq!(metrics.rejected("duplicate"), 1);
        assert_eq!(metrics.ordered(), 2);

        let text = metrics.render().unwrap();
        assert!(text.contains("knot_events_admitted_total 3"));
        assert!(text.contains("knot_events_rejected_total{reason=\"duplicate\"} 1"));
    }
}
