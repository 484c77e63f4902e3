//! Process-wide atomic counters for the categorization pipeline.
//!
//! Counters are bumped silently at the call site; [`Metrics::flush`] emits
//! their current values as one `info!` event at the end of a run.

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

pub struct Metrics {
    oracle_calls: AtomicU64,
    parse_failures: AtomicU64,
    transport_failures: AtomicU64,
    conservation_violations: AtomicU64,
    rounds: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            oracle_calls: AtomicU64::new(0),
            parse_failures: AtomicU64::new(0),
            transport_failures: AtomicU64::new(0),
            conservation_violations: AtomicU64::new(0),
            rounds: AtomicU64::new(0),
        }
    }

    pub fn inc_oracle_calls(&self) {
        self.oracle_calls.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "oracle_calls", "counter incremented");
    }

    pub fn inc_parse_failures(&self) {
        self.parse_failures.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "parse_failures", "counter incremented");
    }

    pub fn inc_transport_failures(&self) {
        self.transport_failures.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "transport_failures", "counter incremented");
    }

    pub fn inc_violations(&self) {
        self.conservation_violations.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "conservation_violations", "counter incremented");
    }

    pub fn inc_rounds(&self) {
        self.rounds.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "rounds", "counter incremented");
    }

    /// Emit all current counter values as a single `info!` event.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            oracle_calls = self.oracle_calls(),
            parse_failures = self.parse_failures(),
            transport_failures = self.transport_failures(),
            conservation_violations = self.conservation_violations(),
            rounds = self.rounds(),
        );
    }

    pub fn oracle_calls(&self) -> u64 {
        self.oracle_calls.load(Ordering::Relaxed)
    }

    pub fn parse_failures(&self) -> u64 {
        self.parse_failures.load(Ordering::Relaxed)
    }

    pub fn transport_failures(&self) -> u64 {
        self.transport_failures.load(Ordering::Relaxed)
    }

    pub fn conservation_violations(&self) -> u64 {
        self.conservation_violations.load(Ordering::Relaxed)
    }

    pub fn rounds(&self) -> u64 {
        self.rounds.load(Ordering::Relaxed)
    }

    /// Reset all counters to zero (useful in tests).
    pub fn reset(&self) {
        self.oracle_calls.store(0, Ordering::Relaxed);
        self.parse_failures.store(0, Ordering::Relaxed);
        self.transport_failures.store(0, Ordering::Relaxed);
        self.conservation_violations.store(0, Ordering::Relaxed);
        self.rounds.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_increment() {
        let m = Metrics::new();
        m.inc_oracle_calls();
        m.inc_oracle_calls();
        m.inc_oracle_calls();
        m.inc_parse_failures();
        m.inc_violations();
        m.inc_rounds();
        m.inc_rounds();

        assert_eq!(m.oracle_calls(), 3);
        assert_eq!(m.parse_failures(), 1);
        assert_eq!(m.transport_failures(), 0);
        assert_eq!(m.conservation_violations(), 1);
        assert_eq!(m.rounds(), 2);
    }

    #[test]
    fn reset_zeroes_all() {
        let m = Metrics::new();
        m.inc_oracle_calls();
        m.inc_transport_failures();
        m.inc_rounds();
        m.reset();
        assert_eq!(m.oracle_calls(), 0);
        assert_eq!(m.transport_failures(), 0);
        assert_eq!(m.rounds(), 0);
    }
}
