//! Global atomic counters for governance observability.
//!
//! Counters are incremented silently at the call site. Call
//! [`Metrics::flush`] to emit current values as a single
//! `tracing::info!` event.

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

/// Lightweight atomic counters.
pub struct Metrics {
    decisions_rendered: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    cache_invalidations: AtomicU64,
    score_updates: AtomicU64,
    exams_passed: AtomicU64,
    exams_failed: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            decisions_rendered: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
            cache_invalidations: AtomicU64::new(0),
            score_updates: AtomicU64::new(0),
            exams_passed: AtomicU64::new(0),
            exams_failed: AtomicU64::new(0),
        }
    }

    /// A decision was computed (cache miss path).
    pub fn inc_decisions(&self) {
        self.decisions_rendered.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "decisions_rendered", "counter incremented");
    }

    pub fn inc_cache_hits(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_cache_misses(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_invalidations(&self) {
        self.cache_invalidations.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "cache_invalidations", "counter incremented");
    }

    pub fn inc_score_updates(&self) {
        self.score_updates.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "score_updates", "counter incremented");
    }

    /// Record a finished exam.
    pub fn record_exam(&self, passed: bool) {
        if passed {
            self.exams_passed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.exams_failed.fetch_add(1, Ordering::Relaxed);
        }
        tracing::trace!(metric = "exams", passed, "counter incremented");
    }

    /// Emit all current counter values as a single `info!` event.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            decisions_rendered = self.decisions_rendered(),
            cache_hits = self.cache_hits(),
            cache_misses = self.cache_misses(),
            cache_invalidations = self.cache_invalidations(),
            score_updates = self.score_updates(),
            exams_passed = self.exams_passed(),
            exams_failed = self.exams_failed(),
        );
    }

    pub fn decisions_rendered(&self) -> u64 {
        self.decisions_rendered.load(Ordering::Relaxed)
    }

    pub fn cache_hits(&self) -> u64 {
        self.cache_hits.load(Ordering::Relaxed)
    }

    pub fn cache_misses(&self) -> u64 {
        self.cache_misses.load(Ordering::Relaxed)
    }

    pub fn cache_invalidations(&self) -> u64 {
        self.cache_invalidations.load(Ordering::Relaxed)
    }

    pub fn score_updates(&self) -> u64 {
        self.score_updates.load(Ordering::Relaxed)
    }

    pub fn exams_passed(&self) -> u64 {
        self.exams_passed.load(Ordering::Relaxed)
    }

    pub fn exams_failed(&self) -> u64 {
        self.exams_failed.load(Ordering::Relaxed)
    }

    /// Reset all counters to zero (useful in tests).
    pub fn reset(&self) {
        for counter in [
            &self.decisions_rendered,
            &self.cache_hits,
            &self.cache_misses,
            &self.cache_invalidations,
            &self.score_updates,
            &self.exams_passed,
            &self.exams_failed,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_increment() {
        let m = Metrics::new();
        m.inc_decisions();
        m.inc_decisions();
        assert_eq!(m.decisions_rendered(), 2);

        m.inc_cache_hits();
        m.inc_cache_misses();
        m.inc_invalidations();
        m.inc_score_updates();
        assert_eq!(m.cache_hits(), 1);
        assert_eq!(m.cache_misses(), 1);
        assert_eq!(m.cache_invalidations(), 1);
        assert_eq!(m.score_updates(), 1);

        m.record_exam(true);
        m.record_exam(false);
        m.record_exam(false);
        assert_eq!(m.exams_passed(), 1);
        assert_eq!(m.exams_failed(), 2);
    }

    #[test]
    fn reset_zeroes_all() {
        let m = Metrics::new();
        m.inc_decisions();
        m.inc_cache_hits();
        m.record_exam(true);
        m.reset();
        assert_eq!(m.decisions_rendered(), 0);
        assert_eq!(m.cache_hits(), 0);
        assert_eq!(m.exams_passed(), 0);
    }
}
