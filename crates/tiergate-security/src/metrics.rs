//! ---
//! tg_section: "04-security-access-control"
//! tg_subsection: "module"
//! tg_type: "source"
//! tg_scope: "code"
//! tg_description: "Role assignments, principals, and protected-entity rules."
//! tg_version: "v0.0.0-prealpha"
//! tg_owner: "tbd"
//! ---
use prometheus::{IntCounter, IntCounterVec, Opts, Registry};
use std::sync::Arc;

/// Authorization metrics exported via Prometheus.
#[derive(Clone)]
pub struct AccessMetrics {
    registry: Arc<Registry>,
    decisions_total: IntCounterVec,
    denials_total: IntCounterVec,
    cache_events_total: IntCounterVec,
    guard_violations_total: IntCounter,
}

impl AccessMetrics {
    /// Register metrics with the provided registry.
    pub fn new(registry: Arc<Registry>) -> anyhow::Result<Self> {
        let decisions_total = IntCounterVec::new(
            Opts::new("tiergate_decisions_total", "Access decisions by outcome"),
            &["outcome"],
        )?;
        let denials_total = IntCounterVec::new(
            Opts::new("tiergate_denials_total", "Access denials by reason"),
            &["reason"],
        )?;
        let cache_events_total = IntCounterVec::new(
            Opts::new("tiergate_cache_events_total", "Decision cache hits, misses and store errors"),
            &["event"],
        )?;
        let guard_violations_total = IntCounter::new(
            "tiergate_guard_violations_total",
            "Mutations rejected by the protected-entity guard",
        )?;

        registry.register(Box::new(decisions_total.clone()))?;
        registry.register(Box::new(denials_total.clone()))?;
        registry.register(Box::new(cache_events_total.clone()))?;
        registry.register(Box::new(guard_violations_total.clone()))?;

        Ok(Self {
            registry,
            decisions_total,
            denials_total,
            cache_events_total,
            guard_violations_total,
        })
    }

    /// Access the underlying registry.
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    /// Count an allowed decision.
    pub fn inc_allowed(&self) {
        self.decisions_total.with_label_values(&["allowed"]).inc();
    }

    /// Count a denied decision under its reason label.
    pub fn inc_denied(&self, reason: &str) {
        self.decisions_total.with_label_values(&["denied"]).inc();
        self.denials_total.with_label_values(&[reason]).inc();
    }

    /// Count a cache hit.
    pub fn inc_cache_hit(&self) {
        self.cache_events_total.with_label_values(&["hit"]).inc();
    }

    /// Count a cache miss.
    pub fn inc_cache_miss(&self) {
        self.cache_events_total.with_label_values(&["miss"]).inc();
    }

    /// Count a cache store failure.
    pub fn inc_cache_error(&self) {
        self.cache_events_total.with_label_values(&["error"]).inc();
    }

    /// Count a guard rejection.
    pub fn inc_guard_violation(&self) {
        self.guard_violations_total.inc();
    }

    /// Current value of a denial counter, for diagnostics.
    pub fn denials(&self, reason: &str) -> u64 {
        self.denials_total.with_label_values(&[reason]).get()
    }
}
