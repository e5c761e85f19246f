use lazy_static::lazy_static;
use prometheus::{core::Collector, opts, IntCounterVec, IntGauge, Registry};
use tracing::error;

lazy_static! {
    static ref POLICY_RELOADS_TOTAL: IntCounterVec = IntCounterVec::new(
        opts!(
            "typegate_policy_reloads_total",
            "Policy reload checks grouped by outcome"
        ),
        &["outcome"]
    )
    .unwrap();
    static ref POLICY_ORIGINS: IntGauge = IntGauge::new(
        "typegate_policy_origins",
        "Configuration origins cached by the policy store"
    )
    .unwrap();
}

fn register<C>(registry: &Registry, collector: C)
where
    C: Collector + Clone + Send + Sync + 'static,
{
    if let Err(err) = registry.register(Box::new(collector.clone())) {
        if !matches!(err, prometheus::Error::AlreadyReg) {
            error!(?err, "failed to register policy metric");
        }
    }
}

pub fn register_metrics(registry: &Registry) {
    register(registry, POLICY_RELOADS_TOTAL.clone());
    register(registry, POLICY_ORIGINS.clone());
}

pub fn record_reload(outcome: &str) {
    POLICY_RELOADS_TOTAL.with_label_values(&[outcome]).inc();
}

/// Every store adjusts the gauge by its own entries only.
pub fn origins_added(count: usize) {
    POLICY_ORIGINS.add(count as i64);
}

pub fn origins_removed(count: usize) {
    POLICY_ORIGINS.sub(count as i64);
}

pub fn origin_count() -> i64 {
    POLICY_ORIGINS.get()
}
