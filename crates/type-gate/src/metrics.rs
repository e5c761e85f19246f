use lazy_static::lazy_static;
use prometheus::{core::Collector, opts, IntCounterVec, Registry};
use tracing::error;
use typegate_core_types::Decision;

lazy_static! {
    static ref GATE_DECISIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        opts!(
            "typegate_decisions_total",
            "Gate decisions grouped by outcome"
        ),
        &["decision"]
    )
    .unwrap();
}

fn register<C>(registry: &Registry, collector: C)
where
    C: Collector + Clone + Send + Sync + 'static,
{
    if let Err(err) = registry.register(Box::new(collector.clone())) {
        if !matches!(err, prometheus::Error::AlreadyReg) {
            error!(?err, "failed to register gate metric");
        }
    }
}

pub fn register_metrics(registry: &Registry) {
    register(registry, GATE_DECISIONS_TOTAL.clone());
}

pub fn record_decision(decision: &Decision) {
    GATE_DECISIONS_TOTAL
        .with_label_values(&[decision.label()])
        .inc();
}

pub fn decision_count(label: &str) -> u64 {
    GATE_DECISIONS_TOTAL.with_label_values(&[label]).get()
}
