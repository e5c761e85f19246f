//! Diagnostic sinks the gate reports to

use std::sync::Arc;

use tracing::{error, info, trace};
use typegate_event_bus::EventBus;

use crate::types::{EventLevel, GateEvent};

/// Capability the gate invokes for every observation it makes
pub trait GateDiagnostics: Send + Sync {
    /// Profiling observations and allow matches
    fn info(&self, event: &GateEvent);

    /// Blocking decisions
    fn error(&self, event: &GateEvent);

    /// Route an event to the channel matching its level
    fn emit(&self, event: &GateEvent) {
        match event.level {
            EventLevel::Info => self.info(event),
            EventLevel::Error => self.error(event),
        }
    }
}

/// Reports events as structured `tracing` records
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDiagnostics;

impl GateDiagnostics for TracingDiagnostics {
    fn info(&self, event: &GateEvent) {
        info!(
            origin = %event.origin,
            type_name = %event.type_name,
            pattern = event.pattern.as_deref().unwrap_or(""),
            version = event.policy_version,
            "{}",
            event.message()
        );
    }

    fn error(&self, event: &GateEvent) {
        error!(
            origin = %event.origin,
            type_name = %event.type_name,
            pattern = event.pattern.as_deref().unwrap_or(""),
            version = event.policy_version,
            "{}",
            event.message()
        );
    }
}

/// Publishes events on an in-process bus
pub struct BusDiagnostics {
    bus: Arc<dyn EventBus<GateEvent>>,
}

impl BusDiagnostics {
    pub fn new(bus: Arc<dyn EventBus<GateEvent>>) -> Self {
        Self { bus }
    }

    fn publish(&self, event: &GateEvent) {
        // No subscriber is a normal state for a bus, not a gate failure
        if let Err(err) = self.bus.publish(event.clone()) {
            trace!(%err, "gate event dropped");
        }
    }
}

impl GateDiagnostics for BusDiagnostics {
    fn info(&self, event: &GateEvent) {
        self.publish(event);
    }

    fn error(&self, event: &GateEvent) {
        self.publish(event);
    }
}

/// Forwards every event to each inner sink in order
#[derive(Default)]
pub struct CompositeDiagnostics {
    sinks: Vec<Arc<dyn GateDiagnostics>>,
}

impl CompositeDiagnostics {
    pub fn new(sinks: Vec<Arc<dyn GateDiagnostics>>) -> Self {
        Self { sinks }
    }

    pub fn push(&mut self, sink: Arc<dyn GateDiagnostics>) {
        self.sinks.push(sink);
    }
}

impl GateDiagnostics for CompositeDiagnostics {
    fn info(&self, event: &GateEvent) {
        for sink in &self.sinks {
            sink.info(event);
        }
    }

    fn error(&self, event: &GateEvent) {
        for sink in &self.sinks {
            sink.error(event);
        }
    }
}

/// Discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullDiagnostics;

impl GateDiagnostics for NullDiagnostics {
    fn info(&self, _event: &GateEvent) {}

    fn error(&self, _event: &GateEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GateEventKind;
    use typegate_event_bus::InMemoryBus;
    use typegate_policy_center::{PatternSet, Policy};

    fn event(level: EventLevel, kind: GateEventKind) -> GateEvent {
        let policy = Policy::new(
            "unit".into(),
            PatternSet::compile(["^evil\\."]).unwrap(),
            PatternSet::empty(),
            false,
            3,
        );
        GateEvent::new(&policy, level, kind, "evil.Payload", Some("^evil\\."))
    }

    #[tokio::test]
    async fn bus_sink_publishes_events() {
        let bus = InMemoryBus::<GateEvent>::new(8);
        let mut rx = bus.subscribe();
        let sink = BusDiagnostics::new(bus.clone());

        let blocked = event(EventLevel::Error, GateEventKind::BlockedByBlacklist);
        sink.emit(&blocked);

        let received = rx.recv().await.unwrap();
        assert_eq!(received, blocked);
        let json = serde_json::to_value(&received).unwrap();
        assert_eq!(json["kind"], "blocked_by_blacklist");
        assert_eq!(json["level"], "error");
        assert_eq!(json["policy_version"], 3);
    }

    #[test]
    fn bus_without_subscribers_is_silent() {
        let bus = InMemoryBus::<GateEvent>::new(8);
        let sink = BusDiagnostics::new(bus);
        sink.emit(&event(EventLevel::Info, GateEventKind::BlacklistMatch));
    }

    #[tokio::test]
    async fn composite_fans_out_to_every_sink() {
        let first = InMemoryBus::<GateEvent>::new(8);
        let second = InMemoryBus::<GateEvent>::new(8);
        let mut first_rx = first.subscribe();
        let mut second_rx = second.subscribe();

        let mut composite = CompositeDiagnostics::new(vec![Arc::new(NullDiagnostics)]);
        composite.push(Arc::new(BusDiagnostics::new(first)));
        composite.push(Arc::new(BusDiagnostics::new(second)));

        composite.emit(&event(EventLevel::Info, GateEventKind::BlacklistMatch));
        assert_eq!(first_rx.recv().await.unwrap().kind, GateEventKind::BlacklistMatch);
        assert_eq!(second_rx.recv().await.unwrap().kind, GateEventKind::BlacklistMatch);
    }
}
