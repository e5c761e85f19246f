//! Gate decision engine

use std::sync::Arc;

use typegate_core_types::{BlockReason, Decision, OriginId};
use typegate_policy_center::{Policy, PolicyHandle, PolicyStore};

use crate::diagnostics::{GateDiagnostics, TracingDiagnostics};
use crate::errors::GateError;
use crate::metrics;
use crate::reconstructor::InstantiationHook;
use crate::types::{EventLevel, GateEvent, GateEventKind, GateOptions};

/// Approves or refuses reconstruction of named types
///
/// A gate is cheap to clone; clones share the same policy handle, so every
/// gate bound to one origin sees the same published snapshot.
#[derive(Clone)]
pub struct Gate {
    handle: Arc<PolicyHandle>,
    diagnostics: Arc<dyn GateDiagnostics>,
    options: GateOptions,
}

impl Gate {
    /// Bind a gate to `origin`, reporting through `tracing`
    pub fn new(store: &PolicyStore, origin: impl Into<OriginId>) -> Result<Self, GateError> {
        Self::with_diagnostics(store, origin, Arc::new(TracingDiagnostics))
    }

    /// Bind a gate to `origin` with a custom diagnostics sink
    pub fn with_diagnostics(
        store: &PolicyStore,
        origin: impl Into<OriginId>,
        diagnostics: Arc<dyn GateDiagnostics>,
    ) -> Result<Self, GateError> {
        let origin = origin.into();
        let handle = store.get(&origin)?;
        Ok(Self::from_handle(handle, diagnostics))
    }

    /// Wrap an already loaded handle
    pub fn from_handle(handle: Arc<PolicyHandle>, diagnostics: Arc<dyn GateDiagnostics>) -> Self {
        Self {
            handle,
            diagnostics,
            options: GateOptions::default(),
        }
    }

    pub fn with_options(mut self, options: GateOptions) -> Self {
        self.options = options;
        self
    }

    pub fn origin(&self) -> &OriginId {
        self.handle.origin()
    }

    /// Snapshot the next check will evaluate against
    pub fn policy(&self) -> Arc<Policy> {
        self.handle.current()
    }

    pub fn handle(&self) -> &Arc<PolicyHandle> {
        &self.handle
    }

    /// Decide whether `type_name` may be reconstructed
    pub fn check(&self, type_name: &str) -> Decision {
        let policy = self.handle.current();
        let decision = evaluate(&policy, type_name, self.diagnostics.as_ref(), &self.options);
        metrics::record_decision(&decision);
        decision
    }
}

impl InstantiationHook for Gate {
    fn before_instantiate(&self, type_name: &str) -> Decision {
        self.check(type_name)
    }
}

impl std::fmt::Debug for Gate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gate")
            .field("origin", self.origin())
            .field("options", &self.options)
            .finish()
    }
}

/// Deny-then-allow evaluation of one name against one snapshot
///
/// In blocking mode the first deny match ends evaluation. In profiling mode
/// every deny pattern is tried, and the result is never a block.
pub fn evaluate(
    policy: &Policy,
    type_name: &str,
    diagnostics: &dyn GateDiagnostics,
    options: &GateOptions,
) -> Decision {
    let profiling = policy.is_profiling();
    let mut would_block: Option<BlockReason> = None;

    for pattern in policy.deny() {
        if !pattern.is_match(type_name) {
            continue;
        }
        let reason = BlockReason::Blacklist {
            pattern: pattern.as_str().to_string(),
        };
        if profiling {
            diagnostics.emit(&GateEvent::new(
                policy,
                EventLevel::Info,
                GateEventKind::BlacklistMatch,
                type_name,
                Some(pattern.as_str()),
            ));
            would_block.get_or_insert(reason);
        } else {
            diagnostics.emit(&GateEvent::new(
                policy,
                EventLevel::Error,
                GateEventKind::BlockedByBlacklist,
                type_name,
                Some(pattern.as_str()),
            ));
            return Decision::Block(reason);
        }
    }

    let allowed = match policy.allow().first_match(type_name) {
        Some(pattern) => {
            if profiling {
                diagnostics.emit(&GateEvent::new(
                    policy,
                    EventLevel::Info,
                    GateEventKind::WhitelistMatch,
                    type_name,
                    Some(pattern.as_str()),
                ));
            }
            true
        }
        None => false,
    };

    if profiling {
        if !allowed {
            diagnostics.emit(&GateEvent::new(
                policy,
                EventLevel::Info,
                GateEventKind::WhitelistMiss,
                type_name,
                None,
            ));
            would_block.get_or_insert(BlockReason::NotWhitelisted);
        }
        return match would_block {
            Some(reason) if options.warn_when_profiling => {
                Decision::AllowWithWarning(reason.to_string())
            }
            _ => Decision::Allow,
        };
    }

    if !allowed {
        diagnostics.emit(&GateEvent::new(
            policy,
            EventLevel::Error,
            GateEventKind::BlockedByWhitelist,
            type_name,
            None,
        ));
        return Decision::Block(BlockReason::NotWhitelisted);
    }

    Decision::Allow
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;
    use std::thread;
    use typegate_policy_center::{InMemorySource, PatternSet, StoreOptions};

    use crate::diagnostics::NullDiagnostics;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<GateEvent>>,
    }

    impl Recorder {
        fn kinds(&self) -> Vec<(EventLevel, GateEventKind)> {
            self.events
                .lock()
                .unwrap()
                .iter()
                .map(|event| (event.level, event.kind))
                .collect()
        }
    }

    impl GateDiagnostics for Recorder {
        fn info(&self, event: &GateEvent) {
            assert_eq!(event.level, EventLevel::Info);
            self.events.lock().unwrap().push(event.clone());
        }

        fn error(&self, event: &GateEvent) {
            assert_eq!(event.level, EventLevel::Error);
            self.events.lock().unwrap().push(event.clone());
        }
    }

    fn policy(deny: &[&str], allow: &[&str], profiling: bool) -> Policy {
        Policy::new(
            OriginId::from("unit"),
            PatternSet::compile(deny.iter().copied()).unwrap(),
            PatternSet::compile(allow.iter().copied()).unwrap(),
            profiling,
            1,
        )
    }

    fn run(policy: &Policy, name: &str) -> (Decision, Recorder) {
        let recorder = Recorder::default();
        let decision = evaluate(policy, name, &recorder, &GateOptions::default());
        (decision, recorder)
    }

    #[test]
    fn deny_match_blocks_regardless_of_allow() {
        let policy = policy(&["^evil\\."], &[".*"], false);
        let (decision, recorder) = run(&policy, "evil.Payload");
        assert_eq!(
            decision,
            Decision::Block(BlockReason::Blacklist {
                pattern: "^evil\\.".into()
            })
        );
        assert_eq!(
            recorder.kinds(),
            vec![(EventLevel::Error, GateEventKind::BlockedByBlacklist)]
        );
    }

    #[test]
    fn first_deny_match_short_circuits() {
        let policy = policy(&["Payload$", "^evil\\."], &[".*"], false);
        let (decision, recorder) = run(&policy, "evil.Payload");
        assert_eq!(
            decision,
            Decision::Block(BlockReason::Blacklist {
                pattern: "Payload$".into()
            })
        );
        assert_eq!(recorder.events.lock().unwrap().len(), 1);
    }

    #[test]
    fn allow_match_permits() {
        let policy = policy(&[], &["^com\\.acme\\."], false);
        let (decision, recorder) = run(&policy, "com.acme.Widget");
        assert_eq!(decision, Decision::Allow);
        assert!(recorder.kinds().is_empty());
    }

    #[test]
    fn no_allow_match_blocks() {
        let policy = policy(&[], &["^com\\.acme\\."], false);
        let (decision, recorder) = run(&policy, "org.other.Thing");
        assert_eq!(decision, Decision::Block(BlockReason::NotWhitelisted));
        assert_eq!(
            recorder.kinds(),
            vec![(EventLevel::Error, GateEventKind::BlockedByWhitelist)]
        );
    }

    #[test]
    fn empty_allow_list_fails_closed() {
        let policy = policy(&[], &[], false);
        for name in ["java.lang.String", "", "com.acme.Widget"] {
            let (decision, _) = run(&policy, name);
            assert_eq!(decision, Decision::Block(BlockReason::NotWhitelisted));
        }
    }

    #[test]
    fn profiling_never_blocks_and_records() {
        let policy = policy(&["^evil\\.", "Payload"], &[".*"], true);
        let (decision, recorder) = run(&policy, "evil.Payload");
        assert_eq!(decision, Decision::Allow);
        assert_eq!(
            recorder.kinds(),
            vec![
                (EventLevel::Info, GateEventKind::BlacklistMatch),
                (EventLevel::Info, GateEventKind::BlacklistMatch),
                (EventLevel::Info, GateEventKind::WhitelistMatch),
            ]
        );
    }

    #[test]
    fn profiling_with_empty_allow_list_still_allows() {
        let policy = policy(&[], &[], true);
        let (decision, recorder) = run(&policy, "org.other.Thing");
        assert_eq!(decision, Decision::Allow);
        assert_eq!(
            recorder.kinds(),
            vec![(EventLevel::Info, GateEventKind::WhitelistMiss)]
        );
    }

    #[test]
    fn profiling_warning_option_reports_first_would_be_block() {
        let policy = policy(&["^evil\\."], &["^com\\."], true);
        let options = GateOptions::default().warn_when_profiling();
        let decision = evaluate(&policy, "evil.Payload", &Recorder::default(), &options);
        assert_eq!(
            decision,
            Decision::AllowWithWarning("denied by blacklist".into())
        );

        let decision = evaluate(&policy, "com.acme.Widget", &Recorder::default(), &options);
        assert_eq!(decision, Decision::Allow);
    }

    #[test]
    fn decisions_are_idempotent() {
        let policy = policy(&["^evil\\."], &["^com\\."], false);
        for name in ["evil.Payload", "com.acme.Widget", "org.other.Thing"] {
            let (first, _) = run(&policy, name);
            for _ in 0..5 {
                assert_eq!(run(&policy, name).0, first);
            }
        }
    }

    #[test]
    fn events_carry_snapshot_details() {
        let policy = policy(&["^evil\\."], &[], false);
        let (_, recorder) = run(&policy, "evil.Payload");
        let events = recorder.events.lock().unwrap();
        let event = &events[0];
        assert_eq!(event.origin, OriginId::from("unit"));
        assert_eq!(event.pattern.as_deref(), Some("^evil\\."));
        assert_eq!(event.policy_version, 1);
        assert_eq!(
            event.message(),
            "Blocked by blacklist '^evil\\.'. Match found for 'evil.Payload'"
        );
    }

    #[test]
    fn gate_reads_published_snapshot() {
        let store = PolicyStore::new(StoreOptions::manual());
        let source = Arc::new(InMemorySource::new(
            "acme",
            "whitelist:\n  - \"^com\\\\.acme\\\\.\"\n",
        ));
        store.register_source("acme", source.clone());
        let gate = Gate::new(&store, "acme").unwrap();
        assert_eq!(gate.check("org.other.Thing"), Decision::Block(BlockReason::NotWhitelisted));

        source.replace("whitelist:\n  - \"^org\\\\.\"\n");
        store.tick();
        assert_eq!(gate.check("org.other.Thing"), Decision::Allow);
        assert_eq!(gate.policy().version(), 2);
    }

    #[test]
    fn construction_fails_on_invalid_pattern() {
        let store = PolicyStore::new(StoreOptions::manual());
        store.register_source(
            "broken",
            Arc::new(InMemorySource::new("broken", "whitelist:\n  - \"(unclosed\"\n")),
        );
        let err = Gate::new(&store, "broken").unwrap_err();
        assert!(matches!(
            err.policy_error(),
            typegate_policy_center::PolicyError::InvalidPattern { .. }
        ));
    }

    const FLIP_EVEN: &str = "blacklist: [\"^evil\\\\.\"]\nwhitelist: [\"^com\\\\.\"]\n";
    const FLIP_ODD: &str = "blacklist: [\"^com\\\\.\"]\nwhitelist: [\"^evil\\\\.\"]\n";

    #[test]
    fn concurrent_checks_see_whole_snapshots() {
        let store = PolicyStore::new(StoreOptions::manual());
        let source = Arc::new(InMemorySource::new("flip", FLIP_EVEN));
        store.register_source("flip", source.clone());
        let gate = Gate::with_diagnostics(&store, "flip", Arc::new(NullDiagnostics)).unwrap();
        let done = AtomicBool::new(false);

        thread::scope(|scope| {
            for _ in 0..4 {
                let gate = gate.clone();
                let done = &done;
                scope.spawn(move || loop {
                    let finished = done.load(Ordering::Acquire);
                    // a deny list from one version with the allow list of the
                    // other would refuse both names as not whitelisted
                    for name in ["com.acme.Widget", "evil.Payload"] {
                        let decision = gate.check(name);
                        assert_ne!(
                            decision,
                            Decision::Block(BlockReason::NotWhitelisted),
                            "{name}"
                        );
                    }
                    if finished {
                        break;
                    }
                });
            }

            for n in 1..=400u64 {
                source.replace(if n % 2 == 0 { FLIP_EVEN } else { FLIP_ODD });
                store.tick();
            }
            done.store(true, Ordering::Release);
        });
        assert_eq!(gate.policy().version(), 401);
    }

    fn dotted_name() -> impl Strategy<Value = String> {
        "[a-zA-Z_][a-zA-Z0-9_$]{0,8}(\\.[a-zA-Z_][a-zA-Z0-9_$]{0,8}){0,4}"
    }

    fn pattern_pool() -> impl Strategy<Value = Vec<&'static str>> {
        prop::sample::subsequence(
            vec![".*", "^com\\.", "^evil\\.", "Payload$", "[0-9]", "^java\\.util\\."],
            0..=6,
        )
    }

    fn exact(name: &str) -> String {
        format!("^{}$", name.replace('.', "\\.").replace('$', "\\$"))
    }

    proptest! {
        #[test]
        fn matching_deny_pattern_always_wins(name in dotted_name(), allow in pattern_pool()) {
            let deny = exact(&name);
            let mut allow = allow;
            allow.push(".*");
            let policy = policy(&[deny.as_str()], &allow, false);
            let decision = evaluate(&policy, &name, &NullDiagnostics, &GateOptions::default());
            prop_assert_eq!(decision, Decision::Block(BlockReason::Blacklist { pattern: deny }));
        }

        #[test]
        fn profiling_never_blocks_any_name(
            name in "\\PC{0,40}",
            deny in pattern_pool(),
            allow in pattern_pool(),
            warn in any::<bool>(),
        ) {
            let policy = policy(&deny, &allow, true);
            let mut options = GateOptions::default();
            if warn {
                options = options.warn_when_profiling();
            }
            let decision = evaluate(&policy, &name, &NullDiagnostics, &options);
            prop_assert!(decision.permits());
        }

        #[test]
        fn empty_allow_list_blocks_every_name(name in "\\PC{0,40}", deny in pattern_pool()) {
            let policy = policy(&deny, &[], false);
            let decision = evaluate(&policy, &name, &NullDiagnostics, &GateOptions::default());
            prop_assert!(decision.is_blocked());
        }
    }
}
