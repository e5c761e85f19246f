use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use typegate_core_types::OriginId;

use crate::errors::PolicyError;
use crate::loader::load_policy;
use crate::metrics;
use crate::model::Policy;
use crate::source::{ConfigSource, SourceStamp};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReloadOutcome {
    Unchanged,
    Reloaded { version: u64 },
}

struct ReloadState {
    stamp: SourceStamp,
    version: u64,
    failures: u64,
    last_error: Option<PolicyError>,
}

/// Live policy for one origin.
///
/// Readers take the published snapshot without locking. Reloads are
/// serialized by `reload_state` and publish with a single pointer swap, so a
/// reader never sees a deny list and an allow list from different loads.
pub struct PolicyHandle {
    origin: OriginId,
    source: Arc<dyn ConfigSource>,
    current: ArcSwap<Policy>,
    reload_state: Mutex<ReloadState>,
}

impl PolicyHandle {
    /// Performs the initial load. Any failure here is fatal for the caller.
    pub fn open(origin: OriginId, source: Arc<dyn ConfigSource>) -> Result<Self, PolicyError> {
        let (policy, stamp) = load_policy(&origin, source.as_ref(), 1)?;
        info!(
            origin = %origin,
            source = %source.describe(),
            deny = policy.deny().len(),
            allow = policy.allow().len(),
            profiling = policy.is_profiling(),
            "policy loaded"
        );
        Ok(Self {
            origin,
            source,
            current: ArcSwap::from_pointee(policy),
            reload_state: Mutex::new(ReloadState {
                stamp,
                version: 1,
                failures: 0,
                last_error: None,
            }),
        })
    }

    pub fn origin(&self) -> &OriginId {
        &self.origin
    }

    pub fn source(&self) -> &dyn ConfigSource {
        self.source.as_ref()
    }

    /// Currently published snapshot.
    pub fn current(&self) -> Arc<Policy> {
        self.current.load_full()
    }

    pub fn version(&self) -> u64 {
        self.current.load().version()
    }

    /// Reloads only when the source stamp moved since the last successful load.
    pub fn reload_if_needed(&self) -> Result<ReloadOutcome, PolicyError> {
        self.reload(false)
    }

    pub fn force_reload(&self) -> Result<ReloadOutcome, PolicyError> {
        self.reload(true)
    }

    pub fn consecutive_failures(&self) -> u64 {
        self.reload_state.lock().failures
    }

    pub fn last_error(&self) -> Option<PolicyError> {
        self.reload_state.lock().last_error.clone()
    }

    fn reload(&self, force: bool) -> Result<ReloadOutcome, PolicyError> {
        let mut state = self.reload_state.lock();
        let result = self.try_reload(&mut state, force);
        match &result {
            Ok(ReloadOutcome::Reloaded { .. }) => {
                state.failures = 0;
                state.last_error = None;
                metrics::record_reload("reloaded");
            }
            Ok(ReloadOutcome::Unchanged) => {
                state.failures = 0;
                state.last_error = None;
                metrics::record_reload("unchanged");
            }
            Err(err) => {
                state.failures += 1;
                state.last_error = Some(err.clone());
                metrics::record_reload("failed");
            }
        }
        result
    }

    fn try_reload(
        &self,
        state: &mut ReloadState,
        force: bool,
    ) -> Result<ReloadOutcome, PolicyError> {
        let stamp = self.source.stamp()?;
        if !force && stamp == state.stamp {
            return Ok(ReloadOutcome::Unchanged);
        }
        let version = state.version + 1;
        let (policy, stamp) = load_policy(&self.origin, self.source.as_ref(), version)?;
        self.current.store(Arc::new(policy));
        state.stamp = stamp;
        state.version = version;
        Ok(ReloadOutcome::Reloaded { version })
    }
}

impl std::fmt::Debug for PolicyHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyHandle")
            .field("origin", &self.origin)
            .field("source", &self.source.describe())
            .field("version", &self.version())
            .finish()
    }
}

/// Logs a reload result. Repeated failures drop to debug after the first.
pub(crate) fn report_reload(handle: &PolicyHandle, result: &Result<ReloadOutcome, PolicyError>) {
    match result {
        Ok(ReloadOutcome::Reloaded { version }) => {
            info!(origin = %handle.origin(), version, "policy reloaded");
        }
        Ok(ReloadOutcome::Unchanged) => {
            debug!(origin = %handle.origin(), "policy source unchanged");
        }
        Err(err) => {
            let failures = handle.consecutive_failures();
            let version = handle.version();
            if failures <= 1 {
                warn!(
                    origin = %handle.origin(),
                    version,
                    error = %err,
                    "policy reload failed; retaining last-known-good policy"
                );
            } else {
                debug!(
                    origin = %handle.origin(),
                    version,
                    failures,
                    error = %err,
                    "policy reload still failing"
                );
            }
        }
    }
}
