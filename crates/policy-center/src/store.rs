use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use typegate_core_types::OriginId;

use crate::defaults::DEFAULT_RELOAD_INTERVAL;
use crate::errors::PolicyError;
use crate::handle::{report_reload, PolicyHandle, ReloadOutcome};
use crate::metrics;
use crate::scheduler::ReloadScheduler;
use crate::source::{ConfigSource, FileSource};

#[derive(Clone, Debug)]
pub struct StoreOptions {
    pub reload_interval: Duration,
    /// Spawn a reload task per origin. Needs an ambient tokio runtime.
    pub background_reload: bool,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            reload_interval: DEFAULT_RELOAD_INTERVAL,
            background_reload: true,
        }
    }
}

impl StoreOptions {
    /// Reloads happen only through `PolicyStore::tick` or explicit calls.
    pub fn manual() -> Self {
        Self {
            background_reload: false,
            ..Self::default()
        }
    }

    pub fn with_reload_interval(mut self, interval: Duration) -> Self {
        self.reload_interval = interval;
        self
    }
}

struct StoreEntry {
    handle: Arc<PolicyHandle>,
    scheduler: Option<ReloadScheduler>,
}

/// Registry of loaded policies, one entry per origin id.
///
/// Entries are created on first use and live until `reset` or drop. Every
/// gate bound to the same origin shares one handle and one reload task.
pub struct PolicyStore {
    options: StoreOptions,
    runtime: Option<Handle>,
    sources: DashMap<OriginId, Arc<dyn ConfigSource>>,
    entries: DashMap<OriginId, StoreEntry>,
    /// Per-origin first-load locks; only callers for the same origin wait.
    loading: DashMap<OriginId, Arc<Mutex<()>>>,
    stopped: AtomicBool,
    /// Held shared while inserting an entry and exclusively by `shutdown` and
    /// `reset`, so no entry slips in half-way through either.
    lifecycle: RwLock<()>,
}

impl PolicyStore {
    /// Picks up the current tokio runtime, if any, for background reloads.
    pub fn new(options: StoreOptions) -> Self {
        Self::build(options, Handle::try_current().ok())
    }

    pub fn with_runtime(options: StoreOptions, runtime: Handle) -> Self {
        Self::build(options, Some(runtime))
    }

    fn build(options: StoreOptions, runtime: Option<Handle>) -> Self {
        if options.background_reload && runtime.is_none() {
            info!("no tokio runtime available; policy reloads are tick-driven");
        }
        Self {
            options,
            runtime,
            sources: DashMap::new(),
            entries: DashMap::new(),
            loading: DashMap::new(),
            stopped: AtomicBool::new(false),
            lifecycle: RwLock::new(()),
        }
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    /// Binds an origin id to a specific source. Unregistered ids are file paths.
    ///
    /// Returns false when the origin is already cached: the cached handle keeps
    /// its current source and the new one only applies after `reset`.
    pub fn register_source(
        &self,
        origin: impl Into<OriginId>,
        source: Arc<dyn ConfigSource>,
    ) -> bool {
        let origin = origin.into();
        let cached = self.entries.contains_key(&origin);
        if cached {
            warn!(
                origin = %origin,
                source = %source.describe(),
                "origin already loaded; new source applies after reset"
            );
        }
        self.sources.insert(origin, source);
        !cached
    }

    fn resolve_source(&self, origin: &OriginId) -> Arc<dyn ConfigSource> {
        match self.sources.get(origin) {
            Some(source) => Arc::clone(source.value()),
            None => Arc::new(FileSource::new(origin.as_str())),
        }
    }

    /// Returns the cached handle for `origin`, loading it on first request.
    ///
    /// A failed first load caches nothing; the next call tries again. The
    /// source is read without holding any map lock, so a slow first load only
    /// delays callers asking for that same origin.
    pub fn get(&self, origin: &OriginId) -> Result<Arc<PolicyHandle>, PolicyError> {
        if let Some(entry) = self.entries.get(origin) {
            return Ok(Arc::clone(&entry.handle));
        }

        let slot = Arc::clone(self.loading.entry(origin.clone()).or_default().value());
        let result = {
            let _guard = slot.lock();
            self.load_entry(origin)
        };
        self.loading
            .remove_if(origin, |_, current| Arc::ptr_eq(current, &slot));
        result
    }

    fn load_entry(&self, origin: &OriginId) -> Result<Arc<PolicyHandle>, PolicyError> {
        if let Some(entry) = self.entries.get(origin) {
            return Ok(Arc::clone(&entry.handle));
        }

        let source = self.resolve_source(origin);
        let loaded = Arc::new(PolicyHandle::open(origin.clone(), source)?);
        let _lifecycle = self.lifecycle.read();
        let handle = match self.entries.entry(origin.clone()) {
            Entry::Occupied(entry) => Arc::clone(&entry.get().handle),
            Entry::Vacant(vacant) => {
                let scheduler = self.start_scheduler(&loaded);
                vacant.insert(StoreEntry {
                    handle: Arc::clone(&loaded),
                    scheduler,
                });
                metrics::origins_added(1);
                loaded
            }
        };
        Ok(handle)
    }

    fn start_scheduler(&self, handle: &Arc<PolicyHandle>) -> Option<ReloadScheduler> {
        if !self.options.background_reload || self.stopped.load(Ordering::Acquire) {
            return None;
        }
        let Some(runtime) = self.runtime.as_ref() else {
            debug!(origin = %handle.origin(), "background reload skipped without runtime");
            return None;
        };
        Some(ReloadScheduler::spawn(
            runtime,
            handle,
            self.options.reload_interval,
        ))
    }

    pub fn reload_if_needed(&self, handle: &PolicyHandle) -> Result<ReloadOutcome, PolicyError> {
        let result = handle.reload_if_needed();
        report_reload(handle, &result);
        result
    }

    /// One reload pass over every cached origin.
    pub fn tick(&self) -> Vec<(OriginId, Result<ReloadOutcome, PolicyError>)> {
        let handles: Vec<Arc<PolicyHandle>> = self
            .entries
            .iter()
            .map(|entry| Arc::clone(&entry.handle))
            .collect();
        handles
            .into_iter()
            .map(|handle| {
                let result = self.reload_if_needed(&handle);
                (handle.origin().clone(), result)
            })
            .collect()
    }

    pub fn contains(&self, origin: &OriginId) -> bool {
        self.entries.contains_key(origin)
    }

    pub fn origins(&self) -> Vec<OriginId> {
        let mut origins: Vec<OriginId> = self.entries.iter().map(|e| e.key().clone()).collect();
        origins.sort();
        origins
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of origins with a live background reload task.
    pub fn active_schedulers(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| {
                entry
                    .scheduler
                    .as_ref()
                    .map(|scheduler| !scheduler.is_stopped())
                    .unwrap_or(false)
            })
            .count()
    }

    /// Stops every reload task. Cached policies stay readable; new origins
    /// loaded afterwards get no background task.
    pub fn shutdown(&self) {
        let _lifecycle = self.lifecycle.write();
        self.stopped.store(true, Ordering::Release);
        for entry in self.entries.iter() {
            if let Some(scheduler) = entry.scheduler.as_ref() {
                scheduler.stop();
            }
        }
        debug!(origins = self.entries.len(), "policy store shut down");
    }

    /// Stops reload tasks and forgets every cached origin.
    ///
    /// Also undoes `shutdown`: origins requested afterwards are loaded again
    /// with a fresh reload task.
    pub fn reset(&self) {
        let _lifecycle = self.lifecycle.write();
        let mut removed = 0;
        self.entries.retain(|_, entry| {
            if let Some(scheduler) = entry.scheduler.as_ref() {
                scheduler.stop();
            }
            removed += 1;
            false
        });
        self.stopped.store(false, Ordering::Release);
        metrics::origins_removed(removed);
        debug!(removed, "policy store reset");
    }
}

impl Drop for PolicyStore {
    fn drop(&mut self) {
        metrics::origins_removed(self.entries.len());
    }
}

impl Default for PolicyStore {
    fn default() -> Self {
        Self::new(StoreOptions::default())
    }
}

impl std::fmt::Debug for PolicyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyStore")
            .field("options", &self.options)
            .field("origins", &self.origins())
            .finish()
    }
}
