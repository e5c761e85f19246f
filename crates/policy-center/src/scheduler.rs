use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::{self, JoinHandle};
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::handle::{report_reload, PolicyHandle};

const MIN_RELOAD_INTERVAL: Duration = Duration::from_millis(10);

/// Background task polling one origin's source for changes.
///
/// The task only keeps a weak reference to the handle and ends on its own
/// once the handle is dropped.
pub struct ReloadScheduler {
    cancel: CancellationToken,
    task: JoinHandle<()>,
    interval: Duration,
}

impl ReloadScheduler {
    pub fn spawn(runtime: &Handle, handle: &Arc<PolicyHandle>, interval: Duration) -> Self {
        let interval = interval.max(MIN_RELOAD_INTERVAL);
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let weak = Arc::downgrade(handle);
        let origin = handle.origin().clone();

        let task = runtime.spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                let Some(handle) = weak.upgrade() else {
                    break;
                };
                check_once(handle).await;
            }
            debug!(origin = %origin, "reload scheduler stopped");
        });

        debug!(
            origin = %handle.origin(),
            interval_ms = interval.as_millis() as u64,
            "reload scheduler started"
        );
        Self {
            cancel,
            task,
            interval,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled() || self.task.is_finished()
    }
}

impl Drop for ReloadScheduler {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn check_once(handle: Arc<PolicyHandle>) {
    let worker = Arc::clone(&handle);
    match task::spawn_blocking(move || worker.reload_if_needed()).await {
        Ok(result) => report_reload(&handle, &result),
        Err(err) => {
            error!(origin = %handle.origin(), ?err, "policy reload task panicked");
        }
    }
}
