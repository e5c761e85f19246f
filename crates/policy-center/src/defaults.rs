use std::time::Duration;

/// How often a cached origin's source is checked for changes.
pub const DEFAULT_RELOAD_INTERVAL: Duration = Duration::from_secs(6);
