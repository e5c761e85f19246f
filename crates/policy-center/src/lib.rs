pub mod defaults;
pub mod errors;
pub mod handle;
pub mod loader;
pub mod metrics;
pub mod model;
pub mod pattern;
pub mod scheduler;
pub mod source;
pub mod store;

pub use defaults::DEFAULT_RELOAD_INTERVAL;
pub use errors::PolicyError;
pub use handle::{PolicyHandle, ReloadOutcome};
pub use loader::{compile_policy, load_policy, parse_document};
pub use model::{Policy, PolicyDocument, PolicySummary};
pub use pattern::{Pattern, PatternSet};
pub use scheduler::ReloadScheduler;
pub use source::{ConfigSource, FileSource, InMemorySource, SourceStamp};
pub use store::{PolicyStore, StoreOptions};
