pub mod app;
pub mod check;
pub mod commands;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod env;
pub mod output;
pub mod runtime;
pub mod validate;
pub mod watch;

pub use check::{cmd_check, CheckArgs};
pub use validate::{cmd_validate, ValidateArgs};
pub use watch::{cmd_watch, WatchArgs};
