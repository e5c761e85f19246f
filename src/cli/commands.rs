use clap::Subcommand;

use super::check::CheckArgs;
use super::validate::ValidateArgs;
use super::watch::WatchArgs;

#[derive(Subcommand, Clone)]
pub enum Commands {
    /// Evaluate type names against a policy file
    Check(CheckArgs),

    /// Load a policy file and print its compiled summary
    Validate(ValidateArgs),

    /// Keep a policy loaded, reloading it as the file changes
    Watch(WatchArgs),
}
