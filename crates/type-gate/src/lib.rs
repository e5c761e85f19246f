//! Look-ahead deserialization gate
//!
//! This crate decides, per fully-qualified type name, whether an object may
//! be reconstructed from an untrusted stream:
//! - Deny patterns are evaluated first and win over allow patterns
//! - At least one allow pattern must match in blocking mode
//! - Profiling mode never blocks and reports what it would have done
//! - Policies come from a shared, hot-reloaded `PolicyStore`

pub mod diagnostics;
pub mod errors;
pub mod gate;
pub mod metrics;
pub mod reconstructor;
pub mod types;

pub use diagnostics::*;
pub use errors::*;
pub use gate::*;
pub use reconstructor::*;
pub use types::*;

pub use typegate_core_types::{BlockReason, Decision, OriginId};
