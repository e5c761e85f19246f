//! Composition of a gate with an object reconstructor
//!
//! A reconstructor reads objects from an untrusted stream. Before it
//! instantiates any type it must call the hook it was handed, and must abort
//! with [`ReconstructError::Rejected`] when the hook says so.

use typegate_core_types::{Decision, OriginId};
use typegate_policy_center::PolicyStore;

use crate::errors::{GateError, ReconstructError};
use crate::gate::Gate;

/// Callback consulted once per candidate type
pub trait InstantiationHook {
    fn before_instantiate(&self, type_name: &str) -> Decision;
}

/// Ask `hook` about `type_name`, turning a block into a rejection fault
pub fn enforce(hook: &dyn InstantiationHook, type_name: &str) -> Result<(), ReconstructError> {
    match hook.before_instantiate(type_name) {
        Decision::Block(reason) => Err(ReconstructError::Rejected {
            type_name: type_name.to_string(),
            reason,
        }),
        Decision::Allow | Decision::AllowWithWarning(_) => Ok(()),
    }
}

/// Something that rebuilds typed objects from a byte stream
pub trait Reconstructor {
    type Object;

    /// Read the next object, calling `hook` before every instantiation
    fn read_object(&mut self, hook: &dyn InstantiationHook)
        -> Result<Self::Object, ReconstructError>;
}

/// A reconstructor whose every instantiation goes through a gate
#[derive(Debug)]
pub struct GuardedReader<R> {
    inner: R,
    gate: Gate,
}

impl<R: Reconstructor> GuardedReader<R> {
    /// Bind `inner` to the policy loaded from `origin`
    ///
    /// Fails when the configuration source is missing, empty, or invalid.
    pub fn open(
        inner: R,
        store: &PolicyStore,
        origin: impl Into<OriginId>,
    ) -> Result<Self, GateError> {
        Ok(Self::new(inner, Gate::new(store, origin)?))
    }

    pub fn new(inner: R, gate: Gate) -> Self {
        Self { inner, gate }
    }

    pub fn read_object(&mut self) -> Result<R::Object, ReconstructError> {
        self.inner.read_object(&self.gate)
    }

    pub fn gate(&self) -> &Gate {
        &self.gate
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}
