//! Dispatch policies and the tri-state entry result.

use std::sync::Arc;

use crate::binding::Variance;
use crate::callback::{Callback, Contribution, Lookup, Resolution};
use crate::error::Result;
use crate::handler::Composer;

/// The three independent dispatch tables.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Policy {
    /// Commands and side effects; contravariant on the callback's type.
    Handle,
    /// Resolution candidates; covariant on the requested key.
    Provide,
    /// Key/value lookup; invariant.
    Lookup,
}

impl Policy {
    pub fn variance(self) -> Variance {
        match self {
            Policy::Handle => Variance::Contravariant,
            Policy::Provide => Variance::Covariant,
            Policy::Lookup => Variance::Invariant,
        }
    }
}

/// Tri-state result of one policy entry.
///
/// Distinguishes "this entry declined" from "this entry accepted and
/// legitimately produced nothing". The distinction never leaks past the
/// dispatch boundary; combinators observe booleans.
pub enum Dispatched {
    /// The entry declined; the walk continues.
    Unhandled,
    /// The entry accepted without producing a value.
    Handled,
    /// The entry accepted and produced a value, settled or deferred.
    HandledWith(Contribution),
}

/// Entry callback for the handle policy.
pub type HandleFn = Arc<dyn Fn(&mut Callback, &Composer) -> Result<Dispatched> + Send + Sync>;

/// Entry callback for the provide policy.
pub type ProvideFn = Arc<dyn Fn(&Resolution, &Composer) -> Result<Dispatched> + Send + Sync>;

/// Entry callback for the lookup policy.
pub type LookupFn = Arc<dyn Fn(&Lookup, &Composer) -> Result<Dispatched> + Send + Sync>;
