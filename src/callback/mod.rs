//! # Callback Envelopes
//!
//! A [`Callback`] is one pending unit of work flowing through a handler
//! graph. Each variant accumulates results its own way and exposes them
//! through the uniform [`Outcome`] abstraction, which hides whether results
//! are synchronous or futures.
//!
//! ## Variants
//!
//! - [`Command`]: an arbitrary user payload dispatched for side effects.
//! - [`MethodInvocation`] / [`ResolvedInvocation`]: a member access against
//!   a capability, with direct or resolution-discovered targets.
//! - [`Lookup`]: invariant key/value retrieval.
//! - [`Resolution`]: covariant resolution of a key to instances.
//! - [`Deferred`]: tracks asynchronous completions of a wrapped callback.
//! - [`Composition`]: marks a callback as routed through the composition
//!   boundary.
//! - [`InvocationSemantics`]: ambient invocation policy riding the chain.
//!
//! Envelopes are created per call, live for one `handle` traversal or until
//! their futures settle, and are then discarded.

pub mod command;
pub mod composition;
pub mod deferred;
pub mod invocation;
pub mod lookup;
pub mod outcome;
pub mod resolution;
pub mod semantics;

use std::fmt;

pub use command::Command;
pub use composition::Composition;
pub use deferred::Deferred;
pub use invocation::{MethodInvocation, OpKind, ResolvedInvocation};
pub use lookup::Lookup;
pub use outcome::{Contribution, Outcome, SequenceFuture, ValueFuture};
pub use resolution::Resolution;
pub use semantics::{InvocationOptions, InvocationSemantics};

use crate::key::Key;

/// The tagged set of envelope bodies.
#[derive(Clone)]
pub enum Body {
    Command(Command),
    Invocation(MethodInvocation),
    Resolving(ResolvedInvocation),
    Lookup(Lookup),
    Resolution(Resolution),
    Deferred(Deferred),
    Composition(Composition),
    Semantics(InvocationSemantics),
}

/// One dispatchable unit of work.
#[derive(Clone)]
pub struct Callback {
    body: Body,
}

impl Callback {
    pub fn body(&self) -> &Body {
        &self.body
    }

    pub fn body_mut(&mut self) -> &mut Body {
        &mut self.body
    }

    pub fn into_body(self) -> Body {
        self.body
    }

    /// The key dispatch matches against, when the variant has one.
    pub fn key(&self) -> Option<Key> {
        match &self.body {
            Body::Command(c) => Some(c.key().clone()),
            Body::Invocation(m) => Some(m.capability().clone()),
            Body::Resolving(m) => Some(m.invocation().capability().clone()),
            Body::Lookup(l) => Some(l.key().clone()),
            Body::Resolution(r) => Some(r.key().clone()),
            Body::Deferred(d) => d.callback().key(),
            Body::Composition(c) => c.callback().and_then(Callback::key),
            Body::Semantics(_) => None,
        }
    }

    /// True when the callback already crossed the composition boundary and
    /// should bypass non-reentrant filters. Semantics envelopes always pass.
    pub fn is_composed(&self) -> bool {
        matches!(self.body, Body::Composition(_) | Body::Semantics(_))
    }

    /// The effective result. Reads are memoized until a result is added.
    pub fn outcome(&mut self) -> Outcome {
        match &mut self.body {
            Body::Command(c) => c.outcome(),
            Body::Invocation(m) => m.outcome(),
            Body::Resolving(m) => m.invocation_mut().outcome(),
            Body::Lookup(l) => l.outcome(),
            Body::Resolution(r) => r.outcome(),
            Body::Deferred(d) => d.outcome(),
            Body::Composition(c) => c.outcome(),
            Body::Semantics(_) => Outcome::Empty,
        }
    }

    /// Overrides the effective result, as filters substituting a wrapped
    /// result do. A later accumulation recomputes from scratch.
    pub fn set_outcome(&mut self, outcome: Outcome) {
        match &mut self.body {
            Body::Command(c) => c.set_outcome(outcome),
            Body::Invocation(m) => m.set_outcome(outcome),
            Body::Resolving(m) => m.invocation_mut().set_outcome(outcome),
            Body::Lookup(l) => l.set_outcome(outcome),
            Body::Resolution(r) => r.set_outcome(outcome),
            Body::Deferred(d) => d.set_outcome(outcome),
            Body::Composition(c) => c.set_outcome(outcome),
            Body::Semantics(_) => {}
        }
    }

    fn kind_name(&self) -> &'static str {
        match &self.body {
            Body::Command(_) => "command",
            Body::Invocation(_) => "invocation",
            Body::Resolving(_) => "resolving invocation",
            Body::Lookup(_) => "lookup",
            Body::Resolution(_) => "resolution",
            Body::Deferred(_) => "deferred",
            Body::Composition(_) => "composition",
            Body::Semantics(_) => "semantics",
        }
    }
}

impl fmt::Display for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.key() {
            Some(key) => write!(f, "{}[{}]", self.kind_name(), key),
            None => write!(f, "{}", self.kind_name()),
        }
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callback")
            .field("kind", &self.kind_name())
            .field("key", &self.key())
            .finish()
    }
}

impl From<Command> for Callback {
    fn from(c: Command) -> Self {
        Self {
            body: Body::Command(c),
        }
    }
}

impl From<MethodInvocation> for Callback {
    fn from(m: MethodInvocation) -> Self {
        Self {
            body: Body::Invocation(m),
        }
    }
}

impl From<ResolvedInvocation> for Callback {
    fn from(m: ResolvedInvocation) -> Self {
        Self {
            body: Body::Resolving(m),
        }
    }
}

impl From<Lookup> for Callback {
    fn from(l: Lookup) -> Self {
        Self {
            body: Body::Lookup(l),
        }
    }
}

impl From<Resolution> for Callback {
    fn from(r: Resolution) -> Self {
        Self {
            body: Body::Resolution(r),
        }
    }
}

impl From<Deferred> for Callback {
    fn from(d: Deferred) -> Self {
        Self {
            body: Body::Deferred(d),
        }
    }
}

impl From<Composition> for Callback {
    fn from(c: Composition) -> Self {
        Self {
            body: Body::Composition(c),
        }
    }
}

impl From<InvocationSemantics> for Callback {
    fn from(s: InvocationSemantics) -> Self {
        Self {
            body: Body::Semantics(s),
        }
    }
}
