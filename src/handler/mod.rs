//! # Handlers
//!
//! The dispatch capability and its composition graph.
//!
//! A handler is anything implementing [`Handling`]: given an envelope, a
//! greedy flag and the composition context, attempt to satisfy it and
//! report whether it was handled. Leaf handlers dispatch through policy
//! tables; [`CascadeHandler`] and [`CompositeHandler`] combine handlers
//! into graphs; decorator combinators wrap a handler value and return a new
//! one.
//!
//! [`HandlerRef`] is the owned, cheaply clonable reference callers hold. It
//! carries the convenience entry points (`resolve`, `lookup`, `command`,
//! `defer` and friends) that build an envelope, drive one dispatch and read
//! the outcome.

pub mod cascade;
pub mod composer;
pub mod composite;
pub mod leaf;
pub mod options;
pub mod when;

use std::any::Any;
use std::sync::Arc;

pub use cascade::CascadeHandler;
pub use composer::Composer;
pub use composite::CompositeHandler;
pub use leaf::{Handler, HandlerBuilder};
pub use options::CallOptionsHandler;
pub use when::WhenHandler;

use crate::callback::{
    Body, Callback, Command, Deferred, InvocationSemantics, Lookup, Outcome, Resolution,
};
use crate::error::{DispatchError, Result};
use crate::key::{Key, Value};

/// The capability to satisfy callbacks.
pub trait Handling: Send + Sync + 'static {
    /// Attempts to satisfy `callback`. Greedy dispatch visits every
    /// matching participant instead of stopping at the first.
    fn handle(&self, callback: &mut Callback, greedy: bool, composer: &Composer) -> Result<bool>;

    /// The backing delegate value, when this handler fronts one.
    fn delegate(&self) -> Option<&Value> {
        None
    }
}

/// Owned, clonable reference to a handler graph node.
#[derive(Clone)]
pub struct HandlerRef {
    inner: Arc<dyn Handling>,
}

impl HandlerRef {
    pub fn new(handler: impl Handling) -> Self {
        Self {
            inner: Arc::new(handler),
        }
    }

    pub fn from_arc(handler: Arc<dyn Handling>) -> Self {
        Self { inner: handler }
    }

    /// A leaf handler fronting `delegate`, participating in resolution for
    /// every key its concrete type satisfies.
    pub fn wrap<T: Any + Send + Sync>(delegate: T) -> Self {
        Self::new(Handler::wrap(delegate))
    }

    /// Node identity, used by composites when removing members.
    pub fn same(&self, other: &HandlerRef) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn node(&self) -> &Arc<dyn Handling> {
        &self.inner
    }

    /// Primary dispatch entry: establishes a composition scope and hands
    /// the envelope to the graph.
    pub fn dispatch(&self, callback: &mut Callback, greedy: bool) -> Result<bool> {
        let composer = Composer::scope(self.clone());
        self.inner.handle(callback, greedy, &composer)
    }

    /// Resolves a key to a single instance.
    pub fn resolve(&self, key: impl Into<Key>) -> Result<Option<Outcome>> {
        let mut cb = Callback::from(Resolution::new(key));
        if self.dispatch(&mut cb, false)? {
            Ok(Some(cb.outcome()))
        } else {
            Ok(None)
        }
    }

    /// Resolves a key to every available instance.
    pub fn resolve_all(&self, key: impl Into<Key>) -> Result<Outcome> {
        let mut cb = Callback::from(Resolution::all(key));
        if self.dispatch(&mut cb, true)? {
            Ok(cb.outcome())
        } else {
            Ok(Outcome::ReadyMany(Vec::new()))
        }
    }

    /// Looks up a value registered under an exact key.
    pub fn lookup(&self, key: impl Into<Key>) -> Result<Option<Outcome>> {
        let mut cb = Callback::from(Lookup::new(key));
        if self.dispatch(&mut cb, false)? {
            Ok(Some(cb.outcome()))
        } else {
            Ok(None)
        }
    }

    /// Looks up every value registered under an exact key.
    pub fn lookup_all(&self, key: impl Into<Key>) -> Result<Outcome> {
        let mut cb = Callback::from(Lookup::all(key));
        if self.dispatch(&mut cb, true)? {
            Ok(cb.outcome())
        } else {
            Ok(Outcome::ReadyMany(Vec::new()))
        }
    }

    /// Dispatches a payload, tracking asynchronous completion. The outcome
    /// settles to the all-settled signal; an unhandled payload is reported
    /// through the boolean, not an error.
    pub fn defer<T: Any + Send + Sync>(&self, payload: T) -> Result<(bool, Outcome)> {
        let mut cb = Callback::from(Deferred::new(Callback::from(Command::new(payload))));
        let handled = self.dispatch(&mut cb, false)?;
        Ok((handled, cb.outcome()))
    }

    /// Greedy [`defer`](Self::defer).
    pub fn defer_all<T: Any + Send + Sync>(&self, payload: T) -> Result<(bool, Outcome)> {
        let mut cb = Callback::from(Deferred::all(Callback::from(Command::new(payload))));
        let handled = self.dispatch(&mut cb, true)?;
        Ok((handled, cb.outcome()))
    }

    /// Dispatches a payload that must be accepted; an unhandled payload is
    /// a hard failure.
    pub fn command<T: Any + Send + Sync>(&self, payload: T) -> Result<Outcome> {
        let mut cb = Callback::from(Deferred::new(Callback::from(Command::new(payload))));
        if !self.dispatch(&mut cb, false)? {
            return Err(DispatchError::NotHandled(Box::new(cb)));
        }
        Ok(cb.outcome())
    }

    /// Greedy [`command`](Self::command).
    pub fn command_all<T: Any + Send + Sync>(&self, payload: T) -> Result<Outcome> {
        let mut cb = Callback::from(Deferred::all(Callback::from(Command::new(payload))));
        if !self.dispatch(&mut cb, true)? {
            return Err(DispatchError::NotHandled(Box::new(cb)));
        }
        Ok(cb.outcome())
    }

    /// Reads the ambient invocation semantics carried by this chain.
    pub fn ambient_semantics(&self) -> Result<InvocationSemantics> {
        let mut cb = Callback::from(InvocationSemantics::default());
        self.dispatch(&mut cb, true)?;
        match cb.body() {
            Body::Semantics(s) => Ok(*s),
            _ => Ok(InvocationSemantics::default()),
        }
    }
}

impl Handling for HandlerRef {
    fn handle(&self, callback: &mut Callback, greedy: bool, composer: &Composer) -> Result<bool> {
        self.inner.handle(callback, greedy, composer)
    }

    fn delegate(&self) -> Option<&Value> {
        self.inner.delegate()
    }
}
