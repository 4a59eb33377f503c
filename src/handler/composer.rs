//! # Composer
//!
//! The explicit composition context threaded through every dispatch.
//!
//! Leaf operations receive a [`Composer`] and use it for nested dispatch
//! back into the full handler graph. Every callback issued through a
//! composer is wrapped in a [`Composition`](crate::callback::Composition)
//! first, marking it as having crossed the composition boundary so that
//! non-reentrant filters do not re-enter themselves.
//!
//! The composer is an owned, clonable value rather than ambient state, so
//! nested and asynchronous dispatches cannot corrupt one another's context
//! and result-future continuations can capture it.

use std::any::Any;

use crate::callback::{Callback, Command, Composition, Deferred, Lookup, Outcome, Resolution};
use crate::error::Result;
use crate::handler::{HandlerRef, Handling};
use crate::key::Key;

/// The ambient handler context available during dispatch.
#[derive(Clone)]
pub struct Composer {
    root: HandlerRef,
}

impl Composer {
    pub(crate) fn scope(root: HandlerRef) -> Self {
        Self { root }
    }

    /// The graph this composer dispatches into.
    pub fn handler(&self) -> &HandlerRef {
        &self.root
    }

    /// Dispatches a callback through the composition boundary.
    pub fn handle(&self, callback: &mut Callback, greedy: bool) -> Result<bool> {
        if callback.is_composed() {
            return self.root.node().handle(callback, greedy, self);
        }
        let inner = std::mem::replace(callback, Callback::from(Composition::empty()));
        let mut composed = Callback::from(Composition::new(inner));
        let handled = self.root.node().handle(&mut composed, greedy, self);
        if let crate::callback::Body::Composition(composition) = composed.into_body() {
            if let Some(inner) = composition.into_inner() {
                *callback = inner;
            }
        }
        handled
    }

    /// Resolves a key to a single instance, composed.
    pub fn resolve(&self, key: impl Into<Key>) -> Result<Option<Outcome>> {
        let mut cb = self.composed(Resolution::new(key));
        if self.root.node().handle(&mut cb, false, self)? {
            Ok(Some(cb.outcome()))
        } else {
            Ok(None)
        }
    }

    /// Resolves a key to every available instance, composed.
    pub fn resolve_all(&self, key: impl Into<Key>) -> Result<Outcome> {
        let mut cb = self.composed(Resolution::all(key));
        if self.root.node().handle(&mut cb, true, self)? {
            Ok(cb.outcome())
        } else {
            Ok(Outcome::ReadyMany(Vec::new()))
        }
    }

    /// Looks up a key, composed.
    pub fn lookup(&self, key: impl Into<Key>) -> Result<Option<Outcome>> {
        let mut cb = self.composed(Lookup::new(key));
        if self.root.node().handle(&mut cb, false, self)? {
            Ok(Some(cb.outcome()))
        } else {
            Ok(None)
        }
    }

    /// Looks up every value under a key, composed.
    pub fn lookup_all(&self, key: impl Into<Key>) -> Result<Outcome> {
        let mut cb = self.composed(Lookup::all(key));
        if self.root.node().handle(&mut cb, true, self)? {
            Ok(cb.outcome())
        } else {
            Ok(Outcome::ReadyMany(Vec::new()))
        }
    }

    /// Dispatches a payload with completion tracking, composed.
    pub fn defer<T: Any + Send + Sync>(&self, payload: T) -> Result<(bool, Outcome)> {
        let mut cb = self.composed(Deferred::new(Callback::from(Command::new(payload))));
        let handled = self.root.node().handle(&mut cb, false, self)?;
        Ok((handled, cb.outcome()))
    }

    fn composed(&self, envelope: impl Into<Callback>) -> Callback {
        Callback::from(Composition::new(envelope.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::Dispatched;
    use crate::handler::Handler;
    use crate::key::downcast;
    use std::sync::Arc;

    #[test]
    fn nested_dispatch_is_marked_composed() {
        // A provider that asks the composer for a lookup; the nested
        // callback must arrive composed.
        let handler = HandlerRef::new(
            Handler::builder()
                .looks_up_value("inner", 9u32)
                .provides_key(
                    Key::named("svc"),
                    Arc::new(|_resolution, composer| {
                        let out = composer.lookup("inner")?.expect("inner lookup");
                        Ok(Dispatched::HandledWith(
                            crate::callback::Contribution::Ready(out.ready().unwrap().clone()),
                        ))
                    }),
                )
                .build(),
        );
        let out = handler.resolve(Key::named("svc")).unwrap().unwrap();
        assert_eq!(*downcast::<u32>(out.ready().unwrap()).unwrap(), 9);
    }

    #[test]
    fn handle_restores_the_original_envelope() {
        let handler = HandlerRef::new(Handler::builder().looks_up_value("k", 1u32).build());
        let composer = Composer::scope(handler);
        let mut cb = Callback::from(Lookup::new("k"));
        assert!(composer.handle(&mut cb, false).unwrap());
        // The caller still holds the lookup itself, not the wrapper.
        assert!(!cb.is_composed());
        assert_eq!(*downcast::<u32>(cb.outcome().ready().unwrap()).unwrap(), 1);
    }
}
