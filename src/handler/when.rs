//! Conditional handler: only callbacks matching a constraint pass through.

use crate::binding::{Binding, Variance};
use crate::callback::{Body, Callback};
use crate::error::Result;
use crate::handler::{Composer, HandlerRef, Handling};
use crate::key::Key;

/// Gates an inner handler behind a key constraint.
///
/// Deferrals are tested against their wrapped callback's key and
/// resolutions covariantly against the requested key; everything else is
/// tested contravariantly against the callback's own key.
pub struct WhenHandler {
    inner: HandlerRef,
    constraint: Binding,
}

impl WhenHandler {
    pub fn new(inner: HandlerRef, constraint: impl Into<Key>) -> Self {
        Self {
            inner,
            constraint: Binding::new(constraint),
        }
    }

    fn applies(&self, callback: &Callback) -> bool {
        match callback.body() {
            Body::Deferred(d) => d
                .callback()
                .key()
                .is_some_and(|k| self.constraint.matches(&k, Variance::Contravariant)),
            Body::Resolution(r) => self.constraint.matches(r.key(), Variance::Covariant),
            _ => callback
                .key()
                .is_some_and(|k| self.constraint.matches(&k, Variance::Contravariant)),
        }
    }
}

impl Handling for WhenHandler {
    fn handle(&self, callback: &mut Callback, greedy: bool, composer: &Composer) -> Result<bool> {
        if self.applies(callback) {
            self.inner.handle(callback, greedy, composer)
        } else {
            Ok(false)
        }
    }
}

impl HandlerRef {
    /// Restricts this handler to callbacks matching `constraint`.
    pub fn when(&self, constraint: impl Into<Key>) -> HandlerRef {
        HandlerRef::new(WhenHandler::new(self.clone(), constraint))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callback::Command;
    use crate::dispatch::Dispatched;
    use crate::handler::Handler;
    use crate::hierarchy::relate_types;
    use std::sync::Arc;

    struct Event;
    struct Saved;
    struct Deleted;

    #[test]
    fn gated_handler_only_sees_matching_callbacks() {
        relate_types::<Saved, Event>();

        let handler = HandlerRef::new(Handler::accepting(
            Key::of::<Event>(),
            Arc::new(|_cb, _composer| Ok(Dispatched::Handled)),
        ))
        .when(Key::of::<Event>());

        let mut saved = Callback::from(Command::new(Saved));
        assert!(handler.dispatch(&mut saved, false).unwrap());

        let mut deleted = Callback::from(Command::new(Deleted));
        assert!(!handler.dispatch(&mut deleted, false).unwrap());
    }
}
