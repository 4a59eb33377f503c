//! # Filter Pipeline
//!
//! Decorates handlers with cross-cutting behavior. A filter intercepts
//! every dispatch through `(callback, composer, proceed)`, where `proceed`
//! invokes the next layer. Unless registered reentrant, a filter is
//! bypassed by callbacks that already crossed the composition boundary,
//! preventing a filter's own nested dispatch from re-entering it.
//!
//! [`aspect`](crate::handler::HandlerRef::aspect) builds before/after hooks
//! on top of `filter`; the resilience helpers (guard, activity, promises,
//! timeout) build on `aspect` and `filter` in turn. Provider-driven
//! pipelines with ordering and required-ness live in [`provider`].

pub mod aspect;
pub mod provider;
pub mod resilience;

use std::sync::Arc;

pub use aspect::{AfterFn, BeforeFn, Decision, Gate};
pub use provider::{FilterSet, FilteredHandler, Filtering, FilteringProvider};
pub use resilience::ActivityCounter;

use crate::callback::Callback;
use crate::error::Result;
use crate::handler::{Composer, HandlerRef, Handling};
use crate::key::Value;

/// A filter body: inspect, reject or forward the dispatch.
pub type FilterFn =
    Arc<dyn Fn(&mut Callback, &Composer, Proceed<'_>) -> Result<bool> + Send + Sync>;

/// Invokes the next pipeline layer.
pub struct Proceed<'a> {
    inner: &'a HandlerRef,
    greedy: bool,
    composer: &'a Composer,
}

impl Proceed<'_> {
    pub fn call(&self, callback: &mut Callback) -> Result<bool> {
        self.inner.handle(callback, self.greedy, self.composer)
    }

    /// An owned form that a deferred decision can run later.
    pub fn detach(&self) -> DetachedProceed {
        DetachedProceed {
            inner: self.inner.clone(),
            greedy: self.greedy,
            composer: self.composer.clone(),
        }
    }
}

/// Owned continuation into the next pipeline layer.
#[derive(Clone)]
pub struct DetachedProceed {
    inner: HandlerRef,
    greedy: bool,
    composer: Composer,
}

impl DetachedProceed {
    pub fn call(&self, callback: &mut Callback) -> Result<bool> {
        self.inner.handle(callback, self.greedy, &self.composer)
    }

    pub fn composer(&self) -> &Composer {
        &self.composer
    }
}

/// Routes every dispatch through a filter body.
pub struct FilterHandler {
    inner: HandlerRef,
    filter: FilterFn,
    reentrant: bool,
}

impl FilterHandler {
    pub fn new(inner: HandlerRef, filter: FilterFn, reentrant: bool) -> Self {
        Self {
            inner,
            filter,
            reentrant,
        }
    }
}

impl Handling for FilterHandler {
    fn handle(&self, callback: &mut Callback, greedy: bool, composer: &Composer) -> Result<bool> {
        if !self.reentrant && callback.is_composed() {
            return self.inner.handle(callback, greedy, composer);
        }
        (self.filter)(
            callback,
            composer,
            Proceed {
                inner: &self.inner,
                greedy,
                composer,
            },
        )
    }

    fn delegate(&self) -> Option<&Value> {
        self.inner.delegate()
    }
}

impl HandlerRef {
    /// Routes every dispatch through `filter`. Non-reentrant filters are
    /// bypassed by composed callbacks.
    pub fn filter<F>(&self, filter: F, reentrant: bool) -> HandlerRef
    where
        F: Fn(&mut Callback, &Composer, Proceed<'_>) -> Result<bool> + Send + Sync + 'static,
    {
        HandlerRef::new(FilterHandler::new(
            self.clone(),
            Arc::new(filter),
            reentrant,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callback::{Command, Contribution};
    use crate::dispatch::Dispatched;
    use crate::handler::Handler;
    use crate::key::{value, Key};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Ping;

    fn accepting_ping() -> HandlerRef {
        HandlerRef::new(Handler::accepting(
            Key::of::<Ping>(),
            Arc::new(|_cb, _composer| Ok(Dispatched::Handled)),
        ))
    }

    #[test]
    fn filter_sees_every_top_level_dispatch() {
        let seen = Arc::new(AtomicUsize::new(0));
        let seen2 = seen.clone();
        let handler = accepting_ping().filter(
            move |cb, _composer, proceed| {
                seen2.fetch_add(1, Ordering::SeqCst);
                proceed.call(cb)
            },
            false,
        );
        let mut cb = Callback::from(Command::new(Ping));
        assert!(handler.dispatch(&mut cb, false).unwrap());
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn filter_can_substitute_a_result() {
        let handler = accepting_ping().filter(
            |cb, _composer, proceed| {
                let handled = proceed.call(cb)?;
                cb.set_outcome(crate::callback::Outcome::Ready(value(99u32)));
                Ok(handled)
            },
            false,
        );
        let mut cb = Callback::from(Command::new(Ping));
        assert!(handler.dispatch(&mut cb, false).unwrap());
        let out = cb.outcome();
        assert_eq!(
            *crate::key::downcast::<u32>(out.ready().unwrap()).unwrap(),
            99
        );
    }

    #[test]
    fn composed_callbacks_bypass_non_reentrant_filters() {
        let seen = Arc::new(AtomicUsize::new(0));
        let seen2 = seen.clone();
        // The handler resolves a key by looking one up through the
        // composer; the nested lookup must not re-enter the filter.
        let handler = HandlerRef::new(
            Handler::builder()
                .looks_up_value("inner", 1u32)
                .provides_key(
                    Key::named("svc"),
                    Arc::new(|_resolution, composer| {
                        let out = composer.lookup("inner")?.expect("inner lookup");
                        Ok(Dispatched::HandledWith(Contribution::Ready(
                            out.ready().unwrap().clone(),
                        )))
                    }),
                )
                .build(),
        )
        .filter(
            move |cb, _composer, proceed| {
                seen2.fetch_add(1, Ordering::SeqCst);
                proceed.call(cb)
            },
            false,
        );

        let out = handler.resolve(Key::named("svc")).unwrap();
        assert!(out.is_some());
        // Only the outer resolution passed through the filter.
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn reentrant_filters_see_composed_callbacks() {
        let seen = Arc::new(AtomicUsize::new(0));
        let seen2 = seen.clone();
        let handler = HandlerRef::new(
            Handler::builder()
                .looks_up_value("inner", 1u32)
                .provides_key(
                    Key::named("svc"),
                    Arc::new(|_resolution, composer| {
                        let _ = composer.lookup("inner")?;
                        Ok(Dispatched::Handled)
                    }),
                )
                .build(),
        )
        .filter(
            move |cb, _composer, proceed| {
                seen2.fetch_add(1, Ordering::SeqCst);
                proceed.call(cb)
            },
            true,
        );

        let _ = handler.resolve(Key::named("svc")).unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }
}
