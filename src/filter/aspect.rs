//! Before/after aspects over a handler.
//!
//! `before` runs ahead of the dispatch and may reject it outright, accept
//! it with contextual state, or defer the decision to a future. `after`
//! runs exactly once per dispatch attempt that passed `before`, whether the
//! operation succeeded, failed synchronously, or settled through a future
//! that later failed. Nested aspects unwind LIFO: an outer `after` runs
//! only once the full chain beneath it has settled.

use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;

use crate::callback::{Callback, Outcome};
use crate::error::{DispatchError, Result};
use crate::filter::Proceed;
use crate::handler::{Composer, HandlerRef};
use crate::key::Value;

/// Decision of a before hook.
pub enum Gate {
    /// Proceed with the dispatch.
    Accept,
    /// Proceed, passing state through to the after hook.
    AcceptWith(Value),
    /// Abort the dispatch with a rejection.
    Reject,
    /// Decide later; the envelope's result becomes a future gated on the
    /// decision.
    Deferred(BoxFuture<'static, Result<Decision>>),
}

/// The settled form of a deferred gate.
pub enum Decision {
    Accept,
    AcceptWith(Value),
    Reject,
}

/// Before hook: inspects the callback and gates the dispatch.
pub type BeforeFn = Arc<dyn Fn(&mut Callback, &Composer) -> Result<Gate> + Send + Sync>;

/// After hook: observes the callback once the operation settled.
pub type AfterFn = Arc<dyn Fn(&Callback, &Composer, Option<&Value>) + Send + Sync>;

impl HandlerRef {
    /// Wraps this handler in a before/after aspect.
    pub fn aspect<B, A>(&self, before: B, after: A, reentrant: bool) -> HandlerRef
    where
        B: Fn(&mut Callback, &Composer) -> Result<Gate> + Send + Sync + 'static,
        A: Fn(&Callback, &Composer, Option<&Value>) + Send + Sync + 'static,
    {
        self.aspect_raw(Some(Arc::new(before)), Some(Arc::new(after)), reentrant)
    }

    /// An aspect with only a before hook.
    pub fn aspect_before<B>(&self, before: B) -> HandlerRef
    where
        B: Fn(&mut Callback, &Composer) -> Result<Gate> + Send + Sync + 'static,
    {
        self.aspect_raw(Some(Arc::new(before)), None, false)
    }

    /// An aspect with only an after hook.
    pub fn aspect_after<A>(&self, after: A) -> HandlerRef
    where
        A: Fn(&Callback, &Composer, Option<&Value>) + Send + Sync + 'static,
    {
        self.aspect_raw(None, Some(Arc::new(after)), false)
    }

    pub fn aspect_raw(
        &self,
        before: Option<BeforeFn>,
        after: Option<AfterFn>,
        reentrant: bool,
    ) -> HandlerRef {
        self.filter(
            move |callback, composer, proceed| {
                run_aspect(callback, composer, &proceed, before.clone(), after.clone())
            },
            reentrant,
        )
    }
}

fn run_aspect(
    callback: &mut Callback,
    composer: &Composer,
    proceed: &Proceed<'_>,
    before: Option<BeforeFn>,
    after: Option<AfterFn>,
) -> Result<bool> {
    let gate = match &before {
        Some(before) => before(callback, composer)?,
        None => Gate::Accept,
    };
    match gate {
        Gate::Reject => Err(DispatchError::Rejected(Box::new(callback.clone()))),
        Gate::Accept => aspect_proceed(callback, composer, |cb| proceed.call(cb), after, None),
        Gate::AcceptWith(state) => {
            aspect_proceed(callback, composer, |cb| proceed.call(cb), after, Some(state))
        }
        Gate::Deferred(decision) => {
            let continuation = proceed.detach();
            let mut probe = callback.clone();
            let composer = composer.clone();
            let gated = async move {
                match decision.await? {
                    Decision::Reject => Err(DispatchError::Rejected(Box::new(probe))),
                    accepted => {
                        let state = match accepted {
                            Decision::AcceptWith(state) => Some(state),
                            _ => None,
                        };
                        aspect_proceed(
                            &mut probe,
                            &composer,
                            |cb| continuation.call(cb),
                            after,
                            state,
                        )?;
                        probe.outcome().into_value_future().await
                    }
                }
            };
            callback.set_outcome(Outcome::Pending(gated.boxed().shared()));
            Ok(true)
        }
    }
}

/// Runs the next layer and guarantees the after hook fires exactly once:
/// immediately on the synchronous unwind, or as a continuation once a
/// deferred result settles.
fn aspect_proceed(
    callback: &mut Callback,
    composer: &Composer,
    proceed: impl FnOnce(&mut Callback) -> Result<bool>,
    after: Option<AfterFn>,
    state: Option<Value>,
) -> Result<bool> {
    let result = proceed(callback);
    if let Ok(true) = &result {
        match callback.outcome() {
            Outcome::Pending(settling) => {
                if let Some(after) = after {
                    let snapshot = callback.clone();
                    let composer = composer.clone();
                    let continued = async move {
                        let settled = settling.await;
                        after(&snapshot, &composer, state.as_ref());
                        settled
                    };
                    callback.set_outcome(Outcome::Pending(continued.boxed().shared()));
                }
                return result;
            }
            Outcome::PendingMany(settling) => {
                if let Some(after) = after {
                    let snapshot = callback.clone();
                    let composer = composer.clone();
                    let continued = async move {
                        let settled = settling.await;
                        after(&snapshot, &composer, state.as_ref());
                        settled
                    };
                    callback.set_outcome(Outcome::PendingMany(continued.boxed().shared()));
                }
                return result;
            }
            _ => {}
        }
    }
    // Synchronous unwind: success without a deferred result, a declined
    // dispatch, or a synchronous failure.
    if let Some(after) = after {
        after(callback, composer, state.as_ref());
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callback::{Command, Contribution, Outcome};
    use crate::callback::outcome::ready_future;
    use crate::dispatch::Dispatched;
    use crate::handler::Handler;
    use crate::key::{value, Key};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Ping;

    fn accepting() -> HandlerRef {
        HandlerRef::new(Handler::accepting(
            Key::of::<Ping>(),
            Arc::new(|_cb, _composer| Ok(Dispatched::Handled)),
        ))
    }

    fn deferred_accepting() -> HandlerRef {
        HandlerRef::new(Handler::accepting(
            Key::of::<Ping>(),
            Arc::new(|cb, _composer| {
                cb.set_outcome(Outcome::Pending(ready_future(Ok(value(1u32)))));
                Ok(Dispatched::Handled)
            }),
        ))
    }

    #[test]
    fn rejecting_before_raises_rejected() {
        let handler = accepting().aspect_before(|_cb, _composer| Ok(Gate::Reject));
        let mut cb = Callback::from(Command::new(Ping));
        let err = handler.dispatch(&mut cb, false).unwrap_err();
        assert!(matches!(err, DispatchError::Rejected(_)));
    }

    #[test]
    fn after_runs_once_on_synchronous_success() {
        let runs = Arc::new(AtomicUsize::new(0));
        let runs2 = runs.clone();
        let handler = accepting().aspect(
            |_cb, _composer| Ok(Gate::Accept),
            move |_cb, _composer, _state| {
                runs2.fetch_add(1, Ordering::SeqCst);
            },
            false,
        );
        let mut cb = Callback::from(Command::new(Ping));
        assert!(handler.dispatch(&mut cb, false).unwrap());
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn after_runs_even_when_unhandled_or_failing() {
        let runs = Arc::new(AtomicUsize::new(0));
        let runs2 = runs.clone();
        let handler = HandlerRef::new(Handler::new()).aspect(
            |_cb, _composer| Ok(Gate::Accept),
            move |_cb, _composer, _state| {
                runs2.fetch_add(1, Ordering::SeqCst);
            },
            false,
        );
        let mut cb = Callback::from(Command::new(Ping));
        assert!(!handler.dispatch(&mut cb, false).unwrap());
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn after_defers_until_the_result_settles() {
        let runs = Arc::new(AtomicUsize::new(0));
        let runs2 = runs.clone();
        let handler = deferred_accepting().aspect(
            |_cb, _composer| Ok(Gate::Accept),
            move |_cb, _composer, _state| {
                runs2.fetch_add(1, Ordering::SeqCst);
            },
            false,
        );
        let mut cb = Callback::from(Command::new(Ping));
        assert!(handler.dispatch(&mut cb, false).unwrap());
        // Not yet: the result has not been awaited.
        assert_eq!(runs.load(Ordering::SeqCst), 0);
        cb.outcome().settle().await.unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn deferred_veto_rejects_and_skips_after() {
        let runs = Arc::new(AtomicUsize::new(0));
        let runs2 = runs.clone();
        let handler = deferred_accepting().aspect(
            |_cb, _composer| {
                Ok(Gate::Deferred(
                    async { Ok(Decision::Reject) }.boxed(),
                ))
            },
            move |_cb, _composer, _state| {
                runs2.fetch_add(1, Ordering::SeqCst);
            },
            false,
        );
        let mut cb = Callback::from(Command::new(Ping));
        // The dispatch itself reports handled; the veto lands in the result.
        assert!(handler.dispatch(&mut cb, false).unwrap());
        let err = cb.outcome().settle().await.unwrap_err();
        assert!(matches!(err, DispatchError::Rejected(_)));
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn deferred_acceptance_proceeds_with_state() {
        let observed = Arc::new(AtomicUsize::new(0));
        let observed2 = observed.clone();
        let handler = deferred_accepting().aspect(
            |_cb, _composer| {
                Ok(Gate::Deferred(
                    async { Ok(Decision::AcceptWith(value(7usize))) }.boxed(),
                ))
            },
            move |_cb, _composer, state| {
                let state = state.and_then(crate::key::downcast_ref::<usize>);
                observed2.store(*state.unwrap(), Ordering::SeqCst);
            },
            false,
        );
        let mut cb = Callback::from(Command::new(Ping));
        assert!(handler.dispatch(&mut cb, false).unwrap());
        let settled = cb.outcome().settle().await.unwrap();
        assert_eq!(*crate::key::downcast::<u32>(&settled[0]).unwrap(), 1);
        assert_eq!(observed.load(Ordering::SeqCst), 7);
    }

    #[test]
    fn accept_with_passes_state_to_after() {
        let observed = Arc::new(AtomicUsize::new(0));
        let observed2 = observed.clone();
        let handler = accepting().aspect(
            |_cb, _composer| Ok(Gate::AcceptWith(value(3usize))),
            move |_cb, _composer, state| {
                let state = state.and_then(crate::key::downcast_ref::<usize>);
                observed2.store(*state.unwrap(), Ordering::SeqCst);
            },
            false,
        );
        let mut cb = Callback::from(Command::new(Ping));
        assert!(handler.dispatch(&mut cb, false).unwrap());
        assert_eq!(observed.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn nested_aspects_unwind_lifo() {
        let order = Arc::new(parking_lot::RwLock::new(Vec::new()));
        let o1 = order.clone();
        let o2 = order.clone();
        let handler = deferred_accepting()
            .aspect(
                |_cb, _c| Ok(Gate::Accept),
                move |_cb, _c, _s| o1.write().push("inner"),
                false,
            )
            .aspect(
                |_cb, _c| Ok(Gate::Accept),
                move |_cb, _c, _s| o2.write().push("outer"),
                false,
            );
        let mut cb = Callback::from(Command::new(Ping));
        assert!(handler.dispatch(&mut cb, false).unwrap());
        cb.outcome().settle().await.unwrap();
        assert_eq!(*order.read(), vec!["inner", "outer"]);
    }

    #[test]
    fn state_flows_through_contribution_results() {
        // An aspect observing a handler that produces a value.
        let handler = HandlerRef::new(Handler::accepting(
            Key::of::<Ping>(),
            Arc::new(|cb, _composer| {
                if let crate::callback::Body::Command(c) = cb.body_mut() {
                    c.set_result(Contribution::Ready(value(5u32)));
                }
                Ok(Dispatched::Handled)
            }),
        ))
        .aspect(
            |_cb, _composer| Ok(Gate::Accept),
            |cb, _composer, _state| {
                assert!(!cb.clone().outcome().is_empty());
            },
            false,
        );
        let mut cb = Callback::from(Command::new(Ping));
        assert!(handler.dispatch(&mut cb, false).unwrap());
    }
}
