//! Resilience decorators built on the filter pipeline: reentrancy guarding,
//! activity tracking, promise normalization and timeouts.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use parking_lot::Mutex;
use tracing::warn;

use crate::callback::outcome::ready_future;
use crate::callback::Outcome;
use crate::config::DispatchConfig;
use crate::error::DispatchError;
use crate::filter::aspect::Gate;
use crate::handler::HandlerRef;
use crate::key::value;

/// Shared activity count observed by callers; see
/// [`activity`](HandlerRef::activity).
#[derive(Clone, Debug, Default)]
pub struct ActivityCounter {
    active: Arc<AtomicUsize>,
}

impl ActivityCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }
}

struct ActivityState {
    finished: bool,
    counted: bool,
}

impl HandlerRef {
    /// At most one in-flight operation per gate: a dispatch while `gate` is
    /// already held is rejected rather than queued.
    pub fn guard(&self, gate: Arc<AtomicBool>) -> HandlerRef {
        let release = gate.clone();
        self.aspect(
            move |_callback, _composer| {
                if gate.swap(true, Ordering::SeqCst) {
                    Ok(Gate::Reject)
                } else {
                    Ok(Gate::Accept)
                }
            },
            move |_callback, _composer, _state| {
                release.store(false, Ordering::SeqCst);
            },
            false,
        )
    }

    /// Counts operations still pending after a grace delay, so very fast
    /// operations are never flagged as activity. The count drops once the
    /// operation settles. Requires a running tokio runtime; `grace`
    /// defaults to the configured activity grace delay.
    pub fn activity(&self, counter: &ActivityCounter, grace: Option<Duration>) -> HandlerRef {
        let active = counter.active.clone();
        let grace = grace.unwrap_or_else(|| DispatchConfig::current().activity_grace());
        self.aspect(
            move |_callback, _composer| {
                let state = Arc::new(Mutex::new(ActivityState {
                    finished: false,
                    counted: false,
                }));
                let armed = state.clone();
                let active = active.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(grace).await;
                    let mut armed = armed.lock();
                    if !armed.finished {
                        armed.counted = true;
                        active.fetch_add(1, Ordering::SeqCst);
                    }
                });
                Ok(Gate::AcceptWith(value(state)))
            },
            {
                let active = counter.active.clone();
                move |_callback, _composer, state| {
                    let Some(state) =
                        state.and_then(crate::key::downcast_ref::<Arc<Mutex<ActivityState>>>)
                    else {
                        return;
                    };
                    let mut state = state.lock();
                    state.finished = true;
                    if state.counted {
                        state.counted = false;
                        active.fetch_sub(1, Ordering::SeqCst);
                    }
                }
            },
            false,
        )
    }

    /// Normalizes every result to a future: settled values become resolved
    /// futures and synchronous failures become handled, rejected futures,
    /// so sync and async call sites observe symmetric failure semantics.
    pub fn promises(&self) -> HandlerRef {
        self.filter(
            |callback, _composer, proceed| {
                if matches!(callback.body(), crate::callback::Body::Semantics(_)) {
                    return proceed.call(callback);
                }
                match proceed.call(callback) {
                    Ok(handled) => {
                        if handled {
                            match callback.outcome() {
                                Outcome::Empty => callback
                                    .set_outcome(Outcome::Pending(ready_future(Ok(value(()))))),
                                Outcome::Ready(v) => {
                                    callback.set_outcome(Outcome::Pending(ready_future(Ok(v))))
                                }
                                Outcome::ReadyMany(vs) => {
                                    callback.set_outcome(Outcome::PendingMany(
                                        crate::callback::outcome::ready_sequence(Ok(vs)),
                                    ))
                                }
                                Outcome::Pending(_) | Outcome::PendingMany(_) => {}
                            }
                        }
                        Ok(handled)
                    }
                    Err(e) => {
                        callback.set_outcome(Outcome::Pending(ready_future(Err(e))));
                        Ok(true)
                    }
                }
            },
            false,
        )
    }

    /// Races deferred results against a timer. On timeout the exposed
    /// result rejects with [`DispatchError::Timeout`]; the underlying
    /// operation is not cancelled and keeps running unobserved. Settled
    /// results pass through untouched.
    pub fn timeout(&self, after: Duration) -> HandlerRef {
        self.filter(
            move |callback, _composer, proceed| {
                let handled = proceed.call(callback)?;
                if !handled {
                    return Ok(handled);
                }
                match callback.outcome() {
                    Outcome::Pending(settling) => {
                        let snapshot = Box::new(callback.clone());
                        let abandoned = settling.clone();
                        let raced = async move {
                            tokio::select! {
                                settled = settling => settled,
                                _ = tokio::time::sleep(after) => {
                                    warn!(callback = %snapshot, timeout_ms = after.as_millis() as u64, "dispatch timed out");
                                    // Let the original run to completion unobserved.
                                    tokio::spawn(async move { let _ = abandoned.await; });
                                    Err(DispatchError::Timeout { callback: snapshot, after })
                                }
                            }
                        };
                        callback.set_outcome(Outcome::Pending(raced.boxed().shared()));
                    }
                    Outcome::PendingMany(settling) => {
                        let snapshot = Box::new(callback.clone());
                        let abandoned = settling.clone();
                        let raced = async move {
                            tokio::select! {
                                settled = settling => settled,
                                _ = tokio::time::sleep(after) => {
                                    warn!(callback = %snapshot, timeout_ms = after.as_millis() as u64, "dispatch timed out");
                                    tokio::spawn(async move { let _ = abandoned.await; });
                                    Err(DispatchError::Timeout { callback: snapshot, after })
                                }
                            }
                        };
                        callback.set_outcome(Outcome::PendingMany(raced.boxed().shared()));
                    }
                    _ => {}
                }
                Ok(handled)
            },
            false,
        )
    }

    /// [`timeout`](Self::timeout) with the configured default duration; a
    /// no-op decorator when none is configured.
    pub fn timeout_default(&self) -> HandlerRef {
        match DispatchConfig::current().default_timeout() {
            Some(after) => self.timeout(after),
            None => self.clone(),
        }
    }
}
