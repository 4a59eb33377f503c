//! Deferred envelope: tracks the asynchronous completions of another
//! callback and settles once all of them have.

use futures::FutureExt;

use crate::callback::outcome::{Outcome, ValueFuture};
use crate::callback::Callback;
use crate::key::value;

/// Wraps a callback whose handlers may finish asynchronously.
///
/// The outcome is a boolean "all settled" signal: `true` once every tracked
/// completion has settled, or immediately when handlers finished without
/// deferring. When nothing was ever tracked the signal is `false`.
#[derive(Clone)]
pub struct Deferred {
    callback: Box<Callback>,
    many: bool,
    pending: Vec<ValueFuture>,
    tracked: bool,
    cached: Option<Outcome>,
}

impl Deferred {
    pub fn new(callback: Callback) -> Self {
        Self {
            callback: Box::new(callback),
            many: false,
            pending: Vec::new(),
            tracked: false,
            cached: None,
        }
    }

    pub fn all(callback: Callback) -> Self {
        Self {
            many: true,
            ..Self::new(callback)
        }
    }

    pub fn is_many(&self) -> bool {
        self.many
    }

    pub fn callback(&self) -> &Callback {
        &self.callback
    }

    pub fn callback_mut(&mut self) -> &mut Callback {
        &mut self.callback
    }

    pub fn pending(&self) -> &[ValueFuture] {
        &self.pending
    }

    /// Tracks a pending completion. A single-cardinality deferral retains
    /// only the first; every call still records that tracking occurred.
    pub fn track(&mut self, completion: ValueFuture) {
        if self.many || self.pending.is_empty() {
            self.pending.push(completion);
            self.cached = None;
        }
        if !self.tracked {
            self.tracked = true;
            self.cached = None;
        }
    }

    pub(crate) fn outcome(&mut self) -> Outcome {
        let pending = &self.pending;
        let tracked = self.tracked;
        self.cached
            .get_or_insert_with(|| {
                if pending.is_empty() {
                    Outcome::Ready(value(tracked))
                } else {
                    let pending = pending.clone();
                    let settled = async move {
                        for completion in pending {
                            completion.await?;
                        }
                        Ok(value(true))
                    };
                    Outcome::Pending(settled.boxed().shared())
                }
            })
            .clone()
    }

    pub(crate) fn set_outcome(&mut self, outcome: Outcome) {
        self.cached = Some(outcome);
    }
}
