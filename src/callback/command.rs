//! Command envelope: an arbitrary user payload dispatched for its side
//! effects through the handle policy.

use std::any::Any;

use crate::callback::outcome::{Contribution, Outcome};
use crate::key::{downcast, value, Key, Value};

/// One unit of work keyed by the concrete type of its payload.
#[derive(Clone)]
pub struct Command {
    key: Key,
    payload: Value,
    result: Option<Contribution>,
    cached: Option<Outcome>,
}

impl Command {
    pub fn new<T: Any + Send + Sync>(payload: T) -> Self {
        Self {
            key: Key::of::<T>(),
            payload: value(payload),
            result: None,
            cached: None,
        }
    }

    /// A command over an already-erased payload, keyed explicitly.
    pub fn from_value(key: Key, payload: Value) -> Self {
        Self {
            key,
            payload,
            result: None,
            cached: None,
        }
    }

    pub fn key(&self) -> &Key {
        &self.key
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    pub fn payload_as<T: Any + Send + Sync>(&self) -> Option<std::sync::Arc<T>> {
        downcast::<T>(&self.payload)
    }

    /// Records the value a handler produced. The first one wins.
    pub fn set_result(&mut self, contribution: Contribution) -> bool {
        if self.result.is_some() {
            return false;
        }
        self.result = Some(contribution);
        self.cached = None;
        true
    }

    pub(crate) fn outcome(&mut self) -> Outcome {
        let result = &self.result;
        self.cached
            .get_or_insert_with(|| match result {
                None => Outcome::Empty,
                Some(Contribution::Ready(v)) => Outcome::Ready(v.clone()),
                Some(Contribution::Deferred(f)) => Outcome::Pending(f.clone()),
            })
            .clone()
    }

    pub(crate) fn set_outcome(&mut self, outcome: Outcome) {
        self.cached = Some(outcome);
    }
}
