//! Composition envelope: marks a callback as having crossed the composition
//! boundary.
//!
//! Nested dispatches issued through a [`Composer`](crate::handler::Composer)
//! are wrapped in a `Composition` so that non-reentrant filters can
//! recognize and bypass them, preventing a filter's own internal dispatch
//! from re-entering the filter. Result reads and writes forward to the
//! wrapped callback; there is no copy.

use crate::callback::outcome::Outcome;
use crate::callback::Callback;

/// Wrapper marking an envelope as already routed through composition.
#[derive(Clone, Default)]
pub struct Composition {
    inner: Option<Box<Callback>>,
}

impl Composition {
    pub fn new(callback: Callback) -> Self {
        Self {
            inner: Some(Box::new(callback)),
        }
    }

    /// A placeholder with no wrapped callback.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn callback(&self) -> Option<&Callback> {
        self.inner.as_deref()
    }

    pub fn callback_mut(&mut self) -> Option<&mut Callback> {
        self.inner.as_deref_mut()
    }

    pub fn into_inner(self) -> Option<Callback> {
        self.inner.map(|b| *b)
    }

    pub(crate) fn outcome(&mut self) -> Outcome {
        match self.inner.as_deref_mut() {
            Some(inner) => inner.outcome(),
            None => Outcome::Empty,
        }
    }

    pub(crate) fn set_outcome(&mut self, outcome: Outcome) {
        if let Some(inner) = self.inner.as_deref_mut() {
            inner.set_outcome(outcome);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callback::command::Command;
    use crate::callback::outcome::Contribution;
    use crate::key::{downcast, value};

    #[test]
    fn forwards_result_to_wrapped_callback() {
        let mut command = Command::new(1u8);
        command.set_result(Contribution::Ready(value(7u32)));
        let mut composed = Composition::new(Callback::from(command));
        let out = composed.outcome();
        assert_eq!(*downcast::<u32>(out.ready().unwrap()).unwrap(), 7);
    }

    #[test]
    fn empty_composition_has_no_result() {
        let mut composed = Composition::empty();
        assert!(composed.outcome().is_empty());
    }
}
