//! # Callback Outcomes
//!
//! The uniform result abstraction shared by every envelope. A result is
//! either immediately available or a future, and either a single value or an
//! ordered sequence; the [`Outcome`] enum covers the four combinations plus
//! the empty case.
//!
//! Futures are `Shared` so an outcome can be read any number of times and
//! every reader observes the same settlement.

use futures::future::{join_all, BoxFuture, Shared};
use futures::FutureExt;

use crate::error::Result;
use crate::key::{value, Value};

/// A shared future settling to one value.
pub type ValueFuture = Shared<BoxFuture<'static, Result<Value>>>;

/// A shared future settling to an ordered sequence of values.
pub type SequenceFuture = Shared<BoxFuture<'static, Result<Vec<Value>>>>;

/// Wraps an already-settled result as a [`ValueFuture`].
pub fn ready_future(result: Result<Value>) -> ValueFuture {
    futures::future::ready(result).boxed().shared()
}

/// Wraps an already-settled sequence as a [`SequenceFuture`].
pub fn ready_sequence(result: Result<Vec<Value>>) -> SequenceFuture {
    futures::future::ready(result).boxed().shared()
}

/// One accepted result, synchronous or deferred.
#[derive(Clone)]
pub enum Contribution {
    Ready(Value),
    Deferred(ValueFuture),
}

impl Contribution {
    pub fn is_deferred(&self) -> bool {
        matches!(self, Contribution::Deferred(_))
    }
}

impl From<Value> for Contribution {
    fn from(v: Value) -> Self {
        Contribution::Ready(v)
    }
}

impl From<ValueFuture> for Contribution {
    fn from(f: ValueFuture) -> Self {
        Contribution::Deferred(f)
    }
}

/// The effective result of an envelope.
#[derive(Clone)]
pub enum Outcome {
    /// Nothing was produced.
    Empty,
    /// A single value, available now.
    Ready(Value),
    /// An ordered sequence, fully available now.
    ReadyMany(Vec<Value>),
    /// A single value that settles later.
    Pending(ValueFuture),
    /// An ordered sequence that settles later.
    PendingMany(SequenceFuture),
}

impl std::fmt::Debug for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Empty => write!(f, "Empty"),
            Outcome::Ready(_) => write!(f, "Ready(..)"),
            Outcome::ReadyMany(vs) => write!(f, "ReadyMany(len={})", vs.len()),
            Outcome::Pending(_) => write!(f, "Pending(..)"),
            Outcome::PendingMany(_) => write!(f, "PendingMany(..)"),
        }
    }
}

impl Outcome {
    pub fn is_deferred(&self) -> bool {
        matches!(self, Outcome::Pending(_) | Outcome::PendingMany(_))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Outcome::Empty)
    }

    /// The value when it is a single, already-settled result.
    pub fn ready(&self) -> Option<&Value> {
        match self {
            Outcome::Ready(v) => Some(v),
            _ => None,
        }
    }

    /// Awaits settlement and flattens to an ordered sequence.
    ///
    /// `Empty` settles to an empty sequence and a single value to a sequence
    /// of one.
    pub async fn settle(self) -> Result<Vec<Value>> {
        match self {
            Outcome::Empty => Ok(Vec::new()),
            Outcome::Ready(v) => Ok(vec![v]),
            Outcome::ReadyMany(vs) => Ok(vs),
            Outcome::Pending(f) => f.await.map(|v| vec![v]),
            Outcome::PendingMany(f) => f.await,
        }
    }

    /// Collapses to a single-valued future.
    ///
    /// Sequences arrive boxed as one `Vec<Value>` value and `Empty` settles
    /// to a unit value. Used where a result must be exposed through exactly
    /// one future.
    pub fn into_value_future(self) -> ValueFuture {
        match self {
            Outcome::Empty => ready_future(Ok(value(()))),
            Outcome::Ready(v) => ready_future(Ok(v)),
            Outcome::ReadyMany(vs) => ready_future(Ok(value(vs))),
            Outcome::Pending(f) => f,
            Outcome::PendingMany(f) => async move { f.await.map(value) }.boxed().shared(),
        }
    }
}

/// Result of a single-cardinality accumulation: the first contribution wins.
pub(crate) fn aggregate_single(contributions: &[Contribution]) -> Outcome {
    match contributions.first() {
        None => Outcome::Empty,
        Some(Contribution::Ready(v)) => Outcome::Ready(v.clone()),
        Some(Contribution::Deferred(f)) => Outcome::Pending(f.clone()),
    }
}

/// Result of a many-cardinality accumulation.
///
/// When every contribution is already settled the outcome is an ordered
/// sequence. When any is deferred the whole aggregate becomes a future that
/// settles once every contribution has, preserving contribution order. A
/// deferred contribution that fails is excluded from the sequence rather
/// than failing the aggregate.
pub(crate) fn aggregate_many(contributions: &[Contribution]) -> Outcome {
    if !contributions.iter().any(Contribution::is_deferred) {
        let values = contributions
            .iter()
            .map(|c| match c {
                Contribution::Ready(v) => v.clone(),
                Contribution::Deferred(_) => unreachable!(),
            })
            .collect();
        return Outcome::ReadyMany(values);
    }
    let parts: Vec<_> = contributions
        .iter()
        .cloned()
        .map(|c| async move {
            match c {
                Contribution::Ready(v) => Some(v),
                Contribution::Deferred(f) => f.await.ok(),
            }
        })
        .collect();
    let joined = async move {
        let settled = join_all(parts).await;
        Ok(settled.into_iter().flatten().collect())
    };
    Outcome::PendingMany(joined.boxed().shared())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DispatchError;
    use crate::key::downcast;

    fn ready(n: u32) -> Contribution {
        Contribution::Ready(value(n))
    }

    #[test]
    fn single_takes_first() {
        assert!(aggregate_single(&[]).is_empty());
        let out = aggregate_single(&[ready(1), ready(2)]);
        assert_eq!(*downcast::<u32>(out.ready().unwrap()).unwrap(), 1);
    }

    #[test]
    fn many_preserves_order_when_settled() {
        let out = aggregate_many(&[ready(1), ready(2), ready(3)]);
        match out {
            Outcome::ReadyMany(vs) => {
                let ns: Vec<u32> = vs.iter().map(|v| *downcast::<u32>(v).unwrap()).collect();
                assert_eq!(ns, vec![1, 2, 3]);
            }
            _ => panic!("expected a settled sequence"),
        }
    }

    #[tokio::test]
    async fn many_with_deferred_settles_in_order() {
        let deferred = Contribution::Deferred(ready_future(Ok(value(2u32))));
        let out = aggregate_many(&[ready(1), deferred, ready(3)]);
        assert!(out.is_deferred());
        let vs = out.settle().await.unwrap();
        let ns: Vec<u32> = vs.iter().map(|v| *downcast::<u32>(v).unwrap()).collect();
        assert_eq!(ns, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn failed_deferred_contribution_is_excluded() {
        let failing = Contribution::Deferred(ready_future(Err(DispatchError::Invocation {
            member: "x".into(),
            reason: "boom".into(),
        })));
        let out = aggregate_many(&[ready(1), failing, ready(3)]);
        let vs = out.settle().await.unwrap();
        let ns: Vec<u32> = vs.iter().map(|v| *downcast::<u32>(v).unwrap()).collect();
        assert_eq!(ns, vec![1, 3]);
    }
}
