//! Resolution envelope: covariant resolution of a key to instances.

use crate::callback::outcome::{aggregate_many, aggregate_single, Contribution, Outcome};
use crate::key::Key;

/// Accumulates candidate instances satisfying a requested key.
#[derive(Clone)]
pub struct Resolution {
    key: Key,
    many: bool,
    instant: bool,
    resolutions: Vec<Contribution>,
    promised: bool,
    cached: Option<Outcome>,
}

impl Resolution {
    /// Single-cardinality resolution: the first candidate is kept.
    pub fn new(key: impl Into<Key>) -> Self {
        Self {
            key: key.into(),
            many: false,
            instant: false,
            resolutions: Vec::new(),
            promised: false,
            cached: None,
        }
    }

    /// Many-cardinality resolution: every candidate is kept, in order.
    pub fn all(key: impl Into<Key>) -> Self {
        Self {
            many: true,
            ..Self::new(key)
        }
    }

    /// Demands instantly available candidates; deferred ones are refused.
    pub fn instant(mut self) -> Self {
        self.instant = true;
        self
    }

    pub fn key(&self) -> &Key {
        &self.key
    }

    pub fn is_many(&self) -> bool {
        self.many
    }

    /// False once any accumulated candidate is asynchronous; the aggregate
    /// result has degraded to a future.
    pub fn is_instantly_available(&self) -> bool {
        !self.promised
    }

    pub fn resolutions(&self) -> &[Contribution] {
        &self.resolutions
    }

    /// Accepts a candidate. Returns false when refused: a second candidate
    /// on a single-cardinality resolution, or a deferred candidate on an
    /// instant one.
    pub fn resolve(&mut self, resolution: impl Into<Contribution>) -> bool {
        let resolution = resolution.into();
        if !self.many && !self.resolutions.is_empty() {
            return false;
        }
        if self.instant && resolution.is_deferred() {
            return false;
        }
        self.promised = self.promised || resolution.is_deferred();
        self.resolutions.push(resolution);
        self.cached = None;
        true
    }

    pub(crate) fn outcome(&mut self) -> Outcome {
        let many = self.many;
        let resolutions = &self.resolutions;
        self.cached
            .get_or_insert_with(|| {
                if many {
                    aggregate_many(resolutions)
                } else {
                    aggregate_single(resolutions)
                }
            })
            .clone()
    }

    pub(crate) fn set_outcome(&mut self, outcome: Outcome) {
        self.cached = Some(outcome);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callback::outcome::ready_future;
    use crate::error::DispatchError;
    use crate::key::{downcast, value};

    #[test]
    fn single_keeps_first_candidate() {
        let mut r = Resolution::new("svc");
        assert!(r.resolve(value(1u32)));
        assert!(!r.resolve(value(2u32)));
        assert_eq!(r.resolutions().len(), 1);
    }

    #[test]
    fn deferred_candidate_degrades_to_promised() {
        let mut r = Resolution::all("svc");
        assert!(r.is_instantly_available());
        r.resolve(value(1u32));
        assert!(r.is_instantly_available());
        r.resolve(ready_future(Ok(value(2u32))));
        assert!(!r.is_instantly_available());
        assert!(r.outcome().is_deferred());
    }

    #[test]
    fn instant_refuses_deferred_candidates() {
        let mut r = Resolution::new("svc").instant();
        assert!(!r.resolve(ready_future(Ok(value(1u32)))));
        assert!(r.is_instantly_available());
        assert!(r.outcome().is_empty());
    }

    #[tokio::test]
    async fn failed_candidate_excluded_from_many() {
        let mut r = Resolution::all("svc");
        r.resolve(value(1u32));
        r.resolve(ready_future(Err(DispatchError::Invocation {
            member: "make".into(),
            reason: "down".into(),
        })));
        r.resolve(value(3u32));
        let vs = r.outcome().settle().await.unwrap();
        let ns: Vec<u32> = vs.iter().map(|v| *downcast::<u32>(v).unwrap()).collect();
        assert_eq!(ns, vec![1, 3]);
    }
}
