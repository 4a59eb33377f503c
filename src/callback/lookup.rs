//! Lookup envelope: invariant key/value retrieval.

use crate::callback::outcome::{aggregate_many, aggregate_single, Contribution, Outcome};
use crate::key::Key;

/// Accumulates values registered under an exact key.
#[derive(Clone)]
pub struct Lookup {
    key: Key,
    many: bool,
    instant: bool,
    results: Vec<Contribution>,
    cached: Option<Outcome>,
}

impl Lookup {
    /// Single-cardinality lookup: the first result is kept.
    pub fn new(key: impl Into<Key>) -> Self {
        Self {
            key: key.into(),
            many: false,
            instant: false,
            results: Vec::new(),
            cached: None,
        }
    }

    /// Many-cardinality lookup: every result is kept, in arrival order.
    pub fn all(key: impl Into<Key>) -> Self {
        Self {
            many: true,
            ..Self::new(key)
        }
    }

    /// Demands an instantly available value; deferred results are refused.
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

    pub fn is_instant(&self) -> bool {
        self.instant
    }

    pub fn results(&self) -> &[Contribution] {
        &self.results
    }

    /// Adds a result. Returns false when the result was refused: a second
    /// result on a single-cardinality lookup, or a deferred result on an
    /// instant one.
    pub fn add_result(&mut self, result: impl Into<Contribution>) -> bool {
        let result = result.into();
        if !self.many && !self.results.is_empty() {
            return false;
        }
        if self.instant && result.is_deferred() {
            return false;
        }
        self.results.push(result);
        self.cached = None;
        true
    }

    pub(crate) fn outcome(&mut self) -> Outcome {
        let many = self.many;
        let results = &self.results;
        self.cached
            .get_or_insert_with(|| {
                if many {
                    aggregate_many(results)
                } else {
                    aggregate_single(results)
                }
            })
            .clone()
    }

    pub(crate) fn set_outcome(&mut self, outcome: Outcome) {
        self.cached = Some(outcome);
    }
}
