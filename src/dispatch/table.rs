//! The per-handler dispatch table and its variance-matched walk.
//!
//! Tables are populated through explicit registration at startup and read
//! on every dispatch; they are never mutated mid-dispatch. The walk visits
//! matching entries most-specific-first: exact key hits before subtype
//! matches, ascending hierarchy distance, registration order within a rank.

use tracing::trace;

use crate::binding::{Binding, Variance};
use crate::callback::{Callback, Contribution, Lookup, Resolution};
use crate::dispatch::policy::{Dispatched, HandleFn, LookupFn, ProvideFn};
use crate::error::Result;
use crate::handler::Composer;
use crate::key::Key;

struct Entry<F> {
    binding: Binding,
    callback: F,
    index: usize,
}

/// Registered policy entries for one handler.
#[derive(Default)]
pub struct DispatchTable {
    handle: Vec<Entry<HandleFn>>,
    provide: Vec<Entry<ProvideFn>>,
    lookup: Vec<Entry<LookupFn>>,
}

impl DispatchTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.handle.is_empty() && self.provide.is_empty() && self.lookup.is_empty()
    }

    pub fn register_handle(&mut self, key: Key, callback: HandleFn) {
        let index = self.handle.len();
        self.handle.push(Entry {
            binding: Binding::new(key),
            callback,
            index,
        });
    }

    pub fn register_provide(&mut self, key: Key, callback: ProvideFn) {
        let index = self.provide.len();
        self.provide.push(Entry {
            binding: Binding::new(key),
            callback,
            index,
        });
    }

    pub fn register_lookup(&mut self, key: Key, callback: LookupFn) {
        let index = self.lookup.len();
        self.lookup.push(Entry {
            binding: Binding::new(key),
            callback,
            index,
        });
    }

    /// Walks handle entries for `callback`. Values produced by accepting
    /// entries are passed to `sink` in acceptance order; deferred values are
    /// how handlers report asynchronous completion.
    pub(crate) fn dispatch_handle(
        &self,
        callback: &mut Callback,
        greedy: bool,
        composer: &Composer,
        sink: &mut dyn FnMut(Contribution),
    ) -> Result<bool> {
        let Some(key) = callback.key() else {
            return Ok(false);
        };
        let matched = ranked(&self.handle, &key, Variance::Contravariant);
        trace!(key = %key, matched = matched.len(), "handle dispatch");
        let mut handled = false;
        for entry in matched {
            match (entry.callback)(callback, composer)? {
                Dispatched::Unhandled => continue,
                Dispatched::Handled => handled = true,
                Dispatched::HandledWith(contribution) => {
                    sink(contribution);
                    handled = true;
                }
            }
            if handled && !greedy {
                break;
            }
        }
        Ok(handled)
    }

    /// Walks provide entries for `resolution`, accumulating produced
    /// candidates into it.
    pub(crate) fn dispatch_provide(
        &self,
        resolution: &mut Resolution,
        greedy: bool,
        composer: &Composer,
    ) -> Result<bool> {
        let key = resolution.key().clone();
        let matched = ranked(&self.provide, &key, Variance::Covariant);
        trace!(key = %key, matched = matched.len(), "provide dispatch");
        let mut handled = false;
        for entry in matched {
            match (entry.callback)(&*resolution, composer)? {
                Dispatched::Unhandled => continue,
                Dispatched::Handled => handled = true,
                Dispatched::HandledWith(contribution) => {
                    resolution.resolve(contribution);
                    handled = true;
                }
            }
            if handled && !greedy {
                break;
            }
        }
        Ok(handled)
    }

    /// Walks lookup entries for `lookup`, accumulating produced values.
    pub(crate) fn dispatch_lookup(
        &self,
        lookup: &mut Lookup,
        greedy: bool,
        composer: &Composer,
    ) -> Result<bool> {
        let key = lookup.key().clone();
        let matched = ranked(&self.lookup, &key, Variance::Invariant);
        trace!(key = %key, matched = matched.len(), "lookup dispatch");
        let mut handled = false;
        for entry in matched {
            match (entry.callback)(&*lookup, composer)? {
                Dispatched::Unhandled => continue,
                Dispatched::Handled => handled = true,
                Dispatched::HandledWith(contribution) => {
                    lookup.add_result(contribution);
                    handled = true;
                }
            }
            if handled && !greedy {
                break;
            }
        }
        Ok(handled)
    }
}

/// Matching entries ordered most-specific-first.
fn ranked<'a, F>(entries: &'a [Entry<F>], key: &Key, variance: Variance) -> Vec<&'a Entry<F>> {
    let mut matched: Vec<(usize, &Entry<F>)> = entries
        .iter()
        .filter_map(|e| e.binding.rank(key, variance).map(|rank| (rank, e)))
        .collect();
    matched.sort_by_key(|(rank, e)| (*rank, e.index));
    matched.into_iter().map(|(_, e)| e).collect()
}
