//! # Type Hierarchy
//!
//! Process-wide registry of subtype relations between dispatch keys.
//!
//! Rust offers no runtime subtype reflection, so the relation that drives
//! covariant and contravariant matching is declared explicitly: components
//! register `sub is-a super` edges at startup, and dispatch queries the
//! transitive closure. Capability adoption feeds the same graph, so a type
//! that adopts a capability also satisfies resolutions for it.
//!
//! The registry is populated during handler registration and treated as
//! read-only during steady-state dispatch.

use std::any::Any;
use std::collections::{HashSet, VecDeque};
use std::sync::OnceLock;

use dashmap::DashMap;
use tracing::debug;

use crate::key::Key;

static GLOBAL: OnceLock<TypeHierarchy> = OnceLock::new();

/// The process-wide hierarchy used by all dispatch.
pub fn global() -> &'static TypeHierarchy {
    GLOBAL.get_or_init(TypeHierarchy::new)
}

/// Declares that `Sub` is a `Super` for matching purposes.
pub fn relate_types<Sub: Any + ?Sized, Super: Any + ?Sized>() {
    global().relate(Key::of::<Sub>(), Key::of::<Super>());
}

/// Directed graph of `sub -> super` edges over dispatch keys.
#[derive(Debug, Default)]
pub struct TypeHierarchy {
    parents: DashMap<Key, Vec<Key>>,
}

impl TypeHierarchy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a `sub is-a super` edge. Duplicate edges are ignored.
    pub fn relate(&self, sub: Key, superkey: Key) {
        if sub == superkey {
            return;
        }
        let mut entry = self.parents.entry(sub.clone()).or_default();
        if !entry.contains(&superkey) {
            debug!(sub = %sub, sup = %superkey, "registered type relation");
            entry.push(superkey);
        }
    }

    /// True when `sub` is `sup` or transitively declared as one.
    pub fn is_a(&self, sub: &Key, sup: &Key) -> bool {
        self.distance(sub, sup).is_some()
    }

    /// Number of edges between `sub` and `sup`, when related.
    ///
    /// Zero means the keys are identical; smaller is more specific. Used to
    /// order policy entries most-specific-first.
    pub fn distance(&self, sub: &Key, sup: &Key) -> Option<usize> {
        if sub == sup {
            return Some(0);
        }
        let mut seen: HashSet<Key> = HashSet::new();
        let mut frontier: VecDeque<(Key, usize)> = VecDeque::new();
        frontier.push_back((sub.clone(), 0));
        while let Some((key, depth)) = frontier.pop_front() {
            if !seen.insert(key.clone()) {
                continue;
            }
            if let Some(parents) = self.parents.get(&key) {
                for parent in parents.iter() {
                    if parent == sup {
                        return Some(depth + 1);
                    }
                    frontier.push_back((parent.clone(), depth + 1));
                }
            }
        }
        None
    }
}
