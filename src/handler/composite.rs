//! Composite: an ordered, mutable list of member handlers.

use parking_lot::RwLock;

use crate::callback::Callback;
use crate::error::Result;
use crate::handler::{Composer, Handler, HandlerRef, Handling};
use crate::key::Value;

/// Zero or more handlers dispatched in registration order.
///
/// Dispatch first attempts the composite's own direct dispatch; when that
/// satisfies a non-greedy callback the members are never consulted.
/// Otherwise members are visited in order, stopping at the first success or,
/// greedily, visiting every member and ORing the results.
///
/// Membership may be mutated between dispatches. An in-flight dispatch
/// iterates a snapshot, so concurrent mutation never corrupts a traversal;
/// whether it observes the change is unspecified. Do not mutate membership
/// from within a callback being dispatched by this same composite.
#[derive(Default)]
pub struct CompositeHandler {
    base: Handler,
    members: RwLock<Vec<HandlerRef>>,
}

impl CompositeHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_members(members: impl IntoIterator<Item = HandlerRef>) -> Self {
        let composite = Self::new();
        for member in members {
            composite.add(member);
        }
        composite
    }

    /// Current members, in dispatch order.
    pub fn members(&self) -> Vec<HandlerRef> {
        self.members.read().clone()
    }

    pub fn add(&self, member: HandlerRef) -> &Self {
        self.members.write().push(member);
        self
    }

    pub fn insert_at(&self, index: usize, member: HandlerRef) -> &Self {
        let mut members = self.members.write();
        let index = index.min(members.len());
        members.insert(index, member);
        drop(members);
        self
    }

    /// Removes the first member with the same node identity.
    pub fn remove(&self, member: &HandlerRef) -> &Self {
        let mut members = self.members.write();
        if let Some(position) = members.iter().position(|m| m.same(member)) {
            members.remove(position);
        }
        drop(members);
        self
    }

    /// Removes the first member whose backing delegate is `delegate`.
    pub fn remove_delegate(&self, delegate: &Value) -> &Self {
        let mut members = self.members.write();
        if let Some(position) = members.iter().position(|m| {
            m.delegate()
                .is_some_and(|d| std::sync::Arc::ptr_eq(d, delegate))
        }) {
            members.remove(position);
        }
        drop(members);
        self
    }
}

impl Handling for CompositeHandler {
    fn handle(&self, callback: &mut Callback, greedy: bool, composer: &Composer) -> Result<bool> {
        let mut handled = self.base.handle(callback, greedy, composer)?;
        if handled && !greedy {
            return Ok(true);
        }
        let members = self.members();
        for member in &members {
            if member.handle(callback, greedy, composer)? {
                if !greedy {
                    return Ok(true);
                }
                handled = true;
            }
        }
        Ok(handled)
    }
}

impl HandlerRef {
    /// Builds a handler chain: zero others returns this handler, one builds
    /// a cascade, more a composite.
    pub fn next(&self, others: impl IntoIterator<Item = HandlerRef>) -> HandlerRef {
        let mut others: Vec<HandlerRef> = others.into_iter().collect();
        match others.len() {
            0 => self.clone(),
            1 => HandlerRef::new(super::CascadeHandler::new(self.clone(), others.remove(0))),
            _ => {
                let composite = CompositeHandler::new();
                composite.add(self.clone());
                for other in others {
                    composite.add(other);
                }
                HandlerRef::new(composite)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callback::Command;
    use crate::dispatch::Dispatched;
    use crate::key::{value, Key};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Ping;
    struct Pong;

    fn recording(key: Key, log: Arc<RwLock<Vec<&'static str>>>, name: &'static str) -> HandlerRef {
        HandlerRef::new(Handler::accepting(
            key,
            Arc::new(move |_cb, _composer| {
                log.write().push(name);
                Ok(Dispatched::Handled)
            }),
        ))
    }

    #[test]
    fn non_greedy_stops_at_first_accepting_member() {
        let log = Arc::new(RwLock::new(Vec::new()));
        let composite = CompositeHandler::new();
        composite.add(recording(Key::of::<Ping>(), log.clone(), "h1"));
        composite.add(recording(Key::of::<Pong>(), log.clone(), "h2"));
        composite.add(recording(Key::of::<Ping>(), log.clone(), "h3"));

        let mut cb = Callback::from(Command::new(Ping));
        assert!(HandlerRef::new(composite).dispatch(&mut cb, false).unwrap());
        assert_eq!(*log.read(), vec!["h1"]);
    }

    #[test]
    fn greedy_visits_members_in_registration_order() {
        let log = Arc::new(RwLock::new(Vec::new()));
        let composite = CompositeHandler::new();
        composite.add(recording(Key::of::<Ping>(), log.clone(), "h1"));
        composite.add(recording(Key::of::<Ping>(), log.clone(), "h2"));

        let mut cb = Callback::from(Command::new(Ping));
        assert!(HandlerRef::new(composite).dispatch(&mut cb, true).unwrap());
        assert_eq!(*log.read(), vec!["h1", "h2"]);
    }

    #[test]
    fn membership_mutation_between_dispatches() {
        let hits = Arc::new(AtomicUsize::new(0));
        let hits2 = hits.clone();
        let member = HandlerRef::new(Handler::accepting(
            Key::of::<Ping>(),
            Arc::new(move |_cb, _composer| {
                hits2.fetch_add(1, Ordering::SeqCst);
                Ok(Dispatched::Handled)
            }),
        ));

        let composite = CompositeHandler::new();
        composite.add(member.clone());
        let handler = HandlerRef::new(composite);

        let mut cb = Callback::from(Command::new(Ping));
        assert!(handler.dispatch(&mut cb, false).unwrap());

        // Removing by identity empties the composite.
        let composite = CompositeHandler::new();
        composite.add(member.clone());
        composite.remove(&member);
        assert!(composite.members().is_empty());
    }

    #[test]
    fn remove_by_delegate_identity() {
        struct Device;
        let member = HandlerRef::wrap(Device);
        let delegate = member.delegate().unwrap().clone();

        let composite = CompositeHandler::new();
        composite.add(member);
        composite.remove_delegate(&delegate);
        assert!(composite.members().is_empty());

        // A different value with the same type does not match.
        let composite = CompositeHandler::new();
        composite.add(HandlerRef::wrap(Device));
        composite.remove_delegate(&value(Device));
        assert_eq!(composite.members().len(), 1);
    }

    #[test]
    fn insert_at_orders_members() {
        let log = Arc::new(RwLock::new(Vec::new()));
        let composite = CompositeHandler::new();
        composite.add(recording(Key::of::<Ping>(), log.clone(), "late"));
        composite.insert_at(0, recording(Key::of::<Ping>(), log.clone(), "early"));

        let mut cb = Callback::from(Command::new(Ping));
        HandlerRef::new(composite).dispatch(&mut cb, true).unwrap();
        assert_eq!(*log.read(), vec!["early", "late"]);
    }
}
