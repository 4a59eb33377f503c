//! # Leaf Handler
//!
//! The policy-table handler at the bottom of every graph.
//!
//! A leaf routes envelopes intrinsically: lookups through its lookup table,
//! resolutions through its provide table plus implicit delegate resolution,
//! deferrals through its handle table with completion tracking, invocations
//! against its delegate, and compositions by unwrapping. Tables are built
//! once through [`HandlerBuilder`] and read on every dispatch.

use std::any::Any;
use std::sync::Arc;

use tracing::info;

use crate::binding::{Binding, Variance};
use crate::callback::{Body, Callback, Contribution, Resolution, ValueFuture};
use crate::dispatch::{DispatchTable, Dispatched, HandleFn, LookupFn, ProvideFn};
use crate::error::Result;
use crate::handler::{Composer, Handling};
use crate::key::{value, Key, Value};

/// Leaf handler: policy tables plus an optional backing delegate.
#[derive(Default)]
pub struct Handler {
    delegate: Option<Value>,
    delegate_key: Option<Key>,
    policies: DispatchTable,
}

impl Handler {
    /// A handler with no entries; useful as a combinator base.
    pub fn new() -> Self {
        Self::default()
    }

    /// A handler fronting `delegate` with no registered entries. It still
    /// satisfies resolutions for every key the delegate's type is related
    /// to, and receives method invocations against the delegate.
    pub fn wrap<T: Any + Send + Sync>(delegate: T) -> Self {
        Handler::builder().delegate(delegate).build()
    }

    pub fn builder() -> HandlerBuilder {
        HandlerBuilder::default()
    }

    /// Shortcut for a handler with a single handle entry.
    pub fn accepting(key: impl Into<Key>, callback: HandleFn) -> Self {
        Handler::builder().handles_key(key, callback).build()
    }

    /// Shortcut for a handler with a single provide entry.
    pub fn providing(key: impl Into<Key>, callback: ProvideFn) -> Self {
        Handler::builder().provides_key(key, callback).build()
    }

    fn resolve_implicitly(&self, resolution: &mut Resolution) -> bool {
        let (Some(delegate), Some(delegate_key)) = (&self.delegate, &self.delegate_key) else {
            return false;
        };
        let implied = Binding::new(resolution.key().clone());
        if !implied.matches(delegate_key, Variance::Contravariant) {
            return false;
        }
        resolution.resolve(Contribution::Ready(delegate.clone()))
    }
}

impl Handling for Handler {
    fn handle(&self, callback: &mut Callback, greedy: bool, composer: &Composer) -> Result<bool> {
        match callback.body_mut() {
            Body::Lookup(lookup) => {
                let many = lookup.is_many();
                return self.policies.dispatch_lookup(lookup, many, composer);
            }
            Body::Resolution(resolution) => {
                let many = resolution.is_many();
                let mut resolved = self.policies.dispatch_provide(resolution, many, composer)?;
                // The delegate participates in addition to registered
                // providers when resolving all, or as the fallback when
                // nothing else accepted.
                if !resolved || many {
                    resolved |= self.resolve_implicitly(resolution);
                }
                return Ok(resolved);
            }
            Body::Deferred(deferred) => {
                let inner_greedy = deferred.is_many();
                let mut completions: Vec<ValueFuture> = Vec::new();
                let handled = self.policies.dispatch_handle(
                    deferred.callback_mut(),
                    inner_greedy,
                    composer,
                    &mut |contribution| {
                        if let Contribution::Deferred(f) = contribution {
                            completions.push(f);
                        }
                    },
                )?;
                for completion in completions {
                    deferred.track(completion);
                }
                return Ok(handled);
            }
            Body::Invocation(invocation) => {
                return match &self.delegate {
                    Some(delegate) => invocation.invoke_on(delegate, composer),
                    None => Ok(false),
                };
            }
            Body::Resolving(resolving) => return resolving.invoke_resolve(composer),
            Body::Semantics(_) => return Ok(false),
            Body::Composition(_) | Body::Command(_) => {}
        }

        match callback.body_mut() {
            Body::Composition(composition) => match composition.callback_mut() {
                Some(inner) => self.handle(inner, greedy, composer),
                None => Ok(false),
            },
            _ => {
                // Command: the handle policy over the raw callback. The
                // first produced value becomes the command result.
                let mut produced: Vec<Contribution> = Vec::new();
                let handled = self.policies.dispatch_handle(
                    callback,
                    greedy,
                    composer,
                    &mut |contribution| produced.push(contribution),
                )?;
                if let Body::Command(command) = callback.body_mut() {
                    for contribution in produced {
                        command.set_result(contribution);
                    }
                }
                Ok(handled)
            }
        }
    }

    fn delegate(&self) -> Option<&Value> {
        self.delegate.as_ref()
    }
}

/// Builds a leaf handler's policy tables at startup.
#[derive(Default)]
pub struct HandlerBuilder {
    inner: Handler,
}

impl HandlerBuilder {
    /// Attaches the backing delegate value.
    pub fn delegate<T: Any + Send + Sync>(mut self, delegate: T) -> Self {
        self.inner.delegate = Some(value(delegate));
        self.inner.delegate_key = Some(Key::of::<T>());
        self
    }

    /// Registers a handle entry for payloads of exactly `T`.
    ///
    /// Typed extraction cannot upcast, so acceptance through a supertype
    /// key goes through [`handles_key`](Self::handles_key) instead.
    pub fn handles<T, F>(self, f: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&T, &Composer) -> Result<Dispatched> + Send + Sync + 'static,
    {
        self.handles_key(
            Key::of::<T>(),
            Arc::new(move |callback, composer| {
                let Body::Command(command) = callback.body() else {
                    return Ok(Dispatched::Unhandled);
                };
                let Some(payload) = command.payload_as::<T>() else {
                    return Ok(Dispatched::Unhandled);
                };
                f(&payload, composer)
            }),
        )
    }

    /// Registers a raw handle entry under `key`.
    pub fn handles_key(mut self, key: impl Into<Key>, callback: HandleFn) -> Self {
        let key = key.into();
        info!(key = %key, policy = "handle", "registered handler entry");
        self.inner.policies.register_handle(key, callback);
        self
    }

    /// Registers `instance` as the resolution candidate for its own type.
    pub fn provides<T: Any + Send + Sync>(self, instance: T) -> Self {
        let instance = value(instance);
        self.provides_key(
            Key::of::<T>(),
            Arc::new(move |_resolution, _composer| {
                Ok(Dispatched::HandledWith(Contribution::Ready(
                    instance.clone(),
                )))
            }),
        )
    }

    /// Registers a factory producing candidates for the key `T`.
    pub fn provides_with<T, F>(self, f: F) -> Self
    where
        T: Any + ?Sized,
        F: Fn(&Resolution, &Composer) -> Result<Dispatched> + Send + Sync + 'static,
    {
        self.provides_key(Key::of::<T>(), Arc::new(f))
    }

    /// Registers a raw provide entry under `key`.
    pub fn provides_key(mut self, key: impl Into<Key>, callback: ProvideFn) -> Self {
        let key = key.into();
        info!(key = %key, policy = "provide", "registered handler entry");
        self.inner.policies.register_provide(key, callback);
        self
    }

    /// Registers `v` as the value looked up under `key`.
    pub fn looks_up_value<T: Any + Send + Sync>(self, key: impl Into<Key>, v: T) -> Self {
        let v = value(v);
        self.looks_up(
            key,
            Arc::new(move |_lookup, _composer| {
                Ok(Dispatched::HandledWith(Contribution::Ready(v.clone())))
            }),
        )
    }

    /// Registers a raw lookup entry under `key`.
    pub fn looks_up(mut self, key: impl Into<Key>, callback: LookupFn) -> Self {
        let key = key.into();
        info!(key = %key, policy = "lookup", "registered handler entry");
        self.inner.policies.register_lookup(key, callback);
        self
    }

    pub fn build(self) -> Handler {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callback::{Command, Deferred, Lookup};
    use crate::handler::HandlerRef;
    use crate::hierarchy::relate_types;
    use crate::key::downcast;

    struct Ping;
    struct Greeter {
        greeting: &'static str,
    }

    #[test]
    fn typed_handle_entries_accept_their_payload() {
        let handler = HandlerRef::new(
            Handler::builder()
                .handles::<Ping, _>(|_ping, _composer| Ok(Dispatched::Handled))
                .build(),
        );
        let mut cb = Callback::from(Command::new(Ping));
        assert!(handler.dispatch(&mut cb, false).unwrap());

        let mut other = Callback::from(Command::new(7u32));
        assert!(!handler.dispatch(&mut other, false).unwrap());
    }

    #[test]
    fn provided_instances_satisfy_resolution() {
        let handler = HandlerRef::new(
            Handler::builder()
                .provides(Greeter { greeting: "hi" })
                .build(),
        );
        let out = handler.resolve(Key::of::<Greeter>()).unwrap().unwrap();
        let greeter = downcast::<Greeter>(out.ready().unwrap()).unwrap();
        assert_eq!(greeter.greeting, "hi");
    }

    #[test]
    fn delegate_resolves_implicitly() {
        struct Port;
        struct Adapter;
        relate_types::<Adapter, Port>();

        let handler = HandlerRef::wrap(Adapter);
        let out = handler.resolve(Key::of::<Port>()).unwrap();
        assert!(out.is_some());
        assert!(downcast::<Adapter>(out.unwrap().ready().unwrap()).is_some());
    }

    #[test]
    fn delegate_joins_registered_providers_when_resolving_all() {
        struct Sink;
        struct FileSink;
        struct NetSink;
        relate_types::<FileSink, Sink>();

        let handler = HandlerRef::new(
            Handler::builder()
                .delegate(FileSink)
                .provides_with::<Sink, _>(|_r, _c| {
                    Ok(Dispatched::HandledWith(Contribution::Ready(value(NetSink))))
                })
                .build(),
        );
        let out = handler.resolve_all(Key::of::<Sink>()).unwrap();
        match out {
            crate::callback::Outcome::ReadyMany(vs) => assert_eq!(vs.len(), 2),
            _ => panic!("expected settled candidates"),
        }
    }

    #[test]
    fn lookup_goes_through_the_lookup_table() {
        let handler = HandlerRef::new(
            Handler::builder()
                .looks_up_value("banner", "welcome".to_string())
                .build(),
        );
        let out = handler.lookup("banner").unwrap().unwrap();
        assert_eq!(
            *downcast::<String>(out.ready().unwrap()).unwrap(),
            "welcome".to_string()
        );
        assert!(handler.lookup("missing").unwrap().is_none());
    }

    #[tokio::test]
    async fn deferred_tracks_async_completions() {
        use crate::callback::outcome::ready_future;

        let handler = HandlerRef::new(
            Handler::builder()
                .handles::<Ping, _>(|_ping, _composer| {
                    Ok(Dispatched::HandledWith(Contribution::Deferred(
                        ready_future(Ok(value(()))),
                    )))
                })
                .build(),
        );
        let mut cb = Callback::from(Deferred::new(Callback::from(Command::new(Ping))));
        assert!(handler.dispatch(&mut cb, false).unwrap());
        let out = cb.outcome();
        assert!(out.is_deferred());
        let settled = out.settle().await.unwrap();
        assert!(*downcast::<bool>(&settled[0]).unwrap());
    }

    #[test]
    fn unregistered_lookup_key_reports_unhandled() {
        let handler = HandlerRef::new(Handler::new());
        let mut cb = Callback::from(Lookup::new("anything"));
        assert!(!handler.dispatch(&mut cb, false).unwrap());
    }
}
