//! # Capability Registry
//!
//! Process-wide registry describing which concrete types can receive which
//! method invocations.
//!
//! A capability is identified by a marker type. Adopting types register a
//! call shim per member (get, set or invoke) keyed by their concrete type;
//! the shims are installed once at startup and read on every dispatch. An
//! invocation under strict semantics additionally requires the target to be
//! a declared adopter, which distinguishes "conforms to the capability"
//! from "happens to expose the member".
//!
//! Adoption also feeds the type hierarchy, so a resolution for a capability
//! key is satisfied by any adopter instance.

use std::any::{Any, TypeId};
use std::marker::PhantomData;
use std::sync::{Arc, OnceLock};

use dashmap::{DashMap, DashSet};
use tracing::info;

use crate::callback::invocation::OpKind;
use crate::callback::outcome::Contribution;
use crate::error::{DispatchError, Result};
use crate::handler::Composer;
use crate::hierarchy;
use crate::key::{type_id_of, Key, Value};

/// Call shim bridging an erased target to one capability member.
pub type MemberFn =
    Arc<dyn Fn(&Value, &[Value], &Composer) -> Result<Option<Contribution>> + Send + Sync>;

#[derive(Clone, PartialEq, Eq, Hash)]
struct MemberKey {
    capability: Key,
    target: TypeId,
    kind: OpKind,
    name: String,
}

static REGISTRY: OnceLock<CapabilityRegistry> = OnceLock::new();

/// The process-wide capability registry.
pub fn registry() -> &'static CapabilityRegistry {
    REGISTRY.get_or_init(CapabilityRegistry::default)
}

/// Starts describing a capability identified by the marker type `C`.
pub fn capability<C: Any + ?Sized>() -> CapabilityBuilder {
    CapabilityBuilder {
        key: Key::of::<C>(),
    }
}

/// Registry of member shims and declared adopters.
#[derive(Default)]
pub struct CapabilityRegistry {
    members: DashMap<MemberKey, MemberFn>,
    adopters: DashSet<(Key, TypeId)>,
    resolving: DashSet<Key>,
}

impl CapabilityRegistry {
    /// The shim for `member` on the concrete type behind `target`.
    pub fn member(
        &self,
        capability: &Key,
        target: &Value,
        kind: OpKind,
        name: &str,
    ) -> Option<MemberFn> {
        self.members
            .get(&MemberKey {
                capability: capability.clone(),
                target: type_id_of(target),
                kind,
                name: name.to_string(),
            })
            .map(|entry| entry.value().clone())
    }

    /// True when the concrete type behind `target` declared adoption.
    pub fn adopts(&self, capability: &Key, target: &Value) -> bool {
        self.adopters
            .contains(&(capability.clone(), type_id_of(target)))
    }

    /// True when the capability defaults to resolution-driven invocation.
    pub fn is_resolving(&self, capability: &Key) -> bool {
        self.resolving.contains(capability)
    }
}

/// Describes one capability.
pub struct CapabilityBuilder {
    key: Key,
}

impl CapabilityBuilder {
    pub fn key(&self) -> &Key {
        &self.key
    }

    /// Marks the capability as resolution-driven: delegated invocations
    /// discover targets through resolution without opting in per call.
    pub fn resolving(self) -> Self {
        registry().resolving.insert(self.key.clone());
        self
    }

    /// Starts registering the members `T` implements for this capability.
    pub fn adopter<T: Any + Send + Sync>(self) -> AdopterBuilder<T> {
        registry()
            .adopters
            .insert((self.key.clone(), TypeId::of::<T>()));
        hierarchy::global().relate(Key::of::<T>(), self.key.clone());
        info!(capability = %self.key, adopter = %Key::of::<T>(), "registered capability adopter");
        AdopterBuilder {
            capability: self.key,
            _target: PhantomData,
        }
    }
}

/// Registers member shims for one adopting type.
pub struct AdopterBuilder<T> {
    capability: Key,
    _target: PhantomData<fn() -> T>,
}

impl<T: Any + Send + Sync> AdopterBuilder<T> {
    fn insert(self, kind: OpKind, name: &str, shim: MemberFn) -> Self {
        registry().members.insert(
            MemberKey {
                capability: self.capability.clone(),
                target: TypeId::of::<T>(),
                kind,
                name: name.to_string(),
            },
            shim,
        );
        self
    }

    /// Registers a callable member.
    pub fn invokes<F>(self, name: &str, f: F) -> Self
    where
        F: Fn(&T, &[Value], &Composer) -> Result<Option<Contribution>> + Send + Sync + 'static,
    {
        let member = name.to_string();
        self.insert(
            OpKind::Invoke,
            name,
            Arc::new(move |target, args, composer| {
                let target = expect_target::<T>(target, &member)?;
                f(target, args, composer)
            }),
        )
    }

    /// Registers a readable member.
    pub fn getter<F>(self, name: &str, f: F) -> Self
    where
        F: Fn(&T, &Composer) -> Result<Option<Contribution>> + Send + Sync + 'static,
    {
        let member = name.to_string();
        self.insert(
            OpKind::Get,
            name,
            Arc::new(move |target, _args, composer| {
                let target = expect_target::<T>(target, &member)?;
                f(target, composer)
            }),
        )
    }

    /// Registers a writable member. The assigned value becomes the result.
    pub fn setter<F>(self, name: &str, f: F) -> Self
    where
        F: Fn(&T, &Value, &Composer) -> Result<()> + Send + Sync + 'static,
    {
        let member = name.to_string();
        self.insert(
            OpKind::Set,
            name,
            Arc::new(move |target, args, composer| {
                let target = expect_target::<T>(target, &member)?;
                let assigned = args.first().ok_or_else(|| DispatchError::Invocation {
                    member: member.clone(),
                    reason: "set requires a value".to_string(),
                })?;
                f(target, assigned, composer)?;
                Ok(Some(Contribution::Ready(assigned.clone())))
            }),
        )
    }

    /// Finishes this adopter and returns to the capability.
    pub fn done(self) -> CapabilityBuilder {
        CapabilityBuilder {
            key: self.capability,
        }
    }
}

fn expect_target<'a, T: Any>(target: &'a Value, member: &str) -> Result<&'a T> {
    crate::key::downcast_ref::<T>(target).ok_or_else(|| DispatchError::Invocation {
        member: member.to_string(),
        reason: "target is not the registered adopter type".to_string(),
    })
}
