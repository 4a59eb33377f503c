//! # Invocation Delegation
//!
//! Turns a capability plus member name into a dispatched invocation
//! envelope. The delegate reads the chain's ambient semantics once per call
//! to decide whether targets are discovered through resolution, whether the
//! invocation broadcasts or stops at one acceptance, whether finding no
//! target is a hard failure, and whether strict conformance is required.

use crate::callback::{Callback, MethodInvocation, Outcome, ResolvedInvocation};
use crate::callback::InvocationOptions;
use crate::capability;
use crate::config::DispatchConfig;
use crate::error::{DispatchError, Result};
use crate::handler::HandlerRef;
use crate::key::{Key, Value};

/// Member-access front-end over a handler graph.
pub struct InvocationDelegate {
    handler: HandlerRef,
}

impl InvocationDelegate {
    pub fn new(handler: HandlerRef) -> Self {
        Self { handler }
    }

    pub fn handler(&self) -> &HandlerRef {
        &self.handler
    }

    /// Reads a member of the capability.
    pub fn get(&self, capability: impl Into<Key>, member: &str) -> Result<Outcome> {
        self.call(MethodInvocation::get(capability, member))
    }

    /// Writes a member of the capability.
    pub fn set(&self, capability: impl Into<Key>, member: &str, v: Value) -> Result<Outcome> {
        self.call(MethodInvocation::set(capability, member, v))
    }

    /// Invokes a member of the capability.
    pub fn invoke(
        &self,
        capability: impl Into<Key>,
        member: &str,
        args: Vec<Value>,
    ) -> Result<Outcome> {
        self.call(MethodInvocation::invoke(capability, member, args))
    }

    fn call(&self, invocation: MethodInvocation) -> Result<Outcome> {
        let capability = invocation.capability().clone();
        let semantics = self.handler.ambient_semantics()?;

        let broadcast = semantics.option(InvocationOptions::BROADCAST);
        let best_effort = semantics.option(InvocationOptions::BEST_EFFORT);
        let use_resolve = semantics.option(InvocationOptions::RESOLVE)
            || capability::registry().is_resolving(&capability);

        let mut invocation = invocation;
        if semantics.option(InvocationOptions::STRICT)
            || DispatchConfig::current().strict_invocations
        {
            invocation.make_strict();
        }

        let mut cb = if use_resolve {
            Callback::from(ResolvedInvocation::new(invocation, broadcast, !best_effort))
        } else {
            Callback::from(invocation)
        };
        // Broadcast greedily only for direct dispatch; a resolving
        // invocation broadcasts through its own target cardinality.
        let handled = self.handler.dispatch(&mut cb, broadcast && !use_resolve)?;
        if !handled && !best_effort {
            return Err(DispatchError::NotHandled(Box::new(cb)));
        }
        Ok(cb.outcome())
    }
}

impl HandlerRef {
    /// A delegation front-end over this handler graph.
    pub fn to_delegate(&self) -> InvocationDelegate {
        InvocationDelegate::new(self.clone())
    }
}
