//! Method invocation envelopes: target-free descriptors of a member access
//! dispatched against whichever targets a handler chain supplies.

use futures::FutureExt;

use crate::callback::outcome::{Contribution, Outcome, SequenceFuture};
use crate::callback::Callback;
use crate::capability;
use crate::error::{DispatchError, Result};
use crate::handler::Composer;
use crate::key::{value, Key, Value};

/// The kind of member access an invocation performs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpKind {
    Get,
    Set,
    Invoke,
}

/// Captures one member access against a capability.
///
/// The envelope carries no target; [`invoke_on`](Self::invoke_on) attempts
/// it against a concrete value using the capability registry's member shims.
#[derive(Clone)]
pub struct MethodInvocation {
    kind: OpKind,
    capability: Key,
    member: String,
    args: Vec<Value>,
    strict: bool,
    return_value: Option<Contribution>,
    exception: Option<DispatchError>,
    cached: Option<Outcome>,
}

impl MethodInvocation {
    pub fn get(capability: impl Into<Key>, member: impl Into<String>) -> Self {
        Self::raw(OpKind::Get, capability, member, Vec::new())
    }

    pub fn set(capability: impl Into<Key>, member: impl Into<String>, v: Value) -> Self {
        Self::raw(OpKind::Set, capability, member, vec![v])
    }

    pub fn invoke(
        capability: impl Into<Key>,
        member: impl Into<String>,
        args: Vec<Value>,
    ) -> Self {
        Self::raw(OpKind::Invoke, capability, member, args)
    }

    fn raw(
        kind: OpKind,
        capability: impl Into<Key>,
        member: impl Into<String>,
        args: Vec<Value>,
    ) -> Self {
        Self {
            kind,
            capability: capability.into(),
            member: member.into(),
            args,
            strict: false,
            return_value: None,
            exception: None,
            cached: None,
        }
    }

    /// Requires targets to be declared adopters of the capability.
    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    pub(crate) fn make_strict(&mut self) {
        self.strict = true;
    }

    pub fn kind(&self) -> OpKind {
        self.kind
    }

    pub fn capability(&self) -> &Key {
        &self.capability
    }

    pub fn member(&self) -> &str {
        &self.member
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    pub fn return_value(&self) -> Option<&Contribution> {
        self.return_value.as_ref()
    }

    pub fn take_return_value(&mut self) -> Option<Contribution> {
        self.cached = None;
        self.return_value.take()
    }

    pub fn set_return_value(&mut self, contribution: Contribution) {
        self.return_value = Some(contribution);
        self.cached = None;
    }

    /// The failure raised by the member, when one occurred.
    pub fn exception(&self) -> Option<&DispatchError> {
        self.exception.as_ref()
    }

    /// Attempts the member access on `target`.
    ///
    /// Returns `Ok(false)` when the target does not apply: no shim is
    /// registered for its concrete type, or strictness is demanded and the
    /// type is not a declared adopter. A member failure is recorded on the
    /// envelope and propagated.
    pub fn invoke_on(&mut self, target: &Value, composer: &Composer) -> Result<bool> {
        let registry = capability::registry();
        if self.strict && !registry.adopts(&self.capability, target) {
            return Ok(false);
        }
        let Some(shim) = registry.member(&self.capability, target, self.kind, &self.member) else {
            return Ok(false);
        };
        match shim(target, &self.args, composer) {
            Ok(returned) => {
                self.return_value = returned;
                self.cached = None;
                Ok(true)
            }
            Err(e) => {
                self.exception = Some(e.clone());
                self.cached = None;
                Err(e)
            }
        }
    }

    pub(crate) fn outcome(&mut self) -> Outcome {
        let return_value = &self.return_value;
        self.cached
            .get_or_insert_with(|| match return_value {
                None => Outcome::Empty,
                Some(Contribution::Ready(v)) => Outcome::Ready(v.clone()),
                Some(Contribution::Deferred(f)) => Outcome::Pending(f.clone()),
            })
            .clone()
    }

    pub(crate) fn set_outcome(&mut self, outcome: Outcome) {
        self.cached = Some(outcome);
    }
}

/// A method invocation that discovers its own targets through resolution.
#[derive(Clone)]
pub struct ResolvedInvocation {
    inner: MethodInvocation,
    all: bool,
    required: bool,
}

impl ResolvedInvocation {
    /// `all` invokes every resolved target instead of stopping at the first
    /// acceptance; `required` makes zero acceptances a hard failure.
    pub fn new(invocation: MethodInvocation, all: bool, required: bool) -> Self {
        Self {
            inner: invocation,
            all,
            required,
        }
    }

    pub fn invocation(&self) -> &MethodInvocation {
        &self.inner
    }

    pub fn invocation_mut(&mut self) -> &mut MethodInvocation {
        &mut self.inner
    }

    pub fn matches_all(&self) -> bool {
        self.all
    }

    pub fn requires_one(&self) -> bool {
        self.required
    }

    /// Resolves targets for the capability and invokes them.
    ///
    /// When resolution is synchronous the targets are invoked in place.
    /// When it is deferred the envelope immediately reports handled and its
    /// result becomes a future that performs the invocations once targets
    /// settle, rejecting when none accepts and acceptance is required.
    pub fn invoke_resolve(&mut self, composer: &Composer) -> Result<bool> {
        let targets = composer.resolve_all(self.inner.capability.clone())?;
        match targets {
            Outcome::Empty => Ok(false),
            Outcome::Ready(v) => self.invoke_targets(&[v], composer),
            Outcome::ReadyMany(vs) => self.invoke_targets(&vs, composer),
            Outcome::Pending(f) => {
                let single = async move { f.await.map(|v| vec![v]) }.boxed().shared();
                self.invoke_deferred(single, composer);
                Ok(true)
            }
            Outcome::PendingMany(f) => {
                self.invoke_deferred(f, composer);
                Ok(true)
            }
        }
    }

    fn invoke_targets(&mut self, targets: &[Value], composer: &Composer) -> Result<bool> {
        let mut handled = false;
        for target in targets {
            handled |= self.inner.invoke_on(target, composer)?;
            if handled && !self.all {
                break;
            }
        }
        Ok(handled)
    }

    fn invoke_deferred(&mut self, targets: SequenceFuture, composer: &Composer) {
        let mut probe = self.inner.clone();
        let all = self.all;
        let required = self.required;
        let composer = composer.clone();
        let settled = async move {
            let targets = targets.await?;
            let mut handled = false;
            for target in &targets {
                handled |= probe.invoke_on(target, &composer)?;
                if handled && !all {
                    break;
                }
            }
            if !handled {
                if required {
                    return Err(DispatchError::NotHandled(Box::new(Callback::from(probe))));
                }
                return Ok(value(()));
            }
            match probe.take_return_value() {
                Some(Contribution::Ready(v)) => Ok(v),
                Some(Contribution::Deferred(f)) => f.await,
                None => Ok(value(())),
            }
        };
        self.inner
            .set_return_value(Contribution::Deferred(settled.boxed().shared()));
    }
}
