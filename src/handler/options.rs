//! Semantics-bearing decorator: carries invocation options on behalf of the
//! handlers beneath it.

use crate::callback::{Body, Callback, InvocationOptions, InvocationSemantics};
use crate::error::Result;
use crate::handler::{Composer, HandlerRef, Handling};

/// Answers semantics probes and adjusts greediness for the chain below.
///
/// A semantics envelope dispatched through this handler receives the
/// carried options through a non-destructive merge, so an outer scope's
/// defaults never override an inner scope's explicit choices. For ordinary
/// callbacks the carried (or probed) semantics decide whether non-greedy
/// dispatch is promoted to broadcast.
pub struct CallOptionsHandler {
    inner: HandlerRef,
    semantics: InvocationSemantics,
}

impl CallOptionsHandler {
    pub fn new(inner: HandlerRef, options: InvocationOptions) -> Self {
        Self {
            inner,
            semantics: InvocationSemantics::new(options),
        }
    }
}

impl Handling for CallOptionsHandler {
    fn handle(&self, callback: &mut Callback, greedy: bool, composer: &Composer) -> Result<bool> {
        if let Body::Semantics(target) = callback.body_mut() {
            self.semantics.merge_into(target);
            if greedy {
                let _ = self.inner.handle(callback, true, composer)?;
            }
            return Ok(true);
        }

        let mut greedy = greedy;
        if !greedy {
            let broadcast_resolve = InvocationOptions::BROADCAST | InvocationOptions::RESOLVE;
            if self.semantics.is_specified(broadcast_resolve) {
                // Resolution carries its own cardinality; broadcast alone
                // promotes to greedy.
                greedy = self.semantics.option(InvocationOptions::BROADCAST)
                    && !self.semantics.option(InvocationOptions::RESOLVE);
            } else {
                let mut probe = InvocationSemantics::default();
                self.semantics.merge_into(&mut probe);
                let mut probe_cb = Callback::from(probe);
                let _ = self.inner.handle(&mut probe_cb, true, composer)?;
                if let Body::Semantics(probed) = probe_cb.body() {
                    if probed.is_specified(InvocationOptions::BROADCAST) {
                        greedy = probed.option(InvocationOptions::BROADCAST)
                            && !probed.option(InvocationOptions::RESOLVE);
                    }
                }
            }
        }
        self.inner.handle(callback, greedy, composer)
    }
}

impl HandlerRef {
    /// Carries explicit invocation options for the chain below.
    pub fn call_options(&self, options: InvocationOptions) -> HandlerRef {
        HandlerRef::new(CallOptionsHandler::new(self.clone(), options))
    }

    /// Delivers invocations to every matching target.
    pub fn broadcast(&self) -> HandlerRef {
        self.call_options(InvocationOptions::BROADCAST)
    }

    /// Tolerates invocations that find no target.
    pub fn best_effort(&self) -> HandlerRef {
        self.call_options(InvocationOptions::BEST_EFFORT)
    }

    /// Requires targets to conform to the invoked capability.
    pub fn strict(&self) -> HandlerRef {
        self.call_options(InvocationOptions::STRICT)
    }

    /// Publishes invocations: broadcast plus best-effort.
    pub fn notify(&self) -> HandlerRef {
        self.call_options(InvocationOptions::NOTIFY)
    }

    /// Discovers invocation targets through resolution.
    pub fn resolving(&self) -> HandlerRef {
        self.call_options(InvocationOptions::RESOLVE)
    }
}
