//! Invocation semantics: cross-cutting invocation policy carried through a
//! handler chain as an ordinary callback.
//!
//! Any layer can read the ambient semantics by dispatching an
//! [`InvocationSemantics`] envelope greedily; semantics-bearing decorators
//! merge their flags into it without the probing layer knowing where in the
//! chain they sit. Semantics envelopes count as already composed so they
//! pass through non-reentrant filters untouched.

use std::ops::BitOr;

use serde::{Deserialize, Serialize};

/// Flag-set controlling how delegated invocations are dispatched.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InvocationOptions(u8);

impl InvocationOptions {
    pub const NONE: Self = Self(0);
    /// Deliver to every matching handler instead of stopping at one.
    pub const BROADCAST: Self = Self(1);
    /// Finding no handler is tolerated instead of a hard failure.
    pub const BEST_EFFORT: Self = Self(1 << 1);
    /// Targets must conform to the capability, not merely expose a member.
    pub const STRICT: Self = Self(1 << 2);
    /// Discover targets through resolution rather than direct dispatch.
    pub const RESOLVE: Self = Self(1 << 3);
    /// Publish to all handlers, tolerating none: broadcast plus best-effort.
    pub const NOTIFY: Self = Self(Self::BROADCAST.0 | Self::BEST_EFFORT.0);

    /// True when every flag in `other` is set.
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn with(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub fn without(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// The individual flags, for merge iteration.
    pub(crate) fn flags() -> [Self; 4] {
        [
            Self::BROADCAST,
            Self::BEST_EFFORT,
            Self::STRICT,
            Self::RESOLVE,
        ]
    }
}

impl BitOr for InvocationOptions {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.with(rhs)
    }
}

/// A flag-set plus a record of which flags were explicitly set.
///
/// The parallel `specified` mask distinguishes "explicitly false" from
/// "never touched", so layered merges never let a default silently override
/// an explicit choice.
#[derive(Clone, Copy, Debug, Default)]
pub struct InvocationSemantics {
    options: InvocationOptions,
    specified: InvocationOptions,
}

impl InvocationSemantics {
    pub fn new(options: InvocationOptions) -> Self {
        Self {
            options,
            specified: options,
        }
    }

    /// True when the option is currently enabled.
    pub fn option(&self, option: InvocationOptions) -> bool {
        self.options.contains(option)
    }

    /// Enables or disables an option, marking it as explicitly specified
    /// either way.
    pub fn set_option(&mut self, option: InvocationOptions, enabled: bool) {
        self.options = if enabled {
            self.options.with(option)
        } else {
            self.options.without(option)
        };
        self.specified = self.specified.with(option);
    }

    /// True when every flag in `option` has been explicitly specified.
    pub fn is_specified(&self, option: InvocationOptions) -> bool {
        self.specified.contains(option)
    }

    /// Copies every flag this semantics has specified into `other`, unless
    /// `other` already specified it. Outer scopes set defaults this way
    /// while inner scopes still win.
    pub fn merge_into(&self, other: &mut InvocationSemantics) {
        for flag in InvocationOptions::flags() {
            if self.is_specified(flag) && !other.is_specified(flag) {
                other.set_option(flag, self.option(flag));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notify_is_broadcast_plus_best_effort() {
        assert!(InvocationOptions::NOTIFY.contains(InvocationOptions::BROADCAST));
        assert!(InvocationOptions::NOTIFY.contains(InvocationOptions::BEST_EFFORT));
        assert!(!InvocationOptions::NOTIFY.contains(InvocationOptions::STRICT));
    }

    #[test]
    fn merge_copies_only_unspecified_flags() {
        let outer = InvocationSemantics::new(InvocationOptions::BROADCAST);
        let mut inner = InvocationSemantics::default();
        inner.set_option(InvocationOptions::BROADCAST, false);

        outer.merge_into(&mut inner);
        // The inner explicit false survives the outer true.
        assert!(!inner.option(InvocationOptions::BROADCAST));

        let mut untouched = InvocationSemantics::default();
        outer.merge_into(&mut untouched);
        assert!(untouched.option(InvocationOptions::BROADCAST));
        assert!(untouched.is_specified(InvocationOptions::BROADCAST));
    }

    #[test]
    fn explicit_false_counts_as_specified() {
        let mut s = InvocationSemantics::default();
        assert!(!s.is_specified(InvocationOptions::STRICT));
        s.set_option(InvocationOptions::STRICT, false);
        assert!(s.is_specified(InvocationOptions::STRICT));
        assert!(!s.option(InvocationOptions::STRICT));
    }
}
