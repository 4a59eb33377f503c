//! Cascade: an OR-combination of exactly two handlers.

use crate::callback::Callback;
use crate::error::Result;
use crate::handler::{Composer, Handler, HandlerRef, Handling};

/// Two handlers tried in order.
///
/// Non-greedy dispatch short-circuits at the first success across three
/// tiers in a fixed order: the cascade's own direct dispatch, then the
/// primary handler, then the secondary. Greedy dispatch visits all three
/// regardless of earlier outcomes and ORs the results.
pub struct CascadeHandler {
    base: Handler,
    primary: HandlerRef,
    secondary: HandlerRef,
}

impl CascadeHandler {
    pub fn new(primary: HandlerRef, secondary: HandlerRef) -> Self {
        Self {
            base: Handler::new(),
            primary,
            secondary,
        }
    }

    pub fn primary(&self) -> &HandlerRef {
        &self.primary
    }

    pub fn secondary(&self) -> &HandlerRef {
        &self.secondary
    }
}

impl Handling for CascadeHandler {
    fn handle(&self, callback: &mut Callback, greedy: bool, composer: &Composer) -> Result<bool> {
        let mut handled = self.base.handle(callback, greedy, composer)?;
        if greedy {
            let first = self.primary.handle(callback, true, composer)?;
            let second = self.secondary.handle(callback, true, composer)?;
            handled = handled | first | second;
        } else if !handled {
            handled = self.primary.handle(callback, false, composer)?
                || self.secondary.handle(callback, false, composer)?;
        }
        Ok(handled)
    }
}
