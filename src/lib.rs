#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Relay Core
//!
//! In-process callback dispatch and composition engine.
//!
//! ## Overview
//!
//! Independent components declare the capability to accept, resolve or
//! transform a well-typed unit of work, and arbitrarily many of them
//! compose into chains that route, filter and aggregate results, either
//! synchronously or through futures, without the caller knowing how many
//! components participate.
//!
//! ## Architecture
//!
//! Work travels as a [`Callback`] envelope dispatched through a graph of
//! [`Handling`] nodes. Leaf handlers match envelopes against their policy
//! tables under variance rules; cascades and composites fan dispatch out
//! across members; decorator combinators wrap any handler with filters,
//! aspects, resilience behavior or invocation semantics. The caller reads
//! the envelope's [`Outcome`], which hides whether results settled
//! synchronously or through futures.
//!
//! ## Module Organization
//!
//! - [`callback`] - Envelope variants and the uniform result abstraction
//! - [`binding`] / [`hierarchy`] - Variance-aware key matching
//! - [`dispatch`] - Policy tables and the variance-matched walk
//! - [`handler`] - The dispatch trait, leaf handlers, cascades, composites
//! - [`filter`] - Filter pipeline, aspects and resilience decorators
//! - [`capability`] - Member shims for dynamic method invocation
//! - [`delegate`] - Semantics-aware invocation front-end
//! - [`config`] - Runtime tunables
//! - [`error`] - Structured error handling
//!
//! ## Quick Start
//!
//! ```rust
//! use relay_core::{downcast, Handler, HandlerRef, Key};
//!
//! # fn main() -> relay_core::Result<()> {
//! struct Clock {
//!     ticks: u32,
//! }
//!
//! let handler = HandlerRef::new(Handler::builder().provides(Clock { ticks: 3 }).build());
//!
//! let out = handler.resolve(Key::of::<Clock>())?.expect("registered");
//! let clock = downcast::<Clock>(out.ready().unwrap()).unwrap();
//! assert_eq!(clock.ticks, 3);
//! # Ok(())
//! # }
//! ```

pub mod binding;
pub mod callback;
pub mod capability;
pub mod config;
pub mod delegate;
pub mod dispatch;
pub mod error;
pub mod filter;
pub mod handler;
pub mod hierarchy;
pub mod key;
pub mod logging;

pub use binding::{Binding, Variance};
pub use callback::{
    Body, Callback, Command, Composition, Contribution, Deferred, InvocationOptions,
    InvocationSemantics, Lookup, MethodInvocation, OpKind, Outcome, ResolvedInvocation,
    Resolution, SequenceFuture, ValueFuture,
};
pub use capability::{capability, CapabilityBuilder, CapabilityRegistry};
pub use config::DispatchConfig;
pub use delegate::InvocationDelegate;
pub use dispatch::{DispatchTable, Dispatched, HandleFn, LookupFn, Policy, ProvideFn};
pub use error::{DispatchError, Result};
pub use filter::{
    ActivityCounter, Decision, FilterSet, FilteredHandler, Filtering, FilteringProvider, Gate,
};
pub use handler::{
    CallOptionsHandler, CascadeHandler, Composer, CompositeHandler, Handler, HandlerBuilder,
    HandlerRef, Handling, WhenHandler,
};
pub use hierarchy::{relate_types, TypeHierarchy};
pub use key::{downcast, downcast_ref, value, Key, TypeKey, Value};
pub use logging::init_logging;
