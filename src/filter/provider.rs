//! Provider-driven filter pipelines.
//!
//! External layers plug into dispatch by contributing [`Filtering`] values
//! through a [`FilteringProvider`]. A [`FilteredHandler`] materializes the
//! pipeline per dispatch: providers are consulted for the callback at hand,
//! the collected filters are sorted by `order`, and the chain runs
//! innermost-last into the wrapped handler. A provider marked `required`
//! that contributes nothing fails the dispatch.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::warn;

use crate::callback::Callback;
use crate::error::Result;
use crate::handler::{Composer, HandlerRef, Handling};
use crate::key::Value;

/// Next-layer continuation used by [`Filtering::next`].
pub type NextFn<'a> = &'a mut dyn FnMut(&mut Callback, &Composer) -> Result<bool>;

/// One filter stage contributed by a provider.
pub trait Filtering: Send + Sync {
    /// Pipeline position; smaller runs earlier. Unordered filters run last.
    fn order(&self) -> Option<i32> {
        None
    }

    /// Whether composed callbacks are routed through this filter.
    fn reentrant(&self) -> bool {
        false
    }

    /// Processes the callback, forwarding through `next` zero or one times.
    fn next(&self, callback: &mut Callback, composer: &Composer, next: NextFn<'_>)
        -> Result<bool>;
}

/// Contributes filters for the callbacks it recognizes.
pub trait FilteringProvider: Send + Sync {
    /// When true, contributing no filters fails the dispatch outright.
    fn required(&self) -> bool {
        false
    }

    /// The filters to apply for this callback.
    fn filters(&self, callback: &Callback, composer: &Composer) -> Vec<Arc<dyn Filtering>>;
}

/// Ordered, deduplicating set of filter providers.
#[derive(Clone, Default)]
pub struct FilterSet {
    providers: Arc<RwLock<Vec<Arc<dyn FilteringProvider>>>>,
}

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a provider; a provider already present is not added twice.
    pub fn add(&self, provider: Arc<dyn FilteringProvider>) -> &Self {
        let mut providers = self.providers.write();
        if !providers.iter().any(|p| Arc::ptr_eq(p, &provider)) {
            providers.push(provider);
        }
        drop(providers);
        self
    }

    pub fn remove(&self, provider: &Arc<dyn FilteringProvider>) -> &Self {
        self.providers.write().retain(|p| !Arc::ptr_eq(p, provider));
        self
    }

    pub fn clear(&self) -> &Self {
        self.providers.write().clear();
        self
    }

    pub fn providers(&self) -> Vec<Arc<dyn FilteringProvider>> {
        self.providers.read().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.read().is_empty()
    }
}

/// Applies a provider pipeline around an inner handler.
pub struct FilteredHandler {
    inner: HandlerRef,
    filters: FilterSet,
}

impl FilteredHandler {
    pub fn new(inner: HandlerRef) -> Self {
        Self {
            inner,
            filters: FilterSet::new(),
        }
    }

    pub fn with_providers(
        inner: HandlerRef,
        providers: impl IntoIterator<Item = Arc<dyn FilteringProvider>>,
    ) -> Self {
        let handler = Self::new(inner);
        for provider in providers {
            handler.filters.add(provider);
        }
        handler
    }

    /// The mutable provider set; changes apply to subsequent dispatches.
    pub fn filters(&self) -> &FilterSet {
        &self.filters
    }
}

impl Handling for FilteredHandler {
    fn handle(&self, callback: &mut Callback, greedy: bool, composer: &Composer) -> Result<bool> {
        let mut stages: Vec<Arc<dyn Filtering>> = Vec::new();
        for provider in self.filters.providers() {
            let contributed = provider.filters(callback, composer);
            if contributed.is_empty() && provider.required() {
                warn!(callback = %callback, "required filter provider contributed nothing");
                return Ok(false);
            }
            stages.extend(contributed);
        }
        stages.sort_by_key(|f| f.order().unwrap_or(i32::MAX));
        run_stages(&stages, &self.inner, callback, greedy, composer)
    }

    fn delegate(&self) -> Option<&Value> {
        self.inner.delegate()
    }
}

fn run_stages(
    stages: &[Arc<dyn Filtering>],
    inner: &HandlerRef,
    callback: &mut Callback,
    greedy: bool,
    composer: &Composer,
) -> Result<bool> {
    match stages.split_first() {
        None => inner.handle(callback, greedy, composer),
        Some((stage, rest)) => {
            if !stage.reentrant() && callback.is_composed() {
                return run_stages(rest, inner, callback, greedy, composer);
            }
            stage.next(callback, composer, &mut |cb, composer| {
                run_stages(rest, inner, cb, greedy, composer)
            })
        }
    }
}

impl HandlerRef {
    /// Wraps this handler in a provider-driven filter pipeline.
    pub fn with_filters(
        &self,
        providers: impl IntoIterator<Item = Arc<dyn FilteringProvider>>,
    ) -> HandlerRef {
        HandlerRef::new(FilteredHandler::with_providers(self.clone(), providers))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callback::Command;
    use crate::dispatch::Dispatched;
    use crate::handler::Handler;
    use crate::key::Key;

    struct Ping;

    struct Recorder {
        name: &'static str,
        position: Option<i32>,
        log: Arc<RwLock<Vec<&'static str>>>,
    }

    impl Filtering for Recorder {
        fn order(&self) -> Option<i32> {
            self.position
        }

        fn next(
            &self,
            callback: &mut Callback,
            composer: &Composer,
            next: NextFn<'_>,
        ) -> Result<bool> {
            self.log.write().push(self.name);
            next(callback, composer)
        }
    }

    struct Fixed {
        filters: Vec<Arc<dyn Filtering>>,
        required: bool,
    }

    impl FilteringProvider for Fixed {
        fn required(&self) -> bool {
            self.required
        }

        fn filters(&self, _callback: &Callback, _composer: &Composer) -> Vec<Arc<dyn Filtering>> {
            self.filters.clone()
        }
    }

    fn accepting() -> HandlerRef {
        HandlerRef::new(Handler::accepting(
            Key::of::<Ping>(),
            Arc::new(|_cb, _composer| Ok(Dispatched::Handled)),
        ))
    }

    #[test]
    fn stages_run_in_order_priority() {
        let log = Arc::new(RwLock::new(Vec::new()));
        let provider: Arc<dyn FilteringProvider> = Arc::new(Fixed {
            filters: vec![
                Arc::new(Recorder {
                    name: "late",
                    position: Some(20),
                    log: log.clone(),
                }),
                Arc::new(Recorder {
                    name: "early",
                    position: Some(10),
                    log: log.clone(),
                }),
                Arc::new(Recorder {
                    name: "unordered",
                    position: None,
                    log: log.clone(),
                }),
            ],
            required: false,
        });

        let handler = accepting().with_filters([provider]);
        let mut cb = Callback::from(Command::new(Ping));
        assert!(handler.dispatch(&mut cb, false).unwrap());
        assert_eq!(*log.read(), vec!["early", "late", "unordered"]);
    }

    #[test]
    fn required_provider_without_filters_fails_dispatch() {
        let provider: Arc<dyn FilteringProvider> = Arc::new(Fixed {
            filters: Vec::new(),
            required: true,
        });
        let handler = accepting().with_filters([provider]);
        let mut cb = Callback::from(Command::new(Ping));
        assert!(!handler.dispatch(&mut cb, false).unwrap());
    }

    #[test]
    fn provider_set_deduplicates() {
        let provider: Arc<dyn FilteringProvider> = Arc::new(Fixed {
            filters: Vec::new(),
            required: false,
        });
        let set = FilterSet::new();
        set.add(provider.clone()).add(provider.clone());
        assert_eq!(set.providers().len(), 1);
        set.remove(&provider);
        assert!(set.is_empty());
    }
}
