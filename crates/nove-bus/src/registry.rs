//! # Dispatcher Registry
//!
//! Resolves a subscriber type into its validated [`SubscriberPlan`] and
//! caches the plan per concrete type, so declarations run once no matter
//! how many instances register.

use crate::error::RegistrationError;
use crate::subscriber::{Subscribe, SubscriberPlan};
use crate::types::TypeKey;
use parking_lot::RwLock;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

type ErasedPlan = Arc<dyn Any + Send + Sync>;

/// Cache of subscriber plans keyed by subscriber type.
#[derive(Default)]
pub struct DispatcherRegistry {
    plans: RwLock<HashMap<TypeId, ErasedPlan>>,
}

impl DispatcherRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the cached plan for `S`, building and validating it on first use.
    ///
    /// Failed plans are not cached; every attempt reports the same error.
    pub fn resolve<S: Subscribe>(&self) -> Result<Arc<SubscriberPlan<S>>, RegistrationError> {
        let key = TypeKey::of::<S>();

        let cached = self.plans.read().get(&key.id()).cloned();
        if let Some(plan) = cached.and_then(|plan| plan.downcast::<SubscriberPlan<S>>().ok()) {
            return Ok(plan);
        }

        let plan = Arc::new(SubscriberPlan::<S>::build()?);
        debug!(
            subscriber = %key,
            messages = plan.message_types().len(),
            "Subscriber plan built"
        );

        let erased: ErasedPlan = plan.clone();
        self.plans.write().insert(key.id(), erased);
        Ok(plan)
    }

    /// Whether a plan for `S` has been built.
    #[must_use]
    pub fn is_cached<S: Subscribe>(&self) -> bool {
        self.plans.read().contains_key(&TypeId::of::<S>())
    }

    /// Number of cached plans.
    #[must_use]
    pub fn len(&self) -> usize {
        self.plans.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subscriber::Declaration;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static DECLARATIONS: AtomicUsize = AtomicUsize::new(0);

    struct Counted;

    impl Subscribe for Counted {
        fn declare(d: &mut Declaration<Self>) {
            DECLARATIONS.fetch_add(1, Ordering::SeqCst);
            d.handle::<u64>(|_, _| {});
        }
    }

    struct Empty;

    impl Subscribe for Empty {}

    #[test]
    fn test_plan_built_once_per_type() {
        let registry = DispatcherRegistry::new();
        assert!(!registry.is_cached::<Counted>());

        let first = registry.resolve::<Counted>().unwrap();
        let second = registry.resolve::<Counted>().unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(DECLARATIONS.load(Ordering::SeqCst), 1);
        assert!(registry.is_cached::<Counted>());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_failures_are_not_cached() {
        let registry = DispatcherRegistry::new();

        for _ in 0..2 {
            let err = registry.resolve::<Empty>().err().unwrap();
            assert!(matches!(err, RegistrationError::DispatcherNotFound { .. }));
        }
        assert!(registry.is_empty());
    }
}
