//! # Bus
//!
//! Owns the dispatcher registry and the message type → dispatcher mapping.
//!
//! ## Locking
//!
//! The mapping sits behind a `RwLock`. `post` snapshots the matching
//! dispatchers and releases the lock before any callback runs, so callbacks
//! may post or register on the same bus. Delivery always happens on the
//! calling thread.
//!
//! ## Subscriber lifetime
//!
//! The bus keeps weak references. Dropping the last `Arc` of a subscriber
//! stops delivery to it; its bindings are reclaimed by [`Bus::purge`] and,
//! unless disabled in [`BusConfig`], on every registration.

use crate::config::BusConfig;
use crate::dispatcher::{Binding, Dispatcher, MessageDispatcher};
use crate::error::{DeliveryError, RegistrationError};
use crate::registry::DispatcherRegistry;
use crate::subscriber::Subscribe;
use crate::types::TypeKey;
use parking_lot::RwLock;
use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tracing::{debug, info, trace, warn};

/// Dispatcher mapping guarded by the bus lock.
#[derive(Default)]
struct Routes {
    /// Bus-built dispatchers by message type.
    by_type: HashMap<TypeId, Arc<MessageDispatcher>>,
    /// Every dispatcher in creation order; this is the post order.
    order: Vec<Arc<dyn Dispatcher>>,
}

impl Routes {
    fn dispatcher_for(&mut self, message: TypeKey, bus: &str) -> Arc<MessageDispatcher> {
        if let Some(existing) = self.by_type.get(&message.id()) {
            return Arc::clone(existing);
        }

        let dispatcher = Arc::new(MessageDispatcher::new(message));
        self.by_type.insert(message.id(), Arc::clone(&dispatcher));
        let erased: Arc<dyn Dispatcher> = dispatcher.clone();
        self.order.push(erased);

        info!(bus, message_type = %message, "Dispatcher created");
        dispatcher
    }

    fn is_bound(&self, instance: *const ()) -> bool {
        self.by_type.values().any(|d| d.is_bound(instance))
    }

    fn prune(&self) -> usize {
        self.by_type.values().map(|d| d.prune()).sum()
    }
}

/// Outcome of a successful registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    subscriber: TypeKey,
    messages: Vec<TypeKey>,
    newly_bound: bool,
}

impl Registration {
    /// The registered subscriber type.
    #[must_use]
    pub fn subscriber(&self) -> TypeKey {
        self.subscriber
    }

    /// Message types the subscriber is bound to.
    #[must_use]
    pub fn messages(&self) -> &[TypeKey] {
        &self.messages
    }

    /// False when the instance was already registered and nothing changed.
    #[must_use]
    pub fn is_newly_bound(&self) -> bool {
        self.newly_bound
    }
}

/// In-process publish/subscribe bus routing messages by runtime type.
pub struct Bus {
    config: BusConfig,
    registry: DispatcherRegistry,
    routes: RwLock<Routes>,
}

impl Bus {
    /// Create a bus with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(BusConfig::default())
    }

    /// Create a bus with the given configuration.
    #[must_use]
    pub fn with_config(config: BusConfig) -> Self {
        Self {
            config,
            registry: DispatcherRegistry::new(),
            routes: RwLock::new(Routes::default()),
        }
    }

    /// Register a subscriber instance.
    ///
    /// # Errors
    ///
    /// - [`RegistrationError::DispatcherNotFound`] if `S` declares no handlers
    /// - [`RegistrationError::SubclassRegistration`] or
    ///   [`RegistrationError::DuplicateHandler`] if the declaration breaks the
    ///   ownership rules
    ///
    /// The bus is unchanged when an error is returned.
    pub fn register<S: Subscribe>(
        &self,
        subscriber: &Arc<S>,
    ) -> Result<Registration, RegistrationError> {
        self.register_weak(&Arc::downgrade(subscriber))
    }

    /// Register a subscriber through a weak reference.
    ///
    /// # Errors
    ///
    /// [`RegistrationError::InvalidArgument`] if the subscriber has already
    /// been dropped, plus everything [`Bus::register`] reports.
    pub fn register_weak<S: Subscribe>(
        &self,
        subscriber: &Weak<S>,
    ) -> Result<Registration, RegistrationError> {
        let Some(instance) = subscriber.upgrade() else {
            warn!(
                bus = %self.config.name,
                subscriber = type_name::<S>(),
                "Registration rejected: null object"
            );
            return Err(RegistrationError::null_object());
        };

        let plan = self.registry.resolve::<S>().inspect_err(|e| {
            warn!(bus = %self.config.name, error = %e, "Registration rejected");
        })?;

        let target = Arc::as_ptr(&instance).cast::<()>();
        let mut registration = Registration {
            subscriber: plan.subscriber(),
            messages: plan.message_types(),
            newly_bound: false,
        };

        let mut routes = self.routes.write();
        if self.config.prune_on_register {
            let pruned = routes.prune();
            if pruned > 0 {
                debug!(bus = %self.config.name, pruned, "Released subscribers pruned");
            }
        }

        if routes.is_bound(target) {
            warn!(
                bus = %self.config.name,
                subscriber = %registration.subscriber,
                "Subscriber already registered, ignoring"
            );
            return Ok(registration);
        }

        for handler in plan.handlers() {
            routes
                .dispatcher_for(handler.message, &self.config.name)
                .bind(Binding::new(subscriber, handler));
        }
        drop(routes);

        registration.newly_bound = true;
        debug!(
            bus = %self.config.name,
            subscriber = %registration.subscriber,
            messages = registration.messages.len(),
            "Subscriber registered"
        );
        Ok(registration)
    }

    /// Remove every binding of `subscriber`. Returns how many were removed.
    pub fn unregister<S: Subscribe>(&self, subscriber: &Arc<S>) -> usize {
        let target = Arc::as_ptr(subscriber).cast::<()>();
        let removed: usize = self
            .routes
            .read()
            .by_type
            .values()
            .map(|d| d.unbind(target))
            .sum();

        debug!(
            bus = %self.config.name,
            subscriber = type_name::<S>(),
            removed,
            "Subscriber unregistered"
        );
        removed
    }

    /// Whether `subscriber` currently has bindings on this bus.
    #[must_use]
    pub fn is_registered<S: Subscribe>(&self, subscriber: &Arc<S>) -> bool {
        self.routes
            .read()
            .is_bound(Arc::as_ptr(subscriber).cast::<()>())
    }

    /// Drop bindings of released subscribers. Returns how many were removed.
    pub fn purge(&self) -> usize {
        let pruned = self.routes.read().prune();
        debug!(bus = %self.config.name, pruned, "Released subscribers purged");
        pruned
    }

    /// Plug in an externally implemented dispatcher. It is consulted after
    /// every dispatcher that already exists.
    pub fn add_dispatcher(&self, dispatcher: Arc<dyn Dispatcher>) {
        info!(
            bus = %self.config.name,
            dispatcher = dispatcher.name(),
            "External dispatcher added"
        );
        self.routes.write().order.push(dispatcher);
    }

    /// Post a message to every dispatcher that accepts it.
    ///
    /// Returns the number of callbacks invoked; zero when nobody listens.
    ///
    /// # Errors
    ///
    /// The first [`DeliveryError`] raised by a dispatcher. Dispatchers
    /// consulted before it have already delivered.
    pub fn post<M: Any>(&self, message: M) -> Result<usize, DeliveryError> {
        self.dispatch(&message, Some(type_name::<M>()))
    }

    /// Post a borrowed message. See [`Bus::post`].
    pub fn post_ref<M: Any>(&self, message: &M) -> Result<usize, DeliveryError> {
        self.dispatch(message, Some(type_name::<M>()))
    }

    /// Post a type-erased message. See [`Bus::post`].
    ///
    /// Logs name the message after the first dispatcher that accepted it.
    pub fn post_dyn(&self, message: &dyn Any) -> Result<usize, DeliveryError> {
        self.dispatch(message, None)
    }

    fn dispatch(
        &self,
        message: &dyn Any,
        message_type: Option<&'static str>,
    ) -> Result<usize, DeliveryError> {
        // Predicates of external dispatchers run without the routes lock.
        let order = self.routes.read().order.clone();
        let matching: Vec<Arc<dyn Dispatcher>> = order
            .into_iter()
            .filter(|d| d.can_handle_message(message))
            .collect();

        let type_id = Any::type_id(message);
        let message_type = match message_type {
            Some(name) => name,
            None => matching.first().map_or("<erased>", |d| d.name()),
        };

        if matching.is_empty() {
            if self.config.log_unmatched {
                trace!(
                    bus = %self.config.name,
                    message_type,
                    ?type_id,
                    "No dispatcher matched, message dropped"
                );
            }
            return Ok(0);
        }

        let mut delivered = 0;
        for dispatcher in &matching {
            delivered += dispatcher.post(message).inspect_err(|e| {
                warn!(
                    bus = %self.config.name,
                    dispatcher = dispatcher.name(),
                    error = %e,
                    "Delivery failed"
                );
            })?;
        }

        debug!(
            bus = %self.config.name,
            message_type,
            dispatchers = matching.len(),
            delivered,
            "Message posted"
        );
        Ok(delivered)
    }

    /// The bus-built dispatcher for messages of type `M`, if one exists.
    #[must_use]
    pub fn dispatcher<M: Any>(&self) -> Option<Arc<MessageDispatcher>> {
        self.routes.read().by_type.get(&TypeId::of::<M>()).cloned()
    }

    /// Number of dispatchers, bus-built and external.
    #[must_use]
    pub fn dispatcher_count(&self) -> usize {
        self.routes.read().order.len()
    }

    /// Number of live bindings across bus-built dispatchers.
    #[must_use]
    pub fn binding_count(&self) -> usize {
        self.routes.read().by_type.values().map(|d| d.len()).sum()
    }

    #[must_use]
    pub fn registry(&self) -> &DispatcherRegistry {
        &self.registry
    }

    #[must_use]
    pub fn config(&self) -> &BusConfig {
        &self.config
    }
}

impl Default for Bus {
    fn default() -> Self {
        Self::new()
    }
}
