//! # Dispatchers
//!
//! A dispatcher accepts one family of messages and delivers them to the
//! callbacks bound to it. The bus builds a [`MessageDispatcher`] per declared
//! message type; collaborators may plug in their own [`Dispatcher`]s (for
//! instance to hand delivery over to a specific thread).

use crate::error::{DeliveryError, HandlerError};
use crate::subscriber::{Invoke, PlannedHandler, Subscribe};
use crate::types::TypeKey;
use parking_lot::RwLock;
use std::any::Any;
use std::sync::{Arc, Weak};
use tracing::trace;

/// Delivery capability consumed by the [`Bus`](crate::Bus).
pub trait Dispatcher: Send + Sync {
    /// Whether this dispatcher accepts `message`. Must not have side effects.
    fn can_handle_message(&self, message: &dyn Any) -> bool;

    /// Deliver `message` to every bound callback, in binding order.
    ///
    /// Returns the number of callbacks invoked. The first failing callback
    /// aborts delivery; callbacks that already ran are not rolled back.
    fn post(&self, message: &dyn Any) -> Result<usize, DeliveryError>;

    /// Label used in logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

type Deliver = dyn Fn(&dyn Any) -> Option<Result<(), HandlerError>> + Send + Sync;

/// One subscriber instance bound to one message type.
pub(crate) struct Binding {
    owner: TypeKey,
    instance: Weak<dyn Any + Send + Sync>,
    deliver: Box<Deliver>,
}

impl Binding {
    pub(crate) fn new<S: Subscribe>(instance: &Weak<S>, handler: &PlannedHandler<S>) -> Self {
        let weak = instance.clone();
        let invoke: Invoke<S> = Arc::clone(&handler.invoke);
        Self {
            owner: handler.owner,
            instance: instance.clone(),
            deliver: Box::new(move |message: &dyn Any| {
                let subscriber = weak.upgrade()?;
                invoke(&*subscriber, message)
            }),
        }
    }

    pub(crate) fn is_alive(&self) -> bool {
        self.instance.strong_count() > 0
    }

    pub(crate) fn is_bound_to(&self, instance: *const ()) -> bool {
        self.is_alive() && self.instance.as_ptr().cast::<()>() == instance
    }
}

/// Bus-built dispatcher for exactly one message type.
pub struct MessageDispatcher {
    message: TypeKey,
    bindings: RwLock<Vec<Arc<Binding>>>,
}

impl MessageDispatcher {
    pub(crate) fn new(message: TypeKey) -> Self {
        Self {
            message,
            bindings: RwLock::new(Vec::new()),
        }
    }

    /// The accepted message type.
    #[must_use]
    pub fn message_type(&self) -> TypeKey {
        self.message
    }

    /// Number of bindings whose subscriber is still alive.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.read().iter().filter(|b| b.is_alive()).count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn bind(&self, binding: Binding) {
        self.bindings.write().push(Arc::new(binding));
    }

    pub(crate) fn is_bound(&self, instance: *const ()) -> bool {
        self.bindings.read().iter().any(|b| b.is_bound_to(instance))
    }

    /// Drop the bindings of `instance`; returns how many were removed.
    pub(crate) fn unbind(&self, instance: *const ()) -> usize {
        let mut bindings = self.bindings.write();
        let before = bindings.len();
        bindings.retain(|b| !b.is_bound_to(instance));
        before - bindings.len()
    }

    /// Drop bindings whose subscriber has been released.
    pub(crate) fn prune(&self) -> usize {
        let mut bindings = self.bindings.write();
        let before = bindings.len();
        bindings.retain(|b| b.is_alive());
        before - bindings.len()
    }
}

impl Dispatcher for MessageDispatcher {
    fn can_handle_message(&self, message: &dyn Any) -> bool {
        self.message.matches(message)
    }

    fn post(&self, message: &dyn Any) -> Result<usize, DeliveryError> {
        // Snapshot so callbacks can register on the bus while we deliver.
        let bindings = self.bindings.read().clone();

        let mut delivered = 0;
        for binding in &bindings {
            match (binding.deliver)(message) {
                None => {}
                Some(Ok(())) => delivered += 1,
                Some(Err(source)) => {
                    return Err(DeliveryError::Handler {
                        message: self.message,
                        subscriber: binding.owner,
                        source,
                    })
                }
            }
        }

        trace!(message_type = %self.message, delivered, "Dispatcher delivered message");
        Ok(delivered)
    }

    fn name(&self) -> &str {
        self.message.name()
    }
}
