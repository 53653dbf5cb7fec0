//! # Subscriber Contract
//!
//! A subscriber type states what it handles by implementing [`Subscribe`].
//! The declaration is explicit: own handlers, parent components whose
//! handlers are inherited, override markers and the extension marker.
//!
//! ## Ownership rules
//!
//! Every message type ends up owned by exactly one declaring type:
//!
//! - a type that only inherits handlers must call
//!   [`Declaration::extension`], otherwise registering it is rejected
//! - redeclaring an inherited message type requires
//!   [`Declaration::overrides`]; the inherited binding is then dropped
//! - two parents handling the same message type is ambiguous unless the
//!   inheriting type overrides it
//!
//! ```rust,ignore
//! struct Audit { seen: Mutex<Vec<String>> }
//!
//! impl Subscribe for Audit {
//!     fn declare(d: &mut Declaration<Self>) {
//!         d.handle::<String>(|audit, msg| audit.seen.lock().push(msg.clone()));
//!     }
//! }
//!
//! struct TimedAudit { audit: Audit }
//!
//! impl Subscribe for TimedAudit {
//!     fn declare(d: &mut Declaration<Self>) {
//!         d.inherit::<Audit>(|t| &t.audit).extension();
//!     }
//! }
//! ```

use crate::error::{HandlerError, RegistrationError};
use crate::types::TypeKey;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

/// A type whose instances can be registered on a [`Bus`](crate::Bus).
pub trait Subscribe: Sized + Send + Sync + 'static {
    /// Declare the handler bindings of this type.
    ///
    /// The default declares nothing, which makes registration fail with
    /// [`RegistrationError::DispatcherNotFound`].
    fn declare(_declaration: &mut Declaration<Self>) {}
}

/// Type-erased callback: `None` when the message is not of the handled type.
pub(crate) type Invoke<S> =
    Arc<dyn Fn(&S, &dyn Any) -> Option<Result<(), HandlerError>> + Send + Sync>;

/// One resolved handler, ready to be bound to an instance of `S`.
pub(crate) struct PlannedHandler<S> {
    pub(crate) message: TypeKey,
    pub(crate) owner: TypeKey,
    pub(crate) invoke: Invoke<S>,
}

impl<P: 'static> PlannedHandler<P> {
    /// Re-root a parent's handler onto the embedding type.
    fn project<S: 'static>(self, project: fn(&S) -> &P) -> PlannedHandler<S> {
        let invoke = self.invoke;
        PlannedHandler {
            message: self.message,
            owner: self.owner,
            invoke: Arc::new(move |subscriber: &S, message: &dyn Any| {
                invoke(project(subscriber), message)
            }),
        }
    }
}

struct Parent<S> {
    key: TypeKey,
    handlers: Result<Vec<PlannedHandler<S>>, RegistrationError>,
}

/// Builder passed to [`Subscribe::declare`].
pub struct Declaration<S> {
    subscriber: TypeKey,
    own: Vec<PlannedHandler<S>>,
    parents: Vec<Parent<S>>,
    overrides: Vec<TypeKey>,
    extension: bool,
    /// Types being declared on the way down to this one, this one last.
    lineage: Vec<TypeKey>,
}

impl<S: Subscribe> Declaration<S> {
    fn collect(mut lineage: Vec<TypeKey>) -> Self {
        let subscriber = TypeKey::of::<S>();
        lineage.push(subscriber);
        let mut declaration = Self {
            subscriber,
            own: Vec::new(),
            parents: Vec::new(),
            overrides: Vec::new(),
            extension: false,
            lineage,
        };
        S::declare(&mut declaration);
        declaration
    }

    /// The type being declared.
    #[must_use]
    pub fn subscriber(&self) -> TypeKey {
        self.subscriber
    }

    /// Handle messages of type `M` with an infallible callback.
    pub fn handle<M: Any>(
        &mut self,
        callback: impl Fn(&S, &M) + Send + Sync + 'static,
    ) -> &mut Self {
        self.try_handle(move |subscriber: &S, message: &M| {
            callback(subscriber, message);
            Ok(())
        })
    }

    /// Handle messages of type `M` with a callback whose error is propagated
    /// to the caller of `post`.
    pub fn try_handle<M: Any>(
        &mut self,
        callback: impl Fn(&S, &M) -> Result<(), HandlerError> + Send + Sync + 'static,
    ) -> &mut Self {
        let invoke: Invoke<S> = Arc::new(move |subscriber: &S, message: &dyn Any| {
            message
                .downcast_ref::<M>()
                .map(|message| callback(subscriber, message))
        });
        self.own.push(PlannedHandler {
            message: TypeKey::of::<M>(),
            owner: self.subscriber,
            invoke,
        });
        self
    }

    /// Inherit the handlers of an embedded parent subscriber.
    ///
    /// `project` reaches the parent component inside `S`. A parent that is
    /// already being declared further down the chain is reported as an
    /// inheritance cycle when the type is registered.
    pub fn inherit<P: Subscribe>(&mut self, project: fn(&S) -> &P) -> &mut Self {
        let key = TypeKey::of::<P>();
        let handlers = if self.lineage.contains(&key) {
            let chain: Vec<String> = self
                .lineage
                .iter()
                .chain(std::iter::once(&key))
                .map(ToString::to_string)
                .collect();
            Err(RegistrationError::subclass(
                self.subscriber,
                format!("inheritance cycle through {}", chain.join(" -> ")),
            ))
        } else {
            Declaration::<P>::collect(self.lineage.clone())
                .resolve(false)
                .map(|handlers| {
                    handlers
                        .into_iter()
                        .map(|handler| handler.project(project))
                        .collect()
                })
        };
        self.parents.push(Parent { key, handlers });
        self
    }

    /// Mark this type's own handler for `M` as replacing any inherited one.
    pub fn overrides<M: Any>(&mut self) -> &mut Self {
        self.overrides.push(TypeKey::of::<M>());
        self
    }

    /// Mark this type as a deliberate extension of its parents, allowing it
    /// to register with inherited handlers only.
    pub fn extension(&mut self) -> &mut Self {
        self.extension = true;
        self
    }

    /// Apply the ownership rules. `concrete` is true for the registered type
    /// itself and false for inherited parents.
    fn resolve(self, concrete: bool) -> Result<Vec<PlannedHandler<S>>, RegistrationError> {
        let subscriber = self.subscriber;

        let mut own_types = Vec::with_capacity(self.own.len());
        for handler in &self.own {
            if own_types.contains(&handler.message) {
                return Err(RegistrationError::DuplicateHandler {
                    subscriber,
                    message: handler.message,
                });
            }
            own_types.push(handler.message);
        }

        if let Some(orphan) = self.overrides.iter().find(|m| !own_types.contains(*m)) {
            return Err(RegistrationError::subclass(
                subscriber,
                format!("overrides {orphan} without declaring a handler for it"),
            ));
        }

        // message type -> parent it was inherited from
        let mut origin: HashMap<TypeKey, TypeKey> = HashMap::new();
        let mut inherited = Vec::new();
        let mut parent_keys: Vec<TypeKey> = Vec::new();
        for parent in self.parents {
            if !parent_keys.contains(&parent.key) {
                parent_keys.push(parent.key);
            }
            for handler in parent.handlers? {
                if let Some(first) = origin.get(&handler.message) {
                    if !self.overrides.contains(&handler.message) {
                        return Err(RegistrationError::subclass(
                            subscriber,
                            format!(
                                "{} is inherited from both {} and {}",
                                handler.message, first, parent.key
                            ),
                        ));
                    }
                }
                origin.insert(handler.message, parent.key);
                inherited.push(handler);
            }
        }

        for message in &own_types {
            if let Some(parent) = origin.get(message) {
                if !self.overrides.contains(message) {
                    return Err(RegistrationError::subclass(
                        subscriber,
                        format!(
                            "redeclares {message} already handled by {parent} without marking it as an override"
                        ),
                    ));
                }
            }
        }
        inherited.retain(|handler| !own_types.contains(&handler.message));

        if concrete && self.own.is_empty() {
            if inherited.is_empty() {
                return Err(RegistrationError::DispatcherNotFound { subscriber });
            }
            if !self.extension {
                let parents: Vec<String> = parent_keys.iter().map(ToString::to_string).collect();
                return Err(RegistrationError::subclass(
                    subscriber,
                    format!(
                        "inherits handlers from {} without declaring its own; mark it as an extension",
                        parents.join(", ")
                    ),
                ));
            }
        }

        inherited.extend(self.own);
        Ok(inherited)
    }
}

/// The validated handler set of a subscriber type, cached per type by the
/// [`DispatcherRegistry`](crate::DispatcherRegistry).
pub struct SubscriberPlan<S> {
    subscriber: TypeKey,
    handlers: Vec<PlannedHandler<S>>,
}

impl<S: Subscribe> SubscriberPlan<S> {
    pub(crate) fn build() -> Result<Self, RegistrationError> {
        let handlers = Declaration::<S>::collect(Vec::new()).resolve(true)?;
        Ok(Self {
            subscriber: TypeKey::of::<S>(),
            handlers,
        })
    }

    /// The planned subscriber type.
    #[must_use]
    pub fn subscriber(&self) -> TypeKey {
        self.subscriber
    }

    /// Message types bound by this plan, inherited first.
    #[must_use]
    pub fn message_types(&self) -> Vec<TypeKey> {
        self.handlers.iter().map(|h| h.message).collect()
    }

    /// The type owning the binding for `M`, if any.
    #[must_use]
    pub fn owner_of<M: Any>(&self) -> Option<TypeKey> {
        let message = TypeKey::of::<M>();
        self.handlers
            .iter()
            .find(|h| h.message == message)
            .map(|h| h.owner)
    }

    pub(crate) fn handlers(&self) -> &[PlannedHandler<S>] {
        &self.handlers
    }
}
