//! # Error Types
//!
//! Registration failures are configuration errors surfaced to the caller of
//! `register`. Delivery failures carry whatever a subscriber callback returned.

use crate::types::TypeKey;
use thiserror::Error;

/// Error returned by a fallible subscriber callback.
pub type HandlerError = anyhow::Error;

/// Errors from registering a subscriber.
///
/// The bus is left unchanged whenever one of these is returned.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    /// The subscriber reference is absent (a dropped `Weak`).
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The subscriber type declares no handler bindings at all.
    #[error("No dispatcher is registered for {subscriber}")]
    DispatcherNotFound { subscriber: TypeKey },

    /// The subscriber's declared hierarchy binds a message type ambiguously.
    #[error("Subclass registration rejected for {subscriber}: {reason}")]
    SubclassRegistration { subscriber: TypeKey, reason: String },

    /// One type declares two handlers for the same message type.
    #[error("{subscriber} declares more than one handler for {message}")]
    DuplicateHandler {
        subscriber: TypeKey,
        message: TypeKey,
    },
}

impl RegistrationError {
    pub(crate) fn null_object() -> Self {
        Self::InvalidArgument("null object".to_string())
    }

    pub(crate) fn subclass(subscriber: TypeKey, reason: impl Into<String>) -> Self {
        Self::SubclassRegistration {
            subscriber,
            reason: reason.into(),
        }
    }
}

/// Errors surfaced while posting a message.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// A subscriber callback failed. Callbacks bound before it have already run.
    #[error("Handler declared by {subscriber} failed on {message}: {source}")]
    Handler {
        message: TypeKey,
        subscriber: TypeKey,
        source: HandlerError,
    },

    /// A custom dispatcher failed outside of any subscriber callback.
    #[error("Dispatcher {dispatcher} failed: {source}")]
    Dispatcher {
        dispatcher: String,
        source: HandlerError,
    },
}
