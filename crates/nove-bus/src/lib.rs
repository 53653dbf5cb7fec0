//! # Nove Bus - In-Process Publish/Subscribe
//!
//! Subscribers register for messages of specific runtime types; publishers
//! post any `'static` value without knowing who listens.
//!
//! ## Flow
//!
//! ```text
//! ┌──────────────┐   register()   ┌──────────────────────────┐
//! │  Subscriber  │ ─────────────► │           Bus            │
//! └──────────────┘                │  DispatcherRegistry      │
//!                                 │  TypeId ─► Dispatcher    │
//! ┌──────────────┐    post()      │                          │
//! │  Publisher   │ ─────────────► │  can_handle_message()?   │
//! └──────────────┘                └────────────┬─────────────┘
//!                                              │ post()
//!                                              ▼
//!                                     subscriber callbacks
//! ```
//!
//! ## Example
//!
//! ```rust
//! use nove_bus::{Bus, Declaration, Subscribe};
//! use parking_lot::Mutex;
//! use std::sync::Arc;
//!
//! #[derive(Default)]
//! struct Greeter {
//!     last: Mutex<Option<String>>,
//! }
//!
//! impl Subscribe for Greeter {
//!     fn declare(d: &mut Declaration<Self>) {
//!         d.handle::<String>(|g, msg| *g.last.lock() = Some(msg.clone()));
//!     }
//! }
//!
//! let bus = Bus::new();
//! let greeter = Arc::new(Greeter::default());
//! bus.register(&greeter).unwrap();
//!
//! assert_eq!(bus.post("Hello".to_string()).unwrap(), 1);
//! assert_eq!(greeter.last.lock().as_deref(), Some("Hello"));
//! ```
//!
//! ## Rules
//!
//! - Messages match dispatchers by exact runtime type
//! - Posting a message nobody listens to is not an error
//! - Callback errors propagate to the caller of `post`; panics are not caught
//! - The bus holds subscribers weakly

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod bus;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod registry;
pub mod subscriber;
pub mod types;

// Re-export main types
pub use bus::{Bus, Registration};
pub use config::{BusConfig, DEFAULT_BUS_NAME};
pub use dispatcher::{Dispatcher, MessageDispatcher};
pub use error::{DeliveryError, HandlerError, RegistrationError};
pub use registry::DispatcherRegistry;
pub use subscriber::{Declaration, Subscribe, SubscriberPlan};
pub use types::TypeKey;
