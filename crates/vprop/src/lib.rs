#![forbid(unsafe_code)]

//! Reactive values, signals and expiry-driven subscriptions.
//!
//! # Role
//! `vprop` is the change-propagation layer for model/view wiring: values
//! that announce their changes, computed values, a multicast signal, and
//! subscriptions that tear themselves down when either side ends its life.
//!
//! # Primary types
//! - [`Signal`]: ordered multicast notification channel.
//! - [`Connection`] / [`ScopedConnection`]: handle to one registration; the
//!   scoped form disconnects on drop.
//! - [`Property`], [`ReadOnlyProperty`], [`PropertySetter`],
//!   [`OneShotProperty`]: observable values with a single authorized writer.
//! - [`Getter`]: a value computed on every read, with manual notification.
//! - [`Observer`], [`PropertyObserver`], [`GetterObserver`]: read-only facades
//!   that hide the producer type.
//! - [`ValueConnection`]: an observer, a callback and a toggleable
//!   subscription.
//! - [`ExpiryToken`] / [`Expirable`]: one-shot "this object is ending" event.
//! - [`Attacher`]: registry that detaches objects when they expire.
//!
//! # Architecture
//! Everything is single-threaded: shared state lives in `Rc` with
//! `Cell`/`RefCell` interiors, so none of these types are `Send`. Dispatch is
//! synchronous on the caller's thread, and callbacks may re-enter any
//! operation (set, notify, observe, disconnect) without corrupting state.
//!
//! # Example
//!
//! ```
//! use std::cell::Cell;
//! use std::rc::Rc;
//! use vprop::{Property, SetOptions};
//!
//! let property = Property::new(0);
//! let count = Rc::new(Cell::new(0));
//! let count_clone = Rc::clone(&count);
//! let connection = property.observe(move || count_clone.set(count_clone.get() + 1));
//!
//! property.set(1);
//! property.set(1); // equal value: no-op
//! property.set_with(1, SetOptions::forced());
//! assert_eq!(count.get(), 2);
//!
//! connection.disconnect();
//! property.set(2);
//! assert_eq!(count.get(), 2);
//! ```

pub mod attacher;
pub mod error;
pub mod expiry;
pub mod getter;
pub mod observer;
pub mod property;
pub mod signal;
pub mod value_connection;

pub use attacher::{AttachEvent, AttachKey, Attacher};
pub use error::GetterError;
pub use expiry::{Expirable, ExpiryToken};
pub use getter::Getter;
pub use observer::{DynObserver, GetterObserver, Observer, PropertyObserver};
pub use property::{OneShotProperty, Property, PropertySetter, ReadOnlyProperty, SetOptions};
pub use signal::{Connection, ScopedConnection, Signal};
pub use value_connection::{GetterConnection, PropertyConnection, ValueConnection};
