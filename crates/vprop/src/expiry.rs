#![forbid(unsafe_code)]

//! One-shot "this object is ending" events.
//!
//! # Design
//!
//! An [`ExpiryToken`] is alive until [`expire`](ExpiryToken::expire) is
//! called or the token is dropped, whichever comes first. That single
//! alive→expired transition fires the token's observers, in registration
//! order, and then releases them. Objects expose their token through the
//! [`Expirable`] trait.
//!
//! # Invariants
//!
//! 1. Observers fire exactly once, on the alive→expired edge.
//! 2. Repeated `expire()` calls are no-ops.
//! 3. Dropping a live token expires it, so dependents are always told.
//! 4. Observing an expired token registers nothing: the callback never
//!    fires and the returned [`Connection`] is inert. Late subscribers
//!    observe first and then check `is_expired()`.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use tracing::trace;

use crate::signal::{Connection, Signal};

/// A one-shot expiry event source.
#[derive(Default)]
pub struct ExpiryToken {
    expired: Cell<bool>,
    expiry: Signal<()>,
}

impl ExpiryToken {
    /// Create a live token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Expire the token, firing its observers if it was alive.
    pub fn expire(&self) {
        if self.expired.replace(true) {
            return;
        }
        trace!(observers = self.expiry.slot_count(), "expiry token expired");
        self.expiry.notify(());
        self.expiry.disconnect_all();
    }

    /// Whether the token has expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expired.get()
    }

    /// Run `callback` when the token expires. On an expired token this is a
    /// no-op returning an inert connection.
    pub fn observe_expiry(&self, callback: impl Fn() + 'static) -> Connection {
        if self.is_expired() {
            trace!("observing an expired token, callback will never fire");
            return Connection::default();
        }
        self.expiry.observe(move |_| callback())
    }

    /// Number of callbacks waiting for expiry.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.expiry.slot_count()
    }
}

impl Drop for ExpiryToken {
    fn drop(&mut self) {
        self.expire();
    }
}

impl fmt::Debug for ExpiryToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExpiryToken")
            .field("expired", &self.expired.get())
            .field("observers", &self.expiry.slot_count())
            .finish()
    }
}

/// An object with a finite, observable lifetime.
///
/// Implementors return the token their expiry is reported on: usually one
/// they own, but an embedded sub-object's token works just as well.
pub trait Expirable {
    /// The token that reports this object's expiry.
    fn expiry_token(&self) -> &ExpiryToken;

    /// Expire the object now.
    fn expire(&self) {
        self.expiry_token().expire();
    }

    /// Whether the object has expired.
    fn is_expired(&self) -> bool {
        self.expiry_token().is_expired()
    }

    /// Run `callback` when the object expires. See
    /// [`ExpiryToken::observe_expiry`].
    fn observe_expiry(&self, callback: impl Fn() + 'static) -> Connection
    where
        Self: Sized,
    {
        self.expiry_token().observe_expiry(callback)
    }
}

impl Expirable for ExpiryToken {
    fn expiry_token(&self) -> &ExpiryToken {
        self
    }
}

impl<E: Expirable + ?Sized> Expirable for Rc<E> {
    fn expiry_token(&self) -> &ExpiryToken {
        (**self).expiry_token()
    }
}
