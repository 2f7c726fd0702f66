#![forbid(unsafe_code)]

//! An observer paired with a callback and a toggleable subscription.

use std::fmt;
use std::rc::Rc;

use crate::observer::{GetterObserver, Observer, PropertyObserver};
use crate::signal::ScopedConnection;

/// Binds one [`Observer`] to one callback.
///
/// The subscription can be dropped and re-established any number of times
/// without supplying the callback again, for components that pause
/// observation while hidden. Dropping the value connection unsubscribes.
pub struct ValueConnection<O> {
    observer: O,
    callback: Rc<dyn Fn()>,
    connection: ScopedConnection,
}

/// A [`ValueConnection`] over a property.
pub type PropertyConnection<T> = ValueConnection<PropertyObserver<T>>;

/// A [`ValueConnection`] over a getter.
pub type GetterConnection<T> = ValueConnection<GetterObserver<T>>;

impl<O: Observer> ValueConnection<O> {
    /// Bind `callback` to `observer` and subscribe immediately.
    pub fn new(observer: O, callback: impl Fn() + 'static) -> Self {
        let mut value_connection = Self::new_disconnected(observer, callback);
        value_connection.connect();
        value_connection
    }

    /// Bind `callback` to `observer` without subscribing.
    pub fn new_disconnected(observer: O, callback: impl Fn() + 'static) -> Self {
        Self {
            observer,
            callback: Rc::new(callback),
            connection: ScopedConnection::default(),
        }
    }

    /// Subscribe. Replaces any existing subscription, so the callback never
    /// ends up registered twice.
    pub fn connect(&mut self) {
        let connection = self.observer.observe_with(Rc::clone(&self.callback));
        self.connection.set(connection);
    }

    /// Unsubscribe, keeping the observer and callback for a later
    /// [`connect`](Self::connect).
    pub fn disconnect(&mut self) {
        self.connection.disconnect();
    }

    /// Whether the callback is currently subscribed.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    /// Read the observer's current value.
    #[must_use]
    pub fn get(&self) -> O::Value {
        self.observer.get()
    }

    /// Run the callback directly, regardless of subscription state.
    pub fn invoke(&self) {
        (self.callback)();
    }

    /// The bound observer.
    #[must_use]
    pub fn observer(&self) -> &O {
        &self.observer
    }
}

impl<O: fmt::Debug> fmt::Debug for ValueConnection<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueConnection")
            .field("observer", &self.observer)
            .field("connection", &self.connection)
            .finish_non_exhaustive()
    }
}
