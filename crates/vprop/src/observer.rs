#![forbid(unsafe_code)]

//! Read-only observer facades.
//!
//! [`Observer`] is the consumer-side contract: read the current value and
//! subscribe to changes. Consumers that hold a [`PropertyObserver<T>`],
//! [`GetterObserver<T>`] or [`DynObserver<T>`] never name the concrete
//! producer, so producers can be swapped without touching consumer code.
//!
//! Facades hold a reference-counted handle to the producer's shared state.
//! A facade therefore never dangles; it keeps reading the value even after
//! the producing `Property` or `Getter` handle is dropped.

use std::fmt;
use std::rc::Rc;

use crate::error::GetterError;
use crate::getter::GetterCell;
use crate::property::{PropertyCell, ReadOnlyProperty};
use crate::signal::Connection;

/// Read access plus change subscription.
///
/// The trait is object safe; [`DynObserver<T>`] erases the concrete type.
pub trait Observer {
    /// The value type produced by [`get`](Self::get).
    type Value;

    /// Read the current value.
    fn get(&self) -> Self::Value;

    /// Subscribe a shared callback to change notifications.
    fn observe_with(&self, callback: Rc<dyn Fn()>) -> Connection;

    /// Subscribe `callback` to change notifications.
    fn observe(&self, callback: impl Fn() + 'static) -> Connection
    where
        Self: Sized,
    {
        self.observe_with(Rc::new(callback))
    }
}

/// A fully type-erased observer.
pub type DynObserver<T> = Rc<dyn Observer<Value = T>>;

impl<O: Observer + ?Sized> Observer for Rc<O> {
    type Value = O::Value;

    fn get(&self) -> Self::Value {
        (**self).get()
    }

    fn observe_with(&self, callback: Rc<dyn Fn()>) -> Connection {
        (**self).observe_with(callback)
    }
}

impl<T: Clone + 'static> Observer for ReadOnlyProperty<T> {
    type Value = T;

    fn get(&self) -> T {
        ReadOnlyProperty::get(self)
    }

    fn observe_with(&self, callback: Rc<dyn Fn()>) -> Connection {
        ReadOnlyProperty::observe(self, move || callback())
    }
}

/// Read-only view of a property.
///
/// Built by [`ReadOnlyProperty::observer`]. Clones share the same property.
pub struct PropertyObserver<T> {
    cell: Rc<PropertyCell<T>>,
}

impl<T> PropertyObserver<T> {
    pub(crate) fn new(cell: Rc<PropertyCell<T>>) -> Self {
        Self { cell }
    }
}

// Manual Clone: shares the same Rc.
impl<T> Clone for PropertyObserver<T> {
    fn clone(&self) -> Self {
        Self {
            cell: Rc::clone(&self.cell),
        }
    }
}

impl<T> fmt::Debug for PropertyObserver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyObserver").finish_non_exhaustive()
    }
}

impl<T: Clone + 'static> Observer for PropertyObserver<T> {
    type Value = T;

    fn get(&self) -> T {
        self.cell.get()
    }

    fn observe_with(&self, callback: Rc<dyn Fn()>) -> Connection {
        self.cell.observe_with(callback)
    }
}

/// Read-only view of a getter.
///
/// Built by [`Getter::observer`](crate::Getter::observer). Clones share the
/// same getter, including later rebinding of its function.
pub struct GetterObserver<T> {
    cell: Rc<GetterCell<T>>,
}

impl<T> GetterObserver<T> {
    pub(crate) fn new(cell: Rc<GetterCell<T>>) -> Self {
        Self { cell }
    }
}

// Manual Clone: shares the same Rc.
impl<T> Clone for GetterObserver<T> {
    fn clone(&self) -> Self {
        Self {
            cell: Rc::clone(&self.cell),
        }
    }
}

impl<T> fmt::Debug for GetterObserver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GetterObserver").finish_non_exhaustive()
    }
}

impl<T: 'static> GetterObserver<T> {
    /// Whether the underlying getter has a function bound.
    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.cell.is_bound()
    }

    /// Run the getter's function, or report that none is bound.
    pub fn try_get(&self) -> Result<T, GetterError> {
        self.cell.try_get()
    }
}

impl<T: 'static> Observer for GetterObserver<T> {
    type Value = T;

    /// # Panics
    ///
    /// Panics if the getter has no function bound.
    fn get(&self) -> T {
        self.cell.get()
    }

    fn observe_with(&self, callback: Rc<dyn Fn()>) -> Connection {
        self.cell.observe_with(callback)
    }
}
