#![forbid(unsafe_code)]

//! Computed values with caller-triggered change notification.
//!
//! A [`Getter<T>`] wraps a zero-argument function. Every `get()` runs the
//! function again; nothing is cached. The getter cannot know when the state
//! the function reads has changed, so whoever mutates that state calls
//! [`Getter::notify`].

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::error::GetterError;
use crate::observer::GetterObserver;
use crate::signal::{Connection, Signal};

type GetterFn<T> = Rc<dyn Fn() -> T>;

/// Shared interior of a getter and its observers.
pub(crate) struct GetterCell<T> {
    function: RefCell<Option<GetterFn<T>>>,
    changed: Signal<()>,
}

impl<T: 'static> GetterCell<T> {
    pub(crate) fn is_bound(&self) -> bool {
        self.function.borrow().is_some()
    }

    pub(crate) fn try_get(&self) -> Result<T, GetterError> {
        // Clone the Rc so the function may rebind the getter while running.
        let function = self.function.borrow().clone();
        function.map(|f| f()).ok_or(GetterError::Unbound)
    }

    pub(crate) fn get(&self) -> T {
        match self.try_get() {
            Ok(value) => value,
            Err(err) => panic!("{err}"),
        }
    }

    pub(crate) fn observe_with(&self, callback: Rc<dyn Fn()>) -> Connection {
        self.changed.observe(move |_| callback())
    }
}

/// A value computed on demand by a bound function.
pub struct Getter<T> {
    cell: Rc<GetterCell<T>>,
}

impl<T> Default for Getter<T> {
    fn default() -> Self {
        Self {
            cell: Rc::new(GetterCell {
                function: RefCell::new(None),
                changed: Signal::default(),
            }),
        }
    }
}

impl<T> fmt::Debug for Getter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Getter")
            .field("bound", &self.cell.function.borrow().is_some())
            .field("changed", &self.cell.changed)
            .finish()
    }
}

impl<T: 'static> Getter<T> {
    /// Create a getter bound to `function`.
    #[must_use]
    pub fn new(function: impl Fn() -> T + 'static) -> Self {
        let getter = Self::default();
        getter.bind(function);
        getter
    }

    /// Create a getter with no function bound.
    #[must_use]
    pub fn unbound() -> Self {
        Self::default()
    }

    /// Replace the bound function. Observers are not notified; call
    /// [`notify`](Self::notify) if the new function yields a different value.
    pub fn bind(&self, function: impl Fn() -> T + 'static) {
        *self.cell.function.borrow_mut() = Some(Rc::new(function));
    }

    /// Whether a function is bound.
    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.cell.is_bound()
    }

    /// Run the bound function.
    ///
    /// # Panics
    ///
    /// Panics if no function is bound. Check [`is_bound`](Self::is_bound)
    /// or use [`try_get`](Self::try_get).
    #[must_use]
    pub fn get(&self) -> T {
        self.cell.get()
    }

    /// Run the bound function, or report that none is bound.
    pub fn try_get(&self) -> Result<T, GetterError> {
        self.cell.try_get()
    }

    /// Tell observers that the state read by the function has changed.
    pub fn notify(&self) {
        self.cell.changed.notify(());
    }

    /// Subscribe to [`notify`](Self::notify) calls.
    pub fn observe(&self, callback: impl Fn() + 'static) -> Connection {
        self.cell.changed.observe(move |_| callback())
    }

    /// A type-erased read-only view sharing this getter.
    #[must_use]
    pub fn observer(&self) -> GetterObserver<T> {
        GetterObserver::new(Rc::clone(&self.cell))
    }
}
