#![forbid(unsafe_code)]

//! Observable values with a read/write capability split.
//!
//! # Design
//!
//! A property's value and its change [`Signal`] live in one shared,
//! reference-counted cell. Two kinds of handle point at that cell:
//!
//! - [`ReadOnlyProperty<T>`]: cloneable, hands out reads, subscriptions and
//!   [`PropertyObserver`]s to any number of consumers.
//! - [`PropertySetter<T>`]: not cloneable, the only handle that can write.
//!
//! [`Property<T>`] bundles both for the common case where the owner keeps
//! the write capability and exposes reads through `Deref`. Call
//! [`Property::split`] to hand the halves to different owners.
//!
//! The change notification carries no payload: observers read the new
//! value through `get()`.
//!
//! # Invariants
//!
//! 1. The signal fires only from an applied write with `notify` set, or from
//!    an explicit `notify()`.
//! 2. A write of a value equal to the current one is a no-op unless forced:
//!    no mutation, no version bump, no notification.
//! 3. `version` increments by exactly 1 per applied write.
//!
//! # Failure Modes
//!
//! - **Reading inside `update`**: the value is mutably borrowed while the
//!   `update` closure runs; reading the same property from inside it panics.
//!   Callbacks fired afterwards may read and write freely.
//! - **Writing inside `with`**: the value is borrowed while the `with`
//!   closure runs; writing the same property from inside it panics.
//! - **Destructors**: a value replaced by `set` is dropped after the borrow
//!   is released, so its destructor may read the property. A value dropped
//!   by the `update` closure itself is dropped while borrowed.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::ops::Deref;
use std::rc::Rc;

use tracing::trace;

use crate::observer::PropertyObserver;
use crate::signal::{Connection, Signal};

/// Flags for a single property write.
///
/// The default notifies observers and suppresses writes of an equal value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetOptions {
    /// Fire the change signal if the write is applied.
    pub notify: bool,
    /// Apply the write even if the new value equals the current one.
    pub force: bool,
}

impl Default for SetOptions {
    fn default() -> Self {
        Self {
            notify: true,
            force: false,
        }
    }
}

impl SetOptions {
    /// Apply the write without notifying observers.
    #[must_use]
    pub fn silent() -> Self {
        Self::default().with_notify(false)
    }

    /// Apply and notify even when the value is unchanged.
    #[must_use]
    pub fn forced() -> Self {
        Self::default().with_force(true)
    }

    /// Set whether an applied write notifies observers.
    #[must_use]
    pub fn with_notify(mut self, notify: bool) -> Self {
        self.notify = notify;
        self
    }

    /// Set whether an equal value is written anyway.
    #[must_use]
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }
}

/// Shared interior of every property handle.
pub(crate) struct PropertyCell<T> {
    value: RefCell<T>,
    version: Cell<u64>,
    changed: Signal<()>,
}

impl<T: 'static> PropertyCell<T> {
    fn new(value: T) -> Rc<Self> {
        Rc::new(Self {
            value: RefCell::new(value),
            version: Cell::new(0),
            changed: Signal::new(),
        })
    }

    pub(crate) fn get(&self) -> T
    where
        T: Clone,
    {
        self.value.borrow().clone()
    }

    pub(crate) fn observe_with(&self, callback: Rc<dyn Fn()>) -> Connection {
        self.changed.observe(move |_| callback())
    }

    fn write(&self, value: T, options: SetOptions) -> bool
    where
        T: PartialEq,
    {
        let previous = {
            let mut current = self.value.borrow_mut();
            if *current == value && !options.force {
                return false;
            }
            std::mem::replace(&mut *current, value)
        };
        // Dropped after the borrow ends: the old value's destructor may
        // read this property (e.g. through an expiry observer).
        drop(previous);
        self.version.set(self.version.get() + 1);
        if options.notify {
            self.changed.notify(());
        }
        true
    }

    fn update(&self, f: impl FnOnce(&mut T)) -> bool
    where
        T: Clone + PartialEq,
    {
        let old = self.value.borrow().clone();
        let changed = {
            let mut current = self.value.borrow_mut();
            f(&mut current);
            *current != old
        };
        drop(old);
        if changed {
            self.version.set(self.version.get() + 1);
            self.changed.notify(());
        }
        changed
    }
}

/// Read handle to a property.
///
/// Cloning creates another handle to the **same** value and signal.
pub struct ReadOnlyProperty<T> {
    cell: Rc<PropertyCell<T>>,
}

// Manual Clone: shares the same Rc.
impl<T> Clone for ReadOnlyProperty<T> {
    fn clone(&self) -> Self {
        Self {
            cell: Rc::clone(&self.cell),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for ReadOnlyProperty<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadOnlyProperty")
            .field("value", &*self.cell.value.borrow())
            .field("version", &self.cell.version.get())
            .field("changed", &self.cell.changed)
            .finish()
    }
}

impl<T: PartialEq> PartialEq<T> for ReadOnlyProperty<T> {
    fn eq(&self, other: &T) -> bool {
        *self.cell.value.borrow() == *other
    }
}

impl<T: 'static> ReadOnlyProperty<T> {
    /// Get a clone of the current value.
    #[must_use]
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.cell.get()
    }

    /// Access the current value by reference without cloning.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.cell.value.borrow())
    }

    /// Subscribe to changes. The callback carries no payload; read the new
    /// value with [`get`](Self::get).
    pub fn observe(&self, callback: impl Fn() + 'static) -> Connection {
        self.cell.changed.observe(move |_| callback())
    }

    /// A type-erased read-only view sharing this property.
    #[must_use]
    pub fn observer(&self) -> PropertyObserver<T> {
        PropertyObserver::new(Rc::clone(&self.cell))
    }

    /// Number of applied writes since construction.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.cell.version.get()
    }

    /// Number of connected change callbacks.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.cell.changed.slot_count()
    }
}

/// The sole write capability for a property.
///
/// Not cloneable: whoever holds the setter is the only writer. Read handles
/// come from [`property`](Self::property).
pub struct PropertySetter<T> {
    cell: Rc<PropertyCell<T>>,
}

impl<T: fmt::Debug> fmt::Debug for PropertySetter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertySetter")
            .field("value", &*self.cell.value.borrow())
            .finish_non_exhaustive()
    }
}

impl<T: PartialEq + 'static> PropertySetter<T> {
    /// Create a property holding `value` and return its write capability.
    #[must_use]
    pub fn new(value: T) -> Self {
        Self {
            cell: PropertyCell::new(value),
        }
    }

    /// A read handle to the property this setter writes.
    #[must_use]
    pub fn property(&self) -> ReadOnlyProperty<T> {
        ReadOnlyProperty {
            cell: Rc::clone(&self.cell),
        }
    }

    /// Write `value` and notify observers if it differs from the current
    /// value. Returns whether the write was applied.
    pub fn set(&self, value: T) -> bool {
        self.cell.write(value, SetOptions::default())
    }

    /// Write `value` with explicit notify/force flags. Returns whether the
    /// write was applied.
    pub fn set_with(&self, value: T, options: SetOptions) -> bool {
        self.cell.write(value, options)
    }

    /// Modify the value in place. Observers are notified if the value
    /// changed (compared against a snapshot). Returns whether it changed.
    ///
    /// # Panics
    ///
    /// Panics if `f` reads the same property.
    pub fn update(&self, f: impl FnOnce(&mut T)) -> bool
    where
        T: Clone,
    {
        self.cell.update(f)
    }

    /// Fire the change signal without writing.
    pub fn notify(&self) {
        self.cell.changed.notify(());
    }
}

/// A property that owns its own write capability.
///
/// Dereferences to [`ReadOnlyProperty<T>`] for reads and subscriptions.
pub struct Property<T> {
    reader: ReadOnlyProperty<T>,
    setter: PropertySetter<T>,
}

impl<T: fmt::Debug> fmt::Debug for Property<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Property")
            .field("value", &*self.reader.cell.value.borrow())
            .field("version", &self.reader.cell.version.get())
            .finish_non_exhaustive()
    }
}

impl<T: PartialEq + Default + 'static> Default for Property<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: PartialEq> PartialEq<T> for Property<T> {
    fn eq(&self, other: &T) -> bool {
        self.reader == *other
    }
}

impl<T> Deref for Property<T> {
    type Target = ReadOnlyProperty<T>;

    fn deref(&self) -> &Self::Target {
        &self.reader
    }
}

impl<T: PartialEq + 'static> Property<T> {
    /// Create a property with the given initial value. No notification is
    /// emitted.
    #[must_use]
    pub fn new(value: T) -> Self {
        let setter = PropertySetter::new(value);
        Self {
            reader: setter.property(),
            setter,
        }
    }

    /// Separate the read handle from the write capability.
    #[must_use]
    pub fn split(self) -> (ReadOnlyProperty<T>, PropertySetter<T>) {
        (self.reader, self.setter)
    }

    /// A read handle to share with consumers.
    #[must_use]
    pub fn read_only(&self) -> ReadOnlyProperty<T> {
        self.reader.clone()
    }

    /// See [`PropertySetter::set`].
    pub fn set(&self, value: T) -> bool {
        self.setter.set(value)
    }

    /// See [`PropertySetter::set_with`].
    pub fn set_with(&self, value: T, options: SetOptions) -> bool {
        self.setter.set_with(value, options)
    }

    /// See [`PropertySetter::update`].
    ///
    /// # Panics
    ///
    /// Panics if `f` reads the same property.
    pub fn update(&self, f: impl FnOnce(&mut T)) -> bool
    where
        T: Clone,
    {
        self.setter.update(f)
    }

    /// Fire the change signal without writing.
    pub fn notify(&self) {
        self.setter.notify();
    }
}

/// A property that accepts exactly one applied write.
///
/// The latch closes on the first write that is applied under the normal
/// property rules (the value changed, or the write was forced). A write that
/// the equality check suppresses leaves the latch open. Once latched, every
/// write is ignored: no error, no notification, value unchanged.
pub struct OneShotProperty<T> {
    property: Property<T>,
    latched: Cell<bool>,
}

impl<T: fmt::Debug> fmt::Debug for OneShotProperty<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OneShotProperty")
            .field("value", &*self.property.reader.cell.value.borrow())
            .field("latched", &self.latched.get())
            .finish()
    }
}

impl<T: PartialEq + Default + 'static> Default for OneShotProperty<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> Deref for OneShotProperty<T> {
    type Target = ReadOnlyProperty<T>;

    fn deref(&self) -> &Self::Target {
        &self.property.reader
    }
}

impl<T: PartialEq + 'static> OneShotProperty<T> {
    /// Create an unlatched property with the given initial value.
    #[must_use]
    pub fn new(value: T) -> Self {
        Self {
            property: Property::new(value),
            latched: Cell::new(false),
        }
    }

    /// Write `value` unless already latched. Returns whether the write was
    /// applied.
    pub fn set(&self, value: T) -> bool {
        self.set_with(value, SetOptions::default())
    }

    /// Write `value` with explicit flags unless already latched.
    pub fn set_with(&self, value: T, options: SetOptions) -> bool {
        if self.latched.get() {
            trace!("one-shot property already latched, write ignored");
            return false;
        }
        // Latch before the write so observers that write back are ignored.
        self.latched.set(true);
        let applied = self.property.set_with(value, options);
        if !applied {
            self.latched.set(false);
        }
        applied
    }

    /// Whether the single write has happened.
    #[must_use]
    pub fn is_latched(&self) -> bool {
        self.latched.get()
    }

    /// A read handle to share with consumers.
    #[must_use]
    pub fn read_only(&self) -> ReadOnlyProperty<T> {
        self.property.read_only()
    }

    /// Fire the change signal without writing.
    pub fn notify(&self) {
        self.property.notify();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
