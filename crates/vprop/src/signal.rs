#![forbid(unsafe_code)]

//! Ordered multicast signal with idempotent, lifetime-scoped connections.
//!
//! # Design
//!
//! [`Signal<A>`] keeps its slots in shared, reference-counted storage
//! (`Rc<SlotList<A>>`). Every registration gets a strictly increasing id, so
//! the slot vector stays sorted and lookups are a binary search.
//!
//! A [`Connection`] holds a type-erased `Weak` handle to the slot list plus
//! the slot id. It never keeps the signal alive: once the signal is dropped
//! every outstanding connection is inert.
//!
//! # Dispatch
//!
//! `notify()` snapshots the slot list, releases the borrow, then re-checks
//! each slot right before invoking it:
//!
//! - a slot disconnected during dispatch is skipped for the rest of it,
//! - a slot registered during dispatch first fires on the next `notify()`,
//! - no slot runs twice for one `notify()`.
//!
//! No `RefCell` borrow is held while user callbacks run, so callbacks may
//! freely observe, disconnect or notify (this or any other signal).
//!
//! # Failure Modes
//!
//! - **Unbounded recursion**: a callback that unconditionally notifies the
//!   signal it is registered on recurses until the stack overflows.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

type SlotFn<A> = Rc<dyn Fn(&A)>;

struct Slot<A> {
    id: u64,
    callback: SlotFn<A>,
}

// Manual Clone: only clones the Rc.
impl<A> Clone for Slot<A> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            callback: Rc::clone(&self.callback),
        }
    }
}

/// Shared interior for [`Signal<A>`].
struct SlotList<A> {
    next_id: Cell<u64>,
    /// Sorted by `id`.
    slots: RefCell<Vec<Slot<A>>>,
}

impl<A> SlotList<A> {
    fn position(&self, id: u64) -> Option<usize> {
        self.slots
            .borrow()
            .binary_search_by_key(&id, |slot| slot.id)
            .ok()
    }
}

/// Type-erased view of a slot list, held weakly by [`Connection`].
trait SlotRegistry {
    fn remove(&self, id: u64);
    fn contains(&self, id: u64) -> bool;
}

impl<A> SlotRegistry for SlotList<A> {
    fn remove(&self, id: u64) {
        let removed = {
            let mut slots = self.slots.borrow_mut();
            match slots.binary_search_by_key(&id, |slot| slot.id) {
                Ok(index) => Some(slots.remove(index)),
                Err(_) => None,
            }
        };
        // Dropped outside the borrow: the callback may own connections to
        // this very list.
        drop(removed);
    }

    fn contains(&self, id: u64) -> bool {
        self.position(id).is_some()
    }
}

/// An ordered multicast notification channel.
///
/// Callbacks receive `&A`; use `()` for argument-less events and a tuple for
/// several arguments.
///
/// # Invariants
///
/// 1. Slots fire in registration order.
/// 2. Each `observe()` yields a distinct registration, even for the same
///    callback.
/// 3. A disconnected slot never fires again.
/// 4. Dropping the signal makes every outstanding [`Connection`] inert.
pub struct Signal<A = ()> {
    inner: Rc<SlotList<A>>,
}

impl<A> Default for Signal<A> {
    fn default() -> Self {
        Self {
            inner: Rc::new(SlotList {
                next_id: Cell::new(0),
                slots: RefCell::new(Vec::new()),
            }),
        }
    }
}

impl<A> fmt::Debug for Signal<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("slot_count", &self.inner.slots.borrow().len())
            .finish()
    }
}

impl<A: 'static> Signal<A> {
    /// Create a signal with no slots.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback`. It stays registered until the returned
    /// [`Connection`] is disconnected or the signal is dropped.
    pub fn observe(&self, callback: impl Fn(&A) + 'static) -> Connection {
        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);
        self.inner.slots.borrow_mut().push(Slot {
            id,
            callback: Rc::new(callback),
        });

        let list = Rc::downgrade(&self.inner);
        let list: Weak<dyn SlotRegistry> = list;
        Connection {
            slot: Some(SlotHandle { list, id }),
        }
    }

    /// Invoke every connected slot once, in registration order.
    pub fn notify(&self, args: A) {
        let snapshot: Vec<Slot<A>> = self.inner.slots.borrow().clone();
        for slot in snapshot {
            if self.inner.contains(slot.id) {
                (slot.callback)(&args);
            }
        }
    }

    /// Disconnect every slot. Outstanding connections become inert.
    pub fn disconnect_all(&self) {
        let slots = std::mem::take(&mut *self.inner.slots.borrow_mut());
        drop(slots);
    }

    /// Number of connected slots.
    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.inner.slots.borrow().len()
    }

    /// Whether no slot is connected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slot_count() == 0
    }
}

#[derive(Clone)]
struct SlotHandle {
    list: Weak<dyn SlotRegistry>,
    id: u64,
}

/// Handle to one registration on a [`Signal`].
///
/// Clones refer to the same registration. The default value is an empty
/// handle that was never connected.
#[derive(Clone, Default)]
pub struct Connection {
    slot: Option<SlotHandle>,
}

impl Connection {
    /// Stop delivery to this registration. Idempotent, and a no-op once the
    /// signal has been dropped.
    pub fn disconnect(&self) {
        if let Some(slot) = &self.slot
            && let Some(list) = slot.list.upgrade()
        {
            list.remove(slot.id);
        }
    }

    /// Whether the registration is still live.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.slot
            .as_ref()
            .and_then(|slot| slot.list.upgrade().map(|list| list.contains(slot.id)))
            .unwrap_or(false)
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("connected", &self.is_connected())
            .finish()
    }
}

/// Owns at most one [`Connection`] and disconnects it on drop or
/// reassignment.
///
/// Move-only: moving transfers the subscription, and
/// `std::mem::take` leaves an empty guard behind.
#[derive(Default)]
pub struct ScopedConnection {
    connection: Connection,
}

impl ScopedConnection {
    /// Take ownership of `connection`.
    #[must_use]
    pub fn new(connection: Connection) -> Self {
        Self { connection }
    }

    /// Disconnect the currently held connection, then hold `connection`.
    pub fn set(&mut self, connection: Connection) {
        let previous = std::mem::replace(&mut self.connection, connection);
        previous.disconnect();
    }

    /// Disconnect and leave the guard empty.
    pub fn disconnect(&mut self) {
        std::mem::take(&mut self.connection).disconnect();
    }

    /// Whether the held connection is live.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    /// Give up ownership without disconnecting.
    #[must_use]
    pub fn release(mut self) -> Connection {
        std::mem::take(&mut self.connection)
    }
}

impl From<Connection> for ScopedConnection {
    fn from(connection: Connection) -> Self {
        Self::new(connection)
    }
}

impl Drop for ScopedConnection {
    fn drop(&mut self) {
        self.connection.disconnect();
    }
}

impl fmt::Debug for ScopedConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopedConnection")
            .field("connected", &self.is_connected())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
