#![forbid(unsafe_code)]

//! Attach/detach registry driven by object expiry.
//!
//! # Design
//!
//! An [`Attacher<T>`] records attached objects by identity and subscribes to
//! each one's expiry. When an attached object expires, the registry drops
//! its entry and reports the detach to the owner's hook on its own; nobody
//! has to call [`detach`](Attacher::detach).
//!
//! The owner injects the hook at construction. It receives an
//! [`AttachEvent`] for every attach and every detach, exactly once each.
//!
//! # Invariants
//!
//! 1. An object is attached at most once; re-attaching is a no-op.
//! 2. Every attach is matched by exactly one detach event, unless the
//!    attacher itself is dropped first.
//! 3. After a detach event for `X`, `X`'s key is absent from the registry
//!    and its expiry subscription is released.
//!
//! # Failure Modes
//!
//! - **Attaching an expired object**: rejected; the object could never
//!   report its expiry, so it would stay attached forever.
//! - **Dropping the attacher**: releases every expiry subscription without
//!   calling the hook.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::debug;

use crate::expiry::Expirable;
use crate::signal::ScopedConnection;

/// Identity of an attached object: the address of its `Rc` allocation.
///
/// Stable while the object is alive. Entries are removed no later than the
/// object's expiry, so two simultaneously attached objects never share a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttachKey(usize);

impl AttachKey {
    /// The key of `object`.
    #[must_use]
    pub fn of<T: ?Sized>(object: &Rc<T>) -> Self {
        Self(Rc::as_ptr(object).cast::<()>().addr())
    }
}

/// Notification passed to an [`Attacher`]'s hook.
#[derive(Debug)]
pub enum AttachEvent<T: ?Sized> {
    /// `object` was attached.
    Attach { key: AttachKey, object: Rc<T> },
    /// The object with `key` was detached. `object` is `None` when the
    /// detach was caused by the object's destruction.
    Detach {
        key: AttachKey,
        object: Option<Rc<T>>,
    },
}

impl<T: ?Sized> AttachEvent<T> {
    /// Key of the object the event is about.
    #[must_use]
    pub fn key(&self) -> AttachKey {
        match self {
            Self::Attach { key, .. } | Self::Detach { key, .. } => *key,
        }
    }

    /// The object, if still alive.
    #[must_use]
    pub fn object(&self) -> Option<&Rc<T>> {
        match self {
            Self::Attach { object, .. } => Some(object),
            Self::Detach { object, .. } => object.as_ref(),
        }
    }

    /// Whether this is an attach event.
    #[must_use]
    pub fn is_attach(&self) -> bool {
        matches!(self, Self::Attach { .. })
    }
}

struct Entry<T: ?Sized> {
    /// Attach order, for deterministic `detach_all`.
    seq: u64,
    object: Weak<T>,
    _expiry: ScopedConnection,
}

struct AttacherInner<T: ?Sized> {
    hook: Box<dyn Fn(AttachEvent<T>)>,
    next_seq: Cell<u64>,
    attached: RefCell<HashMap<AttachKey, Entry<T>>>,
}

impl<T: ?Sized> AttacherInner<T> {
    /// Remove `key` and report the detach. Returns false if not attached.
    fn release(&self, key: AttachKey, object: Option<Rc<T>>) -> bool {
        let Some(entry) = self.attached.borrow_mut().remove(&key) else {
            return false;
        };
        let object = object.or_else(|| entry.object.upgrade());
        // Releases the expiry subscription.
        drop(entry);
        debug!(
            ?key,
            alive = object.is_some(),
            attached = self.attached.borrow().len(),
            "object detached"
        );
        (self.hook)(AttachEvent::Detach { key, object });
        true
    }
}

/// Registry of attached objects that detach themselves on expiry.
pub struct Attacher<T: ?Sized> {
    inner: Rc<AttacherInner<T>>,
}

impl<T: ?Sized> fmt::Debug for Attacher<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attacher")
            .field("attached", &self.inner.attached.borrow().len())
            .finish()
    }
}

impl<T: Expirable + ?Sized + 'static> Attacher<T> {
    /// Create an empty registry reporting to `hook`.
    pub fn new(hook: impl Fn(AttachEvent<T>) + 'static) -> Self {
        Self {
            inner: Rc::new(AttacherInner {
                hook: Box::new(hook),
                next_seq: Cell::new(0),
                attached: RefCell::new(HashMap::new()),
            }),
        }
    }

    /// Attach `object`: subscribe to its expiry, record it, then call the
    /// hook with [`AttachEvent::Attach`].
    ///
    /// Returns false, without calling the hook, if `object` is already
    /// attached or already expired.
    pub fn attach(&self, object: &Rc<T>) -> bool {
        let key = AttachKey::of(object);
        if self.contains(key) {
            debug!(?key, "object already attached");
            return false;
        }
        if object.expiry_token().is_expired() {
            debug!(?key, "refusing to attach an expired object");
            return false;
        }

        let weak_inner = Rc::downgrade(&self.inner);
        let connection = object.expiry_token().observe_expiry(move || {
            if let Some(inner) = weak_inner.upgrade() {
                inner.release(key, None);
            }
        });

        let seq = self.inner.next_seq.get();
        self.inner.next_seq.set(seq + 1);
        self.inner.attached.borrow_mut().insert(
            key,
            Entry {
                seq,
                object: Rc::downgrade(object),
                _expiry: ScopedConnection::new(connection),
            },
        );
        debug!(?key, attached = self.len(), "object attached");

        (self.inner.hook)(AttachEvent::Attach {
            key,
            object: Rc::clone(object),
        });
        true
    }

    /// Detach `object` now, without waiting for its expiry. Returns false
    /// if it was not attached.
    pub fn detach(&self, object: &Rc<T>) -> bool {
        self.inner
            .release(AttachKey::of(object), Some(Rc::clone(object)))
    }

    /// Detach every attached object, in attach order.
    pub fn detach_all(&self) {
        let mut keys: Vec<(u64, AttachKey)> = self
            .inner
            .attached
            .borrow()
            .iter()
            .map(|(key, entry)| (entry.seq, *key))
            .collect();
        keys.sort_unstable();
        for (_, key) in keys {
            self.inner.release(key, None);
        }
    }

    /// Whether `object` is attached.
    #[must_use]
    pub fn is_attached(&self, object: &Rc<T>) -> bool {
        self.contains(AttachKey::of(object))
    }

    /// Whether an object with `key` is attached.
    #[must_use]
    pub fn contains(&self, key: AttachKey) -> bool {
        self.inner.attached.borrow().contains_key(&key)
    }

    /// Number of attached objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.attached.borrow().len()
    }

    /// Whether nothing is attached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expiry::ExpiryToken;

    #[derive(Default)]
    struct Widget {
        token: ExpiryToken,
    }

    impl Expirable for Widget {
        fn expiry_token(&self) -> &ExpiryToken {
            &self.token
        }
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Seen {
        Attach(AttachKey),
        Detach(AttachKey, bool),
    }

    fn recording_attacher<T: Expirable + ?Sized + 'static>() -> (Attacher<T>, Rc<RefCell<Vec<Seen>>>) {
        let log: Rc<RefCell<Vec<Seen>>> = Rc::default();
        let log_clone = Rc::clone(&log);
        let attacher = Attacher::new(move |event: AttachEvent<T>| {
            let seen = match &event {
                AttachEvent::Attach { key, .. } => Seen::Attach(*key),
                AttachEvent::Detach { key, object } => Seen::Detach(*key, object.is_some()),
            };
            log_clone.borrow_mut().push(seen);
        });
        (attacher, log)
    }

    #[test]
    fn attach_then_expire_round_trip() {
        let (attacher, log) = recording_attacher::<Widget>();
        let widget = Rc::new(Widget::default());
        let key = AttachKey::of(&widget);

        assert!(attacher.attach(&widget));
        assert!(attacher.is_attached(&widget));
        assert_eq!(*log.borrow(), vec![Seen::Attach(key)]);

        widget.expire();
        assert!(!attacher.contains(key));
        assert!(attacher.is_empty());
        assert_eq!(*log.borrow(), vec![Seen::Attach(key), Seen::Detach(key, true)]);
        assert_eq!(widget.token.observer_count(), 0);
    }

    #[test]
    fn destruction_detaches_without_object() {
        let (attacher, log) = recording_attacher::<Widget>();
        let widget = Rc::new(Widget::default());
        let key = AttachKey::of(&widget);
        attacher.attach(&widget);

        drop(widget);
        assert!(attacher.is_empty());
        assert_eq!(log.borrow().last(), Some(&Seen::Detach(key, false)));
    }

    #[test]
    fn explicit_detach_releases_subscription() {
        let (attacher, log) = recording_attacher::<Widget>();
        let widget = Rc::new(Widget::default());
        let key = AttachKey::of(&widget);
        attacher.attach(&widget);
        assert_eq!(widget.token.observer_count(), 1);

        assert!(attacher.detach(&widget));
        assert!(!attacher.detach(&widget));
        assert_eq!(widget.token.observer_count(), 0);

        widget.expire();
        assert_eq!(*log.borrow(), vec![Seen::Attach(key), Seen::Detach(key, true)]);
    }

    #[test]
    fn reattach_is_noop() {
        let (attacher, log) = recording_attacher::<Widget>();
        let widget = Rc::new(Widget::default());

        assert!(attacher.attach(&widget));
        assert!(!attacher.attach(&widget));
        assert_eq!(log.borrow().len(), 1);
        assert_eq!(widget.token.observer_count(), 1);
    }

    #[test]
    fn attaching_expired_object_is_rejected() {
        let (attacher, log) = recording_attacher::<Widget>();
        let widget = Rc::new(Widget::default());
        widget.expire();

        assert!(!attacher.attach(&widget));
        assert!(attacher.is_empty());
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn detach_all_in_attach_order() {
        let (attacher, log) = recording_attacher::<Widget>();
        let widgets: Vec<Rc<Widget>> = (0..4).map(|_| Rc::new(Widget::default())).collect();
        for widget in &widgets {
            attacher.attach(widget);
        }
        log.borrow_mut().clear();

        attacher.detach_all();
        let expected: Vec<Seen> = widgets
            .iter()
            .map(|w| Seen::Detach(AttachKey::of(w), true))
            .collect();
        assert_eq!(*log.borrow(), expected);
        assert!(attacher.is_empty());
    }

    #[test]
    fn dropping_attacher_releases_without_hook() {
        let (attacher, log) = recording_attacher::<Widget>();
        let widget = Rc::new(Widget::default());
        attacher.attach(&widget);

        drop(attacher);
        assert_eq!(widget.token.observer_count(), 0);

        widget.expire();
        assert_eq!(log.borrow().len(), 1);
    }

    #[test]
    fn trait_object_attachment() {
        let (attacher, log) = recording_attacher::<dyn Expirable>();
        let widget: Rc<dyn Expirable> = Rc::new(Widget::default());
        let token: Rc<dyn Expirable> = Rc::new(ExpiryToken::new());

        attacher.attach(&widget);
        attacher.attach(&token);
        assert_eq!(attacher.len(), 2);

        token.expire();
        assert_eq!(attacher.len(), 1);
        assert_eq!(log.borrow().len(), 3);
    }

    #[test]
    fn hook_may_attach_during_detach() {
        let replacement = Rc::new(Widget::default());
        let slot: Rc<RefCell<Option<Attacher<Widget>>>> = Rc::default();

        let slot_clone = Rc::clone(&slot);
        let replacement_clone = Rc::clone(&replacement);
        *slot.borrow_mut() = Some(Attacher::new(move |event: AttachEvent<Widget>| {
            if event.is_attach() {
                return;
            }
            if let Some(attacher) = slot_clone.borrow().as_ref() {
                attacher.attach(&replacement_clone);
            }
        }));

        let widget = Rc::new(Widget::default());
        let guard = slot.borrow();
        let attacher = guard.as_ref().expect("attacher installed");
        attacher.attach(&widget);
        widget.expire();

        assert_eq!(attacher.len(), 1);
        assert!(attacher.is_attached(&replacement));
    }

    #[test]
    fn event_accessors() {
        let widget = Rc::new(Widget::default());
        let key = AttachKey::of(&widget);
        let attach = AttachEvent::Attach {
            key,
            object: Rc::clone(&widget),
        };
        let detach: AttachEvent<Widget> = AttachEvent::Detach { key, object: None };

        assert!(attach.is_attach());
        assert_eq!(attach.key(), key);
        assert!(attach.object().is_some());
        assert!(!detach.is_attach());
        assert!(detach.object().is_none());
    }
}
