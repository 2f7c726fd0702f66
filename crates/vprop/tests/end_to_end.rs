//! End-to-end scenarios across properties, getters, connections and expiry.

use std::cell::{Cell, RefCell};
use std::io;
use std::rc::Rc;
use std::sync::{Arc, Mutex};

use vprop::{
    AttachEvent, AttachKey, Attacher, Expirable, ExpiryToken, Getter, Observer, Property,
    PropertyConnection, ReadOnlyProperty, ScopedConnection, SetOptions, ValueConnection,
};

fn counter() -> (Rc<Cell<u32>>, impl Fn() + 'static) {
    let count = Rc::new(Cell::new(0u32));
    let count_clone = Rc::clone(&count);
    (count, move || count_clone.set(count_clone.get() + 1))
}

#[test]
fn property_counter_scenario() {
    let property = Property::new(0);
    let (count, callback) = counter();
    let connection = property.observe(callback);

    property.set(1);
    assert_eq!(count.get(), 1);

    property.set(1);
    assert_eq!(count.get(), 1);

    property.set_with(1, SetOptions::forced());
    assert_eq!(count.get(), 2);

    connection.disconnect();
    property.set(2);
    assert_eq!(count.get(), 2);
    assert_eq!(property.get(), 2);
}

#[test]
fn getter_never_caches() {
    let external = Rc::new(Cell::new(5));
    let external_clone = Rc::clone(&external);
    let getter = Getter::new(move || external_clone.get());

    assert_eq!(getter.get(), 5);
    external.set(9);
    assert_eq!(getter.get(), 9);
}

struct Session {
    token: ExpiryToken,
}

impl Expirable for Session {
    fn expiry_token(&self) -> &ExpiryToken {
        &self.token
    }
}

#[test]
fn expirable_observers_fire_once_in_order() {
    let session = Session {
        token: ExpiryToken::new(),
    };
    let log = Rc::new(RefCell::new(Vec::new()));
    let log1 = Rc::clone(&log);
    let _first = session.observe_expiry(move || log1.borrow_mut().push(1));
    let log2 = Rc::clone(&log);
    let _second = session.observe_expiry(move || log2.borrow_mut().push(2));

    session.expire();
    assert_eq!(*log.borrow(), vec![1, 2]);

    drop(session);
    assert_eq!(*log.borrow(), vec![1, 2]);
}

/// A model exposing a read-only status while keeping the writer private.
struct Model {
    status: Property<String>,
}

impl Model {
    fn status(&self) -> ReadOnlyProperty<String> {
        self.status.read_only()
    }

    fn finish(&self) {
        self.status.set("done".to_string());
    }
}

/// A view that follows a model's status until the view itself expires.
struct View {
    token: ExpiryToken,
    label: Rc<RefCell<String>>,
    binding: RefCell<Option<PropertyConnection<String>>>,
}

impl Expirable for View {
    fn expiry_token(&self) -> &ExpiryToken {
        &self.token
    }
}

impl View {
    fn new() -> Rc<Self> {
        Rc::new(Self {
            token: ExpiryToken::new(),
            label: Rc::default(),
            binding: RefCell::new(None),
        })
    }
}

#[test]
fn model_view_binding_through_attacher() {
    let model = Model {
        status: Property::new("idle".to_string()),
    };
    let status = model.status();

    let attacher = Attacher::new(move |event: AttachEvent<View>| match event {
        AttachEvent::Attach { object, .. } => {
            let observer = status.observer();
            let label = Rc::clone(&object.label);
            let reader = observer.clone();
            *label.borrow_mut() = reader.get();
            let binding = ValueConnection::new(observer, move || {
                *label.borrow_mut() = reader.get();
            });
            *object.binding.borrow_mut() = Some(binding);
        }
        AttachEvent::Detach { object, .. } => {
            if let Some(view) = object {
                view.binding.borrow_mut().take();
            }
        }
    });

    let view = View::new();
    assert!(attacher.attach(&view));
    assert_eq!(*view.label.borrow(), "idle");
    assert_eq!(model.status.observer_count(), 1);

    view.expire();
    assert!(!attacher.is_attached(&view));
    assert_eq!(model.status.observer_count(), 0);

    model.finish();
    assert_eq!(*view.label.borrow(), "idle");
}

#[test]
fn scoped_connection_tied_to_expiry() {
    let property = Property::new(0);
    let (count, callback) = counter();
    let token = ExpiryToken::new();

    let scoped = Rc::new(RefCell::new(ScopedConnection::new(property.observe(callback))));
    let scoped_clone = Rc::clone(&scoped);
    let _c = token.observe_expiry(move || scoped_clone.borrow_mut().disconnect());

    property.set(1);
    token.expire();
    property.set(2);
    assert_eq!(count.get(), 1);
}

#[test]
fn detach_key_matches_attach_key() {
    let keys: Rc<RefCell<Vec<(bool, AttachKey)>>> = Rc::default();
    let keys_clone = Rc::clone(&keys);
    let attacher = Attacher::new(move |event: AttachEvent<ExpiryToken>| {
        keys_clone.borrow_mut().push((event.is_attach(), event.key()));
    });

    let token = Rc::new(ExpiryToken::new());
    let key = AttachKey::of(&token);
    attacher.attach(&token);
    drop(token);

    assert_eq!(*keys.borrow(), vec![(true, key), (false, key)]);
}

#[derive(Clone, Default)]
struct CaptureWriter(Arc<Mutex<Vec<u8>>>);

impl io::Write for CaptureWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().expect("capture lock poisoned").extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn expiry_and_attachment_are_traced() {
    let capture = CaptureWriter::default();
    let writer = capture.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();

    tracing::subscriber::with_default(subscriber, || {
        let attacher = Attacher::new(|_: AttachEvent<ExpiryToken>| {});
        let token = Rc::new(ExpiryToken::new());
        attacher.attach(&token);
        token.expire();
    });

    let output = String::from_utf8(capture.0.lock().expect("capture lock poisoned").clone())
        .expect("utf8 log output");
    assert!(output.contains("object attached"));
    assert!(output.contains("expiry token expired"));
    assert!(output.contains("object detached"));
}
