//! Hand-driven device-event source for unit and integration testing.
//!
//! `ManualEventSource` behaves like a real platform event source: events are
//! delivered to the listener on a dedicated thread, one at a time, in the
//! order they were emitted.  Tests call [`ManualEventSource::emit`] (or
//! [`ManualEventSource::emit_after`] for delayed delivery) instead of plugging
//! in real hardware.
//!
//! # Usage in tests
//!
//! ```ignore
//! let source = Arc::new(ManualEventSource::new());
//! let coordinator = DeviceRegistrationCoordinator::new(source.clone(), connector);
//! coordinator.start()?;
//!
//! source.emit(DeviceEvent::added(7, DeviceIdentity::new("kbd1", 1, 1)));
//! source.flush(); // wait until the listener has seen everything emitted so far
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use uinput_core::DeviceEvent;

use crate::application::register_device::{
    DeviceEventListener, DeviceEventSource, EventSourceError,
};

enum Delivery {
    Event(DeviceEvent),
    Flush(mpsc::Sender<()>),
}

struct DeliveryThread {
    queue: mpsc::Sender<Delivery>,
    join: JoinHandle<()>,
}

/// An event source whose events are emitted by the test itself.
#[derive(Default)]
pub struct ManualEventSource {
    delivery: Mutex<Option<DeliveryThread>>,
    /// Number of `subscribe()` calls that succeeded.
    pub subscribe_count: AtomicUsize,
    /// Number of `unsubscribe()` calls.
    pub unsubscribe_count: AtomicUsize,
    /// When `true`, `subscribe()` fails.
    pub fail_subscribe: bool,
}

impl ManualEventSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_subscribed(&self) -> bool {
        self.delivery.lock().unwrap().is_some()
    }

    /// Queues `event` for delivery.  Returns `false` when nobody listens.
    pub fn emit(&self, event: DeviceEvent) -> bool {
        match self.delivery.lock().unwrap().as_ref() {
            Some(thread) => thread.queue.send(Delivery::Event(event)).is_ok(),
            None => false,
        }
    }

    /// Emits `event` after `delay` from a helper thread.
    pub fn emit_after(self: &Arc<Self>, delay: Duration, event: DeviceEvent) -> JoinHandle<bool> {
        let source = Arc::clone(self);
        thread::spawn(move || {
            thread::sleep(delay);
            source.emit(event)
        })
    }

    /// Blocks until every event emitted so far has been delivered.
    pub fn flush(&self) {
        let (ack, done) = mpsc::channel();
        let queued = match self.delivery.lock().unwrap().as_ref() {
            Some(thread) => thread.queue.send(Delivery::Flush(ack)).is_ok(),
            None => false,
        };
        if queued {
            let _ = done.recv();
        }
    }
}

impl DeviceEventSource for ManualEventSource {
    fn subscribe(&self, listener: Arc<dyn DeviceEventListener>) -> Result<(), EventSourceError> {
        if self.fail_subscribe {
            return Err(EventSourceError::Listing("mock subscribe failure".into()));
        }
        let mut delivery = self.delivery.lock().unwrap();
        if delivery.is_some() {
            return Err(EventSourceError::AlreadySubscribed);
        }

        let (queue, inbox) = mpsc::channel::<Delivery>();
        let join = thread::spawn(move || {
            for item in inbox {
                match item {
                    Delivery::Event(event) => listener.on_device_event(event),
                    Delivery::Flush(ack) => {
                        let _ = ack.send(());
                    }
                }
            }
        });

        *delivery = Some(DeliveryThread { queue, join });
        self.subscribe_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn unsubscribe(&self) {
        self.unsubscribe_count.fetch_add(1, Ordering::SeqCst);
        let thread = self.delivery.lock().unwrap().take();
        if let Some(DeliveryThread { queue, join }) = thread {
            drop(queue);
            let _ = join.join();
        }
    }
}
