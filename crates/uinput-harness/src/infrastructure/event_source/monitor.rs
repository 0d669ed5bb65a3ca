//! Polling device-event source.
//!
//! `InputDeviceMonitor` turns a [`DeviceListing`] into a stream of
//! [`DeviceEvent`]s by taking a snapshot every `poll_interval` and diffing it
//! against the previous one:
//!
//! | previous        | current            | event     |
//! |-----------------|--------------------|-----------|
//! | absent          | handle → identity  | `Added`   |
//! | handle → A      | handle → B, A ≠ B  | `Changed` |
//! | handle → A      | absent             | `Removed` |
//!
//! The first snapshot is taken inside `subscribe()`, so devices that already
//! exist when the session starts are treated as background and never
//! reported as added.
//!
//! All events are delivered on the monitor's own thread, in snapshot order,
//! never concurrently with each other.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, warn};
use uinput_core::DeviceEvent;

use super::proc_devices::{parse_input_devices, DeviceListing, DeviceSnapshot};
use crate::application::register_device::{
    DeviceEventListener, DeviceEventSource, EventSourceError,
};

/// Default time between two listing polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Shortest interval the monitor will poll at; each poll may spawn `adb`.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Computes the events that lead from `previous` to `current`.
///
/// Removals come first, then additions and changes in ascending handle order.
pub fn diff_snapshots(previous: &DeviceSnapshot, current: &DeviceSnapshot) -> Vec<DeviceEvent> {
    let removed = previous
        .keys()
        .filter(|handle| !current.contains_key(*handle))
        .map(|handle| DeviceEvent::removed(*handle));

    let added_or_changed = current
        .iter()
        .filter_map(|(handle, identity)| match previous.get(handle) {
            None => Some(DeviceEvent::added(*handle, identity.clone())),
            Some(old) if old != identity => Some(DeviceEvent::changed(*handle, identity.clone())),
            Some(_) => None,
        });

    removed.chain(added_or_changed).collect()
}

struct Worker {
    /// Dropping the sender wakes the thread and ends it.
    stop: mpsc::Sender<()>,
    join: JoinHandle<()>,
}

/// Polls the input-device listing and reports changes to one listener.
pub struct InputDeviceMonitor {
    listing: Arc<dyn DeviceListing>,
    poll_interval: Duration,
    worker: Mutex<Option<Worker>>,
}

impl InputDeviceMonitor {
    pub fn new(listing: Arc<dyn DeviceListing>, poll_interval: Duration) -> Self {
        Self {
            listing,
            poll_interval: poll_interval.max(MIN_POLL_INTERVAL),
            worker: Mutex::new(None),
        }
    }

    /// Reads and parses one snapshot right now.
    ///
    /// # Errors
    ///
    /// Propagates listing failures.
    pub fn snapshot(&self) -> Result<DeviceSnapshot, EventSourceError> {
        Ok(parse_input_devices(&self.listing.read_listing()?))
    }

    pub fn is_running(&self) -> bool {
        self.worker
            .lock()
            .map(|w| w.is_some())
            .unwrap_or(false)
    }
}

fn poll_loop(
    listing: Arc<dyn DeviceListing>,
    listener: Arc<dyn DeviceEventListener>,
    poll_interval: Duration,
    stop: mpsc::Receiver<()>,
    mut previous: DeviceSnapshot,
) {
    loop {
        match stop.recv_timeout(poll_interval) {
            Err(RecvTimeoutError::Timeout) => {}
            Ok(()) | Err(RecvTimeoutError::Disconnected) => return,
        }

        let current = match listing.read_listing() {
            Ok(text) => parse_input_devices(&text),
            Err(e) => {
                // Transient: adb can hiccup; keep the last snapshot and retry.
                warn!(error = %e, "failed to poll input devices");
                continue;
            }
        };

        for event in diff_snapshots(&previous, &current) {
            debug!(handle = %event.handle, kind = %event.kind, "input device event");
            listener.on_device_event(event);
        }
        previous = current;
    }
}

impl DeviceEventSource for InputDeviceMonitor {
    fn subscribe(&self, listener: Arc<dyn DeviceEventListener>) -> Result<(), EventSourceError> {
        let mut worker = self
            .worker
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if worker.is_some() {
            return Err(EventSourceError::AlreadySubscribed);
        }

        let baseline = self.snapshot()?;
        debug!(devices = baseline.len(), "input device baseline taken");

        let (stop, stop_rx) = mpsc::channel();
        let listing = Arc::clone(&self.listing);
        let poll_interval = self.poll_interval;
        let join = thread::Builder::new()
            .name("input-device-monitor".to_string())
            .spawn(move || poll_loop(listing, listener, poll_interval, stop_rx, baseline))?;

        *worker = Some(Worker { stop, join });
        Ok(())
    }

    fn unsubscribe(&self) {
        let worker = self
            .worker
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take();
        if let Some(Worker { stop, join }) = worker {
            drop(stop);
            if join.join().is_err() {
                warn!("input device monitor thread panicked");
            }
        }
    }
}

impl Drop for InputDeviceMonitor {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
