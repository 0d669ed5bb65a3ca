//! DeviceRegistrationCoordinator: registers virtual devices and waits for the
//! OS to acknowledge them.
//!
//! This use case sits at the application layer.  It talks to the outside world
//! through two injected ports:
//!
//! - a [`TransportConnector`] that opens the uinput command stream, and
//! - a [`DeviceEventSource`] that reports input devices being added, changed
//!   and removed.
//!
//! The concrete adapters (an `adb shell uinput -` child process, a poller over
//! `/proc/bus/input/devices`, and in-memory mocks) live in the infrastructure
//! layer.
//!
//! # Registration flow (for beginners)
//!
//! ```text
//! caller thread                         event-delivery thread
//! ─────────────                         ─────────────────────
//! register(spec)
//!   open transport (once per session)
//!   insert pending signal  ──┐
//!   write registration cmd   │
//!   wait on condvar ◀────────┼──────── on_device_event(Added, identity)
//!                            └─ match ─  record handle → spec, fire signal
//!   Ok(())                                notify_all
//! ```
//!
//! The pending map, the active-device index and the condition variable all
//! share one mutex.  Inserting the signal, firing it, and checking it before
//! sleeping happen under that mutex, so an event arriving between the write
//! and the wait can never be lost.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, trace, warn};
use uinput_core::{DeviceEvent, DeviceEventKind, DeviceHandle, VirtualDeviceSpec};
use uuid::Uuid;

/// Default time to wait for the OS to report a registered device.
pub const DEFAULT_REGISTRATION_TIMEOUT: Duration = Duration::from_secs(20);

// ── Errors ────────────────────────────────────────────────────────────────────

/// Errors raised by the device-emulation transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The uinput tool could not be started.
    #[error("failed to spawn `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    /// Reading or writing the command stream failed.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// The transport was already closed.
    #[error("transport is closed")]
    Closed,
    #[error("platform error: {0}")]
    Platform(String),
}

/// Errors raised by a device-event source.
#[derive(Debug, Error)]
pub enum EventSourceError {
    #[error("a listener is already subscribed")]
    AlreadySubscribed,
    #[error("failed to list input devices: {0}")]
    Listing(String),
    #[error("event source I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors returned by [`DeviceRegistrationCoordinator`].
#[derive(Debug, Error)]
pub enum RegistrationError {
    /// A registration for the same spec is still waiting for its device.
    #[error("device {device} already has a pending registration")]
    DuplicateRegistration { device: String },

    /// No matching device was reported before the deadline.
    #[error("did not receive added notification for device {device} within {timeout:?}")]
    RegistrationTimeout { device: String, timeout: Duration },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("failed to subscribe to device events: {0}")]
    EventSource(#[from] EventSourceError),

    /// `register` was called before `start` (or after `stop`).
    #[error("registration session is not started")]
    NotStarted,

    /// The session was stopped while the caller was waiting.
    #[error("session stopped while waiting for device {device}")]
    SessionStopped { device: String },
}

// ── Ports ─────────────────────────────────────────────────────────────────────

/// An open uinput command stream.
///
/// The write side accepts opaque command bytes.  The read side is held open by
/// the implementation for as long as the transport lives.
pub trait DeviceTransport: Send {
    /// Writes `command` and flushes it to the emulation subsystem.
    fn write_command(&mut self, command: &[u8]) -> Result<(), TransportError>;

    /// Closes every channel of the transport.
    ///
    /// Implementations attempt every channel even if an earlier one fails and
    /// report the first failure.
    fn close(&mut self) -> Result<(), TransportError>;
}

/// Opens [`DeviceTransport`]s.
pub trait TransportConnector: Send + Sync {
    fn open(&self) -> Result<Box<dyn DeviceTransport>, TransportError>;
}

/// Receives device lifecycle notifications.
pub trait DeviceEventListener: Send + Sync {
    fn on_device_event(&self, event: DeviceEvent);
}

/// A subscribable stream of device lifecycle notifications.
///
/// Implementations deliver events on a single thread they own, in arrival
/// order, and resolve the identity of added or changed devices before
/// delivery.
pub trait DeviceEventSource: Send + Sync {
    fn subscribe(&self, listener: Arc<dyn DeviceEventListener>) -> Result<(), EventSourceError>;

    /// Stops delivery.  No callback runs after this returns.
    fn unsubscribe(&self);
}

// ── Registry state ────────────────────────────────────────────────────────────

/// Single-fire completion flag.  Only read or written under the registry mutex.
#[derive(Debug, Default)]
struct CompletionSignal {
    fired: AtomicBool,
}

impl CompletionSignal {
    fn fire(&self) {
        self.fired.store(true, Ordering::Relaxed);
    }

    fn has_fired(&self) -> bool {
        self.fired.load(Ordering::Relaxed)
    }
}

struct PendingEntry {
    spec: VirtualDeviceSpec,
    signal: Arc<CompletionSignal>,
}

#[derive(Default)]
struct Registry {
    /// Pending registrations in insertion order.
    pending: Vec<PendingEntry>,
    active: HashMap<DeviceHandle, VirtualDeviceSpec>,
    /// Bumped by every `stop()` so waiters can tell a stop from a timeout.
    generation: u64,
}

/// The registry plus its condition variable; this is the listener handed to
/// the event source.
struct SharedRegistry {
    session_id: Uuid,
    state: Mutex<Registry>,
    changed: Condvar,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SharedRegistry {
    fn new(session_id: Uuid) -> Self {
        Self {
            session_id,
            state: Mutex::new(Registry::default()),
            changed: Condvar::new(),
        }
    }

    /// Inserts a fresh signal for `spec`, replacing one that already fired.
    fn insert(
        &self,
        spec: &VirtualDeviceSpec,
    ) -> Result<(Arc<CompletionSignal>, u64), RegistrationError> {
        let mut registry = lock(&self.state);
        let signal = Arc::new(CompletionSignal::default());
        match registry.pending.iter().position(|e| e.spec == *spec) {
            Some(i) if !registry.pending[i].signal.has_fired() => {
                return Err(RegistrationError::DuplicateRegistration {
                    device: spec.name().to_string(),
                });
            }
            Some(i) => registry.pending[i].signal = Arc::clone(&signal),
            None => registry.pending.push(PendingEntry {
                spec: spec.clone(),
                signal: Arc::clone(&signal),
            }),
        }
        Ok((signal, registry.generation))
    }

    /// Removes the entry for `spec` if it still holds `signal`.
    fn remove_if_current(&self, spec: &VirtualDeviceSpec, signal: &Arc<CompletionSignal>) {
        let mut registry = lock(&self.state);
        Self::remove_locked(&mut registry, spec, signal);
    }

    fn remove_locked(registry: &mut Registry, spec: &VirtualDeviceSpec, signal: &Arc<CompletionSignal>) {
        registry
            .pending
            .retain(|e| !(e.spec == *spec && Arc::ptr_eq(&e.signal, signal)));
    }

    fn wait(
        &self,
        spec: &VirtualDeviceSpec,
        signal: &Arc<CompletionSignal>,
        generation: u64,
        timeout: Duration,
    ) -> Result<(), RegistrationError> {
        let guard = lock(&self.state);
        let (mut registry, _) = self
            .changed
            .wait_timeout_while(guard, timeout, |r| {
                !signal.has_fired() && r.generation == generation
            })
            .unwrap_or_else(PoisonError::into_inner);

        if signal.has_fired() {
            return Ok(());
        }
        if registry.generation != generation {
            return Err(RegistrationError::SessionStopped {
                device: spec.name().to_string(),
            });
        }

        // A late event must not fire a signal nobody waits for any more.
        Self::remove_locked(&mut registry, spec, signal);
        Err(RegistrationError::RegistrationTimeout {
            device: spec.name().to_string(),
            timeout,
        })
    }

    fn clear(&self) {
        let mut registry = lock(&self.state);
        registry.pending.clear();
        registry.active.clear();
        registry.generation = registry.generation.wrapping_add(1);
        drop(registry);
        self.changed.notify_all();
    }
}

impl DeviceEventListener for SharedRegistry {
    fn on_device_event(&self, event: DeviceEvent) {
        let DeviceEvent {
            handle,
            kind,
            identity,
        } = event;

        match kind {
            DeviceEventKind::Added | DeviceEventKind::Changed => {
                let Some(identity) = identity else {
                    trace!(session = %self.session_id, %handle, %kind, "device vanished before it could be identified");
                    return;
                };
                let mut registry = lock(&self.state);
                if registry.active.get(&handle).is_some_and(|s| s.matches(&identity)) {
                    trace!(session = %self.session_id, %handle, %identity, %kind, "device already acknowledged");
                    return;
                }
                // Fired entries stay pending until their device is removed, so
                // they must not claim the next device with the same identity.
                let waiting = registry
                    .pending
                    .iter()
                    .find(|e| !e.signal.has_fired() && e.spec.matches(&identity));
                let Some(entry) = waiting else {
                    trace!(session = %self.session_id, %handle, %identity, "ignoring unrelated device");
                    return;
                };
                entry.signal.fire();
                let spec = entry.spec.clone();
                registry.active.insert(handle, spec);
                drop(registry);
                debug!(session = %self.session_id, %handle, %identity, %kind, "virtual device acknowledged");
                self.changed.notify_all();
            }
            DeviceEventKind::Removed => {
                let mut registry = lock(&self.state);
                if let Some(spec) = registry.active.remove(&handle) {
                    // Only the entry that fired for this device goes; a newer
                    // registration of the same spec keeps waiting.
                    registry
                        .pending
                        .retain(|e| !(e.spec == spec && e.signal.has_fired()));
                    debug!(session = %self.session_id, %handle, device = spec.name(), "virtual device removed");
                }
            }
        }
    }
}

// ── Coordinator ───────────────────────────────────────────────────────────────

/// Registers virtual input devices and blocks until the OS reports them.
///
/// A coordinator is one session: `start()` subscribes to device events,
/// `register()` may be called any number of times (from any number of
/// threads), and `stop()` releases everything.  Dropping a started
/// coordinator stops it.
pub struct DeviceRegistrationCoordinator {
    events: Arc<dyn DeviceEventSource>,
    connector: Arc<dyn TransportConnector>,
    transport: Mutex<Option<Box<dyn DeviceTransport>>>,
    registry: Arc<SharedRegistry>,
    started: AtomicBool,
}

impl DeviceRegistrationCoordinator {
    pub fn new(events: Arc<dyn DeviceEventSource>, connector: Arc<dyn TransportConnector>) -> Self {
        Self {
            events,
            connector,
            transport: Mutex::new(None),
            registry: Arc::new(SharedRegistry::new(Uuid::new_v4())),
            started: AtomicBool::new(false),
        }
    }

    /// Identifier that tags every log line of this session.
    pub fn session_id(&self) -> Uuid {
        self.registry.session_id
    }

    /// Subscribes to the device-event source.  A second call is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::EventSource`] if the subscription fails;
    /// the coordinator then stays stopped.
    pub fn start(&self) -> Result<(), RegistrationError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let listener: Arc<dyn DeviceEventListener> = self.registry.clone();
        if let Err(e) = self.events.subscribe(listener) {
            self.started.store(false, Ordering::SeqCst);
            return Err(e.into());
        }
        info!(session = %self.session_id(), "device registration session started");
        Ok(())
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Registers `spec` and blocks until the OS reports a matching device or
    /// `timeout` elapses.
    ///
    /// # Errors
    ///
    /// - [`RegistrationError::NotStarted`] before `start()`.
    /// - [`RegistrationError::DuplicateRegistration`] if the same spec is
    ///   still waiting for its device.
    /// - [`RegistrationError::Transport`] if the stream cannot be opened or
    ///   written; no pending entry is left behind.
    /// - [`RegistrationError::RegistrationTimeout`] if no matching device was
    ///   reported in time; the pending entry is removed.
    /// - [`RegistrationError::SessionStopped`] if `stop()` ran meanwhile.
    pub fn register(
        &self,
        spec: &VirtualDeviceSpec,
        timeout: Duration,
    ) -> Result<(), RegistrationError> {
        if !self.is_started() {
            return Err(RegistrationError::NotStarted);
        }

        // Holding the transport lock across insert + write serialises command
        // bytes from concurrent callers.
        let mut transport = lock(&self.transport);
        if transport.is_none() {
            let opened = self.connector.open()?;
            info!(session = %self.session_id(), "uinput command stream opened");
            *transport = Some(opened);
        }
        let Some(stream) = transport.as_mut() else {
            return Err(TransportError::Closed.into());
        };

        let (signal, generation) = self.registry.insert(spec)?;
        if let Err(e) = stream.write_command(spec.registration_command()) {
            self.registry.remove_if_current(spec, &signal);
            warn!(session = %self.session_id(), device = spec.name(), error = %e, "failed to write registration command");
            // A broken stream is dropped so the next register reopens it.
            if let Some(mut broken) = transport.take() {
                if let Err(close_err) = broken.close() {
                    debug!(session = %self.session_id(), error = %close_err, "error closing broken uinput command stream");
                }
            }
            return Err(e.into());
        }
        drop(transport);

        debug!(session = %self.session_id(), identity = %spec.identity(), ?timeout, "waiting for device");
        let result = self.registry.wait(spec, &signal, generation, timeout);
        match &result {
            Ok(()) => info!(session = %self.session_id(), identity = %spec.identity(), "device registered"),
            Err(e) => warn!(session = %self.session_id(), identity = %spec.identity(), error = %e, "device registration failed"),
        }
        result
    }

    /// Ends the session: unsubscribes, closes the transport, and clears all
    /// bookkeeping.  Never fails; close errors are logged.
    pub fn stop(&self) {
        let was_started = self.started.swap(false, Ordering::SeqCst);
        if was_started {
            self.events.unsubscribe();
        }

        if let Some(mut stream) = lock(&self.transport).take() {
            if let Err(e) = stream.close() {
                warn!(session = %self.session_id(), error = %e, "error closing uinput command stream");
            }
        }

        self.registry.clear();
        if was_started {
            info!(session = %self.session_id(), "device registration session stopped");
        }
    }

    /// The spec registered under `handle`, if any.
    pub fn active_device(&self, handle: DeviceHandle) -> Option<VirtualDeviceSpec> {
        lock(&self.registry.state).active.get(&handle).cloned()
    }

    /// Handles of every acknowledged device, ascending.
    pub fn active_handles(&self) -> Vec<DeviceHandle> {
        let mut handles: Vec<_> = lock(&self.registry.state).active.keys().copied().collect();
        handles.sort_unstable();
        handles
    }

    /// Number of pending registrations, fired or not.
    pub fn pending_count(&self) -> usize {
        lock(&self.registry.state).pending.len()
    }

    /// Feeds an event directly into the registry, bypassing the source.
    pub fn on_device_event(&self, event: DeviceEvent) {
        self.registry.on_device_event(event);
    }
}

impl Drop for DeviceRegistrationCoordinator {
    fn drop(&mut self) {
        if self.is_started() {
            self.stop();
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
