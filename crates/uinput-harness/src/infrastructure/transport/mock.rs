//! Mock transport for unit and integration testing.
//!
//! # Why a mock transport?
//!
//! The real transport spawns `adb shell uinput -`, which needs a connected
//! Android device.  `MockTransportConnector` replaces the child process with
//! in-memory recording: every command written is pushed into a shared
//! `Mutex<Vec<...>>` so assertions can inspect exactly what reached the
//! stream and in what order.
//!
//! # Failure injection
//!
//! - `fail_open` makes every `open()` fail.
//! - `fail_write` (shared, so it can be flipped after the transport was
//!   opened) makes `write_command` fail with a broken pipe.
//! - `fail_close` makes `close()` report an error after recording it.
//!
//! # Write hook
//!
//! [`MockTransportConnector::with_write_hook`] runs a callback after every
//! successful write.  Tests use it to schedule the OS "device added" event
//! that a real uinput tool would cause.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::application::register_device::{DeviceTransport, TransportConnector, TransportError};

type WriteHook = Arc<dyn Fn(&[u8]) + Send + Sync>;

/// Opens [`MockTransport`]s that share their recordings with the connector.
#[derive(Default)]
pub struct MockTransportConnector {
    /// Every command written by any transport this connector opened.
    pub written: Arc<Mutex<Vec<Vec<u8>>>>,
    /// Number of successful `open()` calls.
    pub open_count: AtomicUsize,
    /// Number of `close()` calls across all opened transports.
    pub close_count: Arc<AtomicUsize>,
    pub fail_open: bool,
    pub fail_write: Arc<AtomicBool>,
    pub fail_close: bool,
    on_write: Option<WriteHook>,
}

impl MockTransportConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `hook` with the written bytes after every successful write.
    pub fn with_write_hook(mut self, hook: impl Fn(&[u8]) + Send + Sync + 'static) -> Self {
        self.on_write = Some(Arc::new(hook));
        self
    }

    /// Snapshot of the written commands.
    pub fn written_commands(&self) -> Vec<Vec<u8>> {
        self.written.lock().unwrap().clone()
    }
}

impl TransportConnector for MockTransportConnector {
    fn open(&self) -> Result<Box<dyn DeviceTransport>, TransportError> {
        if self.fail_open {
            return Err(TransportError::Platform("mock open failure".into()));
        }
        self.open_count.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockTransport {
            written: Arc::clone(&self.written),
            close_count: Arc::clone(&self.close_count),
            fail_write: Arc::clone(&self.fail_write),
            fail_close: self.fail_close,
            on_write: self.on_write.clone(),
            closed: false,
        }))
    }
}

/// A recording transport handed out by [`MockTransportConnector`].
pub struct MockTransport {
    written: Arc<Mutex<Vec<Vec<u8>>>>,
    close_count: Arc<AtomicUsize>,
    fail_write: Arc<AtomicBool>,
    fail_close: bool,
    on_write: Option<WriteHook>,
    closed: bool,
}

impl DeviceTransport for MockTransport {
    fn write_command(&mut self, command: &[u8]) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        if self.fail_write.load(Ordering::SeqCst) {
            return Err(TransportError::Io(std::io::ErrorKind::BrokenPipe.into()));
        }
        self.written.lock().unwrap().push(command.to_vec());
        if let Some(hook) = &self.on_write {
            hook(command);
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), TransportError> {
        self.closed = true;
        self.close_count.fetch_add(1, Ordering::SeqCst);
        if self.fail_close {
            return Err(TransportError::Platform("mock close failure".into()));
        }
        Ok(())
    }
}
