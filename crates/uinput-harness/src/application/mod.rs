//! Application layer use cases for the harness.
//!
//! # What use cases does the harness have?
//!
//! - **`register_device`** – Writes a virtual device's registration command to
//!   the uinput stream and blocks until the OS reports a matching input device.
//!   The stream and the device-event source are injected at construction time
//!   as trait objects, so the same coordinator runs against a real device or
//!   against the in-memory mocks used by the tests.

pub mod register_device;

pub use register_device::{
    DeviceEventListener, DeviceEventSource, DeviceRegistrationCoordinator, DeviceTransport,
    EventSourceError, RegistrationError, TransportConnector, TransportError,
    DEFAULT_REGISTRATION_TIMEOUT,
};
