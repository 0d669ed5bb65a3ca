//! Infrastructure layer for the harness.
//!
//! Contains the OS-facing adapters behind the application-layer ports.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `uinput_core`, but MUST NOT be imported by the `application` layer.
//!
//! # Sub-modules
//!
//! - **`transport`** – `ShellTransportConnector` spawns the uinput command
//!   (by default `adb shell uinput -`) and writes registration commands to its
//!   stdin.  A `MockTransportConnector` records writes for tests.
//!
//! - **`event_source`** – `InputDeviceMonitor` polls the input-device listing
//!   (locally or through adb) and reports added, changed, and removed devices.
//!   `ManualEventSource` lets tests emit events by hand.
//!
//! - **`storage`** – TOML configuration file loading and saving.

pub mod event_source;
pub mod storage;
pub mod transport;
