//! # uinput-core
//!
//! Shared library for the virtual input device harness containing the device
//! identity model and the uinput command protocol.
//!
//! This crate has zero dependencies on OS APIs, child processes, or threads.
//! It is used by `uinput-harness`, which owns the registration coordinator and
//! the OS-facing adapters.
//!
//! # What is uinput? (for beginners)
//!
//! `uinput` is a Linux kernel facility that lets a user-space process create
//! *virtual* input devices: keyboards, mice, gamepads that the rest of the
//! system sees exactly like real hardware.  On Android the `uinput` shell tool
//! wraps this facility: it reads a stream of JSON commands from stdin and
//! creates, drives and destroys devices accordingly.
//!
//! This crate defines:
//!
//! - **`domain`** – The [`VirtualDeviceSpec`] a test asks for, the
//!   [`DeviceIdentity`] triple used to recognise the device once the OS reports
//!   it, and the [`DeviceEvent`] notifications an event source delivers.
//!
//! - **`protocol`** – How registration commands are encoded: the
//!   [`UinputCommand`] JSON stream and the per-session [`DeviceIdAllocator`].

pub mod domain;
pub mod protocol;

pub use domain::device::{
    DeviceEvent, DeviceEventKind, DeviceHandle, DeviceIdentity, VirtualDeviceSpec,
};
pub use protocol::command::{encode_command, CommandError, DeviceKind, UinputCommand};
pub use protocol::ids::DeviceIdAllocator;
