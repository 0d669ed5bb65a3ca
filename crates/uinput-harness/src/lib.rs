//! uinput-harness library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.
//!
//! # What does uinput-harness do? (for beginners)
//!
//! Input tests often need a keyboard, mouse, or gamepad that does not
//! physically exist.  The Linux kernel can create such *virtual* devices
//! through uinput, and Android ships a small `uinput` shell tool that reads
//! JSON commands from stdin and forwards them to the kernel.
//!
//! Creating a device is asynchronous: the command is written, and some time
//! later the input subsystem announces a new device.  The harness:
//!
//! 1. Opens the uinput command stream for a session.
//! 2. Writes a device's `register` command to it.
//! 3. Watches the input-device listing for a device with the same name,
//!    vendor id, and product id.
//! 4. Returns the new device's handle, or fails after a timeout.
//!
//! Tests then inject events through that device and rely on the harness to
//! forget it once the OS reports it removed.

/// Application layer: the registration coordinator and its ports.
pub mod application;

/// Infrastructure layer: the uinput transport, event sources, and config.
pub mod infrastructure;
