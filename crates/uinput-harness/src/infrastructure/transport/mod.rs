//! Device-emulation transports: the uinput command stream.
//!
//! - **`shell`** – spawns the uinput tool (by default `adb shell uinput -`)
//!   and uses its stdin as the write channel and its stdout as the read
//!   channel.
//! - **`mock`** – records written commands in memory for tests.

pub mod mock;
pub mod shell;
