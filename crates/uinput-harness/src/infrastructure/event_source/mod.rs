//! Device-event sources.
//!
//! - **`proc_devices`** – parses the Linux `/proc/bus/input/devices` listing
//!   and reads it locally or through `adb shell`.
//! - **`monitor`** – polls a listing on a dedicated thread and turns snapshot
//!   differences into Added / Changed / Removed events.
//! - **`mock`** – `ManualEventSource`, which lets tests deliver events by hand
//!   on a delivery thread of its own.

pub mod mock;
pub mod monitor;
pub mod proc_devices;
