//! Domain entities for the virtual input device harness.
//!
//! This module contains pure data types with no infrastructure dependencies.
//! Everything here can be compiled and tested on any platform without a
//! device, an `adb` binary, or a kernel with uinput support.

/// Device specs, identities, handles and the events that report them.
///
/// See [`device::VirtualDeviceSpec`] for the main type.
pub mod device;
