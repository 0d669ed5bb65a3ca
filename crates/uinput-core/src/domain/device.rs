//! Virtual device specs, identities, and device lifecycle events.
//!
//! # How does the harness recognise "its" device? (for beginners)
//!
//! When a test asks the uinput tool to create a keyboard, the OS does not tell
//! the test "here is your keyboard".  Instead, the input subsystem announces
//! that *some* device was added and hands out an opaque number (the
//! [`DeviceHandle`]).  The harness then asks "what is device 7?" and compares
//! the answer against every device it is still waiting for.
//!
//! The comparison uses the [`DeviceIdentity`] triple: name, USB vendor ID and
//! USB product ID.  Two identities are equal only if all three fields match,
//! so a physical keyboard from the same vendor, or a second virtual device
//! with the same name but a different product ID, is never mistaken for the
//! one being registered.

use std::fmt;

use serde::{Deserialize, Serialize};

// ── Device handle ─────────────────────────────────────────────────────────────

/// Opaque OS-assigned number identifying a live input device.
///
/// On Linux this is the `N` of `/dev/input/eventN`.  The value carries no
/// meaning beyond equality; handles may be reused after a device is removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceHandle(pub i32);

impl fmt::Display for DeviceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i32> for DeviceHandle {
    fn from(value: i32) -> Self {
        Self(value)
    }
}

// ── Device identity ───────────────────────────────────────────────────────────

/// The `(name, vendor_id, product_id)` triple used to correlate an OS device
/// report with a pending registration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceIdentity {
    pub name: String,
    pub vendor_id: u16,
    pub product_id: u16,
}

impl DeviceIdentity {
    pub fn new(name: impl Into<String>, vendor_id: u16, product_id: u16) -> Self {
        Self {
            name: name.into(),
            vendor_id,
            product_id,
        }
    }
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({:04x}:{:04x})",
            self.name, self.vendor_id, self.product_id
        )
    }
}

// ── Virtual device spec ───────────────────────────────────────────────────────

/// Immutable description of a virtual input device to register.
///
/// The registration command is opaque to the harness: it is written to the
/// uinput command stream unchanged.  Use
/// [`VirtualDeviceSpec::from_template`](crate::protocol::command) to build one
/// from a [`DeviceKind`](crate::DeviceKind) template.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VirtualDeviceSpec {
    identity: DeviceIdentity,
    registration_command: Vec<u8>,
}

impl VirtualDeviceSpec {
    /// Creates a spec from its identity fields and a pre-encoded command.
    pub fn new(
        name: impl Into<String>,
        vendor_id: u16,
        product_id: u16,
        registration_command: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            identity: DeviceIdentity::new(name, vendor_id, product_id),
            registration_command: registration_command.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.identity.name
    }

    pub fn vendor_id(&self) -> u16 {
        self.identity.vendor_id
    }

    pub fn product_id(&self) -> u16 {
        self.identity.product_id
    }

    /// Bytes written to the uinput command stream to create this device.
    pub fn registration_command(&self) -> &[u8] {
        &self.registration_command
    }

    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    /// Returns `true` when an OS-reported identity refers to this spec.
    ///
    /// All three fields must match.
    pub fn matches(&self, identity: &DeviceIdentity) -> bool {
        self.identity == *identity
    }
}

// ── Device events ─────────────────────────────────────────────────────────────

/// The kind of change an event source reports for a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceEventKind {
    Added,
    Changed,
    Removed,
}

impl fmt::Display for DeviceEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DeviceEventKind::Added => "added",
            DeviceEventKind::Changed => "changed",
            DeviceEventKind::Removed => "removed",
        };
        f.write_str(s)
    }
}

/// A device lifecycle notification delivered by an event source.
///
/// `identity` is resolved by the source at delivery time.  It is `None` for
/// removals and when the device vanished before it could be queried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceEvent {
    pub handle: DeviceHandle,
    pub kind: DeviceEventKind,
    pub identity: Option<DeviceIdentity>,
}

impl DeviceEvent {
    pub fn added(handle: impl Into<DeviceHandle>, identity: DeviceIdentity) -> Self {
        Self {
            handle: handle.into(),
            kind: DeviceEventKind::Added,
            identity: Some(identity),
        }
    }

    pub fn changed(handle: impl Into<DeviceHandle>, identity: DeviceIdentity) -> Self {
        Self {
            handle: handle.into(),
            kind: DeviceEventKind::Changed,
            identity: Some(identity),
        }
    }

    pub fn removed(handle: impl Into<DeviceHandle>) -> Self {
        Self {
            handle: handle.into(),
            kind: DeviceEventKind::Removed,
            identity: None,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn kbd_spec() -> VirtualDeviceSpec {
        VirtualDeviceSpec::new("kbd1", 1, 1, b"{}".to_vec())
    }

    #[test]
    fn test_spec_matches_identical_identity() {
        // Arrange
        let spec = kbd_spec();

        // Act / Assert
        assert!(spec.matches(&DeviceIdentity::new("kbd1", 1, 1)));
    }

    #[test]
    fn test_spec_does_not_match_when_any_field_differs() {
        let spec = kbd_spec();

        assert!(!spec.matches(&DeviceIdentity::new("kbd2", 1, 1)), "name differs");
        assert!(!spec.matches(&DeviceIdentity::new("kbd1", 2, 1)), "vendor differs");
        assert!(!spec.matches(&DeviceIdentity::new("kbd1", 1, 2)), "product differs");
    }

    #[test]
    fn test_specs_with_different_commands_are_distinct() {
        // Arrange
        let a = VirtualDeviceSpec::new("kbd1", 1, 1, b"a".to_vec());
        let b = VirtualDeviceSpec::new("kbd1", 1, 1, b"b".to_vec());

        // Assert – same identity, different spec
        assert_ne!(a, b);
        assert_eq!(a.identity(), b.identity());
    }

    #[test]
    fn test_identity_display_uses_hex_ids() {
        let identity = DeviceIdentity::new("Test Keyboard", 0x18d1, 0x4ee7);
        assert_eq!(identity.to_string(), "Test Keyboard (18d1:4ee7)");
    }

    #[test]
    fn test_removed_event_carries_no_identity() {
        let event = DeviceEvent::removed(7);
        assert_eq!(event.handle, DeviceHandle(7));
        assert_eq!(event.kind, DeviceEventKind::Removed);
        assert!(event.identity.is_none());
    }
}
