//! Parser and readers for the Linux `/proc/bus/input/devices` listing.
//!
//! The kernel prints one block per input device, blocks separated by a blank
//! line:
//!
//! ```text
//! I: Bus=0003 Vendor=18d1 Product=0001 Version=0001
//! N: Name="kbd1"
//! P: Phys=
//! S: Sysfs=/devices/virtual/input/input12
//! U: Uniq=
//! H: Handlers=sysrq kbd event7
//! B: EV=3
//! ```
//!
//! The `eventN` entry of the `H:` line is used as the [`DeviceHandle`].
//! Devices without an event node (rare, e.g. some joystick-only drivers) are
//! skipped because nothing could ever be correlated with them.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Command;

use uinput_core::{DeviceHandle, DeviceIdentity};

use crate::application::register_device::EventSourceError;

/// Default location of the listing on Linux and Android.
pub const PROC_INPUT_DEVICES: &str = "/proc/bus/input/devices";

/// A point-in-time view of the input devices, keyed by handle.
pub type DeviceSnapshot = BTreeMap<DeviceHandle, DeviceIdentity>;

#[derive(Default)]
struct BlockBuilder {
    vendor_id: Option<u16>,
    product_id: Option<u16>,
    name: Option<String>,
    handle: Option<DeviceHandle>,
}

impl BlockBuilder {
    fn finish(self) -> Option<(DeviceHandle, DeviceIdentity)> {
        Some((
            self.handle?,
            DeviceIdentity::new(self.name?, self.vendor_id?, self.product_id?),
        ))
    }
}

/// Parses the full listing.  Malformed blocks are skipped.
pub fn parse_input_devices(listing: &str) -> DeviceSnapshot {
    let mut snapshot = DeviceSnapshot::new();
    let mut block = BlockBuilder::default();

    for line in listing.lines().map(str::trim_end) {
        if line.trim().is_empty() {
            if let Some((handle, identity)) = std::mem::take(&mut block).finish() {
                snapshot.insert(handle, identity);
            }
            continue;
        }

        if let Some(rest) = line.strip_prefix("I:") {
            for field in rest.split_whitespace() {
                if let Some(v) = field.strip_prefix("Vendor=") {
                    block.vendor_id = u16::from_str_radix(v, 16).ok();
                } else if let Some(p) = field.strip_prefix("Product=") {
                    block.product_id = u16::from_str_radix(p, 16).ok();
                }
            }
        } else if let Some(rest) = line.strip_prefix("N:") {
            block.name = rest
                .trim()
                .strip_prefix("Name=")
                .map(|n| n.trim_matches('"').to_string());
        } else if let Some(rest) = line.strip_prefix("H:") {
            let handlers = rest.trim().strip_prefix("Handlers=").unwrap_or_default();
            block.handle = handlers
                .split_whitespace()
                .find_map(|h| h.strip_prefix("event")?.parse::<i32>().ok())
                .map(DeviceHandle);
        }
    }

    // The listing normally ends with a blank line, but captured output may not.
    if let Some((handle, identity)) = block.finish() {
        snapshot.insert(handle, identity);
    }
    snapshot
}

/// Something that can produce the raw `/proc/bus/input/devices` text.
pub trait DeviceListing: Send + Sync {
    fn read_listing(&self) -> Result<String, EventSourceError>;
}

/// Reads the listing from the local filesystem.
#[derive(Debug, Clone)]
pub struct LocalProcListing {
    path: PathBuf,
}

impl LocalProcListing {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Default for LocalProcListing {
    fn default() -> Self {
        Self::new(PROC_INPUT_DEVICES)
    }
}

impl DeviceListing for LocalProcListing {
    fn read_listing(&self) -> Result<String, EventSourceError> {
        Ok(std::fs::read_to_string(&self.path)?)
    }
}

/// Reads the listing of an Android device with `adb shell cat`.
#[derive(Debug, Clone)]
pub struct AdbProcListing {
    adb_program: String,
    serial: Option<String>,
}

impl AdbProcListing {
    pub fn new(adb_program: impl Into<String>, serial: Option<String>) -> Self {
        Self {
            adb_program: adb_program.into(),
            serial,
        }
    }

    fn args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(serial) = &self.serial {
            args.extend(["-s".to_string(), serial.clone()]);
        }
        args.extend(["shell", "cat", PROC_INPUT_DEVICES].map(String::from));
        args
    }
}

impl DeviceListing for AdbProcListing {
    fn read_listing(&self) -> Result<String, EventSourceError> {
        let output = Command::new(&self.adb_program).args(self.args()).output()?;
        if !output.status.success() {
            return Err(EventSourceError::Listing(format!(
                "`{} shell cat` exited with {:?}: {}",
                self.adb_program,
                output.status.code(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"I: Bus=0019 Vendor=0000 Product=0001 Version=0000
N: Name="Power Button"
P: Phys=LNXPWRBN/button/input0
S: Sysfs=/devices/LNXSYSTM:00/LNXPWRBN:00/input/input0
U: Uniq=
H: Handlers=kbd event0
B: PROP=0
B: EV=3

I: Bus=0003 Vendor=18d1 Product=0001 Version=0001
N: Name="kbd1"
P: Phys=
S: Sysfs=/devices/virtual/input/input12
U: Uniq=
H: Handlers=sysrq kbd leds event7
B: PROP=0
B: EV=120013

I: Bus=0003 Vendor=046d Product=c52b Version=0111
N: Name="Logitech Receiver"
H: Handlers=js0
B: EV=1b
"#;

    #[test]
    fn test_parse_extracts_identity_and_event_handle() {
        // Act
        let snapshot = parse_input_devices(SAMPLE);

        // Assert
        assert_eq!(
            snapshot.get(&DeviceHandle(7)),
            Some(&DeviceIdentity::new("kbd1", 0x18d1, 0x0001))
        );
        assert_eq!(
            snapshot.get(&DeviceHandle(0)),
            Some(&DeviceIdentity::new("Power Button", 0x0000, 0x0001))
        );
    }

    #[test]
    fn test_parse_skips_devices_without_event_node() {
        let snapshot = parse_input_devices(SAMPLE);
        assert_eq!(snapshot.len(), 2, "the js0-only device has no handle");
    }

    #[test]
    fn test_parse_handles_missing_trailing_blank_line() {
        let listing = "I: Bus=0003 Vendor=0001 Product=0002 Version=0001\nN: Name=\"x\"\nH: Handlers=event3";
        let snapshot = parse_input_devices(listing);
        assert_eq!(snapshot.get(&DeviceHandle(3)), Some(&DeviceIdentity::new("x", 1, 2)));
    }

    #[test]
    fn test_parse_keeps_spaces_inside_names() {
        let listing = "I: Bus=0003 Vendor=18d1 Product=4ee7 Version=0001\nN: Name=\"Virtual Test Keyboard\"\nH: Handlers=event12\n\n";
        let snapshot = parse_input_devices(listing);
        assert_eq!(snapshot[&DeviceHandle(12)].name, "Virtual Test Keyboard");
    }

    #[test]
    fn test_parse_empty_listing_is_empty_snapshot() {
        assert!(parse_input_devices("").is_empty());
    }

    #[test]
    fn test_adb_listing_selects_serial() {
        let listing = AdbProcListing::new("adb", Some("R58M123".to_string()));
        assert_eq!(
            listing.args(),
            ["-s", "R58M123", "shell", "cat", "/proc/bus/input/devices"]
        );
    }

    #[test]
    fn test_local_listing_reports_missing_file_as_io_error() {
        let listing = LocalProcListing::new("/nonexistent/proc/bus/input/devices");
        assert!(matches!(listing.read_listing(), Err(EventSourceError::Io(_))));
    }
}
