//! The uinput JSON command stream.
//!
//! The uinput shell tool reads one JSON object per command from its stdin.
//! Every command names the device it applies to with an integer `id`, which
//! lets a single stream drive several virtual devices at once.
//!
//! ```text
//! {"command":"register","id":1,"name":"kbd1","vid":6353,"pid":1,"bus":"usb",
//!  "configuration":[{"type":"UI_SET_EVBIT","data":["EV_KEY"]}, ...]}
//! {"command":"inject","id":1,"events":[1,30,1,0,0,0]}
//! {"command":"delay","id":1,"duration":10}
//! {"command":"sync","id":1,"syncToken":"done"}
//! ```
//!
//! The harness itself treats an encoded command as opaque bytes; this module
//! only exists so callers can build well-formed registration commands without
//! hand-writing JSON.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::device::VirtualDeviceSpec;

// ── Linux input event constants ───────────────────────────────────────────────

/// Synchronisation event type (`EV_SYN`).
pub const EV_SYN: i32 = 0x00;
/// Key / button event type (`EV_KEY`).
pub const EV_KEY: i32 = 0x01;
/// `SYN_REPORT` code terminating one input frame.
pub const SYN_REPORT: i32 = 0x00;

/// Error type for command encoding.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Device names must be non-empty; the input subsystem reports an empty
    /// name as `<unknown>`, which could never be matched.
    #[error("device name must not be empty")]
    EmptyName,

    /// The command could not be serialised to JSON.
    #[error("failed to encode uinput command: {0}")]
    Encode(#[from] serde_json::Error),
}

// ── Command schema ────────────────────────────────────────────────────────────

/// Bus type advertised for a registered device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bus {
    Usb,
    Bluetooth,
}

/// One `ioctl`-style configuration step, e.g. `UI_SET_EVBIT` with `["EV_KEY"]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigurationEntry {
    #[serde(rename = "type")]
    pub kind: String,
    pub data: Vec<String>,
}

impl ConfigurationEntry {
    fn new(kind: &str, data: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            kind: kind.to_string(),
            data: data.into_iter().map(Into::into).collect(),
        }
    }
}

/// Axis parameters for an absolute axis (`input_absinfo`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbsInfo {
    pub value: i32,
    pub minimum: i32,
    pub maximum: i32,
    pub fuzz: i32,
    pub flat: i32,
    pub resolution: i32,
}

/// Axis parameters keyed by the numeric `ABS_*` code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbsInfoEntry {
    pub code: u16,
    pub info: AbsInfo,
}

/// A single command in the uinput stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum UinputCommand {
    /// Creates a new virtual device.
    Register {
        id: u32,
        name: String,
        vid: u16,
        pid: u16,
        bus: Bus,
        configuration: Vec<ConfigurationEntry>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        abs_info: Vec<AbsInfoEntry>,
    },
    /// Pauses the stream for `duration` milliseconds.
    Delay { id: u32, duration: u64 },
    /// Injects flattened `(type, code, value)` triples.
    Inject { id: u32, events: Vec<i32> },
    /// Asks the tool to echo `syncToken` once every earlier command ran.
    Sync {
        id: u32,
        #[serde(rename = "syncToken")]
        sync_token: String,
    },
}

impl UinputCommand {
    /// Builds the `register` command for a device created from `kind`.
    pub fn register(id: u32, name: impl Into<String>, vid: u16, pid: u16, kind: DeviceKind) -> Self {
        UinputCommand::Register {
            id,
            name: name.into(),
            vid,
            pid,
            bus: Bus::Usb,
            configuration: kind.configuration(),
            abs_info: kind.abs_info(),
        }
    }

    /// Builds an `inject` command that presses and releases `key_code`.
    pub fn key_tap(id: u32, key_code: i32) -> Self {
        UinputCommand::Inject {
            id,
            events: vec![
                EV_KEY, key_code, 1, EV_SYN, SYN_REPORT, 0, //
                EV_KEY, key_code, 0, EV_SYN, SYN_REPORT, 0,
            ],
        }
    }

    /// The device id this command targets.
    pub fn id(&self) -> u32 {
        match self {
            UinputCommand::Register { id, .. }
            | UinputCommand::Delay { id, .. }
            | UinputCommand::Inject { id, .. }
            | UinputCommand::Sync { id, .. } => *id,
        }
    }
}

/// Serialises `command` as one newline-terminated JSON object.
///
/// # Errors
///
/// Returns [`CommandError::EmptyName`] for a `register` command without a
/// name, or [`CommandError::Encode`] if serialisation fails.
pub fn encode_command(command: &UinputCommand) -> Result<Vec<u8>, CommandError> {
    if let UinputCommand::Register { name, .. } = command {
        if name.trim().is_empty() {
            return Err(CommandError::EmptyName);
        }
    }
    let mut bytes = serde_json::to_vec(command)?;
    bytes.push(b'\n');
    Ok(bytes)
}

// ── Device templates ──────────────────────────────────────────────────────────

/// Ready-made device capability sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    /// Full alphanumeric keyboard with modifiers and arrow keys.
    Keyboard,
    /// Relative pointer with three buttons and a wheel.
    Mouse,
    /// Two-stick gamepad with face buttons.
    Gamepad,
}

const KEYBOARD_EXTRA_KEYS: &[&str] = &[
    "KEY_ENTER",
    "KEY_ESC",
    "KEY_BACKSPACE",
    "KEY_TAB",
    "KEY_SPACE",
    "KEY_LEFTSHIFT",
    "KEY_RIGHTSHIFT",
    "KEY_LEFTCTRL",
    "KEY_RIGHTCTRL",
    "KEY_LEFTALT",
    "KEY_RIGHTALT",
    "KEY_LEFTMETA",
    "KEY_UP",
    "KEY_DOWN",
    "KEY_LEFT",
    "KEY_RIGHT",
];

const GAMEPAD_BUTTONS: &[&str] = &[
    "BTN_A",
    "BTN_B",
    "BTN_X",
    "BTN_Y",
    "BTN_TL",
    "BTN_TR",
    "BTN_SELECT",
    "BTN_START",
    "BTN_MODE",
    "BTN_THUMBL",
    "BTN_THUMBR",
];

/// `ABS_X`, `ABS_Y`, `ABS_RX`, `ABS_RY`.
const GAMEPAD_AXES: &[(u16, &str)] = &[(0x00, "ABS_X"), (0x01, "ABS_Y"), (0x03, "ABS_RX"), (0x04, "ABS_RY")];

impl DeviceKind {
    /// The `configuration` list sent with the `register` command.
    pub fn configuration(self) -> Vec<ConfigurationEntry> {
        match self {
            DeviceKind::Keyboard => {
                let letters = (b'A'..=b'Z').map(|c| format!("KEY_{}", c as char));
                let digits = (0..=9).map(|d| format!("KEY_{d}"));
                let extras = KEYBOARD_EXTRA_KEYS.iter().map(|k| k.to_string());
                vec![
                    ConfigurationEntry::new("UI_SET_EVBIT", ["EV_KEY"]),
                    ConfigurationEntry::new("UI_SET_KEYBIT", letters.chain(digits).chain(extras)),
                ]
            }
            DeviceKind::Mouse => vec![
                ConfigurationEntry::new("UI_SET_EVBIT", ["EV_KEY", "EV_REL"]),
                ConfigurationEntry::new("UI_SET_KEYBIT", ["BTN_LEFT", "BTN_RIGHT", "BTN_MIDDLE"]),
                ConfigurationEntry::new("UI_SET_RELBIT", ["REL_X", "REL_Y", "REL_WHEEL"]),
            ],
            DeviceKind::Gamepad => vec![
                ConfigurationEntry::new("UI_SET_EVBIT", ["EV_KEY", "EV_ABS"]),
                ConfigurationEntry::new("UI_SET_KEYBIT", GAMEPAD_BUTTONS.iter().copied()),
                ConfigurationEntry::new("UI_SET_ABSBIT", GAMEPAD_AXES.iter().map(|(_, name)| *name)),
            ],
        }
    }

    /// Axis ranges for devices with absolute axes; empty otherwise.
    pub fn abs_info(self) -> Vec<AbsInfoEntry> {
        match self {
            DeviceKind::Gamepad => GAMEPAD_AXES
                .iter()
                .map(|(code, _)| AbsInfoEntry {
                    code: *code,
                    info: AbsInfo {
                        value: 0,
                        minimum: -32768,
                        maximum: 32767,
                        fuzz: 16,
                        flat: 128,
                        resolution: 0,
                    },
                })
                .collect(),
            DeviceKind::Keyboard | DeviceKind::Mouse => Vec::new(),
        }
    }
}

impl VirtualDeviceSpec {
    /// Builds a spec whose registration command creates a `kind` device.
    ///
    /// `id` must be unique within the command stream the spec is written to;
    /// see [`DeviceIdAllocator`](crate::DeviceIdAllocator).
    ///
    /// # Errors
    ///
    /// Propagates [`CommandError`] from [`encode_command`].
    pub fn from_template(
        id: u32,
        name: impl Into<String>,
        vendor_id: u16,
        product_id: u16,
        kind: DeviceKind,
    ) -> Result<Self, CommandError> {
        let name = name.into();
        let command = UinputCommand::register(id, name.clone(), vendor_id, product_id, kind);
        let bytes = encode_command(&command)?;
        Ok(VirtualDeviceSpec::new(name, vendor_id, product_id, bytes))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn encode_to_value(command: &UinputCommand) -> Value {
        let bytes = encode_command(command).expect("encode must succeed");
        serde_json::from_slice(&bytes).expect("output must be valid JSON")
    }

    #[test]
    fn test_register_command_uses_uinput_field_names() {
        // Arrange
        let command = UinputCommand::register(1, "kbd1", 0x18d1, 0x0001, DeviceKind::Keyboard);

        // Act
        let value = encode_to_value(&command);

        // Assert
        assert_eq!(value["command"], "register");
        assert_eq!(value["id"], 1);
        assert_eq!(value["name"], "kbd1");
        assert_eq!(value["vid"], 0x18d1);
        assert_eq!(value["pid"], 0x0001);
        assert_eq!(value["bus"], "usb");
        assert_eq!(value["configuration"][0]["type"], "UI_SET_EVBIT");
        assert!(value.get("abs_info").is_none(), "keyboards have no axes");
    }

    #[test]
    fn test_encoded_command_is_newline_terminated() {
        let bytes = encode_command(&UinputCommand::Delay { id: 3, duration: 10 }).unwrap();
        assert_eq!(bytes.last(), Some(&b'\n'));
        assert_eq!(bytes.iter().filter(|b| **b == b'\n').count(), 1);
    }

    #[test]
    fn test_sync_command_uses_camel_case_token_field() {
        let value = encode_to_value(&UinputCommand::Sync {
            id: 2,
            sync_token: "ready".to_string(),
        });
        assert_eq!(value["command"], "sync");
        assert_eq!(value["syncToken"], "ready");
    }

    #[test]
    fn test_register_with_empty_name_is_rejected() {
        let command = UinputCommand::register(1, "  ", 1, 1, DeviceKind::Mouse);
        assert!(matches!(encode_command(&command), Err(CommandError::EmptyName)));
    }

    #[test]
    fn test_keyboard_template_declares_letters_and_digits() {
        // Act
        let config = DeviceKind::Keyboard.configuration();

        // Assert
        let keys = &config[1].data;
        assert!(keys.contains(&"KEY_A".to_string()));
        assert!(keys.contains(&"KEY_Z".to_string()));
        assert!(keys.contains(&"KEY_0".to_string()));
        assert!(keys.contains(&"KEY_ENTER".to_string()));
    }

    #[test]
    fn test_gamepad_template_carries_abs_info_for_each_axis() {
        let command = UinputCommand::register(4, "pad", 0x045e, 0x028e, DeviceKind::Gamepad);
        let value = encode_to_value(&command);

        let abs = value["abs_info"].as_array().expect("gamepad must carry abs_info");
        assert_eq!(abs.len(), 4);
        assert_eq!(abs[0]["info"]["maximum"], 32767);
    }

    #[test]
    fn test_key_tap_emits_press_release_with_sync() {
        let UinputCommand::Inject { events, .. } = UinputCommand::key_tap(1, 30) else {
            panic!("key_tap must build an inject command");
        };
        assert_eq!(events, vec![1, 30, 1, 0, 0, 0, 1, 30, 0, 0, 0, 0]);
    }

    #[test]
    fn test_from_template_spec_command_decodes_back_to_register() {
        // Arrange / Act
        let spec = VirtualDeviceSpec::from_template(9, "mouse1", 2, 3, DeviceKind::Mouse).unwrap();
        let decoded: UinputCommand =
            serde_json::from_slice(spec.registration_command()).expect("decode");

        // Assert
        assert_eq!(decoded.id(), 9);
        assert_eq!(spec.name(), "mouse1");
        assert_eq!(spec.vendor_id(), 2);
        assert_eq!(spec.product_id(), 3);
    }
}
