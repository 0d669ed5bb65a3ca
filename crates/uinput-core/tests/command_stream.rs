//! Integration tests for the uinput-core public API.
//!
//! These tests build specs the way the harness binary does (one allocator per
//! session, one template per device) and check that the resulting command
//! stream is something the uinput tool can consume.

use uinput_core::{
    encode_command, DeviceIdAllocator, DeviceIdentity, DeviceKind, UinputCommand,
    VirtualDeviceSpec,
};

#[test]
fn test_session_specs_get_distinct_stream_ids() {
    // Arrange
    let ids = DeviceIdAllocator::new();

    // Act
    let kbd = VirtualDeviceSpec::from_template(ids.next(), "kbd1", 1, 1, DeviceKind::Keyboard)
        .expect("keyboard spec");
    let mouse = VirtualDeviceSpec::from_template(ids.next(), "mouse1", 1, 2, DeviceKind::Mouse)
        .expect("mouse spec");

    // Assert
    let kbd_cmd: UinputCommand = serde_json::from_slice(kbd.registration_command()).unwrap();
    let mouse_cmd: UinputCommand = serde_json::from_slice(mouse.registration_command()).unwrap();
    assert_eq!(kbd_cmd.id(), 1);
    assert_eq!(mouse_cmd.id(), 2);
}

#[test]
fn test_concatenated_commands_parse_as_json_stream() {
    // Arrange – a register followed by a key tap, as written to one stdin
    let mut stream = Vec::new();
    stream.extend(
        encode_command(&UinputCommand::register(1, "kbd1", 1, 1, DeviceKind::Keyboard)).unwrap(),
    );
    stream.extend(encode_command(&UinputCommand::key_tap(1, 30)).unwrap());

    // Act
    let commands: Vec<UinputCommand> = serde_json::Deserializer::from_slice(&stream)
        .into_iter::<UinputCommand>()
        .collect::<Result<_, _>>()
        .expect("stream must parse");

    // Assert
    assert_eq!(commands.len(), 2);
    assert!(matches!(commands[0], UinputCommand::Register { .. }));
    assert!(matches!(commands[1], UinputCommand::Inject { .. }));
}

#[test]
fn test_template_spec_matches_only_its_own_identity() {
    let spec = VirtualDeviceSpec::from_template(1, "kbd1", 0x18d1, 0x0001, DeviceKind::Keyboard)
        .unwrap();

    assert!(spec.matches(&DeviceIdentity::new("kbd1", 0x18d1, 0x0001)));
    assert!(!spec.matches(&DeviceIdentity::new("kbd1", 0x18d1, 0x0002)));
}
