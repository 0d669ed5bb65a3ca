//! Protocol module: the uinput JSON command stream and device id allocation.

pub mod command;
pub mod ids;

pub use command::{
    encode_command, AbsInfo, AbsInfoEntry, Bus, CommandError, ConfigurationEntry, DeviceKind,
    UinputCommand,
};
pub use ids::DeviceIdAllocator;
