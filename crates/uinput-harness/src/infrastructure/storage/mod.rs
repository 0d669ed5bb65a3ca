//! Storage infrastructure: configuration file persistence.
//!
//! The `config` sub-module reads the harness TOML file from the
//! platform-appropriate directory, fills in defaults for anything missing, and
//! writes a starter file for `uinput-harness init-config`.

pub mod config;
