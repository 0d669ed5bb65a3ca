//! uinput-harness command-line entry point.
//!
//! Wires the configured transport and device monitor into a
//! [`DeviceRegistrationCoordinator`] and runs one of three subcommands:
//!
//! - `register`     – register every `[[devices]]` entry and wait for each to
//!   appear; with `--hold` the devices stay alive until Ctrl+C.
//! - `list-devices` – print the current input-device snapshot.
//! - `init-config`  – write a starter config file.
//!
//! # Blocking calls inside Tokio (for beginners)
//!
//! `DeviceRegistrationCoordinator::register` blocks its thread on a condition
//! variable until the device shows up.  Calling it directly inside an async
//! function would stall a Tokio worker, so it runs on the blocking pool via
//! `tokio::task::spawn_blocking`.  Meanwhile the async side listens for
//! Ctrl+C and, if it fires, calls `stop()`, which wakes the blocked
//! registration with `SessionStopped`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use uinput_core::{DeviceHandle, DeviceIdAllocator, VirtualDeviceSpec};
use uinput_harness::application::{
    DeviceEventSource, DeviceRegistrationCoordinator, RegistrationError, TransportConnector,
};
use uinput_harness::infrastructure::event_source::monitor::InputDeviceMonitor;
use uinput_harness::infrastructure::event_source::proc_devices::{
    AdbProcListing, DeviceListing, LocalProcListing,
};
use uinput_harness::infrastructure::storage::config::{
    self, HarnessConfig, MonitorConfig, MonitorSource,
};
use uinput_harness::infrastructure::transport::shell::ShellTransportConnector;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Registers virtual uinput devices and waits for the OS to report them.
#[derive(Debug, Parser)]
#[command(name = "uinput-harness", version)]
struct Cli {
    /// Config file to use instead of the platform default.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Target device serial; overrides `[transport] serial`.
    #[arg(long, global = true, env = "ANDROID_SERIAL")]
    serial: Option<String>,

    /// Per-device registration timeout; overrides
    /// `[harness] registration_timeout_secs`.
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Register every configured device.
    Register {
        /// Keep the devices alive until Ctrl+C.
        #[arg(long)]
        hold: bool,
    },
    /// Print the input devices currently known to the monitor.
    ListDevices,
    /// Write a starter config file.
    InitConfig {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

impl Cli {
    /// Loads the config file and applies command-line overrides.
    fn load_config(&self) -> anyhow::Result<HarnessConfig> {
        let mut cfg = match &self.config {
            Some(path) => config::load_config_from(path)
                .with_context(|| format!("loading config from {}", path.display()))?,
            None => config::load_config().context("loading config")?,
        };
        if let Some(serial) = &self.serial {
            cfg.transport.serial = Some(serial.clone());
        }
        if let Some(secs) = self.timeout_secs {
            cfg.harness.registration_timeout_secs = secs;
        }
        Ok(cfg)
    }

    fn config_path(&self) -> anyhow::Result<PathBuf> {
        match &self.config {
            Some(path) => Ok(path.clone()),
            None => Ok(config::config_file_path()?),
        }
    }
}

// ── Wiring ────────────────────────────────────────────────────────────────────

fn build_listing(monitor: &MonitorConfig, serial: Option<&str>) -> Arc<dyn DeviceListing> {
    match monitor.source {
        MonitorSource::Adb => Arc::new(AdbProcListing::new(
            monitor.adb_program.clone(),
            serial.map(str::to_string),
        )),
        MonitorSource::Local => Arc::new(LocalProcListing::new(monitor.path.clone())),
    }
}

fn build_coordinator(cfg: &HarnessConfig) -> DeviceRegistrationCoordinator {
    let listing = build_listing(&cfg.monitor, cfg.monitor_serial());
    let events: Arc<dyn DeviceEventSource> =
        Arc::new(InputDeviceMonitor::new(listing, cfg.monitor.poll_interval()));
    let connector: Arc<dyn TransportConnector> =
        Arc::new(ShellTransportConnector::from_config(&cfg.transport));
    DeviceRegistrationCoordinator::new(events, connector)
}

/// Registers `specs` one after another; stops at the first failure.
fn register_all(
    coordinator: &DeviceRegistrationCoordinator,
    specs: &[VirtualDeviceSpec],
    timeout: Duration,
) -> Result<Vec<(String, DeviceHandle)>, RegistrationError> {
    let mut registered = Vec::with_capacity(specs.len());
    for spec in specs {
        coordinator.register(spec, timeout)?;
        let handle = coordinator
            .active_handles()
            .into_iter()
            .find(|h| coordinator.active_device(*h).as_ref() == Some(spec));
        // A Removed event may already have dropped the device again.
        if let Some(handle) = handle {
            registered.push((spec.name().to_string(), handle));
        }
    }
    Ok(registered)
}

// ── Subcommands ───────────────────────────────────────────────────────────────

async fn run_register(cfg: HarnessConfig, hold: bool) -> anyhow::Result<()> {
    if cfg.devices.is_empty() {
        bail!("no [[devices]] configured; run `uinput-harness init-config` for an example");
    }

    let ids = DeviceIdAllocator::new();
    let specs = cfg
        .devices
        .iter()
        .map(|entry| entry.to_spec(ids.next()))
        .collect::<Result<Vec<_>, _>>()
        .context("building device registration commands")?;

    let coordinator = Arc::new(build_coordinator(&cfg));
    coordinator.start().context("starting device monitor")?;
    info!(session = %coordinator.session_id(), devices = specs.len(), "registering devices");

    let timeout = cfg.harness.registration_timeout();
    let worker = Arc::clone(&coordinator);
    let mut task = tokio::task::spawn_blocking(move || register_all(&worker, &specs, timeout));

    let outcome = tokio::select! {
        joined = &mut task => joined.context("registration task panicked")?,
        _ = tokio::signal::ctrl_c() => {
            info!("received Ctrl+C; stopping session");
            let stopper = Arc::clone(&coordinator);
            tokio::task::spawn_blocking(move || stopper.stop()).await?;
            task.await.context("registration task panicked")?
        }
    };

    let registered = match outcome {
        Ok(registered) => registered,
        Err(e) => {
            let stopper = Arc::clone(&coordinator);
            tokio::task::spawn_blocking(move || stopper.stop()).await?;
            return Err(e).context("device registration failed");
        }
    };

    for (name, handle) in &registered {
        println!("{handle}\t{name}");
    }

    if hold && coordinator.is_started() {
        info!("devices registered; holding until Ctrl+C");
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl+C; releasing devices now");
        }
    }

    let stopper = Arc::clone(&coordinator);
    tokio::task::spawn_blocking(move || stopper.stop()).await?;
    Ok(())
}

async fn run_list_devices(cfg: HarnessConfig) -> anyhow::Result<()> {
    let listing = build_listing(&cfg.monitor, cfg.monitor_serial());
    let monitor = InputDeviceMonitor::new(listing, cfg.monitor.poll_interval());
    let snapshot = tokio::task::spawn_blocking(move || monitor.snapshot())
        .await?
        .context("reading input device listing")?;

    for (handle, identity) in &snapshot {
        println!("{handle}\t{identity}");
    }
    Ok(())
}

fn run_init_config(path: PathBuf, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        bail!("{} already exists; pass --force to overwrite", path.display());
    }
    config::save_config_to(&HarnessConfig::example(), &path)
        .with_context(|| format!("writing {}", path.display()))?;
    println!("wrote {}", path.display());
    Ok(())
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = cli.load_config()?;

    // `RUST_LOG` wins; otherwise the config file's level applies.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&cfg.harness.log_level)),
        )
        .init();

    match &cli.command {
        Command::Register { hold } => run_register(cfg, *hold).await,
        Command::ListDevices => run_list_devices(cfg).await,
        Command::InitConfig { force } => run_init_config(cli.config_path()?, *force),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_register_with_overrides() {
        // Arrange / Act
        let cli = Cli::parse_from([
            "uinput-harness",
            "register",
            "--hold",
            "--serial",
            "emulator-5554",
            "--timeout-secs",
            "3",
        ]);

        // Assert
        assert!(matches!(cli.command, Command::Register { hold: true }));
        assert_eq!(cli.serial.as_deref(), Some("emulator-5554"));
        assert_eq!(cli.timeout_secs, Some(3));
    }

    #[test]
    fn test_overrides_replace_config_values() {
        // Arrange
        let cli = Cli::parse_from([
            "uinput-harness",
            "--config",
            "/nonexistent/uinput-harness.toml",
            "--serial",
            "R58M",
            "--timeout-secs",
            "7",
            "list-devices",
        ]);

        // Act
        let cfg = cli.load_config().expect("missing file yields defaults");

        // Assert
        assert_eq!(cfg.transport.serial.as_deref(), Some("R58M"));
        assert_eq!(cfg.harness.registration_timeout(), Duration::from_secs(7));
    }

    #[test]
    fn test_cli_requires_a_subcommand() {
        assert!(Cli::try_parse_from(["uinput-harness"]).is_err());
    }
}
