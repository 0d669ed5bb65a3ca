//! uinput command stream backed by a child process.
//!
//! # Why a child process? (for beginners)
//!
//! On Android the only unprivileged way to reach `/dev/uinput` is the
//! `uinput` shell tool, which reads JSON commands from stdin and keeps every
//! device it created alive until its stdin is closed.  From a host this is
//! reached with `adb shell uinput -`; on a device or a Linux box with a
//! compatible tool, the program can be invoked directly.
//!
//! The process therefore *is* the session: it is spawned on the first
//! registration, every registration command goes to its stdin, and closing
//! it removes all devices it created.
//!
//! # Pipes
//!
//! stdout and stderr are drained by background threads.  Nothing is parsed
//! from them, but an undrained pipe would eventually block the tool once the
//! OS pipe buffer fills.

use std::io::{BufRead, BufReader, Read, Write};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::application::register_device::{DeviceTransport, TransportConnector, TransportError};
use crate::infrastructure::storage::config::TransportConfig;

/// How long a closed tool gets to exit on its own before it is killed.
const EXIT_GRACE: Duration = Duration::from_millis(500);

/// Spawns the uinput tool on demand.
#[derive(Debug, Clone)]
pub struct ShellTransportConnector {
    program: String,
    args: Vec<String>,
}

impl ShellTransportConnector {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Builds the connector for `[transport]`, e.g. `adb -s <serial> shell uinput -`.
    pub fn from_config(config: &TransportConfig) -> Self {
        let (program, args) = config.command_line();
        Self::new(program, args)
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

impl TransportConnector for ShellTransportConnector {
    fn open(&self) -> Result<Box<dyn DeviceTransport>, TransportError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| TransportError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let stdin = child.stdin.take();
        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(spawn_drain("stdout", stdout));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(spawn_drain("stderr", stderr));
        }

        debug!(program = %self.program, args = ?self.args, pid = child.id(), "spawned uinput tool");
        Ok(Box::new(ShellTransport {
            child,
            stdin,
            readers,
        }))
    }
}

fn spawn_drain<R: Read + Send + 'static>(stream: &'static str, pipe: R) -> JoinHandle<()> {
    thread::spawn(move || {
        for line in BufReader::new(pipe).lines() {
            match line {
                Ok(line) if line.trim().is_empty() => {}
                Ok(line) if stream == "stderr" => warn!(stream, line = %line, "uinput tool output"),
                Ok(line) => debug!(stream, line = %line, "uinput tool output"),
                Err(_) => break,
            }
        }
    })
}

/// A running uinput tool.
pub struct ShellTransport {
    child: Child,
    stdin: Option<ChildStdin>,
    readers: Vec<JoinHandle<()>>,
}

impl ShellTransport {
    /// Waits up to `grace` for the child to exit, then kills it.
    fn wait_or_kill(&mut self, grace: Duration) -> Result<(), TransportError> {
        let start = Instant::now();
        loop {
            match self.child.try_wait()? {
                Some(status) => {
                    debug!(exit_code = ?status.code(), "uinput tool exited");
                    return Ok(());
                }
                None if start.elapsed() >= grace => break,
                None => thread::sleep(Duration::from_millis(20)),
            }
        }
        self.child.kill()?;
        self.child.wait()?;
        Ok(())
    }
}

impl DeviceTransport for ShellTransport {
    fn write_command(&mut self, command: &[u8]) -> Result<(), TransportError> {
        let stdin = self.stdin.as_mut().ok_or(TransportError::Closed)?;
        stdin.write_all(command)?;
        stdin.flush()?;
        Ok(())
    }

    fn close(&mut self) -> Result<(), TransportError> {
        let Some(mut stdin) = self.stdin.take() else {
            return Err(TransportError::Closed);
        };

        let mut first_error = stdin.flush().err().map(TransportError::from);
        // EOF on stdin asks the tool to tear its devices down.
        drop(stdin);

        if let Err(e) = self.wait_or_kill(EXIT_GRACE) {
            first_error.get_or_insert(e);
        }
        for reader in self.readers.drain(..) {
            if reader.join().is_err() {
                first_error.get_or_insert(TransportError::Platform(
                    "output drain thread panicked".to_string(),
                ));
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Drop for ShellTransport {
    fn drop(&mut self) {
        if self.stdin.is_some() {
            let _ = self.close();
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connector_from_config_targets_serial() {
        let config = TransportConfig {
            serial: Some("emulator-5554".to_string()),
            ..TransportConfig::default()
        };

        let connector = ShellTransportConnector::from_config(&config);

        assert_eq!(connector.program(), "adb");
        assert_eq!(connector.args(), ["-s", "emulator-5554", "shell", "uinput", "-"]);
    }

    #[test]
    fn test_open_missing_program_returns_spawn_error() {
        // Arrange
        let connector = ShellTransportConnector::new("/nonexistent/uinput-tool", Vec::new());

        // Act
        let result = connector.open();

        // Assert
        assert!(matches!(result, Err(TransportError::Spawn { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn test_write_then_close_against_cat() {
        // Arrange – `cat` echoes commands to stdout and exits on EOF, like the tool
        let connector = ShellTransportConnector::new("cat", Vec::new());
        let mut transport = connector.open().expect("cat must spawn");

        // Act
        transport.write_command(b"{\"command\":\"delay\",\"id\":1,\"duration\":1}\n").unwrap();
        let closed = transport.close();

        // Assert
        assert!(closed.is_ok(), "close failed: {closed:?}");
        assert!(matches!(
            transport.write_command(b"late"),
            Err(TransportError::Closed)
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_close_kills_tool_that_ignores_eof() {
        // Arrange – a tool that keeps running after stdin closes
        let connector =
            ShellTransportConnector::new("sh", vec!["-c".to_string(), "exec sleep 30".to_string()]);
        let mut transport = connector.open().expect("sh must spawn");

        // Act
        let start = Instant::now();
        let closed = transport.close();

        // Assert
        assert!(closed.is_ok(), "close failed: {closed:?}");
        assert!(start.elapsed() < Duration::from_secs(5));
    }
}
