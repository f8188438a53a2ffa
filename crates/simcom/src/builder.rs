//! ModemBuilder -- fluent builder for constructing [`Modem`] instances.
//!
//! Separates configuration from construction so that callers can set up
//! serial port parameters, line terminators and timeout values before the
//! transport is opened and the IO task spawned.
//!
//! # Example
//!
//! ```no_run
//! use simcom::ModemBuilder;
//! use std::time::Duration;
//!
//! # async fn example() -> simcom::Result<()> {
//! let modem = ModemBuilder::new()
//!     .serial_port("/dev/ttyUSB0")
//!     .baud_rate(115_200)
//!     .default_timeout(Duration::from_secs(10))
//!     .build()
//!     .await?;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use simcom_at::IoConfig;
use simcom_core::error::{Error, Result};
use simcom_core::events::ModemEvent;
use simcom_core::transport::Transport;
use simcom_core::types::{Command, TokenSet};
use simcom_transport::DEFAULT_BAUD_RATE;

use crate::modem::Modem;

/// Capacity of the event channel created when the caller supplies none.
const EVENT_CAPACITY: usize = 256;

/// Engine and link settings for one modem.
#[derive(Debug, Clone)]
pub struct ModemConfig {
    /// Terminator the module ends its lines with (default `"\r\n"`).
    pub line_end: String,
    /// Terminator appended to every command (default `"\r"`).
    pub command_end: String,
    /// Serial baud rate (default 115200).
    pub baud_rate: u32,
    /// Timeout for commands that carry none (default 5 s).
    pub default_timeout: Duration,
    /// Cap on lines a token-framed exchange may buffer (default 15).
    pub max_response_lines: usize,
    /// Window after a timeout in which late lines are swallowed (default 250 ms).
    pub timeout_grace: Duration,
    /// Bare write prompt sent without a terminator (default `"> "`).
    pub prompt: String,
    /// Whether the module echoes commands (default on, as after power-up).
    pub echo: bool,
    /// Line prefixes reported as [`ModemEvent::Notification`].
    pub notification_prefixes: Vec<String>,
}

impl Default for ModemConfig {
    fn default() -> Self {
        let io = IoConfig::default();
        ModemConfig {
            line_end: io.line_end,
            command_end: io.command_end,
            baud_rate: DEFAULT_BAUD_RATE,
            default_timeout: io.default_timeout,
            max_response_lines: io.max_response_lines,
            timeout_grace: io.timeout_grace,
            prompt: io.prompt,
            echo: io.echo,
            notification_prefixes: io.notification_prefixes,
        }
    }
}

impl ModemConfig {
    /// The IO task's share of the configuration.
    pub fn io_config(&self) -> IoConfig {
        IoConfig {
            line_end: self.line_end.clone(),
            command_end: self.command_end.clone(),
            prompt: self.prompt.clone(),
            default_timeout: self.default_timeout,
            max_response_lines: self.max_response_lines,
            timeout_grace: self.timeout_grace,
            echo: self.echo,
            notification_prefixes: self.notification_prefixes.clone(),
        }
    }
}

/// The `AT` probe sent when a modem is opened.
///
/// Soft-matched so an echo mangled by a module waking from sleep (`"\0AT"`)
/// still starts the exchange.
pub fn probe_command(timeout: Duration) -> Command {
    Command::new("AT")
        .timeout(timeout)
        .tokens(TokenSet::new(["AT", "\u{0}AT", "OK"], ["OK"]).soft())
}

/// Fluent builder for [`Modem`].
///
/// Every setting has a default, so the simplest usage is:
///
/// ```ignore
/// let modem = ModemBuilder::new()
///     .serial_port("/dev/ttyUSB0")
///     .build()
///     .await?;
/// ```
pub struct ModemBuilder {
    config: ModemConfig,
    serial_port: Option<String>,
    device: Option<String>,
    probe_on_open: bool,
    probe_timeout: Duration,
    event_tx: Option<broadcast::Sender<ModemEvent>>,
}

impl ModemBuilder {
    pub fn new() -> Self {
        ModemBuilder {
            config: ModemConfig::default(),
            serial_port: None,
            device: None,
            probe_on_open: true,
            probe_timeout: Duration::from_secs(2),
            event_tx: None,
        }
    }

    /// Start from a complete configuration.
    pub fn with_config(config: ModemConfig) -> Self {
        ModemBuilder {
            config,
            ..Self::new()
        }
    }

    /// Set the serial port path (e.g. `/dev/ttyUSB0` or `COM3`).
    pub fn serial_port(mut self, port: &str) -> Self {
        self.serial_port = Some(port.to_string());
        self
    }

    pub fn baud_rate(mut self, baud: u32) -> Self {
        self.config.baud_rate = baud;
        self
    }

    pub fn line_end(mut self, line_end: &str) -> Self {
        self.config.line_end = line_end.to_string();
        self
    }

    pub fn command_end(mut self, command_end: &str) -> Self {
        self.config.command_end = command_end.to_string();
        self
    }

    pub fn prompt(mut self, prompt: &str) -> Self {
        self.config.prompt = prompt.to_string();
        self
    }

    /// Timeout for commands that do not set their own (default: 5s).
    pub fn default_timeout(mut self, timeout: Duration) -> Self {
        self.config.default_timeout = timeout;
        self
    }

    pub fn max_response_lines(mut self, n: usize) -> Self {
        self.config.max_response_lines = n;
        self
    }

    /// How long late lines of a timed-out command are discarded before the
    /// next command is written (default: 250ms). Zero disables the window.
    pub fn timeout_grace(mut self, grace: Duration) -> Self {
        self.config.timeout_grace = grace;
        self
    }

    /// Name the modem is known by. Defaults to the serial port path.
    pub fn device(mut self, name: &str) -> Self {
        self.device = Some(name.to_string());
        self
    }

    /// Send an `AT` probe after opening and fail the build if it goes
    /// unanswered (default: enabled).
    pub fn probe_on_open(mut self, enabled: bool) -> Self {
        self.probe_on_open = enabled;
        self
    }

    pub fn probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Whether the module echoes commands when opened. Leave on unless the
    /// module's stored profile has `ATE0`; executing `ATE0`/`ATE1` later
    /// is tracked automatically.
    pub fn echo(mut self, echo: bool) -> Self {
        self.config.echo = echo;
        self
    }

    /// Report lines starting with `prefix` as [`ModemEvent::Notification`].
    ///
    /// Matching lines are claimed before any exchange sees them, so they
    /// never appear in a response. Built-in notifications take precedence.
    pub fn urc_prefix(mut self, prefix: &str) -> Self {
        self.config.notification_prefixes.push(prefix.to_string());
        self
    }

    /// Publish events on an existing channel, so subscribers created before
    /// the build see [`ModemEvent::Opened`].
    pub fn events(mut self, event_tx: broadcast::Sender<ModemEvent>) -> Self {
        self.event_tx = Some(event_tx);
        self
    }

    /// The device name the built modem will carry.
    pub fn device_name(&self) -> Option<&str> {
        self.device.as_deref().or(self.serial_port.as_deref())
    }

    pub fn config(&self) -> &ModemConfig {
        &self.config
    }

    /// Build a [`Modem`] with a caller-provided transport.
    ///
    /// This is the primary entry point for testing (pass a
    /// `MockTransport` from `simcom-test-harness`).
    pub async fn build_with_transport(self, transport: Box<dyn Transport>) -> Result<Modem> {
        if self.config.command_end.is_empty() {
            return Err(Error::InvalidParameter("command_end must not be empty".into()));
        }
        if self.config.max_response_lines == 0 {
            return Err(Error::InvalidParameter(
                "max_response_lines must be at least 1".into(),
            ));
        }

        let device = self.device_name().unwrap_or("modem").to_string();
        let event_tx = self
            .event_tx
            .unwrap_or_else(|| broadcast::channel(EVENT_CAPACITY).0);
        let io = simcom_at::spawn_io_task(transport, self.config.io_config(), event_tx.clone());
        let modem = Modem::new(io, event_tx.clone(), device, self.config);

        if self.probe_on_open {
            debug!(device = modem.device(), "probing modem");
            if let Err(e) = modem.execute(probe_command(self.probe_timeout)).await {
                warn!(device = modem.device(), error = %e, "modem did not answer probe");
                let _ = event_tx.send(ModemEvent::Error {
                    message: e.to_string(),
                });
                let _ = modem.close().await;
                return Err(e);
            }
        }

        info!(device = modem.device(), "modem opened");
        let _ = event_tx.send(ModemEvent::Opened);
        Ok(modem)
    }

    /// Build a [`Modem`] using a serial transport.
    ///
    /// Requires that [`serial_port()`](Self::serial_port) has been called.
    pub async fn build(self) -> Result<Modem> {
        let port = self
            .serial_port
            .as_ref()
            .ok_or_else(|| Error::InvalidParameter("serial_port is required for build()".into()))?;

        let transport = simcom_transport::SerialTransport::open(port, self.config.baud_rate).await?;
        self.build_with_transport(Box::new(transport)).await
    }
}

impl Default for ModemBuilder {
    fn default() -> Self {
        Self::new()
    }
}
