// src/config.rs

//! Client configuration: loading from TOML, defaults and validation.

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;
use tracing::warn;

/// The queueing policy consulted by the connection controller at every
/// decision point. Can be swapped at runtime with `Client::set_options`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueOptions {
    /// On disconnect, move commands that were written but never answered back
    /// into the offline queue and send them again once reconnected. When false
    /// they fail with `ConnectionClosed`.
    #[serde(default = "default_true")]
    pub auto_resend_unfulfilled_commands: bool,
    /// Queue commands submitted while no connection is ready. When false such
    /// commands fail immediately with `QueueRejected`.
    #[serde(default = "default_true")]
    pub enable_offline_queue: bool,
    /// Maximum number of commands held in the offline queue. `0` disables the limit.
    #[serde(default)]
    pub offline_queue_limit: usize,
}

impl Default for QueueOptions {
    fn default() -> Self {
        Self {
            auto_resend_unfulfilled_commands: true,
            enable_offline_queue: true,
            offline_queue_limit: 0,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Reconnection backoff settings.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt; doubles on every failure.
    #[serde(default = "default_initial_delay", with = "humantime_serde")]
    pub initial_delay: Duration,
    /// Upper bound for the backoff delay.
    #[serde(default = "default_max_delay", with = "humantime_serde")]
    pub max_delay: Duration,
    /// A random delay in `0..jitter` is added to every attempt.
    #[serde(default = "default_jitter", with = "humantime_serde")]
    pub jitter: Duration,
    /// Consecutive failed attempts after which the client gives up and closes.
    /// Unset retries forever.
    #[serde(default)]
    pub max_attempts: Option<u32>,
}

fn default_initial_delay() -> Duration {
    Duration::from_millis(100)
}
fn default_max_delay() -> Duration {
    Duration::from_secs(30)
}
fn default_jitter() -> Duration {
    Duration::from_millis(100)
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            jitter: default_jitter(),
            max_attempts: None,
        }
    }
}

/// The complete client configuration.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_connect_timeout", with = "humantime_serde")]
    pub connect_timeout: Duration,
    #[serde(flatten)]
    pub queue: QueueOptions,
    #[serde(default)]
    pub reconnect: ReconnectConfig,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    7878
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_connect_timeout() -> Duration {
    Duration::from_secs(2)
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
            connect_timeout: default_connect_timeout(),
            queue: QueueOptions::default(),
            reconnect: ReconnectConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Creates a config for the given address with every other setting at its default.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    /// Reads and validates a TOML config file.
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file at '{path}'"))?;
        Self::from_toml(&contents).with_context(|| format!("Invalid config in '{path}'"))
    }

    /// Parses and validates a TOML document.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: ClientConfig =
            toml::from_str(contents).context("Failed to parse client config TOML")?;
        config.validate()?;
        Ok(config)
    }

    /// The `host:port` string the TCP connector dials.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Validates the configuration for logical consistency.
    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            return Err(anyhow!("port cannot be 0"));
        }
        if self.host.trim().is_empty() {
            return Err(anyhow!("host cannot be empty"));
        }
        if self.connect_timeout.is_zero() {
            return Err(anyhow!("connect_timeout cannot be 0"));
        }
        if self.reconnect.initial_delay > self.reconnect.max_delay {
            return Err(anyhow!(
                "reconnect.initial_delay ({:?}) cannot exceed reconnect.max_delay ({:?})",
                self.reconnect.initial_delay,
                self.reconnect.max_delay
            ));
        }
        if self.reconnect.max_attempts == Some(0) {
            return Err(anyhow!(
                "reconnect.max_attempts cannot be 0; leave it unset to retry forever"
            ));
        }
        if !self.queue.enable_offline_queue && !self.queue.auto_resend_unfulfilled_commands {
            warn!(
                "offline queue and resend are both disabled: commands issued during an outage fail immediately"
            );
        }
        Ok(())
    }
}
