//! Configuration for the babble server.
//!
//! Values are layered, later layers winning:
//!
//! 1. built-in defaults
//! 2. an optional TOML file (`-c/--config`)
//! 3. environment variables:
//!    - `BABBLE_BIND_ADDR`       (default: "0.0.0.0")
//!    - `BABBLE_PORT`            (default: "5656")
//!    - `BABBLE_MAX_CLIENTS`     (default: "1000")
//!    - `BABBLE_QUEUE_CAPACITY`  (default: "16")
//!    - `BABBLE_QUEUE_COUNT`     (default: "1")
//!    - `BABBLE_WORKERS`         (default: "4")
//!    - `BABBLE_TIMELINE_MAX`    (default: "4")
//!    - `BABBLE_RANDOM_DELAY`    (default: "false")
//!    - `BABBLE_MAX_DELAY_US`    (default: "10000")
//!    - `BABBLE_MAX_FRAME_LEN`   (default: "4096")
//! 4. command-line flags

use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use serde::Deserialize;
use thiserror::Error;

/// Server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// IP address / interface to bind to (e.g. "0.0.0.0" or "127.0.0.1").
    pub bind_addr: String,

    /// TCP port to listen on.
    pub port: u16,

    /// Maximum number of simultaneously registered clients.
    pub max_clients: usize,

    /// Capacity of each command queue.
    pub queue_capacity: usize,

    /// Number of command queues; a client always uses the same one.
    pub queue_count: usize,

    /// Number of worker tasks draining the queues.
    pub worker_count: usize,

    /// Publications kept per timeline.
    pub timeline_capacity: usize,

    /// Sleep a random time before PUBLISH / FOLLOW / TIMELINE.
    pub random_delay: bool,

    /// Upper bound of the random delay, in microseconds.
    pub max_delay_us: u64,

    /// Largest frame payload accepted from a client.
    pub max_frame_len: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bind_addr: "0.0.0.0".to_string(),
            port: 5656,
            max_clients: 1000,
            queue_capacity: 16,
            queue_count: 1,
            worker_count: 4,
            timeline_capacity: 4,
            random_delay: false,
            max_delay_us: 10_000,
            max_frame_len: 4096,
        }
    }
}

/// Invalid combination of settings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("worker_count ({workers}) must be at least queue_count ({queues})")]
    TooFewWorkers { workers: usize, queues: usize },
}

/// Command-line flags. Every flag is optional and overrides the
/// file / environment layers when present.
#[derive(Debug, Default, Parser)]
#[command(name = "babble-server", version, about = "babble messaging server")]
pub struct Cli {
    /// TOML configuration file.
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Port to listen on.
    #[arg(short = 'p', long)]
    pub port: Option<u16>,

    /// Activate random processing delays.
    #[arg(short = 'r', long)]
    pub random_delay: bool,

    #[arg(long)]
    pub bind_addr: Option<String>,

    #[arg(long)]
    pub max_clients: Option<usize>,

    #[arg(long)]
    pub queue_capacity: Option<usize>,

    #[arg(long)]
    pub queue_count: Option<usize>,

    #[arg(short = 'w', long)]
    pub workers: Option<usize>,

    #[arg(long)]
    pub timeline_capacity: Option<usize>,

    #[arg(long)]
    pub max_delay_us: Option<u64>,

    #[arg(long)]
    pub max_frame_len: Option<usize>,
}

impl Config {
    /// Defaults overridden by environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        let mut config = Config::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Parse a TOML document; missing keys keep their defaults.
    pub fn from_toml_str(text: &str) -> anyhow::Result<Self> {
        toml::from_str(text).context("invalid configuration file")
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read {}", path.display()))?;
        Self::from_toml_str(&text)
    }

    /// Build the full configuration for the binary: file, env, then flags.
    pub fn load(cli: &Cli) -> anyhow::Result<Self> {
        let mut config = match &cli.config {
            Some(path) => Self::from_file(path)?,
            None => Config::default(),
        };
        config.apply_env()?;
        config.apply_cli(cli);
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("max_clients", self.max_clients),
            ("queue_capacity", self.queue_capacity),
            ("queue_count", self.queue_count),
            ("worker_count", self.worker_count),
            ("max_frame_len", self.max_frame_len),
        ];
        if let Some((name, _)) = positive.into_iter().find(|(_, v)| *v == 0) {
            return Err(ConfigError::Zero(name));
        }
        if self.worker_count < self.queue_count {
            return Err(ConfigError::TooFewWorkers {
                workers: self.worker_count,
                queues: self.queue_count,
            });
        }
        Ok(())
    }

    /// Convenience: `addr:port` socket string.
    pub fn socket_addr_string(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }

    /// Upper bound of the artificial delay, if enabled.
    pub fn max_delay(&self) -> Option<Duration> {
        if self.random_delay && self.max_delay_us > 0 {
            Some(Duration::from_micros(self.max_delay_us))
        } else {
            None
        }
    }

    fn apply_env(&mut self) -> anyhow::Result<()> {
        if let Ok(addr) = env::var("BABBLE_BIND_ADDR") {
            self.bind_addr = addr;
        }
        override_from_env("BABBLE_PORT", &mut self.port)?;
        override_from_env("BABBLE_MAX_CLIENTS", &mut self.max_clients)?;
        override_from_env("BABBLE_QUEUE_CAPACITY", &mut self.queue_capacity)?;
        override_from_env("BABBLE_QUEUE_COUNT", &mut self.queue_count)?;
        override_from_env("BABBLE_WORKERS", &mut self.worker_count)?;
        override_from_env("BABBLE_TIMELINE_MAX", &mut self.timeline_capacity)?;
        override_from_env("BABBLE_RANDOM_DELAY", &mut self.random_delay)?;
        override_from_env("BABBLE_MAX_DELAY_US", &mut self.max_delay_us)?;
        override_from_env("BABBLE_MAX_FRAME_LEN", &mut self.max_frame_len)?;
        Ok(())
    }

    fn apply_cli(&mut self, cli: &Cli) {
        if let Some(addr) = &cli.bind_addr {
            self.bind_addr = addr.clone();
        }
        if cli.random_delay {
            self.random_delay = true;
        }
        set_if_some(&mut self.port, cli.port);
        set_if_some(&mut self.max_clients, cli.max_clients);
        set_if_some(&mut self.queue_capacity, cli.queue_capacity);
        set_if_some(&mut self.queue_count, cli.queue_count);
        set_if_some(&mut self.worker_count, cli.workers);
        set_if_some(&mut self.timeline_capacity, cli.timeline_capacity);
        set_if_some(&mut self.max_delay_us, cli.max_delay_us);
        set_if_some(&mut self.max_frame_len, cli.max_frame_len);
    }
}

fn set_if_some<T>(slot: &mut T, value: Option<T>) {
    if let Some(v) = value {
        *slot = v;
    }
}

fn override_from_env<T>(key: &str, slot: &mut T) -> anyhow::Result<()>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    if let Ok(val) = env::var(key) {
        *slot = val
            .parse::<T>()
            .with_context(|| format!("invalid value for {}: {:?}", key, val))?;
    }
    Ok(())
}
