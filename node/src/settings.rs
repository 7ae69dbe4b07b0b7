//! # Node Settings
//!
//! The node reads an optional TOML file, then lets CLI flags and
//! `TRUSTLINE_*` environment variables (both resolved by clap) override it.
//!
//! ```toml
//! listen_port = 9841
//! metrics_port = 9842
//! data_dir = "/var/lib/trustline"
//! in_memory = false
//!
//! [ledger]
//! max_credit_limit = 1000000
//! reject_zero_limits = false
//! max_page_size = 100
//! ```
//!
//! Every key is optional; missing keys take the compiled-in defaults.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use trustline_protocol::config::{LedgerConfig, DEFAULT_API_PORT, DEFAULT_METRICS_PORT};

use crate::cli::RunArgs;

/// File name looked up in the data directory when `--config` is not given.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory, relative to the working directory.
pub const DEFAULT_DATA_DIR: &str = "trustline-data";

/// Fully resolved node configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Port for the JSON/WS API.
    pub listen_port: u16,
    /// Port for the Prometheus endpoint.
    pub metrics_port: u16,
    /// Where the sled database lives.
    pub data_dir: PathBuf,
    /// Keep everything in memory; nothing is written to `data_dir`.
    pub in_memory: bool,
    /// Ledger rules handed to the registry.
    pub ledger: LedgerConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            listen_port: DEFAULT_API_PORT,
            metrics_port: DEFAULT_METRICS_PORT,
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            in_memory: false,
            ledger: LedgerConfig::default(),
        }
    }
}

impl NodeConfig {
    /// Parses a TOML document.
    pub fn from_toml(raw: &str) -> Result<Self> {
        toml::from_str(raw).context("invalid node configuration")
    }

    /// Reads and parses a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_toml(&raw).with_context(|| format!("in {}", path.display()))
    }

    /// Builds the effective configuration for `run`.
    ///
    /// An explicit `--config` must exist. Without one, `config.toml` in the
    /// data directory is used if present.
    pub fn resolve(args: &RunArgs) -> Result<Self> {
        let mut config = match &args.config {
            Some(path) => Self::load(path)?,
            None => {
                let data_dir = args
                    .data_dir
                    .clone()
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));
                let candidate = data_dir.join(CONFIG_FILE_NAME);
                if candidate.is_file() {
                    Self::load(&candidate)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_overrides(args);
        config
            .ledger
            .validate()
            .context("invalid [ledger] configuration")?;
        Ok(config)
    }

    /// Applies CLI / environment values on top of the file.
    pub fn apply_overrides(&mut self, args: &RunArgs) {
        if let Some(port) = args.port {
            self.listen_port = port;
        }
        if let Some(port) = args.metrics_port {
            self.metrics_port = port;
        }
        if let Some(dir) = &args.data_dir {
            self.data_dir = dir.clone();
        }
        if args.in_memory {
            self.in_memory = true;
        }
    }

    /// Directory handed to sled.
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("db")
    }
}
