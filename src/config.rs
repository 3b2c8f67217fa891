use std::{env, fs, io, path};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read config file")]
    ReadFailed(#[source] io::Error),
    #[error("failed to write config file")]
    WriteFailed(#[source] io::Error),
    #[error("failed to parse config file")]
    ParseFailed(#[from] toml::de::Error),
    #[error("failed to serialize config")]
    SerializeFailed(#[from] toml::ser::Error),
    #[error("no config directory available")]
    ConfigPathUnavailable,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub sweep: SweepConfig,
    pub email: EmailConfig,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path of the local libsql database file
    pub path: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SweepConfig {
    /// Fixed tick driving scheduled sweeps
    pub tick_seconds: u64,
    /// Per-probe request timeout
    pub probe_timeout_seconds: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EmailConfig {
    /// Domain used to qualify a bare SMTP username into a sender address
    pub sender_domain: Option<String>,
    /// Timeout applied to SMTP connect/send
    pub smtp_timeout_seconds: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig { path: "sitemon.db".into() },
            sweep: SweepConfig { tick_seconds: 60, probe_timeout_seconds: 30 },
            email: EmailConfig { sender_domain: None, smtp_timeout_seconds: 30 },
        }
    }
}

/// Used to ensure we are actually reading a toml file
fn normalize_toml_path(path: &path::Path) -> path::PathBuf {
    let mut path = path.to_path_buf();
    if path.extension().map(|ext| ext != "toml").unwrap_or(true) {
        path.set_extension("toml");
    }
    path
}

/// Get default config path ($XDG_CONFIG_HOME/sitemon/config.toml or
/// $HOME/.config/...)
fn default_config_path() -> Result<path::PathBuf, Error> {
    let path = if let Ok(config_home) = env::var("XDG_CONFIG_HOME") {
        path::PathBuf::from(config_home)
    } else if let Some(home_dir) = env::home_dir() {
        home_dir.join(".config")
    } else {
        return Err(Error::ConfigPathUnavailable);
    };

    Ok(path.join("sitemon/config.toml"))
}

impl Config {
    /// Generate Config structure from file
    ///
    /// Creates a default config in ~/.config/sitemon/config.toml or the
    /// specified path, with the name config.toml, if one does not exist
    pub fn from_config(optional_path: Option<impl AsRef<path::Path>>) -> Result<Self, Error> {
        let config_path: path::PathBuf = if let Some(path) = optional_path {
            normalize_toml_path(path.as_ref())
        } else {
            default_config_path()?
        };

        if config_path.exists() {
            let raw_string = fs::read_to_string(&config_path).map_err(Error::ReadFailed)?;
            Ok(toml::from_str(raw_string.as_str())?)
        } else {
            let config = Self::default();
            config.write_config(&config_path)?;
            Ok(config)
        }
    }

    /// Serialize and write a config to a file
    pub fn write_config(&self, path: &path::Path) -> Result<(), Error> {
        let config_str: String = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(Error::WriteFailed)?;
        }

        fs::write(path, config_str).map_err(Error::WriteFailed)
    }
}
