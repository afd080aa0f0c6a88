use std::time::Duration;
use std::{env, fmt, fs, path};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::monitoring::probe::{IntervalPolicy, ProtocolTag};
use crate::monitoring::scheduler::SchedulerSettings;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    ReadFailed { path: path::PathBuf, source: std::io::Error },

    #[error("failed to write config {}: {source}", path.display())]
    WriteFailed { path: path::PathBuf, source: std::io::Error },

    #[error("failed to parse config: {0}")]
    ParseFailed(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    SerializeFailed(#[from] toml::ser::Error),

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error("no config path available, set XDG_CONFIG_HOME or HOME")]
    ConfigPathUnavailable,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub scheduler: SchedulerConfig,
    pub protocols: ProtocolsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: path::PathBuf,
    pub max_connections: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub reconcile_interval_secs: u64,
    pub tick_interval_ms: u64,
    pub check_timeout_secs: u64,
    pub shutdown_grace_secs: u64,
    pub max_concurrent_checks: usize,
    pub default_interval_secs: u64,
    pub min_interval_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolsConfig {
    pub enabled: Vec<String>,
}

/// Used to ensure we are actually reading a toml file
fn normalize_toml_path(path: &path::Path) -> path::PathBuf {
    let mut path = path.to_path_buf();
    if path.extension().map(|ext| ext != "toml").unwrap_or(true) {
        path.set_extension("toml");
    }
    path
}

/// $XDG_CONFIG_HOME, falling back to $HOME/.config
fn config_home() -> Result<path::PathBuf, ConfigError> {
    if let Ok(config_home) = env::var("XDG_CONFIG_HOME") {
        Ok(path::PathBuf::from(config_home))
    } else if let Some(home_dir) = env::home_dir() {
        Ok(home_dir.join(".config"))
    } else {
        Err(ConfigError::ConfigPathUnavailable)
    }
}

/// Get default config path ($XDG_CONFIG_HOME/bootup/config.toml or
/// $HOME/.config/...)
fn default_config_path() -> Result<path::PathBuf, ConfigError> {
    Ok(config_home()?.join("bootup/config.toml"))
}

/// Registry database next to the config, unless `BOOTUP_DB` says otherwise
fn default_database_path() -> path::PathBuf {
    if let Ok(path) = env::var("BOOTUP_DB") {
        return path::PathBuf::from(path);
    }
    config_home().map(|home| home.join("bootup/registry.db")).unwrap_or_else(|_| "registry.db".into())
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: default_database_path(), max_connections: 8 }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            reconcile_interval_secs: 10,
            tick_interval_ms: 250,
            check_timeout_secs: 10,
            shutdown_grace_secs: 15,
            max_concurrent_checks: 64,
            default_interval_secs: 30,
            min_interval_secs: 10,
        }
    }
}

impl Default for ProtocolsConfig {
    fn default() -> Self {
        Self { enabled: ProtocolTag::KNOWN.iter().map(|tag| tag.to_string()).collect() }
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let write_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str, value: &dyn fmt::Display| {
                writeln!(f, "  {:indent$}{}: {}", "", label, value, indent = level * 2)
            }
        };
        let write_title_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str| {
                writeln!(f, "{:indent$}{}", "", label, indent = level * 2)
            }
        };

        let write_title_1 = write_title_indented(1);
        let write_1 = write_indented(1);
        let scheduler = &self.scheduler;

        writeln!(f, "Current Internal Configuration State:")?;
        write_title_1(f, "Database")?;
        write_1(f, "Path", &self.database.path.display())?;
        write_1(f, "Max Connections", &self.database.max_connections)?;

        write_title_1(f, "Scheduler")?;
        write_1(f, "Reconcile Interval (s)", &scheduler.reconcile_interval_secs)?;
        write_1(f, "Tick Interval (ms)", &scheduler.tick_interval_ms)?;
        write_1(f, "Check Timeout (s)", &scheduler.check_timeout_secs)?;
        write_1(f, "Shutdown Grace (s)", &scheduler.shutdown_grace_secs)?;
        write_1(f, "Max Concurrent Checks", &scheduler.max_concurrent_checks)?;
        write_1(f, "Default Interval (s)", &scheduler.default_interval_secs)?;
        write_1(f, "Min Interval (s)", &scheduler.min_interval_secs)?;

        write_title_1(f, "Protocols")?;
        write_1(f, "Enabled", &self.protocols.enabled.join(", "))?;

        Ok(())
    }
}

impl Config {
    /// Generate Config structure from file
    ///
    /// Creates a default config in ~/.config/bootup/config.toml
    ///  or the specified path, with the name config.toml if one does not exist
    ///
    /// ```ignore
    /// let cfg = config::Config::from_config(None::<&path::Path>)?;
    /// println!("{}", cfg);
    /// ```
    pub fn from_config(optional_path: Option<impl AsRef<path::Path>>) -> Result<Self, ConfigError> {
        let config_path: path::PathBuf = if let Some(path) = optional_path {
            normalize_toml_path(path.as_ref())
        } else {
            default_config_path()?
        };

        let config = if config_path.exists() {
            let raw_string = fs::read_to_string(&config_path)
                .map_err(|source| ConfigError::ReadFailed { path: config_path.clone(), source })?;
            toml::from_str(raw_string.as_str())?
        } else {
            let config = Self::default();
            config.write_config(&config_path)?;
            tracing::info!(path = %config_path.display(), "Wrote default config");
            config
        };

        config.validate()?;
        Ok(config)
    }

    /// Serialize and write a config to a file
    pub fn write_config(&self, path: &path::Path) -> Result<(), ConfigError> {
        let config_str: String = toml::to_string_pretty(self)?;
        let write_failed = |source| ConfigError::WriteFailed { path: path.to_path_buf(), source };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(write_failed)?;
        }

        fs::write(path, config_str).map_err(write_failed)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let scheduler = &self.scheduler;
        let nonzero = [
            ("scheduler.reconcile_interval_secs", scheduler.reconcile_interval_secs),
            ("scheduler.tick_interval_ms", scheduler.tick_interval_ms),
            ("scheduler.check_timeout_secs", scheduler.check_timeout_secs),
            ("scheduler.max_concurrent_checks", scheduler.max_concurrent_checks as u64),
            ("scheduler.default_interval_secs", scheduler.default_interval_secs),
            ("scheduler.min_interval_secs", scheduler.min_interval_secs),
            ("database.max_connections", self.database.max_connections as u64),
        ];

        if let Some((name, _)) = nonzero.iter().find(|(_, value)| *value == 0) {
            return Err(ConfigError::Invalid(format!("{name} must be greater than zero")));
        }

        for raw in &self.protocols.enabled {
            ProtocolTag::parse_known(raw).map_err(|e| ConfigError::Invalid(format!("protocols.enabled: {e}")))?;
        }

        Ok(())
    }

    pub fn scheduler_settings(&self) -> SchedulerSettings {
        SchedulerSettings {
            tick_interval: Duration::from_millis(self.scheduler.tick_interval_ms),
            reconcile_interval: Duration::from_secs(self.scheduler.reconcile_interval_secs),
            max_concurrent_checks: self.scheduler.max_concurrent_checks,
            shutdown_grace: Duration::from_secs(self.scheduler.shutdown_grace_secs),
        }
    }

    pub fn interval_policy(&self) -> IntervalPolicy {
        IntervalPolicy {
            default: Duration::from_secs(self.scheduler.default_interval_secs),
            floor: Duration::from_secs(self.scheduler.min_interval_secs),
        }
    }

    pub fn check_timeout(&self) -> Duration {
        Duration::from_secs(self.scheduler.check_timeout_secs)
    }
}
