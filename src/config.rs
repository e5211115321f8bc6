use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub credits: CreditsConfig,
    #[serde(default)]
    pub recorder: RecorderConfig,
    pub uploads: UploadsConfig,
    pub paths: PathsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditsConfig {
    /// Balance granted to an account with no persisted session
    pub initial_balance: u64,
    /// Balances strictly below this are reported as low (default: 100)
    #[serde(default = "default_low_balance_threshold")]
    pub low_balance_threshold: u64,
    /// Account id sent to the ledger recorder
    #[serde(default = "default_user_id")]
    pub user_id: u64,
    /// Environment variable read at debit time to enable admin bypass
    #[serde(default = "default_admin_env")]
    pub admin_env: String,
}

fn default_low_balance_threshold() -> u64 {
    100
}

fn default_user_id() -> u64 {
    1
}

fn default_admin_env() -> String {
    "INSPECT_ADMIN_MODE".to_string()
}

/// External ledger recorder configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecorderConfig {
    /// Whether ledger changes are forwarded to the recorder endpoint
    #[serde(default)]
    pub enabled: bool,
    /// Base URL of the backend exposing `/api/credits/*`
    #[serde(default = "default_recorder_url")]
    pub base_url: String,
    /// Environment variable holding an optional bearer token
    #[serde(default)]
    pub token_env: Option<String>,
}

fn default_recorder_url() -> String {
    "http://localhost:8000".to_string()
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: default_recorder_url(),
            token_env: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadsConfig {
    /// Delay between consecutive transfer starts in `start_all`
    pub stagger_ms: u64,
    /// Progress tick of the simulated transport
    pub tick_ms: u64,
    /// Files above this size advance more slowly (default: 100 MiB)
    #[serde(default = "default_large_file_bytes")]
    pub large_file_bytes: u64,
}

fn default_large_file_bytes() -> u64 {
    100 * 1024 * 1024
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    pub state: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Write logs to a file under the state directory instead of stderr
    #[serde(default)]
    pub to_file: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            to_file: false,
        }
    }
}

impl Config {
    /// Path to the project-local config file
    pub fn local_config_path() -> PathBuf {
        PathBuf::from(".inspection/config.toml")
    }

    pub fn load(config_path: Option<&str>) -> Result<Self> {
        // Embedded defaults so the tool works without any config file
        let defaults = Config::default();
        let defaults_json =
            serde_json::to_string(&defaults).context("Failed to serialize default config")?;

        let mut builder = config::Config::builder().add_source(config::File::from_str(
            &defaults_json,
            config::FileFormat::Json,
        ));

        let local_config = Self::local_config_path();
        if local_config.exists() {
            builder = builder.add_source(config::File::from(local_config));
        }

        // User config in ~/.config/inspection/ (optional global overrides)
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("inspection").join("config.toml");
            if user_config.exists() {
                builder = builder.add_source(config::File::from(user_config));
            }
        }

        // Explicit config file (CLI override)
        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path));
        }

        // Environment variables with INSPECT_ prefix
        builder = builder.add_source(
            config::Environment::with_prefix("INSPECT")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to load configuration")?;
        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Save config to `.inspection/config.toml`
    pub fn save(&self) -> Result<()> {
        let config_path = Self::local_config_path();

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let toml_str =
            toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        std::fs::write(&config_path, toml_str).context("Failed to write config file")?;

        Ok(())
    }

    /// Get absolute path to state directory
    pub fn state_path(&self) -> PathBuf {
        let path = PathBuf::from(&self.paths.state);
        if path.is_absolute() {
            path
        } else {
            std::env::current_dir().unwrap_or_default().join(path)
        }
    }

    /// Get absolute path to logs directory
    pub fn logs_path(&self) -> PathBuf {
        self.state_path().join("logs")
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            credits: CreditsConfig {
                initial_balance: 10_000,
                low_balance_threshold: default_low_balance_threshold(),
                user_id: default_user_id(),
                admin_env: default_admin_env(),
            },
            recorder: RecorderConfig::default(),
            uploads: UploadsConfig {
                stagger_ms: 500,
                tick_ms: 200,
                large_file_bytes: default_large_file_bytes(),
            },
            paths: PathsConfig {
                state: ".inspection".to_string(), // Relative to cwd
            },
            logging: LoggingConfig::default(),
        }
    }
}
