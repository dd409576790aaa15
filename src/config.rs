use crate::error::{Result, SymbolError};
use crate::symbols::provider::SearchSettings;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Query limits
    #[serde(default)]
    pub search: SearchConfig,

    /// Language servers started for a project
    #[serde(default = "default_servers")]
    pub servers: Vec<ServerConfig>,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            search: SearchConfig::default(),
            servers: default_servers(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("WSYM_CONFIG").ok();
        Self::load_from(config_path.as_deref().map(Path::new))
    }

    /// Load configuration with an explicit override file
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder()
            // Start with default values
            .add_source(config::File::from_str(
                include_str!("../config/default.toml"),
                config::FileFormat::Toml,
            ));

        // Override with config file if given
        if let Some(path) = path {
            builder = builder.add_source(
                config::File::from(path)
                    .format(config::FileFormat::Toml)
                    .required(true),
            );
        }

        let config: Config = builder
            // Override with environment variables (prefix: WSYM_)
            .add_source(
                config::Environment::with_prefix("WSYM")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Reject values the query pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.search.timeout_ms == 0 {
            return Err(SymbolError::Configuration(
                "search.timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.search.max_results == 0 {
            return Err(SymbolError::Configuration(
                "search.max_results must be greater than zero".to_string(),
            ));
        }
        for server in &self.servers {
            if server.command.trim().is_empty() {
                return Err(SymbolError::Configuration(format!(
                    "server {} has an empty command",
                    server.name
                )));
            }
        }
        Ok(())
    }

    /// Render as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| SymbolError::Serialization(e.to_string()))
    }

    pub fn enabled_servers(&self) -> impl Iterator<Item = &ServerConfig> {
        self.servers.iter().filter(|s| s.enabled)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Deadline for the whole fan-out (milliseconds)
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum records per query
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            max_results: default_max_results(),
        }
    }
}

impl SearchConfig {
    pub fn settings(&self) -> SearchSettings {
        SearchSettings {
            deadline: Duration::from_millis(self.timeout_ms),
            max_results: self.max_results,
        }
    }
}

/// Configuration for spawning a language server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Display name, also used in backend ids
    pub name: String,

    /// Command to run (e.g., "rust-analyzer")
    pub command: String,

    /// Command line arguments
    #[serde(default)]
    pub args: Vec<String>,

    /// Language ID
    pub language_id: String,

    /// Start this server for new projects
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl ServerConfig {
    /// Create config for Rust (rust-analyzer)
    pub fn rust() -> Self {
        Self {
            name: "rust-analyzer".to_string(),
            command: "rust-analyzer".to_string(),
            args: vec![],
            language_id: "rust".to_string(),
            enabled: true,
        }
    }

    /// Create config for Python (pylsp)
    pub fn python() -> Self {
        Self {
            name: "pylsp".to_string(),
            command: "pylsp".to_string(),
            args: vec![],
            language_id: "python".to_string(),
            enabled: true,
        }
    }

    /// Create config for TypeScript/JavaScript
    pub fn typescript() -> Self {
        Self {
            name: "typescript-language-server".to_string(),
            command: "typescript-language-server".to_string(),
            args: vec!["--stdio".to_string()],
            language_id: "typescript".to_string(),
            enabled: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level used when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Emit JSON log lines
    #[serde(default)]
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logs: false,
        }
    }
}

// Default value functions
fn default_timeout_ms() -> u64 {
    2000
}

fn default_max_results() -> usize {
    200
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_servers() -> Vec<ServerConfig> {
    vec![
        ServerConfig::rust(),
        ServerConfig::python(),
        ServerConfig::typescript(),
    ]
}
