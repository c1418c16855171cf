//! Typed, layered configuration for the ARIV gateway.
//!
//! Sources, in order of precedence: the single-purpose legacy environment
//! variables (`LLAMA_CPP_BIN`, `ARIV_MOCK_LLAMA`, `ARIV_MODELS_YAML`), then
//! `ARIV__SECTION__KEY` environment variables, then an optional
//! `config.toml`, then built-in defaults.

use config::{Config as ConfigLoader, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub runner: RunnerConfig,
    #[serde(default)]
    pub resident: ResidentConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Configuration for invoking the model runtime binary.
#[derive(Debug, Clone, Deserialize)]
pub struct RunnerConfig {
    /// Path or name of the runtime binary. Overridden by `LLAMA_CPP_BIN`.
    #[serde(default = "default_binary")]
    pub binary: String,
    /// Graceful shutdown grace window for an abandoned stream, in seconds.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
    /// When true, skip the subprocess and emit prompt words as tokens.
    /// Overridden by `ARIV_MOCK_LLAMA=1`.
    #[serde(default)]
    pub mock: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            binary: default_binary(),
            shutdown_timeout_secs: default_shutdown_timeout(),
            mock: false,
        }
    }
}

/// Configuration for the resident-model manager's LRU bound.
#[derive(Debug, Clone, Deserialize)]
pub struct ResidentConfig {
    #[serde(default = "default_max_loaded")]
    pub max_loaded: usize,
}

impl Default for ResidentConfig {
    fn default() -> Self {
        Self {
            max_loaded: default_max_loaded(),
        }
    }
}

/// Configuration for locating the declarative model registry document.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RegistryConfig {
    /// Path to the registry YAML file. Overridden by `ARIV_MODELS_YAML`.
    #[serde(default)]
    pub path: Option<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8000
}
fn default_binary() -> String {
    "llama-cli".to_string()
}
fn default_shutdown_timeout() -> u64 {
    10
}
fn default_max_loaded() -> usize {
    2
}

impl AppConfig {
    /// Load configuration from file and environment variables, then apply
    /// the single-purpose environment overrides documented for this gateway
    /// on top.
    ///
    /// Configuration sources (in order of precedence):
    /// 1. `LLAMA_CPP_BIN` / `ARIV_MOCK_LLAMA` / `ARIV_MODELS_YAML`
    /// 2. `ARIV__SECTION__KEY` environment variables
    /// 3. `config.toml` file (if present)
    /// 4. Built-in defaults
    pub fn load() -> Result<Self, ConfigError> {
        let loader = ConfigLoader::builder()
            .set_default("server.host", default_host())?
            .set_default("server.port", default_port() as i64)?
            .set_default("runner.binary", default_binary())?
            .set_default("runner.shutdown_timeout_secs", default_shutdown_timeout() as i64)?
            .set_default("runner.mock", false)?
            .set_default("resident.max_loaded", default_max_loaded() as i64)?
            .add_source(File::with_name("config").required(false))
            .add_source(
                Environment::with_prefix("ARIV")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut cfg: AppConfig = loader.try_deserialize()?;
        cfg.apply_legacy_env_overrides();
        Ok(cfg)
    }

    fn apply_legacy_env_overrides(&mut self) {
        if let Ok(bin) = std::env::var("LLAMA_CPP_BIN") {
            self.runner.binary = bin;
        }
        if std::env::var("ARIV_MOCK_LLAMA").as_deref() == Ok("1") {
            self.runner.mock = true;
        }
        if let Ok(path) = std::env::var("ARIV_MODELS_YAML") {
            self.registry.path = Some(path);
        }
    }
}
