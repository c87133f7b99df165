//! Configuration management using Figment
//!
//! Values are merged in this order, later sources winning:
//!
//! 1. Built-in defaults
//! 2. `/etc/api-scaffold/{service}/config.toml`
//! 3. `~/.config/api-scaffold/{service}/config.toml` (XDG)
//! 4. `./config.toml`
//! 5. Environment variables prefixed `SCAFFOLD_`, with `__` separating
//!    sections (e.g. `SCAFFOLD_SERVICE__DEBUG=true`)
//!
//! ```toml
//! [service]
//! name = "users-api"
//! log_level = "debug"
//! debug = true
//!
//! [pagination]
//! default_per_page = 20
//! max_per_page = 100
//! ```

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::pagination::DEFAULT_PER_PAGE;

const ENV_PREFIX: &str = "SCAFFOLD_";
const XDG_PREFIX: &str = "api-scaffold";

/// Scaffold configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    #[serde(default)]
    pub service: ServiceConfig,

    #[serde(default)]
    pub pagination: PaginationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceConfig {
    #[serde(default = "default_service_name")]
    pub name: String,

    /// `tracing-subscriber` filter directive
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_environment")]
    pub environment: String,

    /// Diagnostic mode: unclassified failures expose their message and
    /// traceback in the response body
    #[serde(default)]
    pub debug: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaginationConfig {
    /// Page size used when `per_page` is absent
    #[serde(default = "default_per_page")]
    pub default_per_page: u32,

    /// Largest accepted `per_page`; no cap when absent
    #[serde(default)]
    pub max_per_page: Option<u32>,
}

fn default_service_name() -> String {
    "api-scaffold".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_environment() -> String {
    "dev".to_string()
}

fn default_per_page() -> u32 {
    DEFAULT_PER_PAGE
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
            environment: default_environment(),
            debug: false,
        }
    }
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_per_page: default_per_page(),
            max_per_page: None,
        }
    }
}

impl Config {
    /// Load configuration, using the executable name as the service name
    pub fn load() -> Result<Self> {
        let service_name = std::env::current_exe()
            .ok()
            .and_then(|p| p.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .unwrap_or_else(default_service_name);

        Self::load_for_service(&service_name)
    }

    /// Load configuration for a named service from the standard locations
    pub fn load_for_service(service_name: &str) -> Result<Self> {
        let config_paths = Self::find_config_paths(service_name);

        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        // Lowest priority first
        for path in config_paths.iter().rev() {
            if path.exists() {
                tracing::info!("Loading configuration from: {}", path.display());
                figment = figment.merge(Toml::file(path));
            }
        }

        let config = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;

        Ok(config)
    }

    /// Load configuration from one file plus environment overrides
    ///
    /// A missing file is not an error; defaults apply.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;

        Ok(config)
    }

    /// Candidate config files, highest priority first
    fn find_config_paths(service_name: &str) -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("config.toml")];

        let xdg_dirs = xdg::BaseDirectories::with_prefix(XDG_PREFIX);
        if let Some(path) = xdg_dirs.find_config_file(Path::new(service_name).join("config.toml")) {
            paths.push(path);
        }

        paths.push(
            PathBuf::from("/etc")
                .join(XDG_PREFIX)
                .join(service_name)
                .join("config.toml"),
        );

        paths
    }

    /// Whether diagnostic rendering is on
    pub fn is_diagnostic(&self) -> bool {
        self.service.debug
    }

    pub fn is_production(&self) -> bool {
        matches!(self.service.environment.as_str(), "prod" | "production")
    }
}
