use std::path::PathBuf;

use accel_api::ApiVersion;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

pub const ENV_VALIDATION_LAYER: &str = "ACCEL_ENABLE_VALIDATION_LAYER";
pub const ENV_TRACING_LAYER: &str = "ACCEL_ENABLE_TRACING_LAYER";
pub const ENV_LOADER_INTERCEPT: &str = "ACCEL_ENABLE_LOADER_INTERCEPT";
pub const ENV_NULL_DRIVER: &str = "ACCEL_ENABLE_NULL_DRIVER";
pub const ENV_DRIVERS_ORDER: &str = "ACCEL_DRIVERS_ORDER";

/// Top-level loader configuration, loaded from loader.toml.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoaderConfig {
    #[serde(default)]
    pub loader: LoaderSection,
    #[serde(default)]
    pub factory: FactorySection,
    #[serde(default)]
    pub layers: LayerSection,
    /// Driver modules to load, in discovery order.
    #[serde(default)]
    pub drivers: Vec<DriverEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoaderSection {
    /// API version the loader advertises, "MAJOR.MINOR"
    #[serde(default = "default_api_version")]
    pub api_version: String,
    /// Route calls through loader trampolines even with a single driver
    #[serde(default)]
    pub force_intercept: bool,
    /// Register the built-in null driver
    #[serde(default)]
    pub enable_null_driver: bool,
    /// How many null driver instances to register when enabled
    #[serde(default = "default_null_driver_instances")]
    pub null_driver_instances: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorySection {
    /// Upper bound on live wrapped objects per family
    #[serde(default = "default_max_live_handles")]
    pub max_live_handles: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayerSection {
    /// Parameter validation layer
    #[serde(default)]
    pub validation: bool,
    /// Call tracing layer
    #[serde(default)]
    pub tracing: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverEntry {
    /// Driver name, used for ordering and logging
    pub name: String,
    /// Explicit library path; derived from `name` when absent
    pub path: Option<String>,
}

impl DriverEntry {
    /// Library to open for this driver.
    pub fn library_path(&self) -> PathBuf {
        match &self.path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(accel_common::platform::driver_library_name(&self.name)),
        }
    }
}

impl Default for LoaderSection {
    fn default() -> Self {
        Self {
            api_version: default_api_version(),
            force_intercept: false,
            enable_null_driver: false,
            null_driver_instances: default_null_driver_instances(),
        }
    }
}

impl Default for FactorySection {
    fn default() -> Self {
        Self {
            max_live_handles: default_max_live_handles(),
        }
    }
}

impl LoaderConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self, CoreError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, CoreError> {
        let config: LoaderConfig = toml::from_str(content)?;
        config.api_version()?;
        if config.factory.max_live_handles == 0 {
            return Err(CoreError::ConfigError(
                "factory.max_live_handles must be at least 1".to_string(),
            ));
        }
        Ok(config)
    }

    /// Load configuration from file if it exists, otherwise return defaults.
    pub fn load_or_default(path: &str) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(CoreError::Io(_)) => Self::default(),
            Err(e) => {
                tracing::warn!("ignoring {}: {}", path, e);
                Self::default()
            }
        }
    }

    pub fn to_toml(&self) -> Result<String, CoreError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn api_version(&self) -> Result<ApiVersion, CoreError> {
        Ok(self.loader.api_version.parse()?)
    }

    /// Apply the `ACCEL_*` environment overrides on top of the file settings.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// [`apply_env`](Self::apply_env) with an injectable variable lookup.
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let flag = |key: &str, current: bool| match lookup(key) {
            Some(value) => match parse_flag(&value) {
                Some(enabled) => enabled,
                None => {
                    tracing::warn!("{}={:?} is not a boolean, ignoring", key, value);
                    current
                }
            },
            None => current,
        };

        self.layers.validation = flag(ENV_VALIDATION_LAYER, self.layers.validation);
        self.layers.tracing = flag(ENV_TRACING_LAYER, self.layers.tracing);
        self.loader.force_intercept = flag(ENV_LOADER_INTERCEPT, self.loader.force_intercept);
        self.loader.enable_null_driver = flag(ENV_NULL_DRIVER, self.loader.enable_null_driver);

        if let Some(order) = lookup(ENV_DRIVERS_ORDER) {
            self.reorder_drivers(&order);
        }
    }

    /// Move the drivers named in the comma-separated `order` to the front, in
    /// that order. Unnamed drivers keep their relative order after them.
    pub fn reorder_drivers(&mut self, order: &str) {
        let mut remaining = std::mem::take(&mut self.drivers);
        let mut ordered = Vec::with_capacity(remaining.len());
        for name in order.split(',').map(str::trim).filter(|n| !n.is_empty()) {
            match remaining.iter().position(|d| d.name.eq_ignore_ascii_case(name)) {
                Some(pos) => ordered.push(remaining.remove(pos)),
                None => tracing::debug!("{} names unknown driver {:?}", ENV_DRIVERS_ORDER, name),
            }
        }
        ordered.append(&mut remaining);
        self.drivers = ordered;
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Returns the default config file path based on platform conventions.
/// Search order:
/// 1. System-wide config: `%PROGRAMDATA%\Accel\loader.toml` (Windows) or `/etc/accel/loader.toml` (Linux/macOS)
/// 2. Local fallback: `./accel-loader.toml`
pub fn default_config_path() -> String {
    #[cfg(windows)]
    {
        let programdata = std::env::var("PROGRAMDATA")
            .unwrap_or_else(|_| r"C:\ProgramData".to_string());
        let system_path = format!(r"{}\Accel\loader.toml", programdata);
        if std::path::Path::new(&system_path).exists() {
            return system_path;
        }
    }
    #[cfg(not(windows))]
    {
        let system_path = "/etc/accel/loader.toml";
        if std::path::Path::new(system_path).exists() {
            return system_path.to_string();
        }
    }
    "accel-loader.toml".to_string()
}

fn default_api_version() -> String {
    ApiVersion::CURRENT.to_string()
}

fn default_null_driver_instances() -> u32 {
    1
}

fn default_max_live_handles() -> usize {
    1 << 20
}
