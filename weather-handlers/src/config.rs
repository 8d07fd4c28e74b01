use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};

pub const ENV_OPENWEATHER_APIKEY: &str = "OPENWEATHER_APIKEY";
pub const ENV_AUDIT_ENABLED: &str = "AUDIT_ENABLED";
pub const ENV_AUDIT_FILE: &str = "AUDIT_FILE";

/// OpenWeatherMap credentials and endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct OpenWeatherConfig {
    pub api_key: Option<String>,

    /// Overrides `https://api.openweathermap.org`, mostly for local stubs.
    pub base_url: Option<String>,
}

/// Request auditing. Disabled unless explicitly switched on.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct AuditConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Audit file; defaults to `audit.json` in the platform data directory.
    pub path: Option<PathBuf>,
}

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// ```toml
/// [openweather]
/// api_key = "..."
///
/// [audit]
/// enabled = true
/// path = "/var/lib/weather/audit.json"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub openweather: OpenWeatherConfig,

    #[serde(default)]
    pub audit: AuditConfig,
}

impl Config {
    /// Load config from disk (empty default if missing), then apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut cfg = Self::load_file()?;
        cfg.apply_env(|name| std::env::var(name).ok());
        Ok(cfg)
    }

    /// Load config from disk, or return an empty default if it doesn't exist yet.
    pub fn load_file() -> Result<Self> {
        let path = Self::config_file_path()?;
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_file_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(&path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    fn project_dirs() -> Result<ProjectDirs> {
        ProjectDirs::from("dev", "weather-handlers", "weather-invoke")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.config_dir().join("config.toml"))
    }

    /// Overlay values from the environment. `lookup` returns a variable's value, if set.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup(ENV_OPENWEATHER_APIKEY).filter(|k| !k.is_empty()) {
            self.openweather.api_key = Some(key);
        }

        if let Some(flag) = lookup(ENV_AUDIT_ENABLED) {
            self.audit.enabled = parse_flag(&flag);
        }

        if let Some(path) = lookup(ENV_AUDIT_FILE).filter(|p| !p.is_empty()) {
            self.audit.path = Some(PathBuf::from(path));
        }
    }

    /// Returns the OpenWeatherMap API key, failing with a hint when absent.
    pub fn api_key(&self) -> Result<&str> {
        self.openweather
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                anyhow!(
                    "Missing OpenWeatherMap API key.\n\
                     Hint: set env \"{ENV_OPENWEATHER_APIKEY}\" or run `weather-invoke configure`."
                )
            })
    }

    pub fn set_api_key(&mut self, api_key: String) {
        self.openweather.api_key = Some(api_key);
    }

    /// Where audit records go when auditing is enabled.
    pub fn audit_path(&self) -> Result<PathBuf> {
        match &self.audit.path {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::project_dirs()?.data_dir().join("audit.json")),
        }
    }
}

/// A missing, empty, `0` or `false` value means disabled.
fn parse_flag(value: &str) -> bool {
    let value = value.trim();
    !(value.is_empty() || value == "0" || value.eq_ignore_ascii_case("false"))
}
