use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, str::FromStr};

pub const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org/data/2.5";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MAX_RETRIES: u32 = 3;

pub const ENV_API_KEY: &str = "OPENWEATHER_API_KEY";
pub const ENV_BASE_URL: &str = "OPENWEATHER_BASE_URL";
pub const ENV_UNITS: &str = "OPENWEATHER_UNITS";
pub const ENV_TIMEOUT_SECONDS: &str = "OPENWEATHER_TIMEOUT_SECONDS";
pub const ENV_MAX_RETRIES: &str = "OPENWEATHER_MAX_RETRIES";

/// Unit system requested from the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    #[default]
    Metric,
    Imperial,
    #[serde(alias = "standard")]
    Kelvin,
}

impl Units {
    pub fn as_str(&self) -> &'static str {
        match self {
            Units::Metric => "metric",
            Units::Imperial => "imperial",
            Units::Kelvin => "kelvin",
        }
    }

    /// Value of the `units` query parameter. The provider calls Kelvin "standard".
    pub fn query_value(&self) -> &'static str {
        match self {
            Units::Metric => "metric",
            Units::Imperial => "imperial",
            Units::Kelvin => "standard",
        }
    }

    pub fn temperature_symbol(&self) -> &'static str {
        match self {
            Units::Metric => "°C",
            Units::Imperial => "°F",
            Units::Kelvin => "K",
        }
    }

    pub fn speed_symbol(&self) -> &'static str {
        match self {
            Units::Imperial => "mph",
            Units::Metric | Units::Kelvin => "m/s",
        }
    }
}

impl std::fmt::Display for Units {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Units {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "metric" => Ok(Units::Metric),
            "imperial" => Ok(Units::Imperial),
            "kelvin" | "standard" => Ok(Units::Kelvin),
            _ => Err(anyhow!(
                "Unknown unit system '{value}'. Supported: metric, imperial, kelvin."
            )),
        }
    }
}

/// Runtime configuration, read once at startup and never mutated afterwards.
///
/// Example TOML:
/// ```toml
/// api_key = "..."
/// units = "imperial"
/// timeout_secs = 10
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_key: Option<String>,
    pub base_url: String,
    pub units: Units,
    pub timeout_secs: u64,
    /// Accepted for compatibility; requests are never retried.
    pub max_retries: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            units: Units::default(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl Config {
    /// Load the config file (if any), then apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut cfg = Self::load_file()?;
        cfg.apply_env(|key| std::env::var(key).ok())?;
        Ok(cfg)
    }

    /// Load config from disk, or return defaults if it doesn't exist yet.
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

    /// Override fields from environment-style variables. Unset or empty
    /// variables leave the current value untouched.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = get(ENV_API_KEY) {
            self.api_key = Some(key.trim().to_string());
        }
        if let Some(url) = get(ENV_BASE_URL) {
            self.base_url = url.trim().to_string();
        }
        if let Some(units) = get(ENV_UNITS) {
            self.units = units.parse().with_context(|| format!("Invalid {ENV_UNITS}"))?;
        }
        if let Some(secs) = get(ENV_TIMEOUT_SECONDS) {
            self.timeout_secs = secs
                .trim()
                .parse()
                .with_context(|| format!("Invalid {ENV_TIMEOUT_SECONDS}: '{secs}'"))?;
        }
        if let Some(retries) = get(ENV_MAX_RETRIES) {
            self.max_retries = retries
                .trim()
                .parse()
                .with_context(|| format!("Invalid {ENV_MAX_RETRIES}: '{retries}'"))?;
        }

        Ok(())
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

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "weather-mcp", "weather-mcp")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    /// The API key, if one is set and not blank.
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref().map(str::trim).filter(|k| !k.is_empty())
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key().is_some()
    }

    pub fn set_api_key(&mut self, api_key: String) {
        self.api_key = Some(api_key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn defaults_match_documented_values() {
        let cfg = Config::default();
        assert_eq!(cfg.api_key, None);
        assert_eq!(cfg.base_url, DEFAULT_BASE_URL);
        assert_eq!(cfg.units, Units::Metric);
        assert_eq!(cfg.timeout_secs, 30);
        assert_eq!(cfg.max_retries, 3);
        assert!(!cfg.has_api_key());
    }

    #[test]
    fn env_overrides_every_field() {
        let vars = env(&[
            (ENV_API_KEY, " KEY "),
            (ENV_BASE_URL, "http://localhost:8080"),
            (ENV_UNITS, "Imperial"),
            (ENV_TIMEOUT_SECONDS, "5"),
            (ENV_MAX_RETRIES, "0"),
        ]);

        let mut cfg = Config::default();
        cfg.apply_env(|k| vars.get(k).cloned()).expect("env should apply");

        assert_eq!(cfg.api_key(), Some("KEY"));
        assert_eq!(cfg.base_url, "http://localhost:8080");
        assert_eq!(cfg.units, Units::Imperial);
        assert_eq!(cfg.timeout_secs, 5);
        assert_eq!(cfg.max_retries, 0);
    }

    #[test]
    fn empty_env_values_are_ignored() {
        let vars = env(&[(ENV_API_KEY, "  "), (ENV_UNITS, "")]);

        let mut cfg = Config::default();
        cfg.apply_env(|k| vars.get(k).cloned()).unwrap();

        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn invalid_timeout_is_rejected() {
        let vars = env(&[(ENV_TIMEOUT_SECONDS, "soon")]);

        let err = Config::default().apply_env(|k| vars.get(k).cloned()).unwrap_err();
        assert!(format!("{err:#}").contains(ENV_TIMEOUT_SECONDS));
    }

    #[test]
    fn blank_api_key_counts_as_missing() {
        let mut cfg = Config::default();
        cfg.set_api_key("   ".into());
        assert!(!cfg.has_api_key());
    }

    #[test]
    fn units_parse_and_query_values() {
        assert_eq!("kelvin".parse::<Units>().unwrap(), Units::Kelvin);
        assert_eq!("standard".parse::<Units>().unwrap(), Units::Kelvin);
        assert_eq!(Units::Kelvin.query_value(), "standard");
        assert_eq!(Units::Imperial.speed_symbol(), "mph");
        assert!("rankine".parse::<Units>().is_err());
    }

    #[test]
    fn toml_fills_missing_fields_with_defaults() {
        let cfg = Config::from_toml("api_key = \"abc\"\nunits = \"imperial\"\n").unwrap();
        assert_eq!(cfg.api_key(), Some("abc"));
        assert_eq!(cfg.units, Units::Imperial);
        assert_eq!(cfg.timeout_secs, DEFAULT_TIMEOUT_SECS);
    }

    #[test]
    fn toml_roundtrip_preserves_config() {
        let mut cfg = Config::default();
        cfg.set_api_key("KEY".into());
        cfg.units = Units::Kelvin;

        let text = toml::to_string_pretty(&cfg).unwrap();
        assert_eq!(Config::from_toml(&text).unwrap(), cfg);
    }
}
