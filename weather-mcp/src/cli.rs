use anyhow::{Context, anyhow};
use clap::{Parser, Subcommand};
use inquire::{Password, PasswordDisplayMode};
use log::{info, warn};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use weather_core::{
    Config, ToolRegistry, WeatherTools,
    config::ENV_API_KEY,
    provider_from_config,
    tools::{DEFAULT_FORECAST_DAYS, GET_CURRENT_WEATHER, GET_WEATHER_ALERTS, GET_WEATHER_FORECAST},
};

use crate::server::ToolServer;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weather-mcp", version, about = "OpenWeather tools for MCP hosts")]
pub struct Cli {
    /// Defaults to `serve` when omitted.
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Serve the weather tools over stdio (JSON-RPC, one message per line).
    Serve,

    /// Show current weather for a city.
    Current {
        city: String,

        /// Optional ISO 3166 country code, e.g. "GB".
        #[arg(long)]
        country: Option<String>,
    },

    /// Show a daily forecast for a city.
    Forecast {
        city: String,

        #[arg(long)]
        country: Option<String>,

        /// Number of days, 1 to 5.
        #[arg(long, default_value_t = DEFAULT_FORECAST_DAYS)]
        days: u8,
    },

    /// Show active weather alerts for a city.
    Alerts {
        city: String,

        #[arg(long)]
        country: Option<String>,
    },

    /// Store the OpenWeather API key in the config file.
    Configure,

    /// List the tools exposed to hosts.
    Tools,
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command.unwrap_or(Command::Serve) {
            Command::Serve => {
                let registry = build_registry(&load_config()?)?;
                ToolServer::new(registry).run_stdio().await?;
            }
            Command::Current { city, country } => {
                invoke(GET_CURRENT_WEATHER, json!({ "city": city, "country_code": country }))
                    .await?;
            }
            Command::Forecast { city, country, days } => {
                invoke(
                    GET_WEATHER_FORECAST,
                    json!({ "city": city, "country_code": country, "days": days }),
                )
                .await?;
            }
            Command::Alerts { city, country } => {
                invoke(GET_WEATHER_ALERTS, json!({ "city": city, "country_code": country }))
                    .await?;
            }
            Command::Configure => configure()?,
            Command::Tools => {
                let registry = build_registry(&load_config()?)?;
                for def in registry.definitions() {
                    println!("{:<22} {}", def.name, def.description);
                }
            }
        }

        Ok(())
    }
}

/// Read `.env`, the config file and the environment. Runs once per process.
fn load_config() -> anyhow::Result<Config> {
    if let Ok(path) = dotenvy::dotenv() {
        info!("Loaded environment from {}", path.display());
    }

    let config = Config::load().context("Failed to load configuration")?;

    if !config.has_api_key() {
        warn!("No OpenWeather API key configured; tool calls will fail until {ENV_API_KEY} is set");
    }
    info!(
        "Using {} (units: {}, timeout: {}s)",
        config.base_url, config.units, config.timeout_secs
    );

    Ok(config)
}

fn build_registry(config: &Config) -> anyhow::Result<ToolRegistry> {
    let provider = provider_from_config(config)?;
    Ok(ToolRegistry::new(WeatherTools::new(provider, config.units)))
}

async fn invoke(tool: &str, args: serde_json::Value) -> anyhow::Result<()> {
    let registry = build_registry(&load_config()?)?;
    let text = registry
        .call(tool, args, CancellationToken::new())
        .await
        .ok_or_else(|| anyhow!("Tool '{tool}' is not registered"))?;

    println!("{}", text.trim_end());
    Ok(())
}

fn configure() -> anyhow::Result<()> {
    let mut config = Config::load_file()?;

    let api_key = Password::new("OpenWeather API key:")
        .without_confirmation()
        .with_display_mode(PasswordDisplayMode::Masked)
        .prompt()
        .context("Failed to read API key")?;

    let api_key = api_key.trim();
    if api_key.is_empty() {
        return Err(anyhow!("API key must not be empty"));
    }

    config.set_api_key(api_key.to_string());
    config.save()?;

    println!("Saved API key to {}", Config::config_file_path()?.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_subcommand_means_serve() {
        let cli = Cli::try_parse_from(["weather-mcp"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn forecast_defaults_to_three_days() {
        let cli = Cli::try_parse_from(["weather-mcp", "forecast", "London", "--country", "GB"]).unwrap();
        match cli.command {
            Some(Command::Forecast { city, country, days }) => {
                assert_eq!(city, "London");
                assert_eq!(country.as_deref(), Some("GB"));
                assert_eq!(days, 3);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn current_requires_city() {
        assert!(Cli::try_parse_from(["weather-mcp", "current"]).is_err());
    }

    #[test]
    fn registry_builds_without_api_key() {
        let registry = build_registry(&Config::default()).unwrap();
        assert_eq!(registry.definitions().len(), 3);
    }
}
