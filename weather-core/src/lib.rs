//! Core library for the `weather-mcp` tool server.
//!
//! This crate defines:
//! - Configuration (file + environment)
//! - The OpenWeather client behind the `WeatherProvider` trait
//! - Text rendering of current weather, forecasts and alerts
//! - The tool operations and their name → handler registry
//!
//! It is used by `weather-mcp`, but can also be reused by other binaries or services.

pub mod config;
pub mod error;
pub mod format;
pub mod model;
pub mod provider;
pub mod tools;

pub use config::{Config, Units};
pub use error::{ErrorKind, Result, WeatherError};
pub use model::{Alert, Alerts, CurrentWeather, Forecast, ForecastEntry, LocationQuery};
pub use provider::{WeatherProvider, openweather::OpenWeatherClient, provider_from_config};
pub use tools::{ToolDefinition, ToolRegistry, WeatherTools};
