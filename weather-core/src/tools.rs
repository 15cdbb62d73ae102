//! The three weather operations exposed to a tool-invoking host, and the
//! registry that maps tool names to them.
//!
//! Operations never fail: every error is logged and returned as text
//! starting with `Error: `.

use futures::{FutureExt, future::BoxFuture};
use log::{info, warn};
use serde_json::{Value, json};
use std::{collections::HashMap, sync::Arc};
use tokio_util::sync::CancellationToken;

use crate::{
    config::Units,
    error::{Result, WeatherError},
    format::{format_alerts, format_current_weather, format_forecast},
    provider::{MAX_FORECAST_DAYS, MIN_FORECAST_DAYS, WeatherProvider},
};

pub const GET_CURRENT_WEATHER: &str = "get_current_weather";
pub const GET_WEATHER_FORECAST: &str = "get_weather_forecast";
pub const GET_WEATHER_ALERTS: &str = "get_weather_alerts";

pub const DEFAULT_FORECAST_DAYS: u8 = 3;

/// Prefix of every failed operation's text.
pub const ERROR_PREFIX: &str = "Error: ";

#[derive(Debug, Clone, PartialEq, Eq)]
struct LocationArgs {
    city: String,
    country_code: Option<String>,
}

impl LocationArgs {
    fn from_args(args: &Value) -> Result<Self> {
        let city = match args.get("city") {
            Some(Value::String(city)) => city.clone(),
            Some(Value::Null) | None => {
                return Err(WeatherError::Validation(
                    "Missing required argument 'city'".to_string(),
                ));
            }
            Some(other) => {
                return Err(WeatherError::Validation(format!(
                    "Argument 'city' must be a string, got {other}"
                )));
            }
        };

        let country_code = match args.get("country_code") {
            Some(Value::String(cc)) => Some(cc.clone()),
            Some(Value::Null) | None => None,
            Some(other) => {
                return Err(WeatherError::Validation(format!(
                    "Argument 'country_code' must be a string, got {other}"
                )));
            }
        };

        Ok(Self { city, country_code })
    }

    fn country_code(&self) -> Option<&str> {
        self.country_code.as_deref()
    }
}

/// Reads `days` as an integer, a whole float or a numeric string,
/// defaulting when absent.
fn days_from_args(args: &Value) -> Result<u8> {
    let days = match args.get("days") {
        Some(Value::Null) | None => return Ok(DEFAULT_FORECAST_DAYS),
        Some(Value::Number(n)) => n.as_i64().or_else(|| {
            // Some hosts send integer-typed arguments as floats, e.g. `3.0`.
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() <= i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
        Some(_) => None,
    }
    .ok_or_else(|| {
        WeatherError::Validation("Argument 'days' must be a whole number".to_string())
    })?;

    u8::try_from(days).map_err(|_| {
        WeatherError::Validation(format!(
            "Days must be between {MIN_FORECAST_DAYS} and {MAX_FORECAST_DAYS}, got {days}"
        ))
    })
}

/// Error-to-text boundary shared by all operations.
fn render(operation: &str, city: Option<&str>, result: Result<String>) -> String {
    match result {
        Ok(text) => text,
        Err(err) => {
            warn!(
                "{operation} failed for city {:?} ({} error): {err}",
                city.unwrap_or_default(),
                err.kind()
            );
            format!("{ERROR_PREFIX}{err}")
        }
    }
}

fn city_of(args: &Value) -> Option<&str> {
    args.get("city").and_then(Value::as_str)
}

#[derive(Debug, Clone)]
pub struct WeatherTools {
    provider: Arc<dyn WeatherProvider>,
    units: Units,
}

impl WeatherTools {
    pub fn new(provider: Arc<dyn WeatherProvider>, units: Units) -> Self {
        Self { provider, units }
    }

    pub async fn get_current_weather(&self, args: &Value, cancel: &CancellationToken) -> String {
        info!("{GET_CURRENT_WEATHER} requested for {:?}", city_of(args).unwrap_or_default());
        render(GET_CURRENT_WEATHER, city_of(args), self.current_weather_text(args, cancel).await)
    }

    pub async fn get_weather_forecast(&self, args: &Value, cancel: &CancellationToken) -> String {
        info!("{GET_WEATHER_FORECAST} requested for {:?}", city_of(args).unwrap_or_default());
        render(GET_WEATHER_FORECAST, city_of(args), self.forecast_text(args, cancel).await)
    }

    pub async fn get_weather_alerts(&self, args: &Value, cancel: &CancellationToken) -> String {
        info!("{GET_WEATHER_ALERTS} requested for {:?}", city_of(args).unwrap_or_default());
        render(GET_WEATHER_ALERTS, city_of(args), self.alerts_text(args, cancel).await)
    }

    async fn current_weather_text(&self, args: &Value, cancel: &CancellationToken) -> Result<String> {
        let location = LocationArgs::from_args(args)?;
        let weather = self
            .provider
            .current_weather(&location.city, location.country_code(), cancel)
            .await?;
        Ok(format_current_weather(&weather, self.units))
    }

    async fn forecast_text(&self, args: &Value, cancel: &CancellationToken) -> Result<String> {
        let location = LocationArgs::from_args(args)?;
        let days = days_from_args(args)?;
        let forecast = self
            .provider
            .forecast(&location.city, location.country_code(), days, cancel)
            .await?;
        Ok(format_forecast(&forecast, days as usize, self.units))
    }

    async fn alerts_text(&self, args: &Value, cancel: &CancellationToken) -> Result<String> {
        let location = LocationArgs::from_args(args)?;
        let alerts = self
            .provider
            .alerts(&location.city, location.country_code(), cancel)
            .await?;
        Ok(format_alerts(&alerts))
    }
}

pub type ToolFuture = BoxFuture<'static, String>;
pub type ToolHandler = fn(Arc<WeatherTools>, Value, CancellationToken) -> ToolFuture;

/// A named operation as advertised to the host.
#[derive(Debug, Clone)]
pub struct ToolDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: Value,
    handler: ToolHandler,
}

/// Explicit name → handler table, built once at startup.
#[derive(Debug, Clone)]
pub struct ToolRegistry {
    tools: Arc<WeatherTools>,
    definitions: HashMap<&'static str, ToolDefinition>,
}

impl ToolRegistry {
    pub fn new(tools: WeatherTools) -> Self {
        let mut registry = Self { tools: Arc::new(tools), definitions: HashMap::new() };

        registry.register(ToolDefinition {
            name: GET_CURRENT_WEATHER,
            description: "Get the current weather conditions for a city",
            input_schema: location_schema(None),
            handler: |tools, args, cancel| {
                async move { tools.get_current_weather(&args, &cancel).await }.boxed()
            },
        });
        registry.register(ToolDefinition {
            name: GET_WEATHER_FORECAST,
            description: "Get a daily weather forecast (1-5 days) for a city",
            input_schema: location_schema(Some(json!({
                "type": "integer",
                "description": "Number of days to forecast (1-5, default 3)",
                "minimum": MIN_FORECAST_DAYS,
                "maximum": MAX_FORECAST_DAYS,
                "default": DEFAULT_FORECAST_DAYS
            }))),
            handler: |tools, args, cancel| {
                async move { tools.get_weather_forecast(&args, &cancel).await }.boxed()
            },
        });
        registry.register(ToolDefinition {
            name: GET_WEATHER_ALERTS,
            description: "Get active weather alerts for a city",
            input_schema: location_schema(None),
            handler: |tools, args, cancel| {
                async move { tools.get_weather_alerts(&args, &cancel).await }.boxed()
            },
        });

        registry
    }

    fn register(&mut self, definition: ToolDefinition) {
        self.definitions.insert(definition.name, definition);
    }

    /// All registered tools, sorted by name.
    pub fn definitions(&self) -> Vec<&ToolDefinition> {
        let mut defs: Vec<_> = self.definitions.values().collect();
        defs.sort_by_key(|d| d.name);
        defs
    }

    pub fn get(&self, name: &str) -> Option<&ToolDefinition> {
        self.definitions.get(name)
    }

    /// Returns the pending invocation, or `None` for an unknown tool.
    pub fn dispatch(&self, name: &str, args: Value, cancel: CancellationToken) -> Option<ToolFuture> {
        let definition = self.definitions.get(name)?;
        Some((definition.handler)(Arc::clone(&self.tools), args, cancel))
    }

    pub async fn call(&self, name: &str, args: Value, cancel: CancellationToken) -> Option<String> {
        match self.dispatch(name, args, cancel) {
            Some(fut) => Some(fut.await),
            None => None,
        }
    }
}

fn location_schema(days: Option<Value>) -> Value {
    let mut schema = json!({
        "type": "object",
        "properties": {
            "city": {
                "type": "string",
                "description": "City name, e.g. 'London'"
            },
            "country_code": {
                "type": "string",
                "description": "Optional ISO 3166 country code, e.g. 'GB'"
            }
        },
        "required": ["city"]
    });

    if let Some(days) = days {
        schema["properties"]["days"] = days;
    }

    schema
}
