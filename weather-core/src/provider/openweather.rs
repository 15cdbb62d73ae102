use anyhow::Context;
use async_trait::async_trait;
use log::{debug, error, info, warn};
use reqwest::{
    Client,
    header::{ACCEPT, HeaderMap, HeaderValue},
};
use serde::{Deserialize, de::DeserializeOwned};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::{
    Config,
    config::ENV_API_KEY,
    error::{Result, WeatherError},
    model::{Alert, Alerts, Coordinates, CurrentWeather, Forecast, LocationQuery},
};

use super::{MAX_FORECAST_DAYS, MIN_FORECAST_DAYS, WeatherProvider};

const USER_AGENT: &str = concat!("weather-mcp/", env!("CARGO_PKG_VERSION"));

/// Idle pooled connections are dropped after this long and re-established on demand.
const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

/// The forecast endpoint returns one sample every three hours.
const SAMPLES_PER_DAY: u8 = 8;

const ALERTS_EXCLUDE: &str = "minutely,hourly,daily,current";

#[derive(Debug, Clone)]
pub struct OpenWeatherClient {
    config: Config,
    http: Client,
}

impl OpenWeatherClient {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .pool_idle_timeout(POOL_IDLE_TIMEOUT)
            .build()
            .context("Failed to build HTTP client for OpenWeather")?;

        Ok(Self { config, http })
    }

    fn api_key(&self) -> Result<&str> {
        self.config.api_key().ok_or_else(|| {
            WeatherError::Configuration(format!(
                "OpenWeather API key is not configured. Set {ENV_API_KEY} or run `weather-mcp configure`."
            ))
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// GET `path` and return the body of a successful response.
    async fn get_body(
        &self,
        path: &str,
        query: &[(&str, String)],
        cancel: &CancellationToken,
    ) -> Result<String> {
        let url = self.endpoint(path);
        debug!("GET {url}");

        let request = async {
            let res = self
                .http
                .get(&url)
                .query(query)
                .send()
                .await
                .map_err(WeatherError::from_reqwest)?;

            let status = res.status();
            let body = res.text().await.map_err(WeatherError::from_reqwest)?;

            if !status.is_success() {
                error!(
                    "OpenWeather {path} request failed with status {}: {}",
                    status,
                    truncate_body(&body),
                );
                return Err(WeatherError::from_status(status.as_u16()));
            }

            Ok::<_, WeatherError>(body)
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                warn!("OpenWeather {path} request cancelled");
                Err(WeatherError::Timeout)
            }
            result = request => result,
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        what: &str,
        query: &[(&str, String)],
        cancel: &CancellationToken,
    ) -> Result<T> {
        let body = self.get_body(path, query, cancel).await?;
        parse_body(&body, what)
    }

    fn location_query(&self, location: &LocationQuery) -> Result<Vec<(&'static str, String)>> {
        Ok(vec![
            ("q", location.to_string()),
            ("appid", self.api_key()?.to_string()),
            ("units", self.config.units.query_value().to_string()),
        ])
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherClient {
    async fn current_weather(
        &self,
        city: &str,
        country_code: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<CurrentWeather> {
        self.api_key()?;
        let location = LocationQuery::new(city, country_code)?;
        info!("Fetching current weather for {location}");

        let query = self.location_query(&location)?;
        self.get_json("weather", "current weather", &query, cancel).await
    }

    async fn forecast(
        &self,
        city: &str,
        country_code: Option<&str>,
        days: u8,
        cancel: &CancellationToken,
    ) -> Result<Forecast> {
        self.api_key()?;
        let location = LocationQuery::new(city, country_code)?;
        if !(MIN_FORECAST_DAYS..=MAX_FORECAST_DAYS).contains(&days) {
            return Err(WeatherError::Validation(format!(
                "Days must be between {MIN_FORECAST_DAYS} and {MAX_FORECAST_DAYS}, got {days}"
            )));
        }
        info!("Fetching {days}-day forecast for {location}");

        let mut query = self.location_query(&location)?;
        query.push(("cnt", (days * SAMPLES_PER_DAY).to_string()));
        self.get_json("forecast", "forecast", &query, cancel).await
    }

    async fn alerts(
        &self,
        city: &str,
        country_code: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Alerts> {
        let api_key = self.api_key()?;

        let current = self.current_weather(city, country_code, cancel).await?;
        let coordinates = current.coord.ok_or_else(|| {
            WeatherError::Format(format!("Unable to get coordinates for '{}'", city.trim()))
        })?;
        info!("Fetching weather alerts for ({}, {})", coordinates.lat, coordinates.lon);

        let query = [
            ("lat", coordinates.lat.to_string()),
            ("lon", coordinates.lon.to_string()),
            ("appid", api_key.to_string()),
            ("units", self.config.units.query_value().to_string()),
            ("exclude", ALERTS_EXCLUDE.to_string()),
        ];
        let body = self.get_body("onecall", &query, cancel).await?;

        Ok(parse_alerts(&body, coordinates))
    }
}

#[derive(Debug, Deserialize)]
struct OneCallResponse {
    alerts: Option<Vec<Alert>>,
}

/// A body without an alerts payload means there are no alerts for the area.
fn parse_alerts(body: &str, coordinates: Coordinates) -> Alerts {
    match serde_json::from_str::<Option<OneCallResponse>>(body) {
        Ok(Some(OneCallResponse { alerts: Some(alerts) })) => Alerts { coordinates, alerts },
        Ok(_) => Alerts::none(coordinates),
        Err(e) => {
            warn!("Could not parse OpenWeather alerts payload, assuming none: {e}");
            Alerts::none(coordinates)
        }
    }
}

fn parse_body<T: DeserializeOwned>(body: &str, what: &str) -> Result<T> {
    let value: serde_json::Value = serde_json::from_str(body).map_err(|e| {
        error!("Invalid JSON in OpenWeather {what} response: {e}");
        WeatherError::Format(format!("Received invalid JSON for {what}: {e}"))
    })?;

    if value.is_null() {
        return Err(WeatherError::Format(format!("Failed to deserialize {what} response")));
    }

    serde_json::from_value(value).map_err(|e| {
        error!("Unexpected OpenWeather {what} response shape: {e}");
        WeatherError::Format(format!("Failed to deserialize {what} response: {e}"))
    })
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.chars().count() > MAX {
        format!("{}...", body.chars().take(MAX).collect::<String>())
    } else {
        body.to_string()
    }
}
