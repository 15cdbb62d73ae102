use crate::{
    Config,
    error::Result,
    model::{Alerts, CurrentWeather, Forecast},
    provider::openweather::OpenWeatherClient,
};
use async_trait::async_trait;
use std::{fmt::Debug, sync::Arc};
use tokio_util::sync::CancellationToken;

pub mod openweather;

/// Smallest and largest day count the forecast endpoint can serve.
pub const MIN_FORECAST_DAYS: u8 = 1;
pub const MAX_FORECAST_DAYS: u8 = 5;

/// Source of weather data for the tool operations.
///
/// Every call honours `cancel`: a token fired mid-request ends the call with
/// [`crate::WeatherError::Timeout`].
#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    async fn current_weather(
        &self,
        city: &str,
        country_code: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<CurrentWeather>;

    async fn forecast(
        &self,
        city: &str,
        country_code: Option<&str>,
        days: u8,
        cancel: &CancellationToken,
    ) -> Result<Forecast>;

    async fn alerts(
        &self,
        city: &str,
        country_code: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Alerts>;
}

/// Construct the provider from config. A missing API key is not an error
/// here; each call reports it instead.
pub fn provider_from_config(config: &Config) -> anyhow::Result<Arc<dyn WeatherProvider>> {
    let client = OpenWeatherClient::new(config.clone())?;
    Ok(Arc::new(client))
}
