use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::{Result, WeatherError};

/// Format of the `dt_txt` field in forecast entries.
pub const FORECAST_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// The `q` parameter sent to the provider: `city` or `city,countryCode`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationQuery {
    city: String,
    country_code: Option<String>,
}

impl LocationQuery {
    pub fn new(city: &str, country_code: Option<&str>) -> Result<Self> {
        let city = city.trim();
        if city.is_empty() {
            return Err(WeatherError::Validation("City name must not be empty".to_string()));
        }

        let country_code = country_code
            .map(str::trim)
            .filter(|cc| !cc.is_empty())
            .map(str::to_string);

        Ok(Self { city: city.to_string(), country_code })
    }

    pub fn city(&self) -> &str {
        &self.city
    }

    pub fn country_code(&self) -> Option<&str> {
        self.country_code.as_deref()
    }
}

impl std::fmt::Display for LocationQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.country_code {
            Some(cc) => write!(f, "{},{}", self.city, cc),
            None => f.write_str(&self.city),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    #[serde(default)]
    pub main: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Temperature {
    pub temp: f64,
    pub feels_like: Option<f64>,
    pub temp_min: Option<f64>,
    pub temp_max: Option<f64>,
    pub pressure: Option<f64>,
    pub humidity: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wind {
    pub speed: f64,
    pub deg: Option<f64>,
    pub gust: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clouds {
    pub all: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Sys {
    pub country: Option<String>,
    pub sunrise: Option<i64>,
    pub sunset: Option<i64>,
}

/// Response of the `/weather` endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentWeather {
    #[serde(default)]
    pub name: String,
    pub coord: Option<Coordinates>,
    #[serde(default)]
    pub weather: Vec<Condition>,
    pub main: Option<Temperature>,
    pub wind: Option<Wind>,
    pub clouds: Option<Clouds>,
    pub visibility: Option<f64>,
    #[serde(default)]
    pub sys: Sys,
    pub dt: Option<i64>,
}

impl CurrentWeather {
    pub fn country(&self) -> Option<&str> {
        self.sys.country.as_deref().filter(|c| !c.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct City {
    #[serde(default)]
    pub name: String,
    pub country: Option<String>,
    pub coord: Option<Coordinates>,
}

/// One 3-hour sample from the `/forecast` endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastEntry {
    #[serde(default)]
    pub dt: i64,
    #[serde(default)]
    pub dt_txt: String,
    pub main: Option<Temperature>,
    #[serde(default)]
    pub weather: Vec<Condition>,
    /// Probability of precipitation, 0.0 ..= 1.0.
    #[serde(default)]
    pub pop: f64,
}

impl ForecastEntry {
    pub fn timestamp(&self) -> Option<NaiveDateTime> {
        NaiveDateTime::parse_from_str(&self.dt_txt, FORECAST_TIMESTAMP_FORMAT).ok()
    }

    pub fn description(&self) -> Option<&str> {
        self.weather.first().map(|w| w.description.as_str())
    }
}

/// Response of the `/forecast` endpoint, in provider order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    #[serde(default)]
    pub city: City,
    #[serde(default)]
    pub list: Vec<ForecastEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    #[serde(default)]
    pub sender_name: String,
    #[serde(default)]
    pub event: String,
    #[serde(default)]
    pub start: i64,
    #[serde(default)]
    pub end: i64,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Alerts for a coordinate pair. An empty list is a normal result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alerts {
    pub coordinates: Coordinates,
    pub alerts: Vec<Alert>,
}

impl Alerts {
    pub fn none(coordinates: Coordinates) -> Self {
        Self { coordinates, alerts: Vec::new() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_without_country_is_city_verbatim() {
        for city in ["London", "New York", "São Paulo", "Saint-Étienne"] {
            let q = LocationQuery::new(city, None).unwrap();
            assert_eq!(q.to_string(), city);
        }
    }

    #[test]
    fn location_with_country_joins_with_comma() {
        let q = LocationQuery::new("Paris", Some("FR")).unwrap();
        assert_eq!(q.to_string(), "Paris,FR");
        assert_eq!(q.city(), "Paris");
        assert_eq!(q.country_code(), Some("FR"));
    }

    #[test]
    fn blank_country_is_treated_as_absent() {
        let q = LocationQuery::new("Oslo", Some("  ")).unwrap();
        assert_eq!(q.to_string(), "Oslo");
    }

    #[test]
    fn blank_city_is_rejected() {
        for city in ["", "   ", "\t\n"] {
            let err = LocationQuery::new(city, Some("US")).unwrap_err();
            assert!(matches!(err, WeatherError::Validation(_)));
        }
    }

    #[test]
    fn current_weather_parses_sparse_payload() {
        let w: CurrentWeather = serde_json::from_str(r#"{"name":"Nowhere"}"#).unwrap();
        assert_eq!(w.name, "Nowhere");
        assert!(w.coord.is_none());
        assert!(w.main.is_none());
        assert_eq!(w.country(), None);
    }

    #[test]
    fn temperature_block_without_range_still_parses() {
        let w: CurrentWeather =
            serde_json::from_str(r#"{"name":"Quito","main":{"temp":14.5,"humidity":80}}"#).unwrap();
        let main = w.main.unwrap();
        assert_eq!(main.temp, 14.5);
        assert_eq!(main.temp_min, None);
        assert_eq!(main.temp_max, None);
    }

    #[test]
    fn forecast_entry_timestamp_parses_dt_txt() {
        let entry: ForecastEntry =
            serde_json::from_str(r#"{"dt":0,"dt_txt":"2024-03-01 15:00:00"}"#).unwrap();
        let ts = entry.timestamp().unwrap();
        assert_eq!(ts.format("%H").to_string(), "15");
        assert_eq!(entry.pop, 0.0);
    }
}
