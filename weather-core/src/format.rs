//! Rendering of provider results as plain text for tool responses.
//!
//! Everything here is pure: no I/O, no failures. Optional fields that the
//! provider left out simply drop their line.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Timelike, Utc};

use crate::{
    config::Units,
    model::{Alerts, CurrentWeather, Forecast, ForecastEntry},
};

pub fn format_current_weather(weather: &CurrentWeather, units: Units) -> String {
    let t = units.temperature_symbol();
    let mut output = format!("Current weather in {}\n", place(&weather.name, weather.country()));

    if let Some(condition) = weather.weather.first() {
        if condition.main.is_empty() {
            output.push_str(&format!("Conditions: {}\n", condition.description));
        } else {
            output.push_str(&format!(
                "Conditions: {} ({})\n",
                condition.main, condition.description
            ));
        }
    }

    if let Some(main) = &weather.main {
        match main.feels_like {
            Some(feels) => output.push_str(&format!(
                "Temperature: {:.1}{t} (feels like {:.1}{t})\n",
                main.temp, feels
            )),
            None => output.push_str(&format!("Temperature: {:.1}{t}\n", main.temp)),
        }
        if let (Some(min), Some(max)) = (main.temp_min, main.temp_max) {
            output.push_str(&format!("Range: {min:.1}{t} to {max:.1}{t}\n"));
        }
        if let Some(humidity) = main.humidity {
            output.push_str(&format!("Humidity: {humidity:.0}%\n"));
        }
        if let Some(pressure) = main.pressure {
            output.push_str(&format!("Pressure: {pressure:.0} hPa\n"));
        }
    }

    if let Some(wind) = &weather.wind {
        let speed = units.speed_symbol();
        let mut line = format!("Wind: {:.1} {speed}", wind.speed);
        if let Some(deg) = wind.deg {
            line.push_str(&format!(" from {deg:.0}°"));
        }
        if let Some(gust) = wind.gust {
            line.push_str(&format!(" (gusts {gust:.1} {speed})"));
        }
        output.push_str(&line);
        output.push('\n');
    }

    if let Some(clouds) = &weather.clouds {
        output.push_str(&format!("Cloud cover: {:.0}%\n", clouds.all));
    }
    if let Some(visibility) = weather.visibility {
        output.push_str(&format!("Visibility: {:.1} km\n", visibility / 1000.0));
    }
    if let Some(sunrise) = weather.sys.sunrise.and_then(utc) {
        output.push_str(&format!("Sunrise: {} UTC\n", sunrise.format("%H:%M")));
    }
    if let Some(sunset) = weather.sys.sunset.and_then(utc) {
        output.push_str(&format!("Sunset: {} UTC\n", sunset.format("%H:%M")));
    }
    if let Some(updated) = weather.dt.and_then(utc) {
        output.push_str(&format!("Last updated: {} UTC\n", updated.format("%Y-%m-%d %H:%M:%S")));
    }

    output
}

/// One calendar day of forecast samples, reduced to the figures we display.
#[derive(Debug, Clone, PartialEq)]
pub struct DailySummary<'a> {
    pub date: NaiveDate,
    pub low: Option<f64>,
    pub high: Option<f64>,
    pub humidity: Option<f64>,
    /// Highest precipitation probability of the day, 0.0 ..= 1.0.
    pub precipitation: f64,
    pub morning: Option<&'a ForecastEntry>,
    pub afternoon: Option<&'a ForecastEntry>,
    pub evening: Option<&'a ForecastEntry>,
}

/// Groups entries by the date of their timestamp, keeping the first `days`
/// dates in the order they appear. Entries with an unreadable timestamp are
/// skipped.
pub fn summarize_days(entries: &[ForecastEntry], days: usize) -> Vec<DailySummary<'_>> {
    let mut groups: Vec<(NaiveDate, Vec<(NaiveDateTime, &ForecastEntry)>)> = Vec::new();

    for entry in entries {
        let Some(ts) = entry.timestamp() else { continue };
        let date = ts.date();

        if let Some((_, group)) = groups.iter_mut().find(|(d, _)| *d == date) {
            group.push((ts, entry));
        } else if groups.len() < days {
            groups.push((date, vec![(ts, entry)]));
        }
    }

    groups
        .into_iter()
        .map(|(date, mut group)| {
            group.sort_by_key(|(ts, _)| *ts);
            summarize_day(date, &group)
        })
        .collect()
}

fn summarize_day<'a>(date: NaiveDate, group: &[(NaiveDateTime, &'a ForecastEntry)]) -> DailySummary<'a> {
    // Windows overlap at 12:00 and 18:00; the earlier role takes the sample.
    let mut claimed = vec![false; group.len()];
    let morning = pick(group, &mut claimed, |h| h <= 12);
    let afternoon = pick(group, &mut claimed, |h| (12..=18).contains(&h));
    let evening = pick(group, &mut claimed, |h| h >= 18);

    let temps: Vec<_> = group.iter().filter_map(|(_, e)| e.main.as_ref()).collect();
    let low = temps.iter().filter_map(|m| m.temp_min).reduce(f64::min);
    let high = temps.iter().filter_map(|m| m.temp_max).reduce(f64::max);

    let humidities: Vec<f64> = temps.iter().filter_map(|m| m.humidity).collect();
    let humidity = (!humidities.is_empty())
        .then(|| humidities.iter().sum::<f64>() / humidities.len() as f64);

    let precipitation = group.iter().map(|(_, e)| e.pop).fold(0.0, f64::max);

    DailySummary { date, low, high, humidity, precipitation, morning, afternoon, evening }
}

fn pick<'a>(
    group: &[(NaiveDateTime, &'a ForecastEntry)],
    claimed: &mut [bool],
    window: impl Fn(u32) -> bool,
) -> Option<&'a ForecastEntry> {
    let index = group
        .iter()
        .enumerate()
        .position(|(i, (ts, _))| !claimed[i] && window(ts.hour()))?;
    claimed[index] = true;
    Some(group[index].1)
}

pub fn format_forecast(forecast: &Forecast, days: usize, units: Units) -> String {
    let t = units.temperature_symbol();
    let name = place(&forecast.city.name, forecast.city.country.as_deref());
    let summaries = summarize_days(&forecast.list, days);

    if summaries.is_empty() {
        return format!("No forecast data available for {name}\n");
    }

    let mut output = format!("{}-day forecast for {}\n", summaries.len(), name);

    for day in &summaries {
        output.push('\n');
        output.push_str(&format!("{}\n", day.date.format("%A, %B %-d")));

        if let (Some(low), Some(high)) = (day.low, day.high) {
            output.push_str(&format!("  Temperature: {low:.1}{t} to {high:.1}{t}\n"));
        }

        for (label, entry) in [
            ("Morning", day.morning),
            ("Afternoon", day.afternoon),
            ("Evening", day.evening),
        ] {
            let Some(entry) = entry else { continue };
            let description = entry.description().unwrap_or("unknown");
            match &entry.main {
                Some(main) => output.push_str(&format!(
                    "  {label}: {description}, {:.1}{t}\n",
                    main.temp
                )),
                None => output.push_str(&format!("  {label}: {description}\n")),
            }
        }

        if let Some(humidity) = day.humidity {
            output.push_str(&format!("  Humidity: {humidity:.0}%\n"));
        }
        output.push_str(&format!(
            "  Precipitation chance: {:.0}%\n",
            day.precipitation * 100.0
        ));
    }

    output
}

pub fn format_alerts(alerts: &Alerts) -> String {
    let location = format!(
        "Location: {:.4}, {:.4}\n",
        alerts.coordinates.lat, alerts.coordinates.lon
    );

    if alerts.alerts.is_empty() {
        return format!("No active weather alerts.\n{location}");
    }

    let count = alerts.alerts.len();
    let mut output = format!(
        "{count} active weather alert{}\n{location}",
        if count == 1 { "" } else { "s" }
    );

    for (i, alert) in alerts.alerts.iter().enumerate() {
        output.push_str(&format!("\nAlert {}: {}\n", i + 1, alert.event));
        output.push_str(&format!("  Issued by: {}\n", alert.sender_name));
        if let Some(start) = utc(alert.start) {
            output.push_str(&format!("  From: {} UTC\n", start.format("%Y-%m-%d %H:%M")));
        }
        if let Some(end) = utc(alert.end) {
            output.push_str(&format!("  Until: {} UTC\n", end.format("%Y-%m-%d %H:%M")));
        }
        if !alert.tags.is_empty() {
            output.push_str(&format!("  Tags: {}\n", alert.tags.join(", ")));
        }
        let description = alert.description.trim();
        if !description.is_empty() {
            output.push_str(&format!("  Description: {description}\n"));
        }
    }

    output
}

fn place(name: &str, country: Option<&str>) -> String {
    match country.filter(|c| !c.is_empty()) {
        Some(country) => format!("{name}, {country}"),
        None => name.to_string(),
    }
}

fn utc(ts: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(ts, 0)
}
