use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::collections::BTreeMap;

use crate::{
    error::WeatherError,
    model::{Coordinates, CurrentWeather, DailySnapshot, HistoricalWeather, Units},
};

use super::{Geocoder, WeatherProvider};

pub const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org";

/// Geocoding through the OpenWeatherMap direct lookup endpoint.
#[derive(Debug, Clone)]
pub struct OpenWeatherGeocoder {
    api_key: String,
    base_url: String,
    http: Client,
}

impl OpenWeatherGeocoder {
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(api_key: String, base_url: &str) -> Self {
        Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            http: Client::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct OwGeocodeCity {
    name: String,
    lat: f64,
    lon: f64,
    #[serde(default)]
    country: Option<String>,
    #[serde(default)]
    state: Option<String>,
}

#[async_trait]
impl Geocoder for OpenWeatherGeocoder {
    async fn geocode(&self, location: &str) -> Result<Coordinates, WeatherError> {
        let url = format!("{}/geo/1.0/direct", self.base_url);

        let res = self
            .http
            .get(&url)
            .query(&[("q", location), ("limit", "1"), ("appid", self.api_key.as_str())])
            .send()
            .await?;

        let status = res.status();
        let body = res.text().await?;

        if status != StatusCode::OK {
            return Err(WeatherError::upstream(body));
        }

        let cities: Vec<OwGeocodeCity> = serde_json::from_str(&body)?;

        let Some(city) = cities.into_iter().next() else {
            return Err(WeatherError::status(
                StatusCode::BAD_REQUEST,
                format!("No cities found for request: {location}"),
            ));
        };

        let name = [Some(city.name.as_str()), city.state.as_deref(), city.country.as_deref()]
            .into_iter()
            .flatten()
            .filter(|part| !part.trim().is_empty())
            .collect::<Vec<_>>()
            .join(", ");

        tracing::debug!(location, %name, "Geocoded location");

        Ok(Coordinates::new(name, city.lat, city.lon))
    }
}

/// Current conditions and daily summaries from OpenWeatherMap, in metric units.
#[derive(Debug, Clone)]
pub struct OpenWeatherProvider {
    api_key: String,
    base_url: String,
    http: Client,
}

impl OpenWeatherProvider {
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(api_key: String, base_url: &str) -> Self {
        Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            http: Client::new(),
        }
    }

    fn base_query(&self, coordinates: &Coordinates) -> Vec<(&'static str, String)> {
        vec![
            ("lat", coordinates.latitude.to_string()),
            ("lon", coordinates.longitude.to_string()),
            ("units", Units::Metric.as_str().to_string()),
            ("appid", self.api_key.clone()),
        ]
    }

    async fn fetch_day_summary(
        &self,
        coordinates: &Coordinates,
        day: DateTime<Utc>,
    ) -> Result<OwDaySummary, WeatherError> {
        let url = format!("{}/data/3.0/onecall/day_summary", self.base_url);

        let mut query = self.base_query(coordinates);
        query.push(("date", day_key(day)));

        let res = self.http.get(&url).query(&query).send().await?;

        let status = res.status();
        let body = res.text().await?;

        if status != StatusCode::OK {
            return Err(WeatherError::status(StatusCode::INTERNAL_SERVER_ERROR, body));
        }

        Ok(serde_json::from_str(&body)?)
    }
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
    pressure: f64,
    humidity: f64,
}

#[derive(Debug, Deserialize)]
struct OwWind {
    speed: f64,
}

#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    main: OwMain,
    wind: OwWind,
}

#[derive(Debug, Deserialize)]
struct OwDayTemperature {
    min: f64,
    max: f64,
}

#[derive(Debug, Deserialize)]
struct OwDayPrecipitation {
    total: f64,
}

#[derive(Debug, Deserialize)]
struct OwDaySummary {
    date: String,
    temperature: OwDayTemperature,
    precipitation: OwDayPrecipitation,
}

#[async_trait]
impl WeatherProvider for OpenWeatherProvider {
    async fn current(&self, coordinates: &Coordinates) -> Result<CurrentWeather, WeatherError> {
        let url = format!("{}/data/2.5/weather", self.base_url);

        let res = self.http.get(&url).query(&self.base_query(coordinates)).send().await?;

        let status = res.status();
        let body = res.text().await?;

        if status != StatusCode::OK {
            return Err(WeatherError::status(StatusCode::INTERNAL_SERVER_ERROR, body));
        }

        let parsed: OwCurrentResponse = serde_json::from_str(&body)?;

        Ok(CurrentWeather {
            units: Units::Metric,
            temperature: parsed.main.temp,
            pressure: parsed.main.pressure,
            humidity: parsed.main.humidity,
            wind_speed: parsed.wind.speed,
        })
    }

    async fn historical(
        &self,
        coordinates: &Coordinates,
    ) -> Result<HistoricalWeather, WeatherError> {
        let now = Utc::now();
        let day = |offset: i64| now - Duration::days(offset);

        let summaries = tokio::try_join!(
            self.fetch_day_summary(coordinates, day(1)),
            self.fetch_day_summary(coordinates, day(2)),
            self.fetch_day_summary(coordinates, day(3)),
            self.fetch_day_summary(coordinates, day(4)),
            self.fetch_day_summary(coordinates, day(5)),
        )?;

        let days: BTreeMap<String, DailySnapshot> = [
            summaries.0,
            summaries.1,
            summaries.2,
            summaries.3,
            summaries.4,
        ]
        .into_iter()
        .map(|summary| {
            let snapshot = DailySnapshot {
                temperature_max: summary.temperature.max,
                temperature_min: summary.temperature.min,
                rain: summary.precipitation.total,
            };
            (summary.date, snapshot)
        })
        .collect();

        Ok(HistoricalWeather { units: Units::Metric, days })
    }
}

/// UTC calendar date used as the `date` request parameter.
fn day_key(day: DateTime<Utc>) -> String {
    day.format("%Y-%m-%d").to_string()
}
