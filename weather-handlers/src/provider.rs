use async_trait::async_trait;
use std::fmt::Debug;

use crate::{
    error::WeatherError,
    model::{Coordinates, CurrentWeather, HistoricalWeather},
};

pub mod openweather;

pub use openweather::{OpenWeatherGeocoder, OpenWeatherProvider};

/// Resolves free-text locations into coordinates.
#[async_trait]
pub trait Geocoder: Send + Sync + Debug {
    async fn geocode(&self, location: &str) -> Result<Coordinates, WeatherError>;
}

/// Looks up weather for already-resolved coordinates.
#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    async fn current(&self, coordinates: &Coordinates) -> Result<CurrentWeather, WeatherError>;

    /// Daily summaries for the five days before today.
    async fn historical(&self, coordinates: &Coordinates)
    -> Result<HistoricalWeather, WeatherError>;
}
