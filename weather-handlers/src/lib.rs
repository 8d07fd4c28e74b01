//! Core library for the weather API handlers.
//!
//! This crate defines:
//! - The `current` / `historical` request pipeline and its error mapping
//! - Collaborator traits for geocoding and weather lookups, with OpenWeatherMap clients
//! - Request auditing as a composable handler wrapper
//! - Configuration and startup wiring
//!
//! It is used by `weather-invoke`, but any other entrypoint can build the same handler set.

pub mod app;
pub mod audit;
pub mod compose;
pub mod config;
pub mod error;
pub mod handler;
pub mod model;
pub mod provider;

pub use app::{build_handlers, dispatch};
pub use audit::{AuditRecord, AuditStore, AuditWrapper};
pub use compose::{HandlerWrapper, compose};
pub use config::{AuditConfig, Config, OpenWeatherConfig};
pub use error::{WeatherError, error_response};
pub use handler::{HandlerProvider, HandlerResult, WeatherHandlers};
pub use model::{
    ApiEvent, ApiResponse, Coordinates, CurrentWeather, DailySnapshot, HistoricalWeather,
    InvocationContext, Operation, Units,
};
pub use provider::{Geocoder, WeatherProvider};
