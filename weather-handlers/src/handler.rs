//! The request pipeline behind the `current` and `historical` operations.
//!
//! Each operation runs validate -> geocode -> fetch -> respond. Every stage
//! ends in an [`ApiResponse`]; failures never escape the pipeline itself.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;

use crate::{
    error::{WeatherError, error_response},
    model::{ApiEvent, ApiResponse, InvocationContext, Operation, extract_city},
    provider::{Geocoder, WeatherProvider},
};

/// Outcome of a handler call. `Ok(None)` means the handler produced no value.
pub type HandlerResult = anyhow::Result<Option<ApiResponse>>;

/// A set of handlers, one per [`Operation`].
#[async_trait]
pub trait HandlerProvider: Send + Sync {
    async fn current(&self, event: &ApiEvent, ctx: &InvocationContext) -> HandlerResult;

    async fn historical(&self, event: &ApiEvent, ctx: &InvocationContext) -> HandlerResult;

    async fn invoke(
        &self,
        operation: Operation,
        event: &ApiEvent,
        ctx: &InvocationContext,
    ) -> HandlerResult {
        match operation {
            Operation::Current => self.current(event, ctx).await,
            Operation::Historical => self.historical(event, ctx).await,
        }
    }
}

/// The base handler set: geocodes the `city` path parameter and fetches weather for it.
#[derive(Debug)]
pub struct WeatherHandlers<G, W> {
    geocoder: G,
    weather: W,
}

impl<G, W> WeatherHandlers<G, W>
where
    G: Geocoder,
    W: WeatherProvider,
{
    pub fn new(geocoder: G, weather: W) -> Self {
        Self { geocoder, weather }
    }

    /// Run the pipeline for `operation`. Always yields a response.
    pub async fn handle(&self, operation: Operation, event: &ApiEvent) -> ApiResponse {
        // Checked before any upstream call is made.
        let Some(city) = extract_city(event) else {
            tracing::debug!(%operation, "Rejecting request without a city");
            return ApiResponse::new(
                StatusCode::BAD_REQUEST,
                format!("{} weather requires a \"city\" to be provided", operation.title()),
            );
        };

        match self.fetch(operation, city).await {
            Ok(body) => ApiResponse::new(StatusCode::OK, body),
            Err(err) => {
                tracing::debug!(%operation, city, error = %err, "Weather lookup failed");
                error_response(operation, &err)
            }
        }
    }

    async fn fetch(&self, operation: Operation, city: &str) -> Result<String, WeatherError> {
        let coordinates = self.geocoder.geocode(city).await?;

        match operation {
            Operation::Current => to_body(&self.weather.current(&coordinates).await?),
            Operation::Historical => to_body(&self.weather.historical(&coordinates).await?),
        }
    }
}

fn to_body<T: Serialize>(payload: &T) -> Result<String, WeatherError> {
    Ok(serde_json::to_string(payload)?)
}

#[async_trait]
impl<G, W> HandlerProvider for WeatherHandlers<G, W>
where
    G: Geocoder,
    W: WeatherProvider,
{
    async fn current(&self, event: &ApiEvent, _ctx: &InvocationContext) -> HandlerResult {
        Ok(Some(self.handle(Operation::Current, event).await))
    }

    async fn historical(&self, event: &ApiEvent, _ctx: &InvocationContext) -> HandlerResult {
        Ok(Some(self.handle(Operation::Historical, event).await))
    }
}
