use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::error::WeatherError;

/// A resolved (or directly supplied) point on the map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    /// Display name; empty when built from a raw lat/long pair.
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(name: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self { name: name.into(), latitude, longitude }
    }
}

/// Build unnamed coordinates from a raw pair, rejecting a half-supplied one.
pub fn extract_coordinates(
    latitude: f64,
    longitude: Option<f64>,
) -> Result<Coordinates, WeatherError> {
    let longitude = longitude.ok_or_else(|| {
        WeatherError::status(StatusCode::BAD_REQUEST, "Missing longitude from lat/long pair")
    })?;

    Ok(Coordinates::new("", latitude, longitude))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    Metric,
    Imperial,
}

impl Units {
    pub fn as_str(&self) -> &'static str {
        match self {
            Units::Metric => "metric",
            Units::Imperial => "imperial",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentWeather {
    pub units: Units,
    pub temperature: f64,
    pub pressure: f64,
    pub humidity: f64,
    pub wind_speed: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailySnapshot {
    pub temperature_max: f64,
    pub temperature_min: f64,
    pub rain: f64,
}

/// Trailing daily summaries, keyed by calendar date next to the `units` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalWeather {
    pub units: Units,
    #[serde(flatten)]
    pub days: BTreeMap<String, DailySnapshot>,
}

/// The two operations the handler set exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Current,
    Historical,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Current => "current",
            Operation::Historical => "historical",
        }
    }

    /// Capitalised form used at the start of response messages.
    pub fn title(&self) -> &'static str {
        match self {
            Operation::Current => "Current",
            Operation::Historical => "Historical",
        }
    }

    pub const fn all() -> &'static [Operation] {
        &[Operation::Current, Operation::Historical]
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for Operation {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.to_lowercase().as_str() {
            "current" => Ok(Operation::Current),
            "historical" => Ok(Operation::Historical),
            _ => Err(anyhow::anyhow!(
                "Unknown operation '{value}'. Supported operations: current, historical."
            )),
        }
    }
}

/// Inbound API Gateway proxy event, reduced to the fields the handlers read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiEvent {
    #[serde(default)]
    pub path_parameters: Option<HashMap<String, String>>,
    #[serde(default)]
    pub query_string_parameters: Option<HashMap<String, String>>,
}

impl ApiEvent {
    pub fn for_city(city: impl Into<String>) -> Self {
        Self {
            path_parameters: Some(HashMap::from([("city".to_string(), city.into())])),
            query_string_parameters: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationContext {
    pub aws_request_id: String,
}

impl InvocationContext {
    pub fn new(request_id: impl Into<String>) -> Self {
        Self { aws_request_id: request_id.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse {
    pub status_code: u16,
    pub body: String,
}

impl ApiResponse {
    pub fn new(status: StatusCode, body: impl Into<String>) -> Self {
        Self { status_code: status.as_u16(), body: body.into() }
    }
}

/// Pull a usable `city` out of the path parameters.
///
/// Absent, empty and whitespace-only values all count as missing.
pub fn extract_city(event: &ApiEvent) -> Option<&str> {
    event
        .path_parameters
        .as_ref()?
        .get("city")
        .map(String::as_str)
        .filter(|city| !city.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_city_requires_non_blank_value() {
        assert_eq!(extract_city(&ApiEvent::default()), None);

        let no_city = ApiEvent { path_parameters: Some(HashMap::new()), ..Default::default() };
        assert_eq!(extract_city(&no_city), None);

        assert_eq!(extract_city(&ApiEvent::for_city("")), None);
        assert_eq!(extract_city(&ApiEvent::for_city("  \t")), None);
        assert_eq!(extract_city(&ApiEvent::for_city("Sydney")), Some("Sydney"));
    }

    #[test]
    fn extract_coordinates_needs_longitude() {
        let coords = extract_coordinates(51.5, Some(-0.12)).expect("pair is complete");
        assert_eq!(coords, Coordinates::new("", 51.5, -0.12));

        let err = extract_coordinates(51.5, None).unwrap_err();
        assert_eq!(err.status_code(), Some(StatusCode::BAD_REQUEST));
        assert_eq!(err.to_string(), "Missing longitude from lat/long pair");
    }

    #[test]
    fn event_uses_gateway_field_names() {
        let event: ApiEvent = serde_json::from_value(serde_json::json!({
            "pathParameters": { "city": "Paris" },
            "queryStringParameters": { "units": "metric" },
            "requestContext": { "stage": "prod" }
        }))
        .expect("event should parse");

        assert_eq!(extract_city(&event), Some("Paris"));
        assert_eq!(
            event.query_string_parameters.as_ref().and_then(|q| q.get("units")).map(String::as_str),
            Some("metric")
        );

        let bare: ApiEvent = serde_json::from_str("{}").expect("empty event should parse");
        assert_eq!(bare, ApiEvent::default());
    }

    #[test]
    fn historical_weather_flattens_days() {
        let mut days = BTreeMap::new();
        days.insert(
            "2024-03-01".to_string(),
            DailySnapshot { temperature_max: 12.5, temperature_min: 3.0, rain: 0.4 },
        );
        let weather = HistoricalWeather { units: Units::Metric, days };

        let value = serde_json::to_value(&weather).expect("serializes");
        assert_eq!(
            value,
            serde_json::json!({
                "units": "metric",
                "2024-03-01": { "temperatureMax": 12.5, "temperatureMin": 3.0, "rain": 0.4 }
            })
        );
    }

    #[test]
    fn operation_parses_wire_names() {
        for op in Operation::all() {
            assert_eq!(Operation::try_from(op.as_str()).expect("roundtrip"), *op);
        }
        let err = Operation::try_from("forecast").unwrap_err();
        assert!(err.to_string().contains("Unknown operation"));
    }
}
