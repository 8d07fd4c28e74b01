//! Failures raised by the geocoder and weather provider, and the single
//! mapping from those failures onto an HTTP response.

use reqwest::StatusCode;
use thiserror::Error;

use crate::model::{ApiResponse, Operation};

#[derive(Debug, Error)]
pub enum WeatherError {
    /// Carries the HTTP status the caller should see.
    #[error("{message}")]
    Status { status: StatusCode, message: String },

    #[error("{0}")]
    Upstream(String),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl WeatherError {
    pub fn status(status: StatusCode, message: impl Into<String>) -> Self {
        Self::Status { status, message: message.into() }
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self::Upstream(message.into())
    }

    /// Status code of a structured error; `None` for everything else.
    pub fn status_code(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Turn a resolve or fetch failure into the response for `operation`.
pub fn error_response(operation: Operation, error: &WeatherError) -> ApiResponse {
    let status = error.status_code().unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    let message = error.to_string();
    let body = if message.is_empty() {
        format!("Unable to fetch {operation} weather: {error:?}")
    } else {
        message
    };

    ApiResponse::new(status, body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structured_error_keeps_status_and_message() {
        let err = WeatherError::status(StatusCode::UNAUTHORIZED, "forced error");
        let response = error_response(Operation::Current, &err);

        assert_eq!(response.status_code, 401);
        assert_eq!(response.body, "forced error");
    }

    #[test]
    fn unstructured_error_maps_to_500_with_message() {
        let err = WeatherError::upstream("forced error");
        for op in Operation::all() {
            let response = error_response(*op, &err);
            assert_eq!(response.status_code, 500);
            assert_eq!(response.body, "forced error");
        }
    }

    #[test]
    fn decoding_error_is_unstructured() {
        let err: WeatherError = serde_json::from_str::<u8>("nope").unwrap_err().into();
        assert_eq!(err.status_code(), None);

        let response = error_response(Operation::Historical, &err);
        assert_eq!(response.status_code, 500);
        assert!(!response.body.is_empty());
    }

    #[test]
    fn empty_message_gets_synthesized_body() {
        let err = WeatherError::upstream("");
        let response = error_response(Operation::Historical, &err);

        assert_eq!(response.status_code, 500);
        assert!(response.body.starts_with("Unable to fetch historical weather: "));
        assert!(response.body.contains("Upstream"));
    }
}
