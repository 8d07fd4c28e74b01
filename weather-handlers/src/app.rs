//! Startup wiring: turns a [`Config`] into the composed handler set.

use reqwest::StatusCode;
use std::sync::Arc;

use crate::{
    Config,
    audit::{AuditWrapper, FileAuditStore},
    compose::{HandlerWrapper, compose},
    handler::{HandlerProvider, WeatherHandlers},
    model::{ApiEvent, ApiResponse, InvocationContext, Operation},
    provider::{OpenWeatherGeocoder, OpenWeatherProvider},
};

/// Build the handler set once at startup.
///
/// Wrappers are listed outermost first.
pub fn build_handlers(config: &Config) -> anyhow::Result<Arc<dyn HandlerProvider>> {
    let api_key = config.api_key()?.to_string();

    let (geocoder, weather) = match config.openweather.base_url.as_deref() {
        Some(base_url) => (
            OpenWeatherGeocoder::with_base_url(api_key.clone(), base_url),
            OpenWeatherProvider::with_base_url(api_key, base_url),
        ),
        None => (OpenWeatherGeocoder::new(api_key.clone()), OpenWeatherProvider::new(api_key)),
    };

    let base: Arc<dyn HandlerProvider> = Arc::new(WeatherHandlers::new(geocoder, weather));

    let wrappers = vec![audit_wrapper(config)?];

    Ok(compose(base, wrappers))
}

fn audit_wrapper(config: &Config) -> anyhow::Result<Option<Arc<dyn HandlerWrapper>>> {
    if !config.audit.enabled {
        tracing::info!("Request auditing disabled");
        return Ok(None);
    }

    let path = config.audit_path()?;
    tracing::info!(path = %path.display(), "Request auditing enabled");

    let store = Arc::new(FileAuditStore::new(path));
    Ok(Some(Arc::new(AuditWrapper::new(store))))
}

/// Invoke one operation the way the process entrypoint does.
///
/// A handler that yields no value becomes a `500`; handler errors propagate.
pub async fn dispatch(
    handlers: &dyn HandlerProvider,
    operation: Operation,
    event: &ApiEvent,
    ctx: &InvocationContext,
) -> anyhow::Result<ApiResponse> {
    match handlers.invoke(operation, event, ctx).await? {
        Some(response) => Ok(response),
        None => Ok(ApiResponse::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("{} weather handler failed to return a value", operation.title()),
        )),
    }
}
