use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use std::{collections::HashMap, path::PathBuf};
use tokio::io::AsyncReadExt;
use weather_handlers::{
    ApiEvent, ApiResponse, Config, InvocationContext, Operation, WeatherProvider, build_handlers,
    dispatch, error_response,
    model::extract_coordinates,
    provider::OpenWeatherProvider,
};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weather-invoke", version, about = "Invoke the weather API handlers")]
pub struct Cli {
    /// Request id recorded in audit records; a random one is generated when absent.
    #[arg(long, global = true)]
    request_id: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Current weather for a city.
    Current {
        city: String,

        /// Extra query parameters, as key=value.
        #[arg(long = "query", value_parser = parse_key_value)]
        query: Vec<(String, String)>,
    },

    /// Weather for the five days before today, for a city.
    Historical {
        city: String,

        /// Extra query parameters, as key=value.
        #[arg(long = "query", value_parser = parse_key_value)]
        query: Vec<(String, String)>,
    },

    /// Run an operation against a raw API Gateway event (JSON).
    Invoke {
        /// "current" or "historical".
        operation: String,

        /// Event file; read from stdin when absent.
        #[arg(long)]
        event: Option<PathBuf>,
    },

    /// Ask the weather provider directly for a latitude/longitude pair.
    Point {
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,

        #[arg(long, allow_negative_numbers = true)]
        lon: Option<f64>,

        /// Fetch the five-day history instead of current conditions.
        #[arg(long)]
        historical: bool,
    },

    /// Store the OpenWeatherMap API key and audit settings in the config file.
    Configure {
        /// Prompted for when absent.
        #[arg(long)]
        api_key: Option<String>,

        /// Turn request auditing on or off.
        #[arg(long)]
        audit: Option<bool>,

        /// Audit file location.
        #[arg(long)]
        audit_file: Option<PathBuf>,
    },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let ctx = InvocationContext::new(
            self.request_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
        );

        match self.command {
            Command::Current { city, query } => {
                let event = city_event(city, query);
                invoke(Operation::Current, &event, &ctx).await
            }
            Command::Historical { city, query } => {
                let event = city_event(city, query);
                invoke(Operation::Historical, &event, &ctx).await
            }
            Command::Invoke { operation, event } => {
                let operation = Operation::try_from(operation.as_str())?;
                let event = read_event(event).await?;
                invoke(operation, &event, &ctx).await
            }
            Command::Point { lat, lon, historical } => point(lat, lon, historical).await,
            Command::Configure { api_key, audit, audit_file } => {
                configure(api_key, audit, audit_file)
            }
        }
    }
}

async fn invoke(operation: Operation, event: &ApiEvent, ctx: &InvocationContext) -> Result<()> {
    let config = Config::load()?;
    let handlers = build_handlers(&config)?;

    tracing::debug!(%operation, request_id = %ctx.aws_request_id, "Invoking handler");
    let response = dispatch(handlers.as_ref(), operation, event, ctx).await?;

    print_response(&response)
}

async fn point(lat: f64, lon: Option<f64>, historical: bool) -> Result<()> {
    let config = Config::load()?;
    let api_key = config.api_key()?.to_string();
    let provider = match config.openweather.base_url.as_deref() {
        Some(base_url) => OpenWeatherProvider::with_base_url(api_key, base_url),
        None => OpenWeatherProvider::new(api_key),
    };

    let operation = if historical { Operation::Historical } else { Operation::Current };

    let fetched = match extract_coordinates(lat, lon) {
        Ok(coords) if historical => provider
            .historical(&coords)
            .await
            .and_then(|w| Ok(serde_json::to_string(&w)?)),
        Ok(coords) => provider
            .current(&coords)
            .await
            .and_then(|w| Ok(serde_json::to_string(&w)?)),
        Err(e) => Err(e),
    };

    let response = match fetched {
        Ok(body) => ApiResponse { status_code: 200, body },
        Err(e) => error_response(operation, &e),
    };

    print_response(&response)
}

fn configure(
    api_key: Option<String>,
    audit: Option<bool>,
    audit_file: Option<PathBuf>,
) -> Result<()> {
    let mut config = Config::load_file()?;

    let api_key = match api_key {
        Some(key) => key,
        None => inquire::Password::new("OpenWeatherMap API key:")
            .without_confirmation()
            .prompt()
            .context("Failed to read API key")?,
    };

    if api_key.trim().is_empty() {
        return Err(anyhow!("API key must not be empty"));
    }
    config.set_api_key(api_key.trim().to_string());

    if let Some(enabled) = audit {
        config.audit.enabled = enabled;
    }
    if audit_file.is_some() {
        config.audit.path = audit_file;
    }

    config.save()?;
    println!("Configuration saved to {}", Config::config_file_path()?.display());

    Ok(())
}

fn city_event(city: String, query: Vec<(String, String)>) -> ApiEvent {
    let mut event = ApiEvent::for_city(city);
    if !query.is_empty() {
        event.query_string_parameters = Some(query.into_iter().collect::<HashMap<_, _>>());
    }
    event
}

async fn read_event(path: Option<PathBuf>) -> Result<ApiEvent> {
    let raw = match path {
        Some(path) => tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read event file: {}", path.display()))?,
        None => {
            let mut raw = String::new();
            tokio::io::stdin()
                .read_to_string(&mut raw)
                .await
                .context("Failed to read event from stdin")?;
            raw
        }
    };

    serde_json::from_str(&raw).context("Failed to parse event JSON")
}

fn print_response(response: &ApiResponse) -> Result<()> {
    let json = serde_json::to_string_pretty(response).context("Failed to serialize response")?;
    println!("{json}");
    Ok(())
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))
}
