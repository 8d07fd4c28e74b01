//! Request auditing as a [`HandlerWrapper`].
//!
//! Every wrapped invocation writes one audit record before the inner handler
//! runs and completes it once afterwards with either the response or the
//! error. The inner handler's outcome is returned untouched.

use anyhow::{Context as _, anyhow};
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fmt, sync::Arc};

use crate::{
    compose::HandlerWrapper,
    handler::{HandlerProvider, HandlerResult},
    model::{ApiEvent, ApiResponse, InvocationContext, Operation},
};

pub mod store;

pub use store::{FileAuditStore, MemoryAuditStore};

/// Identifies one audit record: the request id plus its start time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditKey {
    pub request_id: String,
    pub date: i64,
}

impl fmt::Display for AuditKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.request_id, self.date)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    pub request_id: String,
    /// Start of the invocation, epoch millis.
    #[serde(rename = "date")]
    pub start_time: i64,
    #[serde(rename = "type")]
    pub operation_type: String,
    pub path: Option<HashMap<String, String>>,
    pub query: Option<HashMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<i64>,
}

impl AuditRecord {
    pub fn start(
        ctx: &InvocationContext,
        start_time: i64,
        operation: Operation,
        event: &ApiEvent,
    ) -> Self {
        Self {
            request_id: ctx.aws_request_id.clone(),
            start_time,
            operation_type: operation.as_str().to_string(),
            path: event.path_parameters.clone(),
            query: event.query_string_parameters.clone(),
            response: None,
            error: None,
            duration: None,
        }
    }

    pub fn key(&self) -> AuditKey {
        AuditKey { request_id: self.request_id.clone(), date: self.start_time }
    }

    /// Apply a completion to this record.
    pub fn complete(&mut self, outcome: &AuditOutcome, duration: i64) {
        match outcome {
            AuditOutcome::Response(value) => self.response = Some(value.clone()),
            AuditOutcome::Error(message) => self.error = Some(message.clone()),
        }
        self.duration = Some(duration);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AuditOutcome {
    Response(serde_json::Value),
    Error(String),
}

/// Persistence for audit records. Must tolerate concurrent writes to distinct keys.
#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn create_record(&self, record: &AuditRecord) -> anyhow::Result<()>;

    async fn complete_record(
        &self,
        key: &AuditKey,
        outcome: &AuditOutcome,
        duration: i64,
    ) -> anyhow::Result<()>;
}

/// Wraps handler sets so every invocation is recorded in `store`.
#[derive(Clone)]
pub struct AuditWrapper {
    store: Arc<dyn AuditStore>,
}

impl AuditWrapper {
    pub fn new(store: Arc<dyn AuditStore>) -> Self {
        Self { store }
    }
}

impl HandlerWrapper for AuditWrapper {
    fn wrap(&self, inner: Arc<dyn HandlerProvider>) -> Arc<dyn HandlerProvider> {
        Arc::new(Audited { inner, store: self.store.clone() })
    }
}

struct Audited {
    inner: Arc<dyn HandlerProvider>,
    store: Arc<dyn AuditStore>,
}

impl Audited {
    async fn audit(
        &self,
        operation: Operation,
        event: &ApiEvent,
        ctx: &InvocationContext,
    ) -> HandlerResult {
        let started = Utc::now();
        let record = AuditRecord::start(ctx, started.timestamp_millis(), operation, event);
        let key = record.key();

        // No audit trail, no business call.
        self.store
            .create_record(&record)
            .await
            .with_context(|| format!("Failed to create audit record {key}"))?;

        let result = match self.inner.invoke(operation, event, ctx).await {
            Ok(Some(response)) => Ok(response),
            Ok(None) => {
                Err(anyhow!("{} weather handler did not return a value", operation.title()))
            }
            Err(e) => Err(e),
        };

        let completed = match result {
            Ok(response) => match self.record_success(&key, &response, started).await {
                Ok(()) => return Ok(Some(response)),
                Err(e) => e,
            },
            Err(e) => e,
        };

        self.record_failure(&key, &completed, started).await;
        Err(completed)
    }

    async fn record_success(
        &self,
        key: &AuditKey,
        response: &ApiResponse,
        started: chrono::DateTime<Utc>,
    ) -> anyhow::Result<()> {
        let outcome = AuditOutcome::Response(serde_json::to_value(response)?);
        let duration = elapsed_millis(started);
        self.store.complete_record(key, &outcome, duration).await
    }

    /// Best effort; a failure here never replaces the error being recorded.
    async fn record_failure(
        &self,
        key: &AuditKey,
        error: &anyhow::Error,
        started: chrono::DateTime<Utc>,
    ) {
        let outcome = AuditOutcome::Error(format!("{error:#}"));
        let duration = elapsed_millis(started);

        if let Err(e) = self.store.complete_record(key, &outcome, duration).await {
            tracing::warn!(%key, error = %e, "Additional error when saving failure to audit store");
        }
    }
}

fn elapsed_millis(started: chrono::DateTime<Utc>) -> i64 {
    (Utc::now() - started).num_milliseconds()
}

#[async_trait]
impl HandlerProvider for Audited {
    async fn current(&self, event: &ApiEvent, ctx: &InvocationContext) -> HandlerResult {
        self.audit(Operation::Current, event, ctx).await
    }

    async fn historical(&self, event: &ApiEvent, ctx: &InvocationContext) -> HandlerResult {
        self.audit(Operation::Historical, event, ctx).await
    }
}
