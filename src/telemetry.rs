//! Usage event relay. Fire-and-forget: a failed delivery is logged and never
//! reaches the caller.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Client;
use serde_json::{Map, Value};

use crate::config::Telemetry;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TelemetrySink: Send + Sync {
    async fn send(&self, payload: Value) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct WebhookSink {
    url: String,
    http: Client,
}

impl WebhookSink {
    pub fn new(url: String) -> Self {
        Self {
            url,
            http: Client::new(),
        }
    }
}

#[async_trait]
impl TelemetrySink for WebhookSink {
    async fn send(&self, payload: Value) -> Result<()> {
        self.http
            .post(&self.url)
            .json(&payload)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

#[derive(Clone)]
pub struct EventRelay {
    sink: Option<Arc<dyn TelemetrySink>>,
    app_name: String,
    app_version: String,
}

impl EventRelay {
    pub fn new(sink: Option<Arc<dyn TelemetrySink>>, cfg: &Telemetry) -> Self {
        Self {
            sink,
            app_name: cfg.app_name.clone(),
            app_version: cfg.app_version.clone(),
        }
    }

    pub fn from_config(cfg: &Telemetry) -> Self {
        let sink = cfg
            .webhook_url
            .as_ref()
            .filter(|url| !url.trim().is_empty())
            .map(|url| Arc::new(WebhookSink::new(url.clone())) as Arc<dyn TelemetrySink>);
        EventRelay::new(sink, cfg)
    }

    pub async fn track(&self, event_name: Option<Value>, metadata: Option<Value>) {
        let Some(sink) = &self.sink else {
            tracing::debug!(event = ?event_name, "no telemetry webhook configured, dropping event");
            return;
        };

        let payload = event_payload(
            event_name,
            metadata,
            &self.app_name,
            &self.app_version,
            Utc::now(),
        );
        if let Err(e) = sink.send(payload).await {
            tracing::warn!(error = %e, "failed to track event");
        }
    }
}

/// `{event_name, app_name, app_version, ...metadata, timestamp}`: metadata may
/// override the app fields but never the timestamp.
pub fn event_payload(
    event_name: Option<Value>,
    metadata: Option<Value>,
    app_name: &str,
    app_version: &str,
    now: DateTime<Utc>,
) -> Value {
    let mut payload = Map::new();
    if let Some(name) = event_name {
        payload.insert("event_name".to_string(), name);
    }
    payload.insert("app_name".to_string(), Value::String(app_name.to_string()));
    payload.insert("app_version".to_string(), Value::String(app_version.to_string()));
    if let Some(Value::Object(extra)) = metadata {
        payload.extend(extra);
    }
    payload.shift_remove("timestamp");
    payload.insert(
        "timestamp".to_string(),
        Value::String(now.to_rfc3339_opts(SecondsFormat::Millis, true)),
    );
    Value::Object(payload)
}
