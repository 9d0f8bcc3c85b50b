//! Identity provider and item-master access.
//!
//! Every call reports failure through its return value. The item-master
//! service is inconsistent about error shapes (`{error}`, `{success: false,
//! message}`, or an HTML page instead of JSON), so responses are normalized
//! by [`upstream_failure`] before anything else looks at them.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, Method, Request, header::CONTENT_TYPE};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use thiserror::Error;

use crate::config::Upstream;
use crate::diff::ChangeSet;

pub const SEARCH_PATH: &str = "/item-master/api/item-master/item/search";
pub const SAVE_PATH: &str = "/item-master/api/item-master/item/save";
pub const SEARCH_SIZE: u32 = 200;
const EMPTY_BODY: &str = "Empty response from item-master";

#[derive(Debug, Error, PartialEq)]
pub enum UpstreamError {
    #[error("Item not found")]
    NotFound,
    #[error("{0}")]
    Rejected(String),
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UpstreamTransport: Send + Sync {
    /// Password-grant token exchange for `org`. `None` means auth failed.
    async fn exchange_token(&self, org: &str) -> Option<String>;

    /// Authenticated item-master request. Always yields a JSON value.
    async fn call(
        &self,
        method: Method,
        path: &str,
        token: &str,
        org: &str,
        body: Option<Value>,
    ) -> Value;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
}

#[derive(Debug, Clone)]
pub struct HttpUpstream {
    config: Upstream,
    http: Client,
}

impl HttpUpstream {
    pub fn new(config: Upstream) -> Self {
        Self {
            config,
            http: Client::new(),
        }
    }

    pub fn username_for(&self, org: &str) -> String {
        format!("{}{}", self.config.username_base, org.to_lowercase())
    }

    /// Password-grant form post, authenticated with the client credentials.
    pub fn token_request(&self, org: &str) -> reqwest::Result<Request> {
        let url = format!("https://{}/oauth/token", self.config.auth_host);
        let username = self.username_for(org);
        let form = [
            ("grant_type", "password"),
            ("username", username.as_str()),
            ("password", self.config.password.as_str()),
        ];

        self.http
            .post(&url)
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .form(&form)
            .build()
    }

    /// Item-master request scoped to `org` and its default location.
    pub fn api_request(
        &self,
        method: Method,
        path: &str,
        token: &str,
        org: &str,
        body: Option<Value>,
    ) -> reqwest::Result<Request> {
        let url = format!("https://{}{}", self.config.api_host, path);
        let org_upper = org.to_uppercase();

        let mut request = self
            .http
            .request(method, &url)
            .bearer_auth(token)
            .header(CONTENT_TYPE, "application/json")
            .header("selectedOrganization", &org_upper)
            .header("selectedLocation", format!("{}-DM1", org_upper));
        if let Some(body) = body {
            request = request.body(body.to_string());
        }
        request.build()
    }
}

#[async_trait]
impl UpstreamTransport for HttpUpstream {
    async fn exchange_token(&self, org: &str) -> Option<String> {
        let response = match self.token_request(org) {
            Ok(request) => self.http.execute(request).await,
            Err(e) => Err(e),
        };
        let response = match response {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(error = %e, org, "token exchange request failed");
                return None;
            }
        };

        if !response.status().is_success() {
            tracing::info!(status = response.status().as_u16(), org, "token exchange rejected");
            return None;
        }

        match response.json::<TokenResponse>().await {
            Ok(TokenResponse {
                access_token: Some(token),
            }) if !token.is_empty() => Some(token),
            Ok(_) => {
                tracing::warn!(org, "token exchange response had no access_token");
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, org, "failed to decode token exchange response");
                None
            }
        }
    }

    async fn call(
        &self,
        method: Method,
        path: &str,
        token: &str,
        org: &str,
        body: Option<Value>,
    ) -> Value {
        let text = match self.api_request(method, path, token, org, body) {
            Ok(request) => match self.http.execute(request).await {
                Ok(response) => response.text().await,
                Err(e) => Err(e),
            },
            Err(e) => Err(e),
        };

        match text {
            Ok(text) => parse_upstream_body(&text),
            Err(e) => {
                tracing::warn!(error = %e, path, "item-master request failed");
                failure_shape(e.to_string())
            }
        }
    }
}

fn failure_shape(error: String) -> Value {
    json!({ "error": error, "success": false })
}

/// Parses an item-master body. Non-JSON text is surfaced verbatim as the
/// error rather than dropped; a blank body gets a fixed message.
pub fn parse_upstream_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return failure_shape(EMPTY_BODY.to_string());
    }
    serde_json::from_str(text).unwrap_or_else(|_| failure_shape(text.to_string()))
}

/// Returns the failure message carried by an item-master response, if any.
pub fn upstream_failure(response: &Value) -> Option<String> {
    if let Some(error) = response.get("error").filter(|v| is_truthy(v)) {
        return Some(message_text(error));
    }
    if response.get("success") == Some(&Value::Bool(false)) {
        return response
            .get("message")
            .filter(|v| is_truthy(v))
            .map(message_text);
    }
    None
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn message_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Equality filter on `ItemId` with embedded quotes doubled.
pub fn search_query(item_id: &str) -> String {
    format!("ItemId = '{}'", item_id.replace('\'', "''"))
}

pub fn search_payload(item_id: &str) -> Value {
    json!({
        "Query": search_query(item_id),
        "Size": SEARCH_SIZE,
        "Template": {
            "ItemId": null,
            "Description": null,
            "OriginalLength": null,
            "OriginalWidth": null,
            "OriginalHeight": null,
            "OriginalWeight": null,
            "ImageUrl": null
        }
    })
}

/// `{ItemId}` merged with the change-set. The change-set never overrides the id.
pub fn save_payload(item_id: &str, changes: &ChangeSet) -> Value {
    let mut payload = Map::new();
    payload.insert("ItemId".to_string(), Value::String(item_id.to_string()));
    for (key, value) in changes {
        if key != "ItemId" {
            payload.insert(key.clone(), value.clone());
        }
    }
    Value::Object(payload)
}

/// Item search and save on top of an [`UpstreamTransport`].
#[derive(Clone)]
pub struct ItemMaster {
    transport: Arc<dyn UpstreamTransport>,
}

impl ItemMaster {
    pub fn new(transport: Arc<dyn UpstreamTransport>) -> Self {
        Self { transport }
    }

    pub async fn exchange_token(&self, org: &str) -> Option<String> {
        self.transport.exchange_token(org).await
    }

    /// First match wins; extra matches for the same id are ignored.
    pub async fn search_item(
        &self,
        token: &str,
        org: &str,
        item_id: &str,
    ) -> Result<Value, UpstreamError> {
        let id = item_id.trim();
        let response = self
            .transport
            .call(Method::POST, SEARCH_PATH, token, org, Some(search_payload(id)))
            .await;

        if let Some(msg) = upstream_failure(&response) {
            tracing::warn!(item_id = id, error = %msg, "item search rejected");
            return Err(UpstreamError::Rejected(msg));
        }

        response
            .get("data")
            .and_then(Value::as_array)
            .and_then(|list| list.first())
            .cloned()
            .ok_or(UpstreamError::NotFound)
    }

    /// Last write wins: no version check is made against concurrent edits.
    pub async fn save_item(
        &self,
        token: &str,
        org: &str,
        item_id: &str,
        changes: &ChangeSet,
    ) -> Result<(), UpstreamError> {
        let id = item_id.trim();
        let response = self
            .transport
            .call(Method::POST, SAVE_PATH, token, org, Some(save_payload(id, changes)))
            .await;

        match upstream_failure(&response) {
            Some(msg) => {
                tracing::warn!(item_id = id, error = %msg, "item save rejected");
                Err(UpstreamError::Rejected(msg))
            }
            None => Ok(()),
        }
    }
}
