//! Client-side edit session.
//!
//! Holds what the browser keeps between clicks: the bearer token, the
//! selected organization, the loaded item's baseline and any captured photo.
//! It drives the front door exactly as the page does, so the diffing and the
//! upload-then-save ordering can be exercised without a rendering surface.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use thiserror::Error;

use crate::api::ActionResponse;
use crate::diff::{ChangeSet, changed_fields};
use crate::model::{EditableField, FieldValues, Item, ItemSnapshot};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("ORG required")]
    OrgRequired,
    #[error("Not authenticated")]
    NotAuthenticated,
    #[error("Please enter or scan an item")]
    EmptyItemCode,
    #[error("No item loaded.")]
    NoItemLoaded,
    #[error("{0}")]
    UploadFailed(String),
    #[error("{0}")]
    Rejected(String),
    #[error("front door request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected item shape: {0}")]
    InvalidItem(#[from] serde_json::Error),
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FrontDoor: Send + Sync {
    /// Posts `body` (which carries the `action` tag) with an optional bearer.
    async fn send(&self, token: Option<String>, body: Value) -> Result<ActionResponse, SessionError>;
}

#[derive(Debug, Clone)]
pub struct HttpFrontDoor {
    endpoint: String,
    http: Client,
}

impl HttpFrontDoor {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            http: Client::new(),
        }
    }
}

#[async_trait]
impl FrontDoor for HttpFrontDoor {
    async fn send(&self, token: Option<String>, body: Value) -> Result<ActionResponse, SessionError> {
        let mut request = self.http.post(&self.endpoint).json(&body);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        // Error statuses still carry a JSON body with `success: false`.
        Ok(request.send().await?.json::<ActionResponse>().await?)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SaveOutcome {
    NoChanges,
    Saved(ChangeSet),
}

pub struct ItemSession {
    front_door: Arc<dyn FrontDoor>,
    token: Option<String>,
    org: Option<String>,
    snapshot: Option<ItemSnapshot>,
    captured_image: Option<String>,
}

impl ItemSession {
    pub fn new(front_door: Arc<dyn FrontDoor>) -> Self {
        Self {
            front_door,
            token: None,
            org: None,
            snapshot: None,
            captured_image: None,
        }
    }

    pub fn org(&self) -> Option<&str> {
        self.org.as_deref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    pub fn snapshot(&self) -> Option<&ItemSnapshot> {
        self.snapshot.as_ref()
    }

    pub fn has_captured_image(&self) -> bool {
        self.captured_image.is_some()
    }

    pub async fn authenticate(&mut self, org: &str) -> Result<(), SessionError> {
        let org = org.trim();
        if org.is_empty() {
            return Err(SessionError::OrgRequired);
        }

        let res = self
            .front_door
            .send(None, json!({ "action": "auth", "org": org }))
            .await?;

        match res.token {
            Some(token) if res.success => {
                self.token = Some(token);
                self.org = Some(org.to_uppercase());
                tracing::info!(org = %org, "authenticated");
                Ok(())
            }
            _ => Err(SessionError::Rejected(
                res.error.unwrap_or_else(|| "Auth failed".to_string()),
            )),
        }
    }

    /// Loads `code` as the new baseline. Any previous item and captured
    /// photo are discarded first, even if the search then fails.
    pub async fn search(&mut self, code: &str) -> Result<&ItemSnapshot, SessionError> {
        let code = code.trim();
        if code.is_empty() {
            return Err(SessionError::EmptyItemCode);
        }
        let (token, org) = self.credentials()?;

        self.snapshot = None;
        self.captured_image = None;

        let res = self
            .front_door
            .send(
                Some(token),
                json!({ "action": "search_item", "org": org, "itemId": code }),
            )
            .await?;

        let item = match res.item {
            Some(item) if res.success => item,
            _ => {
                return Err(SessionError::Rejected(
                    res.error.unwrap_or_else(|| "Item not found".to_string()),
                ));
            }
        };

        let item: Item = serde_json::from_value(item)?;
        Ok(self.snapshot.insert(ItemSnapshot::from_item(&item)))
    }

    pub fn capture_image(&mut self, data_uri: impl Into<String>) {
        self.captured_image = Some(data_uri.into());
    }

    /// Saves the edited fields. A captured photo is uploaded first; if that
    /// fails the save request is never sent.
    pub async fn save(&mut self, current: &FieldValues) -> Result<SaveOutcome, SessionError> {
        let snapshot = self.snapshot.as_ref().ok_or(SessionError::NoItemLoaded)?;
        let item_id = snapshot.item_id.trim().to_string();
        if item_id.is_empty() {
            return Err(SessionError::NoItemLoaded);
        }

        let mut changes = changed_fields(&snapshot.fields, current);
        if changes.is_empty() && self.captured_image.is_none() {
            return Ok(SaveOutcome::NoChanges);
        }
        let (token, org) = self.credentials()?;

        let mut image_url = None;
        if let Some(data) = &self.captured_image {
            let up = self
                .front_door
                .send(
                    Some(token.clone()),
                    json!({ "action": "upload_image", "org": org, "itemId": item_id, "fileData": data }),
                )
                .await?;
            if !up.success {
                return Err(SessionError::UploadFailed(
                    up.error.unwrap_or_else(|| "Image upload failed".to_string()),
                ));
            }
            if let Some(url) = up.image_url.filter(|u| !u.is_empty()) {
                changes.insert("ImageUrl".to_string(), Value::String(url.clone()));
                image_url = Some(url);
            }
        }

        let res = self
            .front_door
            .send(
                Some(token),
                json!({ "action": "save_item", "org": org, "itemId": item_id, "updates": changes }),
            )
            .await?;
        if !res.success {
            return Err(SessionError::Rejected(
                res.error.unwrap_or_else(|| "Save failed".to_string()),
            ));
        }

        let mut saved = FieldValues::default();
        for field in EditableField::ALL {
            saved.set(field, current.get(field).trim());
        }
        if let Some(snapshot) = self.snapshot.as_mut() {
            snapshot.apply_saved(&saved, image_url.as_deref());
        }
        self.captured_image = None;

        Ok(SaveOutcome::Saved(changes))
    }

    /// Authenticates from launch parameters and pre-fills the item search.
    pub async fn launch(&mut self, params: &LaunchParams) -> Result<(), SessionError> {
        let Some(org) = &params.org else {
            return Ok(());
        };
        self.authenticate(org).await?;
        if let Some(item) = &params.item {
            self.search(item).await?;
        }
        Ok(())
    }

    fn credentials(&self) -> Result<(String, String), SessionError> {
        match (&self.token, &self.org) {
            (Some(token), Some(org)) => Ok((token.clone(), org.clone())),
            _ => Err(SessionError::NotAuthenticated),
        }
    }
}

/// Decoded barcode/QR text is only searched when it looks like an item id.
pub fn accept_scanned_code(code: &str) -> Option<&str> {
    if !code.is_empty() && code.chars().all(|c| c.is_ascii_alphanumeric()) {
        Some(code)
    } else {
        None
    }
}

/// Organization and item passed on the page URL by a calling app.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LaunchParams {
    pub org: Option<String>,
    pub item: Option<String>,
}

impl LaunchParams {
    pub fn from_query(query: &str) -> Self {
        let pairs: Vec<(String, String)> = query
            .trim_start_matches('?')
            .split('&')
            .filter(|p| !p.is_empty())
            .map(|p| {
                let (k, v) = p.split_once('=').unwrap_or((p, ""));
                (decode_component(k), decode_component(v))
            })
            .collect();

        let first = |key: &str| {
            pairs
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str())
                .filter(|v| !v.is_empty())
        };
        let pick = |a: &str, b: &str| {
            first(a)
                .or_else(|| first(b))
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        LaunchParams {
            org: pick("Organization", "ORG"),
            item: pick("Item", "ItemId"),
        }
    }
}

fn decode_component(s: &str) -> String {
    let spaced = s.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|c| c.into_owned())
        .unwrap_or(spaced)
}
