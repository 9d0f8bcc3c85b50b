use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body accepted by the front door. Every field except `action` is
/// action-specific and loosely typed: ids may arrive as numbers.
#[derive(Debug, Deserialize, Default)]
pub struct ActionRequest {
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub org: Option<Value>,
    #[serde(default, rename = "itemId")]
    pub item_id: Option<Value>,
    #[serde(default)]
    pub updates: Option<Value>,
    #[serde(default, rename = "fileData")]
    pub file_data: Option<Value>,
    #[serde(default)]
    pub event_name: Option<Value>,
    #[serde(default)]
    pub metadata: Option<Value>,
}

impl ActionRequest {
    pub fn org(&self) -> Option<String> {
        text_field(&self.org)
    }

    pub fn item_id(&self) -> Option<String> {
        text_field(&self.item_id)
    }

    /// Image payload; only a non-empty string counts.
    pub fn file_data(&self) -> Option<&str> {
        match &self.file_data {
            Some(Value::String(s)) if !s.is_empty() => Some(s.as_str()),
            _ => None,
        }
    }
}

/// Trimmed text of a string or numeric field; blank and non-scalar values
/// count as missing.
pub fn text_field(value: &Option<Value>) -> Option<String> {
    let text = match value.as_ref()? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    if text.is_empty() { None } else { Some(text) }
}

#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
pub struct ActionResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item: Option<Value>,
    #[serde(default, rename = "imageUrl", skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl ActionResponse {
    pub fn ok() -> Self {
        ActionResponse {
            success: true,
            ..Default::default()
        }
    }

    pub fn failure(msg: impl Into<String>) -> Self {
        ActionResponse {
            success: false,
            error: Some(msg.into()),
            ..Default::default()
        }
    }

    pub fn with_token(token: String) -> Self {
        ActionResponse {
            token: Some(token),
            ..ActionResponse::ok()
        }
    }

    pub fn with_item(item: Value) -> Self {
        ActionResponse {
            item: Some(item),
            ..ActionResponse::ok()
        }
    }

    pub fn with_image_url(url: String) -> Self {
        ActionResponse {
            image_url: Some(url),
            ..ActionResponse::ok()
        }
    }
}
