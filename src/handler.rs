use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{HeaderMap, header::AUTHORIZATION},
    response::{IntoResponse, Response},
};
use serde_json::Value;

use tracing::info;

use crate::actions::{self, Action, ActionSpec};
use crate::api::ActionRequest;
use crate::diff::ChangeSet;
use crate::error::{ActionError, PublishError};
use crate::publisher::ImagePublisher;
use crate::telemetry::EventRelay;
use crate::upstream::ItemMaster;
use crate::{api::ActionResponse, good_response};

#[derive(Clone)]
pub struct AppState {
    pub items: ItemMaster,
    pub publisher: ImagePublisher,
    pub events: EventRelay,
}

pub async fn healthcheck() -> impl IntoResponse {
    info!("got healthcheck request");
    Json(ActionResponse::ok())
}

pub async fn method_not_allowed() -> Response {
    ActionError::MethodNotAllowed.into_response()
}

/// Single front door: every client action is a POST with an `action` tag.
pub async fn validate(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    match dispatch(&state, &headers, &body).await {
        Ok(response) => good_response(response),
        Err(e) => e.into_response(),
    }
}

/// Second word of the `Authorization` header, as in `Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(' ').nth(1))
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

fn parse_request(body: &[u8]) -> Result<ActionRequest, ActionError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(ActionRequest::default());
    }
    serde_json::from_slice(body).map_err(|e| ActionError::InvalidBody(e.to_string()))
}

async fn dispatch(
    state: &AppState,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<ActionResponse, ActionError> {
    let req = parse_request(body)?;
    let spec = req.action.as_deref().and_then(actions::lookup);

    // Unknown actions sit behind the token check like every item action.
    let token = match spec {
        Some(ActionSpec {
            requires_token: false,
            ..
        }) => None,
        _ => Some(bearer_token(headers).ok_or(ActionError::MissingToken)?),
    };
    let spec = spec.ok_or(ActionError::UnknownAction)?;
    spec.validate(&req)?;

    info!(action = spec.name, "handling action");
    let token = token.unwrap_or_default();

    match spec.action {
        Action::AppOpened => Ok(ActionResponse::ok()),
        Action::Track => {
            state.events.track(req.event_name, req.metadata).await;
            Ok(ActionResponse::ok())
        }
        Action::Auth => auth(state, &req).await,
        Action::SearchItem => search_item(state, &token, &req).await,
        Action::UploadImage => upload_image(state, &req).await,
        Action::SaveItem => save_item(state, &token, &req).await,
    }
}

async fn auth(state: &AppState, req: &ActionRequest) -> Result<ActionResponse, ActionError> {
    let org = req.org().unwrap_or_default();
    match state.items.exchange_token(&org).await {
        Some(token) => Ok(ActionResponse::with_token(token)),
        None => Ok(ActionResponse::failure("Auth failed")),
    }
}

async fn search_item(
    state: &AppState,
    token: &str,
    req: &ActionRequest,
) -> Result<ActionResponse, ActionError> {
    let org = req.org().unwrap_or_default();
    let item_id = req.item_id().unwrap_or_default();

    match state.items.search_item(token, &org, &item_id).await {
        Ok(item) => Ok(ActionResponse::with_item(item)),
        Err(e) => Ok(ActionResponse::failure(e.to_string())),
    }
}

async fn upload_image(state: &AppState, req: &ActionRequest) -> Result<ActionResponse, ActionError> {
    if !state.publisher.is_configured() {
        return Err(ActionError::NotConfigured(PublishError::NotConfigured));
    }

    let org = req.org().unwrap_or_default();
    let item_id = req.item_id().unwrap_or_default();
    let file_data = req.file_data().unwrap_or_default();

    match state.publisher.publish(&org, &item_id, file_data).await {
        Ok(url) => Ok(ActionResponse::with_image_url(url)),
        Err(PublishError::NotConfigured) => {
            Err(ActionError::NotConfigured(PublishError::NotConfigured))
        }
        Err(e) => {
            tracing::warn!(error = %crate::unpack_error(&e), item_id = %item_id, "image upload failed");
            Ok(ActionResponse::failure(e.to_string()))
        }
    }
}

async fn save_item(
    state: &AppState,
    token: &str,
    req: &ActionRequest,
) -> Result<ActionResponse, ActionError> {
    let org = req.org().unwrap_or_default();
    let item_id = req.item_id().unwrap_or_default();

    let changes = match &req.updates {
        Some(Value::Object(map)) => map.clone(),
        None | Some(Value::Null) => ChangeSet::new(),
        Some(other) => {
            tracing::warn!(updates = %other, "ignoring non-object updates");
            ChangeSet::new()
        }
    };

    match state.items.save_item(token, &org, &item_id, &changes).await {
        Ok(()) => Ok(ActionResponse::ok()),
        Err(e) => Ok(ActionResponse::failure(e.to_string())),
    }
}
