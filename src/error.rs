use std::{error::Error, fmt};

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::api::ActionResponse;

#[derive(Debug)]
pub enum PublishError {
    NotConfigured,
    InvalidImageData(base64::DecodeError),
    S3Error(Box<dyn Error + Send + Sync + 'static>),
}

impl std::error::Error for PublishError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        use PublishError::*;
        match self {
            InvalidImageData(e) => Some(e),
            S3Error(e) => Some(e.as_ref() as &dyn Error),
            _ => None,
        }
    }
}

impl fmt::Display for PublishError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use PublishError::*;
        match self {
            NotConfigured => write!(f, "Asset host not configured"),
            InvalidImageData(e) => write!(f, "Invalid image data: {}", e),
            S3Error(e) => write!(f, "Image upload failed: {}", e),
        }
    }
}

impl From<base64::DecodeError> for PublishError {
    fn from(error: base64::DecodeError) -> Self {
        PublishError::InvalidImageData(error)
    }
}

/// Request-level failures that short-circuit an action with a non-200 status.
/// Logical failures (bad credentials, upstream rejections) are not errors at
/// this level; they travel back as `success: false` bodies.
#[derive(Debug)]
pub enum ActionError {
    MethodNotAllowed,
    InvalidBody(String),
    UnknownAction,
    MissingToken,
    ValidationError(&'static str),
    NotConfigured(PublishError),
}

impl ActionError {
    pub fn status(&self) -> StatusCode {
        use ActionError::*;
        match self {
            MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            InvalidBody(_) | UnknownAction | ValidationError(_) => StatusCode::BAD_REQUEST,
            MissingToken => StatusCode::UNAUTHORIZED,
            NotConfigured(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for ActionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use ActionError::*;
        match self {
            MethodNotAllowed => write!(f, "Method not allowed"),
            InvalidBody(s) => write!(f, "Invalid request body: {}", s),
            UnknownAction => write!(f, "Unknown action"),
            MissingToken => write!(f, "No token"),
            ValidationError(s) => write!(f, "{}", s),
            NotConfigured(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for ActionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        use ActionError::*;
        match self {
            NotConfigured(e) => Some(e),
            _ => None,
        }
    }
}

impl IntoResponse for ActionError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %crate::unpack_error(&self), "action failed");
        } else {
            tracing::info!(status = status.as_u16(), error = %self, "action rejected");
        }
        (status, Json(ActionResponse::failure(self.to_string()))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ActionError::MethodNotAllowed.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(ActionError::MissingToken.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ActionError::UnknownAction.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ActionError::ValidationError("ItemId required").status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ActionError::NotConfigured(PublishError::NotConfigured).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_validation_message_is_verbatim() {
        let err = ActionError::ValidationError("ORG required for item save");
        assert_eq!(err.to_string(), "ORG required for item save");
    }
}
