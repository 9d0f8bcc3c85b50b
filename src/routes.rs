use axum::{
    Router,
    http::{
        Method,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    routing::{get, post},
};
use tower_http::cors::{Any, CorsLayer};

use crate::handler::{AppState, healthcheck, method_not_allowed, validate};

pub const FRONT_DOOR_PATH: &str = "/api/validate";

pub fn routes(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION]);

    Router::new()
        .route("/", get(healthcheck))
        .route(FRONT_DOOR_PATH, post(validate).fallback(method_not_allowed))
        .layer(cors)
        .with_state(state)
}
