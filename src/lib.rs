use crate::api::ActionResponse;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::error::Error;

pub mod actions;
pub mod api;
pub mod config;
pub mod diff;
pub mod error;
pub mod handler;
pub mod model;
pub mod publisher;
pub mod routes;
pub mod s3;
pub mod session;
pub mod telemetry;
pub mod upstream;

pub fn good_response(body: ActionResponse) -> Response {
    (StatusCode::OK, Json(body)).into_response()
}

pub fn unpack_error(err: &(dyn Error)) -> String {
    let mut parts = Vec::new();
    parts.push(err.to_string());
    let mut current = err.source();
    while let Some(source) = current {
        parts.push(source.to_string());
        current = source.source();
    }
    parts.join(": ")
}

pub fn get_s3_url(service: &str, bucket: &str, key: &str) -> String {
    match service {
        "t3" => format!("https://{}.t3.storage.dev/{}", bucket, key),
        "s3" | "" => format!("https://{}.s3.amazonaws.com/{}", bucket, key),
        _ => format!("https://{}.storage.dev/{}/{}", service, bucket, key),
    }
}
