//! Helpers for building the standard JSON response envelope.
//!
//! Every JSON response has the shape `{status, message?, data?}` where
//! `status` is either `"success"` or `"error"`. Error responses are
//! produced by the [IntoResponse](axum::response::IntoResponse) impl on
//! [Error](crate::Error).

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;

/// A 200 response carrying `data`.
pub fn success<T: Serialize>(data: T) -> Response {
    (
        StatusCode::OK,
        Json(json!({
            "status": "success",
            "data": data,
        })),
    )
        .into_response()
}

/// A 200 response with only a message.
pub fn success_message(message: &str) -> Response {
    (
        StatusCode::OK,
        Json(json!({
            "status": "success",
            "message": message,
        })),
    )
        .into_response()
}

/// A 200 response with a message and `data`.
pub fn success_with_message<T: Serialize>(message: &str, data: T) -> Response {
    (
        StatusCode::OK,
        Json(json!({
            "status": "success",
            "message": message,
            "data": data,
        })),
    )
        .into_response()
}

/// A 201 response for a newly created resource.
pub fn created<T: Serialize>(message: &str, data: T) -> Response {
    (
        StatusCode::CREATED,
        Json(json!({
            "status": "success",
            "message": message,
            "data": data,
        })),
    )
        .into_response()
}
