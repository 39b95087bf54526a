//! Middleware for logging requests and responses.

use axum::{
    body::Bytes, extract::Request, http::header::CONTENT_TYPE, middleware::Next,
    response::Response,
};

/// Log the request and response for each request.
///
/// Both the request and response are logged at the `info` level.
/// If a body is longer than [LOG_BODY_LENGTH_LIMIT] bytes, it is
/// truncated and logged in full at the `debug` level. Password fields in
/// JSON request bodies are redacted before logging.
///
/// Bodies are forwarded as the raw bytes that were received; the lossy
/// UTF-8 conversion only ever feeds the log line, so binary payloads
/// such as profile photos pass through unaltered.
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let (parts, body_bytes) = buffer_request(request).await;

    let is_json = parts
        .headers
        .get(CONTENT_TYPE)
        .and_then(|content_type| content_type.to_str().ok())
        .is_some_and(|content_type| content_type.starts_with("application/json"));

    let body_text = String::from_utf8_lossy(&body_bytes);
    if is_json {
        let display_text = redact_password(&body_text, "password");
        log_request(&parts, &display_text);
    } else {
        log_request(&parts, &body_text);
    }

    let request = Request::from_parts(parts, body_bytes.into());
    let response = next.run(request).await;

    let (parts, body_bytes) = buffer_response(response).await;
    log_response(&parts, &String::from_utf8_lossy(&body_bytes));

    Response::from_parts(parts, body_bytes.into())
}

fn redact_password(body_text: &str, field_name: &str) -> String {
    let Ok(mut body) = serde_json::from_str::<serde_json::Value>(body_text) else {
        return body_text.to_string();
    };

    let Some(object) = body.as_object_mut() else {
        return body_text.to_string();
    };

    if let Some(password) = object.get_mut(field_name) {
        *password = serde_json::Value::String("********".to_string());
    }

    body.to_string()
}

async fn buffer_request(request: Request) -> (axum::http::request::Parts, Bytes) {
    let (parts, body) = request.into_parts();
    let body_bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .unwrap_or_default();

    (parts, body_bytes)
}

async fn buffer_response(response: Response) -> (axum::http::response::Parts, Bytes) {
    let (parts, body) = response.into_parts();
    let body_bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .unwrap_or_default();

    (parts, body_bytes)
}

const LOG_BODY_LENGTH_LIMIT: usize = 64;

fn log_request(headers: &axum::http::request::Parts, body: &str) {
    if body.len() > LOG_BODY_LENGTH_LIMIT {
        tracing::info!(
            "Received request: {headers:#?}\nbody: {:}...",
            &body[..LOG_BODY_LENGTH_LIMIT]
        );
        tracing::debug!("Full request body: {body:?}");
    } else {
        tracing::info!("Received request: {headers:#?}\nbody: {body:?}");
    }
}

fn log_response(headers: &axum::http::response::Parts, body: &str) {
    if body.len() > LOG_BODY_LENGTH_LIMIT {
        tracing::info!(
            "Sending response: {headers:#?}\nbody: {:}...",
            &body[..LOG_BODY_LENGTH_LIMIT]
        );
        tracing::debug!("Full response body: {body:?}");
    } else {
        tracing::info!("Sending response: {headers:#?}\nbody: {body:?}");
    }
}

#[cfg(test)]
mod redact_tests {
    use super::redact_password;

    #[test]
    fn redacts_password_field() {
        let body = r#"{"email":"budi@example.com","password":"hunter2"}"#;

        let redacted = redact_password(body, "password");

        assert!(!redacted.contains("hunter2"));
        assert!(redacted.contains("********"));
        assert!(redacted.contains("budi@example.com"));
    }

    #[test]
    fn leaves_bodies_without_password_unchanged() {
        let body = r#"{"name":"Groceries"}"#;

        let redacted = redact_password(body, "password");

        let original: serde_json::Value = serde_json::from_str(body).unwrap();
        let roundtrip: serde_json::Value = serde_json::from_str(&redacted).unwrap();
        assert_eq!(original, roundtrip);
    }

    #[test]
    fn leaves_non_json_bodies_unchanged() {
        let body = "password=hunter2";

        assert_eq!(redact_password(body, "password"), body);
    }
}
