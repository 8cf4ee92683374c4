//! Middleware for logging requests and responses.

use axum::{extract::Request, http::header::CONTENT_TYPE, middleware::Next, response::Response};

/// Log the request and response for each request.
///
/// Both the request and response are logged at the `info` level.
/// If the response body is longer than [LOG_BODY_LENGTH_LIMIT] bytes, it is
/// truncated and logged at the `debug` level.
///
/// Password fields in JSON request bodies are redacted before logging.
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let (headers, body_text) = extract_header_and_body_text_from_request(request).await;

    let is_json = headers
        .headers
        .get(CONTENT_TYPE)
        .and_then(|content_type| content_type.to_str().ok())
        .is_some_and(|content_type| content_type.starts_with("application/json"));

    if headers.method.eq(&axum::http::Method::POST) && is_json {
        let display_text = redact_password(&body_text, "password");
        log_request(&headers, &display_text);
    } else {
        log_request(&headers, &body_text);
    }

    let request = Request::from_parts(headers, body_text.into());
    let response = next.run(request).await;

    let (headers, body_text) = extract_header_and_body_text_from_response(response).await;
    log_response(&headers, &body_text);

    Response::from_parts(headers, body_text.into())
}

/// Replace the string value of `field_name` in a JSON object with asterisks.
///
/// The body is treated as text rather than parsed, so a body that is not
/// valid JSON is returned unchanged rather than dropped from the log.
fn redact_password(body_text: &str, field_name: &str) -> String {
    let key = format!("\"{field_name}\"");

    let key_start = match body_text.find(&key) {
        Some(key_start) => key_start,
        None => return body_text.to_string(),
    };

    let after_key = &body_text[key_start + key.len()..];
    let colon_offset = match after_key.find(':') {
        Some(colon_offset) => colon_offset,
        None => return body_text.to_string(),
    };

    let after_colon = &after_key[colon_offset + 1..];
    let value_start = match after_colon.find('"') {
        Some(quote_offset) => quote_offset + 1,
        None => return body_text.to_string(),
    };

    let value_end = match after_colon[value_start..].find('"') {
        Some(end_quote_offset) => value_start + end_quote_offset,
        None => return body_text.to_string(),
    };

    if value_end == value_start {
        return body_text.to_string();
    }

    // Splice around the matched value so other fields that happen to contain
    // the same text are left alone.
    let value_offset = key_start + key.len() + colon_offset + 1;
    let mut redacted = String::with_capacity(body_text.len());
    redacted.push_str(&body_text[..value_offset + value_start]);
    redacted.push_str("********");
    redacted.push_str(&body_text[value_offset + value_end..]);

    redacted
}

async fn extract_header_and_body_text_from_request(
    request: Request,
) -> (axum::http::request::Parts, String) {
    let (headers, body) = request.into_parts();
    let body_bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();

    (headers, String::from_utf8_lossy(&body_bytes).to_string())
}

async fn extract_header_and_body_text_from_response(
    response: Response,
) -> (axum::http::response::Parts, String) {
    let (headers, body) = response.into_parts();
    let body_bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();

    (headers, String::from_utf8_lossy(&body_bytes).to_string())
}

/// How many bytes of a request or response body are logged at the `info` level.
pub const LOG_BODY_LENGTH_LIMIT: usize = 64;

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
mod redact_password_tests {
    use crate::logging::redact_password;

    #[test]
    fn redacts_password_value() {
        let body = r#"{"username":"alice99","password":"hunter21"}"#;

        let redacted = redact_password(body, "password");

        assert_eq!(redacted, r#"{"username":"alice99","password":"********"}"#);
    }

    #[test]
    fn redacts_password_with_spaces_around_colon() {
        let body = r#"{ "password" : "hunter21" }"#;

        let redacted = redact_password(body, "password");

        assert_eq!(redacted, r#"{ "password" : "********" }"#);
    }

    #[test]
    fn redacts_only_the_password_field() {
        let body = r#"{"username":"hunter21","password":"hunter21"}"#;

        let redacted = redact_password(body, "password");

        assert_eq!(redacted, r#"{"username":"hunter21","password":"********"}"#);
    }

    #[test]
    fn leaves_body_without_password_unchanged() {
        let body = r#"{"description":"Groceries","amount":42.5}"#;

        let redacted = redact_password(body, "password");

        assert_eq!(redacted, body);
    }

    #[test]
    fn leaves_invalid_json_unchanged() {
        let body = "not json at all";

        let redacted = redact_password(body, "password");

        assert_eq!(redacted, body);
    }
}
