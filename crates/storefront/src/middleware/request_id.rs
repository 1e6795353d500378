//! Request ID middleware.
//!
//! Each request carries an `x-request-id`: the upstream one when it looks
//! sane, otherwise a fresh UUID v4. The id is recorded on the request span,
//! tagged on the Sentry scope, and echoed in the response.

use axum::{extract::Request, http::HeaderValue, middleware::Next, response::Response};
use tracing::Span;
use uuid::Uuid;

/// The HTTP header name for request IDs.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Longest upstream id accepted as is.
const MAX_REQUEST_ID_LEN: usize = 128;

/// Middleware that ensures every request has a request ID.
pub async fn request_id_middleware(request: Request, next: Next) -> Response {
    let request_id = upstream_id(request.headers().get(REQUEST_ID_HEADER))
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    Span::current().record("request_id", request_id.as_str());
    sentry::configure_scope(|scope| {
        scope.set_tag("request_id", &request_id);
    });

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

fn upstream_id(header: Option<&HeaderValue>) -> Option<String> {
    let id = header?.to_str().ok()?.trim();
    let valid = !id.is_empty()
        && id.len() <= MAX_REQUEST_ID_LEN
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    valid.then(|| id.to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_id_kept_when_sane() {
        let value = HeaderValue::from_static("cf-8a1b2c3d");
        assert_eq!(upstream_id(Some(&value)).as_deref(), Some("cf-8a1b2c3d"));
    }

    #[test]
    fn test_upstream_id_rejected_when_odd() {
        assert!(upstream_id(None).is_none());
        assert!(upstream_id(Some(&HeaderValue::from_static("a b"))).is_none());
        let long = "x".repeat(MAX_REQUEST_ID_LEN + 1);
        assert!(upstream_id(Some(&HeaderValue::from_str(&long).unwrap())).is_none());
    }
}
