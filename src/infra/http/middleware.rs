//! Request ids and per-response logging for the locale-routed app.

use std::time::Instant;

use axum::{
    body::Body,
    http::{HeaderMap, HeaderName, HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::application::error::ErrorReport;

use super::locale::LocaleOutcome;

pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

const MAX_REQUEST_ID_LEN: usize = 128;

#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
}

impl RequestContext {
    /// Keep a well-formed id set by a fronting proxy, otherwise mint one.
    fn from_headers(headers: &HeaderMap) -> Self {
        let request_id = headers
            .get(&REQUEST_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|id| is_valid_request_id(id))
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        Self { request_id }
    }
}

fn is_valid_request_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_REQUEST_ID_LEN
        && id
            .bytes()
            .all(|byte| byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b'.'))
}

/// Tag the request with an id and echo it as `x-request-id`.
pub async fn set_request_context(mut request: Request<Body>, next: Next) -> Response {
    let ctx = RequestContext::from_headers(request.headers());
    let header = HeaderValue::from_str(&ctx.request_id);
    request.extensions_mut().insert(ctx);

    let mut response = next.run(request).await;
    if let Ok(value) = header {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

/// Log each response with its locale routing outcome; failures carry the
/// attached [`ErrorReport`].
pub async fn log_responses(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let request_id = request
        .extensions()
        .get::<RequestContext>()
        .map(|ctx| ctx.request_id.clone())
        .unwrap_or_default();

    let mut response = next.run(request).await;
    let status = response.status();
    let elapsed_ms = start.elapsed().as_millis();

    let (route, locale) = match response.extensions().get::<LocaleOutcome>() {
        Some(outcome) => (
            outcome.route,
            outcome
                .locale
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_default(),
        ),
        None => ("unrouted", String::new()),
    };

    if !(status.is_client_error() || status.is_server_error()) {
        debug!(
            target = "kami::http::response",
            status = status.as_u16(),
            method = %method,
            path = %uri.path(),
            route,
            locale = %locale,
            elapsed_ms,
            request_id = %request_id,
            "request served",
        );
        return response;
    }

    let report = response.extensions_mut().remove::<ErrorReport>();
    let (source, messages) = match report {
        Some(report) => (report.source, report.messages),
        None => ("unknown", Vec::new()),
    };
    let detail = messages
        .first()
        .cloned()
        .unwrap_or_else(|| "no diagnostic available".to_string());

    if status.is_server_error() {
        error!(
            target = "kami::http::response",
            status = status.as_u16(),
            method = %method,
            path = %uri.path(),
            query = uri.query().unwrap_or(""),
            route,
            locale = %locale,
            elapsed_ms,
            source,
            detail = %detail,
            chain = ?messages,
            request_id = %request_id,
            "request failed",
        );
    } else {
        warn!(
            target = "kami::http::response",
            status = status.as_u16(),
            method = %method,
            path = %uri.path(),
            query = uri.query().unwrap_or(""),
            route,
            locale = %locale,
            elapsed_ms,
            source,
            detail = %detail,
            chain = ?messages,
            request_id = %request_id,
            "client request error",
        );
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers_with(id: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(REQUEST_ID_HEADER, HeaderValue::from_static(id));
        headers
    }

    #[test]
    fn proxy_request_id_is_kept_when_well_formed() {
        let ctx = RequestContext::from_headers(&headers_with("edge-42.a_b"));
        assert_eq!(ctx.request_id, "edge-42.a_b");
    }

    #[test]
    fn malformed_or_missing_request_id_is_replaced() {
        for headers in [
            HeaderMap::new(),
            headers_with(""),
            headers_with("has space"),
            headers_with("a\"b"),
        ] {
            let ctx = RequestContext::from_headers(&headers);
            assert!(Uuid::parse_str(&ctx.request_id).is_ok(), "{}", ctx.request_id);
        }

        let long = "x".repeat(MAX_REQUEST_ID_LEN + 1);
        let mut headers = HeaderMap::new();
        headers.insert(REQUEST_ID_HEADER, HeaderValue::from_str(&long).unwrap());
        assert_ne!(RequestContext::from_headers(&headers).request_id, long);
    }
}
