//! Edge locale routing applied before the router sees the request.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{
        HeaderValue, Request, StatusCode, Uri,
        header::VARY,
        uri::PathAndQuery,
    },
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use metrics::counter;
use tracing::debug;

use crate::{
    application::error::ErrorReport,
    i18n::{Locale, LocaleContext, LocaleRouter, RouteDecision},
};

const VARY_ACCEPT_LANGUAGE: HeaderValue = HeaderValue::from_static("accept-language");

/// How locale routing handled a request, attached to its response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocaleOutcome {
    pub route: &'static str,
    pub locale: Option<Locale>,
}

impl From<&RouteDecision> for LocaleOutcome {
    fn from(decision: &RouteDecision) -> Self {
        Self {
            route: decision.label(),
            locale: decision.locale().cloned(),
        }
    }
}

/// Redirect, rewrite or pass the request through according to its locale.
///
/// Requests that reach the router carry the resolved [`Locale`] as an
/// extension; every response carries a [`LocaleOutcome`].
pub async fn locale_routing(
    State(router): State<Arc<LocaleRouter>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let ctx = LocaleContext::from_request(request.uri(), request.headers());
    let decision = router.decide(request.uri(), &ctx);
    let outcome = LocaleOutcome::from(&decision);

    let mut response = apply(decision, request, next).await;
    response.extensions_mut().insert(outcome);
    response
}

async fn apply(decision: RouteDecision, mut request: Request<Body>, next: Next) -> Response {
    match decision {
        RouteDecision::Bypass => next.run(request).await,
        RouteDecision::PassThrough { locale } => {
            request.extensions_mut().insert(locale);
            next.run(request).await
        }
        RouteDecision::Rewrite {
            path_and_query,
            locale,
        } => {
            let rewritten = match rewrite_uri(request.uri(), &path_and_query) {
                Ok(uri) => uri,
                Err(err) => {
                    let mut response = StatusCode::BAD_REQUEST.into_response();
                    ErrorReport::from_error(
                        "infra::http::locale::rewrite",
                        StatusCode::BAD_REQUEST,
                        &err,
                    )
                    .attach(&mut response);
                    return response;
                }
            };
            debug!(
                target = "kami::http::locale",
                from = %request.uri(),
                to = %rewritten,
                "locale rewrite"
            );
            *request.uri_mut() = rewritten;
            request.extensions_mut().insert(locale);

            let mut response = next.run(request).await;
            vary_on_language(&mut response);
            response
        }
        RouteDecision::Redirect { location } => {
            counter!("kami_locale_redirect_total").increment(1);
            let mut response = Redirect::temporary(&location).into_response();
            vary_on_language(&mut response);
            response
        }
    }
}

fn rewrite_uri(uri: &Uri, path_and_query: &str) -> Result<Uri, axum::http::Error> {
    let mut parts = uri.clone().into_parts();
    parts.path_and_query = Some(PathAndQuery::try_from(path_and_query)?);
    Ok(Uri::from_parts(parts)?)
}

fn vary_on_language(response: &mut Response) {
    response.headers_mut().append(VARY, VARY_ACCEPT_LANGUAGE);
}

#[cfg(test)]
mod tests {
    use axum::{Router, routing::get};
    use tower::{Layer, ServiceExt};

    use super::*;
    use crate::i18n::test_locales;

    async fn route(uri: &str) -> Response {
        let router = Arc::new(LocaleRouter::new(
            Arc::new(test_locales()),
            vec!["/api".into()],
        ));
        let pages = Router::new()
            .route("/{locale}/posts", get(|| async { "posts" }))
            .route("/api/health", get(|| async { StatusCode::NO_CONTENT }));
        let app = axum::middleware::from_fn_with_state(router, locale_routing).layer(pages);
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        app.oneshot(request).await.unwrap()
    }

    fn outcome(response: &Response) -> &LocaleOutcome {
        response.extensions().get::<LocaleOutcome>().unwrap()
    }

    #[tokio::test]
    async fn every_response_records_the_routing_outcome() {
        let rewritten = route("/posts").await;
        assert_eq!(rewritten.status(), StatusCode::OK);
        assert_eq!(outcome(&rewritten).route, "rewrite");
        assert_eq!(outcome(&rewritten).locale.as_ref().map(Locale::as_str), Some("zh"));

        let passed = route("/en/posts?locale=ja").await;
        assert_eq!(outcome(&passed).route, "pass_through");
        assert_eq!(outcome(&passed).locale.as_ref().map(Locale::as_str), Some("en"));

        let redirected = route("/zh/posts").await;
        assert_eq!(redirected.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(outcome(&redirected).route, "redirect");
        assert!(outcome(&redirected).locale.is_none());

        let bypassed = route("/api/health").await;
        assert_eq!(bypassed.status(), StatusCode::NO_CONTENT);
        assert_eq!(outcome(&bypassed).route, "bypass");
    }

    #[test]
    fn rewrite_keeps_authority() {
        let uri: Uri = "http://blog.example/posts?page=2".parse().unwrap();
        let rewritten = rewrite_uri(&uri, "/zh/posts?page=2").unwrap();
        assert_eq!(rewritten.to_string(), "http://blog.example/zh/posts?page=2");
    }

    #[test]
    fn rewrite_origin_form() {
        let uri: Uri = "/".parse().unwrap();
        let rewritten = rewrite_uri(&uri, "/zh").unwrap();
        assert_eq!(rewritten, "/zh");
    }
}
