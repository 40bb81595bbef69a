use std::sync::Arc;

use axum::{
    Extension, Json, Router,
    extract::{FromRequestParts, Path, Query, State},
    http::{HeaderMap, StatusCode, Uri, request::Parts},
    middleware,
    response::{IntoResponse, Redirect, Response},
    routing::get,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use tower::Layer;
use tracing::debug;

use crate::{
    application::{
        error::AppError,
        pages::{self, InitialData, PageEnvelope, PageState, bootstrap},
    },
    collections::Collections,
    config::I18nSettings,
    i18n::{LOCALE_COOKIE, Locale, LocaleRouter, MessageCatalog, is_absolute_url},
    infra::api::{ApiClient, TimelineKind},
};

use super::{
    locale::locale_routing,
    middleware::{log_responses, set_request_context},
};

const FORWARDED_PROTO: &str = "x-forwarded-proto";
const LOCALE_COOKIE_MAX_AGE_DAYS: i64 = 365;

#[derive(Clone)]
pub struct HttpState {
    pub api: ApiClient,
    pub router: Arc<LocaleRouter>,
    pub messages: Arc<MessageCatalog>,
    pub force_secure_cookie: bool,
}

impl HttpState {
    pub fn new(api: ApiClient, i18n: &I18nSettings, messages: MessageCatalog) -> Self {
        Self {
            api,
            router: Arc::new(LocaleRouter::new(
                Arc::clone(&i18n.locales),
                i18n.excluded_prefixes.clone(),
            )),
            messages: Arc::new(messages),
            force_secure_cookie: i18n.force_secure_cookie,
        }
    }

    /// Error view whose description comes from the locale's message bundle.
    fn error_response(&self, locale: &Locale, err: AppError) -> Response {
        let description = self
            .messages
            .translate(locale, err.message_key())
            .unwrap_or_else(|| err.presentation_message().to_string());
        let view = err.view(description);
        err.into_response_with(view)
    }
}

/// The full application: locale routing wrapped around the page router.
pub fn build_app(state: HttpState) -> Router {
    let locale_layer = middleware::from_fn_with_state(Arc::clone(&state.router), locale_routing);
    let routed = locale_layer.layer(build_router(state));

    Router::new()
        .fallback_service(routed)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

/// Routes as seen after locale routing: every page path is locale-prefixed.
pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/locale/{locale}", get(switch_locale))
        .route("/{locale}", get(home))
        .route("/{locale}/posts", get(post_list))
        .route("/{locale}/posts/{category}/{slug}", get(post_detail))
        .route("/{locale}/notes", get(note_list))
        .route("/{locale}/notes/latest", get(latest_note))
        .route("/{locale}/notes/topics", get(topic_list))
        .route("/{locale}/notes/topics/{slug}", get(topic_detail))
        .route("/{locale}/notes/{id}", get(note_detail))
        .route("/{locale}/categories/{slug}", get(category))
        .route("/{locale}/timeline", get(timeline))
        .route("/{locale}/friends", get(friends))
        .route("/{locale}/projects/{id}", get(project))
        .route("/{locale}/{page}", get(page))
        .fallback(not_found)
        .with_state(state)
}

/// Per-request render state: the resolved locale, a locale-bound set of
/// collections and the bootstrap data every page needs.
pub struct RenderContext {
    pub locale: Locale,
    /// Current path and query without the locale prefix.
    pub path: String,
    pub collections: Collections,
    initial: Arc<InitialData>,
    state: HttpState,
}

impl FromRequestParts<HttpState> for RenderContext {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &HttpState,
    ) -> Result<Self, Self::Rejection> {
        let locales = state.router.locales();
        // Paths that bypassed locale routing are not pages.
        let Some(locale) = parts.extensions.get::<Locale>().cloned() else {
            let fallback = locales.default_locale().clone();
            return Err(state.error_response(&fallback, AppError::NotFound));
        };
        let path = locales.strip_locale(
            parts
                .uri
                .path_and_query()
                .map(|value| value.as_str())
                .unwrap_or("/"),
        );

        let api = state.api.with_locale(&locale);
        let initial = match bootstrap(&api).await {
            Ok(initial) => Arc::new(initial),
            Err(err) => return Err(state.error_response(&locale, err)),
        };

        Ok(Self {
            locale,
            path,
            collections: Collections::new(api),
            initial,
            state: state.clone(),
        })
    }
}

impl RenderContext {
    fn respond<T: Serialize>(self, result: Result<PageState<T>, AppError>) -> Response {
        match result {
            Ok(page) => {
                let messages = self.state.messages.bundle(&self.locale);
                let envelope = PageEnvelope::new(
                    self.state.router.locales(),
                    self.locale,
                    &self.path,
                    messages,
                    self.initial,
                    page,
                );
                Json(envelope).into_response()
            }
            Err(err) => self.state.error_response(&self.locale, err),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ListQuery {
    page: Option<u32>,
    size: Option<u32>,
    year: Option<i32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct NoteQuery {
    password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TimelineQuery {
    #[serde(rename = "type")]
    kind: Option<String>,
    year: Option<i32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SwitchQuery {
    path: Option<String>,
}

async fn health() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn home(ctx: RenderContext) -> Response {
    let result = pages::home(&ctx.collections).await;
    ctx.respond(result)
}

async fn post_list(ctx: RenderContext, Query(query): Query<ListQuery>) -> Response {
    let result = pages::post_list(&ctx.collections, query.page, query.size, query.year).await;
    ctx.respond(result)
}

async fn post_detail(
    ctx: RenderContext,
    Path((_, category, slug)): Path<(String, String, String)>,
) -> Response {
    let result = pages::post_detail(&ctx.collections, &category, &slug).await;
    ctx.respond(result)
}

async fn note_list(ctx: RenderContext, Query(query): Query<ListQuery>) -> Response {
    let result = pages::note_list(&ctx.collections, query.page, query.size).await;
    ctx.respond(result)
}

async fn latest_note(ctx: RenderContext) -> Response {
    let result = pages::latest_note(&ctx.collections).await;
    ctx.respond(result)
}

async fn note_detail(
    ctx: RenderContext,
    Path((_, id)): Path<(String, String)>,
    Query(query): Query<NoteQuery>,
) -> Response {
    let result = pages::note_detail(&ctx.collections, &id, query.password.as_deref()).await;
    ctx.respond(result)
}

async fn topic_list(ctx: RenderContext) -> Response {
    let result = pages::topic_list(&ctx.collections).await;
    ctx.respond(result)
}

async fn topic_detail(
    ctx: RenderContext,
    Path((_, slug)): Path<(String, String)>,
    Query(query): Query<ListQuery>,
) -> Response {
    let result = pages::topic_detail(&ctx.collections, &slug, query.page).await;
    ctx.respond(result)
}

async fn category(ctx: RenderContext, Path((_, slug)): Path<(String, String)>) -> Response {
    let result = pages::category(&ctx.collections, &slug).await;
    ctx.respond(result)
}

async fn timeline(ctx: RenderContext, Query(query): Query<TimelineQuery>) -> Response {
    let kind = query.kind.as_deref().and_then(TimelineKind::parse);
    let result = pages::timeline(&ctx.collections, kind, query.year).await;
    ctx.respond(result)
}

async fn friends(ctx: RenderContext) -> Response {
    let result = pages::friends(&ctx.collections).await;
    ctx.respond(result)
}

async fn project(ctx: RenderContext, Path((_, id)): Path<(String, String)>) -> Response {
    let result = pages::project(&ctx.collections, &id).await;
    ctx.respond(result)
}

async fn page(ctx: RenderContext, Path((_, slug)): Path<(String, String)>) -> Response {
    let result = pages::page(&ctx.collections, &slug).await;
    ctx.respond(result)
}

async fn not_found(State(state): State<HttpState>, locale: Option<Extension<Locale>>) -> Response {
    let locale = match locale {
        Some(Extension(locale)) => locale,
        None => state.router.locales().default_locale().clone(),
    };
    state.error_response(&locale, AppError::NotFound)
}

/// Persist the visitor's locale choice and send them to `path` in it.
async fn switch_locale(
    State(state): State<HttpState>,
    Path(requested): Path<String>,
    Query(query): Query<SwitchQuery>,
    uri: Uri,
    headers: HeaderMap,
    jar: CookieJar,
) -> Response {
    let locales = state.router.locales();
    let Some(locale) = locales.recognize(&requested) else {
        return AppError::validation(format!("unknown locale `{requested}`")).into_response();
    };

    let path = query
        .path
        .as_deref()
        .filter(|path| !path.is_empty() && !is_absolute_url(path))
        .unwrap_or("/");
    let target = locales.build_link(&locales.strip_locale(path), &locale);

    let cookie = Cookie::build((LOCALE_COOKIE, locale.to_string()))
        .path("/")
        .max_age(time::Duration::days(LOCALE_COOKIE_MAX_AGE_DAYS))
        .same_site(SameSite::Lax)
        .secure(state.force_secure_cookie || arrived_over_tls(&uri, &headers))
        .build();

    debug!(
        target = "kami::http::public",
        locale = %locale,
        target_path = %target,
        "locale switched"
    );
    (jar.add(cookie), Redirect::to(&target)).into_response()
}

fn arrived_over_tls(uri: &Uri, headers: &HeaderMap) -> bool {
    if uri.scheme_str() == Some("https") {
        return true;
    }
    headers
        .get(FORWARDED_PROTO)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .is_some_and(|proto| proto.trim().eq_ignore_ascii_case("https"))
}
