use axum::http::{
    HeaderMap, Uri,
    header::{ACCEPT_LANGUAGE, COOKIE},
};
use axum_extra::extract::cookie::Cookie;

use super::{Locale, LocaleSet, parse_accept_language};

/// Cookie persisting the visitor's locale choice.
pub const LOCALE_COOKIE: &str = "NEXT_LOCALE";

/// Query parameter carrying an explicit locale.
pub const LOCALE_QUERY_PARAM: &str = "locale";

/// Everything locale resolution may look at.
///
/// Server requests fill `request_path`, `cookie_header` and
/// `accept_language`; client route state fills `pathname` and `as_path`.
/// Both may carry `query_locale`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocaleContext {
    pub query_locale: Option<String>,
    pub request_path: Option<String>,
    pub as_path: Option<String>,
    pub pathname: Option<String>,
    pub cookie_header: Option<String>,
    pub accept_language: Option<String>,
}

impl LocaleContext {
    /// Capture the locale-relevant parts of a server request.
    pub fn from_request(uri: &Uri, headers: &HeaderMap) -> Self {
        let header = |name| {
            headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
        };

        Self {
            query_locale: uri.query().and_then(query_locale),
            request_path: Some(uri.path().to_string()),
            as_path: None,
            pathname: None,
            cookie_header: header(COOKIE),
            accept_language: header(ACCEPT_LANGUAGE),
        }
    }

    /// Capture client-side route state.
    pub fn from_route(pathname: &str, as_path: &str) -> Self {
        let query_locale = as_path
            .split_once('?')
            .and_then(|(_, query)| query_locale(query));
        Self {
            query_locale,
            pathname: Some(pathname.to_string()),
            as_path: Some(as_path.to_string()),
            ..Self::default()
        }
    }

    pub fn with_query_locale(mut self, locale: impl Into<String>) -> Self {
        self.query_locale = Some(locale.into());
        self
    }

    pub fn with_cookie_header(mut self, header: impl Into<String>) -> Self {
        self.cookie_header = Some(header.into());
        self
    }

    pub fn with_accept_language(mut self, header: impl Into<String>) -> Self {
        self.accept_language = Some(header.into());
        self
    }
}

impl LocaleSet {
    /// Resolve the active locale: query, path, cookie, Accept-Language, default.
    pub fn resolve(&self, ctx: &LocaleContext) -> Locale {
        self.explicit_locale(ctx)
            .or_else(|| self.preferred_locale(ctx))
            .unwrap_or_else(|| self.default_locale().clone())
    }

    /// Locale named by the query or the URL itself.
    pub(crate) fn explicit_locale(&self, ctx: &LocaleContext) -> Option<Locale> {
        if let Some(locale) = ctx.query_locale.as_deref().and_then(|q| self.recognize(q)) {
            return Some(locale);
        }

        [&ctx.request_path, &ctx.as_path, &ctx.pathname]
            .into_iter()
            .flatten()
            .find_map(|path| first_segment(path).and_then(|segment| self.recognize(segment)))
    }

    /// Locale the visitor asked for without naming it in the URL.
    pub(crate) fn preferred_locale(&self, ctx: &LocaleContext) -> Option<Locale> {
        if let Some(locale) = ctx
            .cookie_header
            .as_deref()
            .and_then(|header| self.cookie_locale(header))
        {
            return Some(locale);
        }

        ctx.accept_language
            .as_deref()
            .and_then(|header| parse_accept_language(header, self))
    }

    fn cookie_locale(&self, header: &str) -> Option<Locale> {
        Cookie::split_parse(header)
            .filter_map(Result::ok)
            .find(|cookie| cookie.name() == LOCALE_COOKIE)
            .and_then(|cookie| self.recognize(cookie.value().trim()))
    }
}

fn query_locale(query: &str) -> Option<String> {
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == LOCALE_QUERY_PARAM)
        .map(|(_, value)| value.into_owned())
}

pub(crate) fn first_segment(path: &str) -> Option<&str> {
    let path = path.split(['?', '#']).next().unwrap_or_default().trim();
    path.split('/').find(|segment| !segment.is_empty())
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;
    use crate::i18n::test_locales;

    fn resolve(ctx: &LocaleContext) -> String {
        test_locales().resolve(ctx).to_string()
    }

    #[test]
    fn empty_context_resolves_default() {
        assert_eq!(resolve(&LocaleContext::default()), "zh");
    }

    #[test]
    fn query_beats_cookie_beats_accept_language() {
        let ctx = LocaleContext::default()
            .with_query_locale("ja")
            .with_cookie_header("theme=dark; NEXT_LOCALE=en")
            .with_accept_language("zh-CN");
        assert_eq!(resolve(&ctx), "ja");

        let ctx = LocaleContext::default()
            .with_cookie_header("NEXT_LOCALE=en")
            .with_accept_language("ja");
        assert_eq!(resolve(&ctx), "en");

        let ctx = LocaleContext::default().with_accept_language("ja,en;q=0.4");
        assert_eq!(resolve(&ctx), "ja");
    }

    #[test]
    fn unrecognized_values_fall_through() {
        let ctx = LocaleContext::default()
            .with_query_locale("fr")
            .with_cookie_header("NEXT_LOCALE=de")
            .with_accept_language("en-GB");
        assert_eq!(resolve(&ctx), "en");
    }

    #[test]
    fn request_path_beats_cookie() {
        let uri: Uri = "/ja/notes/5".parse().unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("NEXT_LOCALE=en"));
        let ctx = LocaleContext::from_request(&uri, &headers);
        assert_eq!(resolve(&ctx), "ja");
    }

    #[test]
    fn request_query_is_read_from_uri() {
        let uri: Uri = "/posts?page=2&locale=en".parse().unwrap();
        let ctx = LocaleContext::from_request(&uri, &HeaderMap::new());
        assert_eq!(ctx.query_locale.as_deref(), Some("en"));
        assert_eq!(resolve(&ctx), "en");
    }

    #[test]
    fn client_route_prefers_as_path_over_pathname() {
        let ctx = LocaleContext::from_route("/[locale]/posts", "/en/posts?page=2");
        assert_eq!(resolve(&ctx), "en");

        let ctx = LocaleContext::from_route("/ja/posts", "/posts");
        assert_eq!(resolve(&ctx), "ja");
    }

    #[test]
    fn first_segment_ignores_query_and_empty_segments() {
        assert_eq!(first_segment("//en//posts"), Some("en"));
        assert_eq!(first_segment("/?locale=en"), None);
        assert_eq!(first_segment("/ja#top"), Some("ja"));
    }
}
