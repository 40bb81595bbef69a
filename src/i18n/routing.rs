use std::sync::Arc;

use axum::http::Uri;

use super::{Locale, LocaleContext, LocaleSet};

/// Where an incoming path stands with respect to locale prefixes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathState {
    NoPrefix,
    /// Starts with the default locale; `canonical` is the path without it.
    HasDefaultPrefix { canonical: String },
    HasNonDefaultPrefix(Locale),
}

/// What the edge should do with a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    /// Asset or API path, untouched by locale routing.
    Bypass,
    /// Already canonical; serve as-is in the prefix's `locale`.
    PassThrough { locale: Locale },
    /// Serve `path_and_query` internally; the visible URL does not change.
    Rewrite {
        path_and_query: String,
        locale: Locale,
    },
    /// Send the client to `location`.
    Redirect { location: String },
}

impl RouteDecision {
    /// Short name used in logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Bypass => "bypass",
            Self::PassThrough { .. } => "pass_through",
            Self::Rewrite { .. } => "rewrite",
            Self::Redirect { .. } => "redirect",
        }
    }

    /// Locale the request will be served in, when it reaches the router.
    pub fn locale(&self) -> Option<&Locale> {
        match self {
            Self::PassThrough { locale } | Self::Rewrite { locale, .. } => Some(locale),
            Self::Bypass | Self::Redirect { .. } => None,
        }
    }
}

/// Per-request locale routing state machine.
#[derive(Debug, Clone)]
pub struct LocaleRouter {
    locales: Arc<LocaleSet>,
    excluded_prefixes: Vec<String>,
}

impl LocaleRouter {
    pub fn new(locales: Arc<LocaleSet>, excluded_prefixes: Vec<String>) -> Self {
        let excluded_prefixes = excluded_prefixes
            .into_iter()
            .map(|prefix| prefix.trim_end_matches('/').to_string())
            .filter(|prefix| !prefix.is_empty())
            .collect();
        Self {
            locales,
            excluded_prefixes,
        }
    }

    pub fn locales(&self) -> &LocaleSet {
        &self.locales
    }

    /// API routes, framework internals and anything that looks like a file.
    pub fn is_excluded(&self, path: &str) -> bool {
        if path.contains('.') {
            return true;
        }
        self.excluded_prefixes.iter().any(|prefix| {
            path == prefix
                || path
                    .strip_prefix(prefix.as_str())
                    .is_some_and(|rest| rest.starts_with('/'))
        })
    }

    pub fn classify(&self, path: &str) -> PathState {
        match self.locales.split_locale_prefix(path) {
            Some((locale, canonical)) if self.locales.is_default(&locale) => {
                PathState::HasDefaultPrefix { canonical }
            }
            Some((locale, _)) => PathState::HasNonDefaultPrefix(locale),
            None => PathState::NoPrefix,
        }
    }

    pub fn decide(&self, uri: &Uri, ctx: &LocaleContext) -> RouteDecision {
        let path = uri.path();
        if self.is_excluded(path) {
            return RouteDecision::Bypass;
        }

        match self.classify(path) {
            PathState::HasDefaultPrefix { canonical } => RouteDecision::Redirect {
                location: with_query(canonical, uri.query()),
            },
            PathState::HasNonDefaultPrefix(locale) => RouteDecision::PassThrough { locale },
            PathState::NoPrefix => {
                let locale = self.locales.resolve(ctx);
                let prefixed = if path == "/" {
                    format!("/{locale}")
                } else {
                    format!("/{locale}{path}")
                };
                let path_and_query = with_query(prefixed, uri.query());

                if self.locales.is_default(&locale) {
                    RouteDecision::Rewrite {
                        path_and_query,
                        locale,
                    }
                } else {
                    RouteDecision::Redirect {
                        location: path_and_query,
                    }
                }
            }
        }
    }
}

fn with_query(path: String, query: Option<&str>) -> String {
    match query {
        Some(query) if !query.is_empty() => format!("{path}?{query}"),
        _ => path,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::i18n::test_locales;

    fn router() -> LocaleRouter {
        LocaleRouter::new(
            Arc::new(test_locales()),
            vec!["/api".into(), "/_next".into(), "/static/".into()],
        )
    }

    fn decide(uri: &str, ctx: LocaleContext) -> RouteDecision {
        let uri: Uri = uri.parse().unwrap();
        let ctx = LocaleContext {
            request_path: Some(uri.path().to_string()),
            ..ctx
        };
        router().decide(&uri, &ctx)
    }

    fn locale(value: &str) -> Locale {
        test_locales().recognize(value).unwrap()
    }

    #[test]
    fn default_prefix_redirects_to_canonical() {
        assert_eq!(
            decide("/zh", LocaleContext::default()),
            RouteDecision::Redirect {
                location: "/".into()
            }
        );
        assert_eq!(
            decide("/zh/posts/a?page=2", LocaleContext::default()),
            RouteDecision::Redirect {
                location: "/posts/a?page=2".into()
            }
        );
    }

    #[test]
    fn no_prefix_with_default_preference_rewrites() {
        assert_eq!(
            decide("/posts", LocaleContext::default()),
            RouteDecision::Rewrite {
                path_and_query: "/zh/posts".into(),
                locale: locale("zh"),
            }
        );
        assert_eq!(
            decide("/", LocaleContext::default()),
            RouteDecision::Rewrite {
                path_and_query: "/zh".into(),
                locale: locale("zh"),
            }
        );
    }

    #[test]
    fn no_prefix_with_other_preference_redirects() {
        let ctx = LocaleContext::default().with_cookie_header("NEXT_LOCALE=en");
        assert_eq!(
            decide("/posts?page=2", ctx),
            RouteDecision::Redirect {
                location: "/en/posts?page=2".into()
            }
        );

        let ctx = LocaleContext::default().with_accept_language("ja-JP,ja;q=0.9");
        assert_eq!(
            decide("/", ctx),
            RouteDecision::Redirect {
                location: "/ja".into()
            }
        );
    }

    #[test]
    fn non_default_prefix_passes_through() {
        let ctx = LocaleContext::default().with_cookie_header("NEXT_LOCALE=en");
        assert_eq!(
            decide("/ja/notes/5", ctx),
            RouteDecision::PassThrough {
                locale: locale("ja")
            }
        );
    }

    #[test]
    fn path_prefix_beats_query_locale() {
        let ctx = LocaleContext::default().with_query_locale("en");
        assert_eq!(
            decide("/ja/notes/5?locale=en", ctx),
            RouteDecision::PassThrough {
                locale: locale("ja")
            }
        );
    }

    #[test]
    fn default_prefix_redirect_stays_on_site() {
        for (uri, expected) in [
            ("/zh//host", "/host"),
            ("/zh//evil%2Ecom", "/evil%2Ecom"),
            ("/zh///evil%2Ecom/x?page=2", "/evil%2Ecom/x?page=2"),
        ] {
            let RouteDecision::Redirect { location } = decide(uri, LocaleContext::default())
            else {
                panic!("{uri} should redirect");
            };
            assert!(!location.starts_with("//"), "{uri} -> {location}");
            assert_eq!(location, expected);
        }
    }

    #[test]
    fn assets_and_api_routes_bypass() {
        let router = router();
        assert!(router.is_excluded("/api/health"));
        assert!(router.is_excluded("/api"));
        assert!(router.is_excluded("/_next/data/x"));
        assert!(router.is_excluded("/static/app.js"));
        assert!(router.is_excluded("/favicon.ico"));
        assert!(!router.is_excluded("/apiary"));
        assert!(!router.is_excluded("/posts"));
        assert_eq!(
            decide("/api/health", LocaleContext::default()),
            RouteDecision::Bypass
        );
    }

    #[test]
    fn classify_reports_path_state() {
        let router = router();
        assert_eq!(router.classify("/posts"), PathState::NoPrefix);
        assert_eq!(
            router.classify("/zh/posts"),
            PathState::HasDefaultPrefix {
                canonical: "/posts".into()
            }
        );
        assert_eq!(
            router.classify("/en"),
            PathState::HasNonDefaultPrefix(locale("en"))
        );
    }
}
