use super::{Locale, LocaleSet};

/// True for scheme-prefixed (`https://…`, `mailto:…`) and protocol-relative
/// (`//cdn…`) URLs, which are never rewritten.
pub fn is_absolute_url(path: &str) -> bool {
    if path.starts_with("//") {
        return true;
    }
    match path.split_once(':') {
        Some((scheme, _)) => {
            let mut chars = scheme.chars();
            chars.next().is_some_and(|ch| ch.is_ascii_alphabetic())
                && chars.all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '+' | '-' | '.'))
        }
        None => false,
    }
}

impl LocaleSet {
    /// Encode `locale` into `path`: `/{locale}{path}` unless `locale` is the
    /// default, in which case the (normalized) path is returned unchanged.
    pub fn build_link(&self, path: &str, locale: &Locale) -> String {
        if is_absolute_url(path) {
            return path.to_string();
        }

        let normalized = normalize(path);
        if self.is_default(locale) {
            return normalized;
        }

        if normalized == "/" {
            format!("/{locale}")
        } else if normalized.starts_with("/?") || normalized.starts_with("/#") {
            format!("/{locale}{}", &normalized[1..])
        } else {
            format!("/{locale}{normalized}")
        }
    }

    /// Remove a recognized locale segment from the front of `path`.
    pub fn strip_locale(&self, path: &str) -> String {
        if is_absolute_url(path) {
            return path.to_string();
        }
        let normalized = normalize(path);
        match self.split_locale_prefix(&normalized) {
            Some((_, rest)) => rest,
            None => normalized,
        }
    }

    /// Split `/{locale}{rest}` into the recognized locale and `rest`.
    ///
    /// `rest` always starts with exactly one `/`: an empty remainder becomes
    /// `/`, a remainder that is only a query or fragment is rooted
    /// (`/en?x` -> `/?x`) and repeated leading separators collapse
    /// (`/en//host` -> `/host`), so `rest` is never protocol-relative.
    pub(crate) fn split_locale_prefix(&self, path: &str) -> Option<(Locale, String)> {
        let without_slash = path.strip_prefix('/')?;
        let end = without_slash
            .find(['/', '?', '#'])
            .unwrap_or(without_slash.len());
        let locale = self.recognize(&without_slash[..end])?;
        let remainder = &without_slash[end..];

        let rest = format!("/{}", remainder.trim_start_matches(['/', '\\']));
        Some((locale, rest))
    }
}

fn normalize(path: &str) -> String {
    if path.is_empty() {
        "/".to_string()
    } else if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::i18n::test_locales;

    #[test]
    fn default_locale_is_never_prefixed() {
        let set = test_locales();
        let zh = set.recognize("zh").unwrap();
        assert_eq!(set.build_link("/posts/tech/hello", &zh), "/posts/tech/hello");
        assert_eq!(set.build_link("/", &zh), "/");
        assert_eq!(set.build_link("notes/5", &zh), "/notes/5");
    }

    #[test]
    fn other_locales_are_prefixed() {
        let set = test_locales();
        let en = set.recognize("en").unwrap();
        assert_eq!(set.build_link("/posts", &en), "/en/posts");
        assert_eq!(set.build_link("/", &en), "/en");
        assert_eq!(set.build_link("/?page=2", &en), "/en?page=2");
        assert_eq!(set.build_link("posts?page=2", &en), "/en/posts?page=2");
    }

    #[test]
    fn absolute_urls_pass_through() {
        let set = test_locales();
        let en = set.recognize("en").unwrap();
        for url in [
            "https://example.com/a",
            "http://example.com",
            "mailto:me@example.com",
            "//cdn.example.com/x.png",
        ] {
            assert!(is_absolute_url(url), "{url}");
            assert_eq!(set.build_link(url, &en), url);
            assert_eq!(set.strip_locale(url), url);
        }
        assert!(!is_absolute_url("/posts/a:b"));
        assert!(!is_absolute_url("posts"));
    }

    #[test]
    fn strip_removes_only_recognized_prefixes() {
        let set = test_locales();
        assert_eq!(set.strip_locale("/en/posts/a"), "/posts/a");
        assert_eq!(set.strip_locale("/ja"), "/");
        assert_eq!(set.strip_locale("/ja/"), "/");
        assert_eq!(set.strip_locale("/en?page=2"), "/?page=2");
        assert_eq!(set.strip_locale("/english/posts"), "/english/posts");
        assert_eq!(set.strip_locale("/fr/posts"), "/fr/posts");
        assert_eq!(set.strip_locale("posts"), "/posts");
    }

    #[test]
    fn stripped_remainder_is_never_protocol_relative() {
        let set = test_locales();
        assert_eq!(set.strip_locale("/en//evil.example"), "/evil.example");
        assert_eq!(set.strip_locale("/zh///evil%2Ecom/x"), "/evil%2Ecom/x");
        assert_eq!(set.strip_locale("/ja/\\evil%2Ecom"), "/evil%2Ecom");
        assert_eq!(set.strip_locale("/en//"), "/");
    }

    #[test]
    fn strip_inverts_build_for_every_locale() {
        let set = test_locales();
        let paths = [
            "/",
            "/posts",
            "/posts/",
            "/posts/tech/hello-world",
            "/notes/5?password=x",
            "/timeline#2023",
            "/?page=3",
            "/friends",
        ];
        for locale in set.iter() {
            for path in paths {
                let built = set.build_link(path, locale);
                assert_eq!(set.strip_locale(&built), path, "{locale} {path} -> {built}");
            }
        }
    }
}
