//! Locale resolution, locale-aware links and the edge routing state machine.
//!
//! The default locale is never written as a path prefix; every other locale
//! always is. All helpers here are pure functions of their inputs.

mod accept_language;
mod links;
mod messages;
mod resolve;
mod routing;

use std::fmt;

use serde::Serialize;
use thiserror::Error;

pub use accept_language::parse_accept_language;
pub use links::is_absolute_url;
pub use messages::MessageCatalog;
pub use resolve::{LOCALE_COOKIE, LOCALE_QUERY_PARAM, LocaleContext};
pub use routing::{LocaleRouter, PathState, RouteDecision};

/// A locale recognized by a [`LocaleSet`].
///
/// Values only come out of [`LocaleSet::recognize`], so holding a `Locale`
/// means the string is one of the configured locales.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Locale(String);

impl Locale {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Locale {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LocaleSetError {
    #[error("at least one locale must be configured")]
    Empty,
    #[error("locale `{0}` is not a valid path segment")]
    InvalidLocale(String),
    #[error("locale `{0}` is configured twice")]
    Duplicate(String),
    #[error("default locale `{0}` is not in the configured locales")]
    UnknownDefault(String),
}

/// The configured locales plus the default one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocaleSet {
    locales: Vec<Locale>,
    default: Locale,
}

impl LocaleSet {
    pub fn new<I, S>(locales: I, default_locale: &str) -> Result<Self, LocaleSetError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut recognized: Vec<Locale> = Vec::new();
        for raw in locales {
            let value: String = raw.into();
            let value = value.trim().to_string();
            if !is_valid_segment(&value) {
                return Err(LocaleSetError::InvalidLocale(value));
            }
            if recognized.iter().any(|locale| locale.0 == value) {
                return Err(LocaleSetError::Duplicate(value));
            }
            recognized.push(Locale(value));
        }

        if recognized.is_empty() {
            return Err(LocaleSetError::Empty);
        }

        let default = recognized
            .iter()
            .find(|locale| locale.0 == default_locale)
            .cloned()
            .ok_or_else(|| LocaleSetError::UnknownDefault(default_locale.to_string()))?;

        Ok(Self {
            locales: recognized,
            default,
        })
    }

    /// Returns the matching locale when `value` is exactly one of the set.
    pub fn recognize(&self, value: &str) -> Option<Locale> {
        self.locales.iter().find(|locale| locale.0 == value).cloned()
    }

    pub fn contains(&self, value: &str) -> bool {
        self.locales.iter().any(|locale| locale.0 == value)
    }

    pub fn default_locale(&self) -> &Locale {
        &self.default
    }

    pub fn is_default(&self, locale: &Locale) -> bool {
        locale == &self.default
    }

    pub fn iter(&self) -> impl Iterator<Item = &Locale> {
        self.locales.iter()
    }

    pub fn len(&self) -> usize {
        self.locales.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locales.is_empty()
    }
}

fn is_valid_segment(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_')
}

#[cfg(test)]
pub(crate) fn test_locales() -> LocaleSet {
    LocaleSet::new(["zh", "en", "ja"], "zh").expect("valid locale set")
}
