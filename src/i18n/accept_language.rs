use std::cmp::Ordering;

use super::{Locale, LocaleSet};

/// Pick the best configured locale for an `Accept-Language` header.
///
/// Ranges are ordered by `q` (default 1, stable for ties). Each range matches
/// a locale either exactly or through its primary subtag (`zh-CN` -> `zh`).
/// Ranges with `q=0` are not acceptable and are skipped.
pub fn parse_accept_language(header: &str, locales: &LocaleSet) -> Option<Locale> {
    let mut ranges: Vec<(String, f32)> = header
        .split(',')
        .filter_map(|part| {
            let mut pieces = part.trim().split(';');
            let range = pieces.next()?.trim().to_ascii_lowercase();
            if range.is_empty() {
                return None;
            }
            let mut q = 1.0_f32;
            for param in pieces {
                if let Some(value) = param.trim().strip_prefix("q=")
                    && let Ok(parsed) = value.trim().parse::<f32>()
                {
                    q = parsed;
                }
            }
            Some((range, q))
        })
        .collect();

    ranges.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));

    ranges
        .iter()
        .filter(|(_, q)| *q > 0.0)
        .find_map(|(range, _)| match_range(range, locales))
}

fn match_range(range: &str, locales: &LocaleSet) -> Option<Locale> {
    if let Some(locale) = locales.recognize(range) {
        return Some(locale);
    }
    let primary = range.split('-').next()?;
    locales.recognize(primary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::i18n::test_locales;

    fn best(header: &str) -> Option<String> {
        parse_accept_language(header, &test_locales()).map(|locale| locale.to_string())
    }

    #[test]
    fn highest_q_wins() {
        assert_eq!(best("en;q=0.5,ja;q=0.9"), Some("ja".into()));
    }

    #[test]
    fn region_tags_fall_back_to_primary_subtag() {
        assert_eq!(best("zh-TW,en;q=0.8"), Some("zh".into()));
        assert_eq!(best("en-US,en;q=0.9,zh-CN;q=0.8"), Some("en".into()));
    }

    #[test]
    fn unknown_ranges_are_skipped() {
        assert_eq!(best("fr-FR,de;q=0.9,ja;q=0.1"), Some("ja".into()));
        assert_eq!(best("fr,de"), None);
    }

    #[test]
    fn empty_and_wildcard_headers_do_not_match() {
        assert_eq!(best(""), None);
        assert_eq!(best("   "), None);
        assert_eq!(best("*"), None);
    }

    #[test]
    fn zero_quality_is_not_acceptable() {
        assert_eq!(best("en;q=0,ja;q=0.2"), Some("ja".into()));
    }

    #[test]
    fn ties_keep_header_order() {
        assert_eq!(best("ja,en"), Some("ja".into()));
    }
}
