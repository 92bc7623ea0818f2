//! Message language selection for a request.
//!
//! Precedence: an explicit `lang` query parameter, then the `Accept-Language`
//! header (highest quality first), then the registry's default language.
//! Only languages the registry actually has tables for are accepted.

use crate::i18n::MessageRegistry;

/// Pick the language to resolve messages in.
///
/// # Arguments
/// * `registry` - Registry whose languages are eligible
/// * `requested` - Value of the `lang` query parameter, if any
/// * `accept_language` - Raw `Accept-Language` header, if any
pub fn negotiate(
    registry: &MessageRegistry,
    requested: Option<&str>,
    accept_language: Option<&str>,
) -> String {
    let explicit = requested.map(primary_tag).into_iter();
    let preferred = accept_language.map(parse_accept_language).unwrap_or_default();

    explicit
        .chain(preferred)
        .find(|language| registry.has_language(language))
        .unwrap_or_else(|| registry.default_language().to_string())
}

/// Primary subtags from an `Accept-Language` header, ordered by quality.
///
/// Entries with `q=0` and the `*` wildcard are dropped.
pub fn parse_accept_language(header: &str) -> Vec<String> {
    let mut weighted: Vec<(String, f32)> = header
        .split(',')
        .filter_map(|entry| {
            let mut parts = entry.split(';');
            let tag = parts.next()?.trim();
            if tag.is_empty() || tag == "*" {
                return None;
            }

            let quality = parts
                .filter_map(|param| param.trim().strip_prefix("q="))
                .find_map(|q| q.trim().parse::<f32>().ok())
                .unwrap_or(1.0);

            (quality > 0.0).then(|| (primary_tag(tag), quality))
        })
        .collect();

    // Stable sort keeps header order among equal weights
    weighted.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    weighted.into_iter().map(|(tag, _)| tag).collect()
}

/// `fa-IR` -> `fa`, `EN_us` -> `en`
fn primary_tag(tag: &str) -> String {
    tag.trim()
        .split(['-', '_'])
        .next()
        .unwrap_or_default()
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> MessageRegistry {
        let registry = MessageRegistry::new("fa");
        registry.register("COMMON", "en", [("A", "a")]);
        registry.register("COMMON", "fa", [("A", "الف")]);
        registry
    }

    #[test]
    fn test_parse_accept_language_orders_by_quality() {
        assert_eq!(
            parse_accept_language("de;q=0.3, en-US;q=0.8, fa-IR"),
            vec!["fa", "en", "de"]
        );
    }

    #[test]
    fn test_parse_accept_language_drops_wildcard_and_zero_quality() {
        assert_eq!(parse_accept_language("*, en;q=0, fa;q=0.5"), vec!["fa"]);
        assert!(parse_accept_language("").is_empty());
    }

    #[test]
    fn test_parse_accept_language_tolerates_bad_quality() {
        assert_eq!(parse_accept_language("en;q=abc"), vec!["en"]);
    }

    #[test]
    fn test_negotiate_prefers_explicit_parameter() {
        let registry = registry();
        assert_eq!(negotiate(&registry, Some("EN"), Some("fa")), "en");
    }

    #[test]
    fn test_negotiate_uses_header_when_parameter_unknown() {
        let registry = registry();
        assert_eq!(negotiate(&registry, Some("de"), Some("de-DE, en;q=0.9")), "en");
    }

    #[test]
    fn test_negotiate_falls_back_to_default() {
        let registry = registry();
        assert_eq!(negotiate(&registry, None, None), "fa");
        assert_eq!(negotiate(&registry, None, Some("fr, de")), "fa");
    }
}
