//! Resolution of links found in rendered markup.
//!
//! Links are joined onto a base URL with RFC 3986 reference resolution
//! (`url::Url::join`), so page-relative paths and dot segments resolve the
//! way a browser resolves them. Only `http(s)` targets are accepted.

use url::Url;

/// Why an `href`/`src` value could not be turned into an absolute URL.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UrlError {
    /// The URL links are resolved against is not absolute.
    #[error("invalid base URL '{url}': {reason}")]
    InvalidBase {
        /// The base URL.
        url: String,
        /// Parser message.
        reason: String,
    },

    /// The value cannot be parsed as a URL reference.
    #[error("malformed URL '{href}': {reason}")]
    Malformed {
        /// The link value.
        href: String,
        /// Parser message.
        reason: String,
    },

    /// An absolute URL with no host.
    #[error("URL '{0}' has no host")]
    MissingHost(String),

    /// A scheme other than `http`/`https`.
    #[error("unsupported URL scheme in '{0}'")]
    UnsupportedScheme(String),
}

/// Parses the absolute URL that links will be resolved against.
///
/// # Errors
///
/// Returns [`UrlError::InvalidBase`] if `url` is not an absolute URL.
pub fn parse_base(url: &str) -> Result<Url, UrlError> {
    Url::parse(url.trim()).map_err(|e| UrlError::InvalidBase {
        url: url.to_owned(),
        reason: e.to_string(),
    })
}

/// Resolves a link value from the markup against `base`.
///
/// Returns `Ok(None)` for values that are not links to another page
/// (empty, fragment-only, `javascript:`).
///
/// # Errors
///
/// Returns [`UrlError`] if the value is present but cannot be made into an
/// absolute `http(s)` URL.
pub fn join_link(base: &Url, href: &str) -> Result<Option<String>, UrlError> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return Ok(None);
    }
    if href
        .get(..11)
        .is_some_and(|scheme| scheme.eq_ignore_ascii_case("javascript:"))
    {
        return Ok(None);
    }

    let joined = base.join(href).map_err(|e| UrlError::Malformed {
        href: href.to_owned(),
        reason: e.to_string(),
    })?;

    if !matches!(joined.scheme(), "http" | "https") {
        return Err(UrlError::UnsupportedScheme(href.to_owned()));
    }
    if joined.host_str().is_none_or(str::is_empty) {
        return Err(UrlError::MissingHost(href.to_owned()));
    }

    Ok(Some(joined.into()))
}

/// Resolves a link value against the page (or origin) it was found on.
///
/// # Errors
///
/// Returns [`UrlError::InvalidBase`] for an unusable `base` and the
/// [`join_link`] errors for an unusable `href`.
pub fn resolve_url(base: &str, href: &str) -> Result<Option<String>, UrlError> {
    join_link(&parse_base(base)?, href)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_root_relative_path() {
        assert_eq!(
            resolve_url("https://example.test", "/programs/123").unwrap(),
            Some("https://example.test/programs/123".to_string())
        );
    }

    #[test]
    fn root_relative_ignores_page_path() {
        assert_eq!(
            resolve_url(
                "https://www.animax.co.jp/programs/schedule_weekly",
                "/programs/AX1"
            )
            .unwrap(),
            Some("https://www.animax.co.jp/programs/AX1".to_string())
        );
    }

    #[test]
    fn resolves_bare_relative_path_against_origin() {
        assert_eq!(
            resolve_url("https://example.test/", "programs/9").unwrap(),
            Some("https://example.test/programs/9".to_string())
        );
    }

    #[test]
    fn page_relative_links_follow_the_page_directory() {
        let page = "https://www.wowow.co.jp/schedule/20240414";
        assert_eq!(
            resolve_url(page, "20240415").unwrap(),
            Some("https://www.wowow.co.jp/schedule/20240415".to_string())
        );
        assert_eq!(
            resolve_url(page, "../schedule/20240415").unwrap(),
            Some("https://www.wowow.co.jp/schedule/20240415".to_string())
        );
        assert_eq!(
            resolve_url(page, "?date=20240415").unwrap(),
            Some("https://www.wowow.co.jp/schedule/20240414?date=20240415".to_string())
        );
    }

    #[test]
    fn multibyte_links_resolve_without_panicking() {
        assert_eq!(
            resolve_url("https://www.animax.co.jp", "番組詳細ページ").unwrap(),
            Some(
                "https://www.animax.co.jp/%E7%95%AA%E7%B5%84%E8%A9%B3%E7%B4%B0%E3%83%9A%E3%83%BC%E3%82%B8"
                    .to_string()
            )
        );
        assert_eq!(
            resolve_url("https://www.animax.co.jp", "あいうえ").unwrap(),
            Some("https://www.animax.co.jp/%E3%81%82%E3%81%84%E3%81%86%E3%81%88".to_string())
        );
    }

    #[test]
    fn keeps_absolute_url() {
        assert_eq!(
            resolve_url("https://example.test", " https://cdn.test/a.jpg ").unwrap(),
            Some("https://cdn.test/a.jpg".to_string())
        );
    }

    #[test]
    fn borrows_scheme_for_protocol_relative() {
        assert_eq!(
            resolve_url("http://example.test", "//cdn.test/a.jpg").unwrap(),
            Some("http://cdn.test/a.jpg".to_string())
        );
    }

    #[test]
    fn non_links_are_none() {
        assert_eq!(resolve_url("https://example.test", "").unwrap(), None);
        assert_eq!(resolve_url("https://example.test", "#top").unwrap(), None);
        assert_eq!(
            resolve_url("https://example.test", "JavaScript:void(0)").unwrap(),
            None
        );
    }

    #[test]
    fn rejects_unresolvable_values() {
        assert!(matches!(
            resolve_url("https://example.test", "mailto:a@b.test"),
            Err(UrlError::UnsupportedScheme(_))
        ));
        assert!(matches!(
            resolve_url("https://example.test", "http://[::1"),
            Err(UrlError::Malformed { .. })
        ));
        assert!(matches!(
            resolve_url("/relative", "/programs/1"),
            Err(UrlError::InvalidBase { .. })
        ));
    }
}
