//! Thumbnail lookup on program detail pages.
//!
//! Some listings carry no images; the thumbnail only exists on each
//! program's detail page. [`DetailResolver`] opens that page in a secondary
//! browsing context so the listing in the primary context stays exactly
//! where it was, reads one image reference and closes the context again.
//! Failures degrade to an empty thumbnail.

use std::collections::BTreeMap;

use tv_schedule_browser::{RenderSession, SessionError, with_secondary_context};
use tv_schedule_scraper::url::resolve_url;

use crate::error::HarvestCondition;
use crate::source_def::DetailConfig;

enum Lookup {
    Found(Option<String>),
    NotReady,
    NoImage,
}

/// Resolves and caches detail-page thumbnails for one harvest.
///
/// The same program usually airs several times a week, so lookups are
/// cached by detail URL. Failed lookups are cached as `""` as well.
#[derive(Debug)]
pub struct DetailResolver {
    config: DetailConfig,
    cache: BTreeMap<String, String>,
    failures: Vec<HarvestCondition>,
    lookups: usize,
}

impl DetailResolver {
    #[must_use]
    pub fn new(config: DetailConfig) -> Self {
        Self {
            config,
            cache: BTreeMap::new(),
            failures: Vec::new(),
            lookups: 0,
        }
    }

    /// Returns the absolute thumbnail URL for a detail page, or `""`.
    ///
    /// The session's active context is the same before and after the call.
    pub fn resolve_thumbnail<S: RenderSession + ?Sized>(
        &mut self,
        session: &mut S,
        url: &str,
    ) -> String {
        if let Some(cached) = self.cache.get(url) {
            log::trace!("Thumbnail cache hit for {url}");
            return cached.clone();
        }

        self.lookups += 1;
        let thumbnail = match self.lookup(session, url) {
            Ok(thumbnail) => {
                log::debug!("Thumbnail for {url}: {thumbnail}");
                thumbnail
            }
            Err(reason) => {
                let condition = HarvestCondition::DetailResolutionError {
                    url: url.to_owned(),
                    reason,
                };
                log::warn!("{condition}");
                self.failures.push(condition);
                String::new()
            }
        };

        self.cache.insert(url.to_owned(), thumbnail.clone());
        thumbnail
    }

    fn lookup<S: RenderSession + ?Sized>(
        &self,
        session: &mut S,
        url: &str,
    ) -> Result<String, String> {
        let ready_selector = self.config.ready_selector.as_str();
        let image_selector = self.config.image_selector.as_str();
        let timeout = self.config.timeout();

        let lookup = with_secondary_context(session, |s| {
            s.load(url)?;
            if !s.wait_for(ready_selector, timeout)? {
                return Ok(Lookup::NotReady);
            }
            let Some(image) = s.find(image_selector)? else {
                return Ok(Lookup::NoImage);
            };
            let src = match s.attribute(&image, "src")? {
                Some(src) if !src.trim().is_empty() => Some(src),
                _ => s.attribute(&image, "data-src")?,
            };
            Ok::<_, SessionError>(Lookup::Found(src))
        })
        .map_err(|e| e.to_string())?;

        match lookup {
            Lookup::NotReady => Err(format!(
                "'{ready_selector}' did not appear within {}s",
                timeout.as_secs()
            )),
            Lookup::NoImage => Err(format!("no '{image_selector}' in the detail block")),
            Lookup::Found(src) => resolve_url(url, src.as_deref().unwrap_or(""))
                .map_err(|e| e.to_string())?
                .ok_or_else(|| "image has no src".to_string()),
        }
    }

    /// Whether `url` was already looked up, so resolving it visits nothing.
    #[must_use]
    pub fn is_cached(&self, url: &str) -> bool {
        self.cache.contains_key(url)
    }

    /// Number of detail pages actually visited.
    #[must_use]
    pub const fn lookups(&self) -> usize {
        self.lookups
    }

    /// Hands over the failures recorded so far.
    pub fn take_failures(&mut self) -> Vec<HarvestCondition> {
        std::mem::take(&mut self.failures)
    }
}

#[cfg(test)]
mod tests {
    use tv_schedule_browser::testing::{FakeElement, FakePage, FakeSession};

    use super::*;

    const READY: &str = "div.block-thumbnail";
    const IMAGE: &str = "div.block-thumbnail figure img";

    fn config() -> DetailConfig {
        DetailConfig {
            ready_selector: READY.to_string(),
            image_selector: IMAGE.to_string(),
            timeout_secs: 1,
        }
    }

    fn detail_page(src: &str) -> FakePage {
        FakePage::new("<div class=\"block-thumbnail\"></div>")
            .with_ready(READY)
            .with_element(IMAGE, FakeElement::new("").with_attribute("src", src))
    }

    #[test]
    fn resolves_relative_image_and_restores_primary() {
        let mut session = FakeSession::new()
            .with_page("https://tv.test/programs/1", detail_page("/img/1.jpg"));
        let primary = session.primary_context();
        let mut resolver = DetailResolver::new(config());

        let thumbnail = resolver.resolve_thumbnail(&mut session, "https://tv.test/programs/1");

        assert_eq!(thumbnail, "https://tv.test/img/1.jpg");
        assert_eq!(session.active_context(), primary);
        assert_eq!(session.live_context_count(), 1);
        assert!(resolver.take_failures().is_empty());
    }

    #[test]
    fn page_relative_image_resolves_against_the_detail_page() {
        let mut session = FakeSession::new().with_page(
            "https://tv.test/programs/detail/1",
            detail_page("../img/1.jpg"),
        );
        let mut resolver = DetailResolver::new(config());

        let thumbnail =
            resolver.resolve_thumbnail(&mut session, "https://tv.test/programs/detail/1");

        assert_eq!(thumbnail, "https://tv.test/programs/img/1.jpg");
        assert!(!resolver.is_cached("https://tv.test/programs/2"));
        assert!(resolver.is_cached("https://tv.test/programs/detail/1"));
    }

    #[test]
    fn wait_timeout_yields_empty_and_closes_context() {
        let mut session = FakeSession::new()
            .with_page("https://tv.test/programs/2", FakePage::new("<p>still loading</p>"));
        let primary = session.primary_context();
        let mut resolver = DetailResolver::new(config());

        let thumbnail = resolver.resolve_thumbnail(&mut session, "https://tv.test/programs/2");

        assert_eq!(thumbnail, "");
        assert_eq!(session.closed_contexts().len(), 1);
        assert_eq!(session.live_context_count(), 1);
        assert_eq!(session.active_context(), primary);
        let failures = resolver.take_failures();
        assert!(matches!(
            failures[0],
            HarvestCondition::DetailResolutionError { .. }
        ));
    }

    #[test]
    fn navigation_error_degrades_to_empty() {
        let mut session = FakeSession::new();
        let mut resolver = DetailResolver::new(config());

        assert_eq!(
            resolver.resolve_thumbnail(&mut session, "https://tv.test/gone"),
            ""
        );
        assert_eq!(session.active_context(), session.primary_context());
        assert_eq!(resolver.take_failures().len(), 1);
    }

    #[test]
    fn repeated_urls_hit_the_cache() {
        let mut session = FakeSession::new()
            .with_page("https://tv.test/programs/1", detail_page("https://cdn.test/1.jpg"));
        let mut resolver = DetailResolver::new(config());

        for _ in 0..3 {
            assert_eq!(
                resolver.resolve_thumbnail(&mut session, "https://tv.test/programs/1"),
                "https://cdn.test/1.jpg"
            );
        }
        assert_eq!(resolver.lookups(), 1);
        assert_eq!(session.open_context_count(), 1);
    }

    #[test]
    fn failures_are_cached_too() {
        let mut session = FakeSession::new();
        let mut resolver = DetailResolver::new(config());

        resolver.resolve_thumbnail(&mut session, "https://tv.test/gone");
        resolver.resolve_thumbnail(&mut session, "https://tv.test/gone");

        assert_eq!(resolver.lookups(), 1);
        assert_eq!(resolver.take_failures().len(), 1);
    }

    #[test]
    fn missing_image_is_a_failure() {
        let page = FakePage::new("").with_ready(READY);
        let mut session = FakeSession::new().with_page("https://tv.test/programs/3", page);
        let mut resolver = DetailResolver::new(config());

        assert_eq!(
            resolver.resolve_thumbnail(&mut session, "https://tv.test/programs/3"),
            ""
        );
        assert_eq!(resolver.take_failures().len(), 1);
    }
}
