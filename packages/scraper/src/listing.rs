//! Program-cell extraction from rendered schedule markup.
//!
//! A listing page is a container of "program cells", one per broadcast
//! slot. [`CellExtractor`] locates every cell with one CSS selector and
//! reads the per-program fields with optional sub-selectors. Any field may
//! be missing from any cell; a missing field becomes an empty value and the
//! row is still emitted.

use std::collections::BTreeMap;

use ::url::Url;
use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;
use tv_schedule_source_models::{Channel, RawProgram};

use crate::ExtractError;
use crate::url::{join_link, parse_base};

/// CSS selectors describing one source's program-cell markup.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CellSelectors {
    /// Selects each program cell in document order.
    pub cell: String,
    /// Airtime label within a cell.
    pub time: Option<String>,
    /// Title within a cell.
    pub title: Option<String>,
    /// Episode tag or synopsis within a cell.
    pub episode: Option<String>,
    /// Anchor whose `href` is the program's detail page.
    pub link: Option<String>,
    /// Image embedded directly in the cell.
    pub thumbnail: Option<String>,
}

impl CellSelectors {
    /// Creates selectors with only the cell selector set.
    #[must_use]
    pub fn new(cell: &str) -> Self {
        Self {
            cell: cell.to_owned(),
            time: None,
            title: None,
            episode: None,
            link: None,
            thumbnail: None,
        }
    }

    /// Sets the airtime selector.
    #[must_use]
    pub fn with_time(mut self, selector: &str) -> Self {
        self.time = Some(selector.to_owned());
        self
    }

    /// Sets the title selector.
    #[must_use]
    pub fn with_title(mut self, selector: &str) -> Self {
        self.title = Some(selector.to_owned());
        self
    }

    /// Sets the episode/description selector.
    #[must_use]
    pub fn with_episode(mut self, selector: &str) -> Self {
        self.episode = Some(selector.to_owned());
        self
    }

    /// Sets the detail-link selector.
    #[must_use]
    pub fn with_link(mut self, selector: &str) -> Self {
        self.link = Some(selector.to_owned());
        self
    }

    /// Sets the embedded-thumbnail selector.
    #[must_use]
    pub fn with_thumbnail(mut self, selector: &str) -> Self {
        self.thumbnail = Some(selector.to_owned());
        self
    }
}

/// Maps a cell's structural class to a channel name.
///
/// With no `classes` configured every cell belongs to `default`. With
/// classes configured, the first class on the cell that has a mapping wins
/// and a cell with none resolves to [`Channel::Unknown`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ChannelMapping {
    /// Channel for sources that list a single channel.
    pub default: Option<String>,
    /// Class name to channel name.
    #[serde(default)]
    pub classes: BTreeMap<String, String>,
}

impl ChannelMapping {
    /// A mapping that puts every cell on one channel.
    #[must_use]
    pub fn single(name: &str) -> Self {
        Self {
            default: Some(name.to_owned()),
            classes: BTreeMap::new(),
        }
    }

    /// Adds a class-to-channel mapping.
    #[must_use]
    pub fn with_class(mut self, class: &str, name: &str) -> Self {
        self.classes.insert(class.to_owned(), name.to_owned());
        self
    }

    /// Resolves the channel for a cell carrying `classes`.
    #[must_use]
    pub fn resolve<'a>(&self, mut classes: impl Iterator<Item = &'a str>) -> Channel {
        if self.classes.is_empty() {
            return self
                .default
                .as_deref()
                .map_or(Channel::Unknown, Channel::named);
        }
        classes
            .find_map(|class| self.classes.get(class))
            .map_or(Channel::Unknown, |name| Channel::named(name))
    }

    /// Every channel name this mapping can produce, in a stable order.
    #[must_use]
    pub fn channel_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        if let Some(default) = &self.default {
            names.push(default.clone());
        }
        for name in self.classes.values() {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
        names
    }
}

/// A cell that could not be turned into a row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellFailure {
    /// 1-based position of the cell on the page.
    pub position: usize,
    /// What went wrong.
    pub reason: String,
}

/// Everything extracted from one rendered page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedPage {
    /// Successfully extracted rows in document order.
    pub programs: Vec<RawProgram>,
    /// Cells that were skipped.
    pub failures: Vec<CellFailure>,
}

impl ExtractedPage {
    /// Total number of cells seen, extracted or not.
    #[must_use]
    pub fn cell_count(&self) -> usize {
        self.programs.len() + self.failures.len()
    }
}

/// Extracts [`RawProgram`] rows from listing markup.
///
/// Selectors are compiled once in [`CellExtractor::new`]; extraction itself
/// is a pure function of the markup.
#[derive(Debug)]
pub struct CellExtractor {
    origin: Url,
    cell: Selector,
    time: Option<Selector>,
    title: Option<Selector>,
    episode: Option<Selector>,
    link: Option<Selector>,
    thumbnail: Option<Selector>,
    channels: ChannelMapping,
}

impl CellExtractor {
    /// Compiles the selectors for one source.
    ///
    /// `origin` is the site origin used to absolutize relative links.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError::Selector`] if any selector fails to parse and
    /// [`ExtractError::Origin`] if `origin` is not an absolute URL.
    pub fn new(
        origin: &str,
        selectors: &CellSelectors,
        channels: ChannelMapping,
    ) -> Result<Self, ExtractError> {
        Ok(Self {
            origin: parse_base(origin)?,
            cell: parse_selector(&selectors.cell)?,
            time: parse_optional(selectors.time.as_deref())?,
            title: parse_optional(selectors.title.as_deref())?,
            episode: parse_optional(selectors.episode.as_deref())?,
            link: parse_optional(selectors.link.as_deref())?,
            thumbnail: parse_optional(selectors.thumbnail.as_deref())?,
            channels,
        })
    }

    /// Extracts every program cell from `markup`.
    ///
    /// A cell that fails is recorded in [`ExtractedPage::failures`] and
    /// logged; its siblings are unaffected.
    #[must_use]
    pub fn extract(&self, markup: &str) -> ExtractedPage {
        let document = Html::parse_document(markup);
        let mut page = ExtractedPage::default();

        for (index, cell) in document.select(&self.cell).enumerate() {
            let position = index + 1;
            match self.extract_cell(cell) {
                Ok(program) => {
                    log::trace!(
                        "cell {position}: [{}] {} - {}",
                        program.channel,
                        program.time_label,
                        program.title,
                    );
                    page.programs.push(program);
                }
                Err(reason) => {
                    log::warn!("Skipping program cell {position}: {reason}");
                    page.failures.push(CellFailure { position, reason });
                }
            }
        }

        log::debug!(
            "Extracted {} program(s) from {} cell(s)",
            page.programs.len(),
            page.cell_count(),
        );

        page
    }

    fn extract_cell(&self, cell: ElementRef<'_>) -> Result<RawProgram, String> {
        let detail_url = match first_attr(cell, self.link.as_ref(), &["href"]) {
            Some(href) => join_link(&self.origin, &href)
                .map_err(|e| format!("detail link: {e}"))?,
            None => None,
        };

        let thumbnail_url = first_attr(cell, self.thumbnail.as_ref(), &["src", "data-src"])
            .and_then(|src| match join_link(&self.origin, &src) {
                Ok(url) => url,
                Err(e) => {
                    log::warn!("Ignoring thumbnail: {e}");
                    None
                }
            });

        Ok(RawProgram {
            channel: self.channels.resolve(cell.value().classes()),
            time_label: first_text(cell, self.time.as_ref()),
            title: first_text(cell, self.title.as_ref()),
            episode_or_description: first_text(cell, self.episode.as_ref()),
            detail_url,
            thumbnail_url,
        })
    }
}

/// Parses a CSS selector string, returning an [`ExtractError`] on failure.
fn parse_selector(selector: &str) -> Result<Selector, ExtractError> {
    Selector::parse(selector).map_err(|e| ExtractError::Selector {
        selector: selector.to_owned(),
        message: e.to_string(),
    })
}

fn parse_optional(selector: Option<&str>) -> Result<Option<Selector>, ExtractError> {
    selector.map(parse_selector).transpose()
}

/// Trimmed text of the first match, or `""`.
fn first_text(cell: ElementRef<'_>, selector: Option<&Selector>) -> String {
    selector
        .and_then(|sel| cell.select(sel).next())
        .map(|el| el.text().collect::<Vec<_>>().join("").trim().to_owned())
        .unwrap_or_default()
}

/// First non-empty attribute among `names` on the first match. When the
/// cell itself matches `selector` (e.g. the cell is the anchor), it counts.
fn first_attr(cell: ElementRef<'_>, selector: Option<&Selector>, names: &[&str]) -> Option<String> {
    let selector = selector?;
    let element = if selector.matches(&cell) {
        cell
    } else {
        cell.select(selector).next()?
    };
    names
        .iter()
        .filter_map(|name| element.value().attr(name))
        .map(str::trim)
        .find(|value| !value.is_empty())
        .map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORIGIN: &str = "https://example.test";

    fn weekly_selectors() -> CellSelectors {
        CellSelectors::new(".m-program-weekly--program")
            .with_time(".m-program-weekly-time")
            .with_title("h3")
            .with_episode(".m-program-weekly-episode")
            .with_link("a")
    }

    fn grid_selectors() -> CellSelectors {
        CellSelectors::new(
            ".mdl__program-table td.__prime, .mdl__program-table td.__live, .mdl__program-table td.__cinema",
        )
        .with_time(".__time")
        .with_title(".__title-text")
        .with_episode(".__lead p")
        .with_thumbnail(".__thumb img")
    }

    fn grid_channels() -> ChannelMapping {
        ChannelMapping::default()
            .with_class("__prime", "WOWOWプライム")
            .with_class("__live", "WOWOWライブ")
            .with_class("__cinema", "WOWOWシネマ")
    }

    #[test]
    fn extracts_weekly_cells_in_order() {
        let html = r#"
            <div id="js-program-contents-weekly">
              <div class="m-program-weekly--program">
                <a href="/programs/123">
                  <p class="m-program-weekly-time"> 06:00 </p>
                  <h3>Program A</h3>
                  <p class="m-program-weekly-episode">#12</p>
                </a>
              </div>
              <div class="m-program-weekly--program">
                <a href="https://other.test/p/9">
                  <p class="m-program-weekly-time">06:30</p>
                  <h3>Program B</h3>
                </a>
              </div>
            </div>"#;
        let extractor =
            CellExtractor::new(ORIGIN, &weekly_selectors(), ChannelMapping::single("アニマックス"))
                .unwrap();

        let page = extractor.extract(html);

        assert!(page.failures.is_empty());
        assert_eq!(page.programs.len(), 2);
        let first = &page.programs[0];
        assert_eq!(first.time_label, "06:00");
        assert_eq!(first.title, "Program A");
        assert_eq!(first.episode_or_description, "#12");
        assert_eq!(
            first.detail_url.as_deref(),
            Some("https://example.test/programs/123")
        );
        assert_eq!(first.channel, Channel::named("アニマックス"));
        assert_eq!(page.programs[1].episode_or_description, "");
        assert_eq!(
            page.programs[1].detail_url.as_deref(),
            Some("https://other.test/p/9")
        );
    }

    #[test]
    fn missing_title_still_yields_row() {
        let html = r#"
            <div class="m-program-weekly--program">
              <p class="m-program-weekly-time">07:00</p>
            </div>"#;
        let extractor =
            CellExtractor::new(ORIGIN, &weekly_selectors(), ChannelMapping::single("x")).unwrap();

        let page = extractor.extract(html);

        assert_eq!(page.programs.len(), 1);
        assert_eq!(page.programs[0].title, "");
        assert_eq!(page.programs[0].time_label, "07:00");
        assert_eq!(page.programs[0].detail_url, None);
    }

    #[test]
    fn bad_link_skips_only_that_cell() {
        let html = r#"
            <div class="m-program-weekly--program"><a href="mailto:x@y.test"><h3>Bad</h3></a></div>
            <div class="m-program-weekly--program"><a href="/ok"><h3>Good</h3></a></div>"#;
        let extractor =
            CellExtractor::new(ORIGIN, &weekly_selectors(), ChannelMapping::single("x")).unwrap();

        let page = extractor.extract(html);

        assert_eq!(page.programs.len(), 1);
        assert_eq!(page.programs[0].title, "Good");
        assert_eq!(page.failures.len(), 1);
        assert_eq!(page.failures[0].position, 1);
        assert_eq!(page.cell_count(), 2);
    }

    #[test]
    fn grid_cells_resolve_channel_from_class() {
        let html = r#"
            <table class="mdl__program-table"><tr>
              <td class="__prime">
                <p class="__time">05:00</p>
                <p class="__title-text">News</p>
                <div class="__thumb"><img src="/img/a.jpg"></div>
                <div class="__lead"><p>Daily news</p></div>
              </td>
              <td class="__live"><p class="__title-text">Match</p></td>
              <td class="__cinema __wide"><p class="__title-text">Film</p></td>
            </tr></table>"#;
        let extractor = CellExtractor::new(ORIGIN, &grid_selectors(), grid_channels()).unwrap();

        let page = extractor.extract(html);

        let channels: Vec<&str> = page.programs.iter().map(|p| p.channel.name()).collect();
        assert_eq!(channels, vec!["WOWOWプライム", "WOWOWライブ", "WOWOWシネマ"]);
        assert_eq!(page.programs[0].episode_or_description, "Daily news");
        assert_eq!(
            page.programs[0].thumbnail_url.as_deref(),
            Some("https://example.test/img/a.jpg")
        );
        assert_eq!(page.programs[1].thumbnail_url, None);
    }

    #[test]
    fn unmapped_class_is_unknown_not_dropped() {
        let mapping = grid_channels();
        assert_eq!(mapping.resolve(["__bs", "x"].into_iter()), Channel::Unknown);
        assert_eq!(
            mapping.resolve(["x", "__live"].into_iter()),
            Channel::named("WOWOWライブ")
        );
    }

    #[test]
    fn lists_channel_names_once() {
        let mapping = ChannelMapping::single("A").with_class("a", "A").with_class("b", "B");
        assert_eq!(mapping.channel_names(), vec!["A".to_string(), "B".to_string()]);
    }

    #[test]
    fn rejects_invalid_selector() {
        let selectors = CellSelectors::new("div[");
        let err = CellExtractor::new(ORIGIN, &selectors, ChannelMapping::default()).unwrap_err();
        assert!(matches!(err, ExtractError::Selector { .. }));
    }
}
