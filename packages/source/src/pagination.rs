//! Drives a [`RenderSession`] across schedule days.
//!
//! Two strategies, picked by the source's [`FetcherConfig`]:
//!
//! - **Tab selection**: one aggregate page is loaded once. For each day the
//!   matching date tab is found (exact label, then relaxed pattern),
//!   scrolled into view and clicked, first from script and then with a
//!   simulated pointer, before the listing is read.
//! - **Date indexed**: day 0's URL is built from the date; every later day
//!   is reached through the page's "next day" link, with a fixed delay
//!   between loads. A missing link ends the walk normally.
//!
//! Nothing here escalates. Every page-level failure becomes a
//! [`HarvestCondition`] and the walk moves on to the next day.

use std::thread;
use std::time::Duration;

use chrono::{Days, NaiveDate};
use tv_schedule_browser::{ClickMode, RenderSession, SessionError};
use tv_schedule_scraper::url::resolve_url;

use crate::error::HarvestCondition;
use crate::labels::{LabelMatch, day_label, find_day_label};
use crate::progress::ProgressCallback;
use crate::source_def::FetcherConfig;

/// Markup of one rendered schedule page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPage {
    /// 0-based position in the walk.
    pub index: usize,
    /// Day the page was requested for (`anchor + index`).
    pub date: NaiveDate,
    /// Where the page was read from.
    pub url: String,
    pub markup: String,
}

/// Everything a walk produced.
#[derive(Debug, Default)]
pub struct Pagination {
    /// Pages that rendered, in walk order.
    pub pages: Vec<RenderedPage>,
    /// Contained failures and the exhaustion signal, in order.
    pub conditions: Vec<HarvestCondition>,
}

impl Pagination {
    fn record(&mut self, condition: HarvestCondition) {
        if condition.is_failure() {
            log::warn!("{condition}");
        } else {
            log::info!("{condition}");
        }
        self.conditions.push(condition);
    }
}

/// Renders up to `pages` schedule pages starting at `anchor`.
///
/// Relative "next day" links are resolved against the page they were found
/// on. Progress advances once per attempted page.
pub fn render_pages<S: RenderSession + ?Sized>(
    session: &mut S,
    fetcher: &FetcherConfig,
    anchor: NaiveDate,
    pages: usize,
    progress: &dyn ProgressCallback,
) -> Pagination {
    let mut walk = Pagination::default();
    if pages == 0 {
        return walk;
    }

    match fetcher {
        FetcherConfig::TabSelection {
            url,
            page_selector,
            tab_selector,
            listing_selector,
            click_pause_ms,
            ..
        } => {
            let tabs = TabWalk {
                url,
                page_selector,
                tab_selector,
                listing_selector,
                timeout: fetcher.wait_timeout(),
                click_pause: Duration::from_millis(*click_pause_ms),
            };
            tabs.run(session, anchor, pages, progress, &mut walk);
        }
        FetcherConfig::DateIndexed {
            url_template,
            url_date_format,
            listing_selector,
            next_selector,
            page_delay_secs,
            ..
        } => {
            let days = DayWalk {
                url_template,
                url_date_format,
                listing_selector,
                next_selector,
                timeout: fetcher.wait_timeout(),
                page_delay: Duration::from_secs(*page_delay_secs),
            };
            days.run(session, anchor, pages, progress, &mut walk);
        }
    }

    log::info!(
        "Rendered {}/{pages} page(s) starting {anchor}",
        walk.pages.len()
    );
    walk
}

fn day_at(anchor: NaiveDate, index: usize) -> Option<NaiveDate> {
    anchor.checked_add_days(Days::new(u64::try_from(index).ok()?))
}

fn session_condition(date: NaiveDate, error: &SessionError) -> HarvestCondition {
    HarvestCondition::Session {
        date,
        message: error.to_string(),
    }
}

// ── Tab selection ────────────────────────────────────────────────────────

struct TabWalk<'a> {
    url: &'a str,
    page_selector: &'a str,
    tab_selector: &'a str,
    listing_selector: &'a str,
    timeout: Duration,
    click_pause: Duration,
}

impl TabWalk<'_> {
    fn run<S: RenderSession + ?Sized>(
        &self,
        session: &mut S,
        anchor: NaiveDate,
        pages: usize,
        progress: &dyn ProgressCallback,
        walk: &mut Pagination,
    ) {
        log::info!("Loading schedule page {}", self.url);
        if let Err(e) = session.load(self.url) {
            walk.record(session_condition(anchor, &e));
            progress.pages_done(pages as u64);
            return;
        }
        match session.wait_for(self.page_selector, self.timeout) {
            Ok(true) => {}
            Ok(false) => {
                walk.record(self.not_ready(anchor, self.page_selector));
                progress.pages_done(pages as u64);
                return;
            }
            Err(e) => {
                walk.record(session_condition(anchor, &e));
                progress.pages_done(pages as u64);
                return;
            }
        }

        for index in 0..pages {
            let Some(date) = day_at(anchor, index) else {
                break;
            };
            progress.page_started(date);
            match self.render_day(session, date) {
                Ok(markup) => walk.pages.push(RenderedPage {
                    index,
                    date,
                    url: self.url.to_owned(),
                    markup,
                }),
                Err(condition) => walk.record(condition),
            }
            progress.pages_done(1);
        }
    }

    fn render_day<S: RenderSession + ?Sized>(
        &self,
        session: &mut S,
        date: NaiveDate,
    ) -> Result<String, HarvestCondition> {
        self.select_day(session, date)?;

        match session.wait_for(self.listing_selector, self.timeout) {
            Ok(true) => {}
            Ok(false) => return Err(self.not_ready(date, self.listing_selector)),
            Err(e) => return Err(session_condition(date, &e)),
        }
        session
            .current_markup()
            .map_err(|e| session_condition(date, &e))
    }

    fn select_day<S: RenderSession + ?Sized>(
        &self,
        session: &mut S,
        date: NaiveDate,
    ) -> Result<(), HarvestCondition> {
        let tabs = session
            .find_all(self.tab_selector)
            .map_err(|e| session_condition(date, &e))?;
        let label = day_label(date);

        let Some((index, matched)) = find_day_label(tabs.iter().map(|t| t.text.as_str()), date)
        else {
            log::debug!(
                "Tabs on page: {:?}",
                tabs.iter().map(|t| t.text.trim()).collect::<Vec<_>>()
            );
            return Err(HarvestCondition::ScheduleDateNotFound { date, label });
        };
        let tab = &tabs[index];
        if matched == LabelMatch::Relaxed {
            log::debug!("Tab '{}' matched '{label}' loosely", tab.text.trim());
        }

        if let Err(e) = session.scroll_into_view(tab) {
            log::warn!("Could not scroll tab '{label}' into view: {e}");
        }
        thread::sleep(self.click_pause);

        let scripted = session.click(tab, ClickMode::Script);
        if let Err(e) = &scripted {
            log::warn!("Script click on tab '{label}' failed: {e}");
        }
        let pointer = session.click(tab, ClickMode::Pointer);
        if let Err(e) = &pointer {
            log::warn!("Pointer click on tab '{label}' failed: {e}");
        }

        match (scripted, pointer) {
            (Err(_), Err(e)) => Err(session_condition(date, &e)),
            _ => {
                log::debug!("Selected tab '{label}'");
                Ok(())
            }
        }
    }

    fn not_ready(&self, date: NaiveDate, selector: &str) -> HarvestCondition {
        HarvestCondition::ListingNotReady {
            date,
            url: self.url.to_owned(),
            selector: selector.to_owned(),
            timeout_secs: self.timeout.as_secs(),
        }
    }
}

// ── Date indexed ─────────────────────────────────────────────────────────

struct DayWalk<'a> {
    url_template: &'a str,
    url_date_format: &'a str,
    listing_selector: &'a str,
    next_selector: &'a str,
    timeout: Duration,
    page_delay: Duration,
}

impl DayWalk<'_> {
    fn url_for(&self, date: NaiveDate) -> String {
        self.url_template
            .replace("{date}", &date.format(self.url_date_format).to_string())
    }

    fn run<S: RenderSession + ?Sized>(
        &self,
        session: &mut S,
        anchor: NaiveDate,
        pages: usize,
        progress: &dyn ProgressCallback,
        walk: &mut Pagination,
    ) {
        let mut next_url = Some(self.url_for(anchor));

        for index in 0..pages {
            let (Some(date), Some(url)) = (day_at(anchor, index), next_url.take()) else {
                break;
            };
            if index > 0 && !self.page_delay.is_zero() {
                log::debug!("Waiting {:?} before the next page", self.page_delay);
                thread::sleep(self.page_delay);
            }
            progress.page_started(date);

            log::info!("Loading {date} schedule: {url}");
            if let Err(e) = session.load(&url) {
                walk.record(session_condition(date, &e));
                progress.pages_done(1);
                // The page never rendered, so it has no next link to follow.
                next_url = day_at(date, 1).map(|next| self.url_for(next));
                continue;
            }

            match self.read_listing(session, date, &url) {
                Ok(markup) => walk.pages.push(RenderedPage {
                    index,
                    date,
                    url: url.clone(),
                    markup,
                }),
                Err(condition) => walk.record(condition),
            }
            progress.pages_done(1);

            if index + 1 == pages {
                break;
            }
            match self.next_link(session, date, &url) {
                Ok(url) => next_url = Some(url),
                Err(condition) => {
                    walk.record(condition);
                    break;
                }
            }
        }
    }

    fn read_listing<S: RenderSession + ?Sized>(
        &self,
        session: &mut S,
        date: NaiveDate,
        url: &str,
    ) -> Result<String, HarvestCondition> {
        match session.wait_for(self.listing_selector, self.timeout) {
            Ok(true) => session
                .current_markup()
                .map_err(|e| session_condition(date, &e)),
            Ok(false) => Err(HarvestCondition::ListingNotReady {
                date,
                url: url.to_owned(),
                selector: self.listing_selector.to_owned(),
                timeout_secs: self.timeout.as_secs(),
            }),
            Err(e) => Err(session_condition(date, &e)),
        }
    }

    fn next_link<S: RenderSession + ?Sized>(
        &self,
        session: &mut S,
        date: NaiveDate,
        page_url: &str,
    ) -> Result<String, HarvestCondition> {
        let exhausted = HarvestCondition::NavigationExhausted { after: date };

        let link = match session.find(self.next_selector) {
            Ok(Some(link)) => link,
            Ok(None) => return Err(exhausted),
            Err(e) => return Err(session_condition(date, &e)),
        };
        let href = session
            .attribute(&link, "href")
            .map_err(|e| session_condition(date, &e))?
            .unwrap_or_default();

        match resolve_url(page_url, &href) {
            Ok(Some(url)) => Ok(url),
            Ok(None) => {
                log::warn!("Next-day link after {date} has no usable href '{href}'");
                Err(exhausted)
            }
            Err(e) => {
                log::warn!("Next-day link after {date}: {e}");
                Err(exhausted)
            }
        }
    }
}
