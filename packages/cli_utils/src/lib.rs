#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Terminal output for the TV schedule harvester.
//!
//! [`HarvestBar`] draws a running harvest through the [`ProgressCallback`]
//! trait, and [`init_logger`] sets up `indicatif-log-bridge` so that
//! `log::info!` and friends are suspended while the bar redraws.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::NaiveDate;
use indicatif::{ProgressBar, ProgressStyle};
use tv_schedule_source::progress::ProgressCallback;

pub use indicatif::MultiProgress;

/// Progress of one source's harvest on an `indicatif` bar.
///
/// The bar spins until the page count is known, then counts schedule pages
/// labelled with the day being rendered. Once detail pages are visited it
/// turns back into a spinner that counts thumbnail lookups.
pub struct HarvestBar {
    bar: ProgressBar,
    source: String,
    pages_style: ProgressStyle,
    lookups_style: ProgressStyle,
    lookups: AtomicU64,
}

impl HarvestBar {
    /// Adds a bar for the harvest of `source` (its display name) to `multi`.
    #[must_use]
    pub fn new(multi: &MultiProgress, source: &str) -> Arc<Self> {
        let bar = multi.add(ProgressBar::new_spinner());
        bar.enable_steady_tick(Duration::from_millis(100));
        bar.set_style(spinner_style("{spinner:.cyan} {msg}"));
        bar.set_message(format!("{source}: opening browser"));

        let pages_style =
            ProgressStyle::with_template("  {msg} {wide_bar:.cyan/dim} {pos}/{len} pages [{eta}]")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("##-");

        Arc::new(Self {
            bar,
            source: source.to_owned(),
            pages_style,
            lookups_style: spinner_style("{spinner:.green} {msg} [{elapsed}]"),
            lookups: AtomicU64::new(0),
        })
    }

    /// Detail pages visited so far.
    #[must_use]
    pub fn lookups(&self) -> u64 {
        self.lookups.load(Ordering::Relaxed)
    }

    /// Removes the bar, whatever state the harvest left it in.
    pub fn clear(&self) {
        self.bar.finish_and_clear();
    }
}

fn spinner_style(template: &str) -> ProgressStyle {
    ProgressStyle::with_template(template).unwrap_or_else(|_| ProgressStyle::default_spinner())
}

impl ProgressCallback for HarvestBar {
    fn pages_planned(&self, pages: u64) {
        self.bar.set_length(pages);
        self.bar.set_position(0);
        self.bar.set_style(self.pages_style.clone());
        self.bar.set_message(self.source.clone());
    }

    fn page_started(&self, date: NaiveDate) {
        self.bar
            .set_message(format!("{} {}", self.source, date.format("%m/%d (%a)")));
    }

    fn pages_done(&self, count: u64) {
        self.bar.inc(count);
    }

    fn detail_lookup(&self, title: &str) {
        let visited = self.lookups.fetch_add(1, Ordering::Relaxed) + 1;
        if visited == 1 {
            self.bar.set_style(self.lookups_style.clone());
        }
        self.bar
            .set_message(format!("{} thumbnail #{visited}: {title}", self.source));
    }

    fn finish(&self, summary: String) {
        self.bar.finish_with_message(summary);
    }
}

/// Initializes the global logger wrapped in `indicatif-log-bridge` so that
/// `log::info!` and friends are suspended while progress bars redraw.
///
/// Returns the [`MultiProgress`] that all progress bars must be added to.
#[must_use]
pub fn init_logger() -> MultiProgress {
    let multi = MultiProgress::new();

    let logger = pretty_env_logger::formatted_builder()
        .parse_env("RUST_LOG")
        .build();
    let level = logger.filter();

    // Already set when called twice (e.g. from tests).
    indicatif_log_bridge::LogWrapper::new(multi.clone(), logger)
        .try_init()
        .ok();

    log::set_max_level(level);

    multi
}

#[cfg(test)]
mod tests {
    use indicatif::ProgressDrawTarget;

    use super::*;

    fn hidden_bar() -> Arc<HarvestBar> {
        HarvestBar::new(
            &MultiProgress::with_draw_target(ProgressDrawTarget::hidden()),
            "WOWOW",
        )
    }

    #[test]
    fn counts_pages_by_day() {
        let bar = hidden_bar();
        bar.pages_planned(3);
        bar.page_started(NaiveDate::from_ymd_opt(2024, 4, 14).unwrap());
        bar.pages_done(1);

        assert_eq!(bar.bar.length(), Some(3));
        assert_eq!(bar.bar.position(), 1);
        assert_eq!(bar.bar.message(), "WOWOW 04/14 (Sun)");
    }

    #[test]
    fn detail_lookups_are_counted_after_the_pages() {
        let bar = hidden_bar();
        bar.pages_planned(1);
        bar.pages_done(1);
        bar.detail_lookup("ニュース");
        bar.detail_lookup("映画");

        assert_eq!(bar.lookups(), 2);
        assert_eq!(bar.bar.position(), 1);
        assert_eq!(bar.bar.message(), "WOWOW thumbnail #2: 映画");

        bar.finish("WOWOW: 2 program(s)".to_string());
        assert!(bar.bar.is_finished());
    }
}
