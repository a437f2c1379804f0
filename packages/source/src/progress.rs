//! Progress reporting for harvests.
//!
//! A harvest has two visible stages: the page walk, which advances one step
//! per attempted schedule page, and thumbnail resolution, which visits
//! detail pages one at a time. [`ProgressCallback`] reports both so the CLI
//! can draw them without the pipeline knowing about terminals.

use chrono::NaiveDate;

/// Receives progress from a running harvest.
///
/// Implementations must be `Send + Sync`: the harvest runs on a blocking
/// worker thread while the caller owns the terminal.
pub trait ProgressCallback: Send + Sync {
    /// The walk will attempt `pages` schedule pages.
    fn pages_planned(&self, pages: u64);

    /// The schedule page for `date` is about to be rendered.
    fn page_started(&self, date: NaiveDate);

    /// `count` schedule pages were attempted, rendered or not.
    fn pages_done(&self, count: u64);

    /// A detail page is about to be visited for the program `title`.
    fn detail_lookup(&self, title: &str);

    /// The harvest ended with `summary`.
    fn finish(&self, summary: String);
}

/// Ignores all progress updates.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn pages_planned(&self, _pages: u64) {}
    fn page_started(&self, _date: NaiveDate) {}
    fn pages_done(&self, _count: u64) {}
    fn detail_lookup(&self, _title: &str) {}
    fn finish(&self, _summary: String) {}
}
