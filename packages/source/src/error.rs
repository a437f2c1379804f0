//! Harvest conditions and run-level errors.
//!
//! Row-level and page-level problems never abort a harvest. They are logged
//! where they happen and collected as [`HarvestCondition`]s in the report.
//! Only a run that produced no programs at all, or one that could not
//! start, surfaces as a [`HarvestError`].

use chrono::NaiveDate;
use tv_schedule_browser::SessionError;
use tv_schedule_scraper::ExtractError;

/// A contained problem recorded during a harvest.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HarvestCondition {
    /// No day-selector control matched the target day, exactly or relaxed.
    #[error("no day selector matches '{label}' for {date}")]
    ScheduleDateNotFound {
        /// Day that was being selected.
        date: NaiveDate,
        /// Label that was searched for.
        label: String,
    },

    /// The listing container did not appear within the wait timeout.
    #[error("listing '{selector}' not ready for {date} at {url} after {timeout_secs}s")]
    ListingNotReady {
        /// Day of the page.
        date: NaiveDate,
        /// Page URL.
        url: String,
        /// Selector that was waited for.
        selector: String,
        /// Wait bound.
        timeout_secs: u64,
    },

    /// One program cell could not be extracted.
    #[error("program cell {position} on the {date} page skipped: {reason}")]
    CellParseError {
        /// Day of the page the cell was on.
        date: NaiveDate,
        /// 1-based position of the cell on its page.
        position: usize,
        /// What went wrong.
        reason: String,
    },

    /// A thumbnail could not be read from a detail page.
    #[error("thumbnail lookup for {url} failed: {reason}")]
    DetailResolutionError {
        /// Detail page URL.
        url: String,
        /// What went wrong.
        reason: String,
    },

    /// No "next day" control after this day; the source has no later pages.
    #[error("no next-day link after {after}")]
    NavigationExhausted {
        /// Last day that was rendered.
        after: NaiveDate,
    },

    /// The render session failed while working on one page.
    #[error("render session failure on the {date} page: {message}")]
    Session {
        /// Day of the page.
        date: NaiveDate,
        /// Underlying error.
        message: String,
    },
}

impl HarvestCondition {
    /// Whether this condition lost data. [`Self::NavigationExhausted`] is
    /// the normal end of a date-indexed walk and is not.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        !matches!(self, Self::NavigationExhausted { .. })
    }

    /// Short stable name, used for log summaries.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::ScheduleDateNotFound { .. } => "schedule_date_not_found",
            Self::ListingNotReady { .. } => "listing_not_ready",
            Self::CellParseError { .. } => "cell_parse_error",
            Self::DetailResolutionError { .. } => "detail_resolution_error",
            Self::NavigationExhausted { .. } => "navigation_exhausted",
            Self::Session { .. } => "session",
        }
    }
}

/// A source definition is unusable.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The TOML document does not match the definition schema.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Reading a source file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The timezone is not an IANA id.
    #[error("{id}: unknown timezone '{timezone}'")]
    Timezone {
        /// Source id.
        id: String,
        /// Offending value.
        timezone: String,
    },

    /// A cell selector does not compile.
    #[error("{id}: {error}")]
    Selector {
        /// Source id.
        id: String,
        /// Compilation error.
        error: ExtractError,
    },

    /// A strftime pattern has an invalid specifier.
    #[error("{id}: invalid date format '{format}'")]
    DateFormat {
        /// Source id.
        id: String,
        /// Offending pattern.
        format: String,
    },

    /// The output header does not have one label per column.
    #[error("{id}: expected {expected} header labels, found {found}")]
    Header {
        /// Source id.
        id: String,
        /// Column count implied by the output settings.
        expected: usize,
        /// Labels configured.
        found: usize,
    },

    /// Any other inconsistent setting.
    #[error("{id}: {message}")]
    Invalid {
        /// Source id.
        id: String,
        /// What is wrong.
        message: String,
    },
}

/// A harvest that produced nothing usable.
#[derive(Debug, thiserror::Error)]
pub enum HarvestError {
    /// Zero programs across the whole span. Synchronization must be
    /// skipped so existing destination data is not replaced with nothing.
    #[error("no programs harvested from {source_id} ({} condition(s) recorded)", .conditions.len())]
    NoPrograms {
        /// Source that was harvested.
        source_id: String,
        /// Everything that went wrong along the way.
        conditions: Vec<HarvestCondition>,
    },

    /// The render session could not be prepared.
    #[error("render session error: {0}")]
    Session(#[from] SessionError),

    /// The source definition is unusable.
    #[error("source configuration error: {0}")]
    Config(#[from] ConfigError),
}
