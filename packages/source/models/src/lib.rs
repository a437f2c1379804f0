#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Broadcast schedule record types.
//!
//! The extractor produces [`RawProgram`] values straight from listing
//! markup. Once a calendar date has been attributed and the thumbnail
//! resolved, each raw program is frozen into a [`ProgramRecord`], which is
//! what gets partitioned by [`Channel`] and written to the destination.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Display name used for [`Channel::Unknown`].
pub const UNKNOWN_CHANNEL: &str = "unknown";

/// How a source's schedule pages are navigated.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FetcherKind {
    /// One aggregate page; each day is selected by clicking a date tab.
    TabSelection,
    /// One URL per day, walked forward through a "next day" link.
    DateIndexed,
}

/// How extracted rows are assigned their calendar date.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AttributionKind {
    /// Fixed-size buckets of rows on a single multi-day page.
    PositionBucketed,
    /// The pagination index of the page the row was read from.
    NavigationIndexed,
}

/// The channel a program airs on.
///
/// Cells whose structural class has no configured mapping resolve to
/// [`Channel::Unknown`] rather than being dropped.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    /// A channel with a configured display name (also its partition name).
    Named(String),
    /// No mapping matched the cell.
    Unknown,
}

impl Channel {
    /// Creates a named channel.
    #[must_use]
    pub fn named(name: &str) -> Self {
        Self::Named(name.to_owned())
    }

    /// Returns the display name, [`UNKNOWN_CHANNEL`] for unmapped cells.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Named(name) => name,
            Self::Unknown => UNKNOWN_CHANNEL,
        }
    }

    /// Whether this is the unresolved sentinel.
    #[must_use]
    pub const fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A program cell as read from listing markup, before date attribution.
///
/// Every text field is already trimmed; fields missing from the markup are
/// empty strings (or `None` for the URL fields).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawProgram {
    /// Channel resolved from the cell's structural class.
    pub channel: Channel,
    /// Airtime exactly as displayed (never parsed).
    pub time_label: String,
    /// Program title.
    pub title: String,
    /// Episode tag or synopsis, depending on the source.
    pub episode_or_description: String,
    /// Absolute URL of the program's detail page, if the cell links to one.
    pub detail_url: Option<String>,
    /// Absolute thumbnail URL when the listing embeds the image directly.
    pub thumbnail_url: Option<String>,
}

/// One scheduled broadcast slot, ready to be written out.
///
/// Built exactly once from a [`RawProgram`], the attributed date and the
/// resolved thumbnail. There are no setters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgramRecord {
    channel: Channel,
    date: NaiveDate,
    time_label: String,
    title: String,
    episode_or_description: String,
    thumbnail_url: String,
}

impl ProgramRecord {
    /// Freezes a raw program with its attributed date and thumbnail.
    ///
    /// An empty `thumbnail_url` means the thumbnail could not be resolved.
    #[must_use]
    pub fn from_raw(raw: RawProgram, date: NaiveDate, thumbnail_url: String) -> Self {
        Self {
            channel: raw.channel,
            date,
            time_label: raw.time_label,
            title: raw.title,
            episode_or_description: raw.episode_or_description,
            thumbnail_url,
        }
    }

    /// The channel the slot airs on.
    #[must_use]
    pub const fn channel(&self) -> &Channel {
        &self.channel
    }

    /// The calendar day the slot airs, in the source's timezone.
    #[must_use]
    pub const fn date(&self) -> NaiveDate {
        self.date
    }

    /// Airtime as displayed by the source.
    #[must_use]
    pub fn time_label(&self) -> &str {
        &self.time_label
    }

    /// Program title (possibly empty).
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Episode tag or synopsis.
    #[must_use]
    pub fn episode_or_description(&self) -> &str {
        &self.episode_or_description
    }

    /// Absolute thumbnail URL, or `""` when unresolved.
    #[must_use]
    pub fn thumbnail_url(&self) -> &str {
        &self.thumbnail_url
    }
}

/// One independently replaceable destination table: a fixed header and
/// the rows to write under it, in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partition {
    /// Destination table name (the channel name).
    pub name: String,
    /// Column labels.
    pub header: Vec<String>,
    /// Rows, each with one field per header column.
    pub rows: Vec<Vec<String>>,
}

impl Partition {
    /// Creates a header-only partition.
    #[must_use]
    pub fn new(name: &str, header: Vec<String>) -> Self {
        Self {
            name: name.to_owned(),
            header,
            rows: Vec::new(),
        }
    }

    /// Whether the partition holds no rows beyond its header.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Header followed by every row, as written in one bulk operation.
    #[must_use]
    pub fn to_table(&self) -> Vec<Vec<String>> {
        std::iter::once(self.header.clone())
            .chain(self.rows.iter().cloned())
            .collect()
    }
}
