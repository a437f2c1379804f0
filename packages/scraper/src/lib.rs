#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Listing-markup extraction for broadcast schedule pages.
//!
//! Turns rendered schedule markup into ordered [`RawProgram`] rows using
//! per-source CSS selectors ([`listing`]) and absolutizes the links found
//! in it ([`url`]).
//!
//! This crate does no I/O. Fetching and rendering pages is the job of the
//! render session; attributing dates to rows is the job of the source
//! pipeline.
//!
//! [`RawProgram`]: tv_schedule_source_models::RawProgram

pub mod listing;
pub mod url;

pub use listing::{CellExtractor, CellFailure, CellSelectors, ChannelMapping, ExtractedPage};

/// Errors that can occur while preparing an extractor.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    /// A configured CSS selector does not parse.
    #[error("invalid CSS selector '{selector}': {message}")]
    Selector {
        /// The offending selector.
        selector: String,
        /// Parser message.
        message: String,
    },

    /// The site origin links are resolved against is not an absolute URL.
    #[error(transparent)]
    Origin(#[from] crate::url::UrlError),
}
