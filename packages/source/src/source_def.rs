//! Config-driven broadcast schedule source definition.
//!
//! [`SourceDefinition`] captures everything unique about a schedule site in
//! a serializable config struct: how its pages are reached, how rows are
//! dated, which selectors pick the program fields and how the output
//! partitions look. One generic pipeline handles every source.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use chrono::NaiveDate;
use chrono::format::{Item, StrftimeItems};
use chrono_tz::Tz;
use serde::Deserialize;
use tv_schedule_scraper::{CellExtractor, CellSelectors, ChannelMapping};
use tv_schedule_source_models::FetcherKind;

use crate::attribution::DateAttribution;
use crate::error::ConfigError;
use crate::labels::day_label;

// ── Top-level source definition ──────────────────────────────────────────

/// A complete, config-driven schedule source definition.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceDefinition {
    /// Unique identifier (e.g. `"wowow"`).
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Site origin (`scheme://host`) relative links are resolved against.
    pub origin: String,
    /// IANA timezone the schedule is published in.
    pub timezone: String,
    /// Browser identity overrides.
    #[serde(default)]
    pub session: SessionIdentity,
    /// How schedule pages are reached.
    pub fetcher: FetcherConfig,
    /// How rows are dated.
    pub attribution: DateAttribution,
    /// Program-cell selectors.
    pub cells: CellSelectors,
    /// Detail-page thumbnail lookup, for listings without images.
    #[serde(default)]
    pub detail: Option<DetailConfig>,
    /// Cell class to channel mapping.
    #[serde(default)]
    pub channels: ChannelMapping,
    /// Output partition layout.
    pub output: OutputConfig,
}

/// Identity the render session presents to the site.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionIdentity {
    pub locale: Option<String>,
    pub user_agent: Option<String>,
}

// ── Fetcher config ───────────────────────────────────────────────────────

const fn default_wait_timeout_secs() -> u64 {
    20
}

const fn default_click_pause_ms() -> u64 {
    1_000
}

const fn default_page_delay_secs() -> u64 {
    3
}

fn default_url_date_format() -> String {
    "%Y%m%d".to_string()
}

/// How schedule pages are reached.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FetcherConfig {
    /// One aggregate page; each day is shown by clicking its date tab.
    TabSelection {
        /// Aggregate schedule URL.
        url: String,
        /// Container that signals the page has rendered.
        page_selector: String,
        /// Date tab controls.
        tab_selector: String,
        /// Container that signals a day's listing has rendered.
        listing_selector: String,
        #[serde(default = "default_wait_timeout_secs")]
        wait_timeout_secs: u64,
        /// Pause between scrolling a tab into view and clicking it.
        #[serde(default = "default_click_pause_ms")]
        click_pause_ms: u64,
    },
    /// One URL per day, walked forward through a "next day" link.
    DateIndexed {
        /// Day URL with a `{date}` placeholder.
        url_template: String,
        /// strftime pattern for `{date}`.
        #[serde(default = "default_url_date_format")]
        url_date_format: String,
        /// Container that signals the listing has rendered.
        listing_selector: String,
        /// "Next day" link.
        next_selector: String,
        /// Minimum delay between page loads.
        #[serde(default = "default_page_delay_secs")]
        page_delay_secs: u64,
        #[serde(default = "default_wait_timeout_secs")]
        wait_timeout_secs: u64,
    },
}

impl FetcherConfig {
    #[must_use]
    pub const fn kind(&self) -> FetcherKind {
        match self {
            Self::TabSelection { .. } => FetcherKind::TabSelection,
            Self::DateIndexed { .. } => FetcherKind::DateIndexed,
        }
    }

    /// Bound for every listing wait.
    #[must_use]
    pub const fn wait_timeout(&self) -> Duration {
        match self {
            Self::TabSelection {
                wait_timeout_secs, ..
            }
            | Self::DateIndexed {
                wait_timeout_secs, ..
            } => Duration::from_secs(*wait_timeout_secs),
        }
    }
}

// ── Detail config ────────────────────────────────────────────────────────

const fn default_detail_timeout_secs() -> u64 {
    20
}

/// Where a detail page keeps the program thumbnail.
#[derive(Debug, Clone, Deserialize)]
pub struct DetailConfig {
    /// Block whose presence means the detail page has rendered.
    pub ready_selector: String,
    /// Image inside the block.
    pub image_selector: String,
    #[serde(default = "default_detail_timeout_secs")]
    pub timeout_secs: u64,
}

impl DetailConfig {
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// ── Output config ────────────────────────────────────────────────────────

/// How the date column is written.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum DateFormat {
    /// The tab label style, `4月14日(月)`.
    Label,
    /// A strftime pattern.
    Pattern(String),
}

impl Default for DateFormat {
    fn default() -> Self {
        Self::Pattern("%Y-%m-%d".to_string())
    }
}

impl From<String> for DateFormat {
    fn from(value: String) -> Self {
        if value == "label" {
            Self::Label
        } else {
            Self::Pattern(value)
        }
    }
}

impl DateFormat {
    /// Formats `date`. Patterns are checked when the definition is parsed.
    #[must_use]
    pub fn format(&self, date: NaiveDate) -> String {
        match self {
            Self::Label => day_label(date),
            Self::Pattern(pattern) => date.format(pattern).to_string(),
        }
    }
}

/// Output partition layout.
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Column labels, one per written column.
    pub header: Vec<String>,
    /// Write the episode/description column.
    #[serde(default = "default_true")]
    pub include_episode: bool,
    #[serde(default)]
    pub date_format: DateFormat,
    /// Write rows whose channel could not be resolved to an `unknown`
    /// partition instead of skipping them.
    #[serde(default)]
    pub include_unknown: bool,
}

const fn default_true() -> bool {
    true
}

impl OutputConfig {
    /// Number of columns each row has.
    #[must_use]
    pub const fn column_count(&self) -> usize {
        if self.include_episode { 5 } else { 4 }
    }
}

// ── Validation ───────────────────────────────────────────────────────────

fn is_valid_strftime(pattern: &str) -> bool {
    !StrftimeItems::new(pattern).any(|item| matches!(item, Item::Error))
}

impl SourceDefinition {
    /// The source timezone.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Timezone`] if it is not an IANA id.
    pub fn tz(&self) -> Result<Tz, ConfigError> {
        Tz::from_str(&self.timezone).map_err(|_| ConfigError::Timezone {
            id: self.id.clone(),
            timezone: self.timezone.clone(),
        })
    }

    /// Compiles this source's cell extractor.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Selector`] if a selector or the origin does
    /// not parse.
    pub fn extractor(&self) -> Result<CellExtractor, ConfigError> {
        CellExtractor::new(&self.origin, &self.cells, self.channels.clone()).map_err(|error| {
            ConfigError::Selector {
                id: self.id.clone(),
                error,
            }
        })
    }

    /// Checks everything serde cannot.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.tz()?;

        let invalid = |message: &str| ConfigError::Invalid {
            id: self.id.clone(),
            message: message.to_owned(),
        };

        if !self.origin.starts_with("http://") && !self.origin.starts_with("https://") {
            return Err(invalid("origin must be an http(s) URL"));
        }
        self.extractor()?;
        if let DateAttribution::PositionBucketed { bucket_size: 0 } = self.attribution {
            return Err(invalid("bucket_size must be positive"));
        }
        if let FetcherConfig::DateIndexed {
            url_template,
            url_date_format,
            ..
        } = &self.fetcher
        {
            if !url_template.contains("{date}") {
                return Err(invalid("url_template has no {date} placeholder"));
            }
            if !is_valid_strftime(url_date_format) {
                return Err(ConfigError::DateFormat {
                    id: self.id.clone(),
                    format: url_date_format.clone(),
                });
            }
        }
        if let DateFormat::Pattern(format) = &self.output.date_format
            && !is_valid_strftime(format)
        {
            return Err(ConfigError::DateFormat {
                id: self.id.clone(),
                format: format.clone(),
            });
        }
        if self.output.header.len() != self.output.column_count() {
            return Err(ConfigError::Header {
                id: self.id.clone(),
                expected: self.output.column_count(),
                found: self.output.header.len(),
            });
        }
        if self.channels.default.is_none() && self.channels.classes.is_empty() {
            return Err(invalid("[channels] needs a default or at least one class"));
        }
        Ok(())
    }
}

/// Parses and validates a source definition from a TOML string.
///
/// # Errors
///
/// Returns [`ConfigError`] if the TOML is malformed or the definition is
/// inconsistent.
pub fn parse_source_toml(toml_str: &str) -> Result<SourceDefinition, ConfigError> {
    let definition: SourceDefinition = toml::de::from_str(toml_str)?;
    definition.validate()?;
    Ok(definition)
}

/// Reads a source definition from a TOML file.
///
/// # Errors
///
/// Returns [`ConfigError`] if the file cannot be read or is invalid.
pub fn load_source_file(path: &Path) -> Result<SourceDefinition, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    parse_source_toml(&contents)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
id = "test"
name = "Test"
origin = "https://example.test"
timezone = "Asia/Tokyo"

[fetcher]
type = "date_indexed"
url_template = "https://example.test/schedule/{date}"
listing_selector = ".grid"
next_selector = "a.next"

[attribution]
type = "navigation_indexed"

[cells]
cell = "td"
title = ".title"

[channels]
default = "Test"

[output]
header = ["date", "time", "title", "thumbnail"]
include_episode = false
"#;

    #[test]
    fn parses_minimal_definition_with_defaults() {
        let def = parse_source_toml(MINIMAL).unwrap();
        assert_eq!(def.id, "test");
        assert_eq!(def.fetcher.kind(), FetcherKind::DateIndexed);
        assert_eq!(def.fetcher.wait_timeout(), Duration::from_secs(20));
        let FetcherConfig::DateIndexed {
            url_date_format,
            page_delay_secs,
            ..
        } = &def.fetcher
        else {
            panic!("expected date_indexed");
        };
        assert_eq!(url_date_format, "%Y%m%d");
        assert_eq!(*page_delay_secs, 3);
        assert!(def.detail.is_none());
        assert_eq!(def.output.date_format, DateFormat::default());
        assert!(!def.output.include_unknown);
        assert_eq!(def.tz().unwrap(), chrono_tz::Asia::Tokyo);
    }

    #[test]
    fn rejects_unknown_timezone() {
        let toml = MINIMAL.replace("Asia/Tokyo", "Mars/Olympus");
        assert!(matches!(
            parse_source_toml(&toml),
            Err(ConfigError::Timezone { .. })
        ));
    }

    #[test]
    fn rejects_header_mismatch() {
        let toml = MINIMAL.replace("include_episode = false", "include_episode = true");
        assert!(matches!(
            parse_source_toml(&toml),
            Err(ConfigError::Header {
                expected: 5,
                found: 4,
                ..
            })
        ));
    }

    #[test]
    fn rejects_bad_selector() {
        let toml = MINIMAL.replace(r#"cell = "td""#, r#"cell = "td[""#);
        assert!(matches!(
            parse_source_toml(&toml),
            Err(ConfigError::Selector { .. })
        ));
    }

    #[test]
    fn rejects_template_without_placeholder() {
        let toml = MINIMAL.replace("/schedule/{date}", "/schedule/");
        assert!(matches!(
            parse_source_toml(&toml),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn date_formats() {
        let date = NaiveDate::from_ymd_opt(2025, 4, 14).unwrap();
        assert_eq!(DateFormat::Label.format(date), "4月14日(月)");
        assert_eq!(
            DateFormat::from("%Y/%m/%d".to_string()).format(date),
            "2025/04/14"
        );
        assert_eq!(DateFormat::from("label".to_string()), DateFormat::Label);
        assert!(!is_valid_strftime("%Q"));
        assert!(is_valid_strftime("%Y/%m/%d"));
    }

    #[test]
    fn rejects_invalid_output_date_format() {
        let toml = MINIMAL.replace(
            "include_episode = false",
            "include_episode = false\ndate_format = \"%Q\"",
        );
        assert!(matches!(
            parse_source_toml(&toml),
            Err(ConfigError::DateFormat { .. })
        ));
    }
}
