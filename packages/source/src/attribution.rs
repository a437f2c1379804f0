//! Calendar-date attribution for extracted rows.
//!
//! Listing markup rarely carries a per-row date, so every row is stamped by
//! one of two policies chosen per source:
//!
//! - [`DateAttribution::NavigationIndexed`]: page `i` of the walk shows day
//!   `anchor + i`, and every row on it gets that day.
//! - [`DateAttribution::PositionBucketed`]: a single page lists several
//!   days back to back with a fixed number of slots per day. Row `p`
//!   (1-based) gets `anchor + floor((p - 1) / bucket_size)`. The slot count
//!   is an unpublished property of the upstream site, so this is a fallback
//!   for sources with no per-day pages.

use chrono::{Days, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::Deserialize;
use tv_schedule_source_models::{AttributionKind, RawProgram};

/// Date attribution policy, configured per source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DateAttribution {
    /// Fixed-size buckets of rows on one multi-day page.
    PositionBucketed {
        /// Rows per day.
        bucket_size: usize,
    },
    /// The page's index in the pagination walk.
    NavigationIndexed,
}

impl DateAttribution {
    #[must_use]
    pub const fn kind(&self) -> AttributionKind {
        match self {
            Self::PositionBucketed { .. } => AttributionKind::PositionBucketed,
            Self::NavigationIndexed => AttributionKind::NavigationIndexed,
        }
    }

    /// Number of pages to render for a span of `days`.
    ///
    /// A bucketed page already covers the span, so at most one is needed.
    #[must_use]
    pub fn pages_for(&self, days: usize) -> usize {
        match self {
            Self::PositionBucketed { .. } => days.min(1),
            Self::NavigationIndexed => days,
        }
    }

    /// Date for the row at 1-based `position` on page `page_index`.
    ///
    /// Returns `None` if the date would overflow the calendar.
    #[must_use]
    pub fn date_for(
        &self,
        anchor: NaiveDate,
        page_index: usize,
        position: usize,
    ) -> Option<NaiveDate> {
        let offset = match self {
            Self::PositionBucketed { bucket_size } => {
                position.saturating_sub(1) / (*bucket_size).max(1)
            }
            Self::NavigationIndexed => page_index,
        };
        anchor.checked_add_days(Days::new(u64::try_from(offset).ok()?))
    }

    /// Stamps every row of one page with its date, keeping extraction order.
    #[must_use]
    pub fn stamp(
        &self,
        anchor: NaiveDate,
        page_index: usize,
        programs: Vec<RawProgram>,
    ) -> Vec<(NaiveDate, RawProgram)> {
        if let Self::PositionBucketed { bucket_size } = self
            && *bucket_size > 0
            && programs.len() % bucket_size != 0
        {
            log::warn!(
                "{} rows is not a multiple of the {bucket_size}-slot day; \
                 dates near the end may be off",
                programs.len(),
            );
        }

        programs
            .into_iter()
            .enumerate()
            .filter_map(|(index, program)| {
                let position = index + 1;
                let Some(date) = self.date_for(anchor, page_index, position) else {
                    log::warn!("Row {position} on page {page_index}: date out of range, dropped");
                    return None;
                };
                Some((date, program))
            })
            .collect()
    }
}

/// Today's date in `timezone`.
#[must_use]
pub fn today_in(timezone: Tz) -> NaiveDate {
    Utc::now().with_timezone(&timezone).date_naive()
}

#[cfg(test)]
mod tests {
    use tv_schedule_source_models::Channel;

    use super::*;

    fn anchor() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 4, 14).unwrap()
    }

    fn rows(count: usize) -> Vec<RawProgram> {
        (0..count)
            .map(|i| RawProgram {
                channel: Channel::named("アニマックス"),
                time_label: format!("{i}"),
                title: format!("title {i}"),
                episode_or_description: String::new(),
                detail_url: None,
                thumbnail_url: None,
            })
            .collect()
    }

    #[test]
    fn buckets_of_48_rows_per_day() {
        let policy = DateAttribution::PositionBucketed { bucket_size: 48 };
        let stamped = policy.stamp(anchor(), 0, rows(96));

        assert_eq!(stamped.len(), 96);
        for (date, _) in &stamped[..48] {
            assert_eq!(*date, anchor());
        }
        for (date, _) in &stamped[48..] {
            assert_eq!(*date, NaiveDate::from_ymd_opt(2024, 4, 15).unwrap());
        }
        assert_eq!(stamped[48].1.title, "title 48");
    }

    #[test]
    fn bucket_position_formula() {
        let policy = DateAttribution::PositionBucketed { bucket_size: 48 };
        assert_eq!(policy.date_for(anchor(), 0, 1), Some(anchor()));
        assert_eq!(policy.date_for(anchor(), 0, 48), Some(anchor()));
        assert_eq!(
            policy.date_for(anchor(), 0, 49),
            NaiveDate::from_ymd_opt(2024, 4, 15)
        );
        assert_eq!(
            policy.date_for(anchor(), 3, 337),
            NaiveDate::from_ymd_opt(2024, 4, 21)
        );
    }

    #[test]
    fn partial_last_bucket_is_kept() {
        let policy = DateAttribution::PositionBucketed { bucket_size: 48 };
        let stamped = policy.stamp(anchor(), 0, rows(50));
        assert_eq!(stamped.len(), 50);
        assert_eq!(stamped[49].0, NaiveDate::from_ymd_opt(2024, 4, 15).unwrap());
    }

    #[test]
    fn navigation_index_applies_to_whole_page() {
        let policy = DateAttribution::NavigationIndexed;
        let stamped = policy.stamp(anchor(), 2, rows(5));
        assert!(
            stamped
                .iter()
                .all(|(date, _)| *date == NaiveDate::from_ymd_opt(2024, 4, 16).unwrap())
        );
    }

    #[test]
    fn page_counts() {
        assert_eq!(
            DateAttribution::PositionBucketed { bucket_size: 48 }.pages_for(7),
            1
        );
        assert_eq!(
            DateAttribution::PositionBucketed { bucket_size: 48 }.pages_for(0),
            0
        );
        assert_eq!(DateAttribution::NavigationIndexed.pages_for(7), 7);
    }

    #[test]
    fn kind_matches_variant() {
        assert_eq!(
            DateAttribution::NavigationIndexed.kind(),
            AttributionKind::NavigationIndexed
        );
    }
}
