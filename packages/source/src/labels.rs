//! Japanese day labels as rendered on schedule date tabs.
//!
//! Tabs read `"{month}月{day}日({weekday})"` with plain decimal month and
//! day and a single-kanji weekday, e.g. `4月14日(日)`. Matching is literal
//! first, then through a pattern that tolerates whitespace and full-width
//! parentheses.

use chrono::{Datelike, NaiveDate};
use regex::Regex;

/// Weekday kanji, Monday first.
pub const WEEKDAY_KANJI: [&str; 7] = ["月", "火", "水", "木", "金", "土", "日"];

/// How a tab label matched a day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelMatch {
    Exact,
    Relaxed,
}

#[must_use]
pub fn weekday_kanji(date: NaiveDate) -> &'static str {
    WEEKDAY_KANJI[date.weekday().num_days_from_monday() as usize]
}

/// The tab label for `date`, e.g. `4月14日(日)`.
#[must_use]
pub fn day_label(date: NaiveDate) -> String {
    format!("{}月{}日({})", date.month(), date.day(), weekday_kanji(date))
}

/// Pattern matching `date`'s label with any whitespace around its parts.
///
/// # Errors
///
/// Returns [`regex::Error`] if the pattern fails to compile.
pub fn relaxed_day_pattern(date: NaiveDate) -> Result<Regex, regex::Error> {
    Regex::new(&format!(
        r"{}\s*月\s*{}\s*日\s*[(（]\s*{}\s*[)）]",
        date.month(),
        date.day(),
        weekday_kanji(date),
    ))
}

/// Picks the control whose label names `date` from `labels`.
///
/// An exact (trimmed) match anywhere wins over a relaxed match. Returns the
/// index into `labels`.
#[must_use]
pub fn find_day_label<'a>(
    labels: impl IntoIterator<Item = &'a str> + Clone,
    date: NaiveDate,
) -> Option<(usize, LabelMatch)> {
    let wanted = day_label(date);
    if let Some(index) = labels
        .clone()
        .into_iter()
        .position(|label| label.trim() == wanted)
    {
        return Some((index, LabelMatch::Exact));
    }

    let pattern = match relaxed_day_pattern(date) {
        Ok(pattern) => pattern,
        Err(e) => {
            log::warn!("Relaxed label pattern for {date} did not compile: {e}");
            return None;
        }
    };
    labels
        .into_iter()
        .position(|label| pattern.is_match(label) && !preceded_by_digit(&pattern, label))
        .map(|index| (index, LabelMatch::Relaxed))
}

/// `1月4日` must not match inside `11月4日`.
fn preceded_by_digit(pattern: &Regex, label: &str) -> bool {
    pattern.find_iter(label).all(|m| {
        label[..m.start()]
            .chars()
            .next_back()
            .is_some_and(|c| c.is_ascii_digit())
    })
}
