//! One harvest of one source: render pages, extract cells, date rows,
//! resolve thumbnails, then split the result into output partitions.

use std::collections::BTreeSet;

use chrono::{Days, NaiveDate};
use tv_schedule_browser::RenderSession;
use tv_schedule_source_models::{Channel, Partition, ProgramRecord};

use crate::attribution::today_in;
use crate::detail::DetailResolver;
use crate::error::{HarvestCondition, HarvestError};
use crate::pagination::render_pages;
use crate::progress::ProgressCallback;
use crate::source_def::{OutputConfig, SourceDefinition};

/// Default span, one week.
pub const DEFAULT_DAYS: usize = 7;

/// What to harvest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestOptions {
    /// Number of days from the anchor.
    pub days: usize,
    /// First day; today in the source timezone when unset.
    pub start_date: Option<NaiveDate>,
    /// Visit detail pages for thumbnails the listing lacks.
    pub resolve_thumbnails: bool,
}

impl Default for HarvestOptions {
    fn default() -> Self {
        Self {
            days: DEFAULT_DAYS,
            start_date: None,
            resolve_thumbnails: true,
        }
    }
}

impl HarvestOptions {
    #[must_use]
    pub const fn with_days(mut self, days: usize) -> Self {
        self.days = days;
        self
    }

    #[must_use]
    pub const fn with_start_date(mut self, date: NaiveDate) -> Self {
        self.start_date = Some(date);
        self
    }

    #[must_use]
    pub const fn without_thumbnails(mut self) -> Self {
        self.resolve_thumbnails = false;
        self
    }
}

/// Outcome of a harvest that produced at least one program.
#[derive(Debug)]
pub struct HarvestReport {
    pub source_id: String,
    /// Day 0 of the span.
    pub anchor: NaiveDate,
    pub pages_requested: usize,
    pub pages_rendered: usize,
    /// Every program in extraction order.
    pub programs: Vec<ProgramRecord>,
    /// Everything that was contained along the way.
    pub conditions: Vec<HarvestCondition>,
    /// Detail pages visited.
    pub detail_lookups: usize,
}

impl HarvestReport {
    /// Distinct days that received at least one program.
    #[must_use]
    pub fn dates(&self) -> BTreeSet<NaiveDate> {
        self.programs.iter().map(ProgramRecord::date).collect()
    }

    /// Conditions that lost data.
    pub fn failures(&self) -> impl Iterator<Item = &HarvestCondition> {
        self.conditions.iter().filter(|c| c.is_failure())
    }
}

/// Harvests `source` through `session`.
///
/// Page-, row- and thumbnail-level problems are contained and returned in
/// [`HarvestReport::conditions`].
///
/// # Errors
///
/// Returns [`HarvestError::Config`] for an unusable definition,
/// [`HarvestError::Session`] if the session rejects the source timezone and
/// [`HarvestError::NoPrograms`] if nothing at all was harvested.
pub fn harvest<S: RenderSession + ?Sized>(
    session: &mut S,
    source: &SourceDefinition,
    options: &HarvestOptions,
    progress: &dyn ProgressCallback,
) -> Result<HarvestReport, HarvestError> {
    let timezone = source.tz()?;
    let extractor = source.extractor()?;
    let anchor = options.start_date.unwrap_or_else(|| today_in(timezone));

    session.set_timezone(&source.timezone)?;

    let pages_requested = source.attribution.pages_for(options.days);
    log::info!(
        "Harvesting {} ({}, {}) from {anchor}: {} day(s), {pages_requested} page(s)",
        source.id,
        source.fetcher.kind(),
        source.attribution.kind(),
        options.days,
    );
    progress.pages_planned(pages_requested as u64);

    let walk = render_pages(session, &source.fetcher, anchor, pages_requested, progress);
    let mut conditions = walk.conditions;

    let mut resolver = source
        .detail
        .as_ref()
        .filter(|_| options.resolve_thumbnails)
        .map(|config| DetailResolver::new(config.clone()));

    // Bucketed pages can list more days than were asked for.
    let span_end = u64::try_from(options.days)
        .ok()
        .and_then(|days| anchor.checked_add_days(Days::new(days)));
    let mut beyond_span = 0_usize;

    let mut programs = Vec::new();
    for page in &walk.pages {
        let extracted = extractor.extract(&page.markup);
        log::info!(
            "{}: {} program(s) from {} cell(s)",
            page.date,
            extracted.programs.len(),
            extracted.cell_count(),
        );
        conditions.extend(extracted.failures.into_iter().map(|failure| {
            HarvestCondition::CellParseError {
                date: page.date,
                position: failure.position,
                reason: failure.reason,
            }
        }));

        for (date, mut raw) in source
            .attribution
            .stamp(anchor, page.index, extracted.programs)
        {
            if span_end.is_some_and(|end| date >= end) {
                log::trace!("Dropping '{}' on {date}: after the requested span", raw.title);
                beyond_span += 1;
                continue;
            }
            let thumbnail = match (raw.thumbnail_url.take(), &raw.detail_url, &mut resolver) {
                (Some(direct), _, _) => direct,
                (None, Some(url), Some(resolver)) => {
                    if !resolver.is_cached(url) {
                        progress.detail_lookup(&raw.title);
                    }
                    resolver.resolve_thumbnail(session, url)
                }
                _ => String::new(),
            };
            programs.push(ProgramRecord::from_raw(raw, date, thumbnail));
        }
    }

    if beyond_span > 0 {
        log::info!(
            "{}: dropped {beyond_span} row(s) dated after the {}-day span",
            source.id,
            options.days,
        );
    }

    let detail_lookups = resolver.as_ref().map_or(0, DetailResolver::lookups);
    if let Some(resolver) = &mut resolver {
        conditions.extend(resolver.take_failures());
    }

    let failed = conditions.iter().filter(|c| c.is_failure()).count();
    if programs.is_empty() {
        progress.finish(format!("{}: no programs", source.id));
        log::error!(
            "No programs harvested from {} ({failed} failure(s))",
            source.id
        );
        return Err(HarvestError::NoPrograms {
            source_id: source.id.clone(),
            conditions,
        });
    }

    progress.finish(format!("{}: {} program(s)", source.id, programs.len()));
    log::info!(
        "Harvested {} program(s) from {} over {} page(s); \
         {detail_lookups} detail lookup(s), {failed} contained failure(s)",
        programs.len(),
        source.id,
        walk.pages.len(),
    );

    Ok(HarvestReport {
        source_id: source.id.clone(),
        anchor,
        pages_requested,
        pages_rendered: walk.pages.len(),
        programs,
        conditions,
        detail_lookups,
    })
}

/// Splits programs into one partition per configured channel.
///
/// Every configured channel gets a partition even when it has no rows, so
/// stale destination data for it is cleared. Unresolved-channel rows go to
/// an `unknown` partition when the output allows it and are skipped
/// otherwise. Order within each partition follows `programs`.
#[must_use]
pub fn partition_programs(programs: &[ProgramRecord], source: &SourceDefinition) -> Vec<Partition> {
    let output = &source.output;
    let mut partitions: Vec<Partition> = source
        .channels
        .channel_names()
        .iter()
        .map(|name| Partition::new(name, output.header.clone()))
        .collect();

    let mut skipped = 0_usize;
    for program in programs {
        let name = match program.channel() {
            Channel::Unknown if !output.include_unknown => {
                skipped += 1;
                continue;
            }
            channel => channel.name(),
        };
        let index = if let Some(index) = partitions.iter().position(|p| p.name == name) {
            index
        } else {
            partitions.push(Partition::new(name, output.header.clone()));
            partitions.len() - 1
        };
        partitions[index].rows.push(program_row(program, output));
    }

    if skipped > 0 {
        log::warn!(
            "{}: skipped {skipped} program(s) on unmapped channels (include_unknown = false)",
            source.id
        );
    }
    for partition in &partitions {
        log::debug!("Partition '{}': {} row(s)", partition.name, partition.rows.len());
    }
    partitions
}

fn program_row(program: &ProgramRecord, output: &OutputConfig) -> Vec<String> {
    let mut row = Vec::with_capacity(output.column_count());
    row.push(output.date_format.format(program.date()));
    row.push(program.time_label().to_owned());
    row.push(program.title().to_owned());
    if output.include_episode {
        row.push(program.episode_or_description().to_owned());
    }
    row.push(program.thumbnail_url().to_owned());
    row
}
