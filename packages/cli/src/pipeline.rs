//! Harvest-and-sync orchestration for the CLI.
//!
//! Resolves the source definition, runs the blocking harvest on a worker
//! thread with a live Chrome session, partitions the programs per channel
//! and replaces the destination tables.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::Args;
use dialoguer::{Confirm, Input, Select};
use tv_schedule_browser::{ChromeSession, SessionConfig};
use tv_schedule_cli_utils::{HarvestBar, MultiProgress};
use tv_schedule_source::harvest::DEFAULT_DAYS;
use tv_schedule_source::source_def::load_source_file;
use tv_schedule_source::{
    HarvestError, HarvestOptions, HarvestReport, SourceDefinition, harvest, partition_programs,
    registry,
};
use tv_schedule_source_models::Partition;
use tv_schedule_sync::{CsvDirectorySink, SheetsSink, SyncReport, TableSink, synchronize};

/// Default CSV output directory.
const DEFAULT_OUT_DIR: &str = "output";

/// Options for one harvest run.
#[derive(Debug, Args)]
#[allow(clippy::struct_excessive_bools)]
pub struct HarvestArgs {
    /// Built-in source id (e.g. "wowow"); see `tv_schedule sources`
    #[arg(required_unless_present = "source_file")]
    pub source: Option<String>,

    /// Load the source definition from a TOML file instead
    #[arg(long, conflicts_with = "source")]
    pub source_file: Option<PathBuf>,

    /// Number of days to harvest, starting at the start date
    #[arg(long, default_value_t = DEFAULT_DAYS)]
    pub days: usize,

    /// First day (YYYY-MM-DD); defaults to today in the source timezone
    #[arg(long)]
    pub start_date: Option<NaiveDate>,

    /// Leave thumbnails empty instead of visiting detail pages
    #[arg(long)]
    pub skip_thumbnails: bool,

    /// Directory receiving one CSV per channel
    #[arg(long, env = "TV_SCHEDULE_OUT_DIR", default_value = DEFAULT_OUT_DIR)]
    pub out_dir: PathBuf,

    /// Write to this Google spreadsheet instead of the CSV directory
    #[arg(long, env = "TV_SCHEDULE_SPREADSHEET_ID", requires = "sheets_token")]
    pub spreadsheet_id: Option<String>,

    /// OAuth bearer token for the Sheets API
    #[arg(long, env = "TV_SCHEDULE_SHEETS_TOKEN", hide_env_values = true)]
    pub sheets_token: Option<String>,

    /// Show the browser window
    #[arg(long)]
    pub headed: bool,

    /// Print the partitions instead of writing them
    #[arg(long)]
    pub dry_run: bool,
}

impl HarvestArgs {
    fn options(&self) -> HarvestOptions {
        let mut options = HarvestOptions::default().with_days(self.days);
        if let Some(date) = self.start_date {
            options = options.with_start_date(date);
        }
        if self.skip_thumbnails {
            options = options.without_thumbnails();
        }
        options
    }

    fn load_source(&self) -> Result<SourceDefinition, Box<dyn std::error::Error>> {
        if let Some(path) = &self.source_file {
            return Ok(load_source_file(path)?);
        }
        let id = self.source.as_deref().unwrap_or_default();
        registry::find_source(id)?.ok_or_else(|| {
            format!(
                "Unknown source: {id} (available: {})",
                registry::source_ids().join(", ")
            )
            .into()
        })
    }

    fn sink(&self) -> Box<dyn TableSink> {
        match (&self.spreadsheet_id, &self.sheets_token) {
            (Some(spreadsheet_id), Some(token)) => {
                Box::new(SheetsSink::new(spreadsheet_id, token))
            }
            _ => Box::new(CsvDirectorySink::new(&self.out_dir)),
        }
    }
}

/// Harvests one source and replaces its destination tables.
///
/// # Errors
///
/// Returns an error if the source cannot be loaded, Chrome cannot be
/// started, nothing was harvested (nothing is written then) or any
/// partition could not be replaced.
pub async fn run(
    multi: &MultiProgress,
    args: HarvestArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    if args.days == 0 {
        return Err("--days must be at least 1".into());
    }
    let source = args.load_source()?;
    let report = run_harvest(multi, &source, &args).await?;

    let partitions = partition_programs(&report.programs, &source);

    if args.dry_run {
        print_partitions(&partitions);
        return Ok(());
    }

    let sink = args.sink();
    let sync = synchronize(sink.as_ref(), &partitions).await;
    summarize(&report, &sync, sink.as_ref());

    let failed = sync.failures().count();
    if failed > 0 {
        return Err(format!(
            "{failed} of {} partition(s) were not replaced",
            partitions.len()
        )
        .into());
    }
    Ok(())
}

/// Runs the harvest on a blocking worker with its own Chrome session.
async fn run_harvest(
    multi: &MultiProgress,
    source: &SourceDefinition,
    args: &HarvestArgs,
) -> Result<HarvestReport, Box<dyn std::error::Error>> {
    let base = if args.headed {
        SessionConfig::debug_mode()
    } else {
        SessionConfig::default()
    };
    let session_config = base.with_identity(
        &source.timezone,
        source.session.locale.as_deref(),
        source.session.user_agent.as_deref(),
    );

    let progress = HarvestBar::new(multi, &source.name);
    let options = args.options();
    let source = source.clone();
    let worker_progress = progress.clone();

    let result = tokio::task::spawn_blocking(move || -> Result<HarvestReport, HarvestError> {
        let mut session = ChromeSession::launch(session_config)?;
        harvest(&mut session, &source, &options, worker_progress.as_ref())
    })
    .await;

    progress.clear();
    Ok(result??)
}

fn summarize(report: &HarvestReport, sync: &SyncReport, sink: &dyn TableSink) {
    let dates = report.dates();
    let span = match (dates.first(), dates.last()) {
        (Some(first), Some(last)) => format!("{first}..={last}"),
        _ => String::from("-"),
    };
    println!();
    println!("Source:      {}", report.source_id);
    println!("Days:        {} ({span})", dates.len());
    println!(
        "Pages:       {}/{}",
        report.pages_rendered, report.pages_requested
    );
    println!("Programs:    {}", report.programs.len());
    println!("Thumbnails:  {} detail lookup(s)", report.detail_lookups);
    println!("Failures:    {}", report.failures().count());
    for condition in report.failures() {
        println!("  [{}] {condition}", condition.kind());
    }
    println!("Destination: {}", sink.describe());
    for outcome in &sync.outcomes {
        match &outcome.result {
            Ok(()) => println!("  {:<20} {} row(s)", outcome.name, outcome.rows),
            Err(e) => println!("  {:<20} FAILED: {e}", outcome.name),
        }
    }
}

fn print_partitions(partitions: &[Partition]) {
    for partition in partitions {
        println!();
        println!("== {} ({} row(s)) ==", partition.name, partition.rows.len());
        for row in partition.to_table() {
            println!("{}", row.join("\t"));
        }
    }
}

/// Prompts for a built-in source and span, then harvests to the CSV
/// directory.
///
/// # Errors
///
/// Returns an error if a prompt fails or the harvest does.
pub async fn interactive(multi: &MultiProgress) -> Result<(), Box<dyn std::error::Error>> {
    println!("TV Schedule Harvester");
    println!();

    let sources = registry::all_sources()?;
    let labels: Vec<String> = sources
        .iter()
        .map(|s| format!("{} ({})", s.id, s.name))
        .collect();

    let idx = Select::new()
        .with_prompt("Which schedule?")
        .items(&labels)
        .default(0)
        .interact()?;

    let days: usize = Input::new()
        .with_prompt("Days to harvest")
        .default(DEFAULT_DAYS)
        .validate_with(|days: &usize| {
            if *days == 0 {
                Err("must be at least 1")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let with_thumbnails = sources[idx].detail.is_none()
        || Confirm::new()
            .with_prompt("Visit detail pages for thumbnails?")
            .default(true)
            .interact()?;

    let out_dir: String = Input::new()
        .with_prompt("Output directory")
        .default(DEFAULT_OUT_DIR.to_string())
        .interact_text()?;

    let args = HarvestArgs {
        source: Some(sources[idx].id.clone()),
        source_file: None,
        days,
        start_date: None,
        skip_thumbnails: !with_thumbnails,
        out_dir: PathBuf::from(out_dir),
        spreadsheet_id: None,
        sheets_token: None,
        headed: false,
        dry_run: false,
    };

    run(multi, args).await
}
