#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Destination tables for harvested schedule partitions.
//!
//! A [`TableSink`] destructively replaces one named partition with a header
//! and rows in a single bulk write. [`synchronize`] drives a sink over many
//! partitions, isolating each one: a failed partition is recorded in the
//! [`SyncReport`] and the others still run.

pub mod csv_dir;
pub mod retry;
pub mod sheets;

use async_trait::async_trait;
use tv_schedule_source_models::Partition;

pub use csv_dir::CsvDirectorySink;
pub use sheets::SheetsSink;

/// Errors raised while replacing a partition.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The destination API answered with an error status.
    #[error("HTTP {status}: {message}")]
    Status {
        /// Response status code.
        status: u16,
        /// Error message from the response body, if any.
        message: String,
    },

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error (file read/write).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV writing failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// A row does not have one field per header column.
    #[error("row {row} has {found} field(s), header has {expected}")]
    Shape {
        /// 1-based row number (header excluded).
        row: usize,
        /// Header width.
        expected: usize,
        /// Row width.
        found: usize,
    },

    /// The sink is misconfigured.
    #[error("sink configuration error: {0}")]
    Config(String),

    /// A blocking write task panicked or was cancelled.
    #[error("write task failed: {0}")]
    Task(String),
}

/// A destination made of independently replaceable tables.
#[async_trait]
pub trait TableSink: Send + Sync {
    /// Short description for logs (e.g. the directory or spreadsheet id).
    fn describe(&self) -> String;

    /// Replaces the contents of partition `name` with `header` followed by
    /// `rows`. An empty `rows` leaves the partition header-only.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError`] if the partition could not be replaced.
    async fn replace_partition(
        &self,
        name: &str,
        header: &[String],
        rows: &[Vec<String>],
    ) -> Result<(), SyncError>;
}

/// What happened to one partition.
#[derive(Debug)]
pub struct PartitionOutcome {
    pub name: String,
    /// Rows written (header excluded).
    pub rows: usize,
    pub result: Result<(), SyncError>,
}

/// Outcome of a [`synchronize`] run, one entry per partition in order.
#[derive(Debug, Default)]
pub struct SyncReport {
    pub outcomes: Vec<PartitionOutcome>,
}

impl SyncReport {
    /// Whether every partition was replaced.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(|o| o.result.is_ok())
    }

    /// Partitions that failed.
    pub fn failures(&self) -> impl Iterator<Item = &PartitionOutcome> {
        self.outcomes.iter().filter(|o| o.result.is_err())
    }

    /// Total rows written across successful partitions.
    #[must_use]
    pub fn rows_written(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.result.is_ok())
            .map(|o| o.rows)
            .sum()
    }
}

fn check_shape(partition: &Partition) -> Result<(), SyncError> {
    let expected = partition.header.len();
    partition
        .rows
        .iter()
        .enumerate()
        .find(|(_, row)| row.len() != expected)
        .map_or(Ok(()), |(index, row)| {
            Err(SyncError::Shape {
                row: index + 1,
                expected,
                found: row.len(),
            })
        })
}

/// Replaces every partition through `sink`, one at a time, in order.
///
/// A partition that fails is logged and recorded; it never stops the
/// remaining partitions.
pub async fn synchronize(sink: &dyn TableSink, partitions: &[Partition]) -> SyncReport {
    let mut report = SyncReport::default();
    log::info!(
        "Synchronizing {} partition(s) to {}",
        partitions.len(),
        sink.describe()
    );

    for partition in partitions {
        let result = match check_shape(partition) {
            Ok(()) => {
                sink.replace_partition(&partition.name, &partition.header, &partition.rows)
                    .await
            }
            Err(e) => Err(e),
        };

        match &result {
            Ok(()) if partition.is_empty() => {
                log::warn!("'{}' has no rows; left header-only", partition.name);
            }
            Ok(()) => log::info!("'{}': {} row(s) written", partition.name, partition.rows.len()),
            Err(e) => log::error!("'{}' was not replaced: {e}", partition.name),
        }

        report.outcomes.push(PartitionOutcome {
            name: partition.name.clone(),
            rows: partition.rows.len(),
            result,
        });
    }

    report
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    use super::*;

    /// Keeps partitions in memory; fails for names in `broken`.
    #[derive(Default)]
    struct MemorySink {
        tables: Mutex<BTreeMap<String, Vec<Vec<String>>>>,
        broken: Vec<String>,
    }

    #[async_trait]
    impl TableSink for MemorySink {
        fn describe(&self) -> String {
            "memory".to_string()
        }

        async fn replace_partition(
            &self,
            name: &str,
            header: &[String],
            rows: &[Vec<String>],
        ) -> Result<(), SyncError> {
            if self.broken.iter().any(|b| b == name) {
                return Err(SyncError::Status {
                    status: 503,
                    message: "unavailable".to_string(),
                });
            }
            let mut table = vec![header.to_vec()];
            table.extend(rows.iter().cloned());
            self.tables.lock().unwrap().insert(name.to_owned(), table);
            Ok(())
        }
    }

    fn header() -> Vec<String> {
        ["日付", "時間", "タイトル"].map(String::from).to_vec()
    }

    fn row(title: &str) -> Vec<String> {
        vec!["2024/04/14".to_string(), "06:00".to_string(), title.to_string()]
    }

    #[tokio::test]
    async fn empty_partition_is_header_only_and_other_is_unaffected() {
        let sink = MemorySink::default();
        let mut full = Partition::new("WOWOWプライム", header());
        full.rows = vec![row("a"), row("b")];
        let empty = Partition::new("WOWOWライブ", header());

        let report = synchronize(&sink, &[full, empty]).await;

        assert!(report.is_success());
        assert_eq!(report.rows_written(), 2);
        let tables = sink.tables.lock().unwrap();
        assert_eq!(tables["WOWOWライブ"], vec![header()]);
        assert_eq!(tables["WOWOWプライム"].len(), 3);
        assert_eq!(tables["WOWOWプライム"][2], row("b"));
    }

    #[tokio::test]
    async fn failed_partition_does_not_block_the_rest() {
        let sink = MemorySink {
            broken: vec!["a".to_string()],
            ..MemorySink::default()
        };
        let mut a = Partition::new("a", header());
        a.rows = vec![row("x")];
        let mut b = Partition::new("b", header());
        b.rows = vec![row("y")];

        let report = synchronize(&sink, &[a, b]).await;

        assert!(!report.is_success());
        assert_eq!(report.failures().count(), 1);
        assert_eq!(report.outcomes[0].name, "a");
        assert!(report.outcomes[1].result.is_ok());
        assert!(sink.tables.lock().unwrap().contains_key("b"));
    }

    #[tokio::test]
    async fn ragged_rows_are_rejected_before_writing() {
        let sink = MemorySink::default();
        let mut ragged = Partition::new("a", header());
        ragged.rows = vec![row("ok"), vec!["short".to_string()]];

        let report = synchronize(&sink, &[ragged]).await;

        assert!(matches!(
            report.outcomes[0].result,
            Err(SyncError::Shape {
                row: 2,
                expected: 3,
                found: 1
            })
        ));
        assert!(sink.tables.lock().unwrap().is_empty());
    }
}
