//! One CSV file per partition in a local directory.

use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::{SyncError, TableSink};

/// Writes `<dir>/<partition>.csv`.
///
/// Each file is written to a hidden temporary file next to it and renamed
/// over the old one, so readers never see a half-written table.
#[derive(Debug, Clone)]
pub struct CsvDirectorySink {
    dir: PathBuf,
}

impl CsvDirectorySink {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// File a partition is written to. Path separators and other characters
    /// that are unsafe in file names become `_`.
    #[must_use]
    pub fn path_for(&self, name: &str) -> PathBuf {
        let file: String = name
            .chars()
            .map(|c| match c {
                '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
                c if c.is_control() => '_',
                c => c,
            })
            .collect();
        self.dir.join(format!("{file}.csv"))
    }
}

fn write_table(path: &Path, header: &[String], rows: &[Vec<String>]) -> Result<(), SyncError> {
    let Some(dir) = path.parent() else {
        return Err(SyncError::Config(format!("{} has no parent", path.display())));
    };
    fs::create_dir_all(dir)?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp = dir.join(format!(".{file_name}.tmp"));

    {
        let mut writer = csv::Writer::from_path(&temp)?;
        writer.write_record(header)?;
        for row in rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
    }

    fs::rename(&temp, path)?;
    Ok(())
}

#[async_trait]
impl TableSink for CsvDirectorySink {
    fn describe(&self) -> String {
        format!("CSV directory {}", self.dir.display())
    }

    async fn replace_partition(
        &self,
        name: &str,
        header: &[String],
        rows: &[Vec<String>],
    ) -> Result<(), SyncError> {
        let path = self.path_for(name);
        let header = header.to_vec();
        let rows = rows.to_vec();
        log::debug!("Writing {} row(s) to {}", rows.len(), path.display());

        tokio::task::spawn_blocking(move || write_table(&path, &header, &rows))
            .await
            .map_err(|e| SyncError::Task(e.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header() -> Vec<String> {
        ["日付", "時間", "タイトル", "説明", "画像URL"]
            .map(String::from)
            .to_vec()
    }

    #[tokio::test]
    async fn writes_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let sink = CsvDirectorySink::new(dir.path());
        let rows = vec![vec![
            "2024/04/14".to_string(),
            "06:00".to_string(),
            "映画, 吹替版".to_string(),
            String::new(),
            "https://cdn.test/a.jpg".to_string(),
        ]];

        sink.replace_partition("WOWOWシネマ", &header(), &rows)
            .await
            .unwrap();

        let written = fs::read_to_string(dir.path().join("WOWOWシネマ.csv")).unwrap();
        assert_eq!(
            written,
            "日付,時間,タイトル,説明,画像URL\n2024/04/14,06:00,\"映画, 吹替版\",,https://cdn.test/a.jpg\n"
        );
    }

    #[tokio::test]
    async fn replaces_previous_contents() {
        let dir = tempfile::tempdir().unwrap();
        let sink = CsvDirectorySink::new(dir.path());
        let row = vec!["a".to_string(); 5];

        sink.replace_partition("p", &header(), &[row.clone(), row])
            .await
            .unwrap();
        sink.replace_partition("p", &header(), &[]).await.unwrap();

        let written = fs::read_to_string(sink.path_for("p")).unwrap();
        assert_eq!(written.lines().count(), 1);
        assert!(!dir.path().join(".p.csv.tmp").exists());
    }

    #[test]
    fn sanitizes_file_names() {
        let sink = CsvDirectorySink::new("/out");
        assert_eq!(sink.path_for("a/b:c"), PathBuf::from("/out/a_b_c.csv"));
    }
}
