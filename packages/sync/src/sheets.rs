//! Google Sheets destination: one worksheet per partition.
//!
//! Replacing a partition deletes the worksheet with that title (if any),
//! adds a fresh one sized to fit and writes header plus rows from `A1` in a
//! single `values.update` call. Authentication is an opaque OAuth bearer
//! token supplied by the caller.

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::retry::send_json;
use crate::{SyncError, TableSink};

/// Sheets API v4 spreadsheets endpoint.
pub const DEFAULT_API_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";

/// Smallest grid a new worksheet gets.
const MIN_ROWS: usize = 1_000;
const MIN_COLUMNS: usize = 10;

/// Writes partitions to worksheets of one spreadsheet.
#[derive(Debug, Clone)]
pub struct SheetsSink {
    client: reqwest::Client,
    api_base: String,
    spreadsheet_id: String,
    token: String,
}

impl SheetsSink {
    #[must_use]
    pub fn new(spreadsheet_id: &str, token: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: DEFAULT_API_BASE.to_string(),
            spreadsheet_id: spreadsheet_id.to_owned(),
            token: token.to_owned(),
        }
    }

    /// Points the sink at a different API root (e.g. a proxy).
    #[must_use]
    pub fn with_api_base(mut self, api_base: &str) -> Self {
        api_base.trim_end_matches('/').clone_into(&mut self.api_base);
        self
    }

    fn url(&self, segments: &[&str]) -> Result<reqwest::Url, SyncError> {
        let mut url = reqwest::Url::parse(&self.api_base)
            .map_err(|e| SyncError::Config(format!("API base '{}': {e}", self.api_base)))?;
        url.path_segments_mut()
            .map_err(|()| {
                SyncError::Config(format!("API base '{}' cannot have a path", self.api_base))
            })?
            .extend(segments);
        Ok(url)
    }

    async fn sheet_id(&self, title: &str) -> Result<Option<i64>, SyncError> {
        let mut url = self.url(&[&self.spreadsheet_id])?;
        url.query_pairs_mut()
            .append_pair("fields", "sheets.properties(sheetId,title)");
        let metadata = send_json(|| self.client.get(url.clone()).bearer_auth(&self.token)).await?;
        Ok(find_sheet_id(&metadata, title))
    }

    async fn batch_update(&self, request: Value) -> Result<Value, SyncError> {
        let url = self.url(&[&format!("{}:batchUpdate", self.spreadsheet_id)])?;
        let body = json!({ "requests": [request] });
        send_json(|| {
            self.client
                .post(url.clone())
                .bearer_auth(&self.token)
                .json(&body)
        })
        .await
    }

    async fn write_values(&self, title: &str, values: &[Vec<String>]) -> Result<(), SyncError> {
        let range = a1_origin(title);
        let mut url = self.url(&[&self.spreadsheet_id, "values", &range])?;
        url.query_pairs_mut().append_pair("valueInputOption", "RAW");
        let body = json!({
            "range": range,
            "majorDimension": "ROWS",
            "values": values,
        });
        send_json(|| {
            self.client
                .put(url.clone())
                .bearer_auth(&self.token)
                .json(&body)
        })
        .await?;
        Ok(())
    }
}

#[async_trait]
impl TableSink for SheetsSink {
    fn describe(&self) -> String {
        format!("spreadsheet {}", self.spreadsheet_id)
    }

    async fn replace_partition(
        &self,
        name: &str,
        header: &[String],
        rows: &[Vec<String>],
    ) -> Result<(), SyncError> {
        if let Some(sheet_id) = self.sheet_id(name).await? {
            self.batch_update(json!({ "deleteSheet": { "sheetId": sheet_id } }))
                .await?;
            log::debug!("Deleted worksheet '{name}' ({sheet_id})");
        }

        let (row_count, column_count) = grid_size(rows.len() + 1, header.len());
        self.batch_update(add_sheet_request(name, row_count, column_count))
            .await?;
        log::debug!("Added worksheet '{name}' ({row_count}x{column_count})");

        let mut values = Vec::with_capacity(rows.len() + 1);
        values.push(header.to_vec());
        values.extend(rows.iter().cloned());
        self.write_values(name, &values).await
    }
}

/// Grid dimensions for a table of `rows` x `columns`, never smaller than
/// the default new-sheet size.
#[must_use]
pub fn grid_size(rows: usize, columns: usize) -> (usize, usize) {
    (rows.max(MIN_ROWS), columns.max(MIN_COLUMNS))
}

/// `'<title>'!A1` with quotes in the title doubled.
#[must_use]
pub fn a1_origin(title: &str) -> String {
    format!("'{}'!A1", title.replace('\'', "''"))
}

fn add_sheet_request(title: &str, rows: usize, columns: usize) -> Value {
    json!({
        "addSheet": {
            "properties": {
                "title": title,
                "gridProperties": { "rowCount": rows, "columnCount": columns },
            }
        }
    })
}

/// Finds the id of the worksheet titled `title` in spreadsheet metadata.
fn find_sheet_id(metadata: &Value, title: &str) -> Option<i64> {
    metadata
        .get("sheets")?
        .as_array()?
        .iter()
        .filter_map(|sheet| sheet.get("properties"))
        .find(|props| props.get("title").and_then(Value::as_str) == Some(title))
        .and_then(|props| props.get("sheetId"))
        .and_then(Value::as_i64)
}
