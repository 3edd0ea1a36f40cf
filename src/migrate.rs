//! One-off conversion of an old three-column sheet (watched, title, year)
//! into the full movie schema.

use crate::omdb::{self, MovieQuery, OmdbApi};
use crate::sheets::{Spreadsheet, TITLE_COLUMN};
use crate::utils::append_line;
use anyhow::Result;
use std::path::Path;
use std::time::Duration;
use tracing::{error, info, warn};

pub const DEFAULT_PAUSE: Duration = Duration::from_millis(400);
/// Columns A..C of the old layout.
const SOURCE_COLUMNS: u32 = 3;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    pub migrated: usize,
    /// Raw source cells of every row that could not be converted.
    pub skipped: Vec<Vec<String>>,
}

pub async fn migrate(
    omdb: &dyn OmdbApi,
    source: &Spreadsheet,
    target: &Spreadsheet,
    suggested_by: &str,
    pause: Duration,
    failed_log: Option<&Path>,
) -> Result<MigrationReport> {
    let titles = source.read_column(TITLE_COLUMN).await?;
    let last = titles.iter().filter(|v| !v.is_empty()).count() as u32;
    let rows = source.read_rows(2, last, SOURCE_COLUMNS).await?;
    info!("Converting {} rows from '{}'", rows.len(), source.title());

    let mut report = MigrationReport::default();
    for entry in rows {
        let cell = |i: usize| entry.get(i).map(|s| s.trim()).unwrap_or("");
        let watched = cell(0) == "TRUE";
        let title = cell(1).to_string();
        let year_raw = cell(2).to_string();

        let outcome = match year_raw.parse::<i32>() {
            Ok(year) => {
                let query = MovieQuery::title_year(&title, year);
                let result = omdb::resolve(omdb, &query, watched, true, suggested_by).await;
                tokio::time::sleep(pause).await;
                result.map_err(|e| e.to_string())
            }
            Err(_) => Err(format!("invalid year '{year_raw}'")),
        };

        match outcome {
            Ok(record) => {
                let row_index = target.append(&record.to_row()).await?;
                info!("Converted {} into row {}", record, row_index);
                report.migrated += 1;
            }
            Err(reason) => {
                warn!("Failed to parse: {} ({}): {}", title, year_raw, reason);
                if let Some(path) = failed_log {
                    if let Err(e) =
                        append_line(path, &format!("Failed to parse: {title} ({year_raw})")).await
                    {
                        error!("Could not record failure: {:#}", e);
                    }
                }
                report.skipped.push(entry);
            }
        }
    }

    info!(
        "Conversion finished: {} migrated, {} skipped",
        report.migrated,
        report.skipped.len()
    );
    Ok(report)
}
