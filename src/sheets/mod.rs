use crate::config::WorksheetSelector;
use crate::models::{SheetRow, COLUMNS};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

mod auth;
mod client;
pub mod formatting;

pub use auth::{
    NoCredentials, ServiceAccountAuth, ServiceAccountKey, StaticToken, TokenProvider,
    TOKEN_TIMEOUT,
};
pub use client::{column_letter, quote_sheet_title, SheetsClient};

/// Column holding the movie title; used to find the end of the data.
pub const TITLE_COLUMN: u32 = 2;
pub const NEW_SHEET_ROWS: u32 = 1000;
pub const NEW_SHEET_COLUMNS: u32 = 20;

#[derive(Debug, Error)]
pub enum SheetError {
    #[error("No worksheet selected; select a worksheet first")]
    NoWorksheet,

    #[error("Worksheet {0} not found")]
    WorksheetNotFound(String),

    #[error("Sheets request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Google API returned HTTP {status}: {body}")]
    Api { status: u16, body: String },

    #[error("{0} has no permission on this spreadsheet")]
    PermissionNotFound(String),

    #[error("Google authentication failed: {0}")]
    Auth(String),

    #[error("Failed to decode {context}: {source}")]
    Decode {
        context: String,
        #[source]
        source: serde_json::Error,
    },
}

/// How written cell values are interpreted by the spreadsheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueInputMode {
    /// Stored exactly as given.
    Raw,
    /// Parsed as if typed into the UI, so `=IMAGE(...)` becomes a formula.
    UserEntered,
}

impl ValueInputMode {
    pub fn as_param(&self) -> &'static str {
        match self {
            ValueInputMode::Raw => "RAW",
            ValueInputMode::UserEntered => "USER_ENTERED",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Worksheet {
    pub id: i64,
    pub title: String,
    pub index: u32,
    pub row_count: u32,
    pub column_count: u32,
}

/// A Drive permission entry on the spreadsheet file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Permission {
    pub id: String,
    #[serde(default)]
    pub email_address: Option<String>,
    #[serde(default)]
    pub role: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpreadsheetMeta {
    pub id: String,
    pub title: String,
    pub worksheets: Vec<Worksheet>,
}

/// Remote tabular store. Rows and columns are 1-based.
#[async_trait]
pub trait SheetsApi: Send + Sync {
    async fn fetch_spreadsheet(&self, spreadsheet_id: &str) -> Result<SpreadsheetMeta, SheetError>;
    async fn read_row(
        &self,
        spreadsheet_id: &str,
        worksheet: &Worksheet,
        row: u32,
    ) -> Result<Vec<String>, SheetError>;
    async fn read_column(
        &self,
        spreadsheet_id: &str,
        worksheet: &Worksheet,
        column: u32,
    ) -> Result<Vec<String>, SheetError>;
    /// Reads rows `first..=last`, columns `A` through `last_column`.
    async fn read_rows(
        &self,
        spreadsheet_id: &str,
        worksheet: &Worksheet,
        first: u32,
        last: u32,
        last_column: u32,
    ) -> Result<Vec<Vec<String>>, SheetError>;
    async fn write_row(
        &self,
        spreadsheet_id: &str,
        worksheet: &Worksheet,
        row: u32,
        values: &[String],
        mode: ValueInputMode,
    ) -> Result<(), SheetError>;
    /// Applies formatting and validation requests in one `batchUpdate`.
    async fn batch_update(&self, spreadsheet_id: &str, requests: &[Value]) -> Result<(), SheetError>;
    async fn create_spreadsheet(
        &self,
        title: &str,
        sheet_title: &str,
        rows: u32,
        columns: u32,
    ) -> Result<SpreadsheetMeta, SheetError>;
    async fn share(&self, spreadsheet_id: &str, email: &str, role: &str) -> Result<(), SheetError>;
    async fn list_permissions(&self, spreadsheet_id: &str) -> Result<Vec<Permission>, SheetError>;
    /// Marks the permission as pending owner; the new owner accepts in the web UI.
    async fn transfer_ownership(
        &self,
        spreadsheet_id: &str,
        permission_id: &str,
    ) -> Result<(), SheetError>;
    async fn export_csv(&self, spreadsheet_id: &str) -> Result<Vec<u8>, SheetError>;
}

/// An opened spreadsheet plus the worksheet rows are appended to.
#[derive(Clone)]
pub struct Spreadsheet {
    api: Arc<dyn SheetsApi>,
    meta: SpreadsheetMeta,
    worksheet: Option<Worksheet>,
}

impl std::fmt::Debug for Spreadsheet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Spreadsheet")
            .field("meta", &self.meta)
            .field("worksheet", &self.worksheet)
            .finish()
    }
}

impl Spreadsheet {
    pub async fn open(api: Arc<dyn SheetsApi>, spreadsheet_id: &str) -> Result<Self, SheetError> {
        let meta = api.fetch_spreadsheet(spreadsheet_id).await?;
        debug!(
            "Opened spreadsheet '{}' ({} worksheets)",
            meta.title,
            meta.worksheets.len()
        );
        Ok(Self {
            api,
            meta,
            worksheet: None,
        })
    }

    /// Creates a spreadsheet with one worksheet, selects it and writes the header row.
    pub async fn create(
        api: Arc<dyn SheetsApi>,
        title: &str,
        sheet_title: &str,
    ) -> Result<Self, SheetError> {
        let meta = api
            .create_spreadsheet(title, sheet_title, NEW_SHEET_ROWS, NEW_SHEET_COLUMNS)
            .await?;
        info!("Created spreadsheet '{}' with ID {}", meta.title, meta.id);
        let mut sheet = Self {
            api,
            meta,
            worksheet: None,
        };
        let ws_id = sheet.select_worksheet_by_title(sheet_title)?.id;
        sheet.ensure_headers().await?;
        sheet
            .api
            .batch_update(&sheet.meta.id, &formatting::column_widths(ws_id))
            .await?;
        Ok(sheet)
    }

    pub fn id(&self) -> &str {
        &self.meta.id
    }

    pub fn title(&self) -> &str {
        &self.meta.title
    }

    pub fn worksheets(&self) -> &[Worksheet] {
        &self.meta.worksheets
    }

    pub fn worksheet(&self) -> Result<&Worksheet, SheetError> {
        self.worksheet.as_ref().ok_or(SheetError::NoWorksheet)
    }

    pub fn select_worksheet(&mut self, index: u32) -> Result<&Worksheet, SheetError> {
        let ws = self
            .meta
            .worksheets
            .iter()
            .find(|w| w.index == index)
            .cloned()
            .ok_or_else(|| SheetError::WorksheetNotFound(format!("with index {index}")))?;
        Ok(self.worksheet.insert(ws))
    }

    pub fn select_worksheet_by_title(&mut self, title: &str) -> Result<&Worksheet, SheetError> {
        let ws = self
            .meta
            .worksheets
            .iter()
            .find(|w| w.title == title)
            .cloned()
            .ok_or_else(|| SheetError::WorksheetNotFound(format!("'{title}'")))?;
        Ok(self.worksheet.insert(ws))
    }

    pub fn select(&mut self, selector: &WorksheetSelector) -> Result<&Worksheet, SheetError> {
        match selector {
            WorksheetSelector::Index(index) => self.select_worksheet(*index),
            WorksheetSelector::Title(title) => self.select_worksheet_by_title(title),
        }
    }

    pub async fn read_row(&self, row: u32) -> Result<Vec<String>, SheetError> {
        let ws = self.worksheet()?;
        self.api.read_row(&self.meta.id, ws, row).await
    }

    pub async fn read_column(&self, column: u32) -> Result<Vec<String>, SheetError> {
        let ws = self.worksheet()?;
        self.api.read_column(&self.meta.id, ws, column).await
    }

    pub async fn read_rows(
        &self,
        first: u32,
        last: u32,
        last_column: u32,
    ) -> Result<Vec<Vec<String>>, SheetError> {
        let ws = self.worksheet()?;
        if last < first {
            return Ok(Vec::new());
        }
        self.api
            .read_rows(&self.meta.id, ws, first, last, last_column)
            .await
    }

    /// Rewrites row 1 when it differs from [`COLUMNS`]. Returns whether a
    /// write happened.
    pub async fn ensure_headers(&self) -> Result<bool, SheetError> {
        let ws = self.worksheet()?;
        let current = self.api.read_row(&self.meta.id, ws, 1).await?;
        if current.iter().map(String::as_str).eq(COLUMNS.iter().copied()) {
            return Ok(false);
        }
        info!("Headers of worksheet '{}' need updating", ws.title);
        let header: Vec<String> = COLUMNS.iter().map(|c| c.to_string()).collect();
        self.api
            .write_row(&self.meta.id, ws, 1, &header, ValueInputMode::UserEntered)
            .await?;
        Ok(true)
    }

    /// First row after the populated Title cells. Gaps inside the data are not reused.
    pub async fn find_free_row(&self) -> Result<u32, SheetError> {
        let titles = self.read_column(TITLE_COLUMN).await?;
        let used = titles.iter().filter(|v| !v.is_empty()).count() as u32;
        debug!("First free row: {}", used + 1);
        Ok(used + 1)
    }

    /// Repairs the header if needed, formats the first free row (checkbox,
    /// height, colors) and writes `row` into it.
    pub async fn append(&self, row: &SheetRow) -> Result<u32, SheetError> {
        let ws = self.worksheet()?;
        self.ensure_headers().await?;
        let target = self.find_free_row().await?;
        self.api
            .batch_update(&self.meta.id, &formatting::movie_row(ws.id, target))
            .await?;
        self.api
            .write_row(
                &self.meta.id,
                ws,
                target,
                row.values(),
                ValueInputMode::UserEntered,
            )
            .await?;
        info!("Wrote row {} of worksheet '{}'", target, ws.title);
        Ok(target)
    }

    pub async fn share(&self, email: &str, role: &str) -> Result<(), SheetError> {
        self.api.share(&self.meta.id, email, role).await?;
        info!("Shared spreadsheet {} with {} as {}", self.meta.id, email, role);
        Ok(())
    }

    /// Starts handing the spreadsheet over to `email`, who must already
    /// have access to it.
    pub async fn transfer_ownership(&self, email: &str) -> Result<(), SheetError> {
        let permissions = self.api.list_permissions(&self.meta.id).await?;
        let permission = permissions
            .iter()
            .find(|p| {
                p.email_address
                    .as_deref()
                    .is_some_and(|e| e.eq_ignore_ascii_case(email))
            })
            .ok_or_else(|| SheetError::PermissionNotFound(email.to_string()))?;
        self.api
            .transfer_ownership(&self.meta.id, &permission.id)
            .await?;
        info!("Ownership transfer to {email} initiated; accept it in the Google Sheets web interface");
        Ok(())
    }

    pub async fn export_csv(&self) -> Result<Vec<u8>, SheetError> {
        self.api.export_csv(&self.meta.id).await
    }
}
