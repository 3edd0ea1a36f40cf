use super::auth::{ServiceAccountAuth, TokenProvider};
use super::{Permission, SheetError, SheetsApi, SpreadsheetMeta, ValueInputMode, Worksheet};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const SHEETS_BASE: &str = "https://sheets.googleapis.com/v4";
const DRIVE_BASE: &str = "https://www.googleapis.com/drive/v3";
const META_FIELDS: &str = "spreadsheetId,properties.title,sheets.properties";
const PERMISSION_FIELDS: &str = "permissions(id,emailAddress,role)";

#[derive(Clone)]
pub struct SheetsClient {
    client: Client,
    auth: Arc<dyn TokenProvider>,
    sheets_base: String,
    drive_base: String,
}

impl SheetsClient {
    pub fn new(auth: Arc<dyn TokenProvider>) -> Result<Self, SheetError> {
        Self::with_base_urls(auth, SHEETS_BASE, DRIVE_BASE)
    }

    /// Points the client at custom endpoints (mock servers in tests).
    pub fn with_base_urls(
        auth: Arc<dyn TokenProvider>,
        sheets_base: &str,
        drive_base: &str,
    ) -> Result<Self, SheetError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(60))
            .user_agent(format!("reelsheet/{}", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            auth,
            sheets_base: sheets_base.trim_end_matches('/').to_string(),
            drive_base: drive_base.trim_end_matches('/').to_string(),
        })
    }

    pub async fn from_service_account(path: &Path) -> Result<Self, SheetError> {
        let auth = ServiceAccountAuth::from_file(path).await?;
        Self::new(Arc::new(auth))
    }

    fn values_url(&self, spreadsheet_id: &str, range: &str) -> String {
        format!(
            "{}/spreadsheets/{}/values/{}",
            self.sheets_base,
            spreadsheet_id,
            urlencoding::encode(range)
        )
    }

    async fn send(&self, req: RequestBuilder) -> Result<reqwest::Response, SheetError> {
        let token = self.auth.access_token().await?;
        let res = req.bearer_auth(token).send().await?;
        let status = res.status();
        if !status.is_success() {
            return Err(api_error(status.as_u16(), res.text().await));
        }
        Ok(res)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        req: RequestBuilder,
        context: &str,
    ) -> Result<T, SheetError> {
        let res = self.send(req).await?;
        let text = res.text().await?;
        serde_json::from_str(&text).map_err(|e| SheetError::Decode {
            context: context.to_string(),
            source: e,
        })
    }

    async fn get_values(
        &self,
        spreadsheet_id: &str,
        range: &str,
        major_dimension: &str,
    ) -> Result<Vec<Vec<String>>, SheetError> {
        let req = self
            .client
            .get(self.values_url(spreadsheet_id, range))
            .query(&[("majorDimension", major_dimension)]);
        let parsed: ValueRange = self.send_json(req, range).await?;
        Ok(parsed.values)
    }
}

#[async_trait]
impl SheetsApi for SheetsClient {
    async fn fetch_spreadsheet(&self, spreadsheet_id: &str) -> Result<SpreadsheetMeta, SheetError> {
        let url = format!("{}/spreadsheets/{}", self.sheets_base, spreadsheet_id);
        let req = self.client.get(url).query(&[("fields", META_FIELDS)]);
        let parsed: SpreadsheetResponse = self.send_json(req, "spreadsheet metadata").await?;
        Ok(parsed.into_meta())
    }

    async fn read_row(
        &self,
        spreadsheet_id: &str,
        worksheet: &Worksheet,
        row: u32,
    ) -> Result<Vec<String>, SheetError> {
        let range = a1_range(&worksheet.title, &format!("{row}:{row}"));
        let mut rows = self.get_values(spreadsheet_id, &range, "ROWS").await?;
        Ok(if rows.is_empty() {
            Vec::new()
        } else {
            rows.swap_remove(0)
        })
    }

    async fn read_column(
        &self,
        spreadsheet_id: &str,
        worksheet: &Worksheet,
        column: u32,
    ) -> Result<Vec<String>, SheetError> {
        let letter = column_letter(column);
        let range = a1_range(&worksheet.title, &format!("{letter}:{letter}"));
        let mut columns = self.get_values(spreadsheet_id, &range, "COLUMNS").await?;
        Ok(if columns.is_empty() {
            Vec::new()
        } else {
            columns.swap_remove(0)
        })
    }

    async fn read_rows(
        &self,
        spreadsheet_id: &str,
        worksheet: &Worksheet,
        first: u32,
        last: u32,
        last_column: u32,
    ) -> Result<Vec<Vec<String>>, SheetError> {
        let cells = format!("A{first}:{}{last}", column_letter(last_column));
        let range = a1_range(&worksheet.title, &cells);
        self.get_values(spreadsheet_id, &range, "ROWS").await
    }

    async fn write_row(
        &self,
        spreadsheet_id: &str,
        worksheet: &Worksheet,
        row: u32,
        values: &[String],
        mode: ValueInputMode,
    ) -> Result<(), SheetError> {
        let range = a1_range(&worksheet.title, &format!("A{row}"));
        debug!("Writing {} cells to {}", values.len(), range);
        let body = json!({
            "range": range,
            "majorDimension": "ROWS",
            "values": [values],
        });
        let req = self
            .client
            .put(self.values_url(spreadsheet_id, &range))
            .query(&[("valueInputOption", mode.as_param())])
            .json(&body);
        self.send(req).await?;
        Ok(())
    }

    async fn batch_update(&self, spreadsheet_id: &str, requests: &[Value]) -> Result<(), SheetError> {
        if requests.is_empty() {
            return Ok(());
        }
        let url = format!("{}/spreadsheets/{}:batchUpdate", self.sheets_base, spreadsheet_id);
        debug!("Sending {} batchUpdate requests", requests.len());
        let req = self.client.post(url).json(&json!({ "requests": requests }));
        self.send(req).await?;
        Ok(())
    }

    async fn create_spreadsheet(
        &self,
        title: &str,
        sheet_title: &str,
        rows: u32,
        columns: u32,
    ) -> Result<SpreadsheetMeta, SheetError> {
        let body = json!({
            "properties": { "title": title },
            "sheets": [{
                "properties": {
                    "title": sheet_title,
                    "gridProperties": { "rowCount": rows, "columnCount": columns }
                }
            }]
        });
        let url = format!("{}/spreadsheets", self.sheets_base);
        let req = self.client.post(url).json(&body);
        let parsed: SpreadsheetResponse = self.send_json(req, "created spreadsheet").await?;
        Ok(parsed.into_meta())
    }

    async fn share(&self, spreadsheet_id: &str, email: &str, role: &str) -> Result<(), SheetError> {
        let url = format!("{}/files/{}/permissions", self.drive_base, spreadsheet_id);
        let body = json!({
            "type": "user",
            "role": role,
            "emailAddress": email,
        });
        let req = self
            .client
            .post(url)
            .query(&[("sendNotificationEmail", "true")])
            .json(&body);
        self.send(req).await?;
        Ok(())
    }

    async fn list_permissions(&self, spreadsheet_id: &str) -> Result<Vec<Permission>, SheetError> {
        let url = format!("{}/files/{}/permissions", self.drive_base, spreadsheet_id);
        let req = self.client.get(url).query(&[("fields", PERMISSION_FIELDS)]);
        let parsed: PermissionList = self.send_json(req, "permission list").await?;
        Ok(parsed.permissions)
    }

    async fn transfer_ownership(
        &self,
        spreadsheet_id: &str,
        permission_id: &str,
    ) -> Result<(), SheetError> {
        let url = format!(
            "{}/files/{}/permissions/{}",
            self.drive_base, spreadsheet_id, permission_id
        );
        let req = self
            .client
            .patch(url)
            .json(&json!({ "role": "writer", "pendingOwner": true }));
        self.send(req).await?;
        Ok(())
    }

    async fn export_csv(&self, spreadsheet_id: &str) -> Result<Vec<u8>, SheetError> {
        let url = format!("{}/files/{}/export", self.drive_base, spreadsheet_id);
        let req = self.client.get(url).query(&[("mimeType", "text/csv")]);
        let res = self.send(req).await?;
        Ok(res.bytes().await?.to_vec())
    }
}

/// Keeps the status of a failed call even when its body cannot be read.
fn api_error(status: u16, body: Result<String, reqwest::Error>) -> SheetError {
    let body = match body {
        Ok(body) => body,
        Err(e) => {
            warn!("Could not read body of HTTP {} response: {}", status, e);
            format!("<unreadable response body: {e}>")
        }
    };
    SheetError::Api { status, body }
}

#[derive(Debug, Deserialize)]
struct PermissionList {
    #[serde(default)]
    permissions: Vec<Permission>,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SpreadsheetResponse {
    spreadsheet_id: String,
    properties: SpreadsheetProperties,
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Debug, Deserialize)]
struct SpreadsheetProperties {
    title: String,
}

#[derive(Debug, Deserialize)]
struct SheetEntry {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SheetProperties {
    #[serde(default)]
    sheet_id: i64,
    title: String,
    #[serde(default)]
    index: u32,
    #[serde(default)]
    grid_properties: Option<GridProperties>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GridProperties {
    #[serde(default)]
    row_count: u32,
    #[serde(default)]
    column_count: u32,
}

impl SpreadsheetResponse {
    fn into_meta(self) -> SpreadsheetMeta {
        let worksheets = self
            .sheets
            .into_iter()
            .map(|s| {
                let grid = s.properties.grid_properties;
                Worksheet {
                    id: s.properties.sheet_id,
                    title: s.properties.title,
                    index: s.properties.index,
                    row_count: grid.as_ref().map(|g| g.row_count).unwrap_or_default(),
                    column_count: grid.as_ref().map(|g| g.column_count).unwrap_or_default(),
                }
            })
            .collect();
        SpreadsheetMeta {
            id: self.spreadsheet_id,
            title: self.properties.title,
            worksheets,
        }
    }
}

/// Converts a 1-based column number to its A1 letters (1 → A, 27 → AA).
pub fn column_letter(column: u32) -> String {
    let mut n = column.max(1);
    let mut letters = Vec::new();
    while n > 0 {
        let rem = ((n - 1) % 26) as u8;
        letters.push((b'A' + rem) as char);
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect()
}

pub fn quote_sheet_title(title: &str) -> String {
    format!("'{}'", title.replace('\'', "''"))
}

fn a1_range(sheet_title: &str, cells: &str) -> String {
    format!("{}!{}", quote_sheet_title(sheet_title), cells)
}
