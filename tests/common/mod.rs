#![allow(dead_code)]

use reelsheet::config::Config;
use reelsheet::models::COLUMNS;
use reelsheet::omdb::{MovieQuery, OmdbApi, OmdbPayload, RetrievalError};
use reelsheet::sheets::{
    Permission, SheetError, SheetsApi, SpreadsheetMeta, ValueInputMode, Worksheet,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::env::VarError;
use std::sync::Mutex;

pub const SHEET_ID: &str = "sheet-123";

pub struct FakeOmdb {
    pub payloads: HashMap<String, Value>,
    pub calls: Mutex<Vec<MovieQuery>>,
}

impl FakeOmdb {
    pub fn new(entries: Vec<(&str, Value)>) -> Self {
        Self {
            payloads: entries
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn key(query: &MovieQuery) -> String {
        match query {
            MovieQuery::ImdbId(id) => id.clone(),
            MovieQuery::TitleYear { title, year } => format!("{title}|{year}"),
        }
    }
}

#[async_trait::async_trait]
impl OmdbApi for FakeOmdb {
    async fn fetch(&self, query: &MovieQuery) -> Result<OmdbPayload, RetrievalError> {
        self.calls.lock().unwrap().push(query.clone());
        match self.payloads.get(&Self::key(query)) {
            Some(v) => Ok(serde_json::from_value(v.clone()).unwrap()),
            None => Err(RetrievalError::NotFound {
                query: query.to_string(),
                message: "Movie not found!".to_string(),
            }),
        }
    }
}

pub struct FakeBook {
    pub meta: SpreadsheetMeta,
    /// Cell grid of the first worksheet, row-major, 0-based.
    pub grid: Vec<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Write {
    pub spreadsheet_id: String,
    pub row: u32,
    pub values: Vec<String>,
    pub mode: ValueInputMode,
}

pub struct FakeSheets {
    pub books: Mutex<HashMap<String, FakeBook>>,
    pub writes: Mutex<Vec<Write>>,
    pub shares: Mutex<Vec<(String, String, String)>>,
    pub batches: Mutex<Vec<(String, Vec<Value>)>>,
    pub permissions: Mutex<HashMap<String, Vec<Permission>>>,
    pub transfers: Mutex<Vec<(String, String)>>,
}

impl FakeSheets {
    pub fn new() -> Self {
        Self {
            books: Mutex::new(HashMap::new()),
            writes: Mutex::new(Vec::new()),
            shares: Mutex::new(Vec::new()),
            batches: Mutex::new(Vec::new()),
            permissions: Mutex::new(HashMap::new()),
            transfers: Mutex::new(Vec::new()),
        }
    }

    pub fn with_permission(self, id: &str, permission_id: &str, email: &str) -> Self {
        self.permissions
            .lock()
            .unwrap()
            .entry(id.to_string())
            .or_default()
            .push(Permission {
                id: permission_id.to_string(),
                email_address: Some(email.to_string()),
                role: "writer".to_string(),
            });
        self
    }

    pub fn batches(&self) -> Vec<(String, Vec<Value>)> {
        self.batches.lock().unwrap().clone()
    }

    pub fn transfers(&self) -> Vec<(String, String)> {
        self.transfers.lock().unwrap().clone()
    }

    pub fn with_book(self, id: &str, sheet_title: &str, rows: Vec<Vec<&str>>) -> Self {
        let book = FakeBook {
            meta: meta(id, sheet_title),
            grid: rows
                .into_iter()
                .map(|r| r.into_iter().map(str::to_string).collect())
                .collect(),
        };
        self.books.lock().unwrap().insert(id.to_string(), book);
        self
    }

    pub fn grid(&self, id: &str) -> Vec<Vec<String>> {
        self.books.lock().unwrap()[id].grid.clone()
    }

    pub fn writes(&self) -> Vec<Write> {
        self.writes.lock().unwrap().clone()
    }

    fn with_grid<T>(
        &self,
        id: &str,
        f: impl FnOnce(&mut Vec<Vec<String>>) -> T,
    ) -> Result<T, SheetError> {
        let mut books = self.books.lock().unwrap();
        let book = books.get_mut(id).ok_or_else(|| SheetError::Api {
            status: 404,
            body: format!("Requested entity was not found: {id}"),
        })?;
        Ok(f(&mut book.grid))
    }
}

fn meta(id: &str, sheet_title: &str) -> SpreadsheetMeta {
    SpreadsheetMeta {
        id: id.to_string(),
        title: format!("Book {id}"),
        worksheets: vec![Worksheet {
            id: 0,
            title: sheet_title.to_string(),
            index: 0,
            row_count: 1000,
            column_count: 20,
        }],
    }
}

// The Sheets API drops trailing empty cells and rows from value ranges.
fn trim_trailing(mut cells: Vec<String>) -> Vec<String> {
    while cells.last().is_some_and(|c| c.is_empty()) {
        cells.pop();
    }
    cells
}

#[async_trait::async_trait]
impl SheetsApi for FakeSheets {
    async fn fetch_spreadsheet(&self, spreadsheet_id: &str) -> Result<SpreadsheetMeta, SheetError> {
        let books = self.books.lock().unwrap();
        books
            .get(spreadsheet_id)
            .map(|b| b.meta.clone())
            .ok_or_else(|| SheetError::Api {
                status: 404,
                body: "not found".to_string(),
            })
    }

    async fn read_row(
        &self,
        spreadsheet_id: &str,
        _worksheet: &Worksheet,
        row: u32,
    ) -> Result<Vec<String>, SheetError> {
        self.with_grid(spreadsheet_id, |grid| {
            grid.get(row as usize - 1)
                .cloned()
                .map(trim_trailing)
                .unwrap_or_default()
        })
    }

    async fn read_column(
        &self,
        spreadsheet_id: &str,
        _worksheet: &Worksheet,
        column: u32,
    ) -> Result<Vec<String>, SheetError> {
        self.with_grid(spreadsheet_id, |grid| {
            trim_trailing(
                grid.iter()
                    .map(|r| r.get(column as usize - 1).cloned().unwrap_or_default())
                    .collect(),
            )
        })
    }

    async fn read_rows(
        &self,
        spreadsheet_id: &str,
        _worksheet: &Worksheet,
        first: u32,
        last: u32,
        last_column: u32,
    ) -> Result<Vec<Vec<String>>, SheetError> {
        self.with_grid(spreadsheet_id, |grid| {
            let mut rows: Vec<Vec<String>> = grid
                .iter()
                .skip(first as usize - 1)
                .take((last - first + 1) as usize)
                .map(|r| {
                    trim_trailing(r.iter().take(last_column as usize).cloned().collect())
                })
                .collect();
            while rows.last().is_some_and(|r| r.is_empty()) {
                rows.pop();
            }
            rows
        })
    }

    async fn write_row(
        &self,
        spreadsheet_id: &str,
        _worksheet: &Worksheet,
        row: u32,
        values: &[String],
        mode: ValueInputMode,
    ) -> Result<(), SheetError> {
        self.with_grid(spreadsheet_id, |grid| {
            let idx = row as usize - 1;
            if grid.len() <= idx {
                grid.resize(idx + 1, Vec::new());
            }
            let target = &mut grid[idx];
            if target.len() < values.len() {
                target.resize(values.len(), String::new());
            }
            for (cell, value) in target.iter_mut().zip(values) {
                *cell = value.clone();
            }
        })?;
        self.writes.lock().unwrap().push(Write {
            spreadsheet_id: spreadsheet_id.to_string(),
            row,
            values: values.to_vec(),
            mode,
        });
        Ok(())
    }

    async fn batch_update(&self, spreadsheet_id: &str, requests: &[Value]) -> Result<(), SheetError> {
        self.with_grid(spreadsheet_id, |_| ())?;
        self.batches
            .lock()
            .unwrap()
            .push((spreadsheet_id.to_string(), requests.to_vec()));
        Ok(())
    }

    async fn create_spreadsheet(
        &self,
        title: &str,
        sheet_title: &str,
        rows: u32,
        columns: u32,
    ) -> Result<SpreadsheetMeta, SheetError> {
        let mut books = self.books.lock().unwrap();
        let id = format!("created-{}", books.len() + 1);
        let mut meta = meta(&id, sheet_title);
        meta.title = title.to_string();
        meta.worksheets[0].row_count = rows;
        meta.worksheets[0].column_count = columns;
        books.insert(
            id,
            FakeBook {
                meta: meta.clone(),
                grid: Vec::new(),
            },
        );
        Ok(meta)
    }

    async fn share(&self, spreadsheet_id: &str, email: &str, role: &str) -> Result<(), SheetError> {
        self.shares.lock().unwrap().push((
            spreadsheet_id.to_string(),
            email.to_string(),
            role.to_string(),
        ));
        Ok(())
    }

    async fn list_permissions(&self, spreadsheet_id: &str) -> Result<Vec<Permission>, SheetError> {
        Ok(self
            .permissions
            .lock()
            .unwrap()
            .get(spreadsheet_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn transfer_ownership(
        &self,
        spreadsheet_id: &str,
        permission_id: &str,
    ) -> Result<(), SheetError> {
        self.transfers
            .lock()
            .unwrap()
            .push((spreadsheet_id.to_string(), permission_id.to_string()));
        Ok(())
    }

    async fn export_csv(&self, spreadsheet_id: &str) -> Result<Vec<u8>, SheetError> {
        self.with_grid(spreadsheet_id, |grid| {
            grid.iter()
                .map(|r| r.join(","))
                .collect::<Vec<_>>()
                .join("\n")
                .into_bytes()
        })
    }
}

pub fn header() -> Vec<&'static str> {
    COLUMNS.to_vec()
}

pub fn config(vars: &[(&str, &str)]) -> Config {
    let mut map: HashMap<String, String> = HashMap::new();
    map.insert("OMDB_API_KEY".into(), "test-key".into());
    for (k, v) in vars {
        map.insert(k.to_string(), v.to_string());
    }
    Config::from_lookup(|key| map.get(key).cloned().ok_or(VarError::NotPresent)).unwrap()
}

pub fn inception() -> Value {
    json!({
        "Title": "Inception",
        "Year": "2010",
        "Rated": "PG-13",
        "Runtime": "148 min",
        "Genre": "Action, Adventure, Sci-Fi",
        "Director": "Christopher Nolan",
        "Plot": "A thief who steals corporate secrets through the use of dream-sharing technology is given the inverse task of planting an idea into the mind of a C.E.O.",
        "Poster": "https://m.media-amazon.com/images/M/inception.jpg",
        "Ratings": [
            {"Source": "Internet Movie Database", "Value": "8.8/10"},
            {"Source": "Rotten Tomatoes", "Value": "87%"},
            {"Source": "Metacritic", "Value": "74/100"}
        ],
        "imdbRating": "8.8",
        "imdbID": "tt1375666",
        "Response": "True"
    })
}

pub fn heat() -> Value {
    json!({
        "Title": "Heat",
        "Year": "1995",
        "Runtime": "170 min",
        "Genre": "Action, Crime, Drama",
        "Director": "Michael Mann",
        "Plot": "A group of high-end professional thieves start to feel the heat from the LAPD.",
        "Poster": "N/A",
        "Ratings": [{"Source": "Internet Movie Database", "Value": "8.3/10"}],
        "imdbRating": "8.3",
        "imdbID": "tt0113277",
        "Response": "True"
    })
}
