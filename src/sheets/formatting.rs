//! `batchUpdate` requests that lay out the movie sheet: the watched checkbox,
//! poster-sized rows, alternating row colors and column widths.

use crate::models::COLUMN_COUNT;
use serde_json::{json, Value};

pub const ROW_HEIGHT_PX: u32 = 150;

/// Pixel widths of columns A through K.
pub const COLUMN_WIDTHS: [u32; COLUMN_COUNT] = [70, 300, 40, 300, 60, 100, 80, 92, 150, 300, 150];

/// 8-bit RGB; the API wants each channel as a fraction of 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color(pub u8, pub u8, pub u8);

impl Color {
    pub fn to_api(self) -> Value {
        let channel = |c: u8| f64::from(c) / 255.0;
        json!({
            "red": channel(self.0),
            "green": channel(self.1),
            "blue": channel(self.2),
        })
    }
}

pub const EVEN_ROW_BACKGROUND: Color = Color(0x00, 0x00, 0x00);
pub const ODD_ROW_BACKGROUND: Color = Color(0x2d, 0x2d, 0x2d);
pub const TEXT_COLOR: Color = Color(0xff, 0xff, 0xff);

/// Background for a 1-based row.
pub fn row_background(row: u32) -> Color {
    if row % 2 == 1 {
        ODD_ROW_BACKGROUND
    } else {
        EVEN_ROW_BACKGROUND
    }
}

fn row_range(sheet_id: i64, row: u32, first_column: u32, last_column: u32) -> Value {
    json!({
        "sheetId": sheet_id,
        "startRowIndex": row - 1,
        "endRowIndex": row,
        "startColumnIndex": first_column - 1,
        "endColumnIndex": last_column,
    })
}

pub fn checkbox(sheet_id: i64, row: u32) -> Value {
    json!({
        "setDataValidation": {
            "range": row_range(sheet_id, row, 1, 1),
            "rule": { "condition": { "type": "BOOLEAN" }, "strict": true }
        }
    })
}

pub fn row_height(sheet_id: i64, row: u32, pixels: u32) -> Value {
    json!({
        "updateDimensionProperties": {
            "range": {
                "sheetId": sheet_id,
                "dimension": "ROWS",
                "startIndex": row - 1,
                "endIndex": row,
            },
            "properties": { "pixelSize": pixels },
            "fields": "pixelSize"
        }
    })
}

pub fn row_colors(sheet_id: i64, row: u32) -> Value {
    json!({
        "repeatCell": {
            "range": row_range(sheet_id, row, 1, COLUMN_COUNT as u32),
            "cell": {
                "userEnteredFormat": {
                    "backgroundColor": row_background(row).to_api(),
                    "textFormat": { "foregroundColor": TEXT_COLOR.to_api() }
                }
            },
            "fields": "userEnteredFormat(backgroundColor,textFormat.foregroundColor)"
        }
    })
}

pub fn column_widths(sheet_id: i64) -> Vec<Value> {
    COLUMN_WIDTHS
        .iter()
        .enumerate()
        .map(|(idx, width)| {
            json!({
                "updateDimensionProperties": {
                    "range": {
                        "sheetId": sheet_id,
                        "dimension": "COLUMNS",
                        "startIndex": idx,
                        "endIndex": idx + 1,
                    },
                    "properties": { "pixelSize": width },
                    "fields": "pixelSize"
                }
            })
        })
        .collect()
}

/// Everything a freshly written movie row needs.
pub fn movie_row(sheet_id: i64, row: u32) -> Vec<Value> {
    vec![
        checkbox(sheet_id, row),
        row_height(sheet_id, row, ROW_HEIGHT_PX),
        row_colors(sheet_id, row),
    ]
}
