//! Runtime configuration, read once from the environment at startup.

use std::env::VarError;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_OMDB_BASE: &str = "http://www.omdbapi.com/";
pub const DEFAULT_SUGGESTED_BY: &str = "Someone";
const DEFAULT_POLL_SECS: u64 = 5;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}

/// How the target worksheet inside the spreadsheet is picked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorksheetSelector {
    Index(u32),
    Title(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub omdb_api_key: String,
    pub omdb_base_url: String,
    pub spreadsheet_id: Option<String>,
    pub worksheet: WorksheetSelector,
    pub suggested_by: String,
    pub service_account_path: PathBuf,
    pub clipboard_interval: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key))
    }

    /// Builds the configuration from an arbitrary variable lookup so tests can
    /// feed a map instead of touching the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Result<String, VarError>,
    {
        let get = |key: &str| lookup(key).ok().filter(|v| !v.trim().is_empty());

        let omdb_api_key =
            get("OMDB_API_KEY").ok_or_else(|| ConfigError::MissingEnvVar("OMDB_API_KEY".into()))?;
        let omdb_base_url = get("OMDB_BASE_URL").unwrap_or_else(|| DEFAULT_OMDB_BASE.to_string());

        let test_mode = get("TEST").as_deref() == Some("True");
        let spreadsheet_id = if test_mode {
            get("SPREADSHEET_ID_TEST")
        } else {
            get("SPREADSHEET_ID")
        };

        let worksheet = match get("WORKSHEET_TITLE") {
            Some(title) => WorksheetSelector::Title(title),
            None => {
                let index = match get("WORKSHEET_INDEX") {
                    Some(raw) => raw.trim().parse::<u32>().map_err(|e| {
                        ConfigError::InvalidEnvVar {
                            var: "WORKSHEET_INDEX".into(),
                            reason: e.to_string(),
                        }
                    })?,
                    None => 0,
                };
                WorksheetSelector::Index(index)
            }
        };

        let suggested_by =
            get("SUGGESTED_BY").unwrap_or_else(|| DEFAULT_SUGGESTED_BY.to_string());

        let service_account_path = match get("GOOGLE_SERVICE_ACCOUNT") {
            Some(path) => PathBuf::from(path),
            None => default_service_account_path(get("HOME")),
        };

        let clipboard_interval = match get("CLIPBOARD_POLL_SECS") {
            Some(raw) => {
                let secs = raw.trim().parse::<u64>().map_err(|e| ConfigError::InvalidEnvVar {
                    var: "CLIPBOARD_POLL_SECS".into(),
                    reason: e.to_string(),
                })?;
                Duration::from_secs(secs.max(1))
            }
            None => Duration::from_secs(DEFAULT_POLL_SECS),
        };

        Ok(Self {
            omdb_api_key,
            omdb_base_url,
            spreadsheet_id,
            worksheet,
            suggested_by,
            service_account_path,
            clipboard_interval,
        })
    }

    pub fn require_spreadsheet_id(&self) -> Result<&str, ConfigError> {
        self.spreadsheet_id
            .as_deref()
            .ok_or_else(|| ConfigError::MissingEnvVar("SPREADSHEET_ID".into()))
    }
}

fn default_service_account_path(home: Option<String>) -> PathBuf {
    let mut path = home.map(PathBuf::from).unwrap_or_default();
    path.push(".config");
    path.push("gspread");
    path.push("service_account.json");
    path
}
