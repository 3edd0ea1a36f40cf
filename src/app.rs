use crate::clipboard::{is_imdb_id, ClipboardSource, ClipboardWatcher, CommandClipboard};
use crate::config::Config;
use crate::display::{render_row, render_stored_row};
use crate::migrate::{self, MigrationReport, DEFAULT_PAUSE};
use crate::omdb::{self, MovieQuery, OmdbApi, OmdbClient};
use crate::sheets::{NoCredentials, SheetsApi, SheetsClient, Spreadsheet};
use anyhow::{Context, Result};
use std::path::Path;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{error, info, warn};

pub const NEW_SPREADSHEET_TITLE: &str = "Movie Database";
pub const NEW_WORKSHEET_TITLE: &str = "Movies";
const SHARE_ROLE: &str = "writer";

#[derive(Clone)]
pub struct App {
    pub config: Config,
    pub omdb: Arc<dyn OmdbApi>,
    pub sheets: Arc<dyn SheetsApi>,
}

impl App {
    pub fn new(config: Config, omdb: Arc<dyn OmdbApi>, sheets: Arc<dyn SheetsApi>) -> Self {
        Self {
            config,
            omdb,
            sheets,
        }
    }

    /// Wires the real OMDb and Google clients from `config`.
    pub async fn from_config(config: Config) -> Result<Self> {
        let omdb: Arc<dyn OmdbApi> = Arc::new(
            OmdbClient::new(&config.omdb_base_url, &config.omdb_api_key)
                .context("Failed to build OMDb client")?,
        );
        let sheets: Arc<dyn SheetsApi> = Arc::new(
            SheetsClient::from_service_account(&config.service_account_path)
                .await
                .context("Failed to set up Google Sheets access")?,
        );
        Ok(Self::new(config, omdb, sheets))
    }

    /// OMDb only; any spreadsheet call fails with an auth error.
    pub fn lookup_only(config: Config) -> Result<Self> {
        let omdb: Arc<dyn OmdbApi> = Arc::new(
            OmdbClient::new(&config.omdb_base_url, &config.omdb_api_key)
                .context("Failed to build OMDb client")?,
        );
        let sheets: Arc<dyn SheetsApi> = Arc::new(SheetsClient::new(Arc::new(NoCredentials))?);
        Ok(Self::new(config, omdb, sheets))
    }

    /// The configured spreadsheet with its worksheet selected.
    pub async fn open_configured(&self) -> Result<Spreadsheet> {
        let id = self.config.require_spreadsheet_id()?;
        let mut sheet = Spreadsheet::open(self.sheets.clone(), id).await?;
        let ws = sheet.select(&self.config.worksheet)?;
        info!("Using worksheet '{}' (index {})", ws.title, ws.index);
        Ok(sheet)
    }

    pub async fn add_movie(&self, query: &MovieQuery, watched: bool) -> Result<u32> {
        self.config.require_spreadsheet_id()?;
        let record = omdb::resolve(
            self.omdb.as_ref(),
            query,
            watched,
            true,
            &self.config.suggested_by,
        )
        .await?;
        let sheet = self.open_configured().await?;
        let row = record.to_row();
        let index = sheet.append(&row).await?;
        info!("Added {} at row {}\n{}", record, index, render_stored_row(&row));
        Ok(index)
    }

    pub async fn view_movie(&self, query: &MovieQuery) -> Result<String> {
        let record = omdb::resolve(
            self.omdb.as_ref(),
            query,
            false,
            false,
            &self.config.suggested_by,
        )
        .await?;
        Ok(render_row(&record.to_row()))
    }

    /// Creates a fresh movie spreadsheet and shares it with `email`.
    pub async fn create_sheet(&self, email: &str) -> Result<Spreadsheet> {
        let sheet = Spreadsheet::create(
            self.sheets.clone(),
            NEW_SPREADSHEET_TITLE,
            NEW_WORKSHEET_TITLE,
        )
        .await?;
        sheet.share(email, SHARE_ROLE).await?;
        let ws = sheet.worksheet()?;
        info!(
            "Spreadsheet ID: {} (worksheet index {}). Set SPREADSHEET_ID to use it.",
            sheet.id(),
            ws.index
        );
        Ok(sheet)
    }

    /// Hands the configured spreadsheet over to `email`, who already has access.
    pub async fn transfer_ownership(&self, email: &str) -> Result<()> {
        let id = self.config.require_spreadsheet_id()?;
        let sheet = Spreadsheet::open(self.sheets.clone(), id).await?;
        sheet.transfer_ownership(email).await?;
        Ok(())
    }

    pub async fn download_csv(&self, path: &Path) -> Result<usize> {
        let id = self.config.require_spreadsheet_id()?;
        let sheet = Spreadsheet::open(self.sheets.clone(), id).await?;
        let bytes = sheet.export_csv().await?;
        tokio::fs::write(path, &bytes)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!("Saved '{}' to {}", sheet.title(), path.display());
        Ok(bytes.len())
    }

    pub async fn watch_clipboard(&self, watched: bool) -> Result<()> {
        let source: Arc<dyn ClipboardSource> = Arc::new(CommandClipboard::detect());
        self.watch_source(source, watched, shutdown_signal()).await
    }

    /// Adds every IMDb id that shows up in `source` until `stop` resolves.
    pub async fn watch_source<S>(
        &self,
        source: Arc<dyn ClipboardSource>,
        watched: bool,
        stop: S,
    ) -> Result<()>
    where
        S: std::future::Future<Output = ()> + Send + 'static,
    {
        // Fail before polling when no spreadsheet is configured.
        self.config.require_spreadsheet_id()?;
        let watcher = ClipboardWatcher::new(source, self.config.clipboard_interval);
        let stop_flag = watcher.stop_handle();
        let stopper = tokio::spawn(async move {
            stop.await;
            stop_flag.store(true, Ordering::SeqCst);
        });

        info!(
            "Watching the clipboard every {:?} for IMDb ids",
            self.config.clipboard_interval
        );
        watcher
            .run(is_imdb_id, move |id| async move {
                match self.add_movie(&MovieQuery::imdb(id.as_str()), watched).await {
                    Ok(_) => {}
                    Err(e) => warn!("Could not add {}: {:#}", id, e),
                }
            })
            .await;
        stopper.abort();
        Ok(())
    }

    pub async fn migrate(
        &self,
        source_id: &str,
        failed_log: Option<&Path>,
    ) -> Result<MigrationReport> {
        let mut source = Spreadsheet::open(self.sheets.clone(), source_id).await?;
        source.select_worksheet(0)?;
        let target = self.open_configured().await?;
        migrate::migrate(
            self.omdb.as_ref(),
            &source,
            &target,
            &self.config.suggested_by,
            DEFAULT_PAUSE,
            failed_log,
        )
        .await
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Stopping clipboard watcher (Ctrl+C)");
        }
        _ = terminate => {
            info!("Stopping clipboard watcher (SIGTERM)");
        }
    }
}
