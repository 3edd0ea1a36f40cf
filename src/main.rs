use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};
use dotenvy::dotenv;
use reelsheet::app::App;
use reelsheet::config::Config;
use reelsheet::omdb::MovieQuery;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "reelsheet", version)]
#[command(about = "Keep a movie list in Google Sheets, filled in from OMDb")]
#[command(arg_required_else_help = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Look up a movie and append it to the spreadsheet
    Add {
        #[command(flatten)]
        query: QueryArgs,
        /// Mark the movie as already watched
        #[arg(short, long)]
        watched: bool,
    },
    /// Print a movie's row without storing it
    View {
        #[command(flatten)]
        query: QueryArgs,
    },
    /// Create a new movie spreadsheet and share it with EMAIL
    New { email: String },
    /// Make EMAIL the owner of the spreadsheet (they accept in the web UI)
    Transfer { email: String },
    /// Download the spreadsheet as CSV
    Dl {
        #[arg(short, long, default_value = "movies.csv")]
        output: PathBuf,
    },
    /// Add every IMDb id copied to the clipboard until Ctrl+C
    Watch {
        #[arg(short, long)]
        watched: bool,
        /// Polling interval in seconds (defaults to CLIPBOARD_POLL_SECS or 5)
        #[arg(long)]
        interval: Option<u64>,
    },
    /// Convert an old watched/title/year sheet into the configured one
    Convert {
        source_id: String,
        #[arg(long, default_value = "logs/failed_to_parse.log")]
        failed_log: PathBuf,
    },
}

#[derive(Debug, Args)]
struct QueryArgs {
    /// IMDb id such as tt1375666
    #[arg(required_unless_present = "title", conflicts_with = "title")]
    id: Option<String>,
    #[arg(long, requires = "year")]
    title: Option<String>,
    #[arg(long, requires = "title")]
    year: Option<i32>,
}

impl QueryArgs {
    fn into_query(self) -> Result<MovieQuery> {
        match (self.id, self.title, self.year) {
            (Some(id), _, _) => Ok(MovieQuery::imdb(id.trim())),
            (None, Some(title), Some(year)) => Ok(MovieQuery::title_year(title, year)),
            _ => bail!("Provide an IMDb id or both --title and --year"),
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = Config::from_env()?;
    if let Commands::Watch {
        interval: Some(secs),
        ..
    } = &cli.command
    {
        config.clipboard_interval = Duration::from_secs((*secs).max(1));
    }
    let app = match cli.command {
        Commands::View { .. } => App::lookup_only(config)?,
        _ => App::from_config(config).await?,
    };

    match cli.command {
        Commands::Add { query, watched } => {
            app.add_movie(&query.into_query()?, watched).await?;
        }
        Commands::View { query } => {
            let table = app.view_movie(&query.into_query()?).await?;
            println!("{table}");
        }
        Commands::New { email } => {
            app.create_sheet(&email).await?;
        }
        Commands::Transfer { email } => {
            app.transfer_ownership(&email).await?;
        }
        Commands::Dl { output } => {
            app.download_csv(&output).await?;
        }
        Commands::Watch { watched, .. } => {
            app.watch_clipboard(watched).await?;
        }
        Commands::Convert {
            source_id,
            failed_log,
        } => {
            let report = app.migrate(&source_id, Some(&failed_log)).await?;
            if !report.skipped.is_empty() {
                warn!(
                    "{} rows skipped, see {}",
                    report.skipped.len(),
                    failed_log.display()
                );
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let loaded = dotenv();
    init_tracing();
    match loaded {
        Ok(path) => info!("Loaded environment from {:?}", path),
        Err(e) => warn!("No .env file loaded ({}) - relying on environment", e),
    }

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
