//! Fetch an OMDb payload and print it next to the row that would be stored.
//! Usage:
//!   cargo run --bin omdb_props -- <imdb_id>
//!   cargo run --bin omdb_props -- <title> <year>
//! Requires OMDB_API_KEY in the environment (.env supported).

use anyhow::{Context, Result};
use dotenvy::dotenv;
use reelsheet::config::{DEFAULT_OMDB_BASE, DEFAULT_SUGGESTED_BY};
use reelsheet::display::render_row;
use reelsheet::omdb::{build_request_url, extract_record, MovieQuery, OmdbPayload};
use reqwest::Client;
use serde_json::Value;
use std::env;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let args: Vec<String> = env::args().collect();
    let query = match args.len() {
        2 => MovieQuery::imdb(args[1].as_str()),
        3 => MovieQuery::title_year(
            args[1].as_str(),
            args[2].parse::<i32>().context("year must be an integer")?,
        ),
        _ => {
            eprintln!("Usage: cargo run --bin omdb_props -- <imdb_id>");
            eprintln!("       cargo run --bin omdb_props -- <title> <year>");
            std::process::exit(1);
        }
    };

    let api_key = env::var("OMDB_API_KEY").context("OMDB_API_KEY not set")?;
    let base = env::var("OMDB_BASE_URL").unwrap_or_else(|_| DEFAULT_OMDB_BASE.to_string());
    let url = build_request_url(&base, &api_key, &query);

    let raw: Value = Client::new()
        .get(&url)
        .send()
        .await
        .context("OMDb request failed")?
        .error_for_status()?
        .json()
        .await
        .context("OMDb response is not JSON")?;
    println!("Raw payload for {query}:");
    println!("{}", serde_json::to_string_pretty(&raw)?);

    let payload: OmdbPayload = serde_json::from_value(raw)?;
    if !payload.is_success() {
        println!("\nOMDb error: {}", payload.error.unwrap_or_default());
        return Ok(());
    }

    let suggested_by =
        env::var("SUGGESTED_BY").unwrap_or_else(|_| DEFAULT_SUGGESTED_BY.to_string());
    println!("\nStored row:");
    let stored = extract_record(&payload, false, true, &suggested_by);
    for (header, value) in stored.to_row().pairs() {
        println!("  {header:<14} {value}");
    }
    println!("\nDisplay row:");
    let shown = extract_record(&payload, false, false, &suggested_by);
    println!("{}", render_row(&shown.to_row()));
    Ok(())
}
