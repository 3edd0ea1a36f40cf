use crate::models::{MovieRecord, Rating, NOT_AVAILABLE};
use crate::utils::{image_formula, insert_newlines};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const ROTTEN_TOMATOES: &str = "Rotten Tomatoes";
const DISPLAY_WRAP: usize = 30;

#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("OMDb request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("OMDb returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("OMDb response is not valid JSON: {0}")]
    Malformed(#[source] serde_json::Error),

    #[error("{message} ({query})")]
    NotFound { query: String, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MovieQuery {
    ImdbId(String),
    TitleYear { title: String, year: i32 },
}

impl MovieQuery {
    pub fn imdb(id: impl Into<String>) -> Self {
        MovieQuery::ImdbId(id.into())
    }

    pub fn title_year(title: impl Into<String>, year: i32) -> Self {
        MovieQuery::TitleYear {
            title: title.into(),
            year,
        }
    }
}

impl fmt::Display for MovieQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MovieQuery::ImdbId(id) => write!(f, "IMDb ID {id}"),
            MovieQuery::TitleYear { title, year } => write!(f, "{title} ({year})"),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct OmdbPayload {
    pub response: String,
    pub error: Option<String>,
    pub title: Option<String>,
    pub year: Option<String>,
    pub genre: Option<String>,
    pub runtime: Option<String>,
    pub director: Option<String>,
    pub plot: Option<String>,
    pub poster: Option<String>,
    #[serde(rename = "imdbRating")]
    pub imdb_rating: Option<String>,
    #[serde(rename = "imdbID")]
    pub imdb_id: Option<String>,
    #[serde(default)]
    pub ratings: Vec<RatingEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RatingEntry {
    pub source: String,
    pub value: String,
}

impl OmdbPayload {
    pub fn is_success(&self) -> bool {
        self.response == "True"
    }

    /// Turns a `Response: False` payload into [`RetrievalError::NotFound`].
    pub fn into_found(self, query: &MovieQuery) -> Result<Self, RetrievalError> {
        if self.is_success() {
            return Ok(self);
        }
        let message = self
            .error
            .unwrap_or_else(|| "Unknown OMDb error".to_string());
        error!("{} - no match for {}", message, query);
        Err(RetrievalError::NotFound {
            query: query.to_string(),
            message,
        })
    }
}

#[async_trait]
pub trait OmdbApi: Send + Sync {
    /// Fetches the payload for `query`. [`resolve`] rejects payloads reporting
    /// `Response: False` whatever the implementation returns.
    async fn fetch(&self, query: &MovieQuery) -> Result<OmdbPayload, RetrievalError>;
}

#[derive(Debug, Clone)]
pub struct OmdbClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl OmdbClient {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self, RetrievalError> {
        let user_agent = format!("reelsheet/{}", env!("CARGO_PKG_VERSION"));
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(user_agent)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.to_string(),
            api_key: api_key.to_string(),
        })
    }

    pub fn request_url(&self, query: &MovieQuery) -> String {
        build_request_url(&self.base_url, &self.api_key, query)
    }
}

#[async_trait]
impl OmdbApi for OmdbClient {
    async fn fetch(&self, query: &MovieQuery) -> Result<OmdbPayload, RetrievalError> {
        let url = self.request_url(query);
        debug!("Requesting OMDb data for {}", query);
        // Errors are stripped of the URL, which carries the api key.
        let res = self.client.get(&url).send().await.map_err(|e| {
            let e = e.without_url();
            error!("OMDb request error for {}: {}", query, e);
            RetrievalError::Http(e)
        })?;
        let status = res.status();
        let text = res.text().await.map_err(|e| RetrievalError::Http(e.without_url()))?;
        if !status.is_success() {
            error!("OMDb HTTP error {} for {}", status, query);
            return Err(RetrievalError::Status {
                status: status.as_u16(),
                body: text,
            });
        }
        let payload: OmdbPayload =
            serde_json::from_str(&text).map_err(RetrievalError::Malformed)?;
        let payload = payload.into_found(query)?;
        info!(
            "Retrieved movie data for {} with IMDb ID {}",
            payload.title.as_deref().unwrap_or_default(),
            payload.imdb_id.as_deref().unwrap_or(NOT_AVAILABLE)
        );
        Ok(payload)
    }
}

/// Fetches `query` and reduces the payload to a [`MovieRecord`].
///
/// `add` selects the storage rendering (verbatim plot, `=IMAGE` poster formula)
/// over the display rendering (plot and poster URL wrapped every 30 chars).
pub async fn resolve(
    omdb: &dyn OmdbApi,
    query: &MovieQuery,
    watched: bool,
    add: bool,
    suggested_by: &str,
) -> Result<MovieRecord, RetrievalError> {
    // Other `OmdbApi` implementations may hand back unsuccessful payloads.
    let payload = omdb.fetch(query).await?.into_found(query)?;
    Ok(extract_record(&payload, watched, add, suggested_by))
}

pub fn extract_record(
    payload: &OmdbPayload,
    watched: bool,
    add: bool,
    suggested_by: &str,
) -> MovieRecord {
    let text = |v: &Option<String>| v.clone().unwrap_or_default();
    let plot = text(&payload.plot);
    let poster = text(&payload.poster);

    let (plot, poster) = if add {
        (plot, image_formula(&poster))
    } else {
        (
            insert_newlines(&plot, DISPLAY_WRAP),
            insert_newlines(&poster, DISPLAY_WRAP),
        )
    };

    MovieRecord {
        watched,
        title: text(&payload.title),
        year: text(&payload.year),
        genre: text(&payload.genre),
        runtime: text(&payload.runtime),
        suggested_by: suggested_by.to_string(),
        rating: extract_rating(payload),
        director: text(&payload.director),
        plot,
        poster,
    }
}

pub fn extract_rating(payload: &OmdbPayload) -> Rating {
    let tomatometer = payload
        .ratings
        .iter()
        .find(|r| r.source == ROTTEN_TOMATOES)
        .map(|r| r.value.clone());
    Rating::new(
        available(payload.imdb_rating.clone()),
        available(tomatometer),
    )
}

fn available(value: Option<String>) -> Option<String> {
    value.filter(|v| v != NOT_AVAILABLE)
}

pub fn build_request_url(base_url: &str, api_key: &str, query: &MovieQuery) -> String {
    let base = base_url.trim_end_matches(['?', '&']);
    let sep = if base.contains('?') { '&' } else { '?' };
    let key = urlencoding::encode(api_key);
    match query {
        MovieQuery::ImdbId(id) => {
            format!("{base}{sep}apikey={key}&i={}", urlencoding::encode(id.trim()))
        }
        MovieQuery::TitleYear { title, year } => format!(
            "{base}{sep}apikey={key}&t={}&y={year}",
            urlencoding::encode(title.trim())
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn blade_runner() -> OmdbPayload {
        serde_json::from_value(json!({
            "Title": "Blade Runner",
            "Year": "1982",
            "Rated": "R",
            "Runtime": "117 min",
            "Genre": "Action, Drama, Sci-Fi",
            "Director": "Ridley Scott",
            "Plot": "A blade runner must pursue and terminate four replicants who stole a ship in space and have returned to Earth to find their creator.",
            "Poster": "https://m.media-amazon.com/images/M/MV5BNzQzMzJhZTEtOWM4NS00MTdhLTg0YjgtMjM4MDRkZjUwZDBlXkEyXkFqcGdeQXVyNjU0OTQ0OTY@._V1_SX300.jpg",
            "Ratings": [
                {"Source": "Internet Movie Database", "Value": "8.1/10"},
                {"Source": "Rotten Tomatoes", "Value": "89%"},
                {"Source": "Metacritic", "Value": "84/100"}
            ],
            "Metascore": "84",
            "imdbRating": "8.1",
            "imdbID": "tt0083658",
            "Type": "movie",
            "Response": "True"
        }))
        .unwrap()
    }

    #[test]
    fn storage_rendering_wraps_poster_in_formula() {
        let payload = blade_runner();
        let record = extract_record(&payload, true, true, "Sam");
        assert_eq!(record.title, "Blade Runner");
        assert_eq!(record.year, "1982");
        assert_eq!(record.runtime, "117 min");
        assert_eq!(record.director, "Ridley Scott");
        assert_eq!(record.suggested_by, "Sam");
        assert_eq!(record.watched_cell(), "TRUE");
        assert_eq!(record.plot, payload.plot.clone().unwrap());
        assert_eq!(
            record.poster,
            format!("=IMAGE(\"{}\")", payload.poster.clone().unwrap())
        );
        assert_eq!(record.rating.imdb_score(), "8.1");
        assert_eq!(record.rating.tomatometer_score(), "89%");
    }

    #[test]
    fn display_rendering_wraps_every_thirty_chars() {
        let payload = blade_runner();
        let record = extract_record(&payload, false, false, "Sam");
        let raw_poster = payload.poster.clone().unwrap();
        assert!(!record.poster.starts_with("=IMAGE"));
        assert_eq!(record.poster.replace('\n', ""), raw_poster);
        let lines: Vec<&str> = record.poster.split('\n').collect();
        assert!(lines[..lines.len() - 1].iter().all(|l| l.chars().count() == 30));
        assert_eq!(record.plot, insert_newlines(payload.plot.as_deref().unwrap(), 30));
        assert_eq!(record.watched_cell(), "FALSE");
    }

    #[test]
    fn missing_fields_default_to_empty_and_not_available() {
        let payload: OmdbPayload = serde_json::from_value(json!({
            "Response": "True",
            "Title": "Obscure Short"
        }))
        .unwrap();
        let record = extract_record(&payload, false, true, "Someone");
        assert_eq!(record.title, "Obscure Short");
        assert_eq!(record.year, "");
        assert_eq!(record.genre, "");
        assert_eq!(record.director, "");
        assert_eq!(record.poster, "=IMAGE(\"\")");
        assert_eq!(record.rating, Rating::default());
        assert_eq!(record.rating.imdb_score(), "N/A");
        assert_eq!(record.rating.tomatometer_score(), "N/A");
    }

    #[test]
    fn rating_without_rotten_tomatoes_entry() {
        let payload: OmdbPayload = serde_json::from_value(json!({
            "Response": "True",
            "imdbRating": "7.2",
            "Ratings": [{"Source": "Metacritic", "Value": "60/100"}]
        }))
        .unwrap();
        let rating = extract_rating(&payload);
        assert_eq!(rating.imdb_score(), "7.2");
        assert_eq!(rating.tomatometer_score(), "N/A");
    }

    #[test]
    fn rating_extraction_is_idempotent() {
        let payload = blade_runner();
        assert_eq!(extract_rating(&payload), extract_rating(&payload));
    }

    #[test]
    fn provider_not_available_means_absent() {
        let payload: OmdbPayload = serde_json::from_value(json!({
            "Response": "True",
            "imdbRating": "N/A"
        }))
        .unwrap();
        assert_eq!(extract_rating(&payload), Rating::default());
    }

    #[test]
    fn builds_request_urls() {
        let base = "http://www.omdbapi.com/";
        assert_eq!(
            build_request_url(base, "abc123", &MovieQuery::imdb("tt1231234")),
            "http://www.omdbapi.com/?apikey=abc123&i=tt1231234"
        );
        assert_eq!(
            build_request_url(base, "abc123", &MovieQuery::title_year("Test Movie 2", 1992)),
            "http://www.omdbapi.com/?apikey=abc123&t=Test%20Movie%202&y=1992"
        );
        assert_eq!(
            build_request_url("http://www.omdbapi.com/?", "k", &MovieQuery::imdb("tt1")),
            "http://www.omdbapi.com/?apikey=k&i=tt1"
        );
    }

    struct CannedOmdb(serde_json::Value);

    #[async_trait]
    impl OmdbApi for CannedOmdb {
        async fn fetch(&self, _query: &MovieQuery) -> Result<OmdbPayload, RetrievalError> {
            Ok(serde_json::from_value(self.0.clone()).unwrap())
        }
    }

    #[tokio::test]
    async fn resolve_rejects_unsuccessful_payload() {
        let omdb = CannedOmdb(json!({"Response": "False", "Error": "Incorrect IMDb ID."}));
        let query = MovieQuery::imdb("tt0000000");
        for add in [true, false] {
            let err = resolve(&omdb, &query, true, add, "Sam").await.unwrap_err();
            match err {
                RetrievalError::NotFound { message, query } => {
                    assert_eq!(message, "Incorrect IMDb ID.");
                    assert_eq!(query, "IMDb ID tt0000000");
                }
                other => panic!("expected NotFound, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn resolve_rejects_payload_without_error_text() {
        let omdb = CannedOmdb(json!({"Response": "False"}));
        let err = resolve(&omdb, &MovieQuery::title_year("Nothing", 1900), false, true, "Sam")
            .await
            .unwrap_err();
        assert!(
            matches!(err, RetrievalError::NotFound { ref message, .. } if message == "Unknown OMDb error")
        );
    }

    #[tokio::test]
    async fn resolve_maps_successful_payload() {
        let omdb = CannedOmdb(json!({"Response": "True", "Title": "Heat", "Year": "1995"}));
        let record = resolve(&omdb, &MovieQuery::imdb("tt0113277"), false, true, "Sam")
            .await
            .unwrap();
        assert_eq!(record.to_string(), "Heat (1995)");
    }

    #[test]
    fn query_display() {
        assert_eq!(MovieQuery::imdb("tt0133093").to_string(), "IMDb ID tt0133093");
        assert_eq!(
            MovieQuery::title_year("The Matrix", 1999).to_string(),
            "The Matrix (1999)"
        );
    }
}
