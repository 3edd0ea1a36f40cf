use serde::{Deserialize, Serialize};
use std::fmt;

pub const COLUMN_COUNT: usize = 11;

/// Header row of the movie sheet. Every stored row follows this order.
pub const COLUMNS: [&str; COLUMN_COUNT] = [
    "Watched?",
    "Title",
    "Year",
    "Genre",
    "Runtime",
    "Suggested by",
    "IMDb Score",
    "Tomatometer",
    "Director",
    "Plot",
    "Movie Poster",
];

pub const NOT_AVAILABLE: &str = "N/A";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rating {
    pub imdb_rating: Option<String>,
    pub tomatometer: Option<String>,
}

impl Rating {
    pub fn new(imdb_rating: Option<String>, tomatometer: Option<String>) -> Self {
        Self {
            imdb_rating,
            tomatometer,
        }
    }

    pub fn imdb_score(&self) -> &str {
        self.imdb_rating.as_deref().unwrap_or(NOT_AVAILABLE)
    }

    pub fn tomatometer_score(&self) -> &str {
        self.tomatometer.as_deref().unwrap_or(NOT_AVAILABLE)
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "IMDb: {}\nRotten: {}",
            self.imdb_score(),
            self.tomatometer_score()
        )
    }
}

/// A normalized movie entry, ready to be flattened into a [`SheetRow`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovieRecord {
    pub watched: bool,
    pub title: String,
    pub year: String,
    pub genre: String,
    pub runtime: String,
    pub suggested_by: String,
    pub rating: Rating,
    pub director: String,
    pub plot: String,
    pub poster: String,
}

// Metadata such as plot or ratings drifts between provider fetches; identity is
// title, year, runtime and director only.
impl PartialEq for MovieRecord {
    fn eq(&self, other: &Self) -> bool {
        self.title == other.title
            && self.year == other.year
            && self.runtime == other.runtime
            && self.director == other.director
    }
}

impl Eq for MovieRecord {}

impl fmt::Display for MovieRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.title, self.year)
    }
}

impl MovieRecord {
    pub fn watched_cell(&self) -> &'static str {
        if self.watched {
            "TRUE"
        } else {
            "FALSE"
        }
    }

    pub fn to_row(&self) -> SheetRow {
        SheetRow([
            self.watched_cell().to_string(),
            self.title.clone(),
            self.year.clone(),
            self.genre.clone(),
            self.runtime.clone(),
            self.suggested_by.clone(),
            self.rating.imdb_score().to_string(),
            self.rating.tomatometer_score().to_string(),
            self.director.clone(),
            self.plot.clone(),
            self.poster.clone(),
        ])
    }
}

/// A movie record rendered as display strings, one per entry of [`COLUMNS`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetRow([String; COLUMN_COUNT]);

impl SheetRow {
    pub fn values(&self) -> &[String] {
        &self.0
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        COLUMNS
            .iter()
            .position(|c| *c == column)
            .map(|idx| self.0[idx].as_str())
    }

    pub fn pairs(&self) -> impl Iterator<Item = (&'static str, &str)> + '_ {
        COLUMNS.iter().copied().zip(self.0.iter().map(String::as_str))
    }

    /// Headers and values with the given columns left out.
    pub fn without(&self, skip: &[&str]) -> (Vec<&'static str>, Vec<&str>) {
        self.pairs().filter(|(h, _)| !skip.contains(h)).unzip()
    }
}

impl From<&MovieRecord> for SheetRow {
    fn from(record: &MovieRecord) -> Self {
        record.to_row()
    }
}
