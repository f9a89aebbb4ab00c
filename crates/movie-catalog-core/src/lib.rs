use once_cell::sync::Lazy;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};

pub const INVALID_YEAR_FORMAT: &str = "Invalid year format. Year must be an integer.";
pub const NEGATIVE_YEAR: &str = "Invalid year value. Year must be non-negative.";
pub const MISSING_ID: &str = "Missing id parameter";
pub const INVALID_ID_FORMAT: &str = "Invalid id format";
pub const MOVIE_NOT_FOUND: &str = "Movie not found";
pub const INVALID_REQUEST_FORMAT: &str = "Invalid request format";
pub const MISSING_REQUIRED_FIELDS: &str = "Missing required fields: ImdbID or Title";
pub const INVALID_YEAR: &str = "Invalid year";
pub const RATING_OUT_OF_RANGE: &str = "Rating must be between 0 and 10";
pub const DUPLICATE_IMDB_ID: &str = "Movie with this imdbID already exists";

pub const MIN_RATING: f64 = 0.0;
pub const MAX_RATING: f64 = 10.0;

static IMDB_ID_PATTERN: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"^tt\d{7}$").ok());

#[derive(Debug, Clone, thiserror::Error, Eq, PartialEq)]
pub enum CatalogError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("{0}")]
    NotFound(String),
    #[error("storage error: {0}")]
    Storage(String),
}

impl CatalogError {
    #[must_use]
    pub fn invalid_input(message: &str) -> Self {
        Self::InvalidInput(message.to_string())
    }

    #[must_use]
    pub fn not_found(message: &str) -> Self {
        Self::NotFound(message.to_string())
    }

    /// Stable machine-readable kind, used for logging.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::NotFound(_) => "not_found",
            Self::Storage(_) => "storage",
        }
    }
}

/// One catalog entry. Absent JSON fields decode to zero values so that
/// validation, not deserialization, rejects incomplete payloads.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Movie {
    #[serde(rename = "imdbID")]
    pub imdb_id: String,
    pub title: String,
    pub year: i64,
    pub rating: f64,
    pub is_super_hero: bool,
}

impl Movie {
    #[must_use]
    pub fn new(
        imdb_id: impl Into<String>,
        title: impl Into<String>,
        year: i64,
        rating: f64,
        is_super_hero: bool,
    ) -> Self {
        Self { imdb_id: imdb_id.into(), title: title.into(), year, rating, is_super_hero }
    }

    /// Validate a movie submitted for creation.
    ///
    /// The `imdb_id` format is intentionally not checked here; only lookups
    /// enforce the `tt` + 7 digits shape.
    ///
    /// # Errors
    /// Returns [`CatalogError::InvalidInput`] when the id or title is empty, the
    /// year is not positive, or the rating falls outside `[0, 10]`.
    pub fn validate(&self) -> Result<(), CatalogError> {
        if self.imdb_id.is_empty() || self.title.is_empty() {
            return Err(CatalogError::invalid_input(MISSING_REQUIRED_FIELDS));
        }

        if self.year <= 0 {
            return Err(CatalogError::invalid_input(INVALID_YEAR));
        }

        if !(MIN_RATING..=MAX_RATING).contains(&self.rating) {
            return Err(CatalogError::invalid_input(RATING_OUT_OF_RANGE));
        }

        Ok(())
    }
}

/// The fixed catalog loaded at process start, in canonical order.
#[must_use]
pub fn seed_movies() -> Vec<Movie> {
    vec![
        Movie::new("tt0111161", "The Shawshank Redemption", 1994, 9.2, false),
        Movie::new("tt0068646", "The Godfather", 1972, 9.2, false),
        Movie::new("tt0071562", "The Dark Knight", 2008, 9.0, true),
        Movie::new("tt0110912", "The Godfather: Part II", 1974, 9.0, false),
        Movie::new("tt0060196", "12 Angry Men", 1957, 8.9, false),
        Movie::new("tt0108052", "Schindler's List", 1993, 8.9, false),
        Movie::new("tt0073486", "The Lord of the Rings: The Return of the King", 2003, 8.9, true),
        Movie::new("tt0167260", "Inception", 2010, 8.8, false),
        Movie::new("tt1375666", "The Dark Knight Rises", 2012, 8.8, false),
    ]
}

/// Parse the raw `year` query value. An absent or empty value means no filter.
///
/// # Errors
/// Returns [`CatalogError::InvalidInput`] when the value is not an integer or
/// is negative.
pub fn parse_year_filter(raw: Option<&str>) -> Result<Option<i64>, CatalogError> {
    let Some(raw) = raw.filter(|value| !value.is_empty()) else {
        return Ok(None);
    };

    let year =
        raw.parse::<i64>().map_err(|_| CatalogError::invalid_input(INVALID_YEAR_FORMAT))?;
    if year < 0 {
        return Err(CatalogError::invalid_input(NEGATIVE_YEAR));
    }

    Ok(Some(year))
}

/// Check that a lookup id is present and shaped like `tt0000000`.
///
/// # Errors
/// Returns [`CatalogError::InvalidInput`] for an empty or malformed id.
pub fn validate_imdb_id(id: &str) -> Result<(), CatalogError> {
    if id.is_empty() {
        return Err(CatalogError::invalid_input(MISSING_ID));
    }

    let matched = IMDB_ID_PATTERN.as_ref().is_some_and(|pattern| pattern.is_match(id));
    if !matched {
        return Err(CatalogError::invalid_input(INVALID_ID_FORMAT));
    }

    Ok(())
}

#[must_use]
pub fn filter_by_year(movies: &[Movie], year: Option<i64>) -> Vec<Movie> {
    match year {
        None => movies.to_vec(),
        Some(year) => movies.iter().filter(|movie| movie.year == year).cloned().collect(),
    }
}

/// First movie whose id matches exactly.
#[must_use]
pub fn find_by_imdb_id<'a>(movies: &'a [Movie], id: &str) -> Option<&'a Movie> {
    movies.iter().find(|movie| movie.imdb_id == id)
}
