use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use movie_catalog_core::{
    filter_by_year, find_by_imdb_id, parse_year_filter, seed_movies, validate_imdb_id,
    CatalogError, Movie, DUPLICATE_IMDB_ID, MOVIE_NOT_FOUND,
};
use movie_catalog_store_sqlite::{InsertOutcome, SqliteStore};
use parking_lot::Mutex;
use serde::Serialize;

/// Where year-filtered listings are answered from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MirrorConfig {
    /// Scan the in-memory sequence only.
    Disabled,
    /// Mirror into a private in-process `SQLite` database.
    InMemory,
    /// Mirror into a `SQLite` file; existing rows are replaced at startup.
    File(PathBuf),
}

impl MirrorConfig {
    /// Map the `--db` flag: absent disables the mirror, `:memory:` keeps it in-process.
    #[must_use]
    pub fn from_db_arg(db: Option<PathBuf>) -> Self {
        match db {
            None => Self::Disabled,
            Some(path) if path.as_os_str() == ":memory:" => Self::InMemory,
            Some(path) => Self::File(path),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    Memory,
    Sqlite,
}

impl Backend {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Sqlite => "sqlite",
        }
    }
}

struct CatalogState {
    movies: Vec<Movie>,
    mirror: Option<SqliteStore>,
}

/// Shared handle to the movie catalog.
///
/// All state sits behind one mutex that every operation holds for its full
/// duration, so a create updates the mirror and the sequence together.
#[derive(Clone)]
pub struct CatalogApi {
    state: Arc<Mutex<CatalogState>>,
}

impl CatalogApi {
    /// Catalog seeded with the fixed movie set and no mirror.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_parts(seed_movies(), None)
    }

    /// Build a seeded catalog, creating and filling the mirror when configured.
    ///
    /// # Errors
    /// Returns an error when the mirror database cannot be opened, migrated, or seeded.
    pub fn open(config: &MirrorConfig) -> Result<Self> {
        let mirror = match config {
            MirrorConfig::Disabled => None,
            MirrorConfig::InMemory => Some(SqliteStore::open_in_memory()?),
            MirrorConfig::File(path) => Some(SqliteStore::open(path)?),
        };
        Self::with_mirror(seed_movies(), mirror)
    }

    /// Build a catalog from `movies`, mirroring them into `mirror` when given.
    ///
    /// # Errors
    /// Returns an error when the mirror cannot be migrated or seeded.
    pub fn with_mirror(movies: Vec<Movie>, mirror: Option<SqliteStore>) -> Result<Self> {
        let mirror = match mirror {
            Some(mut store) => {
                store.migrate().context("failed to migrate movie mirror")?;
                store.replace_all(&movies).context("failed to seed movie mirror")?;
                Some(store)
            }
            None => None,
        };
        Ok(Self::from_parts(movies, mirror))
    }

    fn from_parts(movies: Vec<Movie>, mirror: Option<SqliteStore>) -> Self {
        Self { state: Arc::new(Mutex::new(CatalogState { movies, mirror })) }
    }

    #[must_use]
    pub fn backend(&self) -> Backend {
        if self.state.lock().mirror.is_some() {
            Backend::Sqlite
        } else {
            Backend::Memory
        }
    }

    /// List movies, optionally filtered by the raw `year` query value.
    ///
    /// An empty match is returned as an empty list, not as `NotFound`.
    ///
    /// # Errors
    /// Returns [`CatalogError::InvalidInput`] for a non-integer or negative
    /// year, and [`CatalogError::Storage`] when the mirror query fails.
    pub fn list_movies(&self, year: Option<&str>) -> Result<Vec<Movie>, CatalogError> {
        let year = parse_year_filter(year)?;
        let state = self.state.lock();

        match &state.mirror {
            Some(store) => store.list_movies(year).map_err(storage_error),
            None => Ok(filter_by_year(&state.movies, year)),
        }
    }

    /// Look up the first movie with the given id.
    ///
    /// # Errors
    /// Returns [`CatalogError::InvalidInput`] for an empty or malformed id and
    /// [`CatalogError::NotFound`] when no movie matches.
    pub fn get_movie_by_id(&self, id: &str) -> Result<Movie, CatalogError> {
        validate_imdb_id(id)?;
        let state = self.state.lock();
        find_by_imdb_id(&state.movies, id)
            .cloned()
            .ok_or_else(|| CatalogError::not_found(MOVIE_NOT_FOUND))
    }

    /// Validate and append one movie, returning it unchanged.
    ///
    /// # Errors
    /// Returns [`CatalogError::InvalidInput`] when validation fails or the mirror
    /// already holds the id, and [`CatalogError::Storage`] when the mirror write fails.
    pub fn create_movie(&self, movie: Movie) -> Result<Movie, CatalogError> {
        movie.validate()?;
        let mut state = self.state.lock();

        if let Some(store) = &state.mirror {
            match store.insert_movie(&movie).map_err(storage_error)? {
                InsertOutcome::Inserted => {}
                InsertOutcome::DuplicateImdbId => {
                    return Err(CatalogError::invalid_input(DUPLICATE_IMDB_ID));
                }
            }
        }

        state.movies.push(movie.clone());
        tracing::info!(imdb_id = %movie.imdb_id, total = state.movies.len(), "movie created");
        Ok(movie)
    }

    /// Number of movies currently served, read from the mirror when present.
    ///
    /// # Errors
    /// Returns [`CatalogError::Storage`] when the mirror count fails.
    pub fn movie_count(&self) -> Result<usize, CatalogError> {
        let state = self.state.lock();
        match &state.mirror {
            Some(store) => store.count_movies().map_err(storage_error),
            None => Ok(state.movies.len()),
        }
    }
}

#[allow(clippy::needless_pass_by_value)]
fn storage_error(err: anyhow::Error) -> CatalogError {
    let message = format!("{err:#}");
    tracing::error!(error = %message, "movie store failure");
    CatalogError::Storage(message)
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::thread;

    use super::*;
    use movie_catalog_core::{
        INVALID_ID_FORMAT, INVALID_YEAR, INVALID_YEAR_FORMAT, MISSING_ID, NEGATIVE_YEAR,
        RATING_OUT_OF_RANGE,
    };

    fn unique_temp_db_path() -> PathBuf {
        std::env::temp_dir().join(format!("movie-catalog-api-{}.sqlite3", ulid::Ulid::new()))
    }

    fn open(config: &MirrorConfig) -> CatalogApi {
        CatalogApi::open(config).unwrap_or_else(|err| panic!("failed to open catalog: {err}"))
    }

    fn both_backends() -> Vec<CatalogApi> {
        vec![CatalogApi::in_memory(), open(&MirrorConfig::InMemory)]
    }

    fn fixture_movie() -> Movie {
        Movie::new("tt1234567", "X", 2020, 7.5, true)
    }

    #[test]
    fn mirror_config_maps_db_flag() {
        assert_eq!(MirrorConfig::from_db_arg(None), MirrorConfig::Disabled);
        assert_eq!(
            MirrorConfig::from_db_arg(Some(PathBuf::from(":memory:"))),
            MirrorConfig::InMemory
        );
        assert_eq!(
            MirrorConfig::from_db_arg(Some(PathBuf::from("movies.sqlite3"))),
            MirrorConfig::File(PathBuf::from("movies.sqlite3"))
        );
    }

    #[test]
    fn backend_reflects_mirror_configuration() {
        assert_eq!(CatalogApi::in_memory().backend(), Backend::Memory);
        assert_eq!(open(&MirrorConfig::InMemory).backend(), Backend::Sqlite);
    }

    #[test]
    fn unfiltered_list_returns_seed_set() {
        for api in both_backends() {
            assert_eq!(api.list_movies(None), Ok(seed_movies()), "backend {:?}", api.backend());
            assert_eq!(api.list_movies(Some("")), Ok(seed_movies()));
        }
    }

    #[test]
    fn every_seed_year_filters_to_matching_subset() {
        for api in both_backends() {
            for year in 0_i64..=2100 {
                let expected = seed_movies()
                    .into_iter()
                    .filter(|movie| movie.year == year)
                    .collect::<Vec<_>>();
                assert_eq!(api.list_movies(Some(&year.to_string())), Ok(expected));
            }
        }
    }

    #[test]
    fn unmatched_year_is_an_empty_list() {
        for api in both_backends() {
            assert_eq!(api.list_movies(Some("1800")), Ok(Vec::new()));
        }
    }

    #[test]
    fn invalid_year_filters_are_rejected() {
        for api in both_backends() {
            assert_eq!(
                api.list_movies(Some("abc")),
                Err(CatalogError::invalid_input(INVALID_YEAR_FORMAT))
            );
            assert_eq!(
                api.list_movies(Some("-1")),
                Err(CatalogError::invalid_input(NEGATIVE_YEAR))
            );
        }
    }

    #[test]
    fn lookup_by_id() {
        let api = CatalogApi::in_memory();
        let movie = api
            .get_movie_by_id("tt0111161")
            .unwrap_or_else(|err| panic!("seed lookup failed: {err}"));
        assert_eq!(movie.title, "The Shawshank Redemption");
        assert_eq!(api.get_movie_by_id("tt0111161"), Ok(movie));

        assert_eq!(
            api.get_movie_by_id("tt9999999"),
            Err(CatalogError::not_found(MOVIE_NOT_FOUND))
        );
        assert_eq!(
            api.get_movie_by_id("bad-id"),
            Err(CatalogError::invalid_input(INVALID_ID_FORMAT))
        );
        assert_eq!(api.get_movie_by_id(""), Err(CatalogError::invalid_input(MISSING_ID)));
    }

    #[test]
    fn create_rejects_invalid_movies_without_appending() {
        for api in both_backends() {
            let zero_year = Movie { year: 0, ..fixture_movie() };
            assert_eq!(api.create_movie(zero_year), Err(CatalogError::invalid_input(INVALID_YEAR)));

            let high_rating = Movie { rating: 11.0, ..fixture_movie() };
            assert_eq!(
                api.create_movie(high_rating),
                Err(CatalogError::invalid_input(RATING_OUT_OF_RANGE))
            );

            assert_eq!(api.movie_count(), Ok(9));
        }
    }

    #[test]
    fn created_movie_is_echoed_and_immediately_listed() {
        for api in both_backends() {
            assert_eq!(api.create_movie(fixture_movie()), Ok(fixture_movie()));

            let all = api.list_movies(None).unwrap_or_else(|err| panic!("list failed: {err}"));
            assert_eq!(all.len(), 10);
            assert_eq!(all.last(), Some(&fixture_movie()));

            assert_eq!(api.list_movies(Some("2020")), Ok(vec![fixture_movie()]));
            assert_eq!(api.get_movie_by_id("tt1234567"), Ok(fixture_movie()));
        }
    }

    #[test]
    fn create_accepts_malformed_id_that_lookup_rejects() {
        let api = CatalogApi::in_memory();
        let odd = Movie { imdb_id: "bad-id".to_string(), ..fixture_movie() };
        assert_eq!(api.create_movie(odd.clone()), Ok(odd));
        assert_eq!(
            api.get_movie_by_id("bad-id"),
            Err(CatalogError::invalid_input(INVALID_ID_FORMAT))
        );
    }

    #[test]
    fn in_memory_catalog_allows_duplicate_ids() {
        let api = CatalogApi::in_memory();
        let duplicate = Movie::new("tt0111161", "Shawshank again", 2024, 5.0, false);
        assert_eq!(api.create_movie(duplicate.clone()), Ok(duplicate));
        assert_eq!(api.movie_count(), Ok(10));

        let first = api
            .get_movie_by_id("tt0111161")
            .unwrap_or_else(|err| panic!("lookup failed: {err}"));
        assert_eq!(first.title, "The Shawshank Redemption");
    }

    #[test]
    fn mirror_rejects_duplicate_ids() {
        let api = open(&MirrorConfig::InMemory);
        let duplicate = Movie::new("tt0111161", "Shawshank again", 2024, 5.0, false);
        assert_eq!(
            api.create_movie(duplicate),
            Err(CatalogError::invalid_input(DUPLICATE_IMDB_ID))
        );
        assert_eq!(api.movie_count(), Ok(9));
        assert_eq!(api.list_movies(Some("2024")), Ok(Vec::new()));
    }

    #[test]
    fn file_mirror_is_reseeded_on_open() {
        let db_path = unique_temp_db_path();
        let config = MirrorConfig::File(db_path.clone());

        let first = open(&config);
        assert_eq!(first.create_movie(fixture_movie()), Ok(fixture_movie()));
        assert_eq!(first.movie_count(), Ok(10));
        drop(first);

        let second = open(&config);
        assert_eq!(second.list_movies(None), Ok(seed_movies()));
        drop(second);

        let _ = fs::remove_file(&db_path);
    }

    #[test]
    fn concurrent_creates_all_land() {
        for api in both_backends() {
            let handles = (0..8)
                .map(|worker| {
                    let api = api.clone();
                    thread::spawn(move || {
                        for index in 0..25 {
                            let movie = Movie::new(
                                format!("tt{:07}", 9_000_000 + worker * 100 + index),
                                format!("Concurrent {worker}-{index}"),
                                1999,
                                5.0,
                                false,
                            );
                            if let Err(err) = api.create_movie(movie) {
                                panic!("concurrent create failed: {err}");
                            }
                        }
                    })
                })
                .collect::<Vec<_>>();

            for handle in handles {
                if handle.join().is_err() {
                    panic!("worker thread panicked");
                }
            }

            assert_eq!(api.movie_count(), Ok(9 + 8 * 25));
            let late_nineties =
                api.list_movies(Some("1999")).unwrap_or_else(|err| panic!("list failed: {err}"));
            assert_eq!(late_nineties.len(), 8 * 25);
        }
    }

    #[test]
    fn created_movie_serializes_back_to_submitted_payload() {
        let payload = serde_json::json!({
            "imdbID": "tt1234567",
            "title": "X",
            "year": 2020,
            "rating": 7.5,
            "isSuperHero": true
        });
        let movie: Movie = serde_json::from_value(payload.clone())
            .unwrap_or_else(|err| panic!("failed to decode payload: {err}"));
        let created = CatalogApi::in_memory()
            .create_movie(movie)
            .unwrap_or_else(|err| panic!("create failed: {err}"));
        assert_eq!(serde_json::to_value(created).ok(), Some(payload));
    }
}
