use std::path::Path;

use anyhow::{anyhow, Context, Result};
use movie_catalog_core::Movie;
use rusqlite::{ffi, params, params_from_iter, Connection};
use serde::{Deserialize, Serialize};

const LATEST_SCHEMA_VERSION: i64 = 1;

const CREATE_SCHEMA_MIGRATIONS_SQL: &str = r"
CREATE TABLE IF NOT EXISTS schema_migrations (
  version INTEGER PRIMARY KEY,
  applied_at TEXT NOT NULL
);
";

const MIGRATION_001_SQL: &str = r"
CREATE TABLE IF NOT EXISTS movies (
  imdb_id VARCHAR(10) PRIMARY KEY NOT NULL,
  title VARCHAR(255) NOT NULL,
  year INTEGER NOT NULL,
  rating REAL NOT NULL,
  is_superhero BOOLEAN NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_movies_year ON movies(year);
";

const SELECT_MOVIES_SQL: &str = "SELECT imdb_id, title, year, rating, is_superhero FROM movies";

pub struct SqliteStore {
    conn: Connection,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SchemaStatus {
    pub current_version: i64,
    pub target_version: i64,
    pub pending_versions: Vec<i64>,
}

/// Result of inserting one row; a primary-key collision is reported rather
/// than raised so callers can map it to a client error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    DuplicateImdbId,
}

impl SqliteStore {
    /// Open a SQLite-backed movie store and configure required runtime pragmas.
    ///
    /// # Errors
    /// Returns an error when the database cannot be opened or pragmas cannot be applied.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open sqlite database at {}", path.display()))?;
        Self::configure(conn)
    }

    /// Open a private in-process database that lives as long as the store.
    ///
    /// # Errors
    /// Returns an error when the connection cannot be created or configured.
    pub fn open_in_memory() -> Result<Self> {
        let conn =
            Connection::open_in_memory().context("failed to open in-memory sqlite database")?;
        Self::configure(conn)
    }

    fn configure(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )
        .context("failed to configure sqlite pragmas")?;

        Ok(Self { conn })
    }

    /// Report current and target schema versions plus pending migrations.
    ///
    /// # Errors
    /// Returns an error when schema metadata cannot be read or initialized.
    pub fn schema_status(&self) -> Result<SchemaStatus> {
        self.conn
            .execute_batch(CREATE_SCHEMA_MIGRATIONS_SQL)
            .context("failed to apply schema_migrations table")?;
        let current_version = current_schema_version(&self.conn)?;
        let pending_versions = if current_version < LATEST_SCHEMA_VERSION {
            ((current_version + 1)..=LATEST_SCHEMA_VERSION).collect::<Vec<_>>()
        } else {
            Vec::new()
        };

        Ok(SchemaStatus { current_version, target_version: LATEST_SCHEMA_VERSION, pending_versions })
    }

    /// Create the `movies` table if needed. Safe to call repeatedly.
    ///
    /// # Errors
    /// Returns an error when migration bootstrapping or any migration step fails.
    pub fn migrate(&mut self) -> Result<()> {
        self.conn
            .execute_batch(CREATE_SCHEMA_MIGRATIONS_SQL)
            .context("failed to apply schema_migrations table")?;

        let mut version = current_schema_version(&self.conn)?;

        if version < 1 {
            apply_migration_1(&self.conn)?;
            version = current_schema_version(&self.conn)?;
        }

        if version != LATEST_SCHEMA_VERSION {
            return Err(anyhow!(
                "unsupported schema version {version}; expected {LATEST_SCHEMA_VERSION}"
            ));
        }

        Ok(())
    }

    /// Replace every stored row with `movies`, preserving their order.
    ///
    /// # Errors
    /// Returns an error when the transaction fails, including when `movies`
    /// itself contains a duplicate id.
    pub fn replace_all(&mut self, movies: &[Movie]) -> Result<()> {
        let tx = self.conn.transaction().context("failed to start mirror transaction")?;

        tx.execute("DELETE FROM movies", []).context("failed to clear movies table")?;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO movies(imdb_id, title, year, rating, is_superhero)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                )
                .context("failed to prepare movie insert")?;
            for movie in movies {
                stmt.execute(params![
                    movie.imdb_id,
                    movie.title,
                    movie.year,
                    movie.rating,
                    movie.is_super_hero
                ])
                .with_context(|| format!("failed to mirror movie {}", movie.imdb_id))?;
            }
        }

        tx.commit().context("failed to commit mirror transaction")?;
        Ok(())
    }

    /// Append one movie row.
    ///
    /// # Errors
    /// Returns an error for any failure other than a duplicate `imdb_id`.
    pub fn insert_movie(&self, movie: &Movie) -> Result<InsertOutcome> {
        let result = self.conn.execute(
            "INSERT INTO movies(imdb_id, title, year, rating, is_superhero)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![movie.imdb_id, movie.title, movie.year, movie.rating, movie.is_super_hero],
        );

        match result {
            Ok(_) => Ok(InsertOutcome::Inserted),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY =>
            {
                Ok(InsertOutcome::DuplicateImdbId)
            }
            Err(err) => {
                Err(err).with_context(|| format!("failed to insert movie {}", movie.imdb_id))
            }
        }
    }

    /// List movies in insertion order, optionally restricted to one release year.
    ///
    /// # Errors
    /// Returns an error when the query fails or a row cannot be decoded.
    pub fn list_movies(&self, year: Option<i64>) -> Result<Vec<Movie>> {
        let (sql, args) = list_movies_query(year);
        let mut stmt = self.conn.prepare(&sql).context("failed to prepare movie listing")?;

        let rows = stmt
            .query_map(params_from_iter(args), |row| {
                Ok(Movie {
                    imdb_id: row.get(0)?,
                    title: row.get(1)?,
                    year: row.get(2)?,
                    rating: row.get(3)?,
                    is_super_hero: row.get(4)?,
                })
            })
            .context("failed to query movies")?;

        let mut movies = Vec::new();
        for row in rows {
            movies.push(row.context("failed to decode movie row")?);
        }
        Ok(movies)
    }

    /// Number of stored movies.
    ///
    /// # Errors
    /// Returns an error when the count query fails.
    pub fn count_movies(&self) -> Result<usize> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM movies", [], |row| row.get::<_, i64>(0))
            .context("failed to count movies")?;
        usize::try_from(count).context("movie count out of range")
    }
}

/// Build the listing statement; the `WHERE` clause is only added when filtering.
fn list_movies_query(year: Option<i64>) -> (String, Vec<i64>) {
    let mut sql = SELECT_MOVIES_SQL.to_string();
    let mut args = Vec::new();

    if let Some(year) = year {
        sql.push_str(" WHERE year = ?1");
        args.push(year);
    }

    sql.push_str(" ORDER BY rowid ASC");
    (sql, args)
}

fn apply_migration_1(conn: &Connection) -> Result<()> {
    conn.execute_batch(MIGRATION_001_SQL).context("failed to apply migration v1")?;
    record_schema_version(conn, 1)
}

fn current_schema_version(conn: &Connection) -> Result<i64> {
    let version = conn
        .query_row("SELECT COALESCE(MAX(version), 0) FROM schema_migrations", [], |row| {
            row.get::<_, i64>(0)
        })
        .context("failed to read current schema version")?;
    Ok(version)
}

fn record_schema_version(conn: &Connection, version: i64) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO schema_migrations(version, applied_at)
         VALUES (?1, strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))",
        params![version],
    )
    .with_context(|| format!("failed to record migration version {version}"))?;
    Ok(())
}
