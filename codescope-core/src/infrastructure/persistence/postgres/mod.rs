//! PostgreSQL record stores
//!
//! Tables (`codebases`, `repositories`, `analyses`, `findings`) are managed
//! outside this crate. Enumerations are stored as their snake_case tokens and
//! nested documents (metadata, settings, config, results, summary) as JSONB.

mod analysis;
mod codebase;
mod finding;
mod repository;

pub use analysis::PostgresAnalysisStore;
pub use codebase::PostgresCodebaseStore;
pub use finding::PostgresFindingStore;
pub use repository::PostgresRepositoryStore;

use std::str::FromStr;
use std::time::Duration;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use crate::config::DatabaseConfig;
use crate::domain::analysis::{StoreError, UnknownTokenError};

/// Open a connection pool for the configured database.
pub async fn connect(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(config.connect_timeout_seconds))
        .connect(&config.url)
        .await
}

/// Log a database failure and convert it into a [`StoreError`].
fn db_error(action: &'static str) -> impl FnOnce(sqlx::Error) -> StoreError {
    move |e| {
        tracing::error!(error = %e, "Database error {}", action);
        StoreError::database(e)
    }
}

/// Parse a stored token column back into its enumeration.
fn parse_token<T>(entity: &'static str, id: impl ToString, value: &str) -> Result<T, StoreError>
where
    T: FromStr<Err = UnknownTokenError>,
{
    value.parse().map_err(|e: UnknownTokenError| StoreError::Corrupt {
        entity,
        id: id.to_string(),
        message: e.to_string(),
    })
}
