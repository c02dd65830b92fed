//! SQLite backend for Induction
//!
//! Exposes every table and view of the attached schemas as an explorable,
//! queryable and visualizable data source. All driver calls made by fetches
//! run on tokio's blocking pool.
//!
//! Accepted URLs:
//! - `sqlite:///absolute/path/to/file.db` (optionally `?mode=ro`, `rw`, `rwc`)
//! - `sqlite::memory:`
//! - the same forms with the `sqlite3` scheme

mod connection;
mod convert;
mod source;
mod translate;

pub use connection::{Location, SqliteConnection, SqliteDatabase};
pub use convert::map_decltype;
pub use source::{SourceKind, SqliteSource};

use async_trait::async_trait;
use induction_adapter::{redact_url, Adapter, Connection, DataError, Result};
use std::sync::Arc;
use tracing::debug;
use url::Url;

const SCHEMES: &[&str] = &["sqlite", "sqlite3"];

/// Adapter for SQLite database files
#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteAdapter;

impl SqliteAdapter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Adapter for SqliteAdapter {
    fn localized_name(&self) -> &str {
        "SQLite"
    }

    fn primary_url_scheme(&self) -> &str {
        "sqlite"
    }

    fn can_connect_to_url(&self, url: &Url) -> bool {
        SCHEMES.contains(&url.scheme())
    }

    async fn connect_to_url(&self, url: &Url) -> Result<Arc<dyn Connection>> {
        if !self.can_connect_to_url(url) {
            return Err(DataError::InvalidUrl(format!(
                "SQLite does not handle scheme '{}'",
                url.scheme()
            )));
        }

        let connection = SqliteConnection::new(url.clone())?;
        debug!("Opening SQLite database at {}", redact_url(url));

        let opening = connection.clone();
        tokio::task::spawn_blocking(move || opening.open())
            .await
            .map_err(|e| DataError::internal(format!("SQLite open task failed: {}", e)))??;

        Ok(connection)
    }
}
