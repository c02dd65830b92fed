//! # induction-memory
//!
//! In-memory backend for Induction, driven entirely by fixtures.
//!
//! It implements every optional capability and every lifecycle hook, which
//! makes it the reference backend for the contract tests and the demo
//! backend of the CLI. Failures and latency can be injected per fixture.
//!
//! ```rust,no_run
//! use induction_adapter::AdapterRegistry;
//! use induction_memory::{MemoryAdapter, MemoryFixture};
//! use std::sync::Arc;
//!
//! # async fn example() -> induction_adapter::Result<()> {
//! let mut registry = AdapterRegistry::new();
//! registry.register(Arc::new(MemoryAdapter::new("Memory", "memory", MemoryFixture::sample())));
//!
//! let connection = registry.connect_str("memory://local/shop").await?;
//! println!("{}", connection.database()?.name());
//! # Ok(())
//! # }
//! ```

mod connection;
mod eval;
mod fixture;
mod source;

pub use connection::{MemoryConnection, MemoryDatabase};
pub use fixture::{Columns, DatabaseFixture, FixtureRow, MemoryFixture, QueryScript, TableFixture};
pub use source::MemorySource;

use async_trait::async_trait;
use induction_adapter::{redact_url, Adapter, Connection, DataError, Result};
use std::sync::Arc;
use tracing::{debug, info};
use url::Url;

/// Adapter that serves a [`MemoryFixture`] under one URL scheme
pub struct MemoryAdapter {
    name: String,
    scheme: String,
    fixture: Arc<MemoryFixture>,
}

impl MemoryAdapter {
    pub fn new(name: impl Into<String>, scheme: impl Into<String>, fixture: MemoryFixture) -> Self {
        Self {
            name: name.into(),
            scheme: scheme.into(),
            fixture: Arc::new(fixture),
        }
    }

    /// The demo catalog under the `memory` scheme
    pub fn sample() -> Self {
        Self::new("Memory", "memory", MemoryFixture::sample())
    }

    pub fn fixture(&self) -> &MemoryFixture {
        &self.fixture
    }

    /// First path segment, then host, then the first fixture database
    fn select_database(&self, url: &Url) -> Result<usize> {
        let segment = url
            .path_segments()
            .and_then(|mut segments| segments.next())
            .filter(|segment| !segment.is_empty());

        if let Some(name) = segment {
            return self
                .fixture
                .database_index(name)
                .ok_or_else(|| DataError::not_found(format!("database '{}'", name)));
        }

        if let Some(index) = url.host_str().and_then(|host| self.fixture.database_index(host)) {
            return Ok(index);
        }

        if self.fixture.databases.is_empty() {
            return Err(DataError::invalid_configuration(format!(
                "adapter '{}' has no databases",
                self.name
            )));
        }
        Ok(0)
    }
}

#[async_trait]
impl Adapter for MemoryAdapter {
    fn localized_name(&self) -> &str {
        &self.name
    }

    fn primary_url_scheme(&self) -> &str {
        &self.scheme
    }

    fn can_connect_to_url(&self, url: &Url) -> bool {
        url.scheme() == self.scheme
    }

    async fn connect_to_url(&self, url: &Url) -> Result<Arc<dyn Connection>> {
        if !self.can_connect_to_url(url) {
            return Err(DataError::InvalidUrl(format!(
                "{} does not handle scheme '{}'",
                self.name,
                url.scheme()
            )));
        }

        if let Some(latency) = self.fixture.connect_latency {
            debug!("Simulating {:?} connect latency", latency);
            tokio::time::sleep(latency).await;
        }
        if let Some(err) = &self.fixture.connect_failure {
            return Err(err.clone());
        }

        let index = self.select_database(url)?;
        let connection = MemoryConnection::new(url.clone(), self.fixture.clone(), index);
        connection.open()?;

        info!("Connected to {}", redact_url(url));
        Ok(connection)
    }
}
