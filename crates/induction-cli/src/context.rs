use crate::output::OutputFormat;
use anyhow::Context as _;
use induction_adapter::{registry, AdapterRegistry, Connection, DataSource, Database};
use induction_memory::MemoryAdapter;
use induction_sqlite::SqliteAdapter;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Everything a command needs besides its own arguments
pub struct Context {
    pub registry: &'static AdapterRegistry,
    pub connect_timeout: Duration,
    pub format: OutputFormat,
}

/// Adapters bundled with the CLI, in tie-break order
pub fn default_registry() -> AdapterRegistry {
    AdapterRegistry::new()
        .with_adapter(Arc::new(SqliteAdapter::new()))
        .with_adapter(Arc::new(MemoryAdapter::sample()))
}

impl Context {
    pub fn new(connect_timeout_secs: u64, format: OutputFormat) -> anyhow::Result<Self> {
        let registry = registry::install_global(default_registry())?;
        debug!("Installed {} adapters", registry.adapters().len());
        Ok(Self {
            registry,
            connect_timeout: Duration::from_secs(connect_timeout_secs),
            format,
        })
    }

    pub async fn connect(&self, url: &str) -> anyhow::Result<Arc<dyn Connection>> {
        let url = Url::parse(url).with_context(|| format!("Invalid URL '{}'", url))?;
        let connection = self
            .registry
            .connect_with_timeout(&url, self.connect_timeout)
            .await?;
        Ok(connection)
    }
}

/// Resolve `group/name`, or a bare `name` searched across all groups
pub fn find_source(database: &dyn Database, path: &str) -> anyhow::Result<Arc<dyn DataSource>> {
    if let Some((group, name)) = path.split_once('/') {
        return Ok(database.find_data_source(group, name)?);
    }

    database
        .data_source_groups()
        .iter()
        .flat_map(|group| database.data_sources_in_group(group))
        .find(|source| source.name() == path)
        .ok_or_else(|| anyhow::anyhow!("No data source named '{}' in {}", path, database.name()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_find_source_by_path_and_name() {
        let connection = default_registry()
            .connect_str("memory://local/shop")
            .await
            .unwrap();
        let database = connection.database().unwrap();

        let orders = find_source(database.as_ref(), "tables/orders").unwrap();
        assert_eq!(orders.name(), "orders");

        let settings = find_source(database.as_ref(), "settings").unwrap();
        assert_eq!(settings.name(), "settings");

        assert!(find_source(database.as_ref(), "views/orders").is_err());
        assert!(find_source(database.as_ref(), "missing").is_err());
    }

    #[test]
    fn test_default_registry_order() {
        let backends = default_registry().list_backends();
        assert_eq!(
            backends,
            vec![
                ("SQLite".to_string(), "sqlite".to_string()),
                ("Memory".to_string(), "memory".to_string()),
            ]
        );
    }
}
