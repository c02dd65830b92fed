use crate::fixture::{DatabaseFixture, MemoryFixture};
use crate::source::MemorySource;
use induction_adapter::{
    BackRef, Connection, ConnectionLifecycle, ConnectionState, DataError, DataSource,
    DataSourceGroups, Database, Metadata, MultiDatabase, Result,
};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tracing::{debug, info};
use url::Url;

/// Connection to one fixture database
pub struct MemoryConnection {
    me: Weak<MemoryConnection>,
    url: Url,
    fixture: Arc<MemoryFixture>,
    database_index: usize,
    lifecycle: ConnectionLifecycle,
    database: Mutex<Option<Arc<MemoryDatabase>>>,
}

impl MemoryConnection {
    /// Unopened connection to `fixture.databases[database_index]`
    pub fn new(url: Url, fixture: Arc<MemoryFixture>, database_index: usize) -> Arc<Self> {
        Arc::new_cyclic(|me| MemoryConnection {
            me: me.clone(),
            url,
            fixture,
            database_index,
            lifecycle: ConnectionLifecycle::new(),
            database: Mutex::new(None),
        })
    }

    fn slot(&self) -> MutexGuard<'_, Option<Arc<MemoryDatabase>>> {
        self.database.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn database_fixture(&self) -> Result<&DatabaseFixture> {
        self.fixture
            .databases
            .get(self.database_index)
            .ok_or_else(|| DataError::internal("fixture database disappeared"))
    }

    fn load(&self) -> Result<Arc<MemoryDatabase>> {
        let owner: Weak<dyn Connection> = self.me.clone();
        MemoryDatabase::build(BackRef::new(owner, "connection"), self.database_fixture()?)
    }
}

impl Connection for MemoryConnection {
    fn url(&self) -> &Url {
        &self.url
    }

    fn state(&self) -> ConnectionState {
        self.lifecycle.state()
    }

    fn database(&self) -> Result<Arc<dyn Database>> {
        self.lifecycle.ensure_open()?;
        self.slot()
            .clone()
            .map(|database| database as Arc<dyn Database>)
            .ok_or_else(|| DataError::invalid_state("connection has no database loaded"))
    }

    fn open(&self) -> Result<()> {
        self.lifecycle.open(|| {
            if let Some(err) = &self.fixture.open_failure {
                return Err(err.clone());
            }
            let database = self.load()?;
            info!("Opened memory database: {}", database.name);
            *self.slot() = Some(database);
            Ok(())
        })
    }

    fn close(&self) -> Result<()> {
        self.lifecycle.close(|| {
            if let Some(err) = &self.fixture.close_failure {
                return Err(err.clone());
            }
            self.slot().take();
            debug!("Released memory database");
            Ok(())
        })
    }

    fn reset(&self) -> Result<()> {
        self.lifecycle.reset(|| {
            if let Some(err) = &self.fixture.reset_failure {
                return Err(err.clone());
            }
            let database = self.load()?;
            *self.slot() = Some(database);
            Ok(())
        })
    }

    fn as_multi_database(&self) -> Option<&dyn MultiDatabase> {
        Some(self)
    }
}

impl MultiDatabase for MemoryConnection {
    fn available_databases(&self) -> Result<Vec<String>> {
        Ok(self.fixture.database_names())
    }

    fn connection_selecting_database(&self, name: &str) -> Result<Arc<dyn Connection>> {
        let index = self
            .fixture
            .database_index(name)
            .ok_or_else(|| DataError::not_found(format!("database '{}'", name)))?;

        let mut url = self.url.clone();
        if url.cannot_be_a_base() {
            return Err(DataError::InvalidUrl(format!(
                "{} cannot carry a database name",
                url.scheme()
            )));
        }
        url.set_path(&format!("/{}", name));

        Ok(MemoryConnection::new(url, self.fixture.clone(), index))
    }
}

/// Catalog built from a [`DatabaseFixture`] when the connection opens
pub struct MemoryDatabase {
    connection: BackRef<dyn Connection>,
    name: String,
    metadata: Metadata,
    groups: DataSourceGroups,
}

impl MemoryDatabase {
    fn build(connection: BackRef<dyn Connection>, fixture: &DatabaseFixture) -> Result<Arc<Self>> {
        let mut populated = Ok(());
        let database = Arc::new_cyclic(|me: &Weak<MemoryDatabase>| {
            let owner: Weak<dyn Database> = me.clone();
            let mut groups = DataSourceGroups::new();
            populated = Self::populate(&mut groups, owner, fixture);
            MemoryDatabase {
                connection,
                name: fixture.name.clone(),
                metadata: fixture.metadata.clone(),
                groups,
            }
        });
        populated?;
        Ok(database)
    }

    fn populate(
        groups: &mut DataSourceGroups,
        owner: Weak<dyn Database>,
        fixture: &DatabaseFixture,
    ) -> Result<()> {
        for (group, tables) in &fixture.groups {
            let mut sources = Vec::with_capacity(tables.len());
            for table in tables {
                table.validate()?;
                let source = MemorySource::new(BackRef::new(owner.clone(), "database"), table.clone());
                sources.push(source as Arc<dyn DataSource>);
            }
            groups.push_group(group.clone(), sources)?;
        }
        Ok(())
    }
}

impl Database for MemoryDatabase {
    fn connection(&self) -> Result<Arc<dyn Connection>> {
        self.connection.get()
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn number_of_data_source_groups(&self) -> usize {
        self.groups.len()
    }

    fn data_source_group_at_index(&self, index: usize) -> Option<&str> {
        self.groups.group_at(index)
    }

    fn number_of_data_sources_in_group(&self, group: &str) -> usize {
        self.groups.count_in(group)
    }

    fn data_source_in_group(&self, group: &str, index: usize) -> Option<Arc<dyn DataSource>> {
        self.groups.source_at(group, index)
    }

    fn metadata(&self) -> Option<&Metadata> {
        (!self.metadata.is_empty()).then_some(&self.metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::TableFixture;

    fn connection(fixture: MemoryFixture) -> Arc<MemoryConnection> {
        let url = Url::parse("memory://local/shop").unwrap();
        MemoryConnection::new(url, Arc::new(fixture), 0)
    }

    #[test]
    fn test_database_only_while_open() {
        let conn = connection(MemoryFixture::sample());
        assert!(matches!(conn.database(), Err(DataError::InvalidState(_))));

        conn.open().unwrap();
        assert_eq!(conn.database().unwrap().name(), "shop");

        conn.close().unwrap();
        assert!(conn.database().is_err());
        assert_eq!(conn.state(), ConnectionState::Closed);
    }

    #[test]
    fn test_open_failure_keeps_unopened() {
        let conn = connection(
            MemoryFixture::sample().fail_open(DataError::AuthenticationRejected("bob".into())),
        );
        assert_eq!(
            conn.open(),
            Err(DataError::AuthenticationRejected("bob".into()))
        );
        assert_eq!(conn.state(), ConnectionState::Unopened);
    }

    #[test]
    fn test_duplicate_group_rejected_on_open() {
        let fixture = MemoryFixture::new().database(
            DatabaseFixture::new("dup")
                .group("g", vec![TableFixture::new("a")])
                .group("g", vec![TableFixture::new("b")]),
        );
        let conn = connection(fixture);
        assert!(matches!(
            conn.open(),
            Err(DataError::InvalidConfiguration(_))
        ));
        assert_eq!(conn.state(), ConnectionState::Unopened);
    }

    #[test]
    fn test_reset_reloads_catalog() {
        let conn = connection(MemoryFixture::sample());
        conn.open().unwrap();
        let before = conn.database().unwrap();
        conn.reset().unwrap();
        let after = conn.database().unwrap();
        assert!(!Arc::ptr_eq(&before, &after));
        assert_eq!(after.data_source_groups(), before.data_source_groups());
    }

    #[test]
    fn test_sibling_url_selects_database() {
        let conn = connection(MemoryFixture::sample());
        let sibling = conn.connection_selecting_database("analytics").unwrap();
        assert_eq!(sibling.url().as_str(), "memory://local/analytics");
        assert_eq!(sibling.state(), ConnectionState::Unopened);

        assert!(matches!(
            conn.connection_selecting_database("missing"),
            Err(DataError::NotFound(_))
        ));
    }
}
