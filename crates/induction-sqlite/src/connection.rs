use crate::convert::{map_error, quote_ident};
use crate::source::{SourceKind, SqliteSource};
use induction_adapter::{
    BackRef, Connection, ConnectionLifecycle, ConnectionState, DataError, DataSource,
    DataSourceGroups, Database, Metadata, Result,
};
use rusqlite::OpenFlags;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tracing::{debug, info, warn};
use url::Url;

/// The driver handle shared by a connection and its data sources.
/// `None` once the connection has been closed.
#[derive(Clone, Default)]
pub struct Handle(Arc<Mutex<Option<rusqlite::Connection>>>);

impl Handle {
    fn lock(&self) -> MutexGuard<'_, Option<rusqlite::Connection>> {
        self.0.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Run `f` against the open driver connection on the calling thread
    pub fn with<T>(&self, f: impl FnOnce(&rusqlite::Connection) -> Result<T>) -> Result<T> {
        let guard = self.lock();
        let connection = guard
            .as_ref()
            .ok_or_else(|| DataError::invalid_state("SQLite connection is closed"))?;
        f(connection)
    }

    /// Run `f` on the blocking pool
    pub async fn run<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&rusqlite::Connection) -> Result<T> + Send + 'static,
    {
        let handle = self.clone();
        tokio::task::spawn_blocking(move || handle.with(f))
            .await
            .map_err(|e| DataError::internal(format!("SQLite worker failed: {}", e)))?
    }
}

/// Where the database lives, parsed from the connection URL
#[derive(Debug, Clone, PartialEq)]
pub enum Location {
    Memory,
    File { path: PathBuf, flags: OpenFlags },
}

impl Location {
    /// `sqlite::memory:`, `sqlite:///abs/path.db`, optionally `?mode=ro|rw|rwc`
    pub fn from_url(url: &Url) -> Result<Self> {
        if url.path() == ":memory:" || url.host_str() == Some(":memory:") {
            return Ok(Location::Memory);
        }

        let mut flags = OpenFlags::default();
        for (key, value) in url.query_pairs() {
            if key == "mode" {
                flags = match value.as_ref() {
                    "ro" => OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
                    "rw" => OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
                    "rwc" => OpenFlags::default(),
                    other => {
                        return Err(DataError::InvalidUrl(format!(
                            "unknown SQLite mode '{}'",
                            other
                        )))
                    }
                };
            }
        }

        if let Some(host) = url.host_str().filter(|host| !host.is_empty()) {
            if !host.eq_ignore_ascii_case("localhost") {
                return Err(DataError::InvalidUrl(format!(
                    "SQLite databases are local; cannot open one on host '{}'",
                    host
                )));
            }
        }

        let path = match url.to_file_path() {
            Ok(path) => path,
            Err(()) if url.path().starts_with('/') && url.path().len() > 1 => {
                PathBuf::from(url.path())
            }
            Err(()) => {
                return Err(DataError::InvalidUrl(format!(
                    "{} is not an absolute file path",
                    url.path()
                )))
            }
        };
        Ok(Location::File { path, flags })
    }

    fn open(&self) -> Result<rusqlite::Connection> {
        match self {
            Location::Memory => rusqlite::Connection::open_in_memory().map_err(map_error),
            Location::File { path, flags } => {
                rusqlite::Connection::open_with_flags(path, *flags).map_err(map_error)
            }
        }
    }

    fn database_name(&self) -> String {
        match self {
            Location::Memory => ":memory:".to_string(),
            Location::File { path, .. } => path
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
        }
    }
}

/// One table or view as listed in `sqlite_master`
#[derive(Debug, Clone)]
pub(crate) struct CatalogEntry {
    pub schema: String,
    pub name: String,
    pub kind: SourceKind,
    pub sql: Option<String>,
    pub rows: usize,
}

/// Schemas in `PRAGMA database_list` order, each with its entries
pub(crate) fn load_catalog(
    connection: &rusqlite::Connection,
) -> Result<Vec<(String, Vec<CatalogEntry>)>> {
    let mut statement = connection
        .prepare("PRAGMA database_list")
        .map_err(map_error)?;
    let schemas = statement
        .query_map([], |row| row.get::<_, String>(1))
        .map_err(map_error)?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(map_error)?;

    let mut catalog = Vec::new();
    for schema in schemas.into_iter().filter(|schema| schema != "temp") {
        let sql = format!(
            "SELECT name, type, sql FROM {}.sqlite_master \
             WHERE type IN ('table', 'view') AND name NOT LIKE 'sqlite_%' ORDER BY name",
            quote_ident(&schema)
        );
        let mut statement = connection.prepare(&sql).map_err(map_error)?;
        let listed = statement
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                ))
            })
            .map_err(map_error)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(map_error)?;

        let mut entries = Vec::with_capacity(listed.len());
        for (name, kind, sql) in listed {
            let rows = count_rows(connection, &schema, &name).unwrap_or_else(|err| {
                warn!("Cannot count rows of {}.{}: {}", schema, name, err);
                0
            });
            entries.push(CatalogEntry {
                schema: schema.clone(),
                kind: if kind == "view" {
                    SourceKind::View
                } else {
                    SourceKind::Table
                },
                name,
                sql,
                rows,
            });
        }
        debug!("Schema {} has {} data sources", schema, entries.len());
        catalog.push((schema, entries));
    }
    Ok(catalog)
}

pub(crate) fn count_rows(connection: &rusqlite::Connection, schema: &str, name: &str) -> Result<usize> {
    let sql = format!(
        "SELECT COUNT(*) FROM {}.{}",
        quote_ident(schema),
        quote_ident(name)
    );
    connection
        .query_row(&sql, [], |row| row.get::<_, i64>(0))
        .map(|count| count.max(0) as usize)
        .map_err(map_error)
}

/// Column names of a table or view, in declaration order
pub(crate) fn column_names(
    connection: &rusqlite::Connection,
    schema: &str,
    name: &str,
) -> Result<Vec<String>> {
    let mut statement = connection
        .prepare("SELECT name FROM pragma_table_info(?1, ?2)")
        .map_err(map_error)?;
    let names = statement
        .query_map([name, schema], |row| row.get::<_, String>(0))
        .map_err(map_error)?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(map_error)?;
    Ok(names)
}

/// Connection to one SQLite file or in-memory database
pub struct SqliteConnection {
    me: Weak<SqliteConnection>,
    url: Url,
    location: Location,
    lifecycle: ConnectionLifecycle,
    handle: Handle,
    database: Mutex<Option<Arc<SqliteDatabase>>>,
}

impl SqliteConnection {
    /// Unopened connection; nothing touches the disk until `open`
    pub fn new(url: Url) -> Result<Arc<Self>> {
        let location = Location::from_url(&url)?;
        Ok(Arc::new_cyclic(|me| SqliteConnection {
            me: me.clone(),
            url,
            location,
            lifecycle: ConnectionLifecycle::new(),
            handle: Handle::default(),
            database: Mutex::new(None),
        }))
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    fn slot(&self) -> MutexGuard<'_, Option<Arc<SqliteDatabase>>> {
        self.database.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn load_database(&self) -> Result<Arc<SqliteDatabase>> {
        let catalog = self.handle.with(load_catalog)?;
        let owner: Weak<dyn Connection> = self.me.clone();
        SqliteDatabase::build(
            BackRef::new(owner, "connection"),
            self.location.database_name(),
            &self.location,
            self.handle.clone(),
            catalog,
        )
    }
}

impl Connection for SqliteConnection {
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
            .ok_or_else(|| DataError::invalid_state("SQLite catalog not loaded"))
    }

    fn open(&self) -> Result<()> {
        self.lifecycle.open(|| {
            let driver = self.location.open()?;
            *self.handle.lock() = Some(driver);

            match self.load_database() {
                Ok(database) => {
                    info!("Opened SQLite database: {}", database.name);
                    *self.slot() = Some(database);
                    Ok(())
                }
                Err(err) => {
                    self.handle.lock().take();
                    Err(err)
                }
            }
        })
    }

    fn close(&self) -> Result<()> {
        self.lifecycle.close(|| {
            let mut guard = self.handle.lock();
            if let Some(driver) = guard.take() {
                if let Err((driver, err)) = driver.close() {
                    *guard = Some(driver);
                    return Err(map_error(err));
                }
            }
            drop(guard);
            self.slot().take();
            debug!("Closed SQLite database");
            Ok(())
        })
    }

    fn reset(&self) -> Result<()> {
        self.lifecycle.reset(|| {
            self.handle.with(|driver| {
                if !driver.is_autocommit() {
                    warn!("Rolling back open transaction during reset");
                    driver.execute_batch("ROLLBACK").map_err(map_error)?;
                }
                Ok(())
            })?;
            let database = self.load_database()?;
            *self.slot() = Some(database);
            Ok(())
        })
    }
}

/// Catalog of attached schemas, loaded when the connection opens or resets
pub struct SqliteDatabase {
    connection: BackRef<dyn Connection>,
    name: String,
    metadata: Metadata,
    groups: DataSourceGroups,
}

impl SqliteDatabase {
    fn build(
        connection: BackRef<dyn Connection>,
        name: String,
        location: &Location,
        handle: Handle,
        catalog: Vec<(String, Vec<CatalogEntry>)>,
    ) -> Result<Arc<Self>> {
        let mut metadata = Metadata::new();
        if let Location::File { path, .. } = location {
            metadata.insert(
                "path".to_string(),
                serde_json::Value::String(path.display().to_string()),
            );
        }

        let mut populated = Ok(());
        let database = Arc::new_cyclic(|me: &Weak<SqliteDatabase>| {
            let owner: Weak<dyn Database> = me.clone();
            let mut groups = DataSourceGroups::new();
            for (schema, entries) in catalog {
                let sources = entries
                    .into_iter()
                    .map(|entry| {
                        SqliteSource::new(BackRef::new(owner.clone(), "database"), handle.clone(), entry)
                            as Arc<dyn DataSource>
                    })
                    .collect();
                if let Err(err) = groups.push_group(schema, sources) {
                    populated = Err(err);
                    break;
                }
            }
            SqliteDatabase {
                connection,
                name,
                metadata,
                groups,
            }
        });
        populated?;
        Ok(database)
    }
}

impl Database for SqliteDatabase {
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

    #[test]
    fn test_location_from_url() {
        let memory = Url::parse("sqlite::memory:").unwrap();
        assert_eq!(Location::from_url(&memory).unwrap(), Location::Memory);

        let file = Url::parse("sqlite:///tmp/shop.db?mode=ro").unwrap();
        match Location::from_url(&file).unwrap() {
            Location::File { path, flags } => {
                assert_eq!(path, PathBuf::from("/tmp/shop.db"));
                assert!(flags.contains(OpenFlags::SQLITE_OPEN_READ_ONLY));
            }
            other => panic!("unexpected location {:?}", other),
        }

        let bad_mode = Url::parse("sqlite:///tmp/shop.db?mode=append").unwrap();
        assert!(matches!(
            Location::from_url(&bad_mode),
            Err(DataError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_location_rejects_remote_host() {
        let remote = Url::parse("sqlite://somehost/path.db").unwrap();
        assert!(matches!(
            Location::from_url(&remote),
            Err(DataError::InvalidUrl(_))
        ));

        let local = Url::parse("sqlite://localhost/tmp/shop.db").unwrap();
        match Location::from_url(&local).unwrap() {
            Location::File { path, .. } => assert_eq!(path, PathBuf::from("/tmp/shop.db")),
            other => panic!("unexpected location {:?}", other),
        }
    }

    #[test]
    fn test_memory_lifecycle() {
        let connection = SqliteConnection::new(Url::parse("sqlite::memory:").unwrap()).unwrap();
        assert_eq!(connection.state(), ConnectionState::Unopened);

        connection.open().unwrap();
        let database = connection.database().unwrap();
        assert_eq!(database.name(), ":memory:");
        assert_eq!(database.data_source_groups(), vec!["main"]);

        connection.reset().unwrap();
        connection.close().unwrap();
        assert!(connection.database().is_err());
        assert!(connection.handle.with(|_| Ok(())).is_err());
    }

    #[test]
    fn test_reset_rolls_back_open_transaction() {
        let connection = SqliteConnection::new(Url::parse("sqlite::memory:").unwrap()).unwrap();
        connection.open().unwrap();
        connection
            .handle
            .with(|driver| {
                driver
                    .execute_batch("CREATE TABLE t (x INTEGER); BEGIN; INSERT INTO t VALUES (1);")
                    .map_err(map_error)
            })
            .unwrap();

        connection.reset().unwrap();

        let (autocommit, rows) = connection
            .handle
            .with(|driver| {
                let rows = count_rows(driver, "main", "t")?;
                Ok((driver.is_autocommit(), rows))
            })
            .unwrap();
        assert!(autocommit);
        assert_eq!(rows, 0);
        // The reloaded catalog sees the table created before the transaction
        let database = connection.database().unwrap();
        assert_eq!(database.data_sources_in_group("main").len(), 1);
    }
}
