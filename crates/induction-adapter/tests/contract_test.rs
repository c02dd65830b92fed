use async_trait::async_trait;
use induction_adapter::registry;
use induction_adapter::*;
use std::sync::{Arc, Weak};
use std::time::Duration;

struct StubAdapter {
    name: &'static str,
    scheme: &'static str,
    accepts: Vec<&'static str>,
    delay: Option<Duration>,
}

impl StubAdapter {
    fn new(name: &'static str, scheme: &'static str, accepts: &[&'static str]) -> Arc<Self> {
        Arc::new(Self {
            name,
            scheme,
            accepts: accepts.to_vec(),
            delay: None,
        })
    }
}

#[async_trait]
impl Adapter for StubAdapter {
    fn localized_name(&self) -> &str {
        self.name
    }

    fn primary_url_scheme(&self) -> &str {
        self.scheme
    }

    fn can_connect_to_url(&self, url: &Url) -> bool {
        self.accepts.contains(&url.scheme())
    }

    async fn connect_to_url(&self, url: &Url) -> Result<Arc<dyn Connection>> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(StubConnection::build(url.clone(), self.name))
    }
}

struct StubConnection {
    url: Url,
    lifecycle: ConnectionLifecycle,
    database: Arc<StubDatabase>,
}

impl StubConnection {
    fn build(url: Url, name: &'static str) -> Arc<dyn Connection> {
        let connection = Arc::new_cyclic(|conn: &Weak<StubConnection>| {
            let conn: Weak<dyn Connection> = conn.clone();
            let database = Arc::new_cyclic(|db: &Weak<StubDatabase>| {
                let db: Weak<dyn Database> = db.clone();
                let mut groups = DataSourceGroups::new();
                groups
                    .push_group(
                        "main",
                        vec![
                            StubSource::build(db.clone(), "users", 4) as Arc<dyn DataSource>,
                            StubSource::build(db.clone(), "orders", 2) as Arc<dyn DataSource>,
                        ],
                    )
                    .unwrap();
                groups
                    .push_group(
                        "views",
                        vec![StubSource::build(db, "active_users", 1) as Arc<dyn DataSource>],
                    )
                    .unwrap();
                StubDatabase {
                    name: name.to_string(),
                    connection: BackRef::new(conn, "connection"),
                    groups,
                }
            });
            StubConnection {
                url,
                lifecycle: ConnectionLifecycle::opened(),
                database,
            }
        });
        connection
    }
}

impl Connection for StubConnection {
    fn url(&self) -> &Url {
        &self.url
    }

    fn state(&self) -> ConnectionState {
        self.lifecycle.state()
    }

    fn database(&self) -> Result<Arc<dyn Database>> {
        self.lifecycle.ensure_open()?;
        Ok(self.database.clone())
    }

    fn open(&self) -> Result<()> {
        self.lifecycle.open(|| Ok(()))
    }

    fn close(&self) -> Result<()> {
        self.lifecycle.close(|| Ok(()))
    }

    fn reset(&self) -> Result<()> {
        self.lifecycle.reset(|| Ok(()))
    }
}

struct StubDatabase {
    name: String,
    connection: BackRef<dyn Connection>,
    groups: DataSourceGroups,
}

impl Database for StubDatabase {
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
}

/// Explorable-only source whose rows are `[index, "row-index"]`
struct StubSource {
    me: Weak<StubSource>,
    database: BackRef<dyn Database>,
    name: String,
    rows: usize,
}

impl StubSource {
    fn build(database: Weak<dyn Database>, name: &str, rows: usize) -> Arc<StubSource> {
        Arc::new_cyclic(|me| StubSource {
            me: me.clone(),
            database: BackRef::new(database, "database"),
            name: name.to_string(),
            rows,
        })
    }

    fn self_ref(&self) -> BackRef<dyn DataSource> {
        let me: Weak<dyn DataSource> = self.me.clone();
        BackRef::new(me, "data source")
    }
}

impl DataSource for StubSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn number_of_records(&self) -> usize {
        self.rows
    }

    fn database(&self) -> Result<Arc<dyn Database>> {
        self.database.get()
    }

    fn as_explorable(&self) -> Option<&dyn Explorable> {
        Some(self)
    }
}

#[async_trait]
impl Explorable for StubSource {
    async fn fetch_records(&self, indexes: &IndexSet) -> Result<Arc<dyn ResultSet>> {
        indexes.check_bounds(self.rows)?;
        let mut builder = TabularResultSet::builder(self.self_ref())
            .field("id", Some(ValueType::Integer))
            .field("label", Some(ValueType::String));
        for index in indexes {
            builder.push_row(vec![
                Value::from(index as i64),
                Value::from(format!("row-{}", index)),
            ])?;
        }
        Ok(Arc::new(builder.build()))
    }
}

fn url(text: &str) -> Url {
    Url::parse(text).unwrap()
}

fn id_of(record: &Arc<dyn Record>) -> i64 {
    match record.value_for_key("id") {
        Some(Value::Integer(id)) => *id,
        other => panic!("unexpected id {:?}", other),
    }
}

#[test]
fn test_only_matching_adapter_accepts_url() {
    let registry = AdapterRegistry::new()
        .with_adapter(StubAdapter::new("PostgreSQL", "pg", &["pg", "postgres"]))
        .with_adapter(StubAdapter::new("SQLite", "sqlite", &["sqlite"]));

    let target = url("sqlite:///tmp/a.db");
    let candidates = registry.candidates_for_url(&target);
    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].localized_name(), "SQLite");
    assert!(registry.adapter_for_url(&url("mysql://localhost/x")).is_none());
}

#[test]
fn test_tie_break_prefers_primary_scheme_then_registration_order() {
    let registry = AdapterRegistry::new()
        .with_adapter(StubAdapter::new("Generic SQL", "odbc", &["odbc", "sqlite"]))
        .with_adapter(StubAdapter::new("SQLite", "sqlite", &["sqlite"]))
        .with_adapter(StubAdapter::new("SQLite (legacy)", "sqlite", &["sqlite"]));

    let sqlite = url("sqlite:///tmp/a.db");
    assert_eq!(registry.candidates_for_url(&sqlite).len(), 3);
    assert_eq!(
        registry.adapter_for_url(&sqlite).unwrap().localized_name(),
        "SQLite"
    );

    let registry = AdapterRegistry::new()
        .with_adapter(StubAdapter::new("First", "a", &["x"]))
        .with_adapter(StubAdapter::new("Second", "b", &["x"]));
    assert_eq!(
        registry.adapter_for_url(&url("x://host")).unwrap().localized_name(),
        "First"
    );
}

#[tokio::test]
async fn test_connect_without_adapter_fails() {
    let registry = AdapterRegistry::new();
    let err = registry.connect_str("pg://localhost/db").await.err().unwrap();
    assert!(matches!(err, DataError::NoAdapter(_)));
    assert_eq!(err.kind(), ErrorKind::Connection);

    let err = registry.connect_str("not a url").await.err().unwrap();
    assert!(matches!(err, DataError::InvalidUrl(_)));
}

#[tokio::test(start_paused = true)]
async fn test_connect_timeout() {
    let slow = Arc::new(StubAdapter {
        name: "Slow",
        scheme: "slow",
        accepts: vec!["slow"],
        delay: Some(Duration::from_secs(60)),
    });
    let registry = AdapterRegistry::new().with_adapter(slow);

    let err = registry
        .connect_with_timeout(&url("slow://host"), Duration::from_millis(100))
        .await
        .err()
        .unwrap();
    assert_eq!(err, DataError::Timeout(100));
}

#[tokio::test]
async fn test_walk_tree_is_stable() {
    let registry =
        AdapterRegistry::new().with_adapter(StubAdapter::new("Stub", "stub", &["stub"]));
    let connection = registry.connect_str("stub://host/db").await.unwrap();
    let database = connection.database().unwrap();

    assert_eq!(database.data_source_groups(), vec!["main", "views"]);
    assert_eq!(database.number_of_data_sources_in_group("main"), 2);
    assert_eq!(database.number_of_data_sources_in_group("missing"), 0);
    assert!(database.data_source_in_group("main", 2).is_none());

    for _ in 0..3 {
        let first = database.data_source_in_group("main", 0).unwrap();
        let again = database.data_source_in_group("main", 0).unwrap();
        assert!(Arc::ptr_eq(&first, &again));
        assert_eq!(first.name(), "users");
        assert_eq!(database.data_source_group_at_index(1), Some("views"));
    }

    let orders = database.find_data_source("main", "orders").unwrap();
    assert_eq!(orders.number_of_records(), 2);
    assert!(matches!(
        database.find_data_source("nope", "orders"),
        Err(DataError::NotFound(_))
    ));

    let back = orders.database().unwrap().connection().unwrap();
    assert_eq!(back.url().as_str(), "stub://host/db");
}

#[tokio::test]
async fn test_capability_probes() {
    let connection = StubConnection::build(url("stub://host"), "stub");
    let source = connection
        .database()
        .unwrap()
        .find_data_source("main", "users")
        .unwrap();

    assert_eq!(source.capabilities(), vec![Capability::Explorable]);
    assert!(source.supports(Capability::Explorable));
    assert!(source.as_queryable().is_none());
    assert!(source.as_visualizable().is_none());
    assert_eq!(
        source.queryable().err(),
        Some(DataError::CapabilityAbsent(Capability::Queryable))
    );
    assert!(source.downcast_ref::<StubSource>().is_some());
}

#[tokio::test]
async fn test_records_follow_request_order() {
    let connection = StubConnection::build(url("stub://host"), "stub");
    let source = connection
        .database()
        .unwrap()
        .find_data_source("main", "users")
        .unwrap();
    let explorable = source.explorable().unwrap();

    let result = explorable.fetch_records(&IndexSet::from_range(0..4)).await.unwrap();
    assert_eq!(result.number_of_records(), 4);
    assert_eq!(result.number_of_fields(), 2);
    assert_eq!(result.identifier_for_field(0), Some("id"));
    assert_eq!(result.identifier_for_field(1), Some("label"));
    assert_eq!(result.identifier_for_field(2), None);
    assert_eq!(result.value_type_for_field(1), Some(ValueType::String));
    assert_eq!(
        result.sort_descriptor_prototype_for_field(0),
        Some(SortDescriptor::ascending("id"))
    );

    let request = IndexSet::from([3, 0, 2]);
    for _ in 0..2 {
        let records = result.records_at_indexes(&request).unwrap();
        let ids: Vec<i64> = records.iter().map(id_of).collect();
        assert_eq!(ids, vec![3, 0, 2]);
    }

    assert!(result.records_at_indexes(&IndexSet::new()).unwrap().is_empty());
    assert_eq!(
        result.records_at_indexes(&IndexSet::from([1, 4])).err(),
        Some(DataError::IndexOutOfRange { index: 4, count: 4 })
    );

    let fetch = explorable.fetch_records(&IndexSet::from([5, 2, 8])).await;
    assert_eq!(
        fetch.err(),
        Some(DataError::IndexOutOfRange { index: 5, count: 4 })
    );
}

#[tokio::test]
async fn test_back_references_detach() {
    let connection = StubConnection::build(url("stub://host"), "stub");
    let database = connection.database().unwrap();
    let source = database.find_data_source("main", "users").unwrap();
    let result = source
        .explorable()
        .unwrap()
        .fetch_records(&IndexSet::from([0]))
        .await
        .unwrap();

    assert_eq!(result.data_source().unwrap().name(), "users");

    drop(source);
    drop(database);
    drop(connection);

    assert_eq!(
        result.data_source().err(),
        Some(DataError::Detached("data source"))
    );
    // Records stay readable after the backend is gone
    assert_eq!(result.records().unwrap().len(), 1);
}

#[tokio::test]
async fn test_closed_connection_hides_database() {
    let connection = StubConnection::build(url("stub://host"), "stub");
    connection.close().unwrap();
    connection.close().unwrap();
    assert_eq!(connection.state(), ConnectionState::Closed);
    assert!(matches!(
        connection.database(),
        Err(DataError::InvalidState(_))
    ));
    assert!(connection.reset().is_err());
    assert!(connection.as_multi_database().is_none());
}

#[test]
fn test_group_names_are_unique() {
    let mut groups = DataSourceGroups::new();
    groups.push_group("main", Vec::new()).unwrap();
    assert!(matches!(
        groups.push_group("main", Vec::new()),
        Err(DataError::InvalidConfiguration(_))
    ));
    assert_eq!(groups.len(), 1);
}

#[test]
fn test_global_registry_installs_once() {
    let registry =
        AdapterRegistry::new().with_adapter(StubAdapter::new("Stub", "stub", &["stub"]));
    let installed = registry::install_global(registry).unwrap();
    assert_eq!(installed.list_backends(), vec![("Stub".to_string(), "stub".to_string())]);
    assert!(registry::global().is_some());
    assert!(registry::install_global(AdapterRegistry::new()).is_err());
}
