//! Declarative description of what a memory backend serves.

use chrono::NaiveDate;
use induction_adapter::{Capability, DataError, Metadata, SourceListIcon, Value, ValueType};
use std::collections::HashMap;
use std::time::Duration;

/// Column list of a table or scripted query result
pub type Columns = Vec<(String, Option<ValueType>)>;

/// Rows with optional child rows sharing the same columns
#[derive(Debug, Clone, PartialEq)]
pub struct FixtureRow {
    pub values: Vec<Value>,
    pub children: Vec<Vec<Value>>,
}

/// Canned result of a query text
#[derive(Debug, Clone, PartialEq)]
pub struct QueryScript {
    pub columns: Columns,
    pub rows: Vec<Vec<Value>>,
}

/// Everything one memory adapter can serve, plus injected failures
#[derive(Debug, Clone, Default)]
pub struct MemoryFixture {
    pub databases: Vec<DatabaseFixture>,
    pub connect_failure: Option<DataError>,
    pub connect_latency: Option<Duration>,
    pub open_failure: Option<DataError>,
    pub close_failure: Option<DataError>,
    pub reset_failure: Option<DataError>,
}

impl MemoryFixture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn database(mut self, database: DatabaseFixture) -> Self {
        self.databases.push(database);
        self
    }

    /// Every connect attempt fails with `error`
    pub fn fail_connect(mut self, error: DataError) -> Self {
        self.connect_failure = Some(error);
        self
    }

    pub fn with_connect_latency(mut self, latency: Duration) -> Self {
        self.connect_latency = Some(latency);
        self
    }

    pub fn fail_open(mut self, error: DataError) -> Self {
        self.open_failure = Some(error);
        self
    }

    pub fn fail_close(mut self, error: DataError) -> Self {
        self.close_failure = Some(error);
        self
    }

    pub fn fail_reset(mut self, error: DataError) -> Self {
        self.reset_failure = Some(error);
        self
    }

    pub fn database_names(&self) -> Vec<String> {
        self.databases.iter().map(|d| d.name.clone()).collect()
    }

    pub fn database_index(&self, name: &str) -> Option<usize> {
        self.databases.iter().position(|d| d.name == name)
    }

    /// Small shop catalog used by the CLI demo backend
    pub fn sample() -> Self {
        let customers = TableFixture::new("customers")
            .column("id", Some(ValueType::Integer))
            .column("name", Some(ValueType::String))
            .column("country", Some(ValueType::String))
            .column("joined", Some(ValueType::Date))
            .row(vec![1.into(), "Ada".into(), "UK".into(), date(2021, 3, 14)])
            .row(vec![2.into(), "Grace".into(), "US".into(), date(2020, 12, 9)])
            .row(vec![3.into(), "Linus".into(), "FI".into(), date(2022, 8, 25)])
            .row(vec![4.into(), "Alan".into(), "UK".into(), date(2023, 6, 23)])
            .with_metadata("engine", serde_json::json!("memory"))
            .visualizable()
            .with_query_language("memory")
            .with_query(
                "SELECT 1",
                vec![("1".to_string(), Some(ValueType::Integer))],
                vec![vec![1.into()]],
            )
            .with_query(
                "SELECT country, COUNT(*) FROM customers GROUP BY country",
                vec![
                    ("country".to_string(), Some(ValueType::String)),
                    ("COUNT(*)".to_string(), Some(ValueType::Integer)),
                ],
                vec![
                    vec!["FI".into(), 1.into()],
                    vec!["UK".into(), 2.into()],
                    vec!["US".into(), 1.into()],
                ],
            )
            .with_plan("SELECT 1", "CONSTANT ROW");

        let orders = TableFixture::new("orders")
            .column("id", Some(ValueType::Integer))
            .column("customer_id", Some(ValueType::Integer))
            .column("amount", Some(ValueType::Decimal))
            .column("status", Some(ValueType::Enum))
            .row(vec![10.into(), 1.into(), 25.5.into(), "paid".into()])
            .row(vec![11.into(), 1.into(), 12.0.into(), "paid".into()])
            .row(vec![12.into(), 2.into(), 99.9.into(), "refunded".into()])
            .row(vec![13.into(), 3.into(), 5.25.into(), "pending".into()])
            .row(vec![14.into(), 4.into(), 42.0.into(), "paid".into()])
            .visualizable();

        let top_customers = TableFixture::new("top_customers")
            .column("name", Some(ValueType::String))
            .column("total", Some(ValueType::Decimal))
            .row(vec!["Grace".into(), 99.9.into()])
            .row(vec!["Alan".into(), 42.0.into()])
            .with_icon(SourceListIcon::View);

        let settings = TableFixture::new("settings")
            .column("key", Some(ValueType::String))
            .column("value", Some(ValueType::Json))
            .row(vec![
                "currency".into(),
                Value::Json(serde_json::json!({ "code": "EUR" })),
            ])
            .with_icon(SourceListIcon::Gear);

        let events = TableFixture::new("events")
            .column("path", Some(ValueType::Url))
            .column("client", Some(ValueType::IpAddress))
            .row_with_children(
                vec!["/checkout".into(), "10.0.0.1".into()],
                vec![vec!["/checkout/pay".into(), "10.0.0.1".into()]],
            )
            .row(vec!["/".into(), "10.0.0.2".into()])
            .with_icon(SourceListIcon::Bucket)
            .visualizable();

        MemoryFixture::new()
            .database(
                DatabaseFixture::new("shop")
                    .with_metadata("engine", serde_json::json!("memory"))
                    .group("tables", vec![customers, orders])
                    .group("views", vec![top_customers])
                    .group("system", vec![settings]),
            )
            .database(DatabaseFixture::new("analytics").group("buckets", vec![events]))
    }
}

fn date(year: i32, month: u32, day: u32) -> Value {
    NaiveDate::from_ymd_opt(year, month, day)
        .map(Value::Date)
        .unwrap_or(Value::Null)
}

#[derive(Debug, Clone)]
pub struct DatabaseFixture {
    pub name: String,
    pub metadata: Metadata,
    pub groups: Vec<(String, Vec<TableFixture>)>,
}

impl DatabaseFixture {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            metadata: Metadata::new(),
            groups: Vec::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn group(mut self, name: impl Into<String>, tables: Vec<TableFixture>) -> Self {
        self.groups.push((name.into(), tables));
        self
    }
}

#[derive(Debug, Clone)]
pub struct TableFixture {
    pub name: String,
    pub columns: Columns,
    pub rows: Vec<FixtureRow>,
    pub icon: Option<SourceListIcon>,
    pub metadata: Metadata,
    pub explorable: bool,
    pub queryable: bool,
    pub visualizable: bool,
    pub query_language: Option<String>,
    pub queries: Vec<(String, Result<QueryScript, DataError>)>,
    pub plans: Vec<(String, Result<String, DataError>)>,
    pub latency: Option<Duration>,
    pub failures: HashMap<Capability, DataError>,
}

impl TableFixture {
    /// Explorable table with a table icon and no rows
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            rows: Vec::new(),
            icon: Some(SourceListIcon::Table),
            metadata: Metadata::new(),
            explorable: true,
            queryable: false,
            visualizable: false,
            query_language: None,
            queries: Vec::new(),
            plans: Vec::new(),
            latency: None,
            failures: HashMap::new(),
        }
    }

    pub fn column(mut self, name: impl Into<String>, value_type: Option<ValueType>) -> Self {
        self.columns.push((name.into(), value_type));
        self
    }

    pub fn row(mut self, values: Vec<Value>) -> Self {
        self.rows.push(FixtureRow {
            values,
            children: Vec::new(),
        });
        self
    }

    pub fn row_with_children(mut self, values: Vec<Value>, children: Vec<Vec<Value>>) -> Self {
        self.rows.push(FixtureRow { values, children });
        self
    }

    /// `count` rows produced by `make(index)`
    pub fn rows_from(mut self, count: usize, make: impl Fn(usize) -> Vec<Value>) -> Self {
        for index in 0..count {
            self = self.row(make(index));
        }
        self
    }

    pub fn with_icon(mut self, icon: SourceListIcon) -> Self {
        self.icon = Some(icon);
        self
    }

    pub fn without_icon(mut self) -> Self {
        self.icon = None;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn explorable(mut self, enabled: bool) -> Self {
        self.explorable = enabled;
        self
    }

    pub fn queryable(mut self) -> Self {
        self.queryable = true;
        self
    }

    pub fn visualizable(mut self) -> Self {
        self.visualizable = true;
        self
    }

    pub fn with_query_language(mut self, language: impl Into<String>) -> Self {
        self.query_language = Some(language.into());
        self.queryable = true;
        self
    }

    pub fn with_query(
        mut self,
        query: impl Into<String>,
        columns: Columns,
        rows: Vec<Vec<Value>>,
    ) -> Self {
        self.queries
            .push((query.into(), Ok(QueryScript { columns, rows })));
        self.queryable = true;
        self
    }

    pub fn with_query_error(mut self, query: impl Into<String>, error: DataError) -> Self {
        self.queries.push((query.into(), Err(error)));
        self.queryable = true;
        self
    }

    /// Scripted plans make the queryable capability explainable
    pub fn with_plan(mut self, query: impl Into<String>, plan: impl Into<String>) -> Self {
        self.plans.push((query.into(), Ok(plan.into())));
        self.queryable = true;
        self
    }

    pub fn with_plan_error(mut self, query: impl Into<String>, error: DataError) -> Self {
        self.plans.push((query.into(), Err(error)));
        self.queryable = true;
        self
    }

    /// Delay every fetch by `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Every fetch through `capability` fails with `error`
    pub fn fail(mut self, capability: Capability, error: DataError) -> Self {
        self.failures.insert(capability, error);
        self
    }

    pub(crate) fn validate(&self) -> Result<(), DataError> {
        for (index, (name, _)) in self.columns.iter().enumerate() {
            if self.columns[..index].iter().any(|(earlier, _)| earlier == name) {
                return Err(DataError::invalid_configuration(format!(
                    "Table '{}' declares column '{}' twice",
                    self.name, name
                )));
            }
        }

        let width = self.columns.len();
        let rows = self.rows.iter().flat_map(|row| {
            std::iter::once(&row.values).chain(row.children.iter())
        });
        for values in rows {
            if values.len() != width {
                return Err(DataError::invalid_configuration(format!(
                    "Table '{}' has {} columns but a row with {} values",
                    self.name,
                    width,
                    values.len()
                )));
            }
        }
        Ok(())
    }
}

/// Scripted queries match after trimming, dropping a trailing `;` and
/// collapsing whitespace
pub(crate) fn normalize_query(query: &str) -> String {
    query
        .trim()
        .trim_end_matches(';')
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_query() {
        assert_eq!(normalize_query("  SELECT   1 ;"), "SELECT 1");
        assert_eq!(normalize_query("SELECT\n*\tFROM t"), "SELECT * FROM t");
    }

    #[test]
    fn test_validate_row_width() {
        let table = TableFixture::new("t")
            .column("a", None)
            .row(vec![1.into(), 2.into()]);
        assert!(matches!(
            table.validate(),
            Err(DataError::InvalidConfiguration(_))
        ));

        let nested = TableFixture::new("t")
            .column("a", None)
            .row_with_children(vec![1.into()], vec![vec![]]);
        assert!(nested.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_repeated_column() {
        let table = TableFixture::new("t")
            .column("a", None)
            .column("a", None)
            .row(vec![1.into(), 2.into()]);
        assert!(matches!(
            table.validate(),
            Err(DataError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_sample_is_valid() {
        let sample = MemoryFixture::sample();
        assert_eq!(sample.database_names(), vec!["shop", "analytics"]);
        for database in &sample.databases {
            for (_, tables) in &database.groups {
                for table in tables {
                    table.validate().unwrap();
                }
            }
        }
    }

    #[test]
    fn test_scripting_enables_queryable() {
        let table = TableFixture::new("t").with_plan("SELECT 1", "SCAN");
        assert!(table.queryable);
        assert!(table.explorable);
        assert!(!table.visualizable);
    }
}
