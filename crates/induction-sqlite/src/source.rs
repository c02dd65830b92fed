use crate::connection::{column_names, count_rows, CatalogEntry, Handle};
use crate::convert::{map_decltype, map_error, map_prepare_error, quote_ident, to_value};
use crate::translate::dimension_query;
use async_trait::async_trait;
use induction_adapter::{
    AggregateFunction, BackRef, DataError, DataSource, Database, Explainable, Explorable, Expression,
    IndexSet, Metadata, QueryOutcome, Queryable, Result, ResultSet, SourceListIcon,
    TabularResultSet, Value, ValueType, Visualizable,
};
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Instant;
use tracing::{debug, error};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Table,
    View,
}

/// Column names, declared types and converted rows of one statement
struct Fetched {
    columns: Vec<(String, Option<ValueType>)>,
    rows: Vec<Vec<Value>>,
}

fn run_statement(
    statement: &mut rusqlite::Statement<'_>,
    params: impl rusqlite::Params,
) -> Result<Fetched> {
    let columns: Vec<(String, Option<ValueType>)> = statement
        .columns()
        .iter()
        .map(|column| {
            (
                column.name().to_string(),
                column.decl_type().and_then(map_decltype),
            )
        })
        .collect();

    let mut rows = Vec::new();
    let mut cursor = statement.query(params).map_err(map_error)?;
    while let Some(row) = cursor.next().map_err(map_error)? {
        let mut values = Vec::with_capacity(columns.len());
        for (index, (_, declared)) in columns.iter().enumerate() {
            values.push(to_value(row.get_ref(index).map_err(map_error)?, *declared));
        }
        rows.push(values);
    }
    Ok(Fetched { columns, rows })
}

/// A table or view inside one attached schema
pub struct SqliteSource {
    me: Weak<SqliteSource>,
    database: BackRef<dyn Database>,
    handle: Handle,
    entry: CatalogEntry,
    metadata: Metadata,
}

impl SqliteSource {
    pub(crate) fn new(database: BackRef<dyn Database>, handle: Handle, entry: CatalogEntry) -> Arc<Self> {
        let mut metadata = HashMap::new();
        metadata.insert("schema".to_string(), serde_json::json!(entry.schema));
        if let Some(sql) = &entry.sql {
            metadata.insert("sql".to_string(), serde_json::json!(sql));
        }

        Arc::new_cyclic(|me| SqliteSource {
            me: me.clone(),
            database,
            handle,
            entry,
            metadata,
        })
    }

    pub fn schema(&self) -> &str {
        &self.entry.schema
    }

    pub fn kind(&self) -> SourceKind {
        self.entry.kind
    }

    fn qualified_name(&self) -> String {
        format!(
            "{}.{}",
            quote_ident(&self.entry.schema),
            quote_ident(&self.entry.name)
        )
    }

    /// Tables keep rowid order; views and WITHOUT ROWID tables have none
    fn order_clause(&self) -> &'static str {
        let without_rowid = self
            .entry
            .sql
            .as_deref()
            .map(|sql| sql.to_ascii_uppercase().contains("WITHOUT ROWID"))
            .unwrap_or(false);
        match self.entry.kind {
            SourceKind::Table if !without_rowid => " ORDER BY rowid",
            _ => "",
        }
    }

    fn build(&self, fetched: Fetched) -> Result<Arc<dyn ResultSet>> {
        let me: Weak<dyn DataSource> = self.me.clone();
        let mut builder = TabularResultSet::builder(BackRef::new(me, "data source"))
            .fields(fetched.columns);
        for row in fetched.rows {
            builder.push_row(row)?;
        }
        Ok(Arc::new(builder.infer_types().build()))
    }
}

impl DataSource for SqliteSource {
    fn name(&self) -> &str {
        &self.entry.name
    }

    fn number_of_records(&self) -> usize {
        self.entry.rows
    }

    fn database(&self) -> Result<Arc<dyn Database>> {
        self.database.get()
    }

    fn metadata(&self) -> Option<&Metadata> {
        Some(&self.metadata)
    }

    fn source_list_icon(&self) -> Option<SourceListIcon> {
        Some(match self.entry.kind {
            SourceKind::Table => SourceListIcon::Table,
            SourceKind::View => SourceListIcon::View,
        })
    }

    fn as_explorable(&self) -> Option<&dyn Explorable> {
        Some(self)
    }

    fn as_queryable(&self) -> Option<&dyn Queryable> {
        Some(self)
    }

    fn as_visualizable(&self) -> Option<&dyn Visualizable> {
        Some(self)
    }
}

#[async_trait]
impl Explorable for SqliteSource {
    async fn fetch_records(&self, indexes: &IndexSet) -> Result<Arc<dyn ResultSet>> {
        let schema = self.entry.schema.clone();
        let name = self.entry.name.clone();
        let table = self.qualified_name();
        let order = self.order_clause();
        let wanted = indexes.clone();

        let fetched = self
            .handle
            .run(move |driver| {
                let count = count_rows(driver, &schema, &name)?;
                wanted.check_bounds(count)?;

                let (offset, limit) = match (wanted.min(), wanted.max()) {
                    (Some(min), Some(max)) => (min, max - min + 1),
                    _ => (0, 0),
                };
                let sql = format!("SELECT * FROM {}{} LIMIT ? OFFSET ?", table, order);
                let mut statement = driver.prepare(&sql).map_err(map_error)?;
                let window = run_statement(
                    &mut statement,
                    rusqlite::params![limit as i64, offset as i64],
                )?;

                let mut rows = Vec::with_capacity(wanted.len());
                for index in wanted.iter() {
                    let row = window.rows.get(index - offset).cloned().ok_or(
                        DataError::IndexOutOfRange {
                            index,
                            count: offset + window.rows.len(),
                        },
                    )?;
                    rows.push(row);
                }
                Ok(Fetched {
                    columns: window.columns,
                    rows,
                })
            })
            .await?;

        debug!(
            "Fetched {} records from {}",
            fetched.rows.len(),
            self.entry.name
        );
        self.build(fetched)
    }
}

#[async_trait]
impl Queryable for SqliteSource {
    async fn fetch_query(&self, query: &str) -> Result<QueryOutcome> {
        let sql = query.to_string();
        let (fetched, elapsed) = self
            .handle
            .run(move |driver| {
                let start = Instant::now();
                let mut statement = driver.prepare(&sql).map_err(map_prepare_error)?;
                let fetched = run_statement(&mut statement, [])?;
                Ok((fetched, start.elapsed()))
            })
            .await
            .inspect_err(|err| error!("SQLite query failed: {}", err))?;

        Ok(QueryOutcome {
            result_set: self.build(fetched)?,
            elapsed,
        })
    }

    fn query_language(&self) -> Option<&str> {
        Some("sqlite")
    }

    fn as_explainable(&self) -> Option<&dyn Explainable> {
        Some(self)
    }
}

impl Explainable for SqliteSource {
    fn query_plan(&self, query: &str) -> Result<String> {
        self.handle.with(|driver| {
            let sql = format!("EXPLAIN QUERY PLAN {}", query);
            let mut statement = driver.prepare(&sql).map_err(map_prepare_error)?;
            let steps = statement
                .query_map([], |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, String>(3)?,
                    ))
                })
                .map_err(map_error)?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(map_error)?;

            let mut depths: HashMap<i64, usize> = HashMap::new();
            let mut lines = Vec::with_capacity(steps.len());
            for (id, parent, detail) in steps {
                let depth = depths.get(&parent).map_or(0, |d| d + 1);
                depths.insert(id, depth);
                lines.push(format!("{}{}", "  ".repeat(depth), detail));
            }
            Ok(lines.join("\n"))
        })
    }
}

#[async_trait]
impl Visualizable for SqliteSource {
    async fn fetch_dimension(
        &self,
        dimension: &Expression,
        measures: &[Expression],
    ) -> Result<Arc<dyn ResultSet>> {
        Expression::validate_dimensional(dimension, measures)?;
        let (schema, name) = (self.entry.schema.clone(), self.entry.name.clone());
        let (dimension, owned_measures) = (dimension.clone(), measures.to_vec());

        let mut fetched = self
            .handle
            .run(move |driver| {
                let columns = column_names(driver, &schema, &name)?;
                let translated =
                    dimension_query(&schema, &name, &columns, &dimension, &owned_measures)?;
                debug!("Dimension query: {}", translated.sql);
                let mut statement = driver.prepare(&translated.sql).map_err(map_error)?;
                run_statement(
                    &mut statement,
                    rusqlite::params_from_iter(translated.params.iter()),
                )
            })
            .await?;

        // Expression columns carry no declared type
        for ((_, value_type), measure) in fetched.columns.iter_mut().skip(1).zip(measures) {
            if let Expression::Aggregate { function, .. } = measure {
                *value_type = match function {
                    AggregateFunction::Count => Some(ValueType::Integer),
                    AggregateFunction::Average => Some(ValueType::Decimal),
                    _ => *value_type,
                };
            }
        }
        self.build(fetched)
    }
}
