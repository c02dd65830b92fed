use crate::eval;
use crate::fixture::{normalize_query, QueryScript, TableFixture};
use async_trait::async_trait;
use induction_adapter::{
    BackRef, Capability, DataError, DataSource, Database, Explainable, Explorable, Expression,
    IndexSet, Metadata, QueryOutcome, Queryable, Record, Result, ResultSet, Row,
    SourceListIcon, TabularResultSet, Visualizable,
};
use std::sync::{Arc, Weak};
use std::time::Instant;
use tracing::debug;

/// One fixture table exposed as a data source
pub struct MemorySource {
    me: Weak<MemorySource>,
    database: BackRef<dyn Database>,
    table: TableFixture,
    records: Vec<Arc<dyn Record>>,
}

impl MemorySource {
    pub(crate) fn new(database: BackRef<dyn Database>, table: TableFixture) -> Arc<Self> {
        let columns: Arc<[String]> = table
            .columns
            .iter()
            .map(|(name, _)| name.clone())
            .collect::<Vec<_>>()
            .into();

        let records = table
            .rows
            .iter()
            .map(|row| {
                let mut record = Row::new(columns.clone(), row.values.clone());
                if !row.children.is_empty() {
                    let children = row
                        .children
                        .iter()
                        .map(|values| {
                            Arc::new(Row::new(columns.clone(), values.clone())) as Arc<dyn Record>
                        })
                        .collect();
                    record = record.with_children(children);
                }
                Arc::new(record) as Arc<dyn Record>
            })
            .collect();

        Arc::new_cyclic(|me| MemorySource {
            me: me.clone(),
            database,
            table,
            records,
        })
    }

    /// The fixture this source serves
    pub fn fixture(&self) -> &TableFixture {
        &self.table
    }

    fn result_set(&self) -> induction_adapter::ResultSetBuilder {
        let me: Weak<dyn DataSource> = self.me.clone();
        TabularResultSet::builder(BackRef::new(me, "data source"))
    }

    fn ensure_connected(&self) -> Result<()> {
        let connection = self.database.get()?.connection()?;
        if !connection.is_open() {
            return Err(DataError::invalid_state(format!(
                "connection is {}",
                connection.state()
            )));
        }
        Ok(())
    }

    /// Latency, liveness and injected failure, in that order
    async fn prepare(&self, capability: Capability) -> Result<()> {
        if let Some(latency) = self.table.latency {
            tokio::time::sleep(latency).await;
        }
        self.ensure_connected()?;
        match self.table.failures.get(&capability) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn script(&self, query: &str) -> Result<&QueryScript> {
        let wanted = normalize_query(query);
        if wanted.is_empty() {
            return Err(DataError::QuerySyntax("empty query".to_string()));
        }
        let script = self
            .table
            .queries
            .iter()
            .find(|(text, _)| normalize_query(text) == wanted)
            .map(|(_, script)| script)
            .ok_or_else(|| DataError::unsupported(format!("no scripted result for '{}'", wanted)))?;
        script.as_ref().map_err(Clone::clone)
    }
}

impl DataSource for MemorySource {
    fn name(&self) -> &str {
        &self.table.name
    }

    fn number_of_records(&self) -> usize {
        self.records.len()
    }

    fn database(&self) -> Result<Arc<dyn Database>> {
        self.database.get()
    }

    fn metadata(&self) -> Option<&Metadata> {
        (!self.table.metadata.is_empty()).then_some(&self.table.metadata)
    }

    fn source_list_icon(&self) -> Option<SourceListIcon> {
        self.table.icon
    }

    fn as_explorable(&self) -> Option<&dyn Explorable> {
        self.table.explorable.then_some(self as &dyn Explorable)
    }

    fn as_queryable(&self) -> Option<&dyn Queryable> {
        self.table.queryable.then_some(self as &dyn Queryable)
    }

    fn as_visualizable(&self) -> Option<&dyn Visualizable> {
        self.table.visualizable.then_some(self as &dyn Visualizable)
    }
}

#[async_trait]
impl Explorable for MemorySource {
    async fn fetch_records(&self, indexes: &IndexSet) -> Result<Arc<dyn ResultSet>> {
        self.prepare(Capability::Explorable).await?;
        indexes.check_bounds(self.records.len())?;

        let mut builder = self.result_set().fields(self.table.columns.clone());
        for index in indexes.iter() {
            builder.push_record(self.records[index].clone());
        }

        debug!("Fetched {} records from {}", indexes.len(), self.table.name);
        Ok(Arc::new(builder.infer_types().build()))
    }
}

#[async_trait]
impl Queryable for MemorySource {
    async fn fetch_query(&self, query: &str) -> Result<QueryOutcome> {
        self.prepare(Capability::Queryable).await?;

        let start = Instant::now();
        let script = self.script(query)?;
        let mut builder = self.result_set().fields(script.columns.clone());
        for row in &script.rows {
            builder.push_row(row.clone())?;
        }
        let result_set = Arc::new(builder.infer_types().build());

        Ok(QueryOutcome {
            result_set,
            elapsed: start.elapsed(),
        })
    }

    fn query_language(&self) -> Option<&str> {
        self.table.query_language.as_deref()
    }

    fn as_explainable(&self) -> Option<&dyn Explainable> {
        (!self.table.plans.is_empty()).then_some(self as &dyn Explainable)
    }
}

impl Explainable for MemorySource {
    fn query_plan(&self, query: &str) -> Result<String> {
        self.ensure_connected()?;
        let wanted = normalize_query(query);
        self.table
            .plans
            .iter()
            .find(|(text, _)| normalize_query(text) == wanted)
            .map(|(_, plan)| plan.clone())
            .unwrap_or_else(|| Err(DataError::unsupported(format!("no scripted plan for '{}'", wanted))))
    }
}

#[async_trait]
impl Visualizable for MemorySource {
    async fn fetch_dimension(
        &self,
        dimension: &Expression,
        measures: &[Expression],
    ) -> Result<Arc<dyn ResultSet>> {
        self.prepare(Capability::Visualizable).await?;

        let table = eval::aggregate(&self.records, dimension, measures)?;
        let mut builder = self.result_set().fields(table.columns);
        for row in table.rows {
            builder.push_row(row)?;
        }
        Ok(Arc::new(builder.infer_types().build()))
    }
}
