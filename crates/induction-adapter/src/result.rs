//! Records and result sets.
//!
//! A result set is the immutable snapshot a fetch produces. It never talks to
//! the backend again after construction, so it can be shared freely between
//! threads and read in any order.

use crate::backref::BackRef;
use crate::error::{DataError, Result};
use crate::index_set::IndexSet;
use crate::source::DataSource;
use crate::types::{SortDescriptor, Value, ValueType};
use downcast_rs::{impl_downcast, Downcast};
use std::fmt;
use std::sync::Arc;

/// One row-equivalent unit of data
pub trait Record: Send + Sync + fmt::Debug {
    /// Value stored under `key`, `None` when the record has no such key
    fn value_for_key(&self, key: &str) -> Option<&Value>;

    /// Ordered child records for tree-shaped results
    fn children(&self) -> Option<&[Arc<dyn Record>]> {
        None
    }
}

/// Record backed by a shared column list and a vector of values
#[derive(Debug, Clone)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<Value>,
    children: Option<Vec<Arc<dyn Record>>>,
}

impl Row {
    pub fn new(columns: Arc<[String]>, values: Vec<Value>) -> Self {
        Self {
            columns,
            values,
            children: None,
        }
    }

    pub fn with_children(mut self, children: Vec<Arc<dyn Record>>) -> Self {
        self.children = Some(children);
        self
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn value_at(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }
}

impl Record for Row {
    fn value_for_key(&self, key: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|column| column == key)
            .and_then(|index| self.values.get(index))
    }

    fn children(&self) -> Option<&[Arc<dyn Record>]> {
        self.children.as_deref()
    }
}

/// Immutable table of records with named, optionally typed columns
pub trait ResultSet: Send + Sync + Downcast {
    /// The data source that produced this result set
    fn data_source(&self) -> Result<Arc<dyn DataSource>>;

    fn number_of_records(&self) -> usize;

    /// Records in the order of `indexes`; any out-of-range index fails the
    /// whole request
    fn records_at_indexes(&self, indexes: &IndexSet) -> Result<Vec<Arc<dyn Record>>>;

    fn number_of_fields(&self) -> usize;

    /// Column identifier, defined for every index below `number_of_fields`
    fn identifier_for_field(&self, index: usize) -> Option<&str>;

    fn value_type_for_field(&self, _index: usize) -> Option<ValueType> {
        None
    }

    fn sort_descriptor_prototype_for_field(&self, _index: usize) -> Option<SortDescriptor> {
        None
    }

    /// All column identifiers in field order
    fn field_identifiers(&self) -> Vec<String> {
        (0..self.number_of_fields())
            .filter_map(|index| self.identifier_for_field(index).map(str::to_string))
            .collect()
    }

    /// Every record in storage order
    fn records(&self) -> Result<Vec<Arc<dyn Record>>> {
        self.records_at_indexes(&IndexSet::from_range(0..self.number_of_records()))
    }
}

impl_downcast!(ResultSet);

/// Column description inside a [`TabularResultSet`]
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub identifier: String,
    pub value_type: Option<ValueType>,
    pub sort_prototype: Option<SortDescriptor>,
}

impl Field {
    pub fn new(identifier: impl Into<String>, value_type: Option<ValueType>) -> Self {
        let identifier = identifier.into();
        let sort_prototype = match value_type {
            Some(
                ValueType::Blob
                | ValueType::Json
                | ValueType::Set
                | ValueType::Geometry
                | ValueType::Geographic,
            ) => None,
            _ => Some(SortDescriptor::ascending(identifier.clone())),
        };
        Self {
            identifier,
            value_type,
            sort_prototype,
        }
    }
}

/// The result set every bundled backend hands out
pub struct TabularResultSet {
    data_source: BackRef<dyn DataSource>,
    fields: Vec<Field>,
    records: Vec<Arc<dyn Record>>,
}

impl TabularResultSet {
    pub fn builder(data_source: BackRef<dyn DataSource>) -> ResultSetBuilder {
        ResultSetBuilder::new(data_source)
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }
}

impl fmt::Debug for TabularResultSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TabularResultSet")
            .field("fields", &self.fields)
            .field("records", &self.records.len())
            .finish()
    }
}

impl ResultSet for TabularResultSet {
    fn data_source(&self) -> Result<Arc<dyn DataSource>> {
        self.data_source.get()
    }

    fn number_of_records(&self) -> usize {
        self.records.len()
    }

    fn records_at_indexes(&self, indexes: &IndexSet) -> Result<Vec<Arc<dyn Record>>> {
        indexes.check_bounds(self.records.len())?;
        Ok(indexes.iter().map(|i| self.records[i].clone()).collect())
    }

    fn number_of_fields(&self) -> usize {
        self.fields.len()
    }

    fn identifier_for_field(&self, index: usize) -> Option<&str> {
        self.fields.get(index).map(|f| f.identifier.as_str())
    }

    fn value_type_for_field(&self, index: usize) -> Option<ValueType> {
        self.fields.get(index).and_then(|f| f.value_type)
    }

    fn sort_descriptor_prototype_for_field(&self, index: usize) -> Option<SortDescriptor> {
        self.fields.get(index).and_then(|f| f.sort_prototype.clone())
    }
}

/// Accumulates columns and rows, then freezes them into a [`TabularResultSet`]
pub struct ResultSetBuilder {
    data_source: BackRef<dyn DataSource>,
    fields: Vec<Field>,
    columns: Option<Arc<[String]>>,
    records: Vec<Arc<dyn Record>>,
}

impl ResultSetBuilder {
    pub fn new(data_source: BackRef<dyn DataSource>) -> Self {
        Self {
            data_source,
            fields: Vec::new(),
            columns: None,
            records: Vec::new(),
        }
    }

    pub fn field(mut self, identifier: impl Into<String>, value_type: Option<ValueType>) -> Self {
        self.push_field(identifier.into(), value_type);
        self
    }

    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = (S, Option<ValueType>)>,
        S: Into<String>,
    {
        for (identifier, value_type) in fields {
            self.push_field(identifier.into(), value_type);
        }
        self
    }

    /// Repeated identifiers get a `:n` suffix so every column stays reachable by key
    fn push_field(&mut self, identifier: String, value_type: Option<ValueType>) {
        let taken = |candidate: &str| self.fields.iter().any(|f| f.identifier == candidate);
        let identifier = if taken(&identifier) {
            let mut suffix = 1;
            while taken(&format!("{}:{}", identifier, suffix)) {
                suffix += 1;
            }
            format!("{}:{}", identifier, suffix)
        } else {
            identifier
        };
        self.fields.push(Field::new(identifier, value_type));
        self.columns = None;
    }

    fn column_index(&mut self) -> Arc<[String]> {
        match &self.columns {
            Some(columns) => columns.clone(),
            None => {
                let columns: Arc<[String]> = self
                    .fields
                    .iter()
                    .map(|f| f.identifier.clone())
                    .collect::<Vec<_>>()
                    .into();
                self.columns = Some(columns.clone());
                columns
            }
        }
    }

    /// Append a row; its width must match the declared fields
    pub fn push_row(&mut self, values: Vec<Value>) -> Result<()> {
        if values.len() != self.fields.len() {
            return Err(DataError::internal(format!(
                "Row has {} values but the result set has {} fields",
                values.len(),
                self.fields.len()
            )));
        }
        let columns = self.column_index();
        self.records.push(Arc::new(Row::new(columns, values)));
        Ok(())
    }

    pub fn row(mut self, values: Vec<Value>) -> Result<Self> {
        self.push_row(values)?;
        Ok(self)
    }

    /// Append an arbitrary record, e.g. one with children
    pub fn push_record(&mut self, record: Arc<dyn Record>) {
        self.records.push(record);
    }

    /// Shared column list for hand-built [`Row`]s
    pub fn columns(&mut self) -> Arc<[String]> {
        self.column_index()
    }

    /// Fill untyped fields from the first non-null value in each column
    pub fn infer_types(mut self) -> Self {
        for index in 0..self.fields.len() {
            if self.fields[index].value_type.is_some() {
                continue;
            }
            let identifier = self.fields[index].identifier.clone();
            let inferred = self.records.iter().find_map(|record| {
                record
                    .value_for_key(&identifier)
                    .and_then(|value| value.value_type())
            });
            if inferred.is_some() {
                self.fields[index] = Field::new(identifier, inferred);
            }
        }
        self
    }

    pub fn build(self) -> TabularResultSet {
        TabularResultSet {
            data_source: self.data_source,
            fields: self.fields,
            records: self.records,
        }
    }
}
