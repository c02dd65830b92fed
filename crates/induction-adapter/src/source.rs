use crate::database::Database;
use crate::error::{DataError, Result};
use crate::expression::Expression;
use crate::index_set::IndexSet;
use crate::result::ResultSet;
use crate::types::{Metadata, SourceListIcon};
use async_trait::async_trait;
use downcast_rs::{impl_downcast, Downcast};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Optional behaviors a data source may implement
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    /// Raw indexed access to the source's own records
    Explorable,
    /// Backend-native query text
    Queryable,
    /// Backend-side dimensional aggregation
    Visualizable,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::Explorable => write!(f, "explorable"),
            Capability::Queryable => write!(f, "queryable"),
            Capability::Visualizable => write!(f, "visualizable"),
        }
    }
}

/// Core trait that every data source implements.
///
/// Capabilities are probed through the `as_*` methods. A source that does not
/// override a probe simply does not have that capability; there are no
/// "unsupported" stubs to call.
pub trait DataSource: Send + Sync + Downcast {
    fn name(&self) -> &str;

    /// Record count at the time the database was enumerated
    fn number_of_records(&self) -> usize;

    /// The database that vends this source
    fn database(&self) -> Result<Arc<dyn Database>>;

    fn metadata(&self) -> Option<&Metadata> {
        None
    }

    fn source_list_icon(&self) -> Option<SourceListIcon> {
        None
    }

    fn as_explorable(&self) -> Option<&dyn Explorable> {
        None
    }

    fn as_queryable(&self) -> Option<&dyn Queryable> {
        None
    }

    fn as_visualizable(&self) -> Option<&dyn Visualizable> {
        None
    }

    /// Capabilities derived from the probes
    fn capabilities(&self) -> Vec<Capability> {
        let mut capabilities = Vec::new();
        if self.as_explorable().is_some() {
            capabilities.push(Capability::Explorable);
        }
        if self.as_queryable().is_some() {
            capabilities.push(Capability::Queryable);
        }
        if self.as_visualizable().is_some() {
            capabilities.push(Capability::Visualizable);
        }
        capabilities
    }

    fn supports(&self, capability: Capability) -> bool {
        match capability {
            Capability::Explorable => self.as_explorable().is_some(),
            Capability::Queryable => self.as_queryable().is_some(),
            Capability::Visualizable => self.as_visualizable().is_some(),
        }
    }
}

impl_downcast!(DataSource);

impl dyn DataSource {
    /// Probe that reports a missing capability as an error
    pub fn explorable(&self) -> Result<&dyn Explorable> {
        self.as_explorable()
            .ok_or(DataError::CapabilityAbsent(Capability::Explorable))
    }

    pub fn queryable(&self) -> Result<&dyn Queryable> {
        self.as_queryable()
            .ok_or(DataError::CapabilityAbsent(Capability::Queryable))
    }

    pub fn visualizable(&self) -> Result<&dyn Visualizable> {
        self.as_visualizable()
            .ok_or(DataError::CapabilityAbsent(Capability::Visualizable))
    }
}

/// Optional trait for sources whose records can be browsed by position
#[async_trait]
pub trait Explorable: DataSource {
    /// Fetch the records at `indexes`, in request order.
    /// Any index at or beyond the record count fails the whole fetch.
    async fn fetch_records(&self, indexes: &IndexSet) -> Result<Arc<dyn ResultSet>>;
}

/// Result of running query text
#[derive(Clone)]
pub struct QueryOutcome {
    pub result_set: Arc<dyn ResultSet>,
    /// Wall-clock execution time as measured by the backend
    pub elapsed: Duration,
}

impl fmt::Debug for QueryOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryOutcome")
            .field("records", &self.result_set.number_of_records())
            .field("fields", &self.result_set.number_of_fields())
            .field("elapsed", &self.elapsed)
            .finish()
    }
}

/// Optional trait for sources that execute backend-native query text
#[async_trait]
pub trait Queryable: DataSource {
    async fn fetch_query(&self, query: &str) -> Result<QueryOutcome>;

    /// Identifier of the query language, for highlighting and validation
    fn query_language(&self) -> Option<&str> {
        None
    }

    /// Query plans are only available from backends with a plan representation
    fn as_explainable(&self) -> Option<&dyn Explainable> {
        None
    }
}

/// Optional extension of [`Queryable`] that describes a query without running it
pub trait Explainable: Queryable {
    fn query_plan(&self, query: &str) -> Result<String>;
}

/// Optional trait for sources that aggregate on the backend side
#[async_trait]
pub trait Visualizable: DataSource {
    /// Group by `dimension` and compute each of `measures`.
    /// The result has the dimension column first, then one column per measure.
    async fn fetch_dimension(
        &self,
        dimension: &Expression,
        measures: &[Expression],
    ) -> Result<Arc<dyn ResultSet>>;
}
