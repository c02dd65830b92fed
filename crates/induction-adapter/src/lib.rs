//! # induction-adapter
//!
//! Core contract between a database browser and the backends it talks to.
//!
//! This crate defines the seam; it performs no network or disk I/O itself.
//! Backends are plugins written against these traits:
//! - `induction-memory` - in-memory reference backend
//! - `induction-sqlite` - SQLite files
//!
//! ## Architecture
//!
//! - **Adapter**: stateless factory that turns a URL into a connection
//! - **Connection**: open channel with an Unopened → Open → Closed lifecycle
//! - **Database**: ordered, named groups of data sources
//! - **DataSource**: named, countable entity that produces result sets
//! - **Explorable**: optional capability for indexed record access
//! - **Queryable**: optional capability for backend-native query text
//! - **Visualizable**: optional capability for dimensional aggregation
//! - **ResultSet**: immutable snapshot of records and typed columns
//!
//! ## Example
//!
//! ```rust,no_run
//! use induction_adapter::{AdapterRegistry, IndexSet};
//!
//! # async fn example(registry: AdapterRegistry) -> induction_adapter::Result<()> {
//! let connection = registry.connect_str("sqlite:///tmp/a.db").await?;
//! let database = connection.database()?;
//!
//! for group in database.data_source_groups() {
//!     for source in database.data_sources_in_group(&group) {
//!         // Probe capabilities instead of calling and catching "unsupported"
//!         if let Some(explorable) = source.as_explorable() {
//!             let page = explorable.fetch_records(&IndexSet::from_range(0..10)).await?;
//!             println!("{}: {} records", source.name(), page.number_of_records());
//!         }
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Backend Implementation
//!
//! To implement a new backend:
//!
//! 1. Implement `DataSource` and whichever capability traits the backend supports
//! 2. Override the matching `as_*` probes to return `Some(self)`
//! 3. Implement `Database` (usually on top of `DataSourceGroups`)
//! 4. Implement `Connection` (usually on top of `ConnectionLifecycle`)
//! 5. Implement `Adapter` and register it with `AdapterRegistry`

pub mod adapter;
pub mod backref;
pub mod completion;
pub mod connection;
pub mod database;
pub mod error;
pub mod expression;
pub mod index_set;
pub mod registry;
pub mod result;
pub mod source;
pub mod types;

// Re-export commonly used items
pub use adapter::{redact_url, Adapter};
pub use backref::BackRef;
pub use connection::{Connection, ConnectionLifecycle, ConnectionState, MultiDatabase};
pub use database::{DataSourceGroups, Database};
pub use error::{DataError, ErrorKind, Result};
pub use expression::{AggregateFunction, Expression};
pub use index_set::IndexSet;
pub use registry::AdapterRegistry;
pub use result::{Field, Record, ResultSet, ResultSetBuilder, Row, TabularResultSet};
pub use source::{
    Capability, DataSource, Explainable, Explorable, QueryOutcome, Queryable, Visualizable,
};
pub use types::{Metadata, SortDescriptor, SourceListIcon, Value, ValueType};

pub use url::Url;
