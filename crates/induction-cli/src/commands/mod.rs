pub mod adapters;
pub mod aggregate;
pub mod explore;
pub mod query;
pub mod tree;

pub use adapters::AdaptersCommand;
pub use aggregate::AggregateCommand;
pub use explore::ExploreCommand;
pub use query::QueryCommand;
pub use tree::TreeCommand;
