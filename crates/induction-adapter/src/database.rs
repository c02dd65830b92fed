use crate::connection::Connection;
use crate::error::{DataError, Result};
use crate::source::DataSource;
use crate::types::Metadata;
use downcast_rs::{impl_downcast, Downcast};
use std::sync::Arc;

/// Named container that presents its data sources in ordered, named groups
pub trait Database: Send + Sync + Downcast {
    /// The connection that exposes this database
    fn connection(&self) -> Result<Arc<dyn Connection>>;

    fn name(&self) -> &str;

    fn number_of_data_source_groups(&self) -> usize;

    fn data_source_group_at_index(&self, index: usize) -> Option<&str>;

    fn number_of_data_sources_in_group(&self, group: &str) -> usize;

    fn data_source_in_group(&self, group: &str, index: usize) -> Option<Arc<dyn DataSource>>;

    fn metadata(&self) -> Option<&Metadata> {
        None
    }

    /// Group names in presentation order
    fn data_source_groups(&self) -> Vec<String> {
        (0..self.number_of_data_source_groups())
            .filter_map(|i| self.data_source_group_at_index(i).map(str::to_string))
            .collect()
    }

    /// Every data source of `group`, in presentation order
    fn data_sources_in_group(&self, group: &str) -> Vec<Arc<dyn DataSource>> {
        (0..self.number_of_data_sources_in_group(group))
            .filter_map(|i| self.data_source_in_group(group, i))
            .collect()
    }

    /// Look a data source up by group and name
    fn find_data_source(&self, group: &str, name: &str) -> Result<Arc<dyn DataSource>> {
        if !self.data_source_groups().iter().any(|g| g == group) {
            return Err(DataError::not_found(format!(
                "Group '{}' in database '{}'",
                group,
                self.name()
            )));
        }
        self.data_sources_in_group(group)
            .into_iter()
            .find(|source| source.name() == name)
            .ok_or_else(|| DataError::not_found(format!("Data source '{}' in group '{}'", name, group)))
    }
}

impl_downcast!(Database);

/// Ordered catalog of named groups, each holding ordered data sources.
///
/// Group names are unique; construction rejects duplicates. Once built the
/// catalog never changes, which keeps enumeration stable for a session.
#[derive(Clone, Default)]
pub struct DataSourceGroups {
    groups: Vec<(String, Vec<Arc<dyn DataSource>>)>,
}

impl DataSourceGroups {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a group at the end of the presentation order
    pub fn push_group(
        &mut self,
        name: impl Into<String>,
        sources: Vec<Arc<dyn DataSource>>,
    ) -> Result<()> {
        let name = name.into();
        if self.groups.iter().any(|(existing, _)| *existing == name) {
            return Err(DataError::invalid_configuration(format!(
                "Duplicate data source group '{}'",
                name
            )));
        }
        self.groups.push((name, sources));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn group_at(&self, index: usize) -> Option<&str> {
        self.groups.get(index).map(|(name, _)| name.as_str())
    }

    fn sources(&self, group: &str) -> Option<&[Arc<dyn DataSource>]> {
        self.groups
            .iter()
            .find(|(name, _)| name == group)
            .map(|(_, sources)| sources.as_slice())
    }

    pub fn count_in(&self, group: &str) -> usize {
        self.sources(group).map_or(0, |s| s.len())
    }

    pub fn source_at(&self, group: &str, index: usize) -> Option<Arc<dyn DataSource>> {
        self.sources(group).and_then(|s| s.get(index).cloned())
    }

    /// Every data source, group by group
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<dyn DataSource>)> {
        self.groups
            .iter()
            .flat_map(|(name, sources)| sources.iter().map(move |s| (name.as_str(), s)))
    }
}
