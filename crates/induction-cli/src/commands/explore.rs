use crate::context::{find_source, Context};
use crate::output::print_result_set;
use clap::Args;
use induction_adapter::IndexSet;
use tracing::debug;

#[derive(Args)]
pub struct ExploreCommand {
    /// Connection URL
    pub url: String,

    /// Data source as `group/name`, or a bare name
    pub source: String,

    /// Record indexes, e.g. `0-9,42`; defaults to the first `--limit` records
    #[arg(long)]
    pub indexes: Option<IndexSet>,

    /// Number of leading records to show when no indexes are given
    #[arg(long, default_value_t = 20)]
    pub limit: usize,
}

impl ExploreCommand {
    pub fn execute(self, context: &Context) -> anyhow::Result<()> {
        let rt = tokio::runtime::Runtime::new()?;

        rt.block_on(async move {
            let connection = context.connect(&self.url).await?;
            let database = connection.database()?;
            let source = find_source(database.as_ref(), &self.source)?;

            let indexes = match self.indexes {
                Some(indexes) => indexes,
                None => IndexSet::from_range(0..source.number_of_records().min(self.limit)),
            };
            debug!("Fetching {} records from {}", indexes.len(), source.name());

            let result_set = source.explorable()?.fetch_records(&indexes).await?;
            print_result_set(result_set.as_ref(), context.format)?;

            connection.close()?;
            Ok::<_, anyhow::Error>(())
        })
    }
}
