use crate::context::{find_source, Context};
use crate::output::print_result_set;
use clap::Args;
use induction_adapter::Expression;
use tracing::debug;

#[derive(Args)]
pub struct AggregateCommand {
    /// Connection URL
    pub url: String,

    /// Data source as `group/name`, or a bare name
    pub source: String,

    /// Per-record expression to group by, e.g. `country` or `lower(country)`
    #[arg(long)]
    pub dimension: Expression,

    /// Aggregate to compute per group; repeatable
    #[arg(long = "measure", default_value = "count(*)")]
    pub measures: Vec<Expression>,
}

impl AggregateCommand {
    pub fn execute(self, context: &Context) -> anyhow::Result<()> {
        let rt = tokio::runtime::Runtime::new()?;

        rt.block_on(async move {
            let connection = context.connect(&self.url).await?;
            let database = connection.database()?;
            let source = find_source(database.as_ref(), &self.source)?;

            Expression::validate_dimensional(&self.dimension, &self.measures)?;
            debug!(
                "Aggregating {} by {} with {} measures",
                source.name(),
                self.dimension,
                self.measures.len()
            );

            let result_set = source
                .visualizable()?
                .fetch_dimension(&self.dimension, &self.measures)
                .await?;
            print_result_set(result_set.as_ref(), context.format)?;

            connection.close()?;
            Ok::<_, anyhow::Error>(())
        })
    }
}
