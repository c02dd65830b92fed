use crate::context::{find_source, Context};
use crate::output::{print_result_set, OutputFormat};
use clap::Args;
use colored::Colorize;
use induction_adapter::DataError;
use serde_json::json;
use tracing::info;

#[derive(Args)]
pub struct QueryCommand {
    /// Connection URL
    pub url: String,

    /// Data source the query runs against, as `group/name` or a bare name
    pub source: String,

    /// Query text in the backend's own language
    pub query: String,

    /// Print the backend's query plan instead of running the query
    #[arg(long)]
    pub explain: bool,
}

impl QueryCommand {
    pub fn execute(self, context: &Context) -> anyhow::Result<()> {
        let rt = tokio::runtime::Runtime::new()?;

        rt.block_on(async move {
            let connection = context.connect(&self.url).await?;
            let database = connection.database()?;
            let source = find_source(database.as_ref(), &self.source)?;
            let queryable = source.queryable()?;

            if self.explain {
                let explainable = queryable.as_explainable().ok_or_else(|| {
                    DataError::unsupported(format!("{} has no query plans", source.name()))
                })?;
                let plan = explainable.query_plan(&self.query)?;
                match context.format {
                    OutputFormat::Json => println!(
                        "{}",
                        serde_json::to_string_pretty(&json!({ "plan": plan }))?
                    ),
                    OutputFormat::Text => println!("{}", plan),
                }
            } else {
                let outcome = queryable.fetch_query(&self.query).await?;
                info!(
                    "Query returned {} records in {:?}",
                    outcome.result_set.number_of_records(),
                    outcome.elapsed
                );
                print_result_set(outcome.result_set.as_ref(), context.format)?;
                if context.format == OutputFormat::Text {
                    println!(
                        "{} {:.3} ms",
                        "Elapsed:".bright_white().bold(),
                        outcome.elapsed.as_secs_f64() * 1000.0
                    );
                }
            }

            connection.close()?;
            Ok::<_, anyhow::Error>(())
        })
    }
}
