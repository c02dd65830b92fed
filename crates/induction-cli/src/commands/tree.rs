use crate::context::Context;
use crate::output::OutputFormat;
use clap::Args;
use colored::Colorize;
use induction_adapter::{Database, SourceListIcon};
use serde_json::json;
use tracing::info;

#[derive(Args)]
pub struct TreeCommand {
    /// Connection URL, e.g. sqlite:///path/to/file.db or memory://local/shop
    pub url: String,

    /// Also list the other databases reachable through this connection
    #[arg(long)]
    pub databases: bool,
}

fn icon_marker(icon: Option<SourceListIcon>) -> &'static str {
    match icon {
        Some(SourceListIcon::Database) => "◆",
        Some(SourceListIcon::Table) => "▦",
        Some(SourceListIcon::Bucket) => "◎",
        Some(SourceListIcon::Gear) => "⚙",
        Some(SourceListIcon::View) => "◇",
        None => "·",
    }
}

fn tree_json(database: &dyn Database, others: &[String]) -> serde_json::Value {
    let groups: Vec<_> = database
        .data_source_groups()
        .into_iter()
        .map(|group| {
            let sources: Vec<_> = database
                .data_sources_in_group(&group)
                .iter()
                .map(|source| {
                    json!({
                        "name": source.name(),
                        "records": source.number_of_records(),
                        "icon": source.source_list_icon().map(|icon| icon.to_string()),
                        "capabilities": source.capabilities(),
                        "metadata": source.metadata(),
                    })
                })
                .collect();
            json!({ "name": group, "sources": sources })
        })
        .collect();

    json!({
        "database": database.name(),
        "metadata": database.metadata(),
        "groups": groups,
        "databases": others,
    })
}

fn print_tree(database: &dyn Database, others: &[String]) {
    println!();
    println!(
        "{} {}",
        "Database:".bright_white().bold(),
        database.name().bright_cyan()
    );

    for group in database.data_source_groups() {
        println!("  {}", group.bright_white().bold());
        for source in database.data_sources_in_group(&group) {
            let capabilities: Vec<String> =
                source.capabilities().iter().map(|c| c.to_string()).collect();
            println!(
                "    {} {} {} {}",
                icon_marker(source.source_list_icon()),
                source.name().bright_cyan(),
                format!("({} records)", source.number_of_records()).bright_white(),
                capabilities.join(", ").dimmed()
            );
        }
    }

    if !others.is_empty() {
        println!();
        println!("{}", "Databases:".bright_white().bold());
        for name in others {
            let marker = if name == database.name() { "*" } else { " " };
            println!("  {} {}", marker, name.bright_cyan());
        }
    }
    println!();
}

impl TreeCommand {
    pub fn execute(self, context: &Context) -> anyhow::Result<()> {
        let rt = tokio::runtime::Runtime::new()?;
        let connection = rt.block_on(context.connect(&self.url))?;
        let database = connection.database()?;
        info!("Loaded catalog of {}", database.name());

        let others = if self.databases {
            match connection.as_multi_database() {
                Some(multi) => multi.available_databases()?,
                None => anyhow::bail!("{} hosts a single database", self.url),
            }
        } else {
            Vec::new()
        };

        match context.format {
            OutputFormat::Json => println!(
                "{}",
                serde_json::to_string_pretty(&tree_json(database.as_ref(), &others))?
            ),
            OutputFormat::Text => print_tree(database.as_ref(), &others),
        }

        connection.close()?;
        Ok(())
    }
}
