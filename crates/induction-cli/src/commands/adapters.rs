use crate::context::Context;
use crate::output::OutputFormat;
use clap::Args;
use colored::Colorize;
use serde_json::json;

#[derive(Args)]
pub struct AdaptersCommand {}

impl AdaptersCommand {
    pub fn execute(self, context: &Context) -> anyhow::Result<()> {
        let backends = context.registry.list_backends();

        match context.format {
            OutputFormat::Json => {
                let list: Vec<_> = backends
                    .iter()
                    .map(|(name, scheme)| json!({ "name": name, "scheme": scheme }))
                    .collect();
                println!("{}", serde_json::to_string_pretty(&list)?);
            }
            OutputFormat::Text => {
                println!();
                for (name, scheme) in &backends {
                    println!(
                        "  {} {}",
                        format!("{}://", scheme).bright_cyan(),
                        name.bright_white().bold()
                    );
                }
                println!();
                println!(
                    "{} {}",
                    "Total adapters:".bright_white().bold(),
                    backends.len().to_string().bright_cyan()
                );
            }
        }
        Ok(())
    }
}
