use chef_common::error::Result;
use chef_common::model::ProviderRegistration;
use chef_core::Chef;
use clap::Subcommand;
use colored::Colorize;
use prettytable::{format, Cell, Row, Table};
use tokio_util::sync::CancellationToken;

#[derive(Subcommand, Debug, Clone)]
pub enum ProviderCommand {
    /// Register (or replace) a provider command line
    Add {
        name: String,
        /// Shell command that speaks the provider protocol when given `--chef`
        command: String,
    },
    /// Forget a provider
    Remove { name: String },
    /// Show registered providers
    List,
}

impl ProviderCommand {
    pub async fn run(&self, chef: &Chef, cancel: &CancellationToken) -> Result<()> {
        match self {
            Self::Add { name, command } => {
                chef.add_provider(ProviderRegistration {
                    name: name.clone(),
                    command: command.clone(),
                })
                .await?;
                let count = chef.refresh_providers(cancel).await?;
                println!(
                    "Registered provider {} ({} recipe(s) known)",
                    name.green(),
                    count
                );
                Ok(())
            }
            Self::Remove { name } => {
                if chef.remove_provider(name).await? {
                    println!("Removed provider {}", name.green());
                } else {
                    println!("{}", format!("No provider named '{name}'").yellow());
                }
                Ok(())
            }
            Self::List => {
                let providers = chef.providers().await?;
                if providers.is_empty() {
                    println!("{}", "No providers registered".yellow());
                    return Ok(());
                }
                let mut table = Table::new();
                table.set_format(*format::consts::FORMAT_NO_BORDER_LINE_SEPARATOR);
                table.add_row(Row::new(vec![
                    Cell::new("Name").style_spec("b"),
                    Cell::new("Command").style_spec("b"),
                ]));
                for provider in &providers {
                    table.add_row(Row::new(vec![
                        Cell::new(&provider.name).style_spec("Fb"),
                        Cell::new(&provider.command),
                    ]));
                }
                table.printstd();
                Ok(())
            }
        }
    }
}
