use chef_common::error::Result;
use chef_core::Chef;
use clap::Args;
use colored::Colorize;
use tokio_util::sync::CancellationToken;

#[derive(Args, Debug, Clone)]
pub struct Versions {
    /// Recipe whose versions to list
    pub name: String,

    /// Page of results to fetch
    #[arg(long, default_value_t = 1)]
    pub page: u32,
}

impl Versions {
    pub async fn run(&self, chef: &Chef, cancel: &CancellationToken) -> Result<()> {
        let versions = chef.versions(&self.name, self.page, cancel).await?;
        if versions.is_empty() {
            println!("{}", format!("No versions on page {}", self.page).yellow());
            return Ok(());
        }
        let installed = chef.store().get_entry(&self.name).await?.map(|e| e.version);
        for version in versions {
            if installed.as_deref() == Some(version.as_str()) {
                println!("{} {}", version.green().bold(), "(installed)".dimmed());
            } else {
                println!("{version}");
            }
        }
        Ok(())
    }
}
