use chef_common::error::Result;
use chef_core::Chef;
use clap::Args;
use colored::Colorize;
use tokio_util::sync::CancellationToken;

use crate::status::{kind_label, StatusDisplay};

#[derive(Args, Debug, Clone)]
pub struct Install {
    /// Recipe to install
    pub name: String,

    /// Exact version to install, replacing whatever is installed
    #[arg(long = "version", id = "pin", value_name = "VERSION")]
    pub version: String,
}

impl Install {
    pub async fn run(&self, chef: &Chef, cancel: &CancellationToken) -> Result<()> {
        let display = StatusDisplay::start(chef.subscribe());
        let result = chef.install_version(&self.name, &self.version, cancel).await;
        display.finish().await;
        let entry = result?;
        println!(
            "Installed {} {} ({})",
            self.name.green(),
            entry.version,
            kind_label(&entry.kind)
        );
        Ok(())
    }
}
