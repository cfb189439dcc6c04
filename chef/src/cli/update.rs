//! Contains the logic for the `update` and `check` commands.
use chef_common::error::{ChefError, Result};
use chef_core::{Chef, UpdateOptions};
use clap::Args;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::status::{print_update_report, StatusDisplay};

#[derive(Args, Debug, Clone)]
pub struct Update {
    /// Recipes to update (all recipes when omitted)
    pub names: Vec<String>,

    /// Reinstall even when the stored version is already the latest
    #[arg(long, short)]
    pub force: bool,

    /// Leave this recipe untouched
    #[arg(long, value_name = "NAME")]
    pub skip: Option<String>,

    /// Only report what would be updated
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Args, Debug, Clone)]
pub struct Check {
    /// Recipes to check (all recipes when omitted)
    pub names: Vec<String>,
}

impl Update {
    pub async fn run(&self, chef: &Chef, cancel: &CancellationToken) -> Result<()> {
        let options = UpdateOptions {
            targets: self.names.clone(),
            force: self.force,
            skip: self.skip.clone(),
            dry_run: self.dry_run,
        };
        run_update(chef, &options, cancel).await
    }
}

impl Check {
    pub async fn run(&self, chef: &Chef, cancel: &CancellationToken) -> Result<()> {
        let options = UpdateOptions {
            targets: self.names.clone(),
            dry_run: true,
            ..Default::default()
        };
        run_update(chef, &options, cancel).await
    }
}

async fn run_update(chef: &Chef, options: &UpdateOptions, cancel: &CancellationToken) -> Result<()> {
    debug!("Running update with {:?}", options);
    let display = StatusDisplay::start(chef.subscribe());
    let result = chef.update(options, cancel).await;
    display.finish().await;
    let report = result?;

    print_update_report(&report);
    if report.cancelled {
        return Err(ChefError::Cancelled);
    }
    if !report.is_success() {
        return Err(ChefError::InstallError(format!(
            "{} install(s) failed, {} version check(s) failed",
            report.failed, report.errors
        )));
    }
    Ok(())
}
