use chef_common::error::{ChefError, Result};
use chef_core::Chef;
use clap::Args;
use colored::Colorize;
use tokio_util::sync::CancellationToken;
use tracing::error;

#[derive(Args, Debug, Clone)]
pub struct Uninstall {
    /// The recipes to uninstall
    #[arg(required = true)]
    pub names: Vec<String>,
}

impl Uninstall {
    pub async fn run(&self, chef: &Chef, cancel: &CancellationToken) -> Result<()> {
        let mut failed = Vec::new();
        for name in &self.names {
            if cancel.is_cancelled() {
                return Err(ChefError::Cancelled);
            }
            match chef.uninstall(name, cancel).await {
                Ok(entry) => println!("✓ Uninstalled {} {}", name.green(), entry.version),
                Err(e) if e.is_cancelled() => return Err(e),
                Err(e) => {
                    error!("✖ Failed to uninstall '{}': {}", name, e);
                    failed.push(name.as_str());
                }
            }
        }
        if failed.is_empty() {
            Ok(())
        } else {
            Err(ChefError::Generic(format!(
                "failed to uninstall: {}",
                failed.join(", ")
            )))
        }
    }
}
