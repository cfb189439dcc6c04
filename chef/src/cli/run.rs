use chef_common::error::{ChefError, Result};
use chef_core::Chef;
use clap::Args;
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Args, Debug, Clone)]
pub struct Run {
    /// Recipe to run
    pub name: String,

    /// Arguments appended after the recipe's default arguments
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

impl Run {
    pub async fn run(&self, chef: &Chef, cancel: &CancellationToken) -> Result<()> {
        let process = chef.run(&self.name, &self.args).await?;
        debug!("[{}] Started with pid {:?}", self.name, process.pid);

        let wait = process.wait();
        tokio::pin!(wait);
        let finished = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            status = &mut wait => Some(status),
        };
        let status = match finished {
            Some(status) => status?,
            None => {
                let signalled = chef.kill_all(&self.name);
                debug!("[{}] Interrupted; signalled {} process(es)", self.name, signalled);
                wait.await?;
                return Err(ChefError::Cancelled);
            }
        };
        if status.success() {
            Ok(())
        } else {
            Err(ChefError::CommandExecError(format!(
                "{} exited with {}",
                self.name, status
            )))
        }
    }
}
