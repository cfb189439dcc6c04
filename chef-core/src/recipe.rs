// chef-core/src/recipe.rs
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chef_common::error::Result;
use chef_common::model::{DesktopFile, InstallResult};
use chef_common::ChefEvent;
use tokio_util::sync::CancellationToken;

use crate::events::Events;

/// One named, independently installable unit.
///
/// Embedding programs implement this for their native recipes; provider-backed
/// recipes are synthesized by [`crate::provider::ProviderRecipe`].
#[async_trait]
pub trait Recipe: Send + Sync {
    fn name(&self) -> &str;

    /// Latest available version, or `None` when the source cannot tell.
    async fn latest_version(&self, cancel: &CancellationToken) -> Result<Option<String>>;

    /// Fetches the artifact for `ctx.version()`. Runs inside a fresh, empty
    /// working directory; relative paths in the result resolve against it.
    async fn download(&self, ctx: &DownloadContext) -> Result<InstallResult>;

    /// Side-effect hook run after a local install with the managed binary path.
    async fn post_install(&self, _binary: &Path) -> Result<()> {
        Ok(())
    }

    /// Hook run when the artifact is uninstalled, before local files are removed.
    async fn remove(&self, _cancel: &CancellationToken) -> Result<()> {
        Ok(())
    }

    /// Lists installable versions, page by page, when the source supports it.
    async fn versions(&self, _page: u32, _cancel: &CancellationToken) -> Result<Option<Vec<String>>> {
        Ok(None)
    }

    fn has_versions(&self) -> bool {
        false
    }

    /// Default arguments prepended to caller-supplied ones on `run`.
    fn cmd_args(&self) -> Vec<String> {
        Vec::new()
    }

    fn cmd_env(&self) -> HashMap<String, String> {
        HashMap::new()
    }

    fn change_log(&self, _version: &str) -> Option<String> {
        None
    }

    fn description(&self) -> Option<String> {
        None
    }

    fn desktop_file(&self) -> Option<DesktopFile> {
        None
    }

    /// Name of the provider backing this recipe, if any.
    fn provider(&self) -> Option<&str> {
        None
    }
}

/// Everything a download routine gets to work with.
pub struct DownloadContext {
    name: String,
    version: String,
    force: bool,
    work_dir: PathBuf,
    cancel: CancellationToken,
    events: Events,
    http: reqwest::Client,
}

impl DownloadContext {
    pub fn new(
        name: &str,
        version: &str,
        force: bool,
        work_dir: PathBuf,
        cancel: CancellationToken,
        events: Events,
        http: reqwest::Client,
    ) -> Self {
        Self {
            name: name.to_string(),
            version: version.to_string(),
            force,
            work_dir,
            cancel,
            events,
            http,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn force(&self) -> bool {
        self.force
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn report_progress(&self, loaded: u64, total: Option<u64>) {
        self.events.emit(ChefEvent::Progress {
            name: self.name.clone(),
            loaded,
            total,
        });
    }

    /// Downloads `url` into the working directory as `file_name`, reporting
    /// progress and honouring cancellation.
    pub async fn fetch(&self, url: &str, file_name: &str) -> Result<PathBuf> {
        let dest = self.work_dir.join(file_name);
        chef_net::download_file(&self.http, url, &dest, &self.cancel, |loaded, total| {
            self.report_progress(loaded, total)
        })
        .await?;
        Ok(dest)
    }

    pub async fn fetch_text(&self, url: &str) -> Result<String> {
        chef_net::fetch_text(&self.http, url, &self.cancel).await
    }
}
