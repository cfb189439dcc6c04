// chef-core/src/provider/recipe.rs
use std::sync::Arc;

use async_trait::async_trait;
use chef_common::error::Result;
use chef_common::model::{AppDescriptor, InstallResult};
use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::manager::ProviderManager;
use crate::recipe::{DownloadContext, Recipe};

/// A recipe advertised by a provider's `list` response. Every operation is
/// delegated back to the provider; installs are recorded as extern commands.
pub struct ProviderRecipe {
    provider: String,
    app: AppDescriptor,
    manager: Arc<ProviderManager>,
}

impl ProviderRecipe {
    pub fn new(provider: &str, app: AppDescriptor, manager: Arc<ProviderManager>) -> Self {
        Self {
            provider: provider.to_string(),
            app,
            manager,
        }
    }

    pub fn descriptor(&self) -> &AppDescriptor {
        &self.app
    }
}

#[async_trait]
impl Recipe for ProviderRecipe {
    fn name(&self) -> &str {
        &self.app.name
    }

    // Already known from `list`; no second round trip.
    async fn latest_version(&self, _cancel: &CancellationToken) -> Result<Option<String>> {
        Ok(self
            .app
            .latest_version
            .clone()
            .filter(|v| !v.is_empty()))
    }

    async fn download(&self, ctx: &DownloadContext) -> Result<InstallResult> {
        self.manager
            .update(
                &self.provider,
                &self.app.name,
                ctx.version(),
                ctx.force(),
                ctx.cancel_token(),
            )
            .await?;
        Ok(InstallResult::external(self.app.name.clone()))
    }

    async fn remove(&self, cancel: &CancellationToken) -> Result<()> {
        self.manager.remove(&self.provider, &self.app.name, cancel).await
    }

    async fn versions(&self, page: u32, cancel: &CancellationToken) -> Result<Option<Vec<String>>> {
        if !self.app.has_versions {
            return Ok(None);
        }
        self.manager
            .versions(&self.provider, &self.app.name, page, cancel)
            .await
            .map(Some)
    }

    fn has_versions(&self) -> bool {
        self.app.has_versions
    }

    fn description(&self) -> Option<String> {
        self.app.description.clone()
    }

    fn provider(&self) -> Option<&str> {
        Some(&self.provider)
    }
}

/// Recipes gathered from all providers, plus the providers that failed.
pub struct ProviderListing {
    pub recipes: Vec<Arc<dyn Recipe>>,
    pub failed: Vec<String>,
}

/// Lists every registered provider concurrently and turns the advertised
/// applications into recipes. A provider that fails is logged and skipped.
pub async fn provider_recipes(
    manager: &Arc<ProviderManager>,
    cancel: &CancellationToken,
) -> Result<ProviderListing> {
    let registrations = manager.registrations().await?;
    let lookups: Vec<_> = registrations
        .into_iter()
        .map(|registration| {
            let manager = Arc::clone(manager);
            let cancel = cancel.clone();
            async move {
                let listed = manager.list(&registration.name, &cancel).await;
                (registration.name, listed)
            }
        })
        .collect();
    let listings = join_all(lookups).await;

    let mut recipes: Vec<Arc<dyn Recipe>> = Vec::new();
    let mut failed = Vec::new();
    for (provider, listed) in listings {
        match listed {
            Ok(apps) => {
                debug!("[{}] Provider listed {} application(s)", provider, apps.len());
                recipes.extend(apps.into_iter().map(|app| {
                    Arc::new(ProviderRecipe::new(&provider, app, Arc::clone(manager))) as Arc<dyn Recipe>
                }));
            }
            Err(e) if e.is_cancelled() => return Err(e),
            Err(e) => {
                warn!("Skipping provider '{}': {}", provider, e);
                failed.push(provider);
            }
        }
    }
    Ok(ProviderListing { recipes, failed })
}
