// chef-core/src/uninstall.rs
use chef_common::error::{ChefError, Result};
use chef_common::model::StoreEntry;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::context::CoreContext;
use crate::install::remove_installed_files;

/// Removes an installed recipe: the provider (if any) is asked first, then the
/// managed files and launcher entry go, and the store entry last.
#[instrument(skip(ctx, cancel))]
pub async fn uninstall(ctx: &CoreContext, name: &str, cancel: &CancellationToken) -> Result<StoreEntry> {
    let recipe = ctx
        .registry
        .get(name)
        .ok_or_else(|| ChefError::UnknownRecipe(name.to_string()))?;
    let entry = ctx
        .store
        .get_entry(name)
        .await?
        .ok_or_else(|| ChefError::NotInstalled(name.to_string()))?;

    recipe.remove(cancel).await?;
    remove_installed_files(&ctx.config, name, &entry).await?;
    if let Err(e) = ctx.desktop.remove(name).await {
        warn!("[{}] Could not remove launcher entry: {}", name, e);
    }
    ctx.store.remove_entry(name).await?;
    info!("[{}] Uninstalled version {}", name, entry.version);
    Ok(entry)
}
