// chef-core/src/pipeline/worker.rs
use std::sync::Arc;

use chef_aio::fs::create_dir_all_async;
use chef_common::error::{ChefError, Result};
use chef_common::model::{InstallKind, StoreEntry};
use chef_common::ChefEvent;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::context::CoreContext;
use crate::desktop::exec_line;
use crate::install::materialize;
use crate::recipe::{DownloadContext, Recipe};

/// Installs one recipe at `version`: download into a scratch directory,
/// materialize, run the post-install hook, create the launcher entry and
/// record the result. The store is only written when every step succeeded.
#[instrument(skip_all, fields(name = recipe.name(), version = version))]
pub async fn install_artifact(
    ctx: &CoreContext,
    recipe: &Arc<dyn Recipe>,
    version: &str,
    previous: Option<&StoreEntry>,
    force: bool,
    cancel: &CancellationToken,
) -> Result<StoreEntry> {
    let name = recipe.name();
    ctx.events.emit(ChefEvent::InstallStarted {
        name: name.to_string(),
        version: version.to_string(),
    });

    let tmp_root = ctx.config.tmp_dir();
    create_dir_all_async(&tmp_root).await?;
    // Removed on drop, on every exit path.
    let work_dir = tempfile::Builder::new()
        .prefix(&format!("{name}-"))
        .tempdir_in(&tmp_root)?;
    debug!("[{}] Working directory {}", name, work_dir.path().display());

    let download = DownloadContext::new(
        name,
        version,
        force,
        work_dir.path().to_path_buf(),
        cancel.clone(),
        ctx.events.clone(),
        ctx.http.clone(),
    );
    let result = recipe.download(&download).await.map_err(|e| match e {
        ChefError::Cancelled | ChefError::DownloadFailed(..) => e,
        other => ChefError::DownloadFailed(name.to_string(), other.to_string()),
    })?;
    debug!("[{}] Download produced {:?}", name, result);

    let done = materialize(&ctx.config, name, &result, work_dir.path(), previous).await?;
    if let Some(binary) = &done.binary {
        recipe.post_install(binary).await?;
    }

    if let Some(desktop) = recipe.desktop_file() {
        let exec = match (&done.binary, &done.kind) {
            (Some(binary), _) => exec_line(binary),
            (None, InstallKind::Extern(command)) => command.clone(),
            (None, _) => name.to_string(),
        };
        if let Err(e) = ctx.desktop.create(name, &desktop, &exec).await {
            warn!("[{}] Could not create launcher entry: {}", name, e);
        }
    }

    let entry = StoreEntry::new(version, done.kind);
    ctx.store.set_entry(name, entry.clone()).await?;
    info!("[{}] Installed version {}", name, version);
    Ok(entry)
}
