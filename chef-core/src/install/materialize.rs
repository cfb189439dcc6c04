// chef-core/src/install/materialize.rs
// Turns a download result into managed files under the bin and apps
// directories, and removes them again on uninstall.

use std::path::{Component, Path, PathBuf};

use chef_aio::fs::{
    copy_dir_recursive_async, copy_file_async, create_dir_all_async, create_symlink_async,
    remove_path_async, resolve_against, set_executable_async,
};
use chef_common::config::Config;
use chef_common::error::{ChefError, Result};
use chef_common::model::{InstallKind, InstallResult, StoreEntry};
use tracing::{debug, warn};

/// What ended up on disk for one install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Materialized {
    pub kind: InstallKind,
    /// Managed executable path; `None` for extern installs.
    pub binary: Option<PathBuf>,
}

fn require_exists(path: &Path, what: &str) -> Result<()> {
    if path.symlink_metadata().is_err() {
        return Err(ChefError::InstallError(format!(
            "{what} {} does not exist",
            path.display()
        )));
    }
    Ok(())
}

/// Resolves a stored `dir` marker under the apps directory. Anything but a
/// single plain path component is refused so cleanup never leaves the apps
/// directory.
fn managed_app_dir(config: &Config, name: &str, dir: &str) -> Option<PathBuf> {
    let mut components = Path::new(dir).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Some(config.app_dir_path(dir)),
        _ => {
            warn!("[{}] Ignoring unsafe app directory '{}' in store entry", name, dir);
            None
        }
    }
}

/// Places `result` (relative paths resolved against `work_dir`) under the
/// managed directories for `name`, replacing whatever `previous` left behind.
pub async fn materialize(
    config: &Config,
    name: &str,
    result: &InstallResult,
    work_dir: &Path,
    previous: Option<&StoreEntry>,
) -> Result<Materialized> {
    // Stale directory from an earlier directory-kind install, whatever comes next.
    let stale_dir = previous
        .and_then(StoreEntry::dir)
        .and_then(|old_dir| managed_app_dir(config, name, old_dir));
    if let Some(stale) = stale_dir {
        if remove_path_async(&stale).await? {
            debug!("[{}] Removed stale app directory {}", name, stale.display());
        }
    }

    let bin_path = config.binary_path(name);
    match result {
        InstallResult::Exe(path) => {
            let source = resolve_against(work_dir, path);
            require_exists(&source, "downloaded executable")?;
            create_dir_all_async(config.bin_dir()).await?;
            remove_path_async(&bin_path).await?;
            copy_file_async(&source, &bin_path).await?;
            set_executable_async(&bin_path).await?;
            debug!("[{}] Installed {}", name, bin_path.display());
            Ok(Materialized {
                kind: InstallKind::File,
                binary: Some(bin_path),
            })
        }
        InstallResult::Dir { path, exe } => {
            let source = resolve_against(work_dir, path);
            require_exists(&source, "downloaded directory")?;
            let app_dir = config.app_dir_path(name);
            remove_path_async(&app_dir).await?;
            copy_dir_recursive_async(&source, &app_dir).await?;

            let entry_point = app_dir.join(exe);
            require_exists(&entry_point, "entry point")?;
            set_executable_async(&entry_point).await?;
            remove_path_async(&bin_path).await?;
            create_symlink_async(&entry_point, &bin_path).await?;
            debug!(
                "[{}] Installed {} -> {}",
                name,
                bin_path.display(),
                entry_point.display()
            );
            Ok(Materialized {
                kind: InstallKind::Dir(name.to_string()),
                binary: Some(bin_path),
            })
        }
        InstallResult::Extern(command) => {
            if previous.is_some_and(|p| p.extern_command().is_none()) && remove_path_async(&bin_path).await? {
                debug!("[{}] Removed managed binary replaced by '{}'", name, command);
            }
            Ok(Materialized {
                kind: InstallKind::Extern(command.clone()),
                binary: None,
            })
        }
    }
}

/// Deletes the managed files an entry points at. Extern installs own nothing.
pub async fn remove_installed_files(config: &Config, name: &str, entry: &StoreEntry) -> Result<()> {
    match &entry.kind {
        InstallKind::File => {
            remove_path_async(&config.binary_path(name)).await?;
        }
        InstallKind::Dir(dir) => {
            remove_path_async(&config.binary_path(name)).await?;
            if let Some(app_dir) = managed_app_dir(config, name, dir) {
                remove_path_async(&app_dir).await?;
            }
        }
        InstallKind::Extern(_) => {}
    }
    Ok(())
}
