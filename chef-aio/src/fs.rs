// chef-aio/src/fs.rs
// Filesystem primitives used by the store and the installer. Blocking work runs
// on tokio's blocking pool.
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chef_common::error::{ChefError, Result};
use tempfile::NamedTempFile;
use tracing::{debug, error};
use walkdir::WalkDir;

async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ChefError::Generic(format!("blocking filesystem task failed: {e}")))?
}

/// Creates a directory and all its parent components if they are missing.
pub async fn create_dir_all_async(path: &Path) -> Result<()> {
    debug!("Creating directory recursively: {}", path.display());
    tokio::fs::create_dir_all(path).await.map_err(|e| {
        error!("Failed create dir {}: {}", path.display(), e);
        ChefError::from(e)
    })
}

/// Reads the entire contents of a file. A missing file yields `Ok(None)`.
pub async fn read_optional_async(path: &Path) -> Result<Option<Vec<u8>>> {
    debug!("Reading file: {}", path.display());
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => {
            error!("Failed read file {}: {}", path.display(), e);
            Err(ChefError::from(e))
        }
    }
}

/// Atomically writes data to a file using a temporary file in the same directory.
/// Parent directories are created when missing.
pub fn atomic_write_file(original_path: &Path, content: &[u8]) -> Result<()> {
    let dir = original_path.parent().ok_or_else(|| {
        ChefError::Generic(format!(
            "Cannot get parent directory for {}",
            original_path.display()
        ))
    })?;
    fs::create_dir_all(dir)?;

    let mut temp_file = NamedTempFile::new_in(dir)?;
    let temp_path = temp_file.path().to_path_buf();

    debug!(
        "Atomically writing {} bytes to {} via temp file {}",
        content.len(),
        original_path.display(),
        temp_path.display()
    );

    temp_file.write_all(content)?;
    temp_file.flush()?;
    temp_file.as_file().sync_all()?;

    temp_file.persist(original_path).map_err(|e| {
        error!(
            "Failed to persist temporary file {} over {}: {}",
            temp_path.display(),
            original_path.display(),
            e.error
        );
        ChefError::Io(Arc::new(e.error))
    })?;
    Ok(())
}

pub async fn atomic_write_file_async(path: &Path, content: Vec<u8>) -> Result<()> {
    let path = path.to_path_buf();
    blocking(move || atomic_write_file(&path, &content)).await
}

/// Copies a single file, creating the destination's parent directory.
pub async fn copy_file_async(source: &Path, dest: &Path) -> Result<u64> {
    debug!("Copying {} -> {}", source.display(), dest.display());
    if let Some(parent) = dest.parent() {
        create_dir_all_async(parent).await?;
    }
    tokio::fs::copy(source, dest).await.map_err(|e| {
        error!(
            "Failed copy {} -> {}: {}",
            source.display(),
            dest.display(),
            e
        );
        ChefError::from(e)
    })
}

/// Recursively copies `source` into a fresh directory at `dest`. Symlinks are
/// recreated, not followed.
pub fn copy_dir_recursive(source: &Path, dest: &Path) -> Result<()> {
    debug!(
        "Copying directory {} -> {}",
        source.display(),
        dest.display()
    );
    for entry in WalkDir::new(source).follow_links(false) {
        let entry = entry.map_err(|e| {
            ChefError::Io(Arc::new(
                e.into_io_error()
                    .unwrap_or_else(|| io::Error::other("directory walk failed")),
            ))
        })?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(|e| ChefError::Generic(format!("walk escaped {}: {e}", source.display())))?;
        let target = dest.join(relative);
        let file_type = entry.file_type();
        if file_type.is_dir() {
            fs::create_dir_all(&target)?;
        } else if file_type.is_symlink() {
            let link_target = fs::read_link(entry.path())?;
            create_symlink(&link_target, &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

pub async fn copy_dir_recursive_async(source: &Path, dest: &Path) -> Result<()> {
    let (source, dest) = (source.to_path_buf(), dest.to_path_buf());
    blocking(move || copy_dir_recursive(&source, &dest)).await
}

/// Removes a file, symlink or directory tree without following symlinks.
/// Returns `false` when nothing existed at `path`.
pub fn remove_path(path: &Path) -> Result<bool> {
    let metadata = match path.symlink_metadata() {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(ChefError::from(e)),
    };
    let file_type = metadata.file_type();
    debug!(
        "Removing filesystem artifact ({}) at: {}",
        if file_type.is_dir() {
            "directory"
        } else if file_type.is_symlink() {
            "symlink"
        } else {
            "file"
        },
        path.display()
    );
    let result = if file_type.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    match result {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => {
            error!("Failed to remove {}: {}", path.display(), e);
            Err(ChefError::from(e))
        }
    }
}

pub async fn remove_path_async(path: &Path) -> Result<bool> {
    let path = path.to_path_buf();
    blocking(move || remove_path(&path)).await
}

/// Creates a symbolic link. Unix only.
#[cfg(unix)]
pub fn create_symlink(target: &Path, link: &Path) -> Result<()> {
    debug!("Creating symlink {} -> {}", link.display(), target.display());
    std::os::unix::fs::symlink(target, link).map_err(|e| {
        error!(
            "Failed create symlink {} -> {}: {}",
            link.display(),
            target.display(),
            e
        );
        ChefError::from(e)
    })
}

#[cfg(not(unix))]
pub fn create_symlink(target: &Path, link: &Path) -> Result<()> {
    tracing::warn!(
        "Symlink creation not supported on this platform: {} -> {}",
        link.display(),
        target.display()
    );
    Err(ChefError::Generic(
        "Symlinks not supported on this platform".to_string(),
    ))
}

pub async fn create_symlink_async(target: &Path, link: &Path) -> Result<()> {
    let (target, link) = (target.to_path_buf(), link.to_path_buf());
    blocking(move || {
        if let Some(parent) = link.parent() {
            fs::create_dir_all(parent)?;
        }
        create_symlink(&target, &link)
    })
    .await
}

/// Marks a file executable (0o755). No-op off unix.
#[cfg(unix)]
pub async fn set_executable_async(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    debug!("Setting executable bit on {}", path.display());
    tokio::fs::set_permissions(path, fs::Permissions::from_mode(0o755))
        .await
        .map_err(|e| {
            error!("Failed set permissions on {}: {}", path.display(), e);
            ChefError::from(e)
        })
}

#[cfg(not(unix))]
pub async fn set_executable_async(path: &Path) -> Result<()> {
    tracing::warn!(
        "Setting permissions not supported on this platform: {}",
        path.display()
    );
    Ok(())
}

/// Resolves `path` against `base` unless it is already absolute.
pub fn resolve_against(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
