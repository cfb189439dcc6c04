// chef-core/src/desktop.rs
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chef_aio::fs::{atomic_write_file_async, remove_path_async};
use chef_common::error::Result;
use chef_common::model::DesktopFile;
use tracing::debug;

/// Creates and removes launcher entries for installed artifacts.
#[async_trait]
pub trait DesktopEntries: Send + Sync {
    async fn create(&self, name: &str, desktop: &DesktopFile, exec: &str) -> Result<()>;
    async fn remove(&self, name: &str) -> Result<()>;
}

/// Writes freedesktop.org `.desktop` files into an applications directory.
#[derive(Debug, Clone)]
pub struct XdgDesktopEntries {
    dir: PathBuf,
}

impl XdgDesktopEntries {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn entry_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("chef-{name}.desktop"))
    }
}

fn render(name: &str, desktop: &DesktopFile, exec: &str) -> String {
    let mut out = String::from("[Desktop Entry]\nType=Application\n");
    out.push_str(&format!("Name={}\n", desktop.name.as_deref().unwrap_or(name)));
    if let Some(comment) = &desktop.comment {
        out.push_str(&format!("Comment={comment}\n"));
    }
    out.push_str(&format!("Exec={exec}\n"));
    if let Some(icon) = &desktop.icon {
        out.push_str(&format!("Icon={icon}\n"));
    }
    if !desktop.categories.is_empty() {
        out.push_str(&format!("Categories={};\n", desktop.categories.join(";")));
    }
    out.push_str(&format!("Terminal={}\n", desktop.terminal));
    out
}

#[async_trait]
impl DesktopEntries for XdgDesktopEntries {
    async fn create(&self, name: &str, desktop: &DesktopFile, exec: &str) -> Result<()> {
        let path = self.entry_path(name);
        debug!("Writing launcher entry {}", path.display());
        atomic_write_file_async(&path, render(name, desktop, exec).into_bytes()).await
    }

    async fn remove(&self, name: &str) -> Result<()> {
        let path = self.entry_path(name);
        if remove_path_async(&path).await? {
            debug!("Removed launcher entry {}", path.display());
        }
        Ok(())
    }
}

/// Used where no launcher integration is wanted, e.g. tests and headless hosts.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoDesktopEntries;

#[async_trait]
impl DesktopEntries for NoDesktopEntries {
    async fn create(&self, _name: &str, _desktop: &DesktopFile, _exec: &str) -> Result<()> {
        Ok(())
    }

    async fn remove(&self, _name: &str) -> Result<()> {
        Ok(())
    }
}

/// Quotes an executable path for an `Exec=` line when it contains spaces.
pub fn exec_line(path: &Path) -> String {
    let raw = path.display().to_string();
    if raw.contains(' ') {
        format!("\"{raw}\"")
    } else {
        raw
    }
}
