// Shared fixtures for the chef-core integration tests.
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chef_common::error::{ChefError, Result};
use chef_common::model::{DesktopFile, InstallResult};
use chef_common::Config;
use chef_core::{
    Chef, DesktopEntries, DownloadContext, NoDesktopEntries, ProviderLauncher, Recipe,
};
use tokio_util::sync::CancellationToken;

/// What a [`TestRecipe`] download produces.
#[derive(Clone)]
pub enum Output {
    Exe,
    Dir,
    Extern(String),
    Fail,
}

pub struct TestRecipe {
    name: String,
    latest: Mutex<Option<String>>,
    output: Mutex<Output>,
    pub downloads: AtomicUsize,
    pub post_installs: AtomicUsize,
    fail_post_install: AtomicBool,
    desktop: Mutex<Option<DesktopFile>>,
    /// Cancelled once this recipe's download has finished.
    cancel_after: Option<CancellationToken>,
}

impl TestRecipe {
    pub fn new(name: &str, latest: Option<&str>, output: Output) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            latest: Mutex::new(latest.map(str::to_string)),
            output: Mutex::new(output),
            downloads: AtomicUsize::new(0),
            post_installs: AtomicUsize::new(0),
            fail_post_install: AtomicBool::new(false),
            desktop: Mutex::new(None),
            cancel_after: None,
        })
    }

    pub fn cancelling(name: &str, latest: &str, token: CancellationToken) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            latest: Mutex::new(Some(latest.to_string())),
            output: Mutex::new(Output::Exe),
            downloads: AtomicUsize::new(0),
            post_installs: AtomicUsize::new(0),
            fail_post_install: AtomicBool::new(false),
            desktop: Mutex::new(None),
            cancel_after: Some(token),
        })
    }

    pub fn set_latest(&self, latest: &str) {
        *self.latest.lock().unwrap() = Some(latest.to_string());
    }

    pub fn set_output(&self, output: Output) {
        *self.output.lock().unwrap() = output;
    }

    pub fn set_post_install_fails(&self, fails: bool) {
        self.fail_post_install.store(fails, Ordering::SeqCst);
    }

    pub fn set_desktop(&self, desktop: DesktopFile) {
        *self.desktop.lock().unwrap() = Some(desktop);
    }

    pub fn download_count(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }

    pub fn post_install_count(&self) -> usize {
        self.post_installs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Recipe for TestRecipe {
    fn name(&self) -> &str {
        &self.name
    }

    async fn latest_version(&self, _cancel: &CancellationToken) -> Result<Option<String>> {
        Ok(self.latest.lock().unwrap().clone())
    }

    async fn download(&self, ctx: &DownloadContext) -> Result<InstallResult> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        let output = self.output.lock().unwrap().clone();
        let result = match output {
            Output::Exe => {
                let body = format!("#!/bin/sh\necho {} {}\n", self.name, ctx.version());
                tokio::fs::write(ctx.work_dir().join("exe"), body).await?;
                InstallResult::exe("exe")
            }
            Output::Dir => {
                let bin = ctx.work_dir().join("pkg").join("bin");
                tokio::fs::create_dir_all(&bin).await?;
                tokio::fs::write(bin.join(&self.name), b"#!/bin/sh\n").await?;
                InstallResult::dir("pkg", format!("bin/{}", self.name))
            }
            Output::Extern(command) => InstallResult::external(command),
            Output::Fail => return Err(ChefError::Generic("download exploded".into())),
        };
        if let Some(token) = &self.cancel_after {
            token.cancel();
        }
        Ok(result)
    }

    async fn post_install(&self, _binary: &Path) -> Result<()> {
        self.post_installs.fetch_add(1, Ordering::SeqCst);
        if self.fail_post_install.load(Ordering::SeqCst) {
            return Err(ChefError::InstallError("post-install hook failed".into()));
        }
        Ok(())
    }

    fn desktop_file(&self) -> Option<DesktopFile> {
        self.desktop.lock().unwrap().clone()
    }
}

/// Launcher entries that can never be written.
#[derive(Default)]
pub struct BrokenDesktop {
    pub attempts: AtomicUsize,
}

#[async_trait]
impl DesktopEntries for BrokenDesktop {
    async fn create(&self, _name: &str, _desktop: &DesktopFile, _exec: &str) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(ChefError::Generic("applications directory is read-only".into()))
    }

    async fn remove(&self, _name: &str) -> Result<()> {
        Ok(())
    }
}

pub struct Kitchen {
    pub root: PathBuf,
    pub config: Config,
}

impl Kitchen {
    pub fn new(root: &Path) -> Self {
        let config = Config::with_paths(root.join("chef"), root.join("bin"), "kitchen");
        Self {
            root: root.to_path_buf(),
            config,
        }
    }

    pub fn chef(&self, recipes: Vec<Arc<dyn Recipe>>) -> Chef {
        self.chef_with_launcher(recipes, None)
    }

    pub fn chef_with_launcher(
        &self,
        recipes: Vec<Arc<dyn Recipe>>,
        launcher: Option<Arc<dyn ProviderLauncher>>,
    ) -> Chef {
        let mut builder = Chef::builder(self.config.clone())
            .recipes(recipes)
            .desktop(Arc::new(NoDesktopEntries))
            .http_client(reqwest::Client::new());
        if let Some(launcher) = launcher {
            builder = builder.launcher(launcher);
        }
        builder.build().unwrap()
    }

    pub fn chef_with_desktop(
        &self,
        recipes: Vec<Arc<dyn Recipe>>,
        desktop: Arc<dyn DesktopEntries>,
    ) -> Chef {
        Chef::builder(self.config.clone())
            .recipes(recipes)
            .desktop(desktop)
            .http_client(reqwest::Client::new())
            .build()
            .unwrap()
    }

    pub fn store_bytes(&self) -> Option<Vec<u8>> {
        std::fs::read(self.config.store_path()).ok()
    }

    pub fn store_json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.store_bytes().unwrap_or_else(|| b"{}".to_vec())).unwrap()
    }
}
