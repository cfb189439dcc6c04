// chef-core/src/chef.rs
use std::collections::BTreeMap;
use std::sync::Arc;

use chef_common::error::{ChefError, Result};
use chef_common::model::{InstallKind, ProviderRegistration, StoreEntry};
use chef_common::{ChefEvent, Config};
use tokio::sync::{broadcast, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use crate::context::CoreContext;
use crate::desktop::{DesktopEntries, XdgDesktopEntries};
use crate::events::Events;
use crate::pipeline::{self, UpdateOptions, UpdateReport};
use crate::provider::{provider_recipes, ProcessLauncher, ProviderLauncher, ProviderManager};
use crate::recipe::Recipe;
use crate::registry::Registry;
use crate::runner::{Runner, RunningProcess};
use crate::store::Store;
use crate::uninstall;

/// One row of `chef list`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListRow {
    pub name: String,
    pub installed: Option<String>,
    pub kind: Option<InstallKind>,
    pub provider: Option<String>,
    pub description: Option<String>,
    pub running: bool,
}

pub struct ChefBuilder {
    config: Config,
    recipes: Vec<Arc<dyn Recipe>>,
    launcher: Option<Arc<dyn ProviderLauncher>>,
    desktop: Option<Arc<dyn DesktopEntries>>,
    http: Option<reqwest::Client>,
}

impl ChefBuilder {
    pub fn recipe(mut self, recipe: Arc<dyn Recipe>) -> Self {
        self.recipes.push(recipe);
        self
    }

    pub fn recipes(mut self, recipes: impl IntoIterator<Item = Arc<dyn Recipe>>) -> Self {
        self.recipes.extend(recipes);
        self
    }

    pub fn launcher(mut self, launcher: Arc<dyn ProviderLauncher>) -> Self {
        self.launcher = Some(launcher);
        self
    }

    pub fn desktop(mut self, desktop: Arc<dyn DesktopEntries>) -> Self {
        self.desktop = Some(desktop);
        self
    }

    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.http = Some(client);
        self
    }

    pub fn build(self) -> Result<Chef> {
        let http = match self.http {
            Some(client) => client,
            None => chef_net::build_http_client()?,
        };
        let desktop = self
            .desktop
            .unwrap_or_else(|| Arc::new(XdgDesktopEntries::new(self.config.desktop_dir())));
        let launcher = self.launcher.unwrap_or_else(|| Arc::new(ProcessLauncher));

        let registry = Arc::new(Registry::new(self.recipes));
        let ctx = CoreContext::new(self.config, registry, desktop, http);
        let providers = Arc::new(ProviderManager::new(Arc::clone(&ctx.store), launcher));
        let runner = Runner::new(ctx.events.clone());
        debug!(
            "Chef ready with {} native recipe(s), store {}",
            ctx.registry.native().len(),
            ctx.store.path().display()
        );
        Ok(Chef {
            ctx,
            providers,
            runner,
            providers_loaded: Mutex::new(false),
        })
    }
}

/// Entry point for embedding programs: the registry, store, provider sessions
/// and runner of one script namespace.
pub struct Chef {
    ctx: CoreContext,
    providers: Arc<ProviderManager>,
    runner: Runner,
    providers_loaded: Mutex<bool>,
}

impl Chef {
    pub fn builder(config: Config) -> ChefBuilder {
        ChefBuilder {
            config,
            recipes: Vec::new(),
            launcher: None,
            desktop: None,
            http: None,
        }
    }

    pub fn config(&self) -> &Config {
        &self.ctx.config
    }

    pub fn context(&self) -> &CoreContext {
        &self.ctx
    }

    pub fn store(&self) -> &Store {
        &self.ctx.store
    }

    pub fn registry(&self) -> &Registry {
        &self.ctx.registry
    }

    pub fn events(&self) -> &Events {
        &self.ctx.events
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChefEvent> {
        self.ctx.events.subscribe()
    }

    /// Re-lists every provider and swaps the provider recipes wholesale.
    /// Returns how many provider recipes are now known.
    #[instrument(skip_all)]
    pub async fn refresh_providers(&self, cancel: &CancellationToken) -> Result<usize> {
        let mut loaded = self.providers_loaded.lock().await;
        let listing = provider_recipes(&self.providers, cancel).await?;
        let count = listing.recipes.len();
        self.ctx.registry.replace_provided(listing.recipes);
        self.ctx.registry.set_complete(listing.failed.is_empty());
        *loaded = true;
        debug!("Loaded {} provider recipe(s)", count);
        Ok(count)
    }

    /// Loads provider recipes once per session. Every operation that writes
    /// entries goes through here first so provider entries are not pruned.
    pub async fn ensure_providers(&self, cancel: &CancellationToken) -> Result<()> {
        if *self.providers_loaded.lock().await {
            return Ok(());
        }
        self.refresh_providers(cancel).await.map(|_| ())
    }

    pub async fn update(&self, options: &UpdateOptions, cancel: &CancellationToken) -> Result<UpdateReport> {
        self.ensure_providers(cancel).await?;
        pipeline::update(&self.ctx, options, cancel).await
    }

    pub async fn install_version(
        &self,
        name: &str,
        version: &str,
        cancel: &CancellationToken,
    ) -> Result<StoreEntry> {
        self.ensure_providers(cancel).await?;
        pipeline::install_version(&self.ctx, name, version, cancel).await
    }

    pub async fn uninstall(&self, name: &str, cancel: &CancellationToken) -> Result<StoreEntry> {
        self.ensure_providers(cancel).await?;
        uninstall::uninstall(&self.ctx, name, cancel).await
    }

    pub async fn list(&self, cancel: &CancellationToken) -> Result<Vec<ListRow>> {
        self.ensure_providers(cancel).await?;
        let installed = self.ctx.store.read_all().await?;
        Ok(self
            .ctx
            .registry
            .all()
            .into_iter()
            .map(|recipe| {
                let name = recipe.name().to_string();
                let entry = installed.get(&name);
                ListRow {
                    installed: entry.map(|e| e.version.clone()),
                    kind: entry.map(|e| e.kind.clone()),
                    provider: recipe.provider().map(str::to_string),
                    description: recipe.description(),
                    running: self.runner.is_running(&name),
                    name,
                }
            })
            .collect())
    }

    /// Installable versions of `name`, one page at a time.
    pub async fn versions(&self, name: &str, page: u32, cancel: &CancellationToken) -> Result<Vec<String>> {
        self.ensure_providers(cancel).await?;
        let recipe = self
            .ctx
            .registry
            .get(name)
            .ok_or_else(|| ChefError::UnknownRecipe(name.to_string()))?;
        match recipe.versions(page, cancel).await? {
            Some(versions) => Ok(versions),
            None => {
                debug!("[{}] Recipe does not list versions", name);
                Err(ChefError::UnknownRecipe(format!("{name} (no version listing)")))
            }
        }
    }

    pub async fn run(&self, name: &str, args: &[String]) -> Result<RunningProcess> {
        self.ensure_providers(&CancellationToken::new()).await?;
        self.runner.run(&self.ctx, name, args).await
    }

    pub fn kill_all(&self, name: &str) -> usize {
        self.runner.kill_all(name)
    }

    pub fn is_running(&self, name: &str) -> bool {
        self.runner.is_running(name)
    }

    pub async fn settings(&self) -> Result<BTreeMap<String, String>> {
        self.ctx.store.settings().await
    }

    pub async fn get_setting(&self, key: &str) -> Result<Option<String>> {
        self.ctx.store.get_setting(key).await
    }

    pub async fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        self.ctx.store.set_setting(key, value).await
    }

    pub async fn providers(&self) -> Result<Vec<ProviderRegistration>> {
        self.ctx.store.get_providers().await
    }

    /// Registers (or re-registers) a provider. The next operation lists it.
    pub async fn add_provider(&self, registration: ProviderRegistration) -> Result<()> {
        let name = registration.name.clone();
        self.ctx.store.add_provider(registration).await?;
        self.providers.drop_session(&name).await;
        *self.providers_loaded.lock().await = false;
        info!("Registered provider '{}'", name);
        Ok(())
    }

    pub async fn remove_provider(&self, name: &str) -> Result<bool> {
        let removed = self.ctx.store.remove_provider(name).await?;
        self.providers.drop_session(name).await;
        *self.providers_loaded.lock().await = false;
        if removed {
            info!("Removed provider '{}'", name);
        }
        Ok(removed)
    }

    /// Closes every provider session.
    pub async fn cleanup(&self) {
        self.providers.cleanup().await;
    }
}
