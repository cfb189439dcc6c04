// chef/src/manifest.rs
//! Recipes declared in a TOML manifest, for the stand-alone `chef` binary.
//!
//! ```toml
//! [[recipe]]
//! name = "hello"
//! version_command = "curl -s https://example.org/hello/latest"
//! url = "https://example.org/hello/{version}/hello-linux"
//! args = ["--color"]
//!
//! [[recipe]]
//! name = "gh"
//! version_command = "gh --version | head -n1 | cut -d' ' -f3"
//! extern = "gh"
//! ```

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chef_common::error::{ChefError, Result};
use chef_common::model::{DesktopFile, InstallResult};
use chef_core::{DownloadContext, Recipe};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::debug;

const VERSION_PLACEHOLDER: &str = "{version}";

#[derive(Debug, Deserialize)]
struct Manifest {
    #[serde(default, rename = "recipe")]
    recipes: Vec<ManifestRecipe>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ManifestRecipe {
    pub name: String,
    /// Shell command printing the latest version on stdout.
    pub version_command: String,
    /// Download URL of a single executable; `{version}` is substituted.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default, rename = "extern")]
    pub extern_command: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub change_log: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default)]
    pub desktop: Option<DesktopFile>,
}

impl ManifestRecipe {
    fn validate(&self) -> Result<()> {
        if self.name.is_empty() || self.name.contains(['/', '\\']) || self.name.starts_with('_') {
            return Err(ChefError::Config(format!(
                "invalid recipe name '{}'",
                self.name
            )));
        }
        match (&self.url, &self.extern_command) {
            (Some(_), None) | (None, Some(_)) => Ok(()),
            _ => Err(ChefError::Config(format!(
                "recipe '{}' needs exactly one of `url` or `extern`",
                self.name
            ))),
        }
    }
}

/// Parses manifest text into recipes, rejecting the whole file on the first
/// invalid entry.
pub fn parse_manifest(text: &str) -> Result<Vec<Arc<dyn Recipe>>> {
    let manifest: Manifest = toml::from_str(text)?;
    manifest
        .recipes
        .into_iter()
        .map(|recipe| {
            recipe.validate()?;
            Ok(Arc::new(recipe) as Arc<dyn Recipe>)
        })
        .collect()
}

/// Loads `path`. A missing manifest is not an error when `required` is false.
pub fn load_manifest(path: &Path, required: bool) -> Result<Vec<Arc<dyn Recipe>>> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound && !required => {
            debug!("No manifest at {}", path.display());
            return Ok(Vec::new());
        }
        Err(e) => {
            return Err(ChefError::Config(format!(
                "failed to read manifest {}: {e}",
                path.display()
            )))
        }
    };
    let recipes = parse_manifest(&text)?;
    debug!("Loaded {} recipe(s) from {}", recipes.len(), path.display());
    Ok(recipes)
}

#[async_trait]
impl Recipe for ManifestRecipe {
    fn name(&self) -> &str {
        &self.name
    }

    async fn latest_version(&self, cancel: &CancellationToken) -> Result<Option<String>> {
        let output = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ChefError::Cancelled),
            output = chef_aio::run_shell_capture(&self.version_command) => output?,
        };
        let version = output.lines().next().unwrap_or_default().trim().to_string();
        Ok((!version.is_empty()).then_some(version))
    }

    async fn download(&self, ctx: &DownloadContext) -> Result<InstallResult> {
        if let Some(command) = &self.extern_command {
            return Ok(InstallResult::external(command.clone()));
        }
        let template = self
            .url
            .as_deref()
            .ok_or_else(|| ChefError::Config(format!("recipe '{}' has no url", self.name)))?;
        let url = template.replace(VERSION_PLACEHOLDER, ctx.version());
        let file = ctx.fetch(&url, &self.name).await?;
        Ok(InstallResult::exe(file))
    }

    fn cmd_args(&self) -> Vec<String> {
        self.args.clone()
    }

    fn cmd_env(&self) -> HashMap<String, String> {
        self.env.clone()
    }

    fn change_log(&self, version: &str) -> Option<String> {
        self.change_log
            .as_ref()
            .map(|url| url.replace(VERSION_PLACEHOLDER, version))
    }

    fn description(&self) -> Option<String> {
        self.description.clone()
    }

    fn desktop_file(&self) -> Option<DesktopFile> {
        self.desktop.clone()
    }
}
