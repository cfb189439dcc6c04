// chef-core/src/check/update.rs
// Version-check phase: ask every targeted recipe for its latest version, with
// bounded parallelism, and classify it against the store.

use std::collections::BTreeMap;
use std::sync::Arc;

use chef_common::error::{ChefError, Result};
use chef_common::event::CheckStatus;
use chef_common::model::StoreEntry;
use chef_common::ChefEvent;
use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::events::Events;
use crate::recipe::Recipe;

pub const MAX_CONCURRENT_VERSION_CHECKS: usize = 5;

#[derive(Clone)]
pub struct VersionCheck {
    pub recipe: Arc<dyn Recipe>,
    pub installed: Option<StoreEntry>,
    pub status: CheckStatus,
}

impl VersionCheck {
    pub fn name(&self) -> &str {
        self.recipe.name()
    }

    pub fn needs_update(&self) -> bool {
        matches!(self.status, CheckStatus::NeedsUpdate { .. })
    }

    /// The version an install would target, when one is needed.
    pub fn target_version(&self) -> Option<&str> {
        match &self.status {
            CheckStatus::NeedsUpdate { latest, .. } => Some(latest),
            _ => None,
        }
    }
}

/// Decides what to do with one recipe given its stored and latest versions.
///
/// A missing latest version with an installed version present counts as up to
/// date: an unreachable version source must not flag installed artifacts.
pub fn classify(installed: Option<&str>, latest: Option<&str>, force: bool) -> CheckStatus {
    match (installed, latest) {
        (None, None) => CheckStatus::Error("unable to get latest version".to_string()),
        (Some(_), None) => CheckStatus::UpToDate,
        (Some(current), Some(latest)) if !force && current == latest => CheckStatus::UpToDate,
        (installed, Some(latest)) => CheckStatus::NeedsUpdate {
            installed: installed.map(str::to_string),
            latest: latest.to_string(),
        },
    }
}

async fn check_one(
    recipe: Arc<dyn Recipe>,
    installed: Option<StoreEntry>,
    force: bool,
    skip: Option<&str>,
    cancel: &CancellationToken,
) -> Result<VersionCheck> {
    let name = recipe.name().to_string();
    if skip == Some(name.as_str()) {
        return Ok(VersionCheck {
            recipe,
            installed,
            status: CheckStatus::Skipped("skipped on request".to_string()),
        });
    }

    let latest = match recipe.latest_version(cancel).await {
        Ok(latest) => latest.filter(|v| !v.is_empty()),
        Err(e) if e.is_cancelled() => return Err(e),
        Err(e) => {
            let lookup = ChefError::VersionLookupFailed(name.clone(), e.to_string());
            if installed.is_none() {
                return Ok(VersionCheck {
                    recipe,
                    installed,
                    status: CheckStatus::Error(lookup.to_string()),
                });
            }
            warn!("{}; keeping installed version", lookup);
            None
        }
    };

    let status = classify(
        installed.as_ref().map(|e| e.version.as_str()),
        latest.as_deref(),
        force,
    );
    debug!("[{}] Version check: {:?}", name, status);
    Ok(VersionCheck {
        recipe,
        installed,
        status,
    })
}

/// Runs the version-check phase for `recipes` and waits for all of it.
///
/// At most [`MAX_CONCURRENT_VERSION_CHECKS`] lookups are in flight. Results
/// come back in completion order. Cancellation fails the whole phase.
#[instrument(skip_all, fields(targets = recipes.len()))]
pub async fn check_versions(
    recipes: Vec<Arc<dyn Recipe>>,
    installed: &BTreeMap<String, StoreEntry>,
    force: bool,
    skip: Option<&str>,
    events: &Events,
    cancel: &CancellationToken,
) -> Result<Vec<VersionCheck>> {
    let skip = skip.map(str::to_string);
    let lookups: Vec<_> = recipes
        .into_iter()
        .map(|recipe| {
            let entry = installed.get(recipe.name()).cloned();
            let skip = skip.clone();
            let cancel = cancel.clone();
            async move { check_one(recipe, entry, force, skip.as_deref(), &cancel).await }
        })
        .collect();
    let checks = stream::iter(lookups).buffer_unordered(MAX_CONCURRENT_VERSION_CHECKS);
    tokio::pin!(checks);

    let mut results = Vec::new();
    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ChefError::Cancelled),
            next = checks.next() => next,
        };
        let Some(check) = next else { break };
        let check = check?;
        events.emit(ChefEvent::VersionChecked {
            name: check.name().to_string(),
            status: check.status.clone(),
        });
        results.push(check);
    }
    Ok(results)
}
