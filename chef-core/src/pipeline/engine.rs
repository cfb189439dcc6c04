// chef-core/src/pipeline/engine.rs
// Reconciliation: resolve targets, check versions, then install whatever is
// out of date one recipe at a time.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chef_common::error::{ChefError, Result};
use chef_common::event::CheckStatus;
use chef_common::model::StoreEntry;
use chef_common::ChefEvent;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};

use super::worker::install_artifact;
use crate::check::{check_versions, VersionCheck};
use crate::context::CoreContext;
use crate::recipe::Recipe;

#[derive(Debug, Clone, Default)]
pub struct UpdateOptions {
    /// Recipe names to reconcile; empty means every known recipe.
    pub targets: Vec<String>,
    pub force: bool,
    pub skip: Option<String>,
    pub dry_run: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    Installed(String),
    Failed(String),
    /// Needed an update but the batch was cancelled first.
    NotStarted,
}

#[derive(Debug, Clone)]
pub struct UpdateRow {
    pub name: String,
    pub installed: Option<String>,
    pub status: CheckStatus,
    pub outcome: Option<InstallOutcome>,
    pub provider: Option<String>,
    pub change_log: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateReport {
    pub rows: Vec<UpdateRow>,
    pub updated: usize,
    pub failed: usize,
    /// Recipes whose latest version could not be determined.
    pub errors: usize,
    pub cancelled: bool,
    pub dry_run: bool,
}

impl UpdateReport {
    pub fn pending(&self) -> impl Iterator<Item = &UpdateRow> {
        self.rows
            .iter()
            .filter(|r| matches!(r.status, CheckStatus::NeedsUpdate { .. }))
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.errors == 0
    }
}

/// Looks up every explicitly named target, failing before any work when one
/// is unknown. No names means the whole registry.
pub fn resolve_targets(ctx: &CoreContext, targets: &[String]) -> Result<Vec<Arc<dyn Recipe>>> {
    if targets.is_empty() {
        return Ok(ctx.registry.all());
    }
    let mut seen = HashSet::new();
    let mut recipes = Vec::new();
    for name in targets {
        let recipe = ctx
            .registry
            .get(name)
            .ok_or_else(|| ChefError::UnknownRecipe(name.clone()))?;
        if seen.insert(name.as_str()) {
            recipes.push(recipe);
        }
    }
    Ok(recipes)
}

fn row_for(check: &VersionCheck) -> UpdateRow {
    let change_log = check
        .target_version()
        .and_then(|version| check.recipe.change_log(version));
    UpdateRow {
        name: check.name().to_string(),
        installed: check.installed.as_ref().map(|e| e.version.clone()),
        status: check.status.clone(),
        outcome: None,
        provider: check.recipe.provider().map(str::to_string),
        change_log,
    }
}

fn finish(ctx: &CoreContext, report: UpdateReport) -> UpdateReport {
    ctx.events.emit(ChefEvent::UpdateFinished {
        updated: report.updated,
        failed: report.failed,
        cancelled: report.cancelled,
    });
    report
}

#[instrument(skip_all, fields(targets = options.targets.len(), force = options.force, dry_run = options.dry_run))]
pub async fn update(
    ctx: &CoreContext,
    options: &UpdateOptions,
    cancel: &CancellationToken,
) -> Result<UpdateReport> {
    let recipes = resolve_targets(ctx, &options.targets)?;
    let order: HashMap<String, usize> = recipes
        .iter()
        .enumerate()
        .map(|(i, r)| (r.name().to_string(), i))
        .collect();
    let installed = ctx.store.read_all().await?;

    let mut report = UpdateReport {
        dry_run: options.dry_run,
        ..Default::default()
    };

    ctx.events
        .emit(ChefEvent::phase(format!("Checking {} recipe(s) for updates", recipes.len())));
    let mut checks = match check_versions(
        recipes,
        &installed,
        options.force,
        options.skip.as_deref(),
        &ctx.events,
        cancel,
    )
    .await
    {
        Ok(checks) => checks,
        Err(e) if e.is_cancelled() => {
            info!("Update cancelled during version checks");
            report.cancelled = true;
            return Ok(finish(ctx, report));
        }
        Err(e) => return Err(e),
    };
    checks.sort_by_key(|c| order.get(c.name()).copied().unwrap_or(usize::MAX));

    report.rows = checks.iter().map(row_for).collect();
    report.errors = checks
        .iter()
        .filter(|c| matches!(c.status, CheckStatus::Error(_)))
        .count();
    for check in &checks {
        if let CheckStatus::Error(reason) = &check.status {
            error!("[{}] {}", check.name(), reason);
        }
    }

    if options.dry_run {
        debug!("Dry run; {} recipe(s) would be updated", report.pending().count());
        return Ok(finish(ctx, report));
    }

    let pending: Vec<(usize, &VersionCheck)> = checks
        .iter()
        .enumerate()
        .filter(|(_, c)| c.needs_update())
        .collect();
    if !pending.is_empty() {
        ctx.events
            .emit(ChefEvent::phase(format!("Installing {} update(s)", pending.len())));
    }

    for (index, check) in pending {
        if cancel.is_cancelled() {
            info!("Update cancelled; {} install(s) completed", report.updated);
            report.cancelled = true;
            for row in report.rows.iter_mut().filter(|r| {
                r.outcome.is_none() && matches!(r.status, CheckStatus::NeedsUpdate { .. })
            }) {
                row.outcome = Some(InstallOutcome::NotStarted);
            }
            break;
        }
        let Some(version) = check.target_version() else {
            continue;
        };
        let outcome = install_one(ctx, check, version, options.force).await;
        report.rows[index].outcome = Some(outcome.clone());
        match outcome {
            InstallOutcome::Installed(_) => report.updated += 1,
            InstallOutcome::Failed(_) => report.failed += 1,
            InstallOutcome::NotStarted => {}
        }
    }

    info!(
        "Update finished: {} updated, {} failed",
        report.updated, report.failed
    );
    Ok(finish(ctx, report))
}

// An install already under way runs to completion: the batch token is only
// consulted between artifacts.
async fn install_one(
    ctx: &CoreContext,
    check: &VersionCheck,
    version: &str,
    force: bool,
) -> InstallOutcome {
    let name = check.name();
    let result = install_artifact(
        ctx,
        &check.recipe,
        version,
        check.installed.as_ref(),
        force,
        &CancellationToken::new(),
    )
    .await;
    match result {
        Ok(entry) => {
            ctx.events.emit(ChefEvent::InstallFinished {
                name: name.to_string(),
                version: entry.version.clone(),
            });
            InstallOutcome::Installed(entry.version)
        }
        Err(e) => {
            error!("[{}] Install failed: {}", name, e);
            ctx.events.emit(ChefEvent::install_failed(name, &e));
            InstallOutcome::Failed(e.to_string())
        }
    }
}

/// Installs one recipe at an explicit version, regardless of what is stored.
#[instrument(skip(ctx, cancel))]
pub async fn install_version(
    ctx: &CoreContext,
    name: &str,
    version: &str,
    cancel: &CancellationToken,
) -> Result<StoreEntry> {
    let recipe = ctx
        .registry
        .get(name)
        .ok_or_else(|| ChefError::UnknownRecipe(name.to_string()))?;
    let previous = ctx.store.get_entry(name).await?;
    match install_artifact(ctx, &recipe, version, previous.as_ref(), true, cancel).await {
        Ok(entry) => {
            ctx.events.emit(ChefEvent::InstallFinished {
                name: name.to_string(),
                version: entry.version.clone(),
            });
            Ok(entry)
        }
        Err(e) => {
            if !e.is_cancelled() {
                ctx.events.emit(ChefEvent::install_failed(name, &e));
            }
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chef_common::model::InstallResult;

    use super::*;
    use crate::context::tests::test_context;
    use crate::recipe::tests::StaticRecipe;
    use crate::recipe::DownloadContext;

    /// Counts downloads and fails every one of them.
    struct BrokenDownload {
        downloads: AtomicUsize,
    }

    #[async_trait]
    impl Recipe for BrokenDownload {
        fn name(&self) -> &str {
            "broken"
        }

        async fn latest_version(&self, _cancel: &CancellationToken) -> Result<Option<String>> {
            Ok(Some("9".into()))
        }

        async fn download(&self, _ctx: &DownloadContext) -> Result<InstallResult> {
            self.downloads.fetch_add(1, Ordering::SeqCst);
            Err(ChefError::Generic("mirror offline".into()))
        }

        fn change_log(&self, version: &str) -> Option<String> {
            Some(format!("https://example.invalid/broken/{version}"))
        }
    }

    fn store_file(root: &Path) -> Vec<u8> {
        std::fs::read(root.join("chef/test.json")).unwrap_or_default()
    }

    #[tokio::test]
    async fn unknown_target_fails_before_any_work() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = test_context(tmp.path(), vec![StaticRecipe::arc("hello", Some("1"))]);
        let options = UpdateOptions {
            targets: vec!["hello".into(), "typo".into()],
            ..Default::default()
        };
        let err = update(&ctx, &options, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ChefError::UnknownRecipe(ref n) if n == "typo"));
        assert!(store_file(tmp.path()).is_empty());
    }

    #[tokio::test]
    async fn dry_run_reports_without_downloading() {
        let tmp = tempfile::tempdir().unwrap();
        let broken = Arc::new(BrokenDownload {
            downloads: AtomicUsize::new(0),
        });
        let ctx = test_context(
            tmp.path(),
            vec![
                StaticRecipe::arc("hello", Some("1")),
                broken.clone() as Arc<dyn Recipe>,
            ],
        );
        let options = UpdateOptions {
            dry_run: true,
            ..Default::default()
        };

        let report = update(&ctx, &options, &CancellationToken::new()).await.unwrap();
        assert!(report.dry_run);
        assert_eq!(report.pending().count(), 2);
        assert_eq!(broken.downloads.load(Ordering::SeqCst), 0);
        assert!(store_file(tmp.path()).is_empty());
        let broken_row = report.rows.iter().find(|r| r.name == "broken").unwrap();
        assert_eq!(
            broken_row.change_log.as_deref(),
            Some("https://example.invalid/broken/9")
        );
    }

    #[tokio::test]
    async fn failed_download_keeps_previous_entry_and_siblings_install() {
        let tmp = tempfile::tempdir().unwrap();
        let broken = Arc::new(BrokenDownload {
            downloads: AtomicUsize::new(0),
        });
        let ctx = test_context(
            tmp.path(),
            vec![
                broken.clone() as Arc<dyn Recipe>,
                StaticRecipe::arc("hello", Some("1")),
            ],
        );
        ctx.store
            .set_entry("broken", StoreEntry::file("8"))
            .await
            .unwrap();

        let report = update(&ctx, &UpdateOptions::default(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!((report.updated, report.failed), (1, 1));
        assert!(matches!(
            report.rows[0].outcome,
            Some(InstallOutcome::Failed(ref m)) if m.contains("mirror offline")
        ));
        let entries = ctx.store.read_all().await.unwrap();
        assert_eq!(entries["broken"], StoreEntry::file("8"));
        assert_eq!(entries["hello"], StoreEntry::file("1"));
    }

    #[tokio::test]
    async fn install_version_forces_the_given_version() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = test_context(tmp.path(), vec![StaticRecipe::arc("hello", Some("2"))]);
        ctx.store.set_entry("hello", StoreEntry::file("1")).await.unwrap();

        let entry = install_version(&ctx, "hello", "1", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(entry, StoreEntry::file("1"));
        assert!(ctx.config.binary_path("hello").exists());
    }
}
