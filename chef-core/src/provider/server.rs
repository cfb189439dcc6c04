// chef-core/src/provider/server.rs
// The provider side of the protocol: a chef program started with `--chef`
// serves its own native recipes to another chef over stdin/stdout.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chef_common::error::{ChefError, Result};
use chef_common::model::AppDescriptor;
use futures::stream::{self, StreamExt};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::protocol::{ProviderCommand, ProviderRequest, ProviderResponse};
use crate::chef::Chef;
use crate::check::MAX_CONCURRENT_VERSION_CHECKS;
use crate::pipeline::UpdateOptions;
use crate::recipe::Recipe;

type InFlight = Arc<Mutex<HashMap<String, CancellationToken>>>;

fn lock(in_flight: &InFlight) -> MutexGuard<'_, HashMap<String, CancellationToken>> {
    in_flight.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Answers provider requests read from `reader` until it ends. Requests run
/// concurrently; responses are written one line at a time in completion order.
pub async fn serve_provider<R, W>(chef: Arc<Chef>, reader: R, writer: W) -> Result<()>
where
    R: AsyncRead + Send + Unpin + 'static,
    W: AsyncWrite + Send + Unpin + 'static,
{
    info!("Serving {} recipe(s) as a provider", chef.registry().native().len());
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<ProviderResponse>();
    let writer_task = tokio::spawn(async move {
        let mut writer = writer;
        while let Some(response) = out_rx.recv().await {
            let mut line = match serde_json::to_string(&response) {
                Ok(line) => line,
                Err(e) => {
                    warn!("Failed to encode response {}: {}", response.id, e);
                    continue;
                }
            };
            line.push('\n');
            if let Err(e) = writer.write_all(line.as_bytes()).await {
                warn!("Provider output closed: {}", e);
                break;
            }
            let _ = writer.flush().await;
        }
    });

    let in_flight: InFlight = Arc::new(Mutex::new(HashMap::new()));
    let mut lines = BufReader::new(reader).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let request: ProviderRequest = match serde_json::from_str(line) {
            Ok(request) => request,
            Err(e) => {
                debug!("Ignoring unparseable request: {}", e);
                continue;
            }
        };
        let id = request.id;
        match request.command {
            ProviderCommand::Cancel { target_id } => {
                if let Some(token) = lock(&in_flight).get(&target_id) {
                    debug!("Cancelling request {}", target_id);
                    token.cancel();
                }
            }
            command => {
                let token = CancellationToken::new();
                lock(&in_flight).insert(id.clone(), token.clone());
                let chef = Arc::clone(&chef);
                let out_tx = out_tx.clone();
                let in_flight = Arc::clone(&in_flight);
                tokio::spawn(async move {
                    let label = command.label();
                    let response = match handle(&chef, command, &token).await {
                        Ok((kind, data)) => ProviderResponse::ok(&id, kind, data),
                        Err(e) => {
                            debug!("Request {} ({}) failed: {}", id, label, e);
                            ProviderResponse::failure(&id, e.to_string())
                        }
                    };
                    lock(&in_flight).remove(&id);
                    let _ = out_tx.send(response);
                });
            }
        }
    }

    debug!(
        "Provider input ended; finishing {} outstanding request(s)",
        lock(&in_flight).len()
    );
    drop(out_tx);
    let _ = writer_task.await;
    chef.cleanup().await;
    Ok(())
}

fn native_recipe(chef: &Chef, name: &str) -> Result<Arc<dyn Recipe>> {
    chef.registry()
        .native()
        .iter()
        .find(|r| r.name() == name)
        .cloned()
        .ok_or_else(|| ChefError::UnknownRecipe(name.to_string()))
}

async fn handle(
    chef: &Chef,
    command: ProviderCommand,
    cancel: &CancellationToken,
) -> Result<(Option<&'static str>, Option<Value>)> {
    match command {
        ProviderCommand::List => {
            let apps = list_apps(chef, cancel).await?;
            Ok((Some("list"), Some(serde_json::to_value(apps)?)))
        }
        ProviderCommand::Update {
            name,
            version,
            force,
        } => {
            native_recipe(chef, &name)?;
            if version.is_empty() {
                let options = UpdateOptions {
                    targets: vec![name.clone()],
                    force,
                    ..Default::default()
                };
                let report = chef.update(&options, cancel).await?;
                if report.cancelled {
                    return Err(ChefError::Cancelled);
                }
                if !report.is_success() {
                    return Err(ChefError::InstallError(format!("update of '{name}' failed")));
                }
            } else {
                chef.install_version(&name, &version, cancel).await?;
            }
            Ok((None, None))
        }
        ProviderCommand::Remove { name } => {
            native_recipe(chef, &name)?;
            chef.uninstall(&name, cancel).await?;
            Ok((None, None))
        }
        ProviderCommand::Versions { name, page } => {
            let recipe = native_recipe(chef, &name)?;
            let versions = recipe.versions(page, cancel).await?.unwrap_or_default();
            Ok((None, Some(serde_json::to_value(versions)?)))
        }
        ProviderCommand::Cancel { .. } => Ok((None, None)),
    }
}

async fn list_apps(chef: &Chef, cancel: &CancellationToken) -> Result<Vec<AppDescriptor>> {
    let installed = chef.store().read_all().await?;
    let group = chef.config().script_name.clone();
    let recipes = chef.registry().native().to_vec();
    let lookups: Vec<_> = recipes
        .into_iter()
        .map(|recipe| {
            let version = installed
                .get(recipe.name())
                .map(|e| e.version.clone())
                .unwrap_or_default();
            let group = group.clone();
            let cancel = cancel.clone();
            async move {
                let latest_version = match recipe.latest_version(&cancel).await {
                    Ok(latest) => latest,
                    Err(e) => {
                        warn!("[{}] Version lookup failed: {}", recipe.name(), e);
                        None
                    }
                };
                AppDescriptor {
                    name: recipe.name().to_string(),
                    group: Some(group),
                    version,
                    latest_version,
                    description: recipe.description(),
                    has_versions: recipe.has_versions(),
                }
            }
        })
        .collect();
    let apps = stream::iter(lookups)
        .buffered(MAX_CONCURRENT_VERSION_CHECKS)
        .collect::<Vec<_>>()
        .await;
    if cancel.is_cancelled() {
        return Err(ChefError::Cancelled);
    }
    Ok(apps)
}
