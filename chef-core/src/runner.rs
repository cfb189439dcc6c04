// chef-core/src/runner.rs
// Launches installed recipes and tracks the live processes per name.

use std::collections::HashMap;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::ExitStatus;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chef_common::error::{ChefError, Result};
use chef_common::model::InstallKind;
use chef_common::ChefEvent;
use tokio::process::Command;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::context::CoreContext;
use crate::events::Events;

/// Where a recipe name leads when asked to run it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// A managed binary (or directory-install symlink) in the bin directory.
    Managed(PathBuf),
    /// A command expected on the search path.
    External(String),
    NotInstalled,
    UnknownRecipe,
}

pub async fn resolve(ctx: &CoreContext, name: &str) -> Result<Resolution> {
    let Some(recipe) = ctx.registry.get(name) else {
        return Ok(Resolution::UnknownRecipe);
    };
    if recipe.provider().is_some() {
        return Ok(Resolution::External(name.to_string()));
    }
    Ok(match ctx.store.get_entry(name).await? {
        None => Resolution::NotInstalled,
        Some(entry) => match entry.kind {
            InstallKind::Extern(command) => Resolution::External(command),
            InstallKind::File | InstallKind::Dir(_) => {
                Resolution::Managed(ctx.config.binary_path(name))
            }
        },
    })
}

type ActiveMap = HashMap<String, HashMap<u64, CancellationToken>>;

/// Tracks processes launched through [`Runner::run`] until they exit.
pub struct Runner {
    events: Events,
    active: Arc<Mutex<ActiveMap>>,
    next_id: AtomicU64,
}

/// Handle to a launched process.
pub struct RunningProcess {
    pub name: String,
    pub pid: Option<u32>,
    done: oneshot::Receiver<Result<ExitStatus>>,
}

impl RunningProcess {
    pub async fn wait(self) -> Result<ExitStatus> {
        self.done
            .await
            .map_err(|_| ChefError::Generic(format!("lost track of '{}'", self.name)))?
    }
}

fn lock(active: &Mutex<ActiveMap>) -> MutexGuard<'_, ActiveMap> {
    active.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Runner {
    pub fn new(events: Events) -> Self {
        Self {
            events,
            active: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(0),
        }
    }

    /// Launches `name` with the recipe's default arguments followed by `args`.
    pub async fn run(&self, ctx: &CoreContext, name: &str, args: &[String]) -> Result<RunningProcess> {
        let program: OsString = match resolve(ctx, name).await? {
            Resolution::Managed(path) => path.into_os_string(),
            Resolution::External(command) => which::which(&command)
                .map_err(|e| ChefError::CommandExecError(format!("{command}: {e}")))?
                .into_os_string(),
            Resolution::NotInstalled => return Err(ChefError::NotInstalled(name.to_string())),
            Resolution::UnknownRecipe => return Err(ChefError::UnknownRecipe(name.to_string())),
        };
        let recipe = ctx
            .registry
            .get(name)
            .ok_or_else(|| ChefError::UnknownRecipe(name.to_string()))?;

        let mut full_args = recipe.cmd_args();
        full_args.extend(args.iter().cloned());
        debug!("[{}] Running {:?} {:?}", name, program, full_args);
        let mut child = Command::new(&program)
            .args(&full_args)
            .envs(recipe.cmd_env())
            .spawn()
            .map_err(|e| ChefError::CommandExecError(format!("{}: {e}", program.to_string_lossy())))?;
        let pid = child.id();

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let kill = CancellationToken::new();
        lock(&self.active)
            .entry(name.to_string())
            .or_default()
            .insert(id, kill.clone());
        self.events.emit(ChefEvent::StatusChanged {
            name: name.to_string(),
            running: true,
        });

        let (done_tx, done_rx) = oneshot::channel();
        let active = Arc::clone(&self.active);
        let events = self.events.clone();
        let owned_name = name.to_string();
        tokio::spawn(async move {
            let exited = tokio::select! {
                status = child.wait() => Some(status),
                _ = kill.cancelled() => None,
            };
            let status = match exited {
                Some(status) => status,
                None => {
                    if let Err(e) = child.start_kill() {
                        warn!("[{}] Failed to kill process: {}", owned_name, e);
                    }
                    child.wait().await
                }
            };
            let still_running = {
                let mut active = lock(&active);
                let remaining = active.get_mut(&owned_name).map(|set| {
                    set.remove(&id);
                    set.len()
                });
                if remaining == Some(0) {
                    active.remove(&owned_name);
                }
                remaining.unwrap_or(0) > 0
            };
            match &status {
                Ok(status) => debug!("[{}] Process exited with {}", owned_name, status),
                Err(e) => warn!("[{}] Failed waiting on process: {}", owned_name, e),
            }
            events.emit(ChefEvent::StatusChanged {
                name: owned_name,
                running: still_running,
            });
            let _ = done_tx.send(status.map_err(ChefError::from));
        });

        Ok(RunningProcess {
            name: name.to_string(),
            pid,
            done: done_rx,
        })
    }

    /// Asks every tracked process for `name` to terminate. Returns how many
    /// were signalled; processes that already exited are not an error.
    pub fn kill_all(&self, name: &str) -> usize {
        let active = lock(&self.active);
        let Some(set) = active.get(name) else {
            return 0;
        };
        for token in set.values() {
            token.cancel();
        }
        info!("[{}] Terminating {} process(es)", name, set.len());
        set.len()
    }

    pub fn is_running(&self, name: &str) -> bool {
        lock(&self.active).get(name).is_some_and(|set| !set.is_empty())
    }

    pub fn running_count(&self, name: &str) -> usize {
        lock(&self.active).get(name).map_or(0, HashMap::len)
    }
}
