// chef-core/src/provider/manager.rs
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chef_common::error::{ChefError, Result};
use chef_common::model::{AppDescriptor, ProviderRegistration};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::protocol::{ProviderCommand, ProviderResponse};
use super::session::ProviderSession;
use crate::store::Store;

/// Starts a session for a registered provider.
pub trait ProviderLauncher: Send + Sync {
    fn launch(&self, registration: &ProviderRegistration) -> Result<Arc<ProviderSession>>;
}

/// Launches providers as shell subprocesses.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessLauncher;

impl ProviderLauncher for ProcessLauncher {
    fn launch(&self, registration: &ProviderRegistration) -> Result<Arc<ProviderSession>> {
        ProviderSession::spawn(registration)
    }
}

/// Keeps at most one live session per provider name, created on first use and
/// recreated after it closes.
pub struct ProviderManager {
    store: Arc<Store>,
    launcher: Arc<dyn ProviderLauncher>,
    sessions: Mutex<HashMap<String, Arc<ProviderSession>>>,
    cleaning_up: AtomicBool,
}

impl ProviderManager {
    pub fn new(store: Arc<Store>, launcher: Arc<dyn ProviderLauncher>) -> Self {
        Self {
            store,
            launcher,
            sessions: Mutex::new(HashMap::new()),
            cleaning_up: AtomicBool::new(false),
        }
    }

    pub async fn registrations(&self) -> Result<Vec<ProviderRegistration>> {
        self.store.get_providers().await
    }

    async fn session(&self, provider: &str) -> Result<Arc<ProviderSession>> {
        if self.cleaning_up.load(Ordering::SeqCst) {
            return Err(ChefError::ProviderUnreachable(
                provider.to_string(),
                "provider sessions are shutting down".to_string(),
            ));
        }
        let mut sessions = self.sessions.lock().await;
        if let Some(session) = sessions.get(provider) {
            if !session.is_closed() {
                return Ok(Arc::clone(session));
            }
            debug!("[{}] Previous provider session closed; restarting", provider);
        }

        let registration = self
            .registrations()
            .await?
            .into_iter()
            .find(|p| p.name == provider)
            .ok_or_else(|| {
                ChefError::ProviderUnreachable(provider.to_string(), "not registered".to_string())
            })?;
        let session = self.launcher.launch(&registration)?;
        sessions.insert(provider.to_string(), Arc::clone(&session));
        Ok(session)
    }

    /// Sends one command and turns an unsuccessful response into
    /// [`ChefError::ProviderError`].
    pub async fn call(
        &self,
        provider: &str,
        command: ProviderCommand,
        cancel: &CancellationToken,
    ) -> Result<ProviderResponse> {
        if cancel.is_cancelled() {
            return Err(ChefError::Cancelled);
        }
        let session = self.session(provider).await?;
        let response = session.request(command, cancel).await?;
        if !response.success {
            let reason = response
                .error
                .unwrap_or_else(|| "request failed without an error message".to_string());
            return Err(ChefError::ProviderError(provider.to_string(), reason));
        }
        Ok(response)
    }

    pub async fn list(&self, provider: &str, cancel: &CancellationToken) -> Result<Vec<AppDescriptor>> {
        let response = self.call(provider, ProviderCommand::List, cancel).await?;
        match response.data {
            Some(data) => serde_json::from_value(data).map_err(|e| {
                ChefError::ProviderError(provider.to_string(), format!("malformed list response: {e}"))
            }),
            None => Ok(Vec::new()),
        }
    }

    pub async fn update(
        &self,
        provider: &str,
        name: &str,
        version: &str,
        force: bool,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let command = ProviderCommand::Update {
            name: name.to_string(),
            version: version.to_string(),
            force,
        };
        self.call(provider, command, cancel).await.map(|_| ())
    }

    pub async fn remove(&self, provider: &str, name: &str, cancel: &CancellationToken) -> Result<()> {
        let command = ProviderCommand::Remove {
            name: name.to_string(),
        };
        self.call(provider, command, cancel).await.map(|_| ())
    }

    pub async fn versions(
        &self,
        provider: &str,
        name: &str,
        page: u32,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>> {
        let command = ProviderCommand::Versions {
            name: name.to_string(),
            page,
        };
        let response = self.call(provider, command, cancel).await?;
        match response.data {
            Some(data) => serde_json::from_value(data).map_err(|e| {
                ChefError::ProviderError(provider.to_string(), format!("malformed versions response: {e}"))
            }),
            None => Ok(Vec::new()),
        }
    }

    /// Closes the session for one provider, e.g. after its registration changed.
    pub async fn drop_session(&self, provider: &str) {
        if let Some(session) = self.sessions.lock().await.remove(provider) {
            debug!("[{}] Dropping provider session", provider);
            session.close();
        }
    }

    /// Closes every live session. Calls racing with cleanup fail instead of
    /// starting new processes.
    pub async fn cleanup(&self) {
        self.cleaning_up.store(true, Ordering::SeqCst);
        let sessions: Vec<_> = self.sessions.lock().await.drain().collect();
        if !sessions.is_empty() {
            info!("Closing {} provider session(s)", sessions.len());
        }
        for (_, session) in sessions {
            session.close();
        }
        self.cleaning_up.store(false, Ordering::SeqCst);
    }
}
