// chef-core/src/store.rs
//! The durable JSON ledger of installed versions.
//!
//! One file per script namespace holds artifact entries keyed by name plus the
//! reserved `_settings` and `_providers` keys. Reads tolerate a missing file and
//! the legacy `"name": "version"` shape; entries for names the registry no longer
//! knows are filtered out on read and dropped by the next entry write, unless
//! the registry is incomplete because a provider failed to list.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chef_aio::fs::read_optional_async;
use chef_aio::json_io::write_json_async;
use chef_common::error::{ChefError, Result};
use chef_common::model::{ProviderRegistration, StoreEntry};
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::registry::Registry;

const SETTINGS_KEY: &str = "_settings";
const PROVIDERS_KEY: &str = "_providers";

/// Everything one store file holds, before pruning.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreDocument {
    pub entries: BTreeMap<String, StoreEntry>,
    pub settings: BTreeMap<String, String>,
    pub providers: Vec<ProviderRegistration>,
}

impl StoreDocument {
    fn parse(path: &Path, bytes: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(bytes).map_err(|e| ChefError::StoreCorrupt {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let Value::Object(map) = value else {
            return Err(ChefError::StoreCorrupt {
                path: path.display().to_string(),
                reason: "top-level value is not an object".to_string(),
            });
        };

        let mut doc = StoreDocument::default();
        for (key, value) in map {
            match key.as_str() {
                SETTINGS_KEY => doc.settings = parse_settings(value),
                PROVIDERS_KEY => doc.providers = parse_providers(value),
                _ => match value {
                    // Legacy format: bare version string.
                    Value::String(version) => {
                        doc.entries.insert(key, StoreEntry::file(version));
                    }
                    other => match serde_json::from_value::<StoreEntry>(other) {
                        Ok(entry) => {
                            doc.entries.insert(key, entry);
                        }
                        Err(e) => warn!("Ignoring malformed store entry '{}': {}", key, e),
                    },
                },
            }
        }
        Ok(doc)
    }

    fn to_value(&self) -> Result<Value> {
        let mut map = Map::new();
        for (name, entry) in &self.entries {
            map.insert(name.clone(), serde_json::to_value(entry)?);
        }
        if !self.settings.is_empty() {
            map.insert(SETTINGS_KEY.to_string(), serde_json::to_value(&self.settings)?);
        }
        if !self.providers.is_empty() {
            map.insert(PROVIDERS_KEY.to_string(), serde_json::to_value(&self.providers)?);
        }
        Ok(Value::Object(map))
    }
}

fn parse_settings(value: Value) -> BTreeMap<String, String> {
    let Value::Object(map) = value else {
        warn!("Ignoring malformed {} (not an object)", SETTINGS_KEY);
        return BTreeMap::new();
    };
    map.into_iter()
        .filter_map(|(k, v)| match v {
            Value::String(s) => Some((k, s)),
            _ => {
                warn!("Ignoring non-string setting '{}'", k);
                None
            }
        })
        .collect()
}

fn parse_providers(value: Value) -> Vec<ProviderRegistration> {
    let Value::Array(items) = value else {
        warn!("Ignoring malformed {} (not an array)", PROVIDERS_KEY);
        return Vec::new();
    };
    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value(item) {
            Ok(reg) => Some(reg),
            Err(e) => {
                warn!("Ignoring malformed provider registration: {}", e);
                None
            }
        })
        .collect()
}

pub struct Store {
    path: PathBuf,
    registry: Arc<Registry>,
    // Serializes read-modify-write cycles issued from this process.
    write_lock: Mutex<()>,
}

impl Store {
    pub fn new(path: PathBuf, registry: Arc<Registry>) -> Self {
        Self {
            path,
            registry,
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the whole document without pruning.
    pub async fn read_document(&self) -> Result<StoreDocument> {
        match read_optional_async(&self.path).await? {
            Some(bytes) => StoreDocument::parse(&self.path, &bytes),
            None => {
                debug!("Store {} does not exist yet", self.path.display());
                Ok(StoreDocument::default())
            }
        }
    }

    async fn write_document(&self, doc: &StoreDocument) -> Result<()> {
        let write_failed = |reason: String| ChefError::StoreWriteFailed {
            path: self.path.display().to_string(),
            reason,
        };
        let value = doc.to_value().map_err(|e| write_failed(e.to_string()))?;
        write_json_async(&self.path, &value)
            .await
            .map_err(|e| write_failed(e.to_string()))
    }

    /// Installed entries for every name the registry currently knows.
    pub async fn read_all(&self) -> Result<BTreeMap<String, StoreEntry>> {
        let doc = self.read_document().await?;
        Ok(self.prune(doc.entries))
    }

    fn prune(&self, entries: BTreeMap<String, StoreEntry>) -> BTreeMap<String, StoreEntry> {
        entries
            .into_iter()
            .filter(|(name, _)| {
                let known = self.registry.contains(name);
                if !known {
                    debug!("Pruning store entry for unknown recipe '{}'", name);
                }
                known
            })
            .collect()
    }

    /// Pruning applied before an entry write. Unknown names survive while the
    /// registry is incomplete.
    fn prune_for_write(&self, entries: BTreeMap<String, StoreEntry>) -> BTreeMap<String, StoreEntry> {
        if self.registry.is_complete() {
            self.prune(entries)
        } else {
            debug!("Registry incomplete; keeping unknown store entries");
            entries
        }
    }

    /// Replaces every artifact entry, keeping settings and provider registrations.
    pub async fn write_all(&self, entries: BTreeMap<String, StoreEntry>) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut doc = self.read_document().await?;
        doc.entries = entries;
        self.write_document(&doc).await
    }

    pub async fn get_entry(&self, name: &str) -> Result<Option<StoreEntry>> {
        Ok(self.read_all().await?.remove(name))
    }

    pub async fn set_entry(&self, name: &str, entry: StoreEntry) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut doc = self.read_document().await?;
        let mut entries = self.prune_for_write(std::mem::take(&mut doc.entries));
        entries.insert(name.to_string(), entry);
        doc.entries = entries;
        self.write_document(&doc).await
    }

    /// Returns the removed entry, if there was one.
    pub async fn remove_entry(&self, name: &str) -> Result<Option<StoreEntry>> {
        let _guard = self.write_lock.lock().await;
        let mut doc = self.read_document().await?;
        let mut entries = self.prune_for_write(std::mem::take(&mut doc.entries));
        let removed = entries.remove(name);
        doc.entries = entries;
        self.write_document(&doc).await?;
        Ok(removed)
    }

    pub async fn settings(&self) -> Result<BTreeMap<String, String>> {
        Ok(self.read_document().await?.settings)
    }

    pub async fn get_setting(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read_document().await?.settings.remove(key))
    }

    pub async fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut doc = self.read_document().await?;
        doc.settings.insert(key.to_string(), value.to_string());
        self.write_document(&doc).await
    }

    pub async fn get_providers(&self) -> Result<Vec<ProviderRegistration>> {
        Ok(self.read_document().await?.providers)
    }

    /// Registers a provider, replacing any prior registration with the same name.
    pub async fn add_provider(&self, registration: ProviderRegistration) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut doc = self.read_document().await?;
        match doc
            .providers
            .iter_mut()
            .find(|p| p.name == registration.name)
        {
            Some(existing) => *existing = registration,
            None => doc.providers.push(registration),
        }
        self.write_document(&doc).await
    }

    /// Returns whether a registration was removed.
    pub async fn remove_provider(&self, name: &str) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        let mut doc = self.read_document().await?;
        let before = doc.providers.len();
        doc.providers.retain(|p| p.name != name);
        if doc.providers.len() == before {
            return Ok(false);
        }
        self.write_document(&doc).await?;
        Ok(true)
    }
}
