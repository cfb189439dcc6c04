// chef-core/src/context.rs
use std::sync::Arc;

use chef_common::Config;

use crate::desktop::DesktopEntries;
use crate::events::Events;
use crate::registry::Registry;
use crate::store::Store;

/// Shared handles every engine operation works against.
#[derive(Clone)]
pub struct CoreContext {
    pub config: Config,
    pub registry: Arc<Registry>,
    pub store: Arc<Store>,
    pub events: Events,
    pub desktop: Arc<dyn DesktopEntries>,
    pub http: reqwest::Client,
}

impl CoreContext {
    pub fn new(
        config: Config,
        registry: Arc<Registry>,
        desktop: Arc<dyn DesktopEntries>,
        http: reqwest::Client,
    ) -> Self {
        let store = Arc::new(Store::new(config.store_path(), Arc::clone(&registry)));
        Self {
            config,
            registry,
            store,
            events: Events::new(),
            desktop,
            http,
        }
    }
}
