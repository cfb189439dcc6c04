// chef-core/src/registry.rs
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use tracing::{debug, warn};

use crate::recipe::Recipe;

type RecipeList = Arc<Vec<Arc<dyn Recipe>>>;

/// Native recipes fixed at startup plus a provider-derived list that is only
/// ever swapped wholesale.
pub struct Registry {
    native: Vec<Arc<dyn Recipe>>,
    provided: RwLock<RecipeList>,
    // False while some provider failed to list; its recipes are then missing.
    complete: AtomicBool,
}

impl Registry {
    pub fn new(native: Vec<Arc<dyn Recipe>>) -> Self {
        let mut seen = HashSet::new();
        let native = native
            .into_iter()
            .filter(|r| {
                let fresh = seen.insert(r.name().to_string());
                if !fresh {
                    warn!("Duplicate recipe '{}' ignored", r.name());
                }
                fresh
            })
            .collect();
        Self {
            native,
            provided: RwLock::new(Arc::new(Vec::new())),
            complete: AtomicBool::new(true),
        }
    }

    fn provided(&self) -> RecipeList {
        match self.provided.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    pub fn native(&self) -> &[Arc<dyn Recipe>] {
        &self.native
    }

    /// Native recipes first, then provider recipes, in registration order.
    pub fn all(&self) -> Vec<Arc<dyn Recipe>> {
        let provided = self.provided();
        self.native
            .iter()
            .chain(provided.iter())
            .cloned()
            .collect()
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Recipe>> {
        if let Some(recipe) = self.native.iter().find(|r| r.name() == name) {
            return Some(Arc::clone(recipe));
        }
        self.provided().iter().find(|r| r.name() == name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Whether every recipe that should exist is present, i.e. the last
    /// provider refresh had no failures.
    pub fn is_complete(&self) -> bool {
        self.complete.load(Ordering::SeqCst)
    }

    pub fn set_complete(&self, complete: bool) {
        self.complete.store(complete, Ordering::SeqCst);
    }

    /// Swaps in a fresh provider list. Names colliding with native recipes or
    /// with an earlier provider recipe are dropped.
    pub fn replace_provided(&self, recipes: Vec<Arc<dyn Recipe>>) {
        let mut seen: HashSet<String> = self.native.iter().map(|r| r.name().to_string()).collect();
        let recipes: Vec<_> = recipes
            .into_iter()
            .filter(|r| {
                let fresh = seen.insert(r.name().to_string());
                if !fresh {
                    warn!(
                        "Provider recipe '{}' from {:?} shadows an existing recipe; ignored",
                        r.name(),
                        r.provider()
                    );
                }
                fresh
            })
            .collect();
        debug!("Registry now holds {} provider recipes", recipes.len());
        let next = Arc::new(recipes);
        match self.provided.write() {
            Ok(mut guard) => *guard = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
    }
}
