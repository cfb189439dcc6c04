// chef-core/src/lib.rs
//! Reconciliation engine, store, runner and provider protocol for chef.

pub mod check;
pub mod chef;
pub mod context;
pub mod desktop;
pub mod events;
pub mod install;
pub mod pipeline;
pub mod provider;
pub mod recipe;
pub mod registry;
pub mod runner;
pub mod store;
pub mod uninstall;

pub use chef::{Chef, ChefBuilder, ListRow};
pub use context::CoreContext;
pub use desktop::{DesktopEntries, NoDesktopEntries, XdgDesktopEntries};
pub use events::Events;
pub use pipeline::{InstallOutcome, UpdateOptions, UpdateReport, UpdateRow};
pub use provider::{serve_provider, ProcessLauncher, ProviderLauncher, ProviderSession};
pub use recipe::{DownloadContext, Recipe};
pub use registry::Registry;
pub use runner::{Resolution, RunningProcess};
pub use store::Store;
