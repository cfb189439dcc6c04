// chef-common/src/lib.rs
pub mod config;
pub mod error;
pub mod event;
pub mod model;

// Re-export key types
pub use config::Config;
pub use error::{ChefError, Result};
pub use event::{ChefEvent, CheckStatus};
pub use model::{
    AppDescriptor, DesktopFile, InstallKind, InstallResult, ProviderRegistration, StoreEntry,
};
