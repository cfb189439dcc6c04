// chef-common/src/model/mod.rs
pub mod artifact;
pub mod desktop;
pub mod entry;
pub mod provider;

// Re-export
pub use artifact::InstallResult;
pub use desktop::DesktopFile;
pub use entry::{InstallKind, StoreEntry};
pub use provider::{AppDescriptor, ProviderRegistration};
