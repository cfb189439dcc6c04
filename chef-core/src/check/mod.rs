pub mod update;

pub use update::{check_versions, classify, VersionCheck, MAX_CONCURRENT_VERSION_CHECKS};
