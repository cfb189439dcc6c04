// chef-core/src/install/mod.rs
pub mod materialize;

pub use materialize::{materialize, remove_installed_files, Materialized};
