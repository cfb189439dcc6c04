pub mod engine;
pub mod worker;

pub use engine::{
    install_version, resolve_targets, update, InstallOutcome, UpdateOptions, UpdateReport,
    UpdateRow,
};
pub use worker::install_artifact;
