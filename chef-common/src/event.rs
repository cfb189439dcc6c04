// chef-common/src/event.rs
use serde::{Deserialize, Serialize};

use crate::error::ChefError;

/// Result of comparing one recipe's stored version against its latest version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckStatus {
    UpToDate,
    NeedsUpdate {
        installed: Option<String>,
        latest: String,
    },
    Skipped(String),
    Error(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ChefEvent {
    Phase {
        message: String,
    },
    VersionChecked {
        name: String,
        status: CheckStatus,
    },
    InstallStarted {
        name: String,
        version: String,
    },
    Progress {
        name: String,
        loaded: u64,
        total: Option<u64>,
    },
    InstallFinished {
        name: String,
        version: String,
    },
    InstallFailed {
        name: String,
        error: String,
    },
    StatusChanged {
        name: String,
        running: bool,
    },
    UpdateFinished {
        updated: usize,
        failed: usize,
        cancelled: bool,
    },
}

impl ChefEvent {
    pub fn phase(message: impl Into<String>) -> Self {
        ChefEvent::Phase {
            message: message.into(),
        }
    }

    pub fn install_failed(name: &str, error: &ChefError) -> Self {
        ChefEvent::InstallFailed {
            name: name.to_string(),
            error: error.to_string(),
        }
    }
}
