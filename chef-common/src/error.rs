use std::sync::Arc;

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum ChefError {
    #[error("I/O Error: {0}")]
    Io(#[from] Arc<std::io::Error>),

    #[error("HTTP Request Error: {0}")]
    Http(#[from] Arc<reqwest::Error>),

    #[error("JSON Parsing Error: {0}")]
    Json(#[from] Arc<serde_json::Error>),

    #[error("TOML Parsing Error: {0}")]
    Toml(#[from] Arc<toml::de::Error>),

    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("Store file {path} is corrupt: {reason}")]
    StoreCorrupt { path: String, reason: String },

    #[error("Failed to write store file {path}: {reason}")]
    StoreWriteFailed { path: String, reason: String },

    #[error("Unable to get latest version of '{0}': {1}")]
    VersionLookupFailed(String, String),

    #[error("Download of '{0}' failed: {1}")]
    DownloadFailed(String, String),

    #[error("DownloadError: Failed to download '{0}': {1}")]
    HttpDownload(String, String),

    #[error("Provider '{0}' is unreachable: {1}")]
    ProviderUnreachable(String, String),

    #[error("Provider '{0}' session closed")]
    ProviderSessionClosed(String),

    #[error("Provider '{0}' returned an error: {1}")]
    ProviderError(String, String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("'{0}' is not installed")]
    NotInstalled(String),

    #[error("Unknown recipe: {0}")]
    UnknownRecipe(String),

    #[error("Installation Error: {0}")]
    InstallError(String),

    #[error("Failed to execute command: {0}")]
    CommandExecError(String),

    #[error("Generic Error: {0}")]
    Generic(String),
}

impl ChefError {
    /// Cancellation is an expected outcome, not something to report as a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ChefError::Cancelled)
    }
}

impl From<std::io::Error> for ChefError {
    fn from(err: std::io::Error) -> Self {
        ChefError::Io(Arc::new(err))
    }
}

impl From<reqwest::Error> for ChefError {
    fn from(err: reqwest::Error) -> Self {
        ChefError::Http(Arc::new(err))
    }
}

impl From<serde_json::Error> for ChefError {
    fn from(err: serde_json::Error) -> Self {
        ChefError::Json(Arc::new(err))
    }
}

impl From<toml::de::Error> for ChefError {
    fn from(err: toml::de::Error) -> Self {
        ChefError::Toml(Arc::new(err))
    }
}

pub type Result<T> = std::result::Result<T, ChefError>;
