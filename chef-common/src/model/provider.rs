// chef-common/src/model/provider.rs
use serde::{Deserialize, Serialize};

/// A registered external provider: a shell command line that speaks the
/// provider protocol when launched with `--chef`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProviderRegistration {
    pub name: String,
    pub command: String,
}

/// One installable application advertised by a provider's `list` response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AppDescriptor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    /// Installed version as the provider sees it (empty when not installed).
    #[serde(default)]
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub has_versions: bool,
}
