// chef-common/src/model/desktop.rs
use serde::{Deserialize, Serialize};

/// Launcher entry a recipe wants created after a successful install.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DesktopFile {
    /// Display name; defaults to the recipe name.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub terminal: bool,
}
