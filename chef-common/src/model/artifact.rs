// chef-common/src/model/artifact.rs
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// What a recipe's download routine produced. Relative paths are resolved
/// against the working directory the download ran in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InstallResult {
    /// A single executable, copied into the managed bin directory.
    Exe(PathBuf),
    /// A whole directory, copied into the apps directory, with `exe` (relative
    /// to `path`) symlinked into the bin directory.
    Dir { path: PathBuf, exe: PathBuf },
    /// Nothing managed locally; the artifact is reachable on PATH under this command.
    Extern(String),
}

impl InstallResult {
    pub fn exe(path: impl Into<PathBuf>) -> Self {
        InstallResult::Exe(path.into())
    }

    pub fn dir(path: impl Into<PathBuf>, exe: impl Into<PathBuf>) -> Self {
        InstallResult::Dir {
            path: path.into(),
            exe: exe.into(),
        }
    }

    pub fn external(command: impl Into<String>) -> Self {
        InstallResult::Extern(command.into())
    }

    pub fn is_extern(&self) -> bool {
        matches!(self, InstallResult::Extern(_))
    }
}
