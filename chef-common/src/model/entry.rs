// chef-common/src/model/entry.rs
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Shape of a completed installation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum InstallKind {
    /// Flat single-file install in the bin directory.
    #[default]
    File,
    /// Directory install; holds the directory name under the apps directory.
    Dir(String),
    /// Externally resolved command; nothing managed on disk.
    Extern(String),
}

/// Persisted record of one installed artifact.
///
/// On disk this is `{"version": .., "dir"?: .., "extern"?: ..}`; the enum makes
/// it impossible to carry both install markers at once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawStoreEntry", into = "RawStoreEntry")]
pub struct StoreEntry {
    pub version: String,
    pub kind: InstallKind,
}

impl StoreEntry {
    pub fn new(version: impl Into<String>, kind: InstallKind) -> Self {
        Self {
            version: version.into(),
            kind,
        }
    }

    pub fn file(version: impl Into<String>) -> Self {
        Self::new(version, InstallKind::File)
    }

    pub fn dir(&self) -> Option<&str> {
        match &self.kind {
            InstallKind::Dir(dir) => Some(dir),
            _ => None,
        }
    }

    pub fn extern_command(&self) -> Option<&str> {
        match &self.kind {
            InstallKind::Extern(cmd) => Some(cmd),
            _ => None,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct RawStoreEntry {
    version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    dir: Option<String>,
    #[serde(rename = "extern", default, skip_serializing_if = "Option::is_none")]
    extern_cmd: Option<String>,
}

impl From<RawStoreEntry> for StoreEntry {
    fn from(raw: RawStoreEntry) -> Self {
        let kind = match (raw.dir, raw.extern_cmd) {
            (Some(dir), Some(cmd)) => {
                warn!(
                    "Store entry carries both dir '{}' and extern '{}'; keeping extern",
                    dir, cmd
                );
                InstallKind::Extern(cmd)
            }
            (None, Some(cmd)) => InstallKind::Extern(cmd),
            (Some(dir), None) => InstallKind::Dir(dir),
            (None, None) => InstallKind::File,
        };
        StoreEntry {
            version: raw.version,
            kind,
        }
    }
}

impl From<StoreEntry> for RawStoreEntry {
    fn from(entry: StoreEntry) -> Self {
        let (dir, extern_cmd) = match entry.kind {
            InstallKind::File => (None, None),
            InstallKind::Dir(dir) => (Some(dir), None),
            InstallKind::Extern(cmd) => (None, Some(cmd)),
        };
        RawStoreEntry {
            version: entry.version,
            dir,
            extern_cmd,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn flat_entry_serializes_version_only() {
        let value = serde_json::to_value(StoreEntry::file("1.0.0")).unwrap();
        assert_eq!(value, json!({"version": "1.0.0"}));
    }

    #[test]
    fn extern_entry_uses_reserved_word_key() {
        let entry = StoreEntry::new("2.1", InstallKind::Extern("gh".into()));
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value, json!({"version": "2.1", "extern": "gh"}));
    }

    #[test]
    fn both_markers_collapse_to_extern() {
        let entry: StoreEntry =
            serde_json::from_value(json!({"version": "1", "dir": "app", "extern": "app"})).unwrap();
        assert_eq!(entry.kind, InstallKind::Extern("app".into()));
        assert_eq!(entry.dir(), None);
    }

    #[test]
    fn dir_entry_round_trips_through_json() {
        let entry: StoreEntry =
            serde_json::from_value(json!({"version": "3", "dir": "tool-3"})).unwrap();
        assert_eq!(entry.dir(), Some("tool-3"));
        assert_eq!(entry.extern_command(), None);
    }
}
