// chef-common/src/config.rs
use std::env;
use std::path::{Path, PathBuf};

use directories::{BaseDirs, UserDirs};
use tracing::debug;

use super::error::{ChefError, Result};

const CHEF_ROOT_DIRNAME: &str = "chef";
const DEFAULT_SCRIPT_NAME: &str = "chef";

#[derive(Debug, Clone)]
pub struct Config {
    pub chef_root: PathBuf,
    pub bin_dir: PathBuf,
    /// Namespace of the embedding program; every script gets its own store file.
    pub script_name: String,
}

impl Config {
    pub fn load(script_name: &str) -> Result<Self> {
        debug!("Loading chef configuration for script '{}'", script_name);

        let chef_root = match env::var("CHEF_ROOT").ok().filter(|s| !s.is_empty()) {
            Some(root) => PathBuf::from(root),
            None => default_chef_root()?,
        };
        debug!("Effective CHEF_ROOT set to: {}", chef_root.display());

        let bin_dir = match env::var("CHEF_BIN_DIR").ok().filter(|s| !s.is_empty()) {
            Some(dir) => PathBuf::from(dir),
            None => home_dir().join(".local").join("bin"),
        };
        debug!("Managed binaries go to: {}", bin_dir.display());

        Ok(Self::with_paths(chef_root, bin_dir, script_name))
    }

    /// Builds a config rooted at explicit directories, bypassing the environment.
    pub fn with_paths(chef_root: PathBuf, bin_dir: PathBuf, script_name: &str) -> Self {
        let script_name = sanitize_script_name(script_name);
        Self {
            chef_root,
            bin_dir,
            script_name,
        }
    }

    pub fn chef_root(&self) -> &Path {
        &self.chef_root
    }

    pub fn bin_dir(&self) -> &Path {
        &self.bin_dir
    }

    pub fn apps_dir(&self) -> PathBuf {
        self.chef_root.join("apps")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.chef_root.join("logs")
    }

    pub fn tmp_dir(&self) -> PathBuf {
        self.chef_root.join("tmp")
    }

    pub fn store_path(&self) -> PathBuf {
        self.chef_root.join(format!("{}.json", self.script_name))
    }

    /// Path of the managed single-file binary for `name`.
    pub fn binary_path(&self, name: &str) -> PathBuf {
        self.bin_dir
            .join(format!("{name}{}", env::consts::EXE_SUFFIX))
    }

    pub fn app_dir_path(&self, dir_name: &str) -> PathBuf {
        self.apps_dir().join(dir_name)
    }

    pub fn desktop_dir(&self) -> PathBuf {
        BaseDirs::new().map_or_else(
            || home_dir().join(".local/share/applications"),
            |dirs| dirs.data_dir().join("applications"),
        )
    }
}

fn default_chef_root() -> Result<PathBuf> {
    BaseDirs::new()
        .map(|dirs| dirs.data_dir().join(CHEF_ROOT_DIRNAME))
        .or_else(|| UserDirs::new().map(|ud| ud.home_dir().join(".chef")))
        .ok_or_else(|| ChefError::Config("could not determine a home directory".to_string()))
}

fn home_dir() -> PathBuf {
    UserDirs::new().map_or_else(|| PathBuf::from("/"), |ud| ud.home_dir().to_path_buf())
}

/// Script names come from executable file names; strip extensions and path separators.
fn sanitize_script_name(name: &str) -> String {
    let stem = Path::new(name)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    if stem.is_empty() {
        DEFAULT_SCRIPT_NAME.to_string()
    } else {
        stem
    }
}
