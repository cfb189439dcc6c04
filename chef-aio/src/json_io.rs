// chef-aio/src/json_io.rs
use std::path::Path;

use chef_common::error::{ChefError, Result};
use serde::Serialize;
use tracing::debug;

/// Asynchronously writes serializable data to a JSON file (pretty-printed),
/// replacing the file atomically.
pub async fn write_json_async<T: Serialize + ?Sized>(path: &Path, data: &T) -> Result<()> {
    debug!("Async Writing JSON to: {}", path.display());
    let mut json_bytes = serde_json::to_vec_pretty(data).map_err(ChefError::from)?;
    json_bytes.push(b'\n');
    crate::fs::atomic_write_file_async(path, json_bytes).await
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    #[tokio::test]
    async fn writes_pretty_json_with_trailing_newline() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("data.json");
        let mut data = BTreeMap::new();
        data.insert("editor".to_string(), "vim".to_string());

        write_json_async(&path, &data).await.unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "{\n  \"editor\": \"vim\"\n}\n");
    }
}
