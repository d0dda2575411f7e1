//! Content-addressed HTTP response cache.
//!
//! Keys are the blake3 hash of the canonicalised `(url, params)` request,
//! so a cache entry can never depend on strategy decisions. Values are the
//! provider's JSON bodies. Writes are atomic: write to a `.tmp` sibling,
//! then rename into place.

use super::provider::DataError;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

pub struct HttpCache {
    root: PathBuf,
}

impl HttpCache {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, DataError> {
        let root = root.into();
        fs::create_dir_all(&root)
            .map_err(|e| DataError::Cache(format!("create cache dir: {e}")))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Stable key: blake3 over url plus params sorted by name. The API key
    /// is stripped by the caller before this point.
    fn key(url: &str, params: &[(&str, String)]) -> String {
        let mut sorted: Vec<_> = params.to_vec();
        sorted.sort_by(|a, b| a.0.cmp(b.0));
        let mut hasher = blake3::Hasher::new();
        hasher.update(url.as_bytes());
        for (k, v) in &sorted {
            hasher.update(b"\0");
            hasher.update(k.as_bytes());
            hasher.update(b"=");
            hasher.update(v.as_bytes());
        }
        hasher.finalize().to_hex().to_string()
    }

    fn path_for(&self, url: &str, params: &[(&str, String)]) -> PathBuf {
        self.root.join(format!("{}.json", Self::key(url, params)))
    }

    pub fn get(&self, url: &str, params: &[(&str, String)]) -> Option<Value> {
        let path = self.path_for(url, params);
        let contents = fs::read_to_string(path).ok()?;
        serde_json::from_str(&contents).ok()
    }

    pub fn put(&self, url: &str, params: &[(&str, String)], value: &Value) -> Result<(), DataError> {
        let path = self.path_for(url, params);
        let tmp = path.with_extension("json.tmp");
        let body = serde_json::to_string(value)
            .map_err(|e| DataError::Cache(format!("serialize cache entry: {e}")))?;
        fs::write(&tmp, body).map_err(|e| DataError::Cache(format!("write cache tmp: {e}")))?;
        fs::rename(&tmp, &path).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            DataError::Cache(format!("atomic rename: {e}"))
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let cache = HttpCache::new(dir.path()).unwrap();
        let params = [("date", "2025-03-03".to_string())];

        assert!(cache.get("https://x/a", &params).is_none());
        cache.put("https://x/a", &params, &json!({"results": [1, 2]})).unwrap();
        let hit = cache.get("https://x/a", &params).unwrap();
        assert_eq!(hit["results"][1], 2);
    }

    #[test]
    fn key_ignores_param_order() {
        let a = [("x", "1".to_string()), ("y", "2".to_string())];
        let b = [("y", "2".to_string()), ("x", "1".to_string())];
        assert_eq!(HttpCache::key("u", &a), HttpCache::key("u", &b));
    }

    #[test]
    fn different_params_different_keys() {
        let a = [("date", "2025-03-03".to_string())];
        let b = [("date", "2025-03-04".to_string())];
        assert_ne!(HttpCache::key("u", &a), HttpCache::key("u", &b));
    }
}
