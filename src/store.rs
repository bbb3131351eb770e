//! Config stores.
//!
//! The engine reads and writes route configs through [`ConfigStore`]. The
//! store is the source of truth; the route table is derived from it.

use crate::config::RouteConfig;
use crate::error::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::debug;

/// Persistence for route configs. A read reflects the most recent
/// successful write.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// All configs in registration order.
    async fn get_all(&self) -> Result<Vec<RouteConfig>, StoreError>;

    /// Replace the whole list.
    async fn replace_all(&self, configs: Vec<RouteConfig>) -> Result<(), StoreError>;

    /// Add one config at the end.
    async fn append(&self, config: RouteConfig) -> Result<(), StoreError>;

    /// Remove every config with this id, returning how many were removed.
    async fn remove(&self, id: &str) -> Result<usize, StoreError>;

    /// Module records, as last imported.
    async fn modules(&self) -> Result<Vec<Value>, StoreError>;

    /// Replace modules and configs together.
    async fn import(&self, modules: Vec<Value>, configs: Vec<RouteConfig>) -> Result<(), StoreError>;

    /// Configs belonging to one module.
    async fn by_module(&self, module_id: &str) -> Result<Vec<RouteConfig>, StoreError> {
        Ok(self
            .get_all()
            .await?
            .into_iter()
            .filter(|c| c.module_id.as_deref() == Some(module_id))
            .collect())
    }
}

/// Serialized form of a store:
/// `{ "modules": [...], "apis": [...], "exportTime": "..." }`.
///
/// Modules are free-form objects keyed by `id`; routes refer to them
/// through `moduleId`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(default)]
    pub modules: Vec<Value>,
    #[serde(default)]
    pub apis: Vec<RouteConfig>,
    #[serde(default = "Utc::now")]
    pub export_time: DateTime<Utc>,
}

impl Snapshot {
    pub fn now(modules: Vec<Value>, apis: Vec<RouteConfig>) -> Self {
        Self {
            modules,
            apis,
            export_time: Utc::now(),
        }
    }
}

/// In-process store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    configs: RwLock<Vec<RouteConfig>>,
    modules: RwLock<Vec<Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_configs(configs: Vec<RouteConfig>) -> Self {
        Self {
            configs: RwLock::new(configs),
            ..Self::default()
        }
    }
}

#[async_trait]
impl ConfigStore for MemoryStore {
    async fn get_all(&self) -> Result<Vec<RouteConfig>, StoreError> {
        Ok(self.configs.read().await.clone())
    }

    async fn replace_all(&self, configs: Vec<RouteConfig>) -> Result<(), StoreError> {
        *self.configs.write().await = configs;
        Ok(())
    }

    async fn append(&self, config: RouteConfig) -> Result<(), StoreError> {
        self.configs.write().await.push(config);
        Ok(())
    }

    async fn remove(&self, id: &str) -> Result<usize, StoreError> {
        let mut configs = self.configs.write().await;
        let before = configs.len();
        configs.retain(|c| c.id != id);
        Ok(before - configs.len())
    }

    async fn modules(&self) -> Result<Vec<Value>, StoreError> {
        Ok(self.modules.read().await.clone())
    }

    async fn import(&self, modules: Vec<Value>, configs: Vec<RouteConfig>) -> Result<(), StoreError> {
        let mut current = self.configs.write().await;
        *self.modules.write().await = modules;
        *current = configs;
        Ok(())
    }
}

/// Store persisted as a JSON snapshot file.
///
/// The file is read on first use and rewritten after every change, via a
/// temporary file renamed into place. A missing file is an empty store.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    cache: RwLock<Option<Contents>>,
}

#[derive(Debug, Clone, Default)]
struct Contents {
    modules: Vec<Value>,
    apis: Vec<RouteConfig>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: RwLock::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Contents, StoreError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(Contents::default()),
            Ok(bytes) => {
                let snapshot: Snapshot = serde_json::from_slice(&bytes)?;
                debug!(path = %self.path.display(), routes = snapshot.apis.len(), "Loaded config snapshot");
                Ok(Contents {
                    modules: snapshot.modules,
                    apis: snapshot.apis,
                })
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Contents::default()),
            Err(e) => Err(e.into()),
        }
    }

    async fn persist(&self, contents: &Contents) -> Result<(), StoreError> {
        let snapshot = Snapshot::now(contents.modules.clone(), contents.apis.clone());
        let bytes = serde_json::to_vec_pretty(&snapshot)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        debug!(path = %self.path.display(), routes = contents.apis.len(), "Wrote config snapshot");
        Ok(())
    }

    async fn read(&self) -> Result<Contents, StoreError> {
        if let Some(contents) = self.cache.read().await.as_ref() {
            return Ok(contents.clone());
        }
        let mut cache = self.cache.write().await;
        if cache.is_none() {
            *cache = Some(self.load().await?);
        }
        Ok(cache.clone().unwrap_or_default())
    }

    /// Apply `change` to the current contents and write the result.
    async fn update<T: Send>(
        &self,
        change: impl FnOnce(&mut Contents) -> T + Send,
    ) -> Result<T, StoreError> {
        let mut cache = self.cache.write().await;
        let mut contents = match cache.take() {
            Some(contents) => contents,
            None => self.load().await?,
        };
        let result = change(&mut contents);
        let persisted = self.persist(&contents).await;
        // Keep the cache in step with the file, not with the failed edit
        *cache = match &persisted {
            Ok(()) => Some(contents),
            Err(_) => None,
        };
        persisted.map(|()| result)
    }
}

#[async_trait]
impl ConfigStore for FileStore {
    async fn get_all(&self) -> Result<Vec<RouteConfig>, StoreError> {
        Ok(self.read().await?.apis)
    }

    async fn replace_all(&self, configs: Vec<RouteConfig>) -> Result<(), StoreError> {
        self.update(move |current| current.apis = configs).await
    }

    async fn append(&self, config: RouteConfig) -> Result<(), StoreError> {
        self.update(move |current| current.apis.push(config)).await
    }

    async fn remove(&self, id: &str) -> Result<usize, StoreError> {
        self.update(|current| {
            let before = current.apis.len();
            current.apis.retain(|c| c.id != id);
            before - current.apis.len()
        })
        .await
    }

    async fn modules(&self) -> Result<Vec<Value>, StoreError> {
        Ok(self.read().await?.modules)
    }

    async fn import(&self, modules: Vec<Value>, configs: Vec<RouteConfig>) -> Result<(), StoreError> {
        self.update(move |current| {
            current.modules = modules;
            current.apis = configs;
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio_test::assert_ok;

    fn config(id: &str, module: Option<&str>) -> RouteConfig {
        let mut config = RouteConfig::new("GET", format!("/{}", id), json!({})).with_id(id);
        config.module_id = module.map(String::from);
        config
    }

    #[tokio::test]
    async fn test_memory_store_operations() {
        let store = MemoryStore::new();
        assert!(store.get_all().await.unwrap().is_empty());

        assert_ok!(store.append(config("a", Some("m1"))).await);
        assert_ok!(store.append(config("b", None)).await);
        assert_ok!(store.append(config("a", Some("m1"))).await);

        assert_eq!(store.by_module("m1").await.unwrap().len(), 2);
        assert_eq!(store.remove("a").await.unwrap(), 2);
        assert_eq!(store.remove("a").await.unwrap(), 0);

        assert_ok!(store.replace_all(vec![config("c", None)]).await);
        let all = store.get_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, "c");
    }

    #[tokio::test]
    async fn test_file_store_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("routes.json"));
        assert!(store.get_all().await.unwrap().is_empty());
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn test_file_store_persists_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("routes.json");

        let store = FileStore::new(&path);
        assert_ok!(store.append(config("a", Some("m"))).await);
        assert_ok!(store.append(config("b", None)).await);
        assert_eq!(store.remove("b").await.unwrap(), 1);

        let raw: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(raw["apis"].as_array().unwrap().len(), 1);
        assert_eq!(raw["apis"][0]["moduleId"], "m");
        assert!(raw["exportTime"].is_string());

        // A fresh store reads what the first one wrote
        let reopened = FileStore::new(&path);
        let all = reopened.get_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, "a");
        assert_eq!(reopened.by_module("m").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_file_store_reads_legacy_export() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(
            file.path(),
            r#"{"modules": [{"id": 1, "name": "users"}],
                "apis": [{"id": 3, "moduleId": 1, "method": "get", "url": "/u", "mockData": "{}"}],
                "exportTime": "2024-05-01T10:00:00Z"}"#,
        )
        .unwrap();

        let store = FileStore::new(file.path());
        let all = store.get_all().await.unwrap();
        assert_eq!(all[0].id, "3");
        assert_eq!(all[0].path, "/u");
        assert_eq!(store.by_module("1").await.unwrap().len(), 1);
        assert_eq!(store.modules().await.unwrap(), vec![json!({"id": 1, "name": "users"})]);
    }

    #[tokio::test]
    async fn test_import_replaces_modules_and_configs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("routes.json");
        let store = FileStore::new(&path);
        assert_ok!(store.append(config("old", None)).await);

        let modules = vec![json!({"id": "m", "name": "Module M"})];
        assert_ok!(store.import(modules.clone(), vec![config("a", Some("m"))]).await);

        let reopened = FileStore::new(&path);
        assert_eq!(reopened.modules().await.unwrap(), modules);
        let all = reopened.get_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, "a");

        let memory = MemoryStore::with_configs(vec![config("old", None)]);
        assert_ok!(memory.import(modules.clone(), vec![]).await);
        assert!(memory.get_all().await.unwrap().is_empty());
        assert_eq!(memory.modules().await.unwrap(), modules);
    }

    #[tokio::test]
    async fn test_file_store_corrupt_file_errors() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "not json").unwrap();

        let store = FileStore::new(file.path());
        assert!(matches!(
            store.get_all().await,
            Err(StoreError::Serialization(_))
        ));
    }
}
