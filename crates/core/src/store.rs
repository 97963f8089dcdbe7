//! Pie storage.
//!
//! Pies are append-only: once saved under an id they are never overwritten or removed. The file
//! store shards pies by the first four hex characters of their id:
//!
//! ```text
//! <PIE_DATA_DIR>/<s1>/<s2>/<32hex-id>.json
//! ```

use crate::error::{StoreError, StoreResult};
use crate::pie::Pie;
use async_trait::async_trait;
use riskservice_uuid::PieId;
use std::collections::HashMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

/// Keyed, append-only pie storage.
#[async_trait]
pub trait PieStore: Send + Sync {
    /// Stores a new pie.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::AlreadyExists`] if a pie with the same id is already stored.
    async fn save(&self, pie: &Pie) -> StoreResult<()>;

    /// Looks a pie up by id.
    async fn get(&self, id: PieId) -> StoreResult<Option<Pie>>;
}

/// Pie store on the local filesystem.
#[derive(Clone, Debug)]
pub struct FilePieStore {
    data_dir: PathBuf,
}

impl FilePieStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Path a pie with `id` is stored at.
    pub fn pie_path(&self, id: PieId) -> PathBuf {
        id.sharded_file(&self.data_dir)
    }

    fn save_blocking(path: &Path, pie: &Pie) -> StoreResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(StoreError::DirCreation)?;
        }
        let json = serde_json::to_string_pretty(pie).map_err(StoreError::Serialization)?;

        let mut file = match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(StoreError::AlreadyExists(pie.id()))
            }
            Err(e) => return Err(StoreError::FileWrite(e)),
        };
        file.write_all(json.as_bytes())
            .map_err(StoreError::FileWrite)
    }

    fn get_blocking(path: &Path) -> StoreResult<Option<Pie>> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::FileRead(e)),
        };
        let pie = serde_json::from_str(&contents).map_err(StoreError::Deserialization)?;
        Ok(Some(pie))
    }
}

#[async_trait]
impl PieStore for FilePieStore {
    async fn save(&self, pie: &Pie) -> StoreResult<()> {
        let path = self.pie_path(pie.id());
        let pie = pie.clone();
        tokio::task::spawn_blocking(move || Self::save_blocking(&path, &pie))
            .await
            .map_err(|e| StoreError::Task(e.to_string()))?
    }

    async fn get(&self, id: PieId) -> StoreResult<Option<Pie>> {
        let path = self.pie_path(id);
        tokio::task::spawn_blocking(move || Self::get_blocking(&path))
            .await
            .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

/// In-memory pie store.
#[derive(Debug, Default)]
pub struct MemoryPieStore {
    pies: RwLock<HashMap<PieId, Pie>>,
}

impl MemoryPieStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.pies.read().map(|p| p.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ids of every stored pie, in ascending order.
    pub fn ids(&self) -> Vec<PieId> {
        let mut ids: Vec<PieId> = self
            .pies
            .read()
            .map(|p| p.keys().copied().collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }
}

#[async_trait]
impl PieStore for MemoryPieStore {
    async fn save(&self, pie: &Pie) -> StoreResult<()> {
        let mut pies = self
            .pies
            .write()
            .map_err(|e| StoreError::Task(e.to_string()))?;
        if pies.contains_key(&pie.id()) {
            return Err(StoreError::AlreadyExists(pie.id()));
        }
        pies.insert(pie.id(), pie.clone());
        Ok(())
    }

    async fn get(&self, id: PieId) -> StoreResult<Option<Pie>> {
        let pies = self
            .pies
            .read()
            .map_err(|e| StoreError::Task(e.to_string()))?;
        Ok(pies.get(&id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{FormStatus, RawRecord};
    use tempfile::TempDir;

    fn sample_pie() -> Pie {
        RawRecord {
            study_id: "s1".into(),
            risk_factor_date: "2016-01-01".into(),
            clinical_risk: "1".into(),
            functional_risk: "2".into(),
            psychosocial_risk: "3".into(),
            utilization_risk: "4".into(),
            risk_factors_complete: FormStatus::Complete,
            ..RawRecord::default()
        }
        .to_pie()
        .expect("complete record")
    }

    #[tokio::test]
    async fn file_store_saves_under_sharded_path() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let store = FilePieStore::new(temp_dir.path());
        let pie = sample_pie();

        store.save(&pie).await.expect("save");

        let id = pie.id().to_string();
        let expected = temp_dir
            .path()
            .join(&id[0..2])
            .join(&id[2..4])
            .join(format!("{id}.json"));
        assert!(expected.is_file(), "missing {}", expected.display());
        assert_eq!(store.pie_path(pie.id()), expected);

        let loaded = store.get(pie.id()).await.expect("get");
        assert_eq!(loaded, Some(pie));
    }

    #[tokio::test]
    async fn file_store_refuses_overwrite() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let store = FilePieStore::new(temp_dir.path());
        let pie = sample_pie();

        store.save(&pie).await.expect("first save");
        let before = fs::read_to_string(store.pie_path(pie.id())).expect("read");

        match store.save(&pie).await {
            Err(StoreError::AlreadyExists(id)) => assert_eq!(id, pie.id()),
            other => panic!("expected AlreadyExists, got {other:?}"),
        }
        let after = fs::read_to_string(store.pie_path(pie.id())).expect("read");
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn file_store_missing_pie_is_none() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let store = FilePieStore::new(temp_dir.path().join("not-yet-created"));

        let found = store.get(PieId::new()).await.expect("get");
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn file_store_reports_corrupt_file() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let store = FilePieStore::new(temp_dir.path());
        let id = PieId::new();
        let path = store.pie_path(id);
        fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        fs::write(&path, "{ not json").expect("write");

        assert!(matches!(
            store.get(id).await,
            Err(StoreError::Deserialization(_))
        ));
    }

    #[tokio::test]
    async fn memory_store_is_append_only() {
        let store = MemoryPieStore::new();
        let pie = sample_pie();

        assert!(store.is_empty());
        store.save(&pie).await.expect("save");
        assert!(matches!(
            store.save(&pie).await,
            Err(StoreError::AlreadyExists(_))
        ));
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(pie.id()).await.expect("get"), Some(pie));
        assert_eq!(store.get(PieId::new()).await.expect("get"), None);
    }
}
