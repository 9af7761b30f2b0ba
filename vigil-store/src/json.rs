use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;
use vigil_core::{TaskKind, TaskResult};

use crate::{page, ResultStore, SessionEntry, StoreError, StoredRecord};

const SESSIONS_FILE: &str = "sessions.json";

/// Directory of JSON documents: `<kind>.json` per task plus `sessions.json`.
///
/// Every write rewrites the whole document through a temporary file and a
/// rename, so a crash never leaves a half-written document behind.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;
        tracing::debug!(dir = %dir.display(), "opened result store");
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn sessions(&self) -> Result<Vec<SessionEntry>, StoreError> {
        self.read_doc(&self.dir.join(SESSIONS_FILE))
    }

    fn kind_path(&self, kind: TaskKind) -> PathBuf {
        self.dir.join(format!("{}.json", kind.as_str()))
    }

    fn read_kind(&self, kind: TaskKind) -> Result<Vec<StoredRecord>, StoreError> {
        self.read_doc(&self.kind_path(kind))
    }

    fn read_doc<T: DeserializeOwned>(&self, path: &Path) -> Result<Vec<T>, StoreError> {
        match fs::read(path) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(StoreError::io(path, e)),
        }
    }

    fn write_doc<T: Serialize>(&self, path: &Path, items: &[T]) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(items)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, bytes).map_err(|e| StoreError::io(&tmp, e))?;
        fs::rename(&tmp, path).map_err(|e| StoreError::io(path, e))
    }
}

impl ResultStore for JsonFileStore {
    fn create(&mut self, result: TaskResult) -> Result<StoredRecord, StoreError> {
        result.validate()?;
        let kind = result.kind();
        let mut records = self.read_kind(kind)?;
        let record = StoredRecord::new(result);
        records.push(record.clone());
        self.write_doc(&self.kind_path(kind), &records)?;
        tracing::debug!(%kind, id = %record.id, count = records.len(), "stored result");
        Ok(record)
    }

    fn list(
        &self,
        kind: TaskKind,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<StoredRecord>, StoreError> {
        Ok(page(&self.read_kind(kind)?, skip, limit))
    }

    fn get(&self, kind: TaskKind, id: Uuid) -> Result<StoredRecord, StoreError> {
        self.read_kind(kind)?
            .into_iter()
            .find(|r| r.id == id)
            .ok_or(StoreError::NotFound { kind, id })
    }

    fn remove(&mut self, kind: TaskKind, id: Uuid) -> Result<(), StoreError> {
        let mut records = self.read_kind(kind)?;
        let before = records.len();
        records.retain(|r| r.id != id);
        if records.len() == before {
            return Err(StoreError::NotFound { kind, id });
        }
        self.write_doc(&self.kind_path(kind), &records)?;
        tracing::debug!(%kind, %id, "removed result");
        Ok(())
    }

    fn record_session(&mut self, entry: SessionEntry) -> Result<(), StoreError> {
        let path = self.dir.join(SESSIONS_FILE);
        let mut sessions: Vec<SessionEntry> = self.read_doc(&path)?;
        sessions.push(entry);
        self.write_doc(&path, &sessions)
    }
}
