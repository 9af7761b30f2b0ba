use std::collections::HashMap;

use uuid::Uuid;
use vigil_core::{TaskKind, TaskResult};

use crate::{page, ResultStore, SessionEntry, StoreError, StoredRecord};

/// Process-local store. Contents are lost on exit.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: HashMap<TaskKind, Vec<StoredRecord>>,
    sessions: Vec<SessionEntry>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sessions(&self) -> &[SessionEntry] {
        &self.sessions
    }

    pub fn len(&self, kind: TaskKind) -> usize {
        self.records.get(&kind).map_or(0, Vec::len)
    }

    /// Inserts an already-stamped record, e.g. when importing.
    pub fn insert(&mut self, record: StoredRecord) {
        self.records.entry(record.kind()).or_default().push(record);
    }
}

impl ResultStore for MemoryStore {
    fn create(&mut self, result: TaskResult) -> Result<StoredRecord, StoreError> {
        result.validate()?;
        let record = StoredRecord::new(result);
        tracing::debug!(kind = %record.kind(), id = %record.id, "stored result in memory");
        self.insert(record.clone());
        Ok(record)
    }

    fn list(
        &self,
        kind: TaskKind,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<StoredRecord>, StoreError> {
        Ok(self
            .records
            .get(&kind)
            .map(|records| page(records, skip, limit))
            .unwrap_or_default())
    }

    fn get(&self, kind: TaskKind, id: Uuid) -> Result<StoredRecord, StoreError> {
        self.records
            .get(&kind)
            .and_then(|records| records.iter().find(|r| r.id == id))
            .cloned()
            .ok_or(StoreError::NotFound { kind, id })
    }

    fn remove(&mut self, kind: TaskKind, id: Uuid) -> Result<(), StoreError> {
        let records = self
            .records
            .get_mut(&kind)
            .ok_or(StoreError::NotFound { kind, id })?;
        let index = records
            .iter()
            .position(|r| r.id == id)
            .ok_or(StoreError::NotFound { kind, id })?;
        records.remove(index);
        Ok(())
    }

    fn record_session(&mut self, entry: SessionEntry) -> Result<(), StoreError> {
        self.sessions.push(entry);
        Ok(())
    }
}
