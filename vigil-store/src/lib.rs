//! Persistence for task results.
//!
//! [`ResultStore`] is the seam the flow and the host write through. Records
//! are wrapped in a [`StoredRecord`] carrying a generated id and completion
//! time; a combined submission of all four tasks is stored as one session.

pub mod error;
pub mod json;
pub mod memory;
pub mod note;
pub mod record;

pub use error::StoreError;
pub use json::JsonFileStore;
pub use memory::MemoryStore;
pub use note::{FileNoteSink, NoteReceipt, NoteSink, NoteSummary};
pub use record::{AllTasksRecord, AllTasksSubmission, SessionEntry, StoredRecord};

use chrono::Utc;
use uuid::Uuid;
use vigil_core::{TaskKind, TaskResult};

pub const DEFAULT_LIST_LIMIT: usize = 100;

pub trait ResultStore {
    /// Validates and stores one result.
    fn create(&mut self, result: TaskResult) -> Result<StoredRecord, StoreError>;

    /// Records of one kind, newest first.
    fn list(&self, kind: TaskKind, skip: usize, limit: usize)
        -> Result<Vec<StoredRecord>, StoreError>;

    fn get(&self, kind: TaskKind, id: Uuid) -> Result<StoredRecord, StoreError>;

    /// Deletes one record. Used to undo a partially written session.
    fn remove(&mut self, kind: TaskKind, id: Uuid) -> Result<(), StoreError>;

    /// Appends a session entry linking the four records of one run.
    fn record_session(&mut self, entry: SessionEntry) -> Result<(), StoreError>;

    /// Stores all four results of one sequential run. Every result is
    /// validated before anything is written, and a failed write removes the
    /// records already written so a retry starts from a clean store.
    fn create_all(&mut self, submission: AllTasksSubmission) -> Result<AllTasksRecord, StoreError> {
        submission.validate()?;
        let session_id = Uuid::new_v4();
        let mut written = Vec::with_capacity(4);
        match write_session(self, session_id, submission, &mut written) {
            Ok(record) => {
                tracing::info!(%session_id, "stored all-tasks session");
                Ok(record)
            }
            Err(e) => {
                roll_back(self, &written);
                Err(e)
            }
        }
    }
}

fn write_session<S: ResultStore + ?Sized>(
    store: &mut S,
    session_id: Uuid,
    submission: AllTasksSubmission,
    written: &mut Vec<StoredRecord>,
) -> Result<AllTasksRecord, StoreError> {
    let AllTasksSubmission {
        pvt,
        flanker,
        efsi,
        vas,
    } = submission;
    let results: [TaskResult; 4] = [pvt.into(), flanker.into(), efsi.into(), vas.into()];
    for result in results {
        written.push(store.create(result)?);
    }

    let record = AllTasksRecord {
        session_id,
        completed_at: Utc::now(),
        pvt: written[0].clone(),
        flanker: written[1].clone(),
        efsi: written[2].clone(),
        vas: written[3].clone(),
    };
    store.record_session(SessionEntry::from(&record))?;
    Ok(record)
}

fn roll_back<S: ResultStore + ?Sized>(store: &mut S, written: &[StoredRecord]) {
    for record in written.iter().rev() {
        let kind = record.kind();
        match store.remove(kind, record.id) {
            Ok(()) => tracing::debug!(%kind, id = %record.id, "rolled back partial session"),
            Err(e) => {
                tracing::warn!(%kind, id = %record.id, error = %e, "could not roll back record")
            }
        }
    }
}

/// Newest first, then skip/limit. Ties keep the later insertion first.
pub(crate) fn page(records: &[StoredRecord], skip: usize, limit: usize) -> Vec<StoredRecord> {
    let mut sorted: Vec<&StoredRecord> = records.iter().rev().collect();
    sorted.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));
    sorted.into_iter().skip(skip).take(limit).cloned().collect()
}
