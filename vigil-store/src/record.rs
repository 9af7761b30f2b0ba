use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use vigil_core::{
    EfsiResult, FlankerResult, PvtResult, TaskKind, TaskResult, ValidationError, VasResult,
};

/// A result as persisted: the payload plus generated id and timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub id: Uuid,
    pub completed_at: DateTime<Utc>,
    pub result: TaskResult,
}

impl StoredRecord {
    pub fn new(result: TaskResult) -> Self {
        Self {
            id: Uuid::new_v4(),
            completed_at: Utc::now(),
            result,
        }
    }

    pub fn kind(&self) -> TaskKind {
        self.result.kind()
    }
}

/// Results of one sequential run, ready to store together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllTasksSubmission {
    pub pvt: PvtResult,
    pub flanker: FlankerResult,
    pub efsi: EfsiResult,
    pub vas: VasResult,
}

impl AllTasksSubmission {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.pvt.validate()?;
        self.flanker.validate()?;
        self.efsi.validate()?;
        self.vas.validate()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllTasksRecord {
    pub session_id: Uuid,
    pub completed_at: DateTime<Utc>,
    pub pvt: StoredRecord,
    pub flanker: StoredRecord,
    pub efsi: StoredRecord,
    pub vas: StoredRecord,
}

/// Index entry tying a session id to its four task records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionEntry {
    pub session_id: Uuid,
    pub completed_at: DateTime<Utc>,
    pub pvt_id: Uuid,
    pub flanker_id: Uuid,
    pub efsi_id: Uuid,
    pub vas_id: Uuid,
}

impl From<&AllTasksRecord> for SessionEntry {
    fn from(record: &AllTasksRecord) -> Self {
        Self {
            session_id: record.session_id,
            completed_at: record.completed_at,
            pvt_id: record.pvt.id,
            flanker_id: record.flanker.id,
            efsi_id: record.efsi.id,
            vas_id: record.vas.id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stored_record_json_shape() {
        let record = StoredRecord::new(TaskResult::Vas(VasResult::new(30, 70).unwrap()));
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["result"]["task"], "vas");
        assert_eq!(value["result"]["result"]["fatigue_score"], 70);
        assert!(value["id"].is_string());

        let back: StoredRecord = serde_json::from_value(value).unwrap();
        assert_eq!(back, record);
    }
}
