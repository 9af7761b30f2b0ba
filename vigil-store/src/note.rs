//! Summary figures pushed to an external note-taking database after a full
//! run, and the outbound seam for delivering them.

use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{AllTasksSubmission, StoreError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteSummary {
    pub title: String,
    pub pvt_mean_ms: f64,
    pub pvt_accuracy: f64,
    pub flanker_mean_ms: f64,
    pub flanker_accuracy: f64,
    pub efsi_score: u32,
    pub vas_sleepiness: u8,
    pub vas_fatigue: u8,
}

impl NoteSummary {
    pub fn from_submission(submission: &AllTasksSubmission, at: DateTime<Local>) -> Self {
        Self {
            title: at.format("%Y-%m-%d %H:%M").to_string(),
            pvt_mean_ms: round2(submission.pvt.average_reaction_time),
            pvt_accuracy: round2(submission.pvt.accuracy_percent()),
            flanker_mean_ms: round2(submission.flanker.mean_reaction_time_ms()),
            flanker_accuracy: round2(submission.flanker.accuracy_percent()),
            efsi_score: submission.efsi.total_score,
            vas_sleepiness: submission.vas.sleepiness_score,
            vas_fatigue: submission.vas.fatigue_score,
        }
    }

    /// Page properties in the note service's database schema.
    pub fn properties(&self) -> Value {
        json!({
            "Name": { "title": [{ "text": { "content": self.title } }] },
            "PVT mean RT": { "number": self.pvt_mean_ms },
            "PVT accuracy": { "number": self.pvt_accuracy },
            "Flanker mean RT": { "number": self.flanker_mean_ms },
            "Flanker accuracy": { "number": self.flanker_accuracy },
            "EFSI score": { "number": self.efsi_score },
            "VAS sleepiness": { "number": self.vas_sleepiness },
            "VAS fatigue": { "number": self.vas_fatigue },
        })
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteReceipt {
    pub location: String,
}

/// Where note summaries go. Failures never affect stored results.
pub trait NoteSink {
    fn publish(&mut self, summary: &NoteSummary) -> Result<NoteReceipt, StoreError>;
}

/// Writes each note's page properties as a JSON file for later import.
#[derive(Debug, Clone)]
pub struct FileNoteSink {
    dir: PathBuf,
    written: usize,
}

impl FileNoteSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            written: 0,
        }
    }
}

impl NoteSink for FileNoteSink {
    fn publish(&mut self, summary: &NoteSummary) -> Result<NoteReceipt, StoreError> {
        fs::create_dir_all(&self.dir).map_err(|e| StoreError::io(&self.dir, e))?;
        let stamp = Local::now().format("%Y%m%dT%H%M%S");
        let path = self.dir.join(format!("note-{stamp}-{}.json", self.written));
        let payload = json!({ "properties": summary.properties() });
        let bytes = serde_json::to_vec_pretty(&payload)?;
        fs::write(&path, bytes).map_err(|e| StoreError::io(&path, e))?;
        self.written += 1;
        tracing::info!(path = %path.display(), "note exported");
        Ok(NoteReceipt {
            location: path.display().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use vigil_core::{
        Congruency, Direction, EfsiResult, FlankerResult, FlankerStimulus, PvtResult,
        ReactionSample, TrialRecord, VasResult,
    };

    use super::*;

    fn submission() -> AllTasksSubmission {
        let samples = [
            ReactionSample {
                reaction_time_ms: 250,
                is_miss: false,
            },
            ReactionSample {
                reaction_time_ms: 301,
                is_miss: false,
            },
            ReactionSample {
                reaction_time_ms: 420,
                is_miss: true,
            },
        ];
        let stim = FlankerStimulus::new(Congruency::Congruent, Direction::Left);
        let records = [
            TrialRecord::new(&stim, Some(Direction::Left), Some(400)),
            TrialRecord::new(&stim, Some(Direction::Right), Some(500)),
            TrialRecord::new(&stim, None, None),
        ];
        AllTasksSubmission {
            pvt: PvtResult::from_samples(&samples),
            flanker: FlankerResult::from_records(&records, 3),
            efsi: EfsiResult::from_answers(vec![2; 26]).unwrap(),
            vas: VasResult::new(35, 72).unwrap(),
        }
    }

    #[test]
    fn summary_figures() {
        let at = Local.with_ymd_and_hms(2025, 3, 1, 9, 5, 0).unwrap();
        let note = NoteSummary::from_submission(&submission(), at);

        assert_eq!(note.title, "2025-03-01 09:05");
        assert_eq!(note.pvt_mean_ms, 275.5);
        // two hits out of three attempts
        assert_eq!(note.pvt_accuracy, 66.67);
        assert_eq!(note.flanker_mean_ms, 450.0);
        assert_eq!(note.flanker_accuracy, 33.33);
        assert_eq!(note.efsi_score, 52);
        assert_eq!((note.vas_sleepiness, note.vas_fatigue), (35, 72));

        let props = note.properties();
        assert_eq!(props["PVT accuracy"]["number"], 66.67);
        assert_eq!(props["Name"]["title"][0]["text"]["content"], "2025-03-01 09:05");
    }

    #[test]
    fn file_sink_writes_payload() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = FileNoteSink::new(dir.path().join("notes"));
        let note = NoteSummary::from_submission(&submission(), Local::now());
        let receipt = sink.publish(&note).unwrap();

        let written: Value = serde_json::from_slice(&fs::read(&receipt.location).unwrap()).unwrap();
        assert_eq!(written["properties"]["EFSI score"]["number"], 52);
    }
}
