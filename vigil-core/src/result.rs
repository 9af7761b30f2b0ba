//! Aggregate results handed from an engine (or a questionnaire) to the store.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::survey::{EfsiResult, VasResult};
use crate::trial::{ReactionSample, TrialRecord};

/// Summary of one PVT run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PvtResult {
    pub miss_count: u32,
    /// Mean over non-miss samples, 0 when there are none.
    pub average_reaction_time: f64,
    /// Non-miss latencies in trial order.
    pub all_reaction_times: Vec<u64>,
}

impl PvtResult {
    pub fn from_samples(samples: &[ReactionSample]) -> Self {
        let all_reaction_times: Vec<u64> = samples
            .iter()
            .filter(|s| !s.is_miss)
            .map(|s| s.reaction_time_ms)
            .collect();
        let miss_count = samples.iter().filter(|s| s.is_miss).count() as u32;
        let average_reaction_time = if all_reaction_times.is_empty() {
            0.0
        } else {
            all_reaction_times.iter().sum::<u64>() as f64 / all_reaction_times.len() as f64
        };

        Self {
            miss_count,
            average_reaction_time,
            all_reaction_times,
        }
    }

    pub fn attempts(&self) -> usize {
        self.miss_count as usize + self.all_reaction_times.len()
    }

    /// Share of attempts that were valid responses, in percent.
    pub fn accuracy_percent(&self) -> f64 {
        match self.attempts() {
            0 => 0.0,
            n => self.all_reaction_times.len() as f64 / n as f64 * 100.0,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.average_reaction_time.is_finite() || self.average_reaction_time < 0.0 {
            return Err(ValidationError::InvalidAverage(self.average_reaction_time));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlankerTrialDetail {
    pub stimulus: String,
    pub correct: bool,
    /// 0 when the trial timed out.
    pub reaction_time_ms: u64,
    pub congruent: bool,
}

impl From<&TrialRecord> for FlankerTrialDetail {
    fn from(record: &TrialRecord) -> Self {
        Self {
            stimulus: record.stimulus_pattern.clone(),
            correct: record.is_correct,
            reaction_time_ms: record.reaction_time_ms.unwrap_or(0),
            congruent: record.congruency.is_congruent(),
        }
    }
}

/// Summary of one flanker run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlankerResult {
    pub total_correct: u32,
    pub congruent_correct: u32,
    pub incongruent_correct: u32,
    pub total_trials: u32,
    #[serde(default)]
    pub trial_details: Vec<FlankerTrialDetail>,
}

impl FlankerResult {
    pub fn from_records(records: &[TrialRecord], total_trials: u32) -> Self {
        let congruent_correct = records
            .iter()
            .filter(|r| r.is_correct && r.congruency.is_congruent())
            .count() as u32;
        let incongruent_correct = records
            .iter()
            .filter(|r| r.is_correct && !r.congruency.is_congruent())
            .count() as u32;

        Self {
            total_correct: congruent_correct + incongruent_correct,
            congruent_correct,
            incongruent_correct,
            total_trials,
            trial_details: records.iter().map(FlankerTrialDetail::from).collect(),
        }
    }

    pub fn accuracy_percent(&self) -> f64 {
        match self.total_trials {
            0 => 0.0,
            n => self.total_correct as f64 / n as f64 * 100.0,
        }
    }

    /// Mean latency over trials that received a response.
    pub fn mean_reaction_time_ms(&self) -> f64 {
        let answered: Vec<u64> = self
            .trial_details
            .iter()
            .map(|t| t.reaction_time_ms)
            .filter(|&rt| rt > 0)
            .collect();
        if answered.is_empty() {
            0.0
        } else {
            answered.iter().sum::<u64>() as f64 / answered.len() as f64
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        for (field, value) in [
            ("total_correct", self.total_correct),
            ("congruent_correct", self.congruent_correct),
            ("incongruent_correct", self.incongruent_correct),
        ] {
            if value > self.total_trials {
                return Err(ValidationError::CountExceedsTrials {
                    field,
                    value,
                    total_trials: self.total_trials,
                });
            }
        }
        if self.total_correct != self.congruent_correct + self.incongruent_correct {
            return Err(ValidationError::BreakdownMismatch {
                total: self.total_correct,
                congruent: self.congruent_correct,
                incongruent: self.incongruent_correct,
            });
        }
        Ok(())
    }
}

/// The four task types of the suite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    Pvt,
    Flanker,
    Efsi,
    Vas,
}

impl TaskKind {
    /// Run order of the sequential flow.
    pub const ALL: [TaskKind; 4] = [
        TaskKind::Pvt,
        TaskKind::Flanker,
        TaskKind::Efsi,
        TaskKind::Vas,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Pvt => "pvt",
            TaskKind::Flanker => "flanker",
            TaskKind::Efsi => "efsi",
            TaskKind::Vas => "vas",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pvt" => Ok(TaskKind::Pvt),
            "flanker" => Ok(TaskKind::Flanker),
            "efsi" => Ok(TaskKind::Efsi),
            "vas" => Ok(TaskKind::Vas),
            other => Err(ValidationError::UnknownTask(other.to_string())),
        }
    }
}

/// Any one task's result, tagged by task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "task", content = "result", rename_all = "lowercase")]
pub enum TaskResult {
    Pvt(PvtResult),
    Flanker(FlankerResult),
    Efsi(EfsiResult),
    Vas(VasResult),
}

impl TaskResult {
    pub fn kind(&self) -> TaskKind {
        match self {
            TaskResult::Pvt(_) => TaskKind::Pvt,
            TaskResult::Flanker(_) => TaskKind::Flanker,
            TaskResult::Efsi(_) => TaskKind::Efsi,
            TaskResult::Vas(_) => TaskKind::Vas,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            TaskResult::Pvt(r) => r.validate(),
            TaskResult::Flanker(r) => r.validate(),
            TaskResult::Efsi(r) => r.validate(),
            TaskResult::Vas(r) => r.validate(),
        }
    }
}

impl From<PvtResult> for TaskResult {
    fn from(r: PvtResult) -> Self {
        TaskResult::Pvt(r)
    }
}

impl From<FlankerResult> for TaskResult {
    fn from(r: FlankerResult) -> Self {
        TaskResult::Flanker(r)
    }
}

impl From<EfsiResult> for TaskResult {
    fn from(r: EfsiResult) -> Self {
        TaskResult::Efsi(r)
    }
}

impl From<VasResult> for TaskResult {
    fn from(r: VasResult) -> Self {
        TaskResult::Vas(r)
    }
}
