//! The "all tasks" sequence: PVT, Flanker, EFSI, VAS, then one combined
//! submission to the result store.

use std::fmt;

use chrono::Local;
use rand::Rng;
use thiserror::Error;
use vigil_core::{
    EFSI_ITEM_COUNT, EfsiResult, FlankerResult, PvtResult, TaskKind, TaskResult, ValidationError,
    VasResult,
};
use vigil_store::{AllTasksRecord, AllTasksSubmission, NoteSummary, ResultStore, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FlowStep {
    #[default]
    Intro,
    Pvt,
    Flanker,
    Efsi,
    Vas,
    Complete,
}

impl FlowStep {
    /// The task recorded during this step.
    pub fn task(&self) -> Option<TaskKind> {
        match self {
            FlowStep::Pvt => Some(TaskKind::Pvt),
            FlowStep::Flanker => Some(TaskKind::Flanker),
            FlowStep::Efsi => Some(TaskKind::Efsi),
            FlowStep::Vas => Some(TaskKind::Vas),
            FlowStep::Intro | FlowStep::Complete => None,
        }
    }

    fn after(&self) -> FlowStep {
        match self {
            FlowStep::Intro => FlowStep::Pvt,
            FlowStep::Pvt => FlowStep::Flanker,
            FlowStep::Flanker => FlowStep::Efsi,
            // VAS only moves on once the submission is stored
            FlowStep::Efsi | FlowStep::Vas => FlowStep::Vas,
            FlowStep::Complete => FlowStep::Complete,
        }
    }
}

impl fmt::Display for FlowStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FlowStep::Intro => "intro",
            FlowStep::Pvt => "pvt",
            FlowStep::Flanker => "flanker",
            FlowStep::Efsi => "efsi",
            FlowStep::Vas => "vas",
            FlowStep::Complete => "complete",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
pub enum FlowError {
    #[error("cannot record {task} result during the {step} step")]
    OutOfOrder { step: FlowStep, task: TaskKind },

    #[error("skipping tasks requires debug mode")]
    DebugDisabled,

    #[error("nothing to skip during the {0} step")]
    NothingToSkip(FlowStep),

    #[error("results missing for: {}", join_kinds(.missing))]
    Incomplete { missing: Vec<TaskKind> },

    #[error("results were already submitted")]
    AlreadySubmitted,

    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error("failed to store results: {0}")]
    Store(#[from] StoreError),
}

fn join_kinds(kinds: &[TaskKind]) -> String {
    kinds
        .iter()
        .map(TaskKind::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

pub struct TaskFlow<R: Rng> {
    step: FlowStep,
    debug: bool,
    rng: R,
    pvt: Option<PvtResult>,
    flanker: Option<FlankerResult>,
    efsi: Option<EfsiResult>,
    vas: Option<VasResult>,
    stored: Option<AllTasksRecord>,
}

impl<R: Rng> TaskFlow<R> {
    pub fn new(debug: bool, rng: R) -> Self {
        Self {
            step: FlowStep::Intro,
            debug,
            rng,
            pvt: None,
            flanker: None,
            efsi: None,
            vas: None,
            stored: None,
        }
    }

    pub fn step(&self) -> FlowStep {
        self.step
    }

    pub fn is_debug(&self) -> bool {
        self.debug
    }

    pub fn set_debug(&mut self, debug: bool) {
        self.debug = debug;
    }

    pub fn pvt(&self) -> Option<&PvtResult> {
        self.pvt.as_ref()
    }

    pub fn flanker(&self) -> Option<&FlankerResult> {
        self.flanker.as_ref()
    }

    pub fn efsi(&self) -> Option<&EfsiResult> {
        self.efsi.as_ref()
    }

    pub fn vas(&self) -> Option<&VasResult> {
        self.vas.as_ref()
    }

    /// The combined record, once submitted.
    pub fn stored(&self) -> Option<&AllTasksRecord> {
        self.stored.as_ref()
    }

    pub fn begin(&mut self) -> bool {
        if self.step != FlowStep::Intro {
            return false;
        }
        tracing::info!(debug = self.debug, "all-tasks flow started");
        self.step = FlowStep::Pvt;
        true
    }

    /// Stores the result for the current step and moves on.
    pub fn record(&mut self, result: TaskResult) -> Result<FlowStep, FlowError> {
        let task = result.kind();
        if self.step.task() != Some(task) {
            return Err(FlowError::OutOfOrder {
                step: self.step,
                task,
            });
        }
        result.validate()?;
        match result {
            TaskResult::Pvt(r) => self.pvt = Some(r),
            TaskResult::Flanker(r) => self.flanker = Some(r),
            TaskResult::Efsi(r) => self.efsi = Some(r),
            TaskResult::Vas(r) => self.vas = Some(r),
        }
        self.step = self.step.after();
        tracing::debug!(%task, next = %self.step, "flow result recorded");
        Ok(self.step)
    }

    pub fn record_pvt(&mut self, result: PvtResult) -> Result<FlowStep, FlowError> {
        self.record(result.into())
    }

    pub fn record_flanker(&mut self, result: FlankerResult) -> Result<FlowStep, FlowError> {
        self.record(result.into())
    }

    pub fn record_efsi(&mut self, result: EfsiResult) -> Result<FlowStep, FlowError> {
        self.record(result.into())
    }

    pub fn record_vas(&mut self, result: VasResult) -> Result<FlowStep, FlowError> {
        self.record(result.into())
    }

    /// Debug bypass: records placeholder results for the current task.
    pub fn skip_current(&mut self) -> Result<FlowStep, FlowError> {
        if !self.debug {
            return Err(FlowError::DebugDisabled);
        }
        let placeholder: TaskResult = match self.step {
            FlowStep::Pvt => PvtResult {
                miss_count: 0,
                average_reaction_time: 250.0,
                all_reaction_times: vec![230, 240, 250, 260, 270],
            }
            .into(),
            FlowStep::Flanker => FlankerResult {
                total_correct: 85,
                congruent_correct: 45,
                incongruent_correct: 40,
                total_trials: 100,
                trial_details: Vec::new(),
            }
            .into(),
            FlowStep::Efsi => {
                let answers = (0..EFSI_ITEM_COUNT)
                    .map(|_| self.rng.random_range(1..=4u8))
                    .collect();
                EfsiResult::from_answers(answers)?.into()
            }
            FlowStep::Vas => VasResult {
                sleepiness_score: 50,
                fatigue_score: 60,
            }
            .into(),
            step @ (FlowStep::Intro | FlowStep::Complete) => {
                return Err(FlowError::NothingToSkip(step));
            }
        };
        tracing::warn!(step = %self.step, "task skipped with placeholder result");
        self.record(placeholder)
    }

    pub fn missing(&self) -> Vec<TaskKind> {
        let present = [
            self.pvt.is_some(),
            self.flanker.is_some(),
            self.efsi.is_some(),
            self.vas.is_some(),
        ];
        TaskKind::ALL
            .into_iter()
            .zip(present)
            .filter(|(_, has)| !has)
            .map(|(kind, _)| kind)
            .collect()
    }

    pub fn submission(&self) -> Result<AllTasksSubmission, FlowError> {
        match (&self.pvt, &self.flanker, &self.efsi, &self.vas) {
            (Some(pvt), Some(flanker), Some(efsi), Some(vas)) => Ok(AllTasksSubmission {
                pvt: pvt.clone(),
                flanker: flanker.clone(),
                efsi: efsi.clone(),
                vas: *vas,
            }),
            _ => Err(FlowError::Incomplete {
                missing: self.missing(),
            }),
        }
    }

    /// Sends all four results to `store`. On failure the results stay in the
    /// flow and `submit` may be called again.
    pub fn submit(&mut self, store: &mut dyn ResultStore) -> Result<AllTasksRecord, FlowError> {
        if self.stored.is_some() {
            return Err(FlowError::AlreadySubmitted);
        }
        let submission = self.submission()?;
        match store.create_all(submission) {
            Ok(record) => {
                tracing::info!(session = %record.session_id, "all-tasks results stored");
                self.step = FlowStep::Complete;
                self.stored = Some(record.clone());
                Ok(record)
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to store all-tasks results");
                Err(e.into())
            }
        }
    }

    pub fn note_summary(&self) -> Result<NoteSummary, FlowError> {
        let submission = self.submission()?;
        Ok(NoteSummary::from_submission(&submission, Local::now()))
    }
}

impl<R: Rng> fmt::Debug for TaskFlow<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskFlow")
            .field("step", &self.step)
            .field("debug", &self.debug)
            .field("missing", &self.missing())
            .field("stored", &self.stored.as_ref().map(|r| r.session_id))
            .finish()
    }
}
