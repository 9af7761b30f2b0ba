//! What a `run` invocation does between tasks: which task comes next, and
//! where finished results go.

use anyhow::{bail, Context, Result};
use rand::Rng;
use vigil_core::{EfsiResult, FlankerResult, PvtResult, TaskResult, VasResult};
use vigil_experiment::TaskFlow;
use vigil_store::{NoteSink, ResultStore, StoredRecord};

use crate::cli::TaskChoice;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Pvt,
    Flanker,
    Done,
}

/// Questionnaire answers collected outside the window.
#[derive(Debug, Clone, Default)]
pub struct Surveys {
    pub efsi: Option<EfsiResult>,
    pub vas: Option<VasResult>,
}

pub struct Session<S: ResultStore, R: Rng> {
    choice: TaskChoice,
    stage: Stage,
    flow: TaskFlow<R>,
    store: S,
    notes: Option<Box<dyn NoteSink>>,
    surveys: Surveys,
    saved: Vec<StoredRecord>,
    unsaved: Vec<TaskResult>,
}

impl<S: ResultStore, R: Rng> Session<S, R> {
    pub fn new(
        choice: TaskChoice,
        debug: bool,
        rng: R,
        store: S,
        surveys: Surveys,
    ) -> Result<Self> {
        let surveys_missing = surveys.efsi.is_none() || surveys.vas.is_none();
        if choice == TaskChoice::All && surveys_missing && !debug {
            bail!("an all-tasks run needs --efsi and --vas answers (or --debug for placeholders)");
        }

        let mut flow = TaskFlow::new(debug, rng);
        let stage = match choice {
            TaskChoice::Pvt => Stage::Pvt,
            TaskChoice::Flanker => Stage::Flanker,
            TaskChoice::All => {
                flow.begin();
                Stage::Pvt
            }
        };

        Ok(Self {
            choice,
            stage,
            flow,
            store,
            notes: None,
            surveys,
            saved: Vec::new(),
            unsaved: Vec::new(),
        })
    }

    pub fn with_notes(mut self, sink: Box<dyn NoteSink>) -> Self {
        self.notes = Some(sink);
        self
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn saved(&self) -> &[StoredRecord] {
        &self.saved
    }

    /// True while some result exists only in memory.
    pub fn has_unsaved(&self) -> bool {
        !self.unsaved.is_empty() || (self.flow.stored().is_none() && self.flow.missing().is_empty())
    }

    pub fn pvt_finished(&mut self, result: PvtResult) -> Result<Stage> {
        if self.stage != Stage::Pvt {
            tracing::warn!(stage = ?self.stage, "unexpected PVT result ignored");
            return Ok(self.stage);
        }
        tracing::info!(
            attempts = result.attempts(),
            misses = result.miss_count,
            mean_rt_ms = result.average_reaction_time,
            "PVT finished"
        );

        self.stage = match self.choice {
            TaskChoice::All => {
                self.flow.record_pvt(result).context("recording PVT result")?;
                Stage::Flanker
            }
            _ => {
                self.persist(result.into());
                Stage::Done
            }
        };
        Ok(self.stage)
    }

    pub fn flanker_finished(&mut self, result: FlankerResult) -> Result<Stage> {
        if self.stage != Stage::Flanker {
            tracing::warn!(stage = ?self.stage, "unexpected Flanker result ignored");
            return Ok(self.stage);
        }
        tracing::info!(
            correct = result.total_correct,
            trials = result.total_trials,
            congruent = result.congruent_correct,
            incongruent = result.incongruent_correct,
            "Flanker finished"
        );

        match self.choice {
            TaskChoice::All => {
                self.flow
                    .record_flanker(result)
                    .context("recording Flanker result")?;
                self.record_surveys()?;
                self.submit_all();
            }
            _ => self.persist(result.into()),
        }
        self.stage = Stage::Done;
        Ok(self.stage)
    }

    /// Tries again to store whatever earlier writes failed to store.
    pub fn retry(&mut self) {
        for result in std::mem::take(&mut self.unsaved) {
            self.persist(result);
        }
        if self.choice == TaskChoice::All
            && self.stage == Stage::Done
            && self.flow.stored().is_none()
        {
            self.submit_all();
        }
    }

    fn record_surveys(&mut self) -> Result<()> {
        let efsi = match self.surveys.efsi.take() {
            Some(efsi) => self.flow.record_efsi(efsi),
            None => self.flow.skip_current(),
        };
        efsi.context("recording EFSI answers")?;
        let vas = match self.surveys.vas.take() {
            Some(vas) => self.flow.record_vas(vas),
            None => self.flow.skip_current(),
        };
        vas.context("recording VAS answers")?;
        Ok(())
    }

    fn persist(&mut self, result: TaskResult) {
        let kind = result.kind();
        match self.store.create(result.clone()) {
            Ok(record) => {
                tracing::info!(task = %kind, id = %record.id, "result stored");
                self.saved.push(record);
            }
            Err(e) => {
                tracing::error!(task = %kind, error = %e, "failed to store result; kept in memory");
                self.unsaved.push(result);
            }
        }
    }

    fn submit_all(&mut self) {
        match self.flow.submit(&mut self.store) {
            Ok(record) => {
                self.saved
                    .extend([record.pvt, record.flanker, record.efsi, record.vas]);
                self.publish_note();
            }
            // the flow has logged it and still holds the results
            Err(e) => tracing::debug!(error = %e, "all-tasks submission pending"),
        }
    }

    fn publish_note(&mut self) {
        let Some(sink) = self.notes.as_mut() else {
            return;
        };
        let summary = match self.flow.note_summary() {
            Ok(summary) => summary,
            Err(e) => {
                tracing::warn!(error = %e, "no note summary");
                return;
            }
        };
        if let Err(e) = sink.publish(&summary) {
            tracing::warn!(error = %e, "note export failed; results are stored");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use uuid::Uuid;
    use vigil_core::{ReactionSample, TaskKind};
    use vigil_store::{MemoryStore, NoteReceipt, NoteSummary, SessionEntry, StoreError};

    use super::*;

    /// Memory store that can be switched off.
    #[derive(Default)]
    struct Switchable {
        down: bool,
        inner: MemoryStore,
    }

    impl ResultStore for Switchable {
        fn create(&mut self, result: TaskResult) -> Result<StoredRecord, StoreError> {
            if self.down {
                return Err(StoreError::Unavailable("maintenance".into()));
            }
            self.inner.create(result)
        }

        fn list(
            &self,
            kind: TaskKind,
            skip: usize,
            limit: usize,
        ) -> Result<Vec<StoredRecord>, StoreError> {
            self.inner.list(kind, skip, limit)
        }

        fn get(&self, kind: TaskKind, id: Uuid) -> Result<StoredRecord, StoreError> {
            self.inner.get(kind, id)
        }

        fn remove(&mut self, kind: TaskKind, id: Uuid) -> Result<(), StoreError> {
            self.inner.remove(kind, id)
        }

        fn record_session(&mut self, entry: SessionEntry) -> Result<(), StoreError> {
            self.inner.record_session(entry)
        }
    }

    #[derive(Clone, Default)]
    struct CollectNotes(Rc<RefCell<Vec<NoteSummary>>>);

    impl NoteSink for CollectNotes {
        fn publish(&mut self, summary: &NoteSummary) -> Result<NoteReceipt, StoreError> {
            self.0.borrow_mut().push(summary.clone());
            Ok(NoteReceipt {
                location: "memory".into(),
            })
        }
    }

    fn session(choice: TaskChoice, debug: bool, surveys: Surveys) -> Session<Switchable, StdRng> {
        Session::new(
            choice,
            debug,
            StdRng::seed_from_u64(3),
            Switchable::default(),
            surveys,
        )
        .unwrap()
    }

    fn pvt() -> PvtResult {
        PvtResult::from_samples(&[
            ReactionSample {
                reaction_time_ms: 280,
                is_miss: false,
            },
            ReactionSample {
                reaction_time_ms: 320,
                is_miss: false,
            },
        ])
    }

    fn surveys() -> Surveys {
        Surveys {
            efsi: Some(EfsiResult::from_answers(vec![3; 26]).unwrap()),
            vas: Some(VasResult::new(40, 70).unwrap()),
        }
    }

    #[test]
    fn single_task_is_stored_on_finish() {
        let mut s = session(TaskChoice::Pvt, false, Surveys::default());
        assert_eq!(s.stage(), Stage::Pvt);
        assert_eq!(s.pvt_finished(pvt()).unwrap(), Stage::Done);
        assert_eq!(s.store.inner.len(TaskKind::Pvt), 1);
        assert_eq!(s.saved().len(), 1);
        assert!(!s.has_unsaved());
    }

    #[test]
    fn flanker_only_starts_at_flanker() {
        let mut s = session(TaskChoice::Flanker, false, Surveys::default());
        assert_eq!(s.stage(), Stage::Flanker);
        // out-of-order results are ignored
        assert_eq!(s.pvt_finished(pvt()).unwrap(), Stage::Flanker);
        s.flanker_finished(FlankerResult::from_records(&[], 10)).unwrap();
        assert_eq!(s.store.inner.len(TaskKind::Flanker), 1);
        assert_eq!(s.store.inner.len(TaskKind::Pvt), 0);
    }

    #[test]
    fn all_tasks_needs_surveys_unless_debug() {
        let err = Session::new(
            TaskChoice::All,
            false,
            StdRng::seed_from_u64(1),
            MemoryStore::new(),
            Surveys::default(),
        )
        .err()
        .unwrap();
        assert!(err.to_string().contains("--efsi"));
        session(TaskChoice::All, true, Surveys::default());
    }

    #[test]
    fn all_tasks_submit_one_session_and_export_note() {
        let notes = CollectNotes::default();
        let mut s = session(TaskChoice::All, false, surveys()).with_notes(Box::new(notes.clone()));

        assert_eq!(s.pvt_finished(pvt()).unwrap(), Stage::Flanker);
        assert_eq!(s.store.inner.len(TaskKind::Pvt), 0);
        assert_eq!(s.flanker_finished(FlankerResult::from_records(&[], 100)).unwrap(), Stage::Done);

        assert_eq!(s.store.inner.sessions().len(), 1);
        for kind in TaskKind::ALL {
            assert_eq!(s.store.inner.len(kind), 1);
        }
        assert_eq!(s.saved().len(), 4);
        let notes = notes.0.borrow();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].pvt_mean_ms, 300.0);
        assert_eq!(notes[0].efsi_score, 78);
    }

    #[test]
    fn debug_run_fills_missing_surveys() {
        let mut s = session(TaskChoice::All, true, Surveys::default());
        s.pvt_finished(pvt()).unwrap();
        s.flanker_finished(FlankerResult::from_records(&[], 100)).unwrap();
        let vas = s.store.inner.list(TaskKind::Vas, 0, 10).unwrap();
        assert_eq!(vas.len(), 1);
        assert_eq!(vas[0].result, TaskResult::Vas(VasResult::new(50, 60).unwrap()));
    }

    #[test]
    fn failed_writes_are_kept_until_retry() {
        let mut s = session(TaskChoice::All, false, surveys());
        s.store.down = true;
        s.pvt_finished(pvt()).unwrap();
        s.flanker_finished(FlankerResult::from_records(&[], 100)).unwrap();
        assert_eq!(s.stage(), Stage::Done);
        assert!(s.has_unsaved());
        assert!(s.saved().is_empty());

        s.retry();
        assert!(s.has_unsaved());

        s.store.down = false;
        s.retry();
        assert!(!s.has_unsaved());
        assert_eq!(s.store.inner.sessions().len(), 1);
    }

    #[test]
    fn single_task_retry_after_failure() {
        let mut s = session(TaskChoice::Pvt, false, Surveys::default());
        s.store.down = true;
        s.pvt_finished(pvt()).unwrap();
        assert!(s.has_unsaved());
        s.store.down = false;
        s.retry();
        assert!(!s.has_unsaved());
        assert_eq!(s.store.inner.len(TaskKind::Pvt), 1);
    }
}
