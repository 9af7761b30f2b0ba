use rand::SeedableRng;
use rand::rngs::StdRng;
use uuid::Uuid;
use vigil_core::{
    EfsiResult, FlankerResult, PvtResult, ReactionSample, TaskKind, TaskResult, VasResult,
};
use vigil_experiment::{FlowError, FlowStep, TaskFlow};
use vigil_store::{MemoryStore, ResultStore, SessionEntry, StoreError, StoredRecord};

fn flow(debug: bool) -> TaskFlow<StdRng> {
    TaskFlow::new(debug, StdRng::seed_from_u64(26))
}

fn pvt_result() -> PvtResult {
    PvtResult::from_samples(&[
        ReactionSample {
            reaction_time_ms: 240,
            is_miss: false,
        },
        ReactionSample {
            reaction_time_ms: 500,
            is_miss: true,
        },
    ])
}

/// Fails the `fail_on`-th write (1-based) once, then behaves like a memory
/// store.
struct FlakyStore {
    fail_on: usize,
    writes: usize,
    inner: MemoryStore,
}

impl FlakyStore {
    fn failing_write(fail_on: usize) -> Self {
        Self {
            fail_on,
            writes: 0,
            inner: MemoryStore::new(),
        }
    }
}

impl ResultStore for FlakyStore {
    fn create(&mut self, result: TaskResult) -> Result<StoredRecord, StoreError> {
        self.writes += 1;
        if self.writes == self.fail_on {
            return Err(StoreError::Unavailable("backend offline".into()));
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

#[test]
fn steps_run_in_order() {
    let mut flow = flow(false);
    assert_eq!(flow.step(), FlowStep::Intro);
    assert!(matches!(
        flow.record_pvt(pvt_result()),
        Err(FlowError::OutOfOrder { step: FlowStep::Intro, task: TaskKind::Pvt })
    ));

    assert!(flow.begin());
    assert!(!flow.begin());
    assert_eq!(flow.record_pvt(pvt_result()).unwrap(), FlowStep::Flanker);
    assert!(matches!(
        flow.record_vas(VasResult::new(10, 10).unwrap()),
        Err(FlowError::OutOfOrder { step: FlowStep::Flanker, .. })
    ));
    assert_eq!(
        flow.record_flanker(FlankerResult::from_records(&[], 100)).unwrap(),
        FlowStep::Efsi
    );
    let efsi = EfsiResult::from_answers(vec![1; 26]).unwrap();
    assert_eq!(flow.record_efsi(efsi).unwrap(), FlowStep::Vas);
    assert_eq!(flow.record_vas(VasResult::new(20, 30).unwrap()).unwrap(), FlowStep::Vas);
    assert!(flow.missing().is_empty());
}

#[test]
fn skip_requires_debug() {
    let mut flow = flow(false);
    flow.begin();
    assert!(matches!(flow.skip_current(), Err(FlowError::DebugDisabled)));
    assert_eq!(flow.step(), FlowStep::Pvt);
}

#[test]
fn debug_skip_injects_placeholders_and_submits() {
    let mut flow = flow(true);
    assert!(matches!(
        flow.skip_current(),
        Err(FlowError::NothingToSkip(FlowStep::Intro))
    ));
    flow.begin();
    for _ in 0..4 {
        flow.skip_current().unwrap();
    }

    let pvt = flow.pvt().unwrap().clone();
    assert_eq!(pvt.all_reaction_times, vec![230, 240, 250, 260, 270]);
    assert_eq!(pvt.average_reaction_time, 250.0);
    assert_eq!(flow.flanker().unwrap().total_correct, 85);
    let efsi = flow.efsi().unwrap();
    assert_eq!(efsi.answers.len(), 26);
    assert!(efsi.validate().is_ok());
    assert_eq!(flow.vas().unwrap().fatigue_score, 60);

    let mut store = MemoryStore::new();
    let record = flow.submit(&mut store).unwrap();
    assert_eq!(flow.step(), FlowStep::Complete);
    assert_eq!(store.sessions().len(), 1);
    assert_eq!(record.pvt.result, TaskResult::Pvt(pvt));
    assert!(matches!(flow.submit(&mut store), Err(FlowError::AlreadySubmitted)));
}

#[test]
fn incomplete_submission_sends_nothing() {
    let mut flow = flow(false);
    flow.begin();
    flow.record_pvt(pvt_result()).unwrap();

    let mut store = MemoryStore::new();
    match flow.submit(&mut store) {
        Err(FlowError::Incomplete { missing }) => {
            assert_eq!(missing, vec![TaskKind::Flanker, TaskKind::Efsi, TaskKind::Vas]);
        }
        other => panic!("expected incomplete, got {other:?}"),
    }
    for kind in TaskKind::ALL {
        assert_eq!(store.len(kind), 0);
    }
    assert!(flow.note_summary().is_err());
}

#[test]
fn failed_submit_keeps_results_for_retry() {
    let mut flow = flow(true);
    flow.begin();
    flow.record_pvt(pvt_result()).unwrap();
    for _ in 0..3 {
        flow.skip_current().unwrap();
    }

    let mut store = FlakyStore::failing_write(1);
    assert!(matches!(
        flow.submit(&mut store),
        Err(FlowError::Store(StoreError::Unavailable(_)))
    ));
    assert_eq!(flow.step(), FlowStep::Vas);
    assert!(flow.missing().is_empty());

    let record = flow.submit(&mut store).unwrap();
    assert_eq!(flow.step(), FlowStep::Complete);
    assert_eq!(flow.stored().map(|r| r.session_id), Some(record.session_id));

    let note = flow.note_summary().unwrap();
    assert_eq!(note.pvt_accuracy, 50.0);
    assert_eq!(note.flanker_accuracy, 85.0);
}

#[test]
fn partial_write_is_undone_before_retry() {
    let mut flow = flow(true);
    flow.begin();
    for _ in 0..4 {
        flow.skip_current().unwrap();
    }

    // pvt lands, flanker fails
    let mut store = FlakyStore::failing_write(2);
    assert!(flow.submit(&mut store).is_err());
    for kind in TaskKind::ALL {
        assert_eq!(store.inner.len(kind), 0, "{kind} left behind");
    }
    assert!(store.inner.sessions().is_empty());

    let record = flow.submit(&mut store).unwrap();
    for kind in TaskKind::ALL {
        assert_eq!(store.inner.len(kind), 1, "{kind} written once");
    }
    assert_eq!(store.inner.sessions().len(), 1);
    assert_eq!(store.inner.sessions()[0].pvt_id, record.pvt.id);
}

#[test]
fn invalid_result_is_rejected_without_advancing() {
    let mut flow = flow(false);
    flow.begin();
    let bogus = PvtResult {
        miss_count: 0,
        average_reaction_time: f64::NAN,
        all_reaction_times: vec![],
    };
    assert!(matches!(flow.record_pvt(bogus), Err(FlowError::Invalid(_))));
    assert_eq!(flow.step(), FlowStep::Pvt);
}
