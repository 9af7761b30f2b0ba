//! What to draw, derived from engine state once per frame.

use rand::Rng;
use vigil_core::{Direction, FlankerOutcome, FlankerPhase, Phase, PvtPhase};
use vigil_experiment::{FlankerEngine, FlankerTimer, PvtEngine, PvtTimer};
use vigil_timing::Scheduler;

/// Feedback symbol shown after a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mark {
    Hit,
    Miss,
    Correct,
    Incorrect,
    NoResponse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scene {
    Ready,
    Blank,
    Fixation,
    /// PVT stimulus with its running latency counter.
    Reaction { elapsed_ms: u64 },
    Flanker { arrows: [Direction; 5] },
    Feedback {
        mark: Mark,
        reaction_time_ms: Option<u64>,
    },
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct View {
    pub scene: Scene,
    /// Fraction of the run completed, 0.0..=1.0.
    pub progress: Option<f32>,
}

impl View {
    pub fn new(scene: Scene) -> Self {
        Self {
            scene,
            progress: None,
        }
    }
}

pub fn pvt_view<S, R>(engine: &PvtEngine<S, R>) -> View
where
    S: Scheduler<PvtTimer>,
    R: Rng,
{
    let phase = engine.phase();
    let scene = match phase {
        PvtPhase::Ready => Scene::Ready,
        PvtPhase::Waiting => Scene::Blank,
        PvtPhase::Stimulus => Scene::Reaction {
            elapsed_ms: engine.elapsed_readout().unwrap_or(0),
        },
        PvtPhase::Feedback => match engine.last_sample() {
            Some(sample) => Scene::Feedback {
                mark: if sample.is_miss { Mark::Miss } else { Mark::Hit },
                reaction_time_ms: Some(sample.reaction_time_ms),
            },
            None => Scene::Blank,
        },
        PvtPhase::Finished => Scene::Finished,
    };

    let progress = phase.is_running().then(|| {
        let total = engine.config().duration_ms.max(1);
        let done = total.saturating_sub(engine.time_remaining_ms());
        (done as f32 / total as f32).clamp(0.0, 1.0)
    });

    View { scene, progress }
}

pub fn flanker_view<S, R>(engine: &FlankerEngine<S, R>) -> View
where
    S: Scheduler<FlankerTimer>,
    R: Rng,
{
    let phase = engine.phase();
    let scene = match phase {
        FlankerPhase::Ready => Scene::Ready,
        FlankerPhase::Fixation => Scene::Fixation,
        FlankerPhase::Stimulus => match engine.stimulus() {
            Some(stimulus) => Scene::Flanker {
                arrows: stimulus.arrows(),
            },
            None => Scene::Blank,
        },
        FlankerPhase::Feedback => {
            let record = engine.records().last();
            match engine.last_outcome() {
                Some(outcome) => Scene::Feedback {
                    mark: match outcome {
                        FlankerOutcome::Correct => Mark::Correct,
                        FlankerOutcome::Incorrect => Mark::Incorrect,
                        FlankerOutcome::NoResponse => Mark::NoResponse,
                    },
                    reaction_time_ms: record.and_then(|r| r.reaction_time_ms),
                },
                None => Scene::Blank,
            }
        }
        FlankerPhase::Finished => Scene::Finished,
    };

    let progress = phase.is_running().then(|| {
        let total = engine.total_trials().max(1);
        (engine.records().len() as f32 / total as f32).clamp(0.0, 1.0)
    });

    View { scene, progress }
}
