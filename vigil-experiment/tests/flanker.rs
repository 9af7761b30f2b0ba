use std::cell::RefCell;
use std::rc::Rc;

use rand::SeedableRng;
use rand::rngs::StdRng;
use vigil_core::{Congruency, Direction, FlankerOutcome, FlankerPhase, FlankerStimulus};
use vigil_experiment::{FlankerConfig, FlankerEngine, FlankerTimer};
use vigil_timing::{ManualScheduler, Scheduler};

type Engine = FlankerEngine<ManualScheduler<FlankerTimer>, StdRng>;

fn engine(total_trials: usize) -> Engine {
    FlankerEngine::new(
        FlankerConfig {
            total_trials,
            ..FlankerConfig::default()
        },
        ManualScheduler::new(),
        StdRng::seed_from_u64(11),
    )
}

fn advance(flanker: &mut Engine, ms: u64) {
    flanker.scheduler_mut().advance_by(ms);
    flanker.pump();
}

#[test]
fn congruent_left_answered_left() {
    let mut flanker = engine(1);
    flanker.plan_stimuli([FlankerStimulus::new(Congruency::Congruent, Direction::Left)]);
    flanker.start();
    advance(&mut flanker, 1_000);

    let stimulus = flanker.stimulus().unwrap();
    assert_eq!(stimulus.pattern(), "<<<<<");

    advance(&mut flanker, 420);
    let record = flanker.handle_response(Direction::Left).unwrap().clone();
    assert!(record.is_correct);
    assert_eq!(record.reaction_time_ms, Some(420));
    assert_eq!(record.stimulus_pattern, "<<<<<");
    assert_eq!(flanker.phase(), FlankerPhase::Feedback);
    assert_eq!(flanker.last_outcome(), Some(FlankerOutcome::Correct));

    advance(&mut flanker, 500);
    assert_eq!(flanker.phase(), FlankerPhase::Finished);
    let result = flanker.result().unwrap();
    assert_eq!((result.total_correct, result.congruent_correct), (1, 1));
}

#[test]
fn window_closes_without_response() {
    let mut flanker = engine(2);
    flanker.plan_stimuli([FlankerStimulus::new(Congruency::Incongruent, Direction::Right)]);
    flanker.start();
    advance(&mut flanker, 1_000);
    advance(&mut flanker, 999);
    assert_eq!(flanker.phase(), FlankerPhase::Stimulus);
    advance(&mut flanker, 1);

    assert_eq!(flanker.phase(), FlankerPhase::Feedback);
    let record = &flanker.records()[0];
    assert_eq!(record.user_response, None);
    assert!(!record.is_correct);
    assert_eq!(record.reaction_time_ms, None);
    assert_eq!(flanker.last_outcome(), Some(FlankerOutcome::NoResponse));

    // late key press lands in feedback and is dropped
    assert!(flanker.handle_response(Direction::Right).is_none());
    assert_eq!(flanker.records().len(), 1);

    advance(&mut flanker, 500);
    assert_eq!(flanker.phase(), FlankerPhase::Fixation);
    assert_eq!(flanker.current_trial(), 2);
}

#[test]
fn key_after_closed_window_is_not_an_answer() {
    let mut flanker = engine(2);
    flanker.start();
    advance(&mut flanker, 1_000);
    let target = flanker.stimulus().unwrap().direction;

    // window closed at 2000; the timeout has not been pumped yet
    flanker.scheduler_mut().advance_by(1_200);
    assert!(flanker.handle_response(target).is_none());
    assert_eq!(flanker.phase(), FlankerPhase::Feedback);

    let record = &flanker.records()[0];
    assert_eq!(record.user_response, None);
    assert_eq!(record.reaction_time_ms, None);
    assert!(!record.is_correct);
    assert_eq!(flanker.last_outcome(), Some(FlankerOutcome::NoResponse));
}

#[test]
fn second_response_is_ignored() {
    let mut flanker = engine(3);
    flanker.start();
    advance(&mut flanker, 1_000);
    let target = flanker.stimulus().unwrap().direction;
    assert!(flanker.handle_response(target).is_some());
    assert!(flanker.handle_response(target.opposite()).is_none());
    assert_eq!(flanker.records().len(), 1);
    assert!(flanker.records()[0].is_correct);
}

#[test]
fn alternating_answers_over_hundred_trials() {
    let mut flanker = engine(100);
    flanker.start();

    for i in 0..100 {
        advance(&mut flanker, 1_000);
        assert_eq!(flanker.phase(), FlankerPhase::Stimulus, "trial {i}");
        assert_eq!(flanker.current_trial(), i + 1);
        let target = flanker.stimulus().unwrap().direction;
        let answer = if i % 2 == 0 { target } else { target.opposite() };
        advance(&mut flanker, 300);
        flanker.handle_response(answer);
        advance(&mut flanker, 500);
    }

    assert_eq!(flanker.phase(), FlankerPhase::Finished);
    assert_eq!(flanker.scheduler().pending(), 0);
    let result = flanker.result().unwrap();
    assert_eq!(result.total_trials, 100);
    assert_eq!(result.trial_details.len(), 100);
    assert_eq!(result.total_correct, 50);
    assert_eq!(
        result.total_correct,
        result.congruent_correct + result.incongruent_correct
    );
    assert!(result.trial_details.iter().all(|t| t.reaction_time_ms == 300));
    assert!(result.validate().is_ok());
}

#[test]
fn all_timeouts_still_fill_every_trial() {
    let mut flanker = engine(5);
    flanker.start();
    for _ in 0..5 {
        advance(&mut flanker, 2_500);
    }
    let result = flanker.result().unwrap();
    assert_eq!(result.trial_details.len(), 5);
    assert_eq!(result.total_correct, 0);
    assert_eq!(result.mean_reaction_time_ms(), 0.0);
}

#[test]
fn reset_mid_trial_cancels_everything() {
    let mut flanker = engine(10);
    flanker.start();
    advance(&mut flanker, 1_200);
    assert_eq!(flanker.phase(), FlankerPhase::Stimulus);

    flanker.reset();
    assert_eq!(flanker.phase(), FlankerPhase::Ready);
    assert_eq!(flanker.scheduler().pending(), 0);
    assert!(flanker.records().is_empty());
    assert!(flanker.result().is_none());
}

#[test]
fn abort_stops_after_completed_trials() {
    let mut flanker = engine(10);
    flanker.plan_stimuli([
        FlankerStimulus::new(Congruency::Congruent, Direction::Right),
        FlankerStimulus::new(Congruency::Incongruent, Direction::Left),
    ]);
    flanker.start();
    advance(&mut flanker, 1_000);
    flanker.handle_response(Direction::Right);
    advance(&mut flanker, 500);
    advance(&mut flanker, 1_000);
    flanker.handle_response(Direction::Right);
    advance(&mut flanker, 200);

    flanker.abort();
    assert_eq!(flanker.phase(), FlankerPhase::Finished);
    assert_eq!(flanker.scheduler().pending(), 0);
    assert_eq!(flanker.accuracy_percent(), 50.0);
    assert_eq!((flanker.congruent_correct(), flanker.incongruent_correct()), (1, 0));

    let result = flanker.result().unwrap();
    assert_eq!(result.trial_details.len(), 2);
    assert_eq!(result.total_trials, 10);
}

#[test]
fn drop_cancels_timers() {
    let mut sched = ManualScheduler::new();
    {
        let mut flanker = FlankerEngine::new(
            FlankerConfig::default(),
            &mut sched,
            StdRng::seed_from_u64(5),
        );
        flanker.start();
        flanker.scheduler_mut().advance_by(1_000);
        flanker.pump();
        assert_eq!(flanker.phase(), FlankerPhase::Stimulus);
    }
    assert_eq!(sched.pending(), 0);
}

#[test]
fn observer_sees_one_trial_cycle() {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);

    let mut flanker = engine(1);
    flanker.on_transition(move |change| sink.borrow_mut().push(change.to));
    flanker.start();
    advance(&mut flanker, 1_000);
    flanker.handle_response(Direction::Left);
    advance(&mut flanker, 500);

    assert_eq!(
        *seen.borrow(),
        vec![
            FlankerPhase::Fixation,
            FlankerPhase::Stimulus,
            FlankerPhase::Feedback,
            FlankerPhase::Finished,
        ]
    );
}
