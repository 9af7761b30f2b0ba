//! Eriksen flanker task.
//!
//! A fixed number of trials, each running fixation, stimulus and feedback.
//! The stimulus stays up until a directional response or until the response
//! window closes, which records the trial as unanswered.

use std::collections::VecDeque;

use rand::Rng;
use vigil_core::{
    Congruency, Direction, FlankerOutcome, FlankerPhase, FlankerResult, FlankerStimulus, Phase,
    TrialRecord,
};
use vigil_timing::{Fired, Scheduler};

use crate::config::FlankerConfig;
use crate::lifecycle::{PhaseChange, PhaseTracker, TimerSlot};
use crate::trial::FlankerTrial;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlankerTimer {
    FixationEnd,
    ResponseTimeout,
    FeedbackEnd,
}

pub struct FlankerEngine<S, R>
where
    S: Scheduler<FlankerTimer>,
    R: Rng,
{
    config: FlankerConfig,
    scheduler: S,
    rng: R,
    phase: PhaseTracker<FlankerPhase>,
    records: Vec<TrialRecord>,
    current: Option<FlankerTrial>,
    planned: VecDeque<FlankerStimulus>,
    fixation: TimerSlot<FlankerTimer>,
    response: TimerSlot<FlankerTimer>,
    feedback: TimerSlot<FlankerTimer>,
}

impl<S, R> FlankerEngine<S, R>
where
    S: Scheduler<FlankerTimer>,
    R: Rng,
{
    pub fn new(config: FlankerConfig, scheduler: S, rng: R) -> Self {
        Self {
            config,
            scheduler,
            rng,
            phase: PhaseTracker::new(),
            records: Vec::new(),
            current: None,
            planned: VecDeque::new(),
            fixation: TimerSlot::new(),
            response: TimerSlot::new(),
            feedback: TimerSlot::new(),
        }
    }

    pub fn on_transition(&mut self, observer: impl FnMut(&PhaseChange<FlankerPhase>) + 'static) {
        self.phase.set_observer(observer);
    }

    /// Stimuli to present, in order, before falling back to random draws.
    pub fn plan_stimuli(&mut self, stimuli: impl IntoIterator<Item = FlankerStimulus>) {
        self.planned.extend(stimuli);
    }

    pub fn config(&self) -> &FlankerConfig {
        &self.config
    }

    pub fn phase(&self) -> FlankerPhase {
        self.phase.current()
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }

    pub fn records(&self) -> &[TrialRecord] {
        &self.records
    }

    /// Stimulus currently on screen.
    pub fn stimulus(&self) -> Option<FlankerStimulus> {
        if self.phase.current() == FlankerPhase::Stimulus {
            self.current.as_ref().and_then(|t| t.stimulus)
        } else {
            None
        }
    }

    /// 1-based number of the trial in progress.
    pub fn current_trial(&self) -> usize {
        (self.records.len() + 1).min(self.config.total_trials)
    }

    pub fn total_trials(&self) -> usize {
        self.config.total_trials
    }

    /// Correct answers so far as a share of completed trials, in percent.
    pub fn accuracy_percent(&self) -> f64 {
        match self.records.len() {
            0 => 0.0,
            n => self.correct_where(|_| true) as f64 / n as f64 * 100.0,
        }
    }

    pub fn congruent_correct(&self) -> usize {
        self.correct_where(|r| r.congruency.is_congruent())
    }

    pub fn incongruent_correct(&self) -> usize {
        self.correct_where(|r| !r.congruency.is_congruent())
    }

    fn correct_where(&self, keep: impl Fn(&TrialRecord) -> bool) -> usize {
        self.records.iter().filter(|r| r.is_correct && keep(r)).count()
    }

    pub fn last_outcome(&self) -> Option<FlankerOutcome> {
        self.records.last().map(TrialRecord::outcome)
    }

    pub fn start(&mut self) -> bool {
        if !self.phase.current().is_ready() {
            tracing::debug!(phase = self.phase.current().label(), "start ignored");
            return false;
        }
        tracing::info!(trials = self.config.total_trials, "flanker run started");
        let now = self.scheduler.now_ms();
        self.enter_fixation(now);
        true
    }

    /// Records a directional response for the visible stimulus. Returns the
    /// completed record, or `None` when input is not accepted.
    pub fn handle_response(&mut self, direction: Direction) -> Option<&TrialRecord> {
        // a window that already closed wins over the key press
        self.pump();
        if !self.phase.current().allows_input() {
            return None;
        }
        let mut trial = self.current.take()?;
        self.response.disarm(&mut self.scheduler);
        trial.timestamps.response = Some(self.scheduler.now_ms());
        self.conclude(trial, Some(direction));
        self.records.last()
    }

    pub fn pump(&mut self) -> usize {
        let mut count = 0;
        while let Some(fired) = self.scheduler.pop_due() {
            self.on_timer(fired);
            count += 1;
        }
        count
    }

    pub fn on_timer(&mut self, fired: Fired<FlankerTimer>) {
        let now = self.scheduler.now_ms();
        let phase = self.phase.current();
        match fired.event {
            FlankerTimer::FixationEnd => {
                if !self.fixation.take_if(fired.handle) || phase != FlankerPhase::Fixation {
                    return;
                }
                self.present_stimulus(now);
            }
            FlankerTimer::ResponseTimeout => {
                if !self.response.take_if(fired.handle) || phase != FlankerPhase::Stimulus {
                    return;
                }
                if let Some(trial) = self.current.take() {
                    self.conclude(trial, None);
                }
            }
            FlankerTimer::FeedbackEnd => {
                if !self.feedback.take_if(fired.handle) || phase != FlankerPhase::Feedback {
                    return;
                }
                if self.records.len() < self.config.total_trials {
                    self.enter_fixation(now);
                } else {
                    self.finish(now);
                }
            }
        }
    }

    pub fn result(&self) -> Option<FlankerResult> {
        if self.phase.current().is_terminal() {
            Some(FlankerResult::from_records(
                &self.records,
                self.config.total_trials as u32,
            ))
        } else {
            None
        }
    }

    /// Stops the run after the trials completed so far.
    pub fn abort(&mut self) {
        if !self.phase.current().is_running() {
            return;
        }
        tracing::info!(completed = self.records.len(), "flanker run aborted");
        self.cancel_timers();
        self.current = None;
        let now = self.scheduler.now_ms();
        self.phase.transition(FlankerPhase::Finished, now);
    }

    pub fn reset(&mut self) {
        self.cancel_timers();
        self.records.clear();
        self.current = None;
        if !self.phase.current().is_ready() {
            let now = self.scheduler.now_ms();
            self.phase.transition(FlankerPhase::Ready, now);
        }
    }

    fn enter_fixation(&mut self, now: u64) {
        self.current = Some(FlankerTrial::new(self.records.len(), now));
        self.fixation
            .arm(&mut self.scheduler, self.config.fixation_ms, FlankerTimer::FixationEnd);
        self.phase.transition(FlankerPhase::Fixation, now);
    }

    fn present_stimulus(&mut self, now: u64) {
        let stimulus = match self.planned.pop_front() {
            Some(stimulus) => stimulus,
            None => self.draw_stimulus(),
        };
        let trial = self
            .current
            .get_or_insert_with(|| FlankerTrial::new(self.records.len(), now));
        trial.stimulus = Some(stimulus);
        trial.timestamps.stimulus_start = Some(now);
        tracing::trace!(trial = trial.id, pattern = stimulus.pattern(), "stimulus shown");
        self.response.arm(
            &mut self.scheduler,
            self.config.response_window_ms,
            FlankerTimer::ResponseTimeout,
        );
        self.phase.transition(FlankerPhase::Stimulus, now);
    }

    fn draw_stimulus(&mut self) -> FlankerStimulus {
        let congruency = if self.rng.random_bool(0.5) {
            Congruency::Congruent
        } else {
            Congruency::Incongruent
        };
        let direction = if self.rng.random_bool(0.5) {
            Direction::Left
        } else {
            Direction::Right
        };
        FlankerStimulus::new(congruency, direction)
    }

    fn conclude(&mut self, trial: FlankerTrial, response: Option<Direction>) {
        let now = self.scheduler.now_ms();
        let Some(stimulus) = trial.stimulus else {
            return;
        };
        let record = TrialRecord::new(&stimulus, response, trial.reaction_time_ms());
        tracing::debug!(
            trial = trial.id,
            outcome = ?record.outcome(),
            rt_ms = ?record.reaction_time_ms,
            "flanker trial"
        );
        self.records.push(record);
        self.feedback
            .arm(&mut self.scheduler, self.config.feedback_ms, FlankerTimer::FeedbackEnd);
        self.phase.transition(FlankerPhase::Feedback, now);
    }

    fn finish(&mut self, now: u64) {
        self.cancel_timers();
        self.current = None;
        let correct = self.records.iter().filter(|r| r.is_correct).count();
        tracing::info!(
            correct,
            total = self.config.total_trials,
            "flanker run finished"
        );
        self.phase.transition(FlankerPhase::Finished, now);
    }

    fn cancel_timers(&mut self) {
        self.fixation.disarm(&mut self.scheduler);
        self.response.disarm(&mut self.scheduler);
        self.feedback.disarm(&mut self.scheduler);
    }
}

impl<S, R> Drop for FlankerEngine<S, R>
where
    S: Scheduler<FlankerTimer>,
    R: Rng,
{
    fn drop(&mut self) {
        self.cancel_timers();
    }
}
