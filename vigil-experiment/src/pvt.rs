//! Psychomotor vigilance task.
//!
//! Each trial waits a random interval, reveals a stimulus and measures the
//! latency to the next response. The run lasts a fixed wall-clock duration.
//! When it expires mid-trial the trial still runs to completion: a pending
//! reveal is dropped, an on-screen stimulus waits for input (or the lapse
//! window), and feedback runs out its hold before the run finishes.

use rand::Rng;
use vigil_core::{Phase, PvtPhase, PvtResult, ReactionSample};
use vigil_timing::{Fired, Scheduler};

use crate::config::PvtConfig;
use crate::lifecycle::{PhaseChange, PhaseTracker, TimerSlot};
use crate::trial::PvtTrial;

/// Timer events owned by [`PvtEngine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PvtTimer {
    Deadline,
    Reveal,
    MissThreshold,
    Lapse,
    FeedbackEnd,
}

pub struct PvtEngine<S, R>
where
    S: Scheduler<PvtTimer>,
    R: Rng,
{
    config: PvtConfig,
    scheduler: S,
    rng: R,
    phase: PhaseTracker<PvtPhase>,
    samples: Vec<ReactionSample>,
    current: Option<PvtTrial>,
    started_at_ms: Option<u64>,
    deadline_reached: bool,
    deadline: TimerSlot<PvtTimer>,
    reveal: TimerSlot<PvtTimer>,
    miss_flag: TimerSlot<PvtTimer>,
    lapse: TimerSlot<PvtTimer>,
    feedback: TimerSlot<PvtTimer>,
}

impl<S, R> PvtEngine<S, R>
where
    S: Scheduler<PvtTimer>,
    R: Rng,
{
    pub fn new(config: PvtConfig, scheduler: S, rng: R) -> Self {
        Self {
            config,
            scheduler,
            rng,
            phase: PhaseTracker::new(),
            samples: Vec::new(),
            current: None,
            started_at_ms: None,
            deadline_reached: false,
            deadline: TimerSlot::new(),
            reveal: TimerSlot::new(),
            miss_flag: TimerSlot::new(),
            lapse: TimerSlot::new(),
            feedback: TimerSlot::new(),
        }
    }

    /// Registers the callback notified on every phase change.
    pub fn on_transition(&mut self, observer: impl FnMut(&PhaseChange<PvtPhase>) + 'static) {
        self.phase.set_observer(observer);
    }

    pub fn config(&self) -> &PvtConfig {
        &self.config
    }

    pub fn phase(&self) -> PvtPhase {
        self.phase.current()
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }

    /// Every recorded response, misses included, in trial order.
    pub fn samples(&self) -> &[ReactionSample] {
        &self.samples
    }

    pub fn trials_attempted(&self) -> usize {
        self.samples.len()
    }

    pub fn hits(&self) -> usize {
        self.samples.iter().filter(|s| !s.is_miss).count()
    }

    pub fn last_sample(&self) -> Option<&ReactionSample> {
        self.samples.last()
    }

    pub fn deadline_reached(&self) -> bool {
        self.deadline_reached
    }

    /// Whether the on-screen stimulus has outlived the miss threshold.
    pub fn miss_flag(&self) -> bool {
        self.current.is_some_and(|t| t.miss_flag)
    }

    /// Live latency counter shown while the stimulus is up.
    pub fn elapsed_readout(&self) -> Option<u64> {
        let trial = self.current?;
        Some(self.scheduler.elapsed_ms(trial.revealed_at_ms))
    }

    pub fn time_remaining_ms(&self) -> u64 {
        match self.started_at_ms {
            Some(start) if !self.phase.current().is_terminal() => {
                let end = start + self.config.duration_ms;
                end.saturating_sub(self.scheduler.now_ms())
            }
            _ => 0,
        }
    }

    /// Begins a run. Only valid from `Ready`.
    pub fn start(&mut self) -> bool {
        if !self.phase.current().is_ready() {
            tracing::debug!(phase = self.phase.current().label(), "start ignored");
            return false;
        }
        let now = self.scheduler.now_ms();
        self.started_at_ms = Some(now);
        self.deadline_reached = false;
        self.deadline
            .arm(&mut self.scheduler, self.config.duration_ms, PvtTimer::Deadline);
        tracing::info!(duration_ms = self.config.duration_ms, "pvt run started");
        self.enter_waiting(now);
        true
    }

    /// Records a response if the stimulus is visible. Input in any other
    /// phase is ignored. Timers already due fire first, so the response is
    /// timed against the phase a real clock would be in.
    pub fn handle_response(&mut self) -> Option<ReactionSample> {
        self.pump();
        if !self.phase.current().allows_input() {
            return None;
        }
        let trial = self.current.take()?;
        let reaction_time_ms = self.scheduler.elapsed_ms(trial.revealed_at_ms);
        let sample = ReactionSample {
            reaction_time_ms,
            is_miss: trial.miss_flag || reaction_time_ms > self.config.miss_threshold_ms,
        };
        self.complete_trial(trial, sample);
        Some(sample)
    }

    /// Drains every due timer into the engine. Returns how many fired.
    pub fn pump(&mut self) -> usize {
        let mut count = 0;
        while let Some(fired) = self.scheduler.pop_due() {
            self.on_timer(fired);
            count += 1;
        }
        count
    }

    pub fn on_timer(&mut self, fired: Fired<PvtTimer>) {
        let now = self.scheduler.now_ms();
        let phase = self.phase.current();
        match fired.event {
            PvtTimer::Deadline => {
                if !self.deadline.take_if(fired.handle) {
                    return;
                }
                self.deadline_reached = true;
                tracing::info!(phase = phase.label(), "pvt deadline reached");
                if phase == PvtPhase::Waiting {
                    self.reveal.disarm(&mut self.scheduler);
                    self.finish(now);
                }
            }
            PvtTimer::Reveal => {
                if !self.reveal.take_if(fired.handle) || phase != PvtPhase::Waiting {
                    return;
                }
                self.current = Some(PvtTrial {
                    id: self.samples.len(),
                    revealed_at_ms: now,
                    miss_flag: false,
                });
                self.miss_flag.arm(
                    &mut self.scheduler,
                    self.config.miss_threshold_ms + 1,
                    PvtTimer::MissThreshold,
                );
                self.lapse
                    .arm(&mut self.scheduler, self.config.lapse_window_ms, PvtTimer::Lapse);
                self.phase.transition(PvtPhase::Stimulus, now);
            }
            PvtTimer::MissThreshold => {
                if !self.miss_flag.take_if(fired.handle) {
                    return;
                }
                if let Some(trial) = self.current.as_mut() {
                    trial.miss_flag = true;
                }
            }
            PvtTimer::Lapse => {
                if !self.lapse.take_if(fired.handle) || phase != PvtPhase::Stimulus {
                    return;
                }
                if let Some(trial) = self.current.take() {
                    tracing::debug!(trial = trial.id, "no response within lapse window");
                    let sample = ReactionSample {
                        reaction_time_ms: self.scheduler.elapsed_ms(trial.revealed_at_ms),
                        is_miss: true,
                    };
                    self.complete_trial(trial, sample);
                }
            }
            PvtTimer::FeedbackEnd => {
                if !self.feedback.take_if(fired.handle) || phase != PvtPhase::Feedback {
                    return;
                }
                if self.deadline_reached {
                    self.finish(now);
                } else {
                    self.enter_waiting(now);
                }
            }
        }
    }

    /// Summary of a finished run.
    pub fn result(&self) -> Option<PvtResult> {
        if self.phase.current().is_terminal() {
            Some(PvtResult::from_samples(&self.samples))
        } else {
            None
        }
    }

    /// Stops the run where it is. Samples recorded so far stay readable and
    /// [`result`](Self::result) summarises them.
    pub fn abort(&mut self) {
        if !self.phase.current().is_running() {
            return;
        }
        tracing::info!(trials = self.samples.len(), "pvt run aborted");
        self.cancel_timers();
        self.current = None;
        let now = self.scheduler.now_ms();
        self.phase.transition(PvtPhase::Finished, now);
    }

    /// Cancels every timer and clears all recorded data.
    pub fn reset(&mut self) {
        self.cancel_timers();
        self.samples.clear();
        self.current = None;
        self.started_at_ms = None;
        self.deadline_reached = false;
        if !self.phase.current().is_ready() {
            let now = self.scheduler.now_ms();
            self.phase.transition(PvtPhase::Ready, now);
        }
    }

    fn enter_waiting(&mut self, now: u64) {
        let lo = self.config.min_wait_ms.min(self.config.max_wait_ms);
        let hi = self.config.min_wait_ms.max(self.config.max_wait_ms);
        let wait = self.rng.random_range(lo..=hi);
        self.reveal.arm(&mut self.scheduler, wait, PvtTimer::Reveal);
        self.phase.transition(PvtPhase::Waiting, now);
    }

    fn complete_trial(&mut self, trial: PvtTrial, sample: ReactionSample) {
        self.miss_flag.disarm(&mut self.scheduler);
        self.lapse.disarm(&mut self.scheduler);
        tracing::debug!(
            trial = trial.id,
            rt_ms = sample.reaction_time_ms,
            miss = sample.is_miss,
            "pvt response"
        );
        self.samples.push(sample);
        let now = self.scheduler.now_ms();
        self.feedback
            .arm(&mut self.scheduler, self.config.feedback_ms, PvtTimer::FeedbackEnd);
        self.phase.transition(PvtPhase::Feedback, now);
    }

    fn finish(&mut self, now: u64) {
        self.cancel_timers();
        self.current = None;
        let result = PvtResult::from_samples(&self.samples);
        tracing::info!(
            attempts = result.attempts(),
            misses = result.miss_count,
            mean_rt_ms = result.average_reaction_time,
            "pvt run finished"
        );
        self.phase.transition(PvtPhase::Finished, now);
    }

    fn cancel_timers(&mut self) {
        self.deadline.disarm(&mut self.scheduler);
        self.reveal.disarm(&mut self.scheduler);
        self.miss_flag.disarm(&mut self.scheduler);
        self.lapse.disarm(&mut self.scheduler);
        self.feedback.disarm(&mut self.scheduler);
    }
}

impl<S, R> Drop for PvtEngine<S, R>
where
    S: Scheduler<PvtTimer>,
    R: Rng,
{
    fn drop(&mut self) {
        self.cancel_timers();
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use vigil_timing::ManualScheduler;

    use super::*;

    fn engine() -> PvtEngine<ManualScheduler<PvtTimer>, StdRng> {
        PvtEngine::new(
            PvtConfig::default(),
            ManualScheduler::new(),
            StdRng::seed_from_u64(7),
        )
    }

    #[test]
    fn input_outside_stimulus_is_ignored() {
        let mut pvt = engine();
        assert!(pvt.handle_response().is_none());
        assert!(pvt.start());
        assert_eq!(pvt.phase(), PvtPhase::Waiting);
        assert!(pvt.handle_response().is_none());
        assert!(pvt.samples().is_empty());
    }

    #[test]
    fn start_is_only_valid_from_ready() {
        let mut pvt = engine();
        assert!(pvt.start());
        assert!(!pvt.start());
        assert_eq!(pvt.scheduler().pending(), 2);
    }

    #[test]
    fn reveal_lands_inside_wait_range() {
        let mut pvt = engine();
        pvt.start();
        let due = pvt.scheduler().next_due().unwrap();
        assert!((2_000..=10_000).contains(&due));
        assert!(pvt.result().is_none());
    }
}
