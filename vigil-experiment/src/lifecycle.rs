//! Timer ownership and phase bookkeeping shared by both engines.

use std::fmt;
use std::marker::PhantomData;

use vigil_core::Phase;
use vigil_timing::{Scheduler, TimerHandle};

/// Holds at most one outstanding timer of one kind.
///
/// Arming cancels the previous occupant, and a fired handle is only honoured
/// if it is the one currently held.
pub struct TimerSlot<E> {
    handle: Option<TimerHandle>,
    _event: PhantomData<E>,
}

impl<E> TimerSlot<E> {
    pub fn new() -> Self {
        Self {
            handle: None,
            _event: PhantomData,
        }
    }

    pub fn arm<S: Scheduler<E>>(&mut self, scheduler: &mut S, delay_ms: u64, event: E) {
        self.disarm(scheduler);
        self.handle = Some(scheduler.schedule_once(delay_ms, event));
    }

    pub fn disarm<S: Scheduler<E>>(&mut self, scheduler: &mut S) -> bool {
        match self.handle.take() {
            Some(handle) => scheduler.cancel(handle),
            None => false,
        }
    }

    /// Clears the slot if `handle` is the timer it holds.
    pub fn take_if(&mut self, handle: TimerHandle) -> bool {
        if self.handle == Some(handle) {
            self.handle = None;
            true
        } else {
            false
        }
    }

    pub fn is_armed(&self) -> bool {
        self.handle.is_some()
    }
}

impl<E> Default for TimerSlot<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for TimerSlot<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerSlot")
            .field("handle", &self.handle)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseChange<P> {
    pub from: P,
    pub to: P,
    pub at_ms: u64,
}

type Observer<P> = Box<dyn FnMut(&PhaseChange<P>)>;

/// Current phase plus the render callback notified on every change.
pub struct PhaseTracker<P: Phase> {
    current: P,
    entered_at_ms: u64,
    observer: Option<Observer<P>>,
}

impl<P: Phase> PhaseTracker<P> {
    pub fn new() -> Self {
        Self {
            current: P::default(),
            entered_at_ms: 0,
            observer: None,
        }
    }

    pub fn current(&self) -> P {
        self.current
    }

    pub fn entered_at_ms(&self) -> u64 {
        self.entered_at_ms
    }

    pub fn set_observer(&mut self, observer: impl FnMut(&PhaseChange<P>) + 'static) {
        self.observer = Some(Box::new(observer));
    }

    pub fn transition(&mut self, to: P, at_ms: u64) {
        let change = PhaseChange {
            from: self.current,
            to,
            at_ms,
        };
        self.current = to;
        self.entered_at_ms = at_ms;
        tracing::debug!(
            from = change.from.label(),
            to = change.to.label(),
            at_ms,
            "phase change"
        );
        if let Some(observer) = self.observer.as_mut() {
            observer(&change);
        }
    }
}

impl<P: Phase> Default for PhaseTracker<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Phase> fmt::Debug for PhaseTracker<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhaseTracker")
            .field("current", &self.current)
            .field("entered_at_ms", &self.entered_at_ms)
            .field("observer", &self.observer.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use vigil_core::PvtPhase;
    use vigil_timing::ManualScheduler;

    use super::*;

    #[test]
    fn rearming_cancels_previous_timer() {
        let mut sched = ManualScheduler::new();
        let mut slot = TimerSlot::new();

        slot.arm(&mut sched, 100, 'a');
        slot.arm(&mut sched, 200, 'b');
        assert_eq!(sched.pending(), 1);

        sched.advance_by(500);
        let fired = sched.pop_due().unwrap();
        assert_eq!(fired.event, 'b');
        assert!(slot.take_if(fired.handle));
        assert!(!slot.is_armed());
    }

    #[test]
    fn stale_handle_is_rejected() {
        let mut sched = ManualScheduler::new();
        let mut slot = TimerSlot::new();
        slot.arm(&mut sched, 10, ());
        let other = sched.schedule_once(10, ());
        assert!(!slot.take_if(other));
        assert!(slot.is_armed());
        assert!(slot.disarm(&mut sched));
        assert!(!slot.disarm(&mut sched));
    }

    #[test]
    fn observer_sees_every_transition() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);

        let mut tracker = PhaseTracker::<PvtPhase>::new();
        tracker.set_observer(move |change| sink.borrow_mut().push((change.from, change.to)));
        tracker.transition(PvtPhase::Waiting, 0);
        tracker.transition(PvtPhase::Stimulus, 2500);

        assert_eq!(tracker.current(), PvtPhase::Stimulus);
        assert_eq!(tracker.entered_at_ms(), 2500);
        assert_eq!(
            *seen.borrow(),
            vec![
                (PvtPhase::Ready, PvtPhase::Waiting),
                (PvtPhase::Waiting, PvtPhase::Stimulus)
            ]
        );
    }
}
