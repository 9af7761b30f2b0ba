//! One-shot timers as data.
//!
//! A scheduled timer carries an event tag chosen by the engine instead of a
//! callback. The host drains due timers with [`Scheduler::pop_due`] and hands
//! each one back to the engine that scheduled it. Engines keep the returned
//! [`TimerHandle`] until the timer fires or they cancel it.

use std::collections::{BTreeMap, HashMap};

use crate::timer::{Clock, HighPrecisionTimer};

/// Identifies one scheduled timer. Never reused within a scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(u64);

impl TimerHandle {
    pub fn id(&self) -> u64 {
        self.0
    }
}

/// A timer that came due.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fired<E> {
    pub handle: TimerHandle,
    pub event: E,
    pub due_ms: u64,
}

/// Clock plus cancellable one-shot timers.
pub trait Scheduler<E>: Clock {
    fn schedule_once(&mut self, delay_ms: u64, event: E) -> TimerHandle;

    /// Returns false if the timer already fired or was cancelled.
    fn cancel(&mut self, handle: TimerHandle) -> bool;

    /// Removes and returns the earliest timer that is due, if any.
    fn pop_due(&mut self) -> Option<Fired<E>>;

    /// Number of timers scheduled and not yet fired or cancelled.
    fn pending(&self) -> usize;
}

impl<E, S: Scheduler<E> + ?Sized> Scheduler<E> for &mut S {
    fn schedule_once(&mut self, delay_ms: u64, event: E) -> TimerHandle {
        (**self).schedule_once(delay_ms, event)
    }

    fn cancel(&mut self, handle: TimerHandle) -> bool {
        (**self).cancel(handle)
    }

    fn pop_due(&mut self) -> Option<Fired<E>> {
        (**self).pop_due()
    }

    fn pending(&self) -> usize {
        (**self).pending()
    }
}

/// Pending timers ordered by due time, then by scheduling order.
#[derive(Debug)]
pub struct TimerQueue<E> {
    next_id: u64,
    entries: BTreeMap<(u64, u64), E>,
    due_by_id: HashMap<u64, u64>,
}

impl<E> TimerQueue<E> {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            entries: BTreeMap::new(),
            due_by_id: HashMap::new(),
        }
    }

    pub fn insert(&mut self, due_ms: u64, event: E) -> TimerHandle {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.insert((due_ms, id), event);
        self.due_by_id.insert(id, due_ms);
        TimerHandle(id)
    }

    pub fn remove(&mut self, handle: TimerHandle) -> bool {
        match self.due_by_id.remove(&handle.0) {
            Some(due) => self.entries.remove(&(due, handle.0)).is_some(),
            None => false,
        }
    }

    pub fn next_due(&self) -> Option<u64> {
        self.entries.keys().next().map(|&(due, _)| due)
    }

    pub fn pop_if_due(&mut self, now_ms: u64) -> Option<Fired<E>> {
        let &(due, id) = self.entries.keys().next()?;
        if due > now_ms {
            return None;
        }
        let event = self.entries.remove(&(due, id))?;
        self.due_by_id.remove(&id);
        Some(Fired {
            handle: TimerHandle(id),
            event,
            due_ms: due,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<E> Default for TimerQueue<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// Virtual-time scheduler for tests and scripted replays.
///
/// Time only moves when told to. While a due timer is being handed out the
/// clock reads that timer's due instant, so anything the handler timestamps
/// lands exactly where a real host would put it.
#[derive(Debug)]
pub struct ManualScheduler<E> {
    now_ms: u64,
    target_ms: u64,
    queue: TimerQueue<E>,
}

impl<E> ManualScheduler<E> {
    pub fn new() -> Self {
        Self::starting_at(0)
    }

    pub fn starting_at(now_ms: u64) -> Self {
        Self {
            now_ms,
            target_ms: now_ms,
            queue: TimerQueue::new(),
        }
    }

    /// Lets virtual time run up to `target_ms`. Timers become poppable one
    /// at a time; the clock reaches `target_ms` once none are left.
    pub fn advance_to(&mut self, target_ms: u64) {
        self.target_ms = self.target_ms.max(target_ms);
        if self.queue.next_due().map_or(true, |due| due > self.target_ms) {
            self.now_ms = self.now_ms.max(self.target_ms);
        }
    }

    pub fn advance_by(&mut self, delta_ms: u64) {
        let base = self.target_ms.max(self.now_ms);
        self.advance_to(base + delta_ms);
    }

    pub fn next_due(&self) -> Option<u64> {
        self.queue.next_due()
    }
}

impl<E> Default for ManualScheduler<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Clock for ManualScheduler<E> {
    fn now_ms(&self) -> u64 {
        self.now_ms
    }
}

impl<E> Scheduler<E> for ManualScheduler<E> {
    fn schedule_once(&mut self, delay_ms: u64, event: E) -> TimerHandle {
        self.queue.insert(self.now_ms + delay_ms, event)
    }

    fn cancel(&mut self, handle: TimerHandle) -> bool {
        self.queue.remove(handle)
    }

    fn pop_due(&mut self) -> Option<Fired<E>> {
        match self.queue.pop_if_due(self.target_ms) {
            Some(fired) => {
                self.now_ms = self.now_ms.max(fired.due_ms);
                Some(fired)
            }
            None => {
                self.now_ms = self.now_ms.max(self.target_ms);
                None
            }
        }
    }

    fn pending(&self) -> usize {
        self.queue.len()
    }
}

/// Scheduler on the real monotonic clock. The host polls it once per frame.
#[derive(Debug)]
pub struct RealtimeScheduler<E> {
    pub timer: HighPrecisionTimer,
    queue: TimerQueue<E>,
}

impl<E> RealtimeScheduler<E> {
    pub fn new() -> Self {
        Self::with_timer(HighPrecisionTimer::new())
    }

    pub fn with_timer(timer: HighPrecisionTimer) -> Self {
        Self {
            timer,
            queue: TimerQueue::new(),
        }
    }
}

impl<E> Default for RealtimeScheduler<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Clock for RealtimeScheduler<E> {
    fn now_ms(&self) -> u64 {
        self.timer.now_ms()
    }
}

impl<E> Scheduler<E> for RealtimeScheduler<E> {
    fn schedule_once(&mut self, delay_ms: u64, event: E) -> TimerHandle {
        let due = self.timer.now_ms() + delay_ms;
        self.queue.insert(due, event)
    }

    fn cancel(&mut self, handle: TimerHandle) -> bool {
        self.queue.remove(handle)
    }

    fn pop_due(&mut self) -> Option<Fired<E>> {
        let now = self.timer.now_ms();
        let fired = self.queue.pop_if_due(now)?;
        let late = now.saturating_sub(fired.due_ms);
        if late > 16 {
            tracing::debug!(timer = fired.handle.id(), late_ms = late, "timer fired late");
        }
        Some(fired)
    }

    fn pending(&self) -> usize {
        self.queue.len()
    }
}
