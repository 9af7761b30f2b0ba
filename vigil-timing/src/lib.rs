//! Clock and one-shot timer port shared by the task engines.

pub mod scheduler;
pub mod timer;

pub use scheduler::{Fired, ManualScheduler, RealtimeScheduler, Scheduler, TimerHandle, TimerQueue};
pub use timer::{CalibrationStats, Clock, HighPrecisionTimer};
