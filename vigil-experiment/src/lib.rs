pub mod config;
pub mod flanker;
pub mod flow;
pub mod lifecycle;
pub mod pvt;
pub mod trial;

pub use config::{ConfigError, FlankerConfig, PvtConfig};
pub use flanker::{FlankerEngine, FlankerTimer};
pub use flow::{FlowError, FlowStep, TaskFlow};
pub use lifecycle::{PhaseChange, PhaseTracker, TimerSlot};
pub use pvt::{PvtEngine, PvtTimer};
pub use trial::{FlankerTrial, PvtTrial};
