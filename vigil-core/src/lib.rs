pub mod error;
pub mod phase;
pub mod result;
pub mod stimulus;
pub mod survey;
pub mod trial;

pub use error::ValidationError;
pub use phase::{FlankerPhase, Phase, PvtPhase};
pub use result::{FlankerResult, FlankerTrialDetail, PvtResult, TaskKind, TaskResult};
pub use stimulus::{Congruency, Direction, FlankerStimulus};
pub use survey::{EFSI_ITEM_COUNT, EfsiResult, EfsiRisk, VAS_MAX, VasLevel, VasResult};
pub use trial::{FlankerOutcome, ReactionSample, TrialRecord};
