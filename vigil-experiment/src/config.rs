use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("min_wait_ms ({min}) exceeds max_wait_ms ({max})")]
    WaitRange { min: u64, max: u64 },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("lapse_window_ms ({lapse}) must exceed miss_threshold_ms ({threshold})")]
    LapseWindow { lapse: u64, threshold: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PvtConfig {
    /// Total run length; the run ends at the first phase boundary after it.
    pub duration_ms: u64,
    pub min_wait_ms: u64,
    pub max_wait_ms: u64,
    /// Responses slower than this count as misses.
    pub miss_threshold_ms: u64,
    pub feedback_ms: u64,
    /// A stimulus left unanswered this long is recorded as a miss.
    pub lapse_window_ms: u64,
}

impl Default for PvtConfig {
    fn default() -> Self {
        Self {
            duration_ms: 180_000,
            min_wait_ms: 2_000,
            max_wait_ms: 10_000,
            miss_threshold_ms: 355,
            feedback_ms: 1_000,
            lapse_window_ms: 30_000,
        }
    }
}

impl PvtConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_wait_ms > self.max_wait_ms {
            return Err(ConfigError::WaitRange {
                min: self.min_wait_ms,
                max: self.max_wait_ms,
            });
        }
        if self.duration_ms == 0 {
            return Err(ConfigError::Zero("duration_ms"));
        }
        if self.lapse_window_ms <= self.miss_threshold_ms {
            return Err(ConfigError::LapseWindow {
                lapse: self.lapse_window_ms,
                threshold: self.miss_threshold_ms,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlankerConfig {
    pub total_trials: usize,
    pub fixation_ms: u64,
    pub response_window_ms: u64,
    pub feedback_ms: u64,
}

impl Default for FlankerConfig {
    fn default() -> Self {
        Self {
            total_trials: 100,
            fixation_ms: 1_000,
            response_window_ms: 1_000,
            feedback_ms: 500,
        }
    }
}

impl FlankerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.total_trials == 0 {
            return Err(ConfigError::Zero("total_trials"));
        }
        if self.response_window_ms == 0 {
            return Err(ConfigError::Zero("response_window_ms"));
        }
        Ok(())
    }
}
