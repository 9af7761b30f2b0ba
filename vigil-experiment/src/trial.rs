use vigil_core::FlankerStimulus;

/// PVT trial whose stimulus is on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PvtTrial {
    pub id: usize,
    pub revealed_at_ms: u64,
    /// Set once the miss threshold has passed without input.
    pub miss_flag: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrialTimestamps {
    pub fixation_start: u64,
    pub stimulus_start: Option<u64>,
    pub response: Option<u64>,
}

/// Flanker trial between fixation onset and its recorded outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlankerTrial {
    pub id: usize,
    pub stimulus: Option<FlankerStimulus>,
    pub timestamps: TrialTimestamps,
}

impl FlankerTrial {
    pub fn new(id: usize, fixation_start: u64) -> Self {
        Self {
            id,
            stimulus: None,
            timestamps: TrialTimestamps {
                fixation_start,
                stimulus_start: None,
                response: None,
            },
        }
    }

    pub fn reaction_time_ms(&self) -> Option<u64> {
        let shown = self.timestamps.stimulus_start?;
        let answered = self.timestamps.response?;
        Some(answered.saturating_sub(shown))
    }
}
