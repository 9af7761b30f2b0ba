use serde::{Deserialize, Serialize};

use crate::stimulus::{Congruency, Direction, FlankerStimulus};

/// One PVT response. Misses are kept so attempt counts stay exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionSample {
    pub reaction_time_ms: u64,
    pub is_miss: bool,
}

/// Recorded result of one flanker trial
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialRecord {
    pub stimulus_pattern: String,
    pub congruency: Congruency,
    pub correct_direction: Direction,
    /// `None` when the response window closed without input.
    pub user_response: Option<Direction>,
    pub is_correct: bool,
    pub reaction_time_ms: Option<u64>,
}

impl TrialRecord {
    pub fn new(
        stimulus: &FlankerStimulus,
        user_response: Option<Direction>,
        reaction_time_ms: Option<u64>,
    ) -> Self {
        Self {
            stimulus_pattern: stimulus.pattern().to_string(),
            congruency: stimulus.congruency,
            correct_direction: stimulus.direction,
            user_response,
            is_correct: user_response == Some(stimulus.direction),
            reaction_time_ms,
        }
    }

    pub fn outcome(&self) -> FlankerOutcome {
        match self.user_response {
            None => FlankerOutcome::NoResponse,
            Some(_) if self.is_correct => FlankerOutcome::Correct,
            Some(_) => FlankerOutcome::Incorrect,
        }
    }
}

/// Feedback shown after a flanker trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlankerOutcome {
    Correct,
    Incorrect,
    NoResponse,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn correctness_follows_target_direction() {
        let stim = FlankerStimulus::new(Congruency::Incongruent, Direction::Left);

        let right = TrialRecord::new(&stim, Some(Direction::Left), Some(420));
        assert!(right.is_correct);
        assert_eq!(right.outcome(), FlankerOutcome::Correct);

        let wrong = TrialRecord::new(&stim, Some(Direction::Right), Some(380));
        assert!(!wrong.is_correct);
        assert_eq!(wrong.outcome(), FlankerOutcome::Incorrect);

        let none = TrialRecord::new(&stim, None, None);
        assert!(!none.is_correct);
        assert_eq!(none.outcome(), FlankerOutcome::NoResponse);
        assert_eq!(none.stimulus_pattern, ">><>>");
    }
}
