/// Defines the phases a task engine moves through
pub trait Phase: Copy + Clone + PartialEq + Eq + Send + Sync + std::fmt::Debug + Default {
    /// Whether a response event is accepted in this phase.
    fn allows_input(&self) -> bool;
    fn is_terminal(&self) -> bool;
    fn label(&self) -> &'static str;

    fn is_ready(&self) -> bool {
        *self == Self::default()
    }

    /// Started and not yet finished.
    fn is_running(&self) -> bool {
        !self.is_ready() && !self.is_terminal()
    }
}

/// Psychomotor vigilance task phases.
#[derive(Copy, Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum PvtPhase {
    #[default]
    Ready,
    Waiting,
    Stimulus,
    Feedback,
    Finished,
}

impl Phase for PvtPhase {
    fn allows_input(&self) -> bool {
        matches!(self, Self::Stimulus)
    }

    fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished)
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::Waiting => "waiting",
            Self::Stimulus => "stimulus",
            Self::Feedback => "feedback",
            Self::Finished => "finished",
        }
    }
}

/// Flanker task phases.
#[derive(Copy, Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum FlankerPhase {
    #[default]
    Ready,
    Fixation,
    Stimulus,
    Feedback,
    Finished,
}

impl Phase for FlankerPhase {
    fn allows_input(&self) -> bool {
        matches!(self, Self::Stimulus)
    }

    fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished)
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::Fixation => "fixation",
            Self::Stimulus => "stimulus",
            Self::Feedback => "feedback",
            Self::Finished => "finished",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_stimulus_accepts_input() {
        let pvt = [
            PvtPhase::Ready,
            PvtPhase::Waiting,
            PvtPhase::Stimulus,
            PvtPhase::Feedback,
            PvtPhase::Finished,
        ];
        let accepting: Vec<_> = pvt.iter().filter(|p| p.allows_input()).collect();
        assert_eq!(accepting, vec![&PvtPhase::Stimulus]);

        assert!(FlankerPhase::Stimulus.allows_input());
        assert!(!FlankerPhase::Fixation.allows_input());
        assert!(!FlankerPhase::Feedback.allows_input());
    }

    #[test]
    fn running_excludes_ready_and_finished() {
        assert!(!PvtPhase::Ready.is_running());
        assert!(PvtPhase::Waiting.is_running());
        assert!(!PvtPhase::Finished.is_running());
        assert!(FlankerPhase::Ready.is_ready());
        assert!(FlankerPhase::Finished.is_terminal());
    }
}
