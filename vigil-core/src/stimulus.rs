use serde::{Deserialize, Serialize};

/// Direction of a flanker target arrow, and of a response key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Left,
    Right,
}

impl Direction {
    pub fn opposite(self) -> Self {
        match self {
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
        }
    }

    pub fn glyph(self) -> char {
        match self {
            Direction::Left => '<',
            Direction::Right => '>',
        }
    }
}

/// Whether the flanking arrows agree with the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Congruency {
    Congruent,
    Incongruent,
}

impl Congruency {
    pub fn is_congruent(self) -> bool {
        matches!(self, Congruency::Congruent)
    }
}

/// A flanker display: five arrows, the middle one is the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FlankerStimulus {
    pub congruency: Congruency,
    pub direction: Direction,
}

impl FlankerStimulus {
    pub fn new(congruency: Congruency, direction: Direction) -> Self {
        Self {
            congruency,
            direction,
        }
    }

    /// Fixed symbol string for each (congruency, direction) pair.
    pub fn pattern(&self) -> &'static str {
        match (self.congruency, self.direction) {
            (Congruency::Congruent, Direction::Left) => "<<<<<",
            (Congruency::Congruent, Direction::Right) => ">>>>>",
            (Congruency::Incongruent, Direction::Left) => ">><>>",
            (Congruency::Incongruent, Direction::Right) => "<<><<",
        }
    }

    /// Arrow directions left to right, as drawn.
    pub fn arrows(&self) -> [Direction; 5] {
        let flank = match self.congruency {
            Congruency::Congruent => self.direction,
            Congruency::Incongruent => self.direction.opposite(),
        };
        [flank, flank, self.direction, flank, flank]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_table_is_fixed() {
        use Congruency::*;
        use Direction::*;
        assert_eq!(FlankerStimulus::new(Congruent, Left).pattern(), "<<<<<");
        assert_eq!(FlankerStimulus::new(Congruent, Right).pattern(), ">>>>>");
        assert_eq!(FlankerStimulus::new(Incongruent, Left).pattern(), ">><>>");
        assert_eq!(FlankerStimulus::new(Incongruent, Right).pattern(), "<<><<");
    }

    #[test]
    fn arrows_agree_with_pattern() {
        for congruency in [Congruency::Congruent, Congruency::Incongruent] {
            for direction in [Direction::Left, Direction::Right] {
                let stim = FlankerStimulus::new(congruency, direction);
                let drawn: String = stim.arrows().iter().map(|d| d.glyph()).collect();
                assert_eq!(drawn, stim.pattern());
                assert_eq!(stim.arrows()[2], direction);
            }
        }
    }
}
