//! Questionnaire results: the 26-item overwork questionnaire (EFSI) and the
//! sleepiness/fatigue visual analogue scales (VAS). Only the result shapes
//! and their scoring live here; input screens belong to the host.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

pub const EFSI_ITEM_COUNT: usize = 26;
pub const EFSI_MIN_ANSWER: u8 = 1;
pub const EFSI_MAX_ANSWER: u8 = 4;
pub const VAS_MAX: u8 = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EfsiResult {
    pub total_score: u32,
    pub answers: Vec<u8>,
}

impl EfsiResult {
    /// Scores a completed questionnaire.
    pub fn from_answers(answers: Vec<u8>) -> Result<Self, ValidationError> {
        check_answers(&answers)?;
        Ok(Self {
            total_score: answers.iter().map(|&a| a as u32).sum(),
            answers,
        })
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        check_answers(&self.answers)?;
        let expected: u32 = self.answers.iter().map(|&a| a as u32).sum();
        if expected != self.total_score {
            return Err(ValidationError::TotalMismatch {
                expected,
                found: self.total_score,
            });
        }
        Ok(())
    }

    pub fn risk(&self) -> EfsiRisk {
        EfsiRisk::from_score(self.total_score)
    }
}

fn check_answers(answers: &[u8]) -> Result<(), ValidationError> {
    if answers.len() != EFSI_ITEM_COUNT {
        return Err(ValidationError::AnswerCount {
            expected: EFSI_ITEM_COUNT,
            found: answers.len(),
        });
    }
    if let Some((index, &value)) = answers
        .iter()
        .enumerate()
        .find(|(_, a)| !(EFSI_MIN_ANSWER..=EFSI_MAX_ANSWER).contains(*a))
    {
        return Err(ValidationError::AnswerOutOfRange { index, value });
    }
    Ok(())
}

/// Overwork risk band for an EFSI total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EfsiRisk {
    Low,
    Moderate,
    High,
}

impl EfsiRisk {
    // Bands predate the 1..=4 answer scale, so a complete questionnaire
    // (minimum 26) never lands in `Low`.
    pub fn from_score(score: u32) -> Self {
        match score {
            0..=20 => EfsiRisk::Low,
            21..=40 => EfsiRisk::Moderate,
            _ => EfsiRisk::High,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            EfsiRisk::Low => "Few signs of overwork.",
            EfsiRisk::Moderate => "Some signs of overwork. Make time to rest.",
            EfsiRisk::High => "Possible overwork. Rest and consider talking to someone.",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VasResult {
    pub sleepiness_score: u8,
    pub fatigue_score: u8,
}

impl VasResult {
    pub fn new(sleepiness_score: u8, fatigue_score: u8) -> Result<Self, ValidationError> {
        let result = Self {
            sleepiness_score,
            fatigue_score,
        };
        result.validate()?;
        Ok(result)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        for (field, value) in [
            ("sleepiness_score", self.sleepiness_score),
            ("fatigue_score", self.fatigue_score),
        ] {
            if value > VAS_MAX {
                return Err(ValidationError::ScoreOutOfRange {
                    field,
                    value: value as u32,
                    max: VAS_MAX as u32,
                });
            }
        }
        Ok(())
    }

    pub fn sleepiness(&self) -> VasLevel {
        VasLevel::from_score(self.sleepiness_score)
    }

    pub fn fatigue(&self) -> VasLevel {
        VasLevel::from_score(self.fatigue_score)
    }
}

/// Five equal-width bands of a 0-100 slider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum VasLevel {
    VeryLow,
    Low,
    Neutral,
    High,
    VeryHigh,
}

impl VasLevel {
    pub fn from_score(score: u8) -> Self {
        match score {
            0..20 => VasLevel::VeryLow,
            20..40 => VasLevel::Low,
            40..60 => VasLevel::Neutral,
            60..80 => VasLevel::High,
            _ => VasLevel::VeryHigh,
        }
    }

    pub fn sleepiness_label(&self) -> &'static str {
        match self {
            VasLevel::VeryLow => "wide awake",
            VasLevel::Low => "fairly awake",
            VasLevel::Neutral => "neutral",
            VasLevel::High => "somewhat sleepy",
            VasLevel::VeryHigh => "very sleepy",
        }
    }

    pub fn fatigue_label(&self) -> &'static str {
        match self {
            VasLevel::VeryLow => "full of energy",
            VasLevel::Low => "fairly energetic",
            VasLevel::Neutral => "neutral",
            VasLevel::High => "somewhat tired",
            VasLevel::VeryHigh => "very tired",
        }
    }
}
