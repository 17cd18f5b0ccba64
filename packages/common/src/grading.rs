use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Weight of the assessment average in a program's final grade.
pub const ASSESSMENT_WEIGHT: f64 = 0.5;
/// Weight of the assignment average in a program's final grade.
pub const ASSIGNMENT_WEIGHT: f64 = 0.5;

/// Round to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScoreError {
    #[error("Score must be a finite number")]
    NotFinite,
    #[error("Score must not be negative")]
    Negative,
    #[error("Score {score} exceeds the maximum of {max}")]
    AboveMaximum { score: f64, max: f64 },
    #[error("Maximum score must be greater than zero")]
    InvalidMaximum,
}

/// Check `0 <= score <= max_score`.
///
/// Assessments and assignments share one scale: raw points out of the item's own maximum.
pub fn validate_score(score: f64, max_score: f64) -> Result<(), ScoreError> {
    if !max_score.is_finite() || max_score <= 0.0 {
        return Err(ScoreError::InvalidMaximum);
    }
    if !score.is_finite() {
        return Err(ScoreError::NotFinite);
    }
    if score < 0.0 {
        return Err(ScoreError::Negative);
    }
    if score > max_score {
        return Err(ScoreError::AboveMaximum {
            score,
            max: max_score,
        });
    }
    Ok(())
}

/// `score / max_score * 100`, rounded to two decimals.
pub fn percentage(score: f64, max_score: f64) -> f64 {
    if max_score <= 0.0 {
        return 0.0;
    }
    round2(score / max_score * 100.0)
}

/// Mean of the given percentages, `None` when there are none.
pub fn average<I>(values: I) -> Option<f64>
where
    I: IntoIterator<Item = f64>,
{
    let (sum, count) = values
        .into_iter()
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| round2(sum / count as f64))
}

/// Final program percentage from the two category averages.
///
/// When only one category has graded work it stands alone.
pub fn weighted_final(assessment_avg: Option<f64>, assignment_avg: Option<f64>) -> Option<f64> {
    match (assessment_avg, assignment_avg) {
        (Some(a), Some(b)) => Some(round2(a * ASSESSMENT_WEIGHT + b * ASSIGNMENT_WEIGHT)),
        (Some(a), None) => Some(a),
        (None, Some(b)) => Some(b),
        (None, None) => None,
    }
}

/// Letter grade band for a percentage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
pub enum LetterGrade {
    #[serde(rename = "A+")]
    APlus,
    #[serde(rename = "A")]
    A,
    #[serde(rename = "A-")]
    AMinus,
    #[serde(rename = "B+")]
    BPlus,
    #[serde(rename = "B")]
    B,
    #[serde(rename = "B-")]
    BMinus,
    #[serde(rename = "C+")]
    CPlus,
    #[serde(rename = "C")]
    C,
    #[serde(rename = "C-")]
    CMinus,
    #[serde(rename = "D+")]
    DPlus,
    #[serde(rename = "D")]
    D,
    #[serde(rename = "D-")]
    DMinus,
    #[serde(rename = "F")]
    F,
}

/// Lower bound (inclusive) of each band, highest first.
const BANDS: &[(f64, LetterGrade)] = &[
    (97.0, LetterGrade::APlus),
    (93.0, LetterGrade::A),
    (90.0, LetterGrade::AMinus),
    (87.0, LetterGrade::BPlus),
    (83.0, LetterGrade::B),
    (80.0, LetterGrade::BMinus),
    (77.0, LetterGrade::CPlus),
    (73.0, LetterGrade::C),
    (70.0, LetterGrade::CMinus),
    (67.0, LetterGrade::DPlus),
    (63.0, LetterGrade::D),
    (60.0, LetterGrade::DMinus),
];

impl LetterGrade {
    pub fn from_percentage(percentage: f64) -> Self {
        BANDS
            .iter()
            .find(|(floor, _)| percentage >= *floor)
            .map(|(_, grade)| *grade)
            .unwrap_or(Self::F)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::APlus => "A+",
            Self::A => "A",
            Self::AMinus => "A-",
            Self::BPlus => "B+",
            Self::B => "B",
            Self::BMinus => "B-",
            Self::CPlus => "C+",
            Self::C => "C",
            Self::CMinus => "C-",
            Self::DPlus => "D+",
            Self::D => "D",
            Self::DMinus => "D-",
            Self::F => "F",
        }
    }
}

impl fmt::Display for LetterGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
