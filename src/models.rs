//! Domain models that mirror the SQLite schema and get passed throughout the
//! TUI. These stay light-weight data holders so the store, the classifier and
//! the screens can share them without dragging behaviour along.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Local, Utc};

/// The closed set of outcomes the injury classifier can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InjuryLabel {
    Abrasion,
    Bruise,
    Burn,
    /// Returned when the scores have no determinable maximum.
    Unknown,
}

impl InjuryLabel {
    /// Labels in model output order. Index `i` of the score vector belongs to
    /// `CLASSES[i]`.
    pub const CLASSES: [InjuryLabel; 3] =
        [InjuryLabel::Abrasion, InjuryLabel::Bruise, InjuryLabel::Burn];

    /// Pick the label with the highest score. On a tie the earliest index wins.
    ///
    /// An empty vector, a NaN anywhere, or a winner outside the known classes
    /// collapse to [`InjuryLabel::Unknown`].
    pub fn from_scores(scores: &[f32]) -> Self {
        if scores.iter().any(|score| score.is_nan()) {
            return InjuryLabel::Unknown;
        }

        let mut best: Option<(usize, f32)> = None;
        for (index, &score) in scores.iter().enumerate() {
            match best {
                Some((_, top)) if score <= top => {}
                _ => best = Some((index, score)),
            }
        }

        best.and_then(|(index, _)| InjuryLabel::CLASSES.get(index).copied())
            .unwrap_or(InjuryLabel::Unknown)
    }

    /// Stable text used both on screen and in the `predictions.label` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            InjuryLabel::Abrasion => "Abrasion",
            InjuryLabel::Bruise => "Bruise",
            InjuryLabel::Burn => "Burn",
            InjuryLabel::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for InjuryLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when stored text does not name a known label.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unrecognised injury label '{0}'")]
pub struct ParseLabelError(pub String);

impl FromStr for InjuryLabel {
    type Err = ParseLabelError;

    /// Case-insensitive, surrounding whitespace ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "abrasion" => Ok(InjuryLabel::Abrasion),
            "bruise" => Ok(InjuryLabel::Bruise),
            "burn" => Ok(InjuryLabel::Burn),
            "unknown" => Ok(InjuryLabel::Unknown),
            _ => Err(ParseLabelError(s.to_string())),
        }
    }
}

/// One stored classification outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionRecord {
    /// Primary key assigned by SQLite on insert.
    pub id: i64,
    /// Label text as stored. May be empty for rows written without a result;
    /// such rows are never eligible for deletion.
    pub label: String,
    /// Image the prediction was made from, if it was kept on disk.
    pub image_path: Option<PathBuf>,
    pub created_at: DateTime<Utc>,
}

impl PredictionRecord {
    /// Rows with an empty label are shown but cannot be deleted.
    pub fn is_deletable(&self) -> bool {
        !self.label.is_empty()
    }

    /// Parsed label, if the stored text names one.
    pub fn injury(&self) -> Option<InjuryLabel> {
        self.label.parse().ok()
    }

    /// `2026-10-19 14:03  Burn` style summary used by the history list.
    pub fn display_line(&self) -> String {
        let when = self
            .created_at
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M");
        let label = if self.label.trim().is_empty() {
            "(no result)"
        } else {
            self.label.trim()
        };
        format!("{when}  {label}")
    }
}

/// Insert payload for a new prediction; the store fills in id and timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPrediction {
    pub label: String,
    pub image_path: Option<PathBuf>,
}

impl NewPrediction {
    pub fn new(label: InjuryLabel, image_path: Option<PathBuf>) -> Self {
        Self {
            label: label.to_string(),
            image_path,
        }
    }
}
