//! Core types for RAR
//!
//! Defines the fundamental types of the pipeline:
//! - Ordinal ratings (高/中/低) and risk levels ("1"/"2"/"3")
//! - Matrix results that may carry an invalid-input sentinel
//! - Requirement descriptors (input) and requirement records (work unit)

use crate::error::InvalidMatrixInput;
use crate::stage::Stage;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A value with a fixed textual label in the report
pub trait Label: Copy + Sized {
    /// Report label
    fn label(self) -> &'static str;

    /// Parse an exact label
    fn from_label(text: &str) -> Option<Self>;
}

/// Ordinal High/Medium/Low judgment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Rating {
    /// 高
    #[serde(rename = "高")]
    High,
    /// 中
    #[serde(rename = "中")]
    Medium,
    /// 低
    #[serde(rename = "低")]
    Low,
}

impl Rating {
    /// All ratings, in tie-break precedence order (高 > 中 > 低)
    pub const ALL: [Rating; 3] = [Rating::High, Rating::Medium, Rating::Low];

    /// Label character
    #[inline]
    #[must_use]
    pub const fn as_char(self) -> char {
        match self {
            Rating::High => '高',
            Rating::Medium => '中',
            Rating::Low => '低',
        }
    }

    /// Parse a single label character
    #[inline]
    #[must_use]
    pub const fn from_char(c: char) -> Option<Self> {
        match c {
            '高' => Some(Rating::High),
            '中' => Some(Rating::Medium),
            '低' => Some(Rating::Low),
            _ => None,
        }
    }

    /// Row/column index in the risk matrices
    #[inline]
    #[must_use]
    pub(crate) const fn index(self) -> usize {
        match self {
            Rating::High => 0,
            Rating::Medium => 1,
            Rating::Low => 2,
        }
    }
}

impl Label for Rating {
    fn label(self) -> &'static str {
        match self {
            Rating::High => "高",
            Rating::Medium => "中",
            Rating::Low => "低",
        }
    }

    fn from_label(text: &str) -> Option<Self> {
        let mut chars = text.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Rating::from_char(c),
            _ => None,
        }
    }
}

/// Risk level derived from severity and probability
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RiskLevel {
    /// "1", highest risk
    #[serde(rename = "1")]
    One,
    /// "2"
    #[serde(rename = "2")]
    Two,
    /// "3", lowest risk
    #[serde(rename = "3")]
    Three,
}

impl RiskLevel {
    /// All levels
    pub const ALL: [RiskLevel; 3] = [RiskLevel::One, RiskLevel::Two, RiskLevel::Three];

    /// Row index in the priority matrix
    #[inline]
    #[must_use]
    pub(crate) const fn index(self) -> usize {
        match self {
            RiskLevel::One => 0,
            RiskLevel::Two => 1,
            RiskLevel::Three => 2,
        }
    }
}

impl Label for RiskLevel {
    fn label(self) -> &'static str {
        match self {
            RiskLevel::One => "1",
            RiskLevel::Two => "2",
            RiskLevel::Three => "3",
        }
    }

    fn from_label(text: &str) -> Option<Self> {
        match text {
            "1" => Some(RiskLevel::One),
            "2" => Some(RiskLevel::Two),
            "3" => Some(RiskLevel::Three),
            _ => None,
        }
    }
}

macro_rules! label_display {
    ($($ty:ty),*) => {$(
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.label())
            }
        }

        impl FromStr for $ty {
            type Err = UnknownLabel;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                <$ty>::from_label(s).ok_or_else(|| UnknownLabel(s.to_string()))
            }
        }
    )*};
}

label_display!(Rating, RiskLevel);

/// Text that is not one of the known labels
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown label: {0:?}")]
pub struct UnknownLabel(pub String);

/// Result of a risk matrix lookup
///
/// Serializes as a bare string: the label of the value, or the sentinel
/// text when the inputs were invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatrixCell<T> {
    /// Lookup succeeded
    Value(T),
    /// Inputs were missing or out of domain
    Invalid(InvalidMatrixInput),
}

impl<T: Label> MatrixCell<T> {
    /// Text stored in the report
    #[inline]
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            MatrixCell::Value(v) => v.label(),
            MatrixCell::Invalid(s) => s.sentinel(),
        }
    }

    /// The looked-up value, if any
    #[inline]
    #[must_use]
    pub fn value(&self) -> Option<T> {
        match self {
            MatrixCell::Value(v) => Some(*v),
            MatrixCell::Invalid(_) => None,
        }
    }

    /// Check if this cell holds a sentinel
    #[inline]
    #[must_use]
    pub fn is_invalid(&self) -> bool {
        matches!(self, MatrixCell::Invalid(_))
    }
}

impl<T: Label> fmt::Display for MatrixCell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl<T: Label> Serialize for MatrixCell<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

impl<'de, T: Label> Deserialize<'de> for MatrixCell<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        if let Some(v) = T::from_label(&text) {
            return Ok(MatrixCell::Value(v));
        }
        InvalidMatrixInput::from_sentinel(&text)
            .map(MatrixCell::Invalid)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown matrix value {text:?}")))
    }
}

/// Requirement as delivered by the input collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequirementDescriptor {
    /// Source-assigned id (URS number)
    pub id: String,
    /// Requirement statement
    pub description: String,
    /// Grouping label (URS chapter / sheet)
    pub chapter: String,
}

impl RequirementDescriptor {
    /// Create new descriptor
    #[inline]
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        description: impl Into<String>,
        chapter: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            chapter: chapter.into(),
        }
    }
}

/// One unit of work: a requirement plus its enrichment fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequirementRecord {
    /// Source-assigned id, unique within a batch
    pub id: String,
    /// Requirement statement
    pub description: String,
    /// Grouping label
    pub chapter: String,
    #[serde(default)]
    pub failure_event: Option<String>,
    #[serde(default)]
    pub potential_consequences: Option<String>,
    #[serde(default)]
    pub severity: Option<Rating>,
    #[serde(default)]
    pub probability: Option<Rating>,
    #[serde(default)]
    pub risk_level: Option<MatrixCell<RiskLevel>>,
    #[serde(default)]
    pub detectability: Option<Rating>,
    #[serde(default)]
    pub risk_priority: Option<MatrixCell<Rating>>,
    #[serde(default)]
    pub risk_control_measures: Option<String>,
}

impl RequirementRecord {
    /// Create a record with no enrichment yet
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        description: impl Into<String>,
        chapter: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            chapter: chapter.into(),
            failure_event: None,
            potential_consequences: None,
            severity: None,
            probability: None,
            risk_level: None,
            detectability: None,
            risk_priority: None,
            risk_control_measures: None,
        }
    }

    /// Check if the field produced by `stage` is populated
    #[must_use]
    pub fn has_output(&self, stage: Stage) -> bool {
        self.output_text(stage).is_some()
    }

    /// Text of the field produced by `stage`, as it appears in the report
    #[must_use]
    pub fn output_text(&self, stage: Stage) -> Option<&str> {
        match stage {
            Stage::FailureEvent => self.failure_event.as_deref(),
            Stage::PotentialConsequences => self.potential_consequences.as_deref(),
            Stage::Severity => self.severity.map(Label::label),
            Stage::Probability => self.probability.map(Label::label),
            Stage::RiskLevel => self.risk_level.as_ref().map(MatrixCell::label),
            Stage::Detectability => self.detectability.map(Label::label),
            Stage::RiskPriority => self.risk_priority.as_ref().map(MatrixCell::label),
            Stage::RiskControlMeasures => self.risk_control_measures.as_deref(),
        }
    }

    /// First stage whose output is still missing
    #[must_use]
    pub fn next_stage(&self) -> Option<Stage> {
        Stage::ALL.into_iter().find(|s| !self.has_output(*s))
    }

    /// Check if all eight stages have produced output
    #[inline]
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.next_stage().is_none()
    }
}

impl From<RequirementDescriptor> for RequirementRecord {
    fn from(d: RequirementDescriptor) -> Self {
        Self::new(d.id, d.description, d.chapter)
    }
}
