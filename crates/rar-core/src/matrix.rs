//! Risk matrices
//!
//! Two fixed 3×3 tables:
//! - severity × probability → risk level
//! - risk level × detectability → risk priority
//!
//! The string-level lookups never fail: missing or out-of-domain labels
//! yield a `MatrixCell::Invalid` sentinel that ends up in the report.

use crate::error::InvalidMatrixInput;
use crate::types::{Label, MatrixCell, Rating, RiskLevel};

use crate::types::Rating::{High as H, Low as L, Medium as M};
use crate::types::RiskLevel::{One, Three, Two};

/// Rows: severity 高/中/低, columns: probability 高/中/低
const LEVEL_TABLE: [[RiskLevel; 3]; 3] = [
    [One, One, Two],
    [One, Two, Three],
    [Two, Three, Three],
];

/// Rows: level 1/2/3, columns: detectability 高/中/低
const PRIORITY_TABLE: [[Rating; 3]; 3] = [
    [M, H, H],
    [L, M, H],
    [L, L, M],
];

/// Deterministic risk scoring tables
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RiskMatrix;

impl RiskMatrix {
    /// Risk level for a severity/probability pair
    #[inline]
    #[must_use]
    pub const fn level_for(severity: Rating, probability: Rating) -> RiskLevel {
        LEVEL_TABLE[severity.index()][probability.index()]
    }

    /// Risk priority for a level/detectability pair
    #[inline]
    #[must_use]
    pub const fn priority_for(level: RiskLevel, detectability: Rating) -> Rating {
        PRIORITY_TABLE[level.index()][detectability.index()]
    }

    /// Risk level from report labels
    ///
    /// Returns the severity/probability sentinel unless both inputs are
    /// exactly one of 高/中/低.
    #[must_use]
    pub fn risk_level(severity: Option<&str>, probability: Option<&str>) -> MatrixCell<RiskLevel> {
        match (
            severity.and_then(Rating::from_label),
            probability.and_then(Rating::from_label),
        ) {
            (Some(s), Some(p)) => MatrixCell::Value(Self::level_for(s, p)),
            _ => MatrixCell::Invalid(InvalidMatrixInput::SeverityProbability),
        }
    }

    /// Risk priority from report labels
    ///
    /// Returns the level/detectability sentinel unless the level is exactly
    /// one of "1"/"2"/"3" and detectability exactly one of 高/中/低.
    #[must_use]
    pub fn risk_priority(level: Option<&str>, detectability: Option<&str>) -> MatrixCell<Rating> {
        match (
            level.and_then(RiskLevel::from_label),
            detectability.and_then(Rating::from_label),
        ) {
            (Some(l), Some(d)) => MatrixCell::Value(Self::priority_for(l, d)),
            _ => MatrixCell::Invalid(InvalidMatrixInput::LevelDetectability),
        }
    }

    /// Render both tables as plain text
    #[must_use]
    pub fn render() -> String {
        let mut out = String::from("风险等级 (严重性 \\ 可能性)\n      高  中  低\n");
        for s in Rating::ALL {
            out.push_str(&format!("  {}  ", s.label()));
            for p in Rating::ALL {
                out.push_str(&format!("  {} ", Self::level_for(s, p).label()));
            }
            out.push('\n');
        }
        out.push_str("\n风险优先级 (风险等级 \\ 可检测性)\n      高  中  低\n");
        for l in RiskLevel::ALL {
            out.push_str(&format!("  {}   ", l.label()));
            for d in Rating::ALL {
                out.push_str(&format!(" {} ", Self::priority_for(l, d).label()));
            }
            out.push('\n');
        }
        out
    }
}
