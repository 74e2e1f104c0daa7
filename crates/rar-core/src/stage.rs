//! Enrichment stages
//!
//! A record walks through eight stages in a fixed order. Each stage declares
//! which earlier outputs it consumes; the sequencer refuses to run a
//! classifier-backed stage before those are populated.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the eight ordered enrichment stages
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// 1. Failure event hypothesis (narrative)
    FailureEvent,
    /// 2. Potential failure consequences (narrative)
    PotentialConsequences,
    /// 3. Severity rating
    Severity,
    /// 4. Probability rating
    Probability,
    /// 5. Risk level (matrix lookup)
    RiskLevel,
    /// 6. Detectability rating
    Detectability,
    /// 7. Risk priority (matrix lookup)
    RiskPriority,
    /// 8. Risk control measures (narrative)
    RiskControlMeasures,
}

impl Stage {
    /// All stages in execution order
    pub const ALL: [Stage; 8] = [
        Stage::FailureEvent,
        Stage::PotentialConsequences,
        Stage::Severity,
        Stage::Probability,
        Stage::RiskLevel,
        Stage::Detectability,
        Stage::RiskPriority,
        Stage::RiskControlMeasures,
    ];

    /// 1-based position in the sequence
    #[inline]
    #[must_use]
    pub const fn ordinal(self) -> usize {
        match self {
            Stage::FailureEvent => 1,
            Stage::PotentialConsequences => 2,
            Stage::Severity => 3,
            Stage::Probability => 4,
            Stage::RiskLevel => 5,
            Stage::Detectability => 6,
            Stage::RiskPriority => 7,
            Stage::RiskControlMeasures => 8,
        }
    }

    /// Machine name
    #[inline]
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Stage::FailureEvent => "failure_event",
            Stage::PotentialConsequences => "potential_consequences",
            Stage::Severity => "severity",
            Stage::Probability => "probability",
            Stage::RiskLevel => "risk_level",
            Stage::Detectability => "detectability",
            Stage::RiskPriority => "risk_priority",
            Stage::RiskControlMeasures => "risk_control_measures",
        }
    }

    /// Report heading of the field this stage fills
    #[inline]
    #[must_use]
    pub const fn heading(self) -> &'static str {
        match self {
            Stage::FailureEvent => "失效事件",
            Stage::PotentialConsequences => "潜在失效后果",
            Stage::Severity => "严重性",
            Stage::Probability => "可能性",
            Stage::RiskLevel => "风险等级",
            Stage::Detectability => "可检测性",
            Stage::RiskPriority => "风险优先级",
            Stage::RiskControlMeasures => "风险控制措施",
        }
    }

    /// Whether the stage calls the classifier
    #[inline]
    #[must_use]
    pub const fn uses_classifier(self) -> bool {
        !matches!(self, Stage::RiskLevel | Stage::RiskPriority)
    }

    /// Earlier stages whose outputs this stage consumes
    #[must_use]
    pub const fn inputs(self) -> &'static [Stage] {
        match self {
            Stage::FailureEvent => &[],
            Stage::PotentialConsequences => &[Stage::FailureEvent],
            Stage::Severity => &[Stage::PotentialConsequences],
            Stage::Probability | Stage::Detectability => {
                &[Stage::FailureEvent, Stage::PotentialConsequences]
            }
            Stage::RiskLevel => &[Stage::Severity, Stage::Probability],
            Stage::RiskPriority => &[Stage::RiskLevel, Stage::Detectability],
            Stage::RiskControlMeasures => &[
                Stage::FailureEvent,
                Stage::PotentialConsequences,
                Stage::Severity,
                Stage::Probability,
                Stage::RiskLevel,
                Stage::Detectability,
                Stage::RiskPriority,
            ],
        }
    }

    /// Next stage in the sequence
    #[must_use]
    pub fn next(self) -> Option<Stage> {
        Stage::ALL.get(self.ordinal()).copied()
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
