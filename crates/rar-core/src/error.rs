//! Error types for RAR Core
//!
//! Provides error handling for:
//! - Classifier transport/provider failures
//! - Label normalization (classifier contract) violations
//! - Per-stage failures inside a record sequencer
//! - Batch-level failures (timeout, invalid input, sink)
//!
//! `InvalidMatrixInput` is the odd one out: it is never returned as an
//! `Err`, it is written into the record as a visible diagnostic.

use crate::stage::Stage;
use std::path::PathBuf;

/// Main batch error type
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The whole batch did not finish before the deadline
    #[error("batch timed out after {timeout_ms}ms; reduce the number of records or retry later")]
    Timeout { timeout_ms: u64 },

    /// A single record failed and took the batch down with it
    #[error("record #{index} ({record_id}) failed: {source}")]
    RecordFailed {
        /// Position of the record in the submitted batch
        index: usize,
        /// Source-assigned record id
        record_id: String,
        /// The stage failure
        #[source]
        source: StageError,
    },

    /// Submitted batch violates the input contract
    #[error("invalid input: {0}")]
    InvalidInput(#[from] InputError),

    /// Run parameters are invalid
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Result sink rejected the batch
    #[error("sink error: {0}")]
    Sink(#[from] SinkError),
}

impl PipelineError {
    /// Check if this is the batch-level timeout
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Id of the record that failed, if a record failure caused this error
    #[must_use]
    pub fn record_id(&self) -> Option<&str> {
        match self {
            Self::RecordFailed { record_id, .. } => Some(record_id),
            _ => None,
        }
    }

    /// Stage that failed, if a record failure caused this error
    #[must_use]
    pub fn failed_stage(&self) -> Option<Stage> {
        match self {
            Self::RecordFailed { source, .. } => Some(source.stage()),
            _ => None,
        }
    }
}

/// Failure of one stage of one record
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    /// Classifier answered without any 高/中/低 label
    #[error("stage {stage}: classifier contract violation: {source}")]
    ContractViolation {
        stage: Stage,
        #[source]
        source: LabelError,
    },

    /// Classifier call itself failed
    #[error("stage {stage}: classifier call failed: {source}")]
    ClassifierFailed {
        stage: Stage,
        #[source]
        source: ClassifierError,
    },

    /// A declared input of the stage is not populated yet
    #[error("stage {stage}: input '{missing}' is not populated")]
    MissingInput { stage: Stage, missing: Stage },

    /// Limiter refused to hand out a permit
    #[error("stage {stage}: {source}")]
    Limiter {
        stage: Stage,
        #[source]
        source: LimiterError,
    },
}

impl StageError {
    /// Stage at which the record failed
    #[inline]
    #[must_use]
    pub fn stage(&self) -> Stage {
        match self {
            Self::ContractViolation { stage, .. }
            | Self::ClassifierFailed { stage, .. }
            | Self::MissingInput { stage, .. }
            | Self::Limiter { stage, .. } => *stage,
        }
    }

    /// Check if the classifier broke its label contract
    #[inline]
    #[must_use]
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, Self::ContractViolation { .. })
    }
}

/// Errors raised by a classifier implementation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClassifierError {
    /// Network or protocol failure
    #[error("transport error: {0}")]
    Transport(String),

    /// Provider answered with a non-success status
    #[error("provider returned status {status}: {message}")]
    Provider { status: u16, message: String },

    /// Provider answered but without any content
    #[error("empty response from classifier")]
    EmptyResponse,

    /// Classifier cannot serve requests at all
    #[error("classifier unavailable: {0}")]
    Unavailable(String),
}

impl ClassifierError {
    /// Check if a caller could reasonably retry
    ///
    /// The pipeline never retries on its own; this is informational for
    /// classifier wrappers that implement their own policy.
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Provider { status, .. } => *status == 429 || *status >= 500,
            Self::EmptyResponse | Self::Unavailable(_) => false,
        }
    }
}

/// Label normalization errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LabelError {
    /// Response contained none of 高/中/低
    #[error("no rating label (高/中/低) found in response {response:?}")]
    NoLabel { response: String },
}

/// Invalid input to one of the risk matrix lookups
///
/// The `Display` text is the sentinel that is stored in the record field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
pub enum InvalidMatrixInput {
    /// Severity or probability missing/out of domain
    #[error("出现错误,存在错误：严重性、可能性")]
    SeverityProbability,

    /// Risk level or detectability missing/out of domain
    #[error("出现错误,存在错误：风险等级、可检测性")]
    LevelDetectability,
}

impl InvalidMatrixInput {
    /// Sentinel text written into the record
    #[inline]
    #[must_use]
    pub const fn sentinel(self) -> &'static str {
        match self {
            Self::SeverityProbability => "出现错误,存在错误：严重性、可能性",
            Self::LevelDetectability => "出现错误,存在错误：风险等级、可检测性",
        }
    }

    /// Parse a sentinel back
    #[must_use]
    pub fn from_sentinel(text: &str) -> Option<Self> {
        [Self::SeverityProbability, Self::LevelDetectability]
            .into_iter()
            .find(|s| s.sentinel() == text)
    }
}

/// Concurrency limiter errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LimiterError {
    /// Limiter was closed while waiting
    #[error("concurrency limiter closed")]
    Closed,
}

/// Batch input contract violations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InputError {
    /// Record id is empty
    #[error("record #{index} has an empty id")]
    EmptyId { index: usize },

    /// Record id appears more than once
    #[error("duplicate record id '{id}' at #{first} and #{second}")]
    DuplicateId {
        id: String,
        first: usize,
        second: usize,
    },
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("io error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config file could not be parsed
    #[error("parse error in {path}: {message}")]
    Parse { path: PathBuf, message: String },

    /// Unknown config file extension
    #[error("unsupported config format: '{0}' (expected json or toml)")]
    UnsupportedFormat(String),

    /// A value is out of range
    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    /// Create an invalid-value error
    #[inline]
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Result sink errors
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// Output could not be written
    #[error("io error writing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Batch could not be encoded
    #[error("serialization failed: {0}")]
    Serialize(String),

    /// Sink refused the batch
    #[error("batch rejected: {0}")]
    Rejected(String),
}

impl SinkError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
