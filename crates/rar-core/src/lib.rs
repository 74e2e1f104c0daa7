//! RAR Core - risk assessment report enrichment
//!
//! Takes requirement records and fills in eight risk fields per record:
//! - Failure event and potential consequences (classifier narrative)
//! - Severity, probability, detectability (classifier label, majority vote)
//! - Risk level and risk priority (fixed 3×3 matrices)
//! - Risk control measures (classifier narrative)
//!
//! Records run concurrently under one shared limiter and one batch deadline.
//!
//! # Example
//!
//! ```rust,ignore
//! use rar_core::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn example(classifier: Arc<dyn Classifier>) -> Result<(), PipelineError> {
//! let orchestrator = BatchOrchestrator::new(classifier, PipelineConfig::new().with_concurrency(3))?;
//!
//! let records = vec![RequirementDescriptor::new("URS-001", "系统应记录所有登录尝试", "安全")];
//! let enriched = orchestrator.run(records).await?;
//!
//! println!("risk priority: {:?}", enriched[0].risk_priority);
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

// Core modules
pub mod classifier;
pub mod config;
pub mod error;
pub mod label;
pub mod limiter;
pub mod matrix;
pub mod orchestrator;
pub mod sequencer;
pub mod sink;
pub mod stage;
pub mod types;

// Re-exports for convenience
pub use classifier::{Classifier, ClassifyRequest};
pub use config::{ApiConfig, PipelineConfig, RarConfig, API_KEY_ENV, MAX_CONCURRENCY};
pub use error::{
    ClassifierError, ConfigError, InputError, InvalidMatrixInput, LabelError, LimiterError,
    PipelineError, SinkError, StageError,
};
pub use label::{normalize_label, LabelTally};
pub use limiter::{ConcurrencyLimiter, LimiterPermit, LimiterStats};
pub use matrix::RiskMatrix;
pub use orchestrator::{BatchOrchestrator, RecordFailure, RecordOutcome};
pub use sequencer::RecordSequencer;
pub use sink::{EnrichedBatch, ResultSink};
pub use stage::Stage;
pub use types::{
    Label, MatrixCell, Rating, RequirementDescriptor, RequirementRecord, RiskLevel, UnknownLabel,
};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with RAR Core
    pub use crate::{
        BatchOrchestrator, Classifier, ClassifierError, ClassifyRequest, EnrichedBatch, Label,
        PipelineConfig, PipelineError, Rating, RequirementDescriptor, RequirementRecord,
        ResultSink, RiskLevel, RiskMatrix, Stage,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
