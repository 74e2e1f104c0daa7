//! Result sink abstraction
//!
//! Receives the ordered enriched records of a finished batch. File writers
//! live in `rar-io`; the core only knows this trait.

use crate::error::SinkError;
use crate::types::RequirementRecord;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Payload handed to a sink: `{ totalItems, items }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedBatch {
    /// Number of items
    pub total_items: usize,
    /// Enriched records in input order
    pub items: Vec<RequirementRecord>,
}

impl EnrichedBatch {
    /// Wrap finished records
    #[must_use]
    pub fn new(items: Vec<RequirementRecord>) -> Self {
        Self {
            total_items: items.len(),
            items,
        }
    }

    /// Check if the batch has no items
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl From<Vec<RequirementRecord>> for EnrichedBatch {
    fn from(items: Vec<RequirementRecord>) -> Self {
        Self::new(items)
    }
}

/// Destination of a finished batch
#[async_trait]
pub trait ResultSink: Send + Sync {
    /// Store or forward the batch
    async fn accept(&self, batch: &EnrichedBatch) -> Result<(), SinkError>;

    /// Short name for logs
    fn name(&self) -> &str {
        "sink"
    }
}
