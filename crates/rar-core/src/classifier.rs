//! Classifier abstraction
//!
//! The natural-language judgment capability is an external collaborator.
//! The pipeline only needs "stage + context text in, text out"; remote
//! APIs, local models and test doubles all plug in behind this trait.

use crate::error::ClassifierError;
use crate::stage::Stage;
use async_trait::async_trait;
use std::sync::Arc;

/// A single classification request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifyRequest {
    /// Stage asking; selects the instructions on the classifier side
    pub stage: Stage,
    /// Record being enriched
    pub record_id: String,
    /// Labelled context lines built from the record
    pub context: String,
}

impl ClassifyRequest {
    /// Create new request
    #[inline]
    #[must_use]
    pub fn new(stage: Stage, record_id: impl Into<String>, context: impl Into<String>) -> Self {
        Self {
            stage,
            record_id: record_id.into(),
            context: context.into(),
        }
    }
}

/// Maps a stage context to a categorical or narrative judgment
///
/// For rating stages the answer is expected to contain one dominant
/// 高/中/低 label; narrative answers are treated as opaque text.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Classify one request
    async fn classify(&self, request: &ClassifyRequest) -> Result<String, ClassifierError>;

    /// Short name for logs
    fn name(&self) -> &str {
        "classifier"
    }
}

#[async_trait]
impl<C: Classifier + ?Sized> Classifier for Arc<C> {
    async fn classify(&self, request: &ClassifyRequest) -> Result<String, ClassifierError> {
        (**self).classify(request).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn arc_forwards_to_inner_classifier() {
        let mut mock = MockClassifier::new();
        mock.expect_classify()
            .withf(|req| req.stage == Stage::Severity && req.record_id == "URS-001")
            .times(1)
            .returning(|_| Ok("中".to_string()));

        let shared: Arc<dyn Classifier> = Arc::new(mock);
        let request = ClassifyRequest::new(Stage::Severity, "URS-001", "潜在失效后果：导致停机");
        assert_eq!(Arc::clone(&shared).classify(&request).await.unwrap(), "中");
    }
}
