//! Record stage sequencer
//!
//! Drives one record through its eight stages in order:
//!
//! ```text
//! description ─► failure_event ─► potential_consequences ─► severity ─► probability
//!                                                                  │          │
//!                                                                  └► risk_level ◄┘
//!                 detectability ─► risk_priority ◄── risk_level
//!                                        │
//!                                        ▼
//!                              risk_control_measures
//! ```
//!
//! Classifier-backed stages hold one limiter permit for the duration of the
//! call only. Matrix stages hold none. The first failing stage aborts the
//! record; nothing is retried.

use crate::classifier::{Classifier, ClassifyRequest};
use crate::error::StageError;
use crate::label::normalize_label;
use crate::limiter::ConcurrencyLimiter;
use crate::matrix::RiskMatrix;
use crate::stage::Stage;
use crate::types::{Label, MatrixCell, Rating, RequirementRecord};
use std::sync::Arc;
use tracing::{debug, Instrument};

/// Runs the stage state machine for individual records
#[derive(Clone)]
pub struct RecordSequencer {
    classifier: Arc<dyn Classifier>,
    limiter: ConcurrencyLimiter,
}

impl std::fmt::Debug for RecordSequencer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordSequencer")
            .field("limiter", &self.limiter)
            .finish_non_exhaustive()
    }
}

impl RecordSequencer {
    /// Create new sequencer
    #[inline]
    #[must_use]
    pub fn new(classifier: Arc<dyn Classifier>, limiter: ConcurrencyLimiter) -> Self {
        Self {
            classifier,
            limiter,
        }
    }

    /// Limiter shared with other sequencers of the batch
    #[inline]
    #[must_use]
    pub fn limiter(&self) -> &ConcurrencyLimiter {
        &self.limiter
    }

    /// Run all eight stages on `record`
    ///
    /// # Errors
    /// The first `StageError`; later stages are not attempted.
    pub async fn run(&self, record: &mut RequirementRecord) -> Result<(), StageError> {
        let span = tracing::info_span!("record", id = %record.id);
        async {
            for stage in Stage::ALL {
                self.run_stage(stage, record).await?;
            }
            debug!("all stages complete");
            Ok::<(), StageError>(())
        }
        .instrument(span)
        .await
    }

    /// Run a single stage on `record`
    ///
    /// # Errors
    /// `StageError::MissingInput` if a declared input is not populated, or
    /// the classifier/normalization failure of the stage.
    pub async fn run_stage(
        &self,
        stage: Stage,
        record: &mut RequirementRecord,
    ) -> Result<(), StageError> {
        debug!(stage = %stage, ordinal = stage.ordinal(), "stage start");
        match stage {
            Stage::FailureEvent => self.failure_event(record).await,
            Stage::PotentialConsequences => self.potential_consequences(record).await,
            Stage::Severity => self.severity(record).await,
            Stage::Probability => self.probability(record).await,
            Stage::RiskLevel => {
                risk_level(record);
                Ok(())
            }
            Stage::Detectability => self.detectability(record).await,
            Stage::RiskPriority => {
                risk_priority(record);
                Ok(())
            }
            Stage::RiskControlMeasures => self.risk_control_measures(record).await,
        }
    }

    /// Stage 1: failure event from the requirement statement
    ///
    /// # Errors
    /// Classifier failure.
    pub async fn failure_event(&self, record: &mut RequirementRecord) -> Result<(), StageError> {
        let context = record.description.clone();
        let answer = self.consult(Stage::FailureEvent, &record.id, context).await?;
        record.failure_event = Some(answer);
        Ok(())
    }

    /// Stage 2: potential consequences of the failure event
    ///
    /// # Errors
    /// Missing failure event or classifier failure.
    pub async fn potential_consequences(
        &self,
        record: &mut RequirementRecord,
    ) -> Result<(), StageError> {
        let stage = Stage::PotentialConsequences;
        let context = context_lines(
            stage,
            record,
            &[
                ("需求", Some(record.description.as_str())),
                (Stage::FailureEvent.heading(), record.failure_event.as_deref()),
            ],
        )?;
        let answer = self.consult(stage, &record.id, context).await?;
        record.potential_consequences = Some(answer);
        Ok(())
    }

    /// Stage 3: severity of the consequences
    ///
    /// # Errors
    /// Missing consequences, classifier failure or no label in the answer.
    pub async fn severity(&self, record: &mut RequirementRecord) -> Result<(), StageError> {
        let stage = Stage::Severity;
        let context = context_lines(
            stage,
            record,
            &[(
                Stage::PotentialConsequences.heading(),
                record.potential_consequences.as_deref(),
            )],
        )?;
        record.severity = Some(self.consult_rating(stage, &record.id, context).await?);
        Ok(())
    }

    /// Stage 4: probability of the failure event
    ///
    /// # Errors
    /// Missing inputs, classifier failure or no label in the answer.
    pub async fn probability(&self, record: &mut RequirementRecord) -> Result<(), StageError> {
        let stage = Stage::Probability;
        let context = event_and_consequences(stage, record)?;
        record.probability = Some(self.consult_rating(stage, &record.id, context).await?);
        Ok(())
    }

    /// Stage 6: detectability of the failure event
    ///
    /// # Errors
    /// Missing inputs, classifier failure or no label in the answer.
    pub async fn detectability(&self, record: &mut RequirementRecord) -> Result<(), StageError> {
        let stage = Stage::Detectability;
        let context = event_and_consequences(stage, record)?;
        record.detectability = Some(self.consult_rating(stage, &record.id, context).await?);
        Ok(())
    }

    /// Stage 8: control measures from everything gathered so far
    ///
    /// # Errors
    /// Any of the seven earlier fields missing, or classifier failure.
    pub async fn risk_control_measures(
        &self,
        record: &mut RequirementRecord,
    ) -> Result<(), StageError> {
        let stage = Stage::RiskControlMeasures;
        let mut fields = vec![("需求", Some(record.description.as_str()))];
        fields.extend(
            stage
                .inputs()
                .iter()
                .map(|input| (input.heading(), record.output_text(*input))),
        );
        let context = context_lines(stage, record, &fields)?;
        let answer = self.consult(stage, &record.id, context).await?;
        record.risk_control_measures = Some(answer);
        Ok(())
    }

    /// One classifier call under a limiter permit
    async fn consult(
        &self,
        stage: Stage,
        record_id: &str,
        context: String,
    ) -> Result<String, StageError> {
        let request = ClassifyRequest::new(stage, record_id, context);

        let permit = self
            .limiter
            .acquire()
            .await
            .map_err(|source| StageError::Limiter { stage, source })?;
        let result = self.classifier.classify(&request).await;
        drop(permit);

        let answer = result.map_err(|source| StageError::ClassifierFailed { stage, source })?;
        Ok(answer.trim().to_string())
    }

    /// Classifier call whose answer is normalized to a rating
    async fn consult_rating(
        &self,
        stage: Stage,
        record_id: &str,
        context: String,
    ) -> Result<Rating, StageError> {
        let answer = self.consult(stage, record_id, context).await?;
        let rating = normalize_label(&answer)
            .map_err(|source| StageError::ContractViolation { stage, source })?;
        debug!(stage = %stage, rating = rating.label(), "rating normalized");
        Ok(rating)
    }
}

/// Stage 5: risk level from severity and probability
pub fn risk_level(record: &mut RequirementRecord) {
    let cell = RiskMatrix::risk_level(
        record.severity.map(Label::label),
        record.probability.map(Label::label),
    );
    if let MatrixCell::Invalid(sentinel) = cell {
        tracing::warn!(id = %record.id, %sentinel, "risk level lookup rejected its inputs");
    }
    record.risk_level = Some(cell);
}

/// Stage 7: risk priority from risk level and detectability
pub fn risk_priority(record: &mut RequirementRecord) {
    let cell = RiskMatrix::risk_priority(
        record.risk_level.as_ref().map(MatrixCell::label),
        record.detectability.map(Label::label),
    );
    if let MatrixCell::Invalid(sentinel) = cell {
        tracing::warn!(id = %record.id, %sentinel, "risk priority lookup rejected its inputs");
    }
    record.risk_priority = Some(cell);
}

/// Context shared by probability and detectability
fn event_and_consequences(stage: Stage, record: &RequirementRecord) -> Result<String, StageError> {
    context_lines(
        stage,
        record,
        &[
            (Stage::FailureEvent.heading(), record.failure_event.as_deref()),
            (
                Stage::PotentialConsequences.heading(),
                record.potential_consequences.as_deref(),
            ),
        ],
    )
}

/// Build `heading：value` lines, checking the stage's declared inputs first
fn context_lines(
    stage: Stage,
    record: &RequirementRecord,
    fields: &[(&str, Option<&str>)],
) -> Result<String, StageError> {
    if let Some(missing) = stage.inputs().iter().find(|i| !record.has_output(**i)) {
        return Err(StageError::MissingInput {
            stage,
            missing: *missing,
        });
    }

    let lines: Vec<String> = fields
        .iter()
        .map(|(heading, value)| format!("{heading}：{}", value.unwrap_or_default()))
        .collect();
    Ok(lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::MockClassifier;
    use crate::error::ClassifierError;
    use crate::types::RiskLevel;
    use mockall::predicate::function;

    fn record() -> RequirementRecord {
        RequirementRecord::new("URS-001", "系统应在5秒内生成审计报告", "审计追踪")
    }

    fn answers(stage: Stage) -> &'static str {
        match stage {
            Stage::FailureEvent => "  当报表引擎计算超时时，系统未能生成审计报告 \n",
            Stage::PotentialConsequences => "导致审计记录缺失，违反法规要求",
            Stage::Severity => "高",
            Stage::Probability => "中",
            Stage::Detectability => "可检测性：中",
            Stage::RiskControlMeasures => "在DQ进行设计确认,在OQ对功能的报表生成进行确认",
            Stage::RiskLevel | Stage::RiskPriority => unreachable!("matrix stages"),
        }
    }

    fn sequencer(mock: MockClassifier, permits: usize) -> RecordSequencer {
        RecordSequencer::new(Arc::new(mock), ConcurrencyLimiter::new(permits))
    }

    #[tokio::test]
    async fn full_run_populates_every_field() {
        let mut mock = MockClassifier::new();
        mock.expect_classify()
            .times(6)
            .returning(|req| Ok(answers(req.stage).to_string()));

        let seq = sequencer(mock, 1);
        let mut rec = record();
        seq.run(&mut rec).await.unwrap();

        assert!(rec.is_complete());
        assert_eq!(
            rec.failure_event.as_deref(),
            Some("当报表引擎计算超时时，系统未能生成审计报告")
        );
        assert_eq!(rec.severity, Some(Rating::High));
        assert_eq!(rec.probability, Some(Rating::Medium));
        assert_eq!(rec.risk_level, Some(MatrixCell::Value(RiskLevel::One)));
        assert_eq!(rec.detectability, Some(Rating::Medium));
        assert_eq!(rec.risk_priority, Some(MatrixCell::Value(Rating::High)));
        assert_eq!(seq.limiter().available(), 1);
    }

    #[tokio::test]
    async fn stages_reach_classifier_in_order() {
        let mut mock = MockClassifier::new();
        let mut seq_order = mockall::Sequence::new();
        for stage in Stage::ALL.into_iter().filter(|s| s.uses_classifier()) {
            mock.expect_classify()
                .with(function(move |req: &ClassifyRequest| req.stage == stage))
                .times(1)
                .in_sequence(&mut seq_order)
                .returning(|req| Ok(answers(req.stage).to_string()));
        }

        let seq = sequencer(mock, 2);
        let mut rec = record();
        seq.run(&mut rec).await.unwrap();
    }

    #[tokio::test]
    async fn severity_context_is_consequences_only() {
        let mut mock = MockClassifier::new();
        mock.expect_classify()
            .withf(|req| req.stage == Stage::Severity && req.context == "潜在失效后果：导致数据丢失")
            .times(1)
            .returning(|_| Ok("高".to_string()));

        let seq = sequencer(mock, 1);
        let mut rec = record();
        rec.failure_event = Some("fe".to_string());
        rec.potential_consequences = Some("导致数据丢失".to_string());
        seq.severity(&mut rec).await.unwrap();
        assert_eq!(rec.severity, Some(Rating::High));
    }

    #[tokio::test]
    async fn control_measures_context_lists_all_fields() {
        let mut mock = MockClassifier::new();
        mock.expect_classify()
            .withf(|req| {
                req.context
                    == "需求：d\n失效事件：fe\n潜在失效后果：pc\n严重性：高\n可能性：低\n风险等级：2\n可检测性：中\n风险优先级：中"
            })
            .times(1)
            .returning(|_| Ok("在DQ进行设计确认".to_string()));

        let seq = sequencer(mock, 1);
        let mut rec = RequirementRecord::new("1", "d", "c");
        rec.failure_event = Some("fe".to_string());
        rec.potential_consequences = Some("pc".to_string());
        rec.severity = Some(Rating::High);
        rec.probability = Some(Rating::Low);
        risk_level(&mut rec);
        rec.detectability = Some(Rating::Medium);
        risk_priority(&mut rec);

        seq.risk_control_measures(&mut rec).await.unwrap();
        assert!(rec.is_complete());
    }

    #[tokio::test]
    async fn failure_at_severity_stops_the_record() {
        let mut mock = MockClassifier::new();
        mock.expect_classify()
            .times(3)
            .returning(|req| match req.stage {
                Stage::Severity => Err(ClassifierError::Transport("reset".to_string())),
                other => Ok(answers(other).to_string()),
            });

        let seq = sequencer(mock, 1);
        let mut rec = record();
        let err = seq.run(&mut rec).await.unwrap_err();

        assert_eq!(err.stage(), Stage::Severity);
        assert!(rec.severity.is_none());
        assert!(rec.probability.is_none());
        assert!(rec.risk_level.is_none());
        assert!(rec.risk_control_measures.is_none());
        assert_eq!(seq.limiter().available(), 1);
    }

    #[tokio::test]
    async fn unlabelled_rating_answer_is_contract_violation() {
        let mut mock = MockClassifier::new();
        mock.expect_classify()
            .returning(|req| match req.stage {
                Stage::Probability => Ok("unsure".to_string()),
                other => Ok(answers(other).to_string()),
            });

        let seq = sequencer(mock, 1);
        let mut rec = record();
        let err = seq.run(&mut rec).await.unwrap_err();

        assert!(err.is_contract_violation());
        assert_eq!(err.stage(), Stage::Probability);
        assert!(rec.risk_level.is_none());
    }

    #[tokio::test]
    async fn stage_refuses_to_run_before_its_inputs() {
        let mut mock = MockClassifier::new();
        mock.expect_classify().never();

        let seq = sequencer(mock, 1);
        let mut rec = record();
        let err = seq.probability(&mut rec).await.unwrap_err();

        match err {
            StageError::MissingInput { stage, missing } => {
                assert_eq!(stage, Stage::Probability);
                assert_eq!(missing, Stage::FailureEvent);
            }
            other => panic!("expected MissingInput, got {other:?}"),
        }
    }

    #[test]
    fn matrix_stages_write_sentinels_for_missing_inputs() {
        let mut rec = record();
        risk_level(&mut rec);
        risk_priority(&mut rec);

        assert!(rec.risk_level.unwrap().is_invalid());
        assert!(rec.risk_priority.unwrap().is_invalid());
    }
}
