//! Batch Orchestrator
//!
//! Runs a batch of records through the stage sequencer:
//! - validates ids (non-empty, unique) and applies the record limit
//! - one future per record, joined on the caller's task
//! - every classifier call across the batch goes through one limiter
//! - the whole batch runs under a single deadline
//!
//! `run` is all-or-nothing: the first failing record fails the batch and
//! the remaining in-flight records are dropped. `run_settled` lets every
//! record finish and reports per-record outcomes. In both modes a timeout
//! returns no partial results.

use crate::classifier::Classifier;
use crate::config::PipelineConfig;
use crate::error::{InputError, PipelineError, StageError};
use crate::limiter::ConcurrencyLimiter;
use crate::sequencer::RecordSequencer;
use crate::sink::{EnrichedBatch, ResultSink};
use crate::types::RequirementRecord;
use futures::future::{join_all, try_join_all};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// Failure of one record in a settled run
#[derive(Debug)]
pub struct RecordFailure {
    /// Position in the submitted batch
    pub index: usize,
    /// The record as far as it got
    pub record: RequirementRecord,
    /// Stage failure that stopped it
    pub error: StageError,
}

/// Per-record result of `run_settled`
pub type RecordOutcome = Result<RequirementRecord, RecordFailure>;

/// Drives batches of records through the eight stages
#[derive(Debug, Clone)]
pub struct BatchOrchestrator {
    sequencer: RecordSequencer,
    config: PipelineConfig,
}

impl BatchOrchestrator {
    /// Create orchestrator with its own limiter sized from `config`
    ///
    /// # Errors
    /// `PipelineError::Config` if `config` does not validate.
    pub fn new(classifier: Arc<dyn Classifier>, config: PipelineConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        let limiter = ConcurrencyLimiter::new(config.concurrency);
        Ok(Self {
            sequencer: RecordSequencer::new(classifier, limiter),
            config,
        })
    }

    /// Run parameters
    #[inline]
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Limiter shared by every record of every batch run here
    #[inline]
    #[must_use]
    pub fn limiter(&self) -> &ConcurrencyLimiter {
        self.sequencer.limiter()
    }

    /// Enrich a batch, all-or-nothing
    ///
    /// Output order equals input order.
    ///
    /// # Errors
    /// - `PipelineError::InvalidInput` for empty or duplicate ids
    /// - `PipelineError::RecordFailed` for the first record that fails
    /// - `PipelineError::Timeout` if the batch misses its deadline
    pub async fn run<I>(&self, records: I) -> Result<Vec<RequirementRecord>, PipelineError>
    where
        I: IntoIterator,
        I::Item: Into<RequirementRecord>,
    {
        let records = self.prepare(records)?;
        let total = records.len();
        let started = self.log_start(total, "all-or-nothing");

        let sequencer = &self.sequencer;
        let work = try_join_all(records.into_iter().enumerate().map(|(index, mut record)| async move {
            match sequencer.run(&mut record).await {
                Ok(()) => Ok(record),
                Err(source) => Err(PipelineError::RecordFailed {
                    index,
                    record_id: record.id,
                    source,
                }),
            }
        }));

        match self.with_deadline(work).await {
            Ok(Ok(items)) => {
                info!(records = total, elapsed_ms = elapsed_ms(started), "batch complete");
                Ok(items)
            }
            Ok(Err(err)) => {
                error!(
                    record = err.record_id().unwrap_or_default(),
                    stage = ?err.failed_stage(),
                    error = %err,
                    elapsed_ms = elapsed_ms(started),
                    "batch failed"
                );
                Err(err)
            }
            Err(timeout) => Err(timeout),
        }
    }

    /// Enrich a batch, letting every record finish on its own
    ///
    /// # Errors
    /// `PipelineError::InvalidInput` or `PipelineError::Timeout`; record
    /// failures are reported inside the outcomes.
    pub async fn run_settled<I>(&self, records: I) -> Result<Vec<RecordOutcome>, PipelineError>
    where
        I: IntoIterator,
        I::Item: Into<RequirementRecord>,
    {
        let records = self.prepare(records)?;
        let total = records.len();
        let started = self.log_start(total, "settled");

        let sequencer = &self.sequencer;
        let work = join_all(records.into_iter().enumerate().map(|(index, mut record)| async move {
            match sequencer.run(&mut record).await {
                Ok(()) => Ok(record),
                Err(error) => {
                    warn!(index, record = %record.id, stage = %error.stage(), %error, "record failed");
                    Err(RecordFailure { index, record, error })
                }
            }
        }));

        let outcomes = self.with_deadline(work).await?;
        let failed = outcomes.iter().filter(|o| o.is_err()).count();
        info!(
            records = total,
            failed,
            elapsed_ms = elapsed_ms(started),
            "batch settled"
        );
        Ok(outcomes)
    }

    /// `run`, then hand the result to `sink`
    ///
    /// # Errors
    /// Everything `run` returns, plus `PipelineError::Sink`.
    pub async fn run_into_sink<I>(
        &self,
        records: I,
        sink: &dyn ResultSink,
    ) -> Result<EnrichedBatch, PipelineError>
    where
        I: IntoIterator,
        I::Item: Into<RequirementRecord>,
    {
        let batch = EnrichedBatch::new(self.run(records).await?);
        sink.accept(&batch).await?;
        info!(sink = sink.name(), items = batch.total_items, "batch delivered");
        Ok(batch)
    }

    /// Collect, truncate by limit, validate ids
    fn prepare<I>(&self, records: I) -> Result<Vec<RequirementRecord>, PipelineError>
    where
        I: IntoIterator,
        I::Item: Into<RequirementRecord>,
    {
        let mut records: Vec<RequirementRecord> = records.into_iter().map(Into::into).collect();
        if self.config.limit > 0 && records.len() > self.config.limit {
            info!(
                submitted = records.len(),
                limit = self.config.limit,
                "truncating batch"
            );
            records.truncate(self.config.limit);
        }
        validate_ids(&records)?;
        Ok(records)
    }

    fn log_start(&self, total: usize, mode: &str) -> Instant {
        info!(
            records = total,
            concurrency = self.config.concurrency,
            timeout_ms = self.timeout_ms(),
            mode,
            "batch start"
        );
        Instant::now()
    }

    /// Await `work` under the batch deadline
    async fn with_deadline<F: Future>(&self, work: F) -> Result<F::Output, PipelineError> {
        tokio::time::timeout(self.config.timeout, work)
            .await
            .map_err(|_| {
                let timeout_ms = self.timeout_ms();
                let stats = self.limiter().stats();
                error!(
                    timeout_ms,
                    peak_in_flight = stats.peak_in_flight,
                    total_acquired = stats.total_acquired,
                    "batch timed out"
                );
                PipelineError::Timeout { timeout_ms }
            })
    }

    fn timeout_ms(&self) -> u64 {
        u64::try_from(self.config.timeout.as_millis()).unwrap_or(u64::MAX)
    }
}

/// Reject empty and duplicate ids
fn validate_ids(records: &[RequirementRecord]) -> Result<(), InputError> {
    let mut seen: HashMap<&str, usize> = HashMap::with_capacity(records.len());
    for (index, record) in records.iter().enumerate() {
        if record.id.trim().is_empty() {
            return Err(InputError::EmptyId { index });
        }
        if let Some(first) = seen.insert(record.id.as_str(), index) {
            return Err(InputError::DuplicateId {
                id: record.id.clone(),
                first,
                second: index,
            });
        }
    }
    Ok(())
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
