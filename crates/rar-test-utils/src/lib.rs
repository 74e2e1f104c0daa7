//! Testing utilities for RAR workspace
//!
//! Shared test doubles and fixtures:
//! - `ScriptedClassifier`: deterministic answers, delays, hangs and failures,
//!   with a call log and a concurrency high-water mark
//! - `MemorySink`: keeps every batch it receives
//! - descriptor fixtures

#![allow(missing_docs)]

use async_trait::async_trait;
use rar_core::{
    ClassifierError, ClassifyRequest, Classifier, EnrichedBatch, RequirementDescriptor,
    ResultSink, SinkError, Stage,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Default answer of a well-behaved classifier for `stage`
#[must_use]
pub fn default_answer(stage: Stage, record_id: &str) -> String {
    match stage {
        Stage::FailureEvent => format!("{record_id}：当输入数据异常时，系统未能完成该功能"),
        Stage::PotentialConsequences => "导致数据记录不完整，影响产品质量追溯".to_string(),
        Stage::Severity => "高".to_string(),
        Stage::Probability => "中".to_string(),
        Stage::Detectability => "低".to_string(),
        Stage::RiskControlMeasures => "在DQ进行设计确认,在OQ对功能进行确认".to_string(),
        Stage::RiskLevel | Stage::RiskPriority => String::new(),
    }
}

#[derive(Debug, Clone)]
enum Behavior {
    Answer(String),
    Fail(ClassifierError),
    Hang,
}

/// Classifier double driven by a script
///
/// Lookups go record+stage first, then stage, then `default_answer`.
#[derive(Debug, Default)]
pub struct ScriptedClassifier {
    by_stage: HashMap<Stage, Behavior>,
    by_record: HashMap<(String, Stage), Behavior>,
    delays: HashMap<String, Duration>,
    default_delay: Duration,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    calls: Mutex<Vec<ClassifyRequest>>,
}

impl ScriptedClassifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `text` for `stage` on every record
    #[must_use]
    pub fn with_answer(mut self, stage: Stage, text: impl Into<String>) -> Self {
        self.by_stage.insert(stage, Behavior::Answer(text.into()));
        self
    }

    /// Answer `text` for `stage` on one record
    #[must_use]
    pub fn with_record_answer(
        mut self,
        record_id: impl Into<String>,
        stage: Stage,
        text: impl Into<String>,
    ) -> Self {
        self.by_record
            .insert((record_id.into(), stage), Behavior::Answer(text.into()));
        self
    }

    /// Fail `stage` on one record
    #[must_use]
    pub fn failing_at(
        mut self,
        record_id: impl Into<String>,
        stage: Stage,
        error: ClassifierError,
    ) -> Self {
        self.by_record
            .insert((record_id.into(), stage), Behavior::Fail(error));
        self
    }

    /// Never answer, for any record
    #[must_use]
    pub fn hanging(mut self) -> Self {
        for stage in Stage::ALL {
            self.by_stage.insert(stage, Behavior::Hang);
        }
        self
    }

    /// Sleep before every answer
    #[must_use]
    pub fn with_default_delay(mut self, delay: Duration) -> Self {
        self.default_delay = delay;
        self
    }

    /// Sleep before every answer for one record
    #[must_use]
    pub fn with_delay(mut self, record_id: impl Into<String>, delay: Duration) -> Self {
        self.delays.insert(record_id.into(), delay);
        self
    }

    /// Highest number of simultaneous `classify` calls seen
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// `classify` calls currently running
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Every request received, in arrival order
    pub fn calls(&self) -> Vec<ClassifyRequest> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Stages called for one record, in order
    pub fn stages_for(&self, record_id: &str) -> Vec<Stage> {
        self.calls()
            .into_iter()
            .filter(|c| c.record_id == record_id)
            .map(|c| c.stage)
            .collect()
    }

    /// Order in which records received their first call of `stage`
    pub fn record_order(&self, stage: Stage) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.stage == stage)
            .map(|c| c.record_id)
            .collect()
    }

    fn behavior(&self, request: &ClassifyRequest) -> Behavior {
        self.by_record
            .get(&(request.record_id.clone(), request.stage))
            .or_else(|| self.by_stage.get(&request.stage))
            .cloned()
            .unwrap_or_else(|| Behavior::Answer(default_answer(request.stage, &request.record_id)))
    }
}

/// Decrements the in-flight counter even when the call is cancelled
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize, peak: &AtomicUsize) -> Self {
        let now = counter.fetch_add(1, Ordering::SeqCst) + 1;
        peak.fetch_max(now, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Classifier for ScriptedClassifier {
    async fn classify(&self, request: &ClassifyRequest) -> Result<String, ClassifierError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(request.clone());
        }
        let _guard = InFlight::enter(&self.in_flight, &self.peak);

        let delay = self
            .delays
            .get(&request.record_id)
            .copied()
            .unwrap_or(self.default_delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        } else {
            tokio::task::yield_now().await;
        }

        match self.behavior(request) {
            Behavior::Answer(text) => Ok(text),
            Behavior::Fail(err) => Err(err),
            Behavior::Hang => std::future::pending().await,
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Sink that keeps what it receives
#[derive(Debug, Default)]
pub struct MemorySink {
    batches: Mutex<Vec<EnrichedBatch>>,
    reject: bool,
}

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink that refuses every batch
    #[must_use]
    pub fn rejecting() -> Self {
        Self {
            batches: Mutex::default(),
            reject: true,
        }
    }

    pub fn batches(&self) -> Vec<EnrichedBatch> {
        self.batches.lock().map(|b| b.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ResultSink for MemorySink {
    async fn accept(&self, batch: &EnrichedBatch) -> Result<(), SinkError> {
        if self.reject {
            return Err(SinkError::Rejected("memory sink is read-only".to_string()));
        }
        self.batches
            .lock()
            .map_err(|_| SinkError::Rejected("memory sink poisoned".to_string()))?
            .push(batch.clone());
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

/// `n` descriptors with ids `URS-001`..
pub fn descriptors(n: usize) -> Vec<RequirementDescriptor> {
    (1..=n)
        .map(|i| {
            RequirementDescriptor::new(
                format!("URS-{i:03}"),
                format!("系统应支持第{i}项功能"),
                "功能需求",
            )
        })
        .collect()
}

/// Id used by `descriptors` for position `index` (0-based)
pub fn id_at(index: usize) -> String {
    format!("URS-{:03}", index + 1)
}
