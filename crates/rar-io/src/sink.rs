//! File sinks for enriched batches
//!
//! - `JsonFileSink`: `{ "totalItems": n, "items": [...] }`, pretty-printed
//! - `CsvFileSink`: one row per record in report column order
//! - `XlsxFileSink`: the same table as a workbook, control measures wrapped
//! - `MultiSink`: forwards a batch to several sinks in order
//!
//! Parent directories are created on demand.

use async_trait::async_trait;
use rar_core::{EnrichedBatch, RequirementRecord, ResultSink, SinkError, Stage};
use rust_xlsxwriter::{Format, Workbook, XlsxError};
use std::path::{Path, PathBuf};
use tracing::info;

/// Header of the report table
pub const REPORT_HEADER: [&str; 10] = [
    "编号",
    "需求描述",
    "失效事件",
    "潜在失效后果",
    "严重性",
    "可能性",
    "风险等级",
    "可检测性",
    "风险优先级",
    "风险控制措施",
];

const UTF8_BOM: &str = "\u{feff}";

/// Worksheet name of the XLSX report
pub const XLSX_SHEET: &str = "RAR";

/// Column widths of the XLSX report, in characters
const XLSX_WIDTHS: [f64; 10] = [10.0, 40.0, 40.0, 40.0, 8.0, 8.0, 10.0, 10.0, 10.0, 50.0];

async fn write_file(path: &Path, bytes: Vec<u8>) -> Result<(), SinkError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| SinkError::io_error(parent, e))?;
    }
    tokio::fs::write(path, bytes)
        .await
        .map_err(|e| SinkError::io_error(path, e))
}

/// Writes the batch as a JSON document
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    path: PathBuf,
}

impl JsonFileSink {
    /// Create sink writing to `path`
    #[inline]
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Target file
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ResultSink for JsonFileSink {
    async fn accept(&self, batch: &EnrichedBatch) -> Result<(), SinkError> {
        let bytes =
            serde_json::to_vec_pretty(batch).map_err(|e| SinkError::Serialize(e.to_string()))?;
        write_file(&self.path, bytes).await?;
        info!(path = %self.path.display(), items = batch.total_items, "JSON report written");
        Ok(())
    }

    fn name(&self) -> &str {
        "json"
    }
}

/// Writes the batch as a CSV table (UTF-8 with BOM, opens cleanly in Excel)
#[derive(Debug, Clone)]
pub struct CsvFileSink {
    path: PathBuf,
}

impl CsvFileSink {
    /// Create sink writing to `path`
    #[inline]
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Target file
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Encode the batch without touching the filesystem
    ///
    /// # Errors
    /// `SinkError::Serialize` if the CSV writer fails.
    pub fn encode(batch: &EnrichedBatch) -> Result<Vec<u8>, SinkError> {
        let mut writer = csv::Writer::from_writer(UTF8_BOM.as_bytes().to_vec());
        writer
            .write_record(REPORT_HEADER)
            .map_err(|e| SinkError::Serialize(e.to_string()))?;
        for record in &batch.items {
            writer
                .write_record(report_row(record))
                .map_err(|e| SinkError::Serialize(e.to_string()))?;
        }
        writer
            .into_inner()
            .map_err(|e| SinkError::Serialize(e.to_string()))
    }
}

/// Cells of one report row
fn report_row(record: &RequirementRecord) -> Vec<String> {
    let mut row = Vec::with_capacity(REPORT_HEADER.len());
    row.push(record.id.clone());
    row.push(record.description.clone());
    for stage in Stage::ALL {
        let text = record.output_text(stage).unwrap_or_default();
        if stage == Stage::RiskControlMeasures {
            row.push(text.replace(',', ",\n"));
        } else {
            row.push(text.to_string());
        }
    }
    row
}

#[async_trait]
impl ResultSink for CsvFileSink {
    async fn accept(&self, batch: &EnrichedBatch) -> Result<(), SinkError> {
        let bytes = Self::encode(batch)?;
        write_file(&self.path, bytes).await?;
        info!(path = %self.path.display(), items = batch.total_items, "CSV report written");
        Ok(())
    }

    fn name(&self) -> &str {
        "csv"
    }
}

/// Writes the batch as a single-sheet XLSX report
#[derive(Debug, Clone)]
pub struct XlsxFileSink {
    path: PathBuf,
}

impl XlsxFileSink {
    /// Create sink writing to `path`
    #[inline]
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Target file
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Encode the batch as workbook bytes
    ///
    /// # Errors
    /// `SinkError::Serialize` if the workbook cannot be built.
    pub fn encode(batch: &EnrichedBatch) -> Result<Vec<u8>, SinkError> {
        build_workbook(batch).map_err(|e| SinkError::Serialize(e.to_string()))
    }
}

fn build_workbook(batch: &EnrichedBatch) -> Result<Vec<u8>, XlsxError> {
    let header = Format::new().set_bold().set_text_wrap();
    let cell = Format::new().set_text_wrap();
    let measures_col = REPORT_HEADER.len() - 1;

    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name(XLSX_SHEET)?;

    for (col, (title, width)) in (0u16..).zip(REPORT_HEADER.iter().zip(XLSX_WIDTHS)) {
        sheet.set_column_width(col, width)?;
        sheet.write_string_with_format(0, col, *title, &header)?;
    }
    sheet.set_freeze_panes(1, 0)?;

    for (row, record) in (1u32..).zip(&batch.items) {
        for (col, text) in (0u16..).zip(report_row(record)) {
            if usize::from(col) == measures_col {
                sheet.write_string_with_format(row, col, text, &cell)?;
            } else {
                sheet.write_string(row, col, text)?;
            }
        }
    }

    workbook.save_to_buffer()
}

#[async_trait]
impl ResultSink for XlsxFileSink {
    async fn accept(&self, batch: &EnrichedBatch) -> Result<(), SinkError> {
        let bytes = Self::encode(batch)?;
        write_file(&self.path, bytes).await?;
        info!(path = %self.path.display(), items = batch.total_items, "XLSX report written");
        Ok(())
    }

    fn name(&self) -> &str {
        "xlsx"
    }
}

/// Forwards a batch to every inner sink, stopping at the first failure
#[derive(Default)]
pub struct MultiSink {
    sinks: Vec<Box<dyn ResultSink>>,
}

impl MultiSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sink
    #[must_use]
    pub fn with(mut self, sink: impl ResultSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    /// Number of inner sinks
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

#[async_trait]
impl ResultSink for MultiSink {
    async fn accept(&self, batch: &EnrichedBatch) -> Result<(), SinkError> {
        for sink in &self.sinks {
            sink.accept(batch).await?;
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "multi"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rar_core::{InvalidMatrixInput, MatrixCell, Rating, RiskLevel};
    use rar_test_utils::MemorySink;

    fn enriched() -> RequirementRecord {
        let mut record = RequirementRecord::new("1.1", "系统应支持导出报表", "功能需求");
        record.failure_event = Some("当导出任务超时时，系统未能生成报表".to_string());
        record.potential_consequences = Some("导致报表缺失，影响审计".to_string());
        record.severity = Some(Rating::High);
        record.probability = Some(Rating::Low);
        record.risk_level = Some(MatrixCell::Value(RiskLevel::Two));
        record.detectability = Some(Rating::Medium);
        record.risk_priority = Some(MatrixCell::Value(Rating::Medium));
        record.risk_control_measures = Some("在DQ进行设计确认,在OQ对功能的导出进行确认".to_string());
        record
    }

    fn read_csv(bytes: &[u8]) -> Vec<Vec<String>> {
        let text = std::str::from_utf8(bytes).unwrap();
        let text = text.strip_prefix(UTF8_BOM).unwrap();
        csv::Reader::from_reader(text.as_bytes())
            .records()
            .map(|r| r.unwrap().iter().map(str::to_string).collect())
            .collect()
    }

    #[tokio::test]
    async fn json_sink_writes_total_and_items() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("report.json");
        let sink = JsonFileSink::new(&path);

        sink.accept(&EnrichedBatch::new(vec![enriched()])).await.unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("系统应支持导出报表"), "CJK must not be escaped");
        let json: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(json["totalItems"], 1);
        assert_eq!(json["items"][0]["riskLevel"], "2");
        assert_eq!(json["items"][0]["potentialConsequences"], "导致报表缺失，影响审计");
    }

    #[test]
    fn csv_rows_follow_report_columns() {
        let bytes = CsvFileSink::encode(&EnrichedBatch::new(vec![enriched()])).unwrap();
        let rows = read_csv(&bytes);

        assert_eq!(rows.len(), 1);
        assert_eq!(
            rows[0],
            vec![
                "1.1",
                "系统应支持导出报表",
                "当导出任务超时时，系统未能生成报表",
                "导致报表缺失，影响审计",
                "高",
                "低",
                "2",
                "中",
                "中",
                "在DQ进行设计确认,\n在OQ对功能的导出进行确认",
            ]
        );
    }

    #[test]
    fn csv_shows_sentinels_and_blanks() {
        let mut record = RequirementRecord::new("2", "d", "c");
        record.risk_level = Some(MatrixCell::Invalid(InvalidMatrixInput::SeverityProbability));

        let bytes = CsvFileSink::encode(&EnrichedBatch::new(vec![record])).unwrap();
        let rows = read_csv(&bytes);

        assert_eq!(rows[0][6], InvalidMatrixInput::SeverityProbability.sentinel());
        assert_eq!(rows[0][2], "");
        assert_eq!(rows[0][9], "");
    }

    #[tokio::test]
    async fn csv_sink_writes_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.csv");

        CsvFileSink::new(&path)
            .accept(&EnrichedBatch::new(Vec::new()))
            .await
            .unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with(UTF8_BOM));
        assert_eq!(text.trim_start_matches(UTF8_BOM).trim_end(), REPORT_HEADER.join(","));
    }

    #[tokio::test]
    async fn xlsx_sink_writes_report_sheet() {
        use calamine::{open_workbook_auto, Reader};

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("report.xlsx");
        let mut partial = RequirementRecord::new("1.2", "系统应记录审计追踪", "功能需求");
        partial.failure_event = Some("审计记录丢失".to_string());

        XlsxFileSink::new(&path)
            .accept(&EnrichedBatch::new(vec![enriched(), partial]))
            .await
            .unwrap();

        let mut workbook = open_workbook_auto(&path).unwrap();
        assert_eq!(workbook.sheet_names(), vec![XLSX_SHEET.to_string()]);
        let range = workbook.worksheet_range(XLSX_SHEET).unwrap();
        let rows: Vec<Vec<String>> = range
            .rows()
            .map(|r| r.iter().map(ToString::to_string).collect())
            .collect();

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0], REPORT_HEADER.map(str::to_string).to_vec());
        assert_eq!(rows[1][0], "1.1");
        assert_eq!(rows[1][6], "2");
        assert_eq!(rows[1][9], "在DQ进行设计确认,\n在OQ对功能的导出进行确认");
        assert_eq!(rows[2][2], "审计记录丢失");
        assert_eq!(rows[2][4], "");
    }

    #[tokio::test]
    async fn multi_sink_forwards_in_order_and_stops_on_failure() {
        let dir = tempfile::tempdir().unwrap();
        let json_path = dir.path().join("a.json");
        let batch = EnrichedBatch::new(vec![enriched()]);

        let sink = MultiSink::new().with(JsonFileSink::new(&json_path)).with(MemorySink::new());
        assert_eq!(sink.len(), 2);
        sink.accept(&batch).await.unwrap();
        assert!(json_path.exists());

        let failing = MultiSink::new()
            .with(MemorySink::rejecting())
            .with(JsonFileSink::new(dir.path().join("b.json")));
        let err = failing.accept(&batch).await.unwrap_err();
        assert!(matches!(err, SinkError::Rejected(_)));
        assert!(!dir.path().join("b.json").exists());
    }
}
