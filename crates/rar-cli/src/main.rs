//! `rar` - risk assessment report command line
//!
//! ```text
//! rar analyze --urs URS.xlsx [--config rar_config.json] [--limit N]
//!             [--concurrency N] [--timeout-secs N] [--output-dir DIR]
//! rar matrix
//! ```

mod cli;

use anyhow::{Context, Result};
use cli::{build_cli, AnalyzeArgs};
use rar_core::{BatchOrchestrator, RiskMatrix};
use rar_io::{read_urs_workbook, CsvFileSink, JsonFileSink, MultiSink, XlsxFileSink};
use rar_llm::OpenAiClassifier;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Report file stem; a timestamp and extension are appended
const REPORT_STEM: &str = "RAR分析结果";

#[tokio::main]
async fn main() -> Result<()> {
    let matches = build_cli().get_matches();
    init_tracing(matches.get_flag("json-logs"));

    match matches.subcommand() {
        Some(("analyze", args)) => analyze(AnalyzeArgs::from_matches(args)?).await,
        Some(("matrix", _)) => {
            println!("{}", RiskMatrix::render());
            Ok(())
        }
        _ => anyhow::bail!("unknown subcommand; see `rar --help`"),
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

async fn analyze(args: AnalyzeArgs) -> Result<()> {
    let config = args.resolve_config()?;

    let urs = args.urs.clone();
    let descriptors = tokio::task::spawn_blocking(move || read_urs_workbook(&urs))
        .await
        .context("URS reader task panicked")?
        .with_context(|| format!("reading URS workbook {}", args.urs.display()))?;
    info!(requirements = descriptors.len(), "requirements loaded");

    let classifier = OpenAiClassifier::new(&config.api).context("building classifier client")?;
    info!(model = classifier.model(), endpoint = classifier.endpoint(), "classifier ready");

    let orchestrator = BatchOrchestrator::new(Arc::new(classifier), config.pipeline_config())?;

    let paths = ReportPaths::new(&config.output.path, &chrono::Local::now());
    let sink = MultiSink::new()
        .with(JsonFileSink::new(&paths.json))
        .with(CsvFileSink::new(&paths.csv))
        .with(XlsxFileSink::new(&paths.xlsx));

    let batch = orchestrator
        .run_into_sink(descriptors, &sink)
        .await
        .context("risk analysis failed")?;

    println!("分析完成，共 {} 条", batch.total_items);
    println!("  JSON: {}", paths.json.display());
    println!("  CSV:  {}", paths.csv.display());
    println!("  XLSX: {}", paths.xlsx.display());
    Ok(())
}

/// `<dir>/RAR分析结果_<YYYYmmdd_HHMMSS>.{json,csv,xlsx}`
#[derive(Debug, PartialEq, Eq)]
struct ReportPaths {
    json: PathBuf,
    csv: PathBuf,
    xlsx: PathBuf,
}

impl ReportPaths {
    fn new<Tz: chrono::TimeZone>(dir: &Path, now: &chrono::DateTime<Tz>) -> Self
    where
        Tz::Offset: std::fmt::Display,
    {
        let stem = format!("{REPORT_STEM}_{}", now.format("%Y%m%d_%H%M%S"));
        Self {
            json: dir.join(format!("{stem}.json")),
            csv: dir.join(format!("{stem}.csv")),
            xlsx: dir.join(format!("{stem}.xlsx")),
        }
    }
}
