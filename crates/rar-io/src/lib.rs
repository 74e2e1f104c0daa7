//! RAR IO - input and output collaborators
//!
//! - URS workbook ingestion into requirement descriptors
//! - JSON, CSV and XLSX report sinks

#![warn(unreachable_pub)]

pub mod error;
pub mod sink;
pub mod urs;

pub use error::UrsError;
pub use sink::{CsvFileSink, JsonFileSink, MultiSink, XlsxFileSink, REPORT_HEADER};
pub use urs::{descriptors_from_rows, read_urs_workbook};
