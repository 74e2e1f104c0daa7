//! URS workbook reader
//!
//! Every sheet of the workbook is a chapter. The first row of a sheet is its
//! header. In each following row the first cell is the requirement number and
//! the second cell the requirement statement. Rows whose number is blank or
//! starts with a non-ASCII character (section titles such as "一、概述") are
//! skipped.

use crate::error::UrsError;
use calamine::{open_workbook_auto, Reader};
use rar_core::RequirementDescriptor;
use std::path::Path;
use tracing::{debug, info};

/// Read every requirement of a URS workbook (`.xlsx`, `.xlsm`, `.xls`, `.ods`)
///
/// # Errors
/// Missing file, unsupported extension or unreadable workbook.
pub fn read_urs_workbook(path: impl AsRef<Path>) -> Result<Vec<RequirementDescriptor>, UrsError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(UrsError::NotFound(path.to_path_buf()));
    }

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    if !matches!(ext.as_str(), "xlsx" | "xlsm" | "xls" | "ods") {
        return Err(UrsError::UnsupportedFormat(ext));
    }

    let mut workbook = open_workbook_auto(path).map_err(|e| UrsError::workbook(path, e))?;

    let mut descriptors = Vec::new();
    for sheet in workbook.sheet_names() {
        let range = workbook
            .worksheet_range(&sheet)
            .map_err(|e| UrsError::workbook(path, e))?;

        let rows = range
            .rows()
            .skip(1)
            .map(|row| row.iter().map(ToString::to_string).collect::<Vec<_>>());
        let before = descriptors.len();
        descriptors.extend(descriptors_from_rows(&sheet, rows));
        debug!(sheet = %sheet, requirements = descriptors.len() - before, "sheet read");
    }

    info!(path = %path.display(), requirements = descriptors.len(), "URS workbook read");
    Ok(descriptors)
}

/// Turn the data rows of one sheet into descriptors
pub fn descriptors_from_rows<I, R, S>(chapter: &str, rows: I) -> Vec<RequirementDescriptor>
where
    I: IntoIterator<Item = R>,
    R: AsRef<[S]>,
    S: AsRef<str>,
{
    rows.into_iter()
        .filter_map(|row| {
            let cells = row.as_ref();
            let id = cells.first().map(|c| c.as_ref().trim()).unwrap_or_default();
            if !is_requirement_number(id) {
                return None;
            }
            let description = cells.get(1).map(|c| c.as_ref().trim()).unwrap_or_default();
            Some(RequirementDescriptor::new(id, description, chapter))
        })
        .collect()
}

fn is_requirement_number(cell: &str) -> bool {
    cell.chars().next().is_some_and(|c| c.is_ascii())
}
