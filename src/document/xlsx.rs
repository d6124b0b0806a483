use crate::document::{Cell, FormatVerdict, Rowset};
use crate::error::PipelineError;
use calamine::{Data, DataType, Range, Reader, Xls, XlsError, Xlsx};
use chrono::{NaiveDateTime, Timelike};
use std::io::Cursor;

/// Archive member every xlsx workbook carries.
const WORKBOOK_PART: &str = "xl/workbook.xml";

/// Why the legacy reader gave up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LegacyReadError {
    /// The bytes are not a compound container holding a workbook stream.
    NotContainer(String),
    /// The workbook stream was found but its records could not be read.
    Unreadable(String),
}

/// Read the first worksheet of an xlsx workbook; its first row names the columns.
pub fn read_workbook(bytes: &[u8]) -> Result<Rowset, PipelineError> {
    if !is_workbook_archive(bytes)? {
        return Err(PipelineError::UnsupportedFormat {
            reason: format!("ZIP archive has no {WORKBOOK_PART}; it is not a spreadsheet"),
        });
    }

    let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(bytes)).map_err(|error| {
        PipelineError::Extraction {
            format: FormatVerdict::ModernZipSpreadsheet,
            reason: format!("failed to open workbook: {error}"),
        }
    })?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| PipelineError::Extraction {
            format: FormatVerdict::ModernZipSpreadsheet,
            reason: "workbook has no worksheets".to_owned(),
        })?
        .map_err(|error| PipelineError::Extraction {
            format: FormatVerdict::ModernZipSpreadsheet,
            reason: format!("failed to read first worksheet: {error}"),
        })?;

    Ok(range_to_rowset(&range))
}

/// Read the first worksheet of an xls (BIFF) workbook.
///
/// Failures of the compound container itself, including a container with no
/// workbook stream, are [`LegacyReadError::NotContainer`]. A workbook stream whose
/// records cannot be parsed is [`LegacyReadError::Unreadable`].
pub fn read_legacy(bytes: &[u8]) -> Result<Rowset, LegacyReadError> {
    let mut workbook: Xls<_> = Xls::new(Cursor::new(bytes)).map_err(|error| match error {
        XlsError::Io(_) | XlsError::Cfb(_) => LegacyReadError::NotContainer(error.to_string()),
        other => LegacyReadError::Unreadable(other.to_string()),
    })?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| LegacyReadError::Unreadable("workbook has no worksheets".to_owned()))?
        .map_err(|error| LegacyReadError::Unreadable(error.to_string()))?;

    Ok(range_to_rowset(&range))
}

/// True when the ZIP central directory lists the xlsx workbook part.
pub fn is_workbook_archive(bytes: &[u8]) -> Result<bool, PipelineError> {
    let archive = zip::ZipArchive::new(Cursor::new(bytes)).map_err(|error| {
        PipelineError::Extraction {
            format: FormatVerdict::ModernZipSpreadsheet,
            reason: format!("failed to open ZIP container: {error}"),
        }
    })?;
    let found = archive.file_names().any(|name| name == WORKBOOK_PART);
    Ok(found)
}

fn range_to_rowset(range: &Range<Data>) -> Rowset {
    let mut rows = range.rows();
    let Some(header_row) = rows.next() else {
        return Rowset::default();
    };

    let header = header_row
        .iter()
        .map(|value| data_to_cell(value).render())
        .collect();
    let body = rows
        .map(|row| row.iter().map(data_to_cell).collect())
        .collect();

    Rowset::from_extracted(header, body)
}

fn data_to_cell(value: &Data) -> Cell {
    match value {
        Data::Empty => Cell::Empty,
        Data::String(text) | Data::DateTimeIso(text) | Data::DurationIso(text) => {
            Cell::text(text.as_str())
        }
        Data::Float(number) => Cell::Number(*number),
        Data::Int(number) => Cell::Number(*number as f64),
        Data::Bool(flag) => Cell::Text(if *flag { "True" } else { "False" }.to_owned()),
        Data::DateTime(_) => match value.as_datetime() {
            Some(timestamp) => Cell::Text(render_timestamp(timestamp)),
            None => Cell::text(value.to_string()),
        },
        Data::Error(error) => Cell::Text(error.to_string()),
    }
}

fn render_timestamp(timestamp: NaiveDateTime) -> String {
    if timestamp.num_seconds_from_midnight() == 0 {
        timestamp.format("%Y-%m-%d").to_string()
    } else {
        timestamp.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}
