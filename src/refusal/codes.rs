use crate::error::PipelineError;
use serde::Serialize;
use serde_json::Value;

/// Envelope version written on every refusal line.
pub const ENVELOPE_VERSION: &str = "tabnorm.v0";

/// Stable error kinds surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RefusalCode {
    /// No candidate encoding decoded the buffer.
    #[serde(rename = "E_UNREADABLE_TEXT")]
    UnreadableText,
    /// Sniffed format has no extractor, or the container is not a workbook.
    #[serde(rename = "E_UNSUPPORTED_FORMAT")]
    UnsupportedFormat,
    /// HTML payload contained zero tables.
    #[serde(rename = "E_NO_TABLE_FOUND")]
    NoTableFound,
    /// Document type demands columns the input does not have.
    #[serde(rename = "E_MISSING_COLUMNS")]
    MissingColumns,
    /// Merge input lacks the period column.
    #[serde(rename = "E_MISSING_PERIOD_COLUMN")]
    MissingPeriodColumn,
    /// Nothing left after cleanup and filtering.
    #[serde(rename = "E_EMPTY_RESULT")]
    EmptyResult,
    /// Container matched the sniffed format but its content could not be read.
    #[serde(rename = "E_EXTRACTION")]
    Extraction,
    /// Result cache could not be written or read back.
    #[serde(rename = "E_CACHE")]
    Cache,
    /// Configuration file or environment is invalid.
    #[serde(rename = "E_BAD_CONFIG")]
    BadConfig,
    /// Input file or batch manifest could not be read.
    #[serde(rename = "E_BAD_INPUT")]
    BadInput,
}

/// Refusal envelope emitted on stdout when an operation aborts.
#[derive(Debug, Clone, Serialize)]
pub struct RefusalEnvelope {
    pub version: String,
    pub outcome: String,
    pub refusal: RefusalBody,
}

#[derive(Debug, Clone, Serialize)]
pub struct RefusalBody {
    pub code: RefusalCode,
    pub message: String,
    pub detail: Value,
    pub next_command: Option<String>,
}

pub fn build_envelope(
    code: RefusalCode,
    message: impl Into<String>,
    detail: Value,
    next_command: Option<String>,
) -> RefusalEnvelope {
    RefusalEnvelope {
        version: ENVELOPE_VERSION.to_owned(),
        outcome: "REFUSAL".to_owned(),
        refusal: RefusalBody {
            code,
            message: message.into(),
            detail,
            next_command,
        },
    }
}

/// Translate a pipeline failure into its user-visible envelope.
pub fn envelope_for_error(error: &PipelineError) -> RefusalEnvelope {
    let code = error.code();
    build_envelope(code, error.to_string(), error.detail(), next_command_for(code))
}

fn next_command_for(code: RefusalCode) -> Option<String> {
    match code {
        RefusalCode::UnsupportedFormat => {
            Some("Export the sheet as .xlsx or .csv and upload it again".to_owned())
        }
        RefusalCode::MissingColumns => {
            Some("tabnorm describe (lists the columns each document type expects)".to_owned())
        }
        RefusalCode::MissingPeriodColumn => {
            Some("tabnorm normalize --doc-type sales-by-material --period <LABEL> FILE".to_owned())
        }
        RefusalCode::BadConfig => Some("Check TABNORM_CONFIG and --config".to_owned()),
        _ => None,
    }
}
