use crate::document::{FormatVerdict, TextEncoding};
use crate::refusal::codes::RefusalCode;
use crate::schema::DocumentType;
use serde_json::{Value, json};
use thiserror::Error;

/// Failure of a pipeline stage. Every variant maps to one stable [`RefusalCode`].
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("no candidate encoding could decode the text (tried {})", join_encodings(.tried))]
    UnreadableText { tried: Vec<TextEncoding> },

    #[error("unsupported format: {reason}")]
    UnsupportedFormat { reason: String },

    #[error("no table found in HTML content")]
    NoTableFound,

    #[error("missing required columns for {document}: {}", .missing.join(", "))]
    MissingColumns {
        document: DocumentType,
        missing: Vec<String>,
    },

    #[error("{side} input has no '{column}' column")]
    MissingPeriodColumn { column: String, side: String },

    #[error("{document} produced no rows after cleanup")]
    EmptyResult { document: DocumentType },

    #[error("failed to read {format} content: {reason}")]
    Extraction {
        format: FormatVerdict,
        reason: String,
    },

    #[error("result cache error: {0}")]
    Cache(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("{0}")]
    Io(String),

    #[error("{file}: {source}")]
    InFile {
        file: String,
        #[source]
        source: Box<PipelineError>,
    },
}

impl PipelineError {
    /// Attach the name of the file being processed when the error came from reading it.
    pub fn in_file(self, file: impl Into<String>) -> Self {
        match self {
            already @ PipelineError::InFile { .. } => already,
            other => PipelineError::InFile {
                file: file.into(),
                source: Box::new(other),
            },
        }
    }

    /// Stable error kind exposed to callers.
    pub fn code(&self) -> RefusalCode {
        match self {
            PipelineError::UnreadableText { .. } => RefusalCode::UnreadableText,
            PipelineError::UnsupportedFormat { .. } => RefusalCode::UnsupportedFormat,
            PipelineError::NoTableFound => RefusalCode::NoTableFound,
            PipelineError::MissingColumns { .. } => RefusalCode::MissingColumns,
            PipelineError::MissingPeriodColumn { .. } => RefusalCode::MissingPeriodColumn,
            PipelineError::EmptyResult { .. } => RefusalCode::EmptyResult,
            PipelineError::Extraction { .. } => RefusalCode::Extraction,
            PipelineError::Cache(_) => RefusalCode::Cache,
            PipelineError::Config(_) => RefusalCode::BadConfig,
            PipelineError::Io(_) => RefusalCode::BadInput,
            PipelineError::InFile { source, .. } => source.code(),
        }
    }

    /// Structured detail for refusal envelopes.
    pub fn detail(&self) -> Value {
        match self {
            PipelineError::UnreadableText { tried } => json!({
                "tried": tried.iter().map(|encoding| encoding.label()).collect::<Vec<_>>()
            }),
            PipelineError::UnsupportedFormat { reason } => json!({ "reason": reason }),
            PipelineError::NoTableFound => json!({}),
            PipelineError::MissingColumns { document, missing } => json!({
                "document_type": document,
                "missing_columns": missing,
            }),
            PipelineError::MissingPeriodColumn { column, side } => json!({
                "column": column,
                "input": side,
            }),
            PipelineError::EmptyResult { document } => json!({ "document_type": document }),
            PipelineError::Extraction { format, reason } => json!({
                "format": format,
                "reason": reason,
            }),
            PipelineError::Cache(reason)
            | PipelineError::Config(reason)
            | PipelineError::Io(reason) => json!({ "reason": reason }),
            PipelineError::InFile { file, source } => {
                let mut detail = source.detail();
                if let Value::Object(map) = &mut detail {
                    map.insert("file".to_owned(), Value::String(file.clone()));
                }
                detail
            }
        }
    }
}

fn join_encodings(tried: &[TextEncoding]) -> String {
    tried
        .iter()
        .map(|encoding| encoding.label())
        .collect::<Vec<_>>()
        .join(", ")
}
