use serde::Serialize;
use std::fmt;

/// Stable codes for recoverable anomalies reported alongside a successful run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DiagnosticCode {
    /// Declared extension disagrees with the sniffed format.
    #[serde(rename = "W_EXTENSION_MISMATCH")]
    ExtensionMismatch,
    /// Legacy binary reader rejected the container; the bytes were read as HTML.
    #[serde(rename = "W_LEGACY_AS_HTML")]
    LegacyAsHtml,
    /// Tolerant document type was missing columns that were filled with empty values.
    #[serde(rename = "W_COLUMNS_FILLED")]
    ColumnsFilled,
    /// No period label was supplied for a document that carries one.
    #[serde(rename = "W_PERIOD_MISSING")]
    PeriodMissing,
    /// Incoming period rowset holds more than one distinct period value.
    #[serde(rename = "W_AMBIGUOUS_PERIOD")]
    AmbiguousPeriod,
    /// Incoming period rowset had no rows, so nothing was replaced.
    #[serde(rename = "W_EMPTY_PERIOD")]
    EmptyPeriod,
    /// Cleanup left zero rows; the empty artifact was still cached.
    #[serde(rename = "W_EMPTY_RESULT")]
    EmptyResult,
}

impl DiagnosticCode {
    pub fn as_str(self) -> &'static str {
        match self {
            DiagnosticCode::ExtensionMismatch => "W_EXTENSION_MISMATCH",
            DiagnosticCode::LegacyAsHtml => "W_LEGACY_AS_HTML",
            DiagnosticCode::ColumnsFilled => "W_COLUMNS_FILLED",
            DiagnosticCode::PeriodMissing => "W_PERIOD_MISSING",
            DiagnosticCode::AmbiguousPeriod => "W_AMBIGUOUS_PERIOD",
            DiagnosticCode::EmptyPeriod => "W_EMPTY_PERIOD",
            DiagnosticCode::EmptyResult => "W_EMPTY_RESULT",
        }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One warning attached to a run report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub code: DiagnosticCode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    pub message: String,
}

impl Diagnostic {
    pub fn new(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self {
            code,
            file: None,
            message: message.into(),
        }
    }

    pub fn for_file(mut self, file: impl Into<String>) -> Self {
        if self.file.is_none() {
            self.file = Some(file.into());
        }
        self
    }

    /// Record the diagnostic and mirror it as a `warn` event.
    pub fn emit(self, sink: &mut Vec<Diagnostic>) {
        tracing::warn!(
            code = self.code.as_str(),
            file = self.file.as_deref().unwrap_or(""),
            "{}",
            self.message
        );
        sink.push(self);
    }
}
