use crate::document::decode::decode_permissive;
use serde::Serialize;
use std::fmt;

/// Markup markers that identify server-rendered HTML saved with a spreadsheet extension.
pub const HTML_MARKERS: [&str; 4] = ["<html", "<!doctype", "<table", "<htm"];

/// ZIP local-file-header magic (xlsx and friends).
pub const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

/// Compound File Binary magic (xls 97-2003).
pub const CFB_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

/// Default number of leading bytes inspected for markup.
pub const DEFAULT_SNIFF_WINDOW: usize = 2048;

/// What the bytes actually are, regardless of the declared extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatVerdict {
    LegacyBinarySpreadsheet,
    HtmlDisguisedSpreadsheet,
    ModernZipSpreadsheet,
    DelimitedText,
}

impl FormatVerdict {
    pub fn label(self) -> &'static str {
        match self {
            FormatVerdict::LegacyBinarySpreadsheet => "legacy binary spreadsheet",
            FormatVerdict::HtmlDisguisedSpreadsheet => "HTML table",
            FormatVerdict::ModernZipSpreadsheet => "xlsx workbook",
            FormatVerdict::DelimitedText => "delimited text",
        }
    }

    /// Verdict a well-behaved file with this extension would get.
    pub fn expected_for_extension(extension: &str) -> Option<Self> {
        match extension.trim_start_matches('.').to_lowercase().as_str() {
            "xls" => Some(FormatVerdict::LegacyBinarySpreadsheet),
            "xlsx" | "xlsm" => Some(FormatVerdict::ModernZipSpreadsheet),
            "csv" | "txt" | "tsv" => Some(FormatVerdict::DelimitedText),
            "htm" | "html" => Some(FormatVerdict::HtmlDisguisedSpreadsheet),
            _ => None,
        }
    }
}

impl fmt::Display for FormatVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Byte-level format classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sniffer {
    pub window: usize,
    pub markers: &'static [&'static str],
}

impl Default for Sniffer {
    fn default() -> Self {
        Self {
            window: DEFAULT_SNIFF_WINDOW,
            markers: &HTML_MARKERS,
        }
    }
}

impl Sniffer {
    pub fn with_window(window: usize) -> Self {
        Self {
            window: window.max(1),
            ..Self::default()
        }
    }

    /// Classify `bytes`. The declared extension is only logged, never branched on.
    ///
    /// Markup is checked before magic bytes: legacy exporters write HTML tables
    /// under `.xls`, and those must not reach the binary reader first.
    pub fn sniff(&self, bytes: &[u8], declared_extension: &str) -> FormatVerdict {
        let head = &bytes[..bytes.len().min(self.window)];
        let text = decode_permissive(head).text.to_lowercase();

        let verdict = if self.markers.iter().any(|marker| text.contains(marker)) {
            FormatVerdict::HtmlDisguisedSpreadsheet
        } else if bytes.starts_with(ZIP_MAGIC) {
            FormatVerdict::ModernZipSpreadsheet
        } else if bytes.starts_with(CFB_MAGIC) {
            FormatVerdict::LegacyBinarySpreadsheet
        } else {
            FormatVerdict::DelimitedText
        };

        tracing::debug!(
            declared_extension,
            verdict = verdict.label(),
            inspected = head.len(),
            "sniffed input format"
        );
        verdict
    }
}

/// Classify with the default window and markers.
pub fn sniff_format(bytes: &[u8], declared_extension: &str) -> FormatVerdict {
    Sniffer::default().sniff(bytes, declared_extension)
}
