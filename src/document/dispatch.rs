use crate::diagnostics::{Diagnostic, DiagnosticCode};
use crate::document::csv::read_delimited;
use crate::document::decode::{DEFAULT_ENCODINGS, TextEncoding, decode};
use crate::document::html::read_html_table;
use crate::document::sniff::{FormatVerdict, Sniffer};
use crate::document::xlsx::{LegacyReadError, read_legacy, read_workbook};
use crate::document::Rowset;
use crate::error::PipelineError;
use std::path::Path;

/// Knobs for sniffing and decoding an upload.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadOptions {
    pub sniffer: Sniffer,
    pub encodings: Vec<TextEncoding>,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            sniffer: Sniffer::default(),
            encodings: DEFAULT_ENCODINGS.to_vec(),
        }
    }
}

/// A raw table pulled out of an upload, before any cleanup.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedDocument {
    pub name: String,
    /// Format the rows were actually read as (after any legacy to HTML retry).
    pub verdict: FormatVerdict,
    pub encoding: Option<TextEncoding>,
    pub delimiter: Option<u8>,
    pub rowset: Rowset,
    pub warnings: Vec<Diagnostic>,
}

/// Sniff `bytes` and run the matching extraction strategy.
///
/// The declared name only feeds diagnostics. A legacy container that the binary
/// reader rejects outright is retried once as HTML.
pub fn extract_document(
    bytes: &[u8],
    name: &str,
    options: &ReadOptions,
) -> Result<ExtractedDocument, PipelineError> {
    let extension = Path::new(name)
        .extension()
        .and_then(|extension| extension.to_str())
        .unwrap_or("");
    let sniffed = options.sniffer.sniff(bytes, extension);

    let mut warnings = Vec::new();
    if let Some(expected) = FormatVerdict::expected_for_extension(extension)
        && expected != sniffed
    {
        Diagnostic::new(
            DiagnosticCode::ExtensionMismatch,
            format!("declared .{extension} but content is {sniffed}"),
        )
        .for_file(name)
        .emit(&mut warnings);
    }

    let mut document = ExtractedDocument {
        name: name.to_owned(),
        verdict: sniffed,
        encoding: None,
        delimiter: None,
        rowset: Rowset::default(),
        warnings,
    };

    match sniffed {
        FormatVerdict::ModernZipSpreadsheet => {
            document.rowset = read_workbook(bytes)?;
        }
        FormatVerdict::LegacyBinarySpreadsheet => match read_legacy(bytes) {
            Ok(rowset) => document.rowset = rowset,
            Err(LegacyReadError::NotContainer(reason)) => {
                Diagnostic::new(
                    DiagnosticCode::LegacyAsHtml,
                    format!("legacy reader rejected the container ({reason}); read as HTML"),
                )
                .for_file(name)
                .emit(&mut document.warnings);
                read_as_html(bytes, options, &mut document)?;
            }
            Err(LegacyReadError::Unreadable(reason)) => {
                return Err(PipelineError::Extraction {
                    format: FormatVerdict::LegacyBinarySpreadsheet,
                    reason,
                });
            }
        },
        FormatVerdict::HtmlDisguisedSpreadsheet => read_as_html(bytes, options, &mut document)?,
        FormatVerdict::DelimitedText => {
            let decoded = decode(bytes, &options.encodings)?;
            let table = read_delimited(&decoded.text)?;
            document.encoding = Some(decoded.encoding);
            document.delimiter = Some(table.delimiter);
            document.rowset = table.rowset;
        }
    }

    tracing::info!(
        file = name,
        format = document.verdict.label(),
        rows = document.rowset.row_count(),
        columns = document.rowset.column_count(),
        "extracted table"
    );
    Ok(document)
}

fn read_as_html(
    bytes: &[u8],
    options: &ReadOptions,
    document: &mut ExtractedDocument,
) -> Result<(), PipelineError> {
    let decoded = decode(bytes, &options.encodings)?;
    document.rowset = read_html_table(&decoded.text)?;
    document.encoding = Some(decoded.encoding);
    document.verdict = FormatVerdict::HtmlDisguisedSpreadsheet;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{ReadOptions, extract_document};
    use crate::diagnostics::DiagnosticCode;
    use crate::document::sniff::{CFB_MAGIC, Sniffer};
    use crate::document::xlsx::tests::{minimal_xls, minimal_xlsx};
    use crate::document::{Cell, FormatVerdict, TextEncoding};
    use crate::error::PipelineError;

    #[test]
    fn html_saved_as_xls_is_read_as_table() {
        let bytes = b"<html><table><tr><td>Numero</td></tr><tr><td>7</td></tr></table></html>";
        let document =
            extract_document(bytes, "exhibidores.xls", &ReadOptions::default()).expect("extract");

        assert_eq!(document.verdict, FormatVerdict::HtmlDisguisedSpreadsheet);
        assert_eq!(document.rowset.columns(), &["Numero"]);
        assert_eq!(document.rowset.rows()[0][0], Cell::text("7"));
        assert_eq!(document.warnings.len(), 1);
        assert_eq!(document.warnings[0].code, DiagnosticCode::ExtensionMismatch);
    }

    #[test]
    fn pipe_delimited_latin1_text_is_decoded_and_split() {
        let bytes = b"Ciudad|Barrio\nBogot\xe1|Centro\n";
        let document =
            extract_document(bytes, "clientes.csv", &ReadOptions::default()).expect("extract");

        assert_eq!(document.encoding, Some(TextEncoding::Latin1));
        assert_eq!(document.delimiter, Some(b'|'));
        assert_eq!(document.rowset.rows()[0][0], Cell::text("Bogotá"));
        assert!(document.warnings.is_empty());
    }

    #[test]
    fn workbook_is_read_from_zip_container() {
        let document = extract_document(&minimal_xlsx(), "ventas.xlsx", &ReadOptions::default())
            .expect("extract");
        assert_eq!(document.verdict, FormatVerdict::ModernZipSpreadsheet);
        assert_eq!(document.rowset.row_count(), 1);
    }

    #[test]
    fn legacy_workbook_is_read_without_html_retry() {
        let document = extract_document(&minimal_xls(), "exhibidores.xls", &ReadOptions::default())
            .expect("extract");
        assert_eq!(document.verdict, FormatVerdict::LegacyBinarySpreadsheet);
        assert_eq!(document.rowset.columns(), &["Numero", "Estado"]);
        assert_eq!(document.rowset.row_count(), 2);
        assert!(document.warnings.is_empty());
    }

    #[test]
    fn damaged_legacy_workbook_is_refused_not_retried() {
        let mut bytes = minimal_xls();
        let at = bytes
            .windows(4)
            .position(|window| window == [0x85, 0x00, 0x0D, 0x00])
            .expect("sheet record");
        bytes[at + 8] = 0x05;

        let result = extract_document(&bytes, "exhibidores.xls", &ReadOptions::default());
        assert!(matches!(
            result,
            Err(PipelineError::Extraction {
                format: FormatVerdict::LegacyBinarySpreadsheet,
                ..
            })
        ));
    }

    #[test]
    fn rejected_legacy_container_is_retried_as_html() {
        let mut bytes = CFB_MAGIC.to_vec();
        bytes.extend_from_slice(b"<table><tr><td>Mes</td></tr><tr><td>Enero</td></tr></table>");
        let options = ReadOptions {
            sniffer: Sniffer::with_window(CFB_MAGIC.len()),
            ..ReadOptions::default()
        };

        let document = extract_document(&bytes, "ventas.xls", &options).expect("extract");
        assert_eq!(document.verdict, FormatVerdict::HtmlDisguisedSpreadsheet);
        assert_eq!(document.rowset.column_values("Mes"), Some(vec!["Enero".to_owned()]));
        assert!(
            document
                .warnings
                .iter()
                .any(|warning| warning.code == DiagnosticCode::LegacyAsHtml)
        );
    }

    #[test]
    fn retry_happens_once_and_surfaces_html_failure() {
        let mut bytes = CFB_MAGIC.to_vec();
        bytes.extend_from_slice(&[0u8; 64]);
        let result = extract_document(&bytes, "ventas.xls", &ReadOptions::default());
        assert!(matches!(result, Err(PipelineError::NoTableFound)));
    }

    #[test]
    fn restricted_encodings_refuse_undecodable_text() {
        let options = ReadOptions {
            encodings: vec![TextEncoding::Utf8],
            ..ReadOptions::default()
        };
        let result = extract_document(b"Espa\xf1a,x\n", "a.csv", &options);
        assert!(matches!(result, Err(PipelineError::UnreadableText { .. })));
    }
}
