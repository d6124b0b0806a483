use crate::document::Rowset;
use crate::schema::OutputSpec;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Render a rowset as delimited text: header first, quoting only when needed.
pub fn write_delimited(rowset: &Rowset, spec: &OutputSpec) -> Result<Vec<u8>, String> {
    let mut buffer = Vec::new();
    if spec.byte_order_mark {
        buffer.extend_from_slice(UTF8_BOM);
    }

    let mut writer = csv::WriterBuilder::new()
        .delimiter(spec.delimiter)
        .quote_style(csv::QuoteStyle::Necessary)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(buffer);

    writer
        .write_record(rowset.columns())
        .map_err(|error| format!("failed to write header row: {error}"))?;
    for (index, row) in rowset.rows().iter().enumerate() {
        writer
            .write_record(row.iter().map(|cell| cell.render()))
            .map_err(|error| format!("failed to write row {index}: {error}"))?;
    }

    writer
        .into_inner()
        .map_err(|error| format!("failed to flush delimited output: {}", error.error()))
}
