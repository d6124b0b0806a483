use crate::document::{Cell, FormatVerdict, Rowset};
use crate::error::PipelineError;

/// Delimiters considered when inferring the separator of a delimited file.
pub const CANDIDATE_DELIMITERS: [u8; 4] = [b',', b';', b'\t', b'|'];

/// Rowset parsed from delimited text and the delimiter that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct DelimitedTable {
    pub rowset: Rowset,
    pub delimiter: u8,
}

/// Parse delimited text: comma first, then pipe, then the inferred delimiter.
///
/// An attempt is judged by the width of its header record, so a stray delimiter inside
/// a data cell cannot make a wrong guess look like a table. The first attempt whose
/// header splits into more than one column wins; if none does, the comma parse is kept.
pub fn read_delimited(text: &str) -> Result<DelimitedTable, PipelineError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let inferred = infer_delimiter(text);

    let mut tried: Vec<u8> = Vec::with_capacity(3);
    let mut first: Option<DelimitedTable> = None;
    for delimiter in [b',', b'|', inferred] {
        if tried.contains(&delimiter) {
            continue;
        }
        tried.push(delimiter);

        let (header_width, rowset) = parse_attempt(text, delimiter)?;
        let table = DelimitedTable { rowset, delimiter };
        if header_width > 1 {
            if delimiter != b',' {
                tracing::debug!(delimiter = %char::from(delimiter), "delimited text re-parsed");
            }
            return Ok(table);
        }
        first.get_or_insert(table);
    }

    Ok(first.unwrap_or(DelimitedTable {
        rowset: Rowset::default(),
        delimiter: b',',
    }))
}

/// Parse with an explicit delimiter; the first record is the header.
pub fn parse_with(text: &str, delimiter: u8) -> Result<Rowset, PipelineError> {
    parse_attempt(text, delimiter).map(|(_, rowset)| rowset)
}

/// Header width as split by `delimiter`, plus the extracted rowset.
fn parse_attempt(text: &str, delimiter: u8) -> Result<(usize, Rowset), PipelineError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(text.as_bytes());

    let mut records = reader.records();
    let header: Vec<String> = match records.next() {
        Some(record) => record
            .map_err(|error| csv_error(delimiter, error))?
            .iter()
            .map(str::to_owned)
            .collect(),
        None => return Ok((0, Rowset::default())),
    };

    let mut rows = Vec::new();
    for record in records {
        let record = record.map_err(|error| csv_error(delimiter, error))?;
        rows.push(record.iter().map(Cell::text).collect());
    }

    Ok((header.len(), Rowset::from_extracted(header, rows)))
}

/// Pick the candidate that appears most often and most consistently across the
/// first lines of the text.
pub fn infer_delimiter(text: &str) -> u8 {
    let sample: Vec<&str> = text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .take(10)
        .collect();
    if sample.is_empty() {
        return b',';
    }

    let mut best = b',';
    let mut best_score = 0.0f64;
    for delimiter in CANDIDATE_DELIMITERS {
        let counts: Vec<f64> = sample
            .iter()
            .map(|line| line.bytes().filter(|&byte| byte == delimiter).count() as f64)
            .collect();
        let mean = counts.iter().sum::<f64>() / counts.len() as f64;
        let variance =
            counts.iter().map(|count| (count - mean).powi(2)).sum::<f64>() / counts.len() as f64;
        let score = mean / (1.0 + variance.sqrt());

        if score > best_score {
            best_score = score;
            best = delimiter;
        }
    }

    best
}

fn csv_error(delimiter: u8, error: csv::Error) -> PipelineError {
    PipelineError::Extraction {
        format: FormatVerdict::DelimitedText,
        reason: format!("delimiter '{}': {error}", char::from(delimiter)),
    }
}

#[cfg(test)]
mod tests {
    use super::{infer_delimiter, parse_with, read_delimited};
    use crate::document::Cell;

    #[test]
    fn comma_text_parses_on_first_attempt() {
        let table = read_delimited("Cliente,Mes\n10,Enero\n").expect("parse");
        assert_eq!(table.delimiter, b',');
        assert_eq!(table.rowset.columns(), &["Cliente", "Mes"]);
        assert_eq!(table.rowset.rows()[0][1], Cell::text("Enero"));
    }

    #[test]
    fn pipe_text_is_reparsed_after_single_column_comma_parse() {
        let table = read_delimited("Numero|Estado|Tipo\n1|A|NEVERA\n2|I|MUEBLE\n").expect("parse");
        assert_eq!(table.delimiter, b'|');
        assert_eq!(table.rowset.column_count(), 3);
        assert_eq!(table.rowset.row_count(), 2);
    }

    #[test]
    fn comma_inside_pipe_cell_does_not_stop_the_pipe_retry() {
        let table = read_delimited("Numero|Estado|Tipo\n1|A|NEVERA, VERTICAL\n2|A|MUEBLE\n")
            .expect("parse");
        assert_eq!(table.delimiter, b'|');
        assert_eq!(table.rowset.columns(), &["Numero", "Estado", "Tipo"]);
        assert_eq!(table.rowset.rows()[0][2], Cell::text("NEVERA, VERTICAL"));
    }

    #[test]
    fn semicolon_text_falls_through_to_inference() {
        let table = read_delimited("a;b;c\n1;2;3\n4;5;6\n").expect("parse");
        assert_eq!(table.delimiter, b';');
        assert_eq!(table.rowset.columns(), &["a", "b", "c"]);
    }

    #[test]
    fn single_column_text_keeps_comma_parse() {
        let table = read_delimited("Mes\nEnero\nFebrero\n").expect("parse");
        assert_eq!(table.delimiter, b',');
        assert_eq!(table.rowset.column_count(), 1);
        assert_eq!(table.rowset.row_count(), 2);
    }

    #[test]
    fn leading_bom_does_not_leak_into_header() {
        let table = read_delimited("\u{feff}Codigo Ecom,Ciudad\n1,Cali\n").expect("parse");
        assert_eq!(table.rowset.columns()[0], "Codigo Ecom");
    }

    #[test]
    fn quoted_delimiters_stay_inside_cells() {
        let rowset = parse_with("Nombre,Ciudad\n\"Perez, Ana\",Cali\n", b',').expect("parse");
        assert_eq!(rowset.rows()[0][0], Cell::text("Perez, Ana"));
    }

    #[test]
    fn empty_text_yields_empty_rowset() {
        let table = read_delimited("").expect("parse");
        assert_eq!(table.rowset.column_count(), 0);
        assert!(table.rowset.is_empty());
    }

    #[test]
    fn inference_prefers_consistent_delimiters() {
        assert_eq!(infer_delimiter("a\tb\tc\n1\t2\t3"), b'\t');
        assert_eq!(infer_delimiter("a|b\n1|2\n3|4"), b'|');
        assert_eq!(infer_delimiter(""), b',');
    }
}
