use crate::document::{Cell, FormatVerdict, Rowset};
use crate::error::PipelineError;
use scraper::{ElementRef, Html, Selector};

/// Largest `colspan` honoured; larger values are clamped, as browsers do.
pub const MAX_COLSPAN: usize = 1000;

/// Extract the first `<table>` in document order; its first row is the header.
///
/// Rows inside `thead`, `tbody` and `tfoot` are read in order. Tables nested in a
/// cell are not expanded. A `colspan` repeats the cell value across the spanned
/// columns, up to [`MAX_COLSPAN`].
pub fn read_html_table(text: &str) -> Result<Rowset, PipelineError> {
    let document = Html::parse_document(text);
    let selector = Selector::parse("table").map_err(|error| PipelineError::Extraction {
        format: FormatVerdict::HtmlDisguisedSpreadsheet,
        reason: format!("invalid table selector: {error}"),
    })?;

    let table = document
        .select(&selector)
        .next()
        .ok_or(PipelineError::NoTableFound)?;

    let mut rows = Vec::new();
    collect_rows(table, &mut rows);
    tracing::debug!(rows = rows.len(), "extracted HTML table");

    let mut rows = rows.into_iter();
    let Some(header) = rows.next() else {
        return Ok(Rowset::default());
    };
    let header = header.into_iter().map(|cell| cell.render()).collect();
    Ok(Rowset::from_extracted(header, rows.collect()))
}

fn collect_rows(container: ElementRef<'_>, rows: &mut Vec<Vec<Cell>>) {
    for child in container.children().filter_map(ElementRef::wrap) {
        match child.value().name() {
            "tr" => rows.push(read_row(child)),
            "thead" | "tbody" | "tfoot" => collect_rows(child, rows),
            _ => {}
        }
    }
}

fn read_row(row: ElementRef<'_>) -> Vec<Cell> {
    let mut cells = Vec::new();
    for cell in row.children().filter_map(ElementRef::wrap) {
        let name = cell.value().name();
        if name != "td" && name != "th" {
            continue;
        }

        let span = cell
            .value()
            .attr("colspan")
            .and_then(|value| value.trim().parse::<usize>().ok())
            .filter(|span| *span > 0)
            .unwrap_or(1)
            .min(MAX_COLSPAN);
        let value = Cell::text(cell_text(cell));
        for _ in 0..span {
            cells.push(value.clone());
        }
    }
    cells
}

fn cell_text(cell: ElementRef<'_>) -> String {
    let joined: String = cell.text().collect();
    joined.split_whitespace().collect::<Vec<_>>().join(" ")
}
