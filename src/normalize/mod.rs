//! Format-agnostic cleanup applied to every extracted table.

use crate::document::{Cell, Rowset, is_placeholder};
use serde::Serialize;

/// Known UTF-8 sequences that were decoded as Latin-1 / Windows-1252, with their repair.
///
/// Two-character `Â` forms come first so that a longer `Ã` match cannot consume them.
pub const MOJIBAKE_REPAIRS: &[(&str, &str)] = &[
    ("Â¿", "¿"),
    ("Â¡", "¡"),
    ("Â°", "°"),
    ("Âº", "º"),
    ("Ã±", "ñ"),
    ("Ã‘", "Ñ"),
    ("Ã\u{91}", "Ñ"),
    ("Ã¡", "á"),
    ("Ã©", "é"),
    ("Ã\u{AD}", "í"),
    ("Ã³", "ó"),
    ("Ãº", "ú"),
    ("Ã\u{81}", "Á"),
    ("Ã‰", "É"),
    ("Ã\u{89}", "É"),
    ("Ã\u{8D}", "Í"),
    ("Ã“", "Ó"),
    ("Ã\u{93}", "Ó"),
    ("Ãš", "Ú"),
    ("Ã\u{9A}", "Ú"),
    ("Ã¼", "ü"),
    ("Ãœ", "Ü"),
    ("Ã\u{9C}", "Ü"),
];

/// Counts of what cleanup removed or repaired.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NormalizeStats {
    pub placeholder_columns: usize,
    pub empty_columns: usize,
    pub empty_rows: usize,
    pub header_rows: usize,
    pub repaired_cells: usize,
}

/// Clean a freshly extracted table.
pub fn normalize_rowset(rowset: &Rowset) -> Rowset {
    normalize_with_stats(rowset).0
}

/// Clean a table and report what changed.
///
/// Steps run in order: drop placeholder columns, drop all-empty columns, drop
/// all-empty rows (which also trims footer padding), drop leading rows that repeat
/// the header, repair mojibake in text cells. Passes repeat until one changes
/// nothing, so a column left empty by header removal is dropped as well.
pub fn normalize_with_stats(rowset: &Rowset) -> (Rowset, NormalizeStats) {
    let (mut current, mut stats) = cleanup_pass(rowset);
    let mut changed = stats != NormalizeStats::default();

    while changed {
        let (next, pass) = cleanup_pass(&current);
        changed = pass != NormalizeStats::default();
        stats.absorb(pass);
        current = next;
    }

    tracing::debug!(
        placeholder_columns = stats.placeholder_columns,
        empty_columns = stats.empty_columns,
        empty_rows = stats.empty_rows,
        header_rows = stats.header_rows,
        repaired_cells = stats.repaired_cells,
        "normalized rowset"
    );

    (current, stats)
}

impl NormalizeStats {
    fn absorb(&mut self, other: NormalizeStats) {
        self.placeholder_columns += other.placeholder_columns;
        self.empty_columns += other.empty_columns;
        self.empty_rows += other.empty_rows;
        self.header_rows += other.header_rows;
        self.repaired_cells += other.repaired_cells;
    }
}

fn cleanup_pass(rowset: &Rowset) -> (Rowset, NormalizeStats) {
    let mut stats = NormalizeStats::default();

    let keep: Vec<usize> = (0..rowset.column_count())
        .filter(|&index| {
            if is_placeholder(&rowset.columns[index]) {
                stats.placeholder_columns += 1;
                return false;
            }
            if rowset.rows.iter().all(|row| row[index].is_empty()) {
                stats.empty_columns += 1;
                return false;
            }
            true
        })
        .collect();

    let columns: Vec<String> = keep
        .iter()
        .map(|&index| rowset.columns[index].clone())
        .collect();

    let mut rows: Vec<Vec<Cell>> = Vec::with_capacity(rowset.row_count());
    for row in &rowset.rows {
        if row.iter().all(Cell::is_empty) {
            stats.empty_rows += 1;
            continue;
        }
        rows.push(keep.iter().map(|&index| row[index].clone()).collect());
    }

    while rows.first().is_some_and(|row| repeats_header(row, &columns)) {
        rows.remove(0);
        stats.header_rows += 1;
    }

    for cell in rows.iter_mut().flatten() {
        if let Cell::Text(value) = cell
            && let Some(repaired) = repair_mojibake(value)
        {
            *value = repaired;
            stats.repaired_cells += 1;
        }
    }

    (Rowset { columns, rows }, stats)
}

/// Replace every known mis-decoded sequence; `None` when nothing matched.
pub fn repair_mojibake(text: &str) -> Option<String> {
    if !text.contains(['Ã', 'Â']) {
        return None;
    }

    let mut repaired = text.to_owned();
    for (broken, fixed) in MOJIBAKE_REPAIRS {
        if repaired.contains(broken) {
            repaired = repaired.replace(broken, fixed);
        }
    }
    (repaired != text).then_some(repaired)
}

fn repeats_header(row: &[Cell], columns: &[String]) -> bool {
    !columns.is_empty()
        && row.len() == columns.len()
        && row
            .iter()
            .zip(columns)
            .all(|(cell, column)| cell.render() == *column)
}
