pub mod csv;
pub mod decode;
pub mod dispatch;
pub mod html;
pub mod sniff;
pub mod xlsx;

pub use decode::{DEFAULT_ENCODINGS, DecodedText, TextEncoding, decode, decode_permissive};
pub use dispatch::{ExtractedDocument, ReadOptions, extract_document};
pub use sniff::{FormatVerdict, Sniffer, sniff_format};

use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

/// Prefix of the synthetic name given to header cells that carry no text.
pub const UNNAMED_PREFIX: &str = "Unnamed: ";

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Unnamed: \d+$").expect("static placeholder pattern"));

/// True for extractor-assigned column names such as `Unnamed: 12`.
pub fn is_placeholder(name: &str) -> bool {
    PLACEHOLDER.is_match(name)
}

/// A single scalar value in a [`Rowset`].
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Cell {
    #[default]
    Empty,
    Text(String),
    Number(f64),
}

impl Cell {
    /// Build a text cell; blank input becomes [`Cell::Empty`].
    pub fn text(value: impl Into<String>) -> Self {
        let value = value.into();
        if value.trim().is_empty() {
            Cell::Empty
        } else {
            Cell::Text(value)
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(value) => value.trim().is_empty(),
            Cell::Number(value) => value.is_nan(),
        }
    }

    /// Numeric view of the cell. Text is parsed after trimming.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(value) if value.is_finite() => Some(*value),
            Cell::Text(value) => value.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
            _ => None,
        }
    }

    /// Text as it appears in the canonical delimited output.
    pub fn render(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Text(value) => value.clone(),
            Cell::Number(value) => format_number(*value),
        }
    }
}

/// Integral values render without a fractional part (`42`, not `42.0`).
pub fn format_number(value: f64) -> String {
    if value.is_nan() {
        return String::new();
    }
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

/// Ordered column names plus rows of cells; every row has exactly one cell per column.
///
/// Stages never mutate a rowset they receive; each builds and returns a new one.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Rowset {
    pub(crate) columns: Vec<String>,
    pub(crate) rows: Vec<Vec<Cell>>,
}

impl Rowset {
    /// Build a rowset, rejecting rows whose width differs from the header.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Cell>>) -> Result<Self, String> {
        if let Some((index, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != columns.len())
        {
            return Err(format!(
                "row {index} has {} cells but the rowset has {} columns",
                row.len(),
                columns.len()
            ));
        }
        Ok(Self { columns, rows })
    }

    /// Build a rowset from an extracted header and ragged rows.
    ///
    /// Blank header names become `Unnamed: <index>` placeholders, repeated names get
    /// `.1`, `.2` suffixes, and short rows are padded with empty cells. Rows longer
    /// than the header widen the table with placeholder columns.
    pub fn from_extracted(header: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        let width = rows
            .iter()
            .map(Vec::len)
            .chain(std::iter::once(header.len()))
            .max()
            .unwrap_or(0);

        let mut names = header;
        names.resize(width, String::new());
        let columns = unique_column_names(names);

        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, Cell::Empty);
                row
            })
            .collect();

        Self { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Cell at `row` in the column called `name`.
    pub fn cell(&self, row: usize, name: &str) -> Option<&Cell> {
        let column = self.column_index(name)?;
        self.rows.get(row).and_then(|cells| cells.get(column))
    }

    /// Rendered values of one column, top to bottom.
    pub fn column_values(&self, name: &str) -> Option<Vec<String>> {
        let column = self.column_index(name)?;
        Some(self.rows.iter().map(|row| row[column].render()).collect())
    }

    pub fn into_parts(self) -> (Vec<String>, Vec<Vec<Cell>>) {
        (self.columns, self.rows)
    }
}

fn unique_column_names(names: Vec<String>) -> Vec<String> {
    let mut used: HashSet<String> = HashSet::with_capacity(names.len());
    let mut next_suffix: HashMap<String, usize> = HashMap::new();
    let mut columns = Vec::with_capacity(names.len());

    for (index, name) in names.into_iter().enumerate() {
        let trimmed = name.trim();
        let base = if trimmed.is_empty() {
            format!("{UNNAMED_PREFIX}{index}")
        } else {
            trimmed.to_owned()
        };

        let mut candidate = base.clone();
        if used.contains(&candidate) {
            let suffix = next_suffix.entry(base.clone()).or_insert(1);
            loop {
                candidate = format!("{base}.{suffix}");
                *suffix += 1;
                if !used.contains(&candidate) {
                    break;
                }
            }
        }

        used.insert(candidate.clone());
        columns.push(candidate);
    }

    columns
}
