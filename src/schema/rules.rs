//! Declarative rule vocabulary shared by every document schema.

use crate::document::{Cell, Rowset};
use chrono::{NaiveDate, NaiveDateTime};

/// Exact-match value substitutions for one column (raw value, corrected value).
pub type CorrectionTable = &'static [(&'static str, &'static str)];

/// Which columns survive selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnSelection {
    /// Keep exactly the required columns, in their declared order.
    Required,
    /// Keep every input column; required columns only have to be present.
    All,
}

/// What to do when required columns are absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingColumnPolicy {
    Reject,
    /// Add the missing columns filled with empty values.
    FillEmpty,
}

/// Row predicate on the rendered value of one column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowFilter {
    /// Drop rows whose value equals `value`.
    Exclude {
        column: &'static str,
        value: &'static str,
    },
    /// Keep only rows whose value equals `value`.
    Require {
        column: &'static str,
        value: &'static str,
    },
}

impl RowFilter {
    pub fn column(&self) -> &'static str {
        match self {
            RowFilter::Exclude { column, .. } | RowFilter::Require { column, .. } => column,
        }
    }

    pub fn keeps(&self, cell: &Cell) -> bool {
        match self {
            RowFilter::Exclude { value, .. } => cell.render() != *value,
            RowFilter::Require { value, .. } => cell.render() == *value,
        }
    }
}

/// Correction table bound to the column it applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnCorrections {
    pub column: &'static str,
    pub table: CorrectionTable,
}

impl ColumnCorrections {
    /// Corrected value for `raw`, if the table lists it.
    pub fn lookup(&self, raw: &str) -> Option<&'static str> {
        self.table
            .iter()
            .find(|(from, _)| *from == raw)
            .map(|(_, to)| *to)
    }
}

/// Column derivations applied after filtering and correction, in declaration order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DerivedRule {
    /// Insert the caller-supplied period label as a new column at `position`.
    InsertPeriod {
        column: &'static str,
        position: usize,
    },
    /// Split `source` on the first `delimiter` into `left` and `right`, then drop
    /// `source`. Both parts are trimmed. A value without the delimiter goes, trimmed,
    /// to `left` and leaves `right` empty.
    SplitFirst {
        source: &'static str,
        delimiter: char,
        left: &'static str,
        right: &'static str,
    },
    /// Replace each value with the text after its first `delimiter`, untrimmed.
    /// A value without the delimiter is kept unchanged.
    KeepAfterFirst {
        column: &'static str,
        delimiter: char,
    },
    /// Divide by `divisor` and render with fixed decimals and a custom separator.
    /// Non-numeric values become empty.
    ScaledDecimal {
        column: &'static str,
        divisor: f64,
        decimals: usize,
        decimal_separator: char,
    },
    /// Render identifiers as text without a trailing `.0`.
    IntegerText { column: &'static str },
    /// Remove every occurrence of the listed characters.
    StripChars {
        column: &'static str,
        chars: &'static [char],
    },
    /// Set `target` to `matched` when `source` contains `needle`, else `otherwise`.
    /// Exact `overrides` values always get `otherwise`.
    Classify {
        source: &'static str,
        target: &'static str,
        needle: &'static str,
        matched: &'static str,
        otherwise: &'static str,
        overrides: &'static [&'static str],
    },
    /// Re-render dates as `DD-MM-YYYY`; unparseable values become empty.
    DayMonthYear { column: &'static str },
}

impl DerivedRule {
    /// Columns that must exist before the rule can run.
    pub fn inputs(&self) -> &[&'static str] {
        match self {
            DerivedRule::InsertPeriod { .. } => &[],
            DerivedRule::SplitFirst { source, .. } => std::slice::from_ref(source),
            DerivedRule::KeepAfterFirst { column, .. }
            | DerivedRule::ScaledDecimal { column, .. }
            | DerivedRule::IntegerText { column }
            | DerivedRule::StripChars { column, .. }
            | DerivedRule::DayMonthYear { column } => std::slice::from_ref(column),
            DerivedRule::Classify { source, .. } => std::slice::from_ref(source),
        }
    }

    /// Apply the rule in place. `period` feeds [`DerivedRule::InsertPeriod`].
    pub(crate) fn apply(&self, table: &mut Rowset, period: Option<&str>) {
        match *self {
            DerivedRule::InsertPeriod { column, position } => {
                let value = period.map(Cell::text).unwrap_or_default();
                if let Some(existing) = table.column_index(column) {
                    remove_column(table, existing);
                }
                let position = position.min(table.columns.len());
                table.columns.insert(position, column.to_owned());
                for row in &mut table.rows {
                    row.insert(position, value.clone());
                }
            }
            DerivedRule::SplitFirst {
                source,
                delimiter,
                left,
                right,
            } => {
                let Some(index) = table.column_index(source) else {
                    return;
                };
                let parts: Vec<(Cell, Cell)> = table
                    .rows
                    .iter()
                    .map(|row| split_first(&row[index], delimiter))
                    .collect();
                remove_column(table, index);
                let (lefts, rights): (Vec<Cell>, Vec<Cell>) = parts.into_iter().unzip();
                set_column(table, left, lefts);
                set_column(table, right, rights);
            }
            DerivedRule::KeepAfterFirst { column, delimiter } => {
                map_column(table, column, |cell| match cell.render().split_once(delimiter) {
                    Some((_, after)) => Cell::text(after),
                    None => cell.clone(),
                });
            }
            DerivedRule::ScaledDecimal {
                column,
                divisor,
                decimals,
                decimal_separator,
            } => {
                map_column(table, column, |cell| match cell.as_number() {
                    Some(value) => Cell::Text(
                        format!("{:.*}", decimals, value / divisor)
                            .replace('.', &decimal_separator.to_string()),
                    ),
                    None => Cell::Empty,
                });
            }
            DerivedRule::IntegerText { column } => {
                map_column(table, column, |cell| {
                    let rendered = cell.render();
                    match rendered.strip_suffix(".0") {
                        Some(stripped) => Cell::text(stripped),
                        None => Cell::text(rendered),
                    }
                });
            }
            DerivedRule::StripChars { column, chars } => {
                map_column(table, column, |cell| match cell {
                    Cell::Empty => Cell::Empty,
                    other => Cell::text(other.render().replace(chars, "")),
                });
            }
            DerivedRule::Classify {
                source,
                target,
                needle,
                matched,
                otherwise,
                overrides,
            } => {
                let Some(index) = table.column_index(source) else {
                    return;
                };
                let labels: Vec<Cell> = table
                    .rows
                    .iter()
                    .map(|row| {
                        let value = row[index].render();
                        let overridden = overrides.iter().any(|kept| *kept == value);
                        let label = if value.contains(needle) && !overridden {
                            matched
                        } else {
                            otherwise
                        };
                        Cell::text(label)
                    })
                    .collect();
                set_column(table, target, labels);
            }
            DerivedRule::DayMonthYear { column } => {
                map_column(table, column, |cell| match parse_date(&cell.render()) {
                    Some(date) => Cell::Text(date.format("%d-%m-%Y").to_string()),
                    None => Cell::Empty,
                });
            }
        }
    }
}

/// Parse the date shapes spreadsheet exports produce.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    const DATE_TIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%d/%m/%Y %H:%M:%S"];
    const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y", "%d-%m-%Y"];

    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    DATE_TIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|timestamp| timestamp.date())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|format| NaiveDate::parse_from_str(raw, format).ok())
        })
}

fn split_first(cell: &Cell, delimiter: char) -> (Cell, Cell) {
    let rendered = cell.render();
    match rendered.split_once(delimiter) {
        Some((left, right)) => (Cell::text(left.trim()), Cell::text(right.trim())),
        None => (Cell::text(rendered.trim()), Cell::Empty),
    }
}

fn map_column(table: &mut Rowset, column: &str, mut map: impl FnMut(&Cell) -> Cell) {
    let Some(index) = table.column_index(column) else {
        return;
    };
    for row in &mut table.rows {
        row[index] = map(&row[index]);
    }
}

/// Overwrite `column` in place, or append it when absent.
fn set_column(table: &mut Rowset, column: &str, values: Vec<Cell>) {
    match table.column_index(column) {
        Some(index) => {
            for (row, value) in table.rows.iter_mut().zip(values) {
                row[index] = value;
            }
        }
        None => {
            table.columns.push(column.to_owned());
            for (row, value) in table.rows.iter_mut().zip(values) {
                row.push(value);
            }
        }
    }
}

fn remove_column(table: &mut Rowset, index: usize) {
    table.columns.remove(index);
    for row in &mut table.rows {
        row.remove(index);
    }
}

#[cfg(test)]
mod tests {
    use super::{ColumnCorrections, DerivedRule, RowFilter, parse_date};
    use crate::document::{Cell, Rowset};
    use chrono::NaiveDate;

    fn table(columns: &[&str], rows: Vec<Vec<Cell>>) -> Rowset {
        Rowset::new(columns.iter().map(|c| (*c).to_owned()).collect(), rows).expect("table")
    }

    #[test]
    fn filters_compare_rendered_values() {
        let exclude = RowFilter::Exclude {
            column: "Vendedor",
            value: "99 - SERVICIOS",
        };
        assert!(!exclude.keeps(&Cell::text("99 - SERVICIOS")));
        assert!(exclude.keeps(&Cell::text("12 - PEREZ")));

        let require = RowFilter::Require {
            column: "Estado",
            value: "A",
        };
        assert!(require.keeps(&Cell::text("A")));
        assert!(!require.keeps(&Cell::Empty));
    }

    #[test]
    fn corrections_match_exactly() {
        let corrections = ColumnCorrections {
            column: "Ciudad",
            table: &[("MOQITOS", "MONITOS")],
        };
        assert_eq!(corrections.lookup("MOQITOS"), Some("MONITOS"));
        assert_eq!(corrections.lookup("moqitos"), None);
    }

    #[test]
    fn period_is_inserted_at_position() {
        let mut rowset = table(&["Cliente", "Nombre"], vec![vec![Cell::text("1"), Cell::text("x")]]);
        DerivedRule::InsertPeriod {
            column: "Mes",
            position: 1,
        }
        .apply(&mut rowset, Some("Enero"));

        assert_eq!(rowset.columns(), &["Cliente", "Mes", "Nombre"]);
        assert_eq!(rowset.rows()[0][1], Cell::text("Enero"));
    }

    #[test]
    fn split_first_replaces_source_with_two_columns() {
        let mut rowset = table(
            &["Vendedor", "Ciudad"],
            vec![
                vec![Cell::text("12 - PEREZ - ANA"), Cell::text("x")],
                vec![Cell::text("SIN CODIGO"), Cell::text("y")],
            ],
        );
        DerivedRule::SplitFirst {
            source: "Vendedor",
            delimiter: '-',
            left: "Cod. Asesor",
            right: "Asesor",
        }
        .apply(&mut rowset, None);

        assert_eq!(rowset.columns(), &["Ciudad", "Cod. Asesor", "Asesor"]);
        assert_eq!(rowset.rows()[0][1..], [Cell::text("12"), Cell::text("PEREZ - ANA")]);
        assert_eq!(rowset.rows()[1][1..], [Cell::text("SIN CODIGO"), Cell::Empty]);
    }

    #[test]
    fn keep_after_first_leaves_unsplittable_values() {
        let mut rowset = table(
            &["Ciudad"],
            vec![vec![Cell::text("05001-MEDELLIN")], vec![Cell::text("CALI")]],
        );
        DerivedRule::KeepAfterFirst {
            column: "Ciudad",
            delimiter: '-',
        }
        .apply(&mut rowset, None);
        assert_eq!(
            rowset.column_values("Ciudad"),
            Some(vec!["MEDELLIN".to_owned(), "CALI".to_owned()])
        );
    }

    #[test]
    fn scaled_decimal_uses_comma_separator() {
        let mut rowset = table(
            &["Venta - IVA"],
            vec![
                vec![Cell::Number(1512600.0)],
                vec![Cell::text("1512650")],
                vec![Cell::text("n/a")],
            ],
        );
        DerivedRule::ScaledDecimal {
            column: "Venta - IVA",
            divisor: 100.0,
            decimals: 2,
            decimal_separator: ',',
        }
        .apply(&mut rowset, None);
        assert_eq!(
            rowset.column_values("Venta - IVA"),
            Some(vec!["15126,00".to_owned(), "15126,50".to_owned(), String::new()])
        );
    }

    #[test]
    fn integer_text_strips_trailing_zero_fraction_only() {
        let mut rowset = table(
            &["Cod. Cliente"],
            vec![
                vec![Cell::text("1234.0")],
                vec![Cell::Number(99.0)],
                vec![Cell::text("10.05")],
            ],
        );
        DerivedRule::IntegerText {
            column: "Cod. Cliente",
        }
        .apply(&mut rowset, None);
        assert_eq!(
            rowset.column_values("Cod. Cliente"),
            Some(vec!["1234".to_owned(), "99".to_owned(), "10.05".to_owned()])
        );
    }

    #[test]
    fn classify_honours_overrides() {
        let mut rowset = table(
            &["Tipo"],
            vec![
                vec![Cell::text("NEVERA VERTICAL")],
                vec![Cell::text("40089142-MUEBLE SNACKERO PISO CON NEVERA")],
                vec![Cell::text("MUEBLE")],
            ],
        );
        DerivedRule::Classify {
            source: "Tipo",
            target: "Categoria",
            needle: "NEVERA",
            matched: "Nevera",
            otherwise: "Snackero",
            overrides: &["40089142-MUEBLE SNACKERO PISO CON NEVERA"],
        }
        .apply(&mut rowset, None);
        assert_eq!(
            rowset.column_values("Categoria"),
            Some(vec!["Nevera".to_owned(), "Snackero".to_owned(), "Snackero".to_owned()])
        );
    }

    #[test]
    fn strip_chars_removes_every_occurrence() {
        let mut rowset = table(&["Num. Comodato"], vec![vec![Cell::text("12;34;")]]);
        DerivedRule::StripChars {
            column: "Num. Comodato",
            chars: &[';'],
        }
        .apply(&mut rowset, None);
        assert_eq!(rowset.rows()[0][0], Cell::text("1234"));
    }

    #[test]
    fn dates_are_rendered_day_first() {
        let mut rowset = table(
            &["Fecha"],
            vec![
                vec![Cell::text("2024-03-05")],
                vec![Cell::text("05/03/2024")],
                vec![Cell::text("2024-03-05 10:30:00")],
                vec![Cell::text("pendiente")],
            ],
        );
        DerivedRule::DayMonthYear { column: "Fecha" }.apply(&mut rowset, None);
        assert_eq!(
            rowset.column_values("Fecha"),
            Some(vec![
                "05-03-2024".to_owned(),
                "05-03-2024".to_owned(),
                "05-03-2024".to_owned(),
                String::new(),
            ])
        );
        assert_eq!(parse_date(""), None);
        assert_eq!(
            parse_date("2024/12/31"),
            NaiveDate::from_ymd_opt(2024, 12, 31)
        );
    }
}
