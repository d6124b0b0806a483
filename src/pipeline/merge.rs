use crate::diagnostics::{Diagnostic, DiagnosticCode};
use crate::document::{Cell, Rowset};
use crate::error::PipelineError;
use serde::Serialize;

/// Result of replacing one period in a cumulative dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    pub rowset: Rowset,
    pub stats: MergeStats,
    pub warnings: Vec<Diagnostic>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeStats {
    /// Period value that was replaced, if the incoming rowset had any rows.
    pub period: Option<String>,
    pub distinct_periods: usize,
    pub replaced_rows: usize,
    pub added_rows: usize,
}

/// Replace the incoming period's rows in `cumulative` and sort by period.
///
/// Only the first period value found in `incoming` is removed from the cumulative
/// side; more than one distinct value is reported as ambiguous. Columns present on
/// only one side are kept, with cumulative order first.
pub fn merge_periods(
    cumulative: &Rowset,
    incoming: &Rowset,
    period_column: &str,
) -> Result<MergeOutcome, PipelineError> {
    let cumulative_period =
        cumulative
            .column_index(period_column)
            .ok_or_else(|| PipelineError::MissingPeriodColumn {
                column: period_column.to_owned(),
                side: "cumulative".to_owned(),
            })?;
    let incoming_period =
        incoming
            .column_index(period_column)
            .ok_or_else(|| PipelineError::MissingPeriodColumn {
                column: period_column.to_owned(),
                side: "period".to_owned(),
            })?;

    let mut warnings = Vec::new();
    let mut distinct: Vec<String> = Vec::new();
    for row in incoming.rows() {
        let value = row[incoming_period].render();
        if !distinct.contains(&value) {
            distinct.push(value);
        }
    }

    let period = distinct.first().cloned();
    match distinct.len() {
        0 => Diagnostic::new(
            DiagnosticCode::EmptyPeriod,
            "incoming rowset has no rows; the cumulative data is unchanged",
        )
        .emit(&mut warnings),
        1 => {}
        many => Diagnostic::new(
            DiagnosticCode::AmbiguousPeriod,
            format!(
                "incoming rowset holds {many} distinct '{period_column}' values ({}); only '{}' is replaced",
                distinct.join(", "),
                distinct[0]
            ),
        )
        .emit(&mut warnings),
    }

    let mut columns = cumulative.columns().to_vec();
    for column in incoming.columns() {
        if !columns.contains(column) {
            columns.push(column.clone());
        }
    }
    let cumulative_map: Vec<Option<usize>> =
        columns.iter().map(|name| cumulative.column_index(name)).collect();
    let incoming_map: Vec<Option<usize>> =
        columns.iter().map(|name| incoming.column_index(name)).collect();

    let mut rows: Vec<Vec<Cell>> = Vec::with_capacity(cumulative.row_count() + incoming.row_count());
    let mut replaced_rows = 0;
    for row in cumulative.rows() {
        if period
            .as_deref()
            .is_some_and(|period| row[cumulative_period].render() == period)
        {
            replaced_rows += 1;
            continue;
        }
        rows.push(project(row, &cumulative_map));
    }
    rows.extend(incoming.rows().iter().map(|row| project(row, &incoming_map)));

    let sort_index = cumulative_period;
    rows.sort_by_cached_key(|row| row[sort_index].render());

    let stats = MergeStats {
        period,
        distinct_periods: distinct.len(),
        replaced_rows,
        added_rows: incoming.row_count(),
    };
    tracing::info!(
        period = stats.period.as_deref().unwrap_or(""),
        replaced = stats.replaced_rows,
        added = stats.added_rows,
        total = rows.len(),
        "merged period"
    );

    Ok(MergeOutcome {
        rowset: Rowset { columns, rows },
        stats,
        warnings,
    })
}

fn project(row: &[Cell], map: &[Option<usize>]) -> Vec<Cell> {
    map.iter()
        .map(|index| index.map(|index| row[index].clone()).unwrap_or_default())
        .collect()
}
