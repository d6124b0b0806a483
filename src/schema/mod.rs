pub mod builtin;
pub mod rules;

pub use rules::{
    ColumnCorrections, ColumnSelection, CorrectionTable, DerivedRule, MissingColumnPolicy,
    RowFilter,
};

use crate::diagnostics::{Diagnostic, DiagnosticCode};
use crate::document::{Cell, Rowset};
use crate::error::PipelineError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// The closed set of business schemas.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum DocumentType {
    Customers,
    SalesByMaterial,
    Displays,
    /// Cumulative sales built by merging monthly sales files; never normalized directly.
    #[value(skip)]
    SalesUnion,
}

impl DocumentType {
    pub fn as_str(self) -> &'static str {
        match self {
            DocumentType::Customers => "customers",
            DocumentType::SalesByMaterial => "sales-by-material",
            DocumentType::Displays => "displays",
            DocumentType::SalesUnion => "sales-union",
        }
    }

    pub fn schema(self) -> &'static DocumentSchema {
        match self {
            DocumentType::Customers => &builtin::CUSTOMERS,
            DocumentType::SalesByMaterial => &builtin::SALES_BY_MATERIAL,
            DocumentType::Displays => &builtin::DISPLAYS,
            DocumentType::SalesUnion => &builtin::SALES_UNION,
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the canonical artifact is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputSpec {
    pub file_name: &'static str,
    pub delimiter: u8,
    pub byte_order_mark: bool,
}

/// Static rule set for one document type.
#[derive(Debug, Clone, Copy)]
pub struct DocumentSchema {
    pub document: DocumentType,
    /// Columns that must be present; with [`ColumnSelection::Required`] also the output order.
    pub required: &'static [&'static str],
    pub selection: ColumnSelection,
    pub missing: MissingColumnPolicy,
    /// Input aliases (alias, canonical) applied when the canonical name is absent.
    pub renames: &'static [(&'static str, &'static str)],
    pub filters: &'static [RowFilter],
    pub corrections: &'static [ColumnCorrections],
    pub derived: &'static [DerivedRule],
    /// Column whose first occurrence wins when rows repeat it.
    pub identity: Option<&'static str>,
    pub period_column: Option<&'static str>,
    pub output: OutputSpec,
}

/// Per-run inputs to a transform.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransformContext {
    /// Label written into the period column, when the document carries one.
    pub period: Option<String>,
    /// Treat tolerant document types as strict.
    pub strict_columns: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TransformStats {
    pub rows_in: usize,
    pub filtered_rows: usize,
    pub corrected_cells: usize,
    pub duplicate_rows: usize,
    pub filled_columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransformOutcome {
    pub rowset: Rowset,
    pub stats: TransformStats,
    pub warnings: Vec<Diagnostic>,
}

/// Run the document type's rules over a cleaned rowset.
pub fn transform(
    rowset: &Rowset,
    document: DocumentType,
    context: &TransformContext,
) -> Result<TransformOutcome, PipelineError> {
    document.schema().apply(rowset, context)
}

impl DocumentSchema {
    /// Select, filter, correct, derive, then de-duplicate. The input is left untouched.
    pub fn apply(
        &self,
        rowset: &Rowset,
        context: &TransformContext,
    ) -> Result<TransformOutcome, PipelineError> {
        let mut warnings = Vec::new();
        let mut stats = TransformStats {
            rows_in: rowset.row_count(),
            ..TransformStats::default()
        };

        let mut table = self.select_columns(rowset, context, &mut stats)?;
        if !stats.filled_columns.is_empty() {
            Diagnostic::new(
                DiagnosticCode::ColumnsFilled,
                format!(
                    "{} is missing {}; filled with empty values",
                    self.document,
                    stats.filled_columns.join(", ")
                ),
            )
            .emit(&mut warnings);
        }

        for filter in self.filters {
            if let Some(index) = table.column_index(filter.column()) {
                let before = table.rows.len();
                table.rows.retain(|row| filter.keeps(&row[index]));
                stats.filtered_rows += before - table.rows.len();
            }
        }

        for corrections in self.corrections {
            let Some(index) = table.column_index(corrections.column) else {
                continue;
            };
            for row in &mut table.rows {
                if let Some(fixed) = corrections.lookup(&row[index].render()) {
                    row[index] = Cell::text(fixed);
                    stats.corrected_cells += 1;
                }
            }
        }

        let inserts_period = self
            .derived
            .iter()
            .any(|rule| matches!(rule, DerivedRule::InsertPeriod { .. }));
        let period = context
            .period
            .as_deref()
            .map(str::trim)
            .filter(|period| !period.is_empty());
        if inserts_period && period.is_none() {
            Diagnostic::new(
                DiagnosticCode::PeriodMissing,
                format!("no period label supplied for {}; the column is left empty", self.document),
            )
            .emit(&mut warnings);
        }
        for rule in self.derived {
            rule.apply(&mut table, period);
        }

        if let Some(identity) = self.identity
            && let Some(index) = table.column_index(identity)
        {
            let mut seen = HashSet::with_capacity(table.rows.len());
            let before = table.rows.len();
            table.rows.retain(|row| seen.insert(row[index].render()));
            stats.duplicate_rows = before - table.rows.len();
        }

        tracing::info!(
            document = %self.document,
            rows_in = stats.rows_in,
            rows_out = table.row_count(),
            filtered = stats.filtered_rows,
            corrected = stats.corrected_cells,
            duplicates = stats.duplicate_rows,
            "transformed rowset"
        );

        Ok(TransformOutcome {
            rowset: table,
            stats,
            warnings,
        })
    }

    fn select_columns(
        &self,
        rowset: &Rowset,
        context: &TransformContext,
        stats: &mut TransformStats,
    ) -> Result<Rowset, PipelineError> {
        let mut columns = rowset.columns().to_vec();
        for (alias, canonical) in self.renames {
            if !rowset.has_column(canonical)
                && let Some(index) = rowset.column_index(alias)
            {
                columns[index] = (*canonical).to_owned();
            }
        }

        let missing: Vec<String> = self
            .required
            .iter()
            .filter(|name| !columns.iter().any(|column| column.as_str() == **name))
            .map(|name| (*name).to_owned())
            .collect();

        let reject = self.missing == MissingColumnPolicy::Reject || context.strict_columns;
        if !missing.is_empty() && reject {
            return Err(PipelineError::MissingColumns {
                document: self.document,
                missing,
            });
        }
        stats.filled_columns = missing;

        let renamed = Rowset {
            columns,
            rows: rowset.rows().to_vec(),
        };
        if self.selection == ColumnSelection::All {
            return Ok(renamed);
        }

        let picks: Vec<Option<usize>> = self
            .required
            .iter()
            .map(|name| renamed.column_index(name))
            .collect();
        let rows = renamed
            .rows
            .iter()
            .map(|row| {
                picks
                    .iter()
                    .map(|pick| pick.map(|index| row[index].clone()).unwrap_or_default())
                    .collect()
            })
            .collect();

        Ok(Rowset {
            columns: self.required.iter().map(|name| (*name).to_owned()).collect(),
            rows,
        })
    }
}
