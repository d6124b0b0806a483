use crate::cache::{CacheEntry, Principal, ResultCache};
use crate::config::Config;
use crate::diagnostics::{Diagnostic, DiagnosticCode};
use crate::document::{
    ExtractedDocument, FormatVerdict, ReadOptions, Rowset, TextEncoding, extract_document,
};
use crate::error::PipelineError;
use crate::normalize::normalize_with_stats;
use crate::output::csv::write_delimited;
use crate::pipeline::merge::{MergeStats, merge_periods};
use crate::pipeline::reader::BatchJob;
use crate::refusal::codes::ENVELOPE_VERSION;
use crate::schema::builtin::PERIOD_COLUMN;
use crate::schema::{
    DocumentSchema, DocumentType, MissingColumnPolicy, TransformContext, TransformStats,
};
use serde::Serialize;
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// One uploaded file: declared name plus raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    /// Read a file from disk; the declared name is its file name.
    pub fn from_path(path: &Path) -> Result<Self, PipelineError> {
        let bytes = fs::read(path).map_err(|error| {
            PipelineError::Io(format!("failed to read '{}': {error}", path.display()))
        })?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self { name, bytes })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Normalize,
    Merge,
}

/// How one input was read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InputReport {
    pub file: String,
    pub format: FormatVerdict,
    pub encoding: Option<TextEncoding>,
    pub delimiter: Option<String>,
    pub rows_extracted: usize,
    pub rows_normalized: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactReport {
    pub name: String,
    pub size: u64,
    pub content_hash: String,
    pub rows: usize,
    pub columns: usize,
}

/// Summary printed after a successful operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub version: String,
    pub outcome: String,
    pub operation: Operation,
    pub principal: Principal,
    pub document_type: DocumentType,
    pub artifact: ArtifactReport,
    pub inputs: Vec<InputReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transform: Option<TransformStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merge: Option<MergeStats>,
    pub warnings: Vec<Diagnostic>,
}

/// Composes sniffing, extraction, cleanup, schema rules, merging and caching.
pub struct Pipeline {
    cache: Arc<dyn ResultCache>,
    read: ReadOptions,
    strict_columns: bool,
}

struct LoadedInput {
    rowset: Rowset,
    report: InputReport,
    warnings: Vec<Diagnostic>,
}

impl Pipeline {
    pub fn new(cache: Arc<dyn ResultCache>, config: &Config) -> Self {
        Self {
            cache,
            read: config.read_options(),
            strict_columns: config.strict_columns,
        }
    }

    pub fn with_options(cache: Arc<dyn ResultCache>, read: ReadOptions, strict_columns: bool) -> Self {
        Self {
            cache,
            read,
            strict_columns,
        }
    }

    /// Sniff, extract, clean and transform one upload, then cache the artifact.
    pub fn normalize(
        &self,
        principal: &Principal,
        upload: &Upload,
        document: DocumentType,
        period: Option<&str>,
    ) -> Result<RunReport, PipelineError> {
        let schema = document.schema();
        let LoadedInput {
            rowset,
            report,
            mut warnings,
        } = self.load(upload)?;

        let context = TransformContext {
            period: period.map(str::to_owned),
            strict_columns: self.strict_columns,
        };
        let outcome = schema
            .apply(&rowset, &context)
            .map_err(|error| error.in_file(&upload.name))?;
        warnings.extend(
            outcome
                .warnings
                .into_iter()
                .map(|warning| warning.for_file(&upload.name)),
        );

        self.check_not_empty(schema, &outcome.rowset, &mut warnings)?;
        let entry = self.store(principal, schema, &outcome.rowset)?;

        Ok(self.report(
            Operation::Normalize,
            principal,
            schema,
            &entry,
            &outcome.rowset,
            vec![report],
            Some(outcome.stats),
            None,
            warnings,
        ))
    }

    /// Replace the period file's period inside the cumulative file and cache the union.
    pub fn merge(
        &self,
        principal: &Principal,
        cumulative: &Upload,
        period: &Upload,
    ) -> Result<RunReport, PipelineError> {
        let schema = DocumentType::SalesUnion.schema();
        let period_column = schema.period_column.unwrap_or(PERIOD_COLUMN);

        let base = self.load(cumulative)?;
        let incoming = self.load(period)?;
        let mut warnings = base.warnings;
        warnings.extend(incoming.warnings);

        let outcome =
            merge_periods(&base.rowset, &incoming.rowset, period_column).map_err(|error| {
                let blamed = match &error {
                    PipelineError::MissingPeriodColumn { side, .. } if side == "cumulative" => {
                        &cumulative.name
                    }
                    _ => &period.name,
                };
                error.in_file(blamed)
            })?;
        warnings.extend(outcome.warnings);

        self.check_not_empty(schema, &outcome.rowset, &mut warnings)?;
        let entry = self.store(principal, schema, &outcome.rowset)?;

        Ok(self.report(
            Operation::Merge,
            principal,
            schema,
            &entry,
            &outcome.rowset,
            vec![base.report, incoming.report],
            None,
            Some(outcome.stats),
            warnings,
        ))
    }

    /// Current cached artifact for `principal`, if any.
    pub fn download(&self, principal: &Principal) -> Result<Option<Arc<CacheEntry>>, PipelineError> {
        self.cache.get(principal)
    }

    /// Run one manifest job, reading its files from disk.
    pub fn run_job(&self, job: &BatchJob, default_principal: &Principal) -> Result<RunReport, PipelineError> {
        let principal = job.principal().cloned().unwrap_or_else(|| default_principal.clone());
        match job {
            BatchJob::Normalize {
                document_type,
                file,
                period,
                ..
            } => {
                let upload = Upload::from_path(file)?;
                self.normalize(&principal, &upload, *document_type, period.as_deref())
            }
            BatchJob::Merge {
                cumulative, file, ..
            } => {
                let cumulative = Upload::from_path(cumulative)?;
                let period = Upload::from_path(file)?;
                self.merge(&principal, &cumulative, &period)
            }
        }
    }

    fn load(&self, upload: &Upload) -> Result<LoadedInput, PipelineError> {
        let ExtractedDocument {
            name,
            verdict,
            encoding,
            delimiter,
            rowset,
            warnings,
        } = extract_document(&upload.bytes, &upload.name, &self.read)
            .map_err(|error| error.in_file(&upload.name))?;

        let (normalized, _) = normalize_with_stats(&rowset);
        let report = InputReport {
            file: name,
            format: verdict,
            encoding,
            delimiter: delimiter.map(|delimiter| char::from(delimiter).to_string()),
            rows_extracted: rowset.row_count(),
            rows_normalized: normalized.row_count(),
        };

        Ok(LoadedInput {
            rowset: normalized,
            report,
            warnings,
        })
    }

    /// Strict document types refuse an empty result; tolerant ones cache it with a warning.
    fn check_not_empty(
        &self,
        schema: &DocumentSchema,
        rowset: &Rowset,
        warnings: &mut Vec<Diagnostic>,
    ) -> Result<(), PipelineError> {
        if !rowset.is_empty() {
            return Ok(());
        }

        let tolerant = schema.missing == MissingColumnPolicy::FillEmpty && !self.strict_columns;
        if !tolerant {
            return Err(PipelineError::EmptyResult {
                document: schema.document,
            });
        }

        Diagnostic::new(
            DiagnosticCode::EmptyResult,
            format!("{} produced no rows; an empty artifact was cached", schema.document),
        )
        .emit(warnings);
        Ok(())
    }

    fn store(
        &self,
        principal: &Principal,
        schema: &DocumentSchema,
        rowset: &Rowset,
    ) -> Result<Arc<CacheEntry>, PipelineError> {
        let bytes = write_delimited(rowset, &schema.output).map_err(PipelineError::Io)?;
        self.cache.put(principal, schema.output.file_name, bytes)
    }

    #[allow(clippy::too_many_arguments)]
    fn report(
        &self,
        operation: Operation,
        principal: &Principal,
        schema: &DocumentSchema,
        entry: &CacheEntry,
        rowset: &Rowset,
        inputs: Vec<InputReport>,
        transform: Option<TransformStats>,
        merge: Option<MergeStats>,
        warnings: Vec<Diagnostic>,
    ) -> RunReport {
        tracing::info!(
            %principal,
            document = %schema.document,
            artifact = %entry.metadata.name,
            rows = rowset.row_count(),
            size = entry.metadata.size,
            warnings = warnings.len(),
            "cached result"
        );

        RunReport {
            version: ENVELOPE_VERSION.to_owned(),
            outcome: "CACHED".to_owned(),
            operation,
            principal: principal.clone(),
            document_type: schema.document,
            artifact: ArtifactReport {
                name: entry.metadata.name.clone(),
                size: entry.metadata.size,
                content_hash: entry.metadata.content_hash.clone(),
                rows: rowset.row_count(),
                columns: rowset.column_count(),
            },
            inputs,
            transform,
            merge,
            warnings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Operation, Pipeline, Upload};
    use crate::cache::{MemoryCache, Principal, ResultCache};
    use crate::diagnostics::DiagnosticCode;
    use crate::document::{FormatVerdict, ReadOptions};
    use crate::error::PipelineError;
    use crate::refusal::codes::RefusalCode;
    use crate::schema::DocumentType;
    use std::sync::Arc;

    fn pipeline() -> (Pipeline, Arc<MemoryCache>) {
        let cache = Arc::new(MemoryCache::new());
        let pipeline = Pipeline::with_options(cache.clone(), ReadOptions::default(), false);
        (pipeline, cache)
    }

    const DISPLAYS_HTML: &str = "<html><table>\
        <tr><td>Numero</td><td>Cod. Cliente</td><td>Num. Comodato</td><td>Estado</td><td>Tipo</td></tr>\
        <tr><td>Numero</td><td>Cod. Cliente</td><td>Num. Comodato</td><td>Estado</td><td>Tipo</td></tr>\
        <tr><td>10</td><td>500.0</td><td>C1;</td><td>A</td><td>NEVERA</td></tr>\
        </table></html>";

    #[test]
    fn normalize_caches_artifact_and_reports() {
        let (pipeline, cache) = pipeline();
        let ana = Principal::new("ana");
        let upload = Upload::new("exhibidores.xls", DISPLAYS_HTML.as_bytes().to_vec());

        let report = pipeline
            .normalize(&ana, &upload, DocumentType::Displays, None)
            .expect("normalize");

        assert_eq!(report.operation, Operation::Normalize);
        assert_eq!(report.artifact.name, "Exhibidores.csv");
        assert_eq!(report.artifact.rows, 1);
        assert_eq!(report.inputs[0].format, FormatVerdict::HtmlDisguisedSpreadsheet);
        assert_eq!(report.inputs[0].rows_extracted, 2);
        assert_eq!(report.inputs[0].rows_normalized, 1);
        assert!(
            report
                .warnings
                .iter()
                .any(|warning| warning.code == DiagnosticCode::ExtensionMismatch)
        );

        let entry = cache.get(&ana).expect("get").expect("cached");
        let text = String::from_utf8(entry.bytes.clone()).expect("utf-8");
        assert_eq!(
            text,
            "Numero,Cod. Cliente,Num. Comodato,Estado,Tipo,Categoria\n10,500,C1,A,NEVERA,Nevera\n"
        );
        assert_eq!(entry.metadata.content_hash, report.artifact.content_hash);
    }

    #[test]
    fn failure_leaves_previous_entry_untouched() {
        let (pipeline, cache) = pipeline();
        let ana = Principal::new("ana");
        pipeline
            .normalize(
                &ana,
                &Upload::new("exhibidores.xls", DISPLAYS_HTML.as_bytes().to_vec()),
                DocumentType::Displays,
                None,
            )
            .expect("first run");
        let before = cache.get(&ana).expect("get").expect("cached");

        let error = pipeline
            .normalize(
                &ana,
                &Upload::new("ventas.csv", b"Cliente,Mes\n1,Enero\n".to_vec()),
                DocumentType::SalesByMaterial,
                Some("Enero"),
            )
            .expect_err("missing sales columns");
        assert_eq!(error.code(), RefusalCode::MissingColumns);
        assert!(error.to_string().starts_with("ventas.csv: "));

        let after = cache.get(&ana).expect("get").expect("still cached");
        assert_eq!(before, after);
    }

    #[test]
    fn strict_empty_result_is_refused() {
        let (pipeline, cache) = pipeline();
        let ana = Principal::new("ana");
        let upload = Upload::new(
            "exhibidores.csv",
            b"Numero|Cod. Cliente|Num. Comodato|Estado|Tipo\n1|2|3|I|NEVERA\n".to_vec(),
        );

        let error = pipeline
            .normalize(&ana, &upload, DocumentType::Displays, None)
            .expect_err("all rows filtered");
        assert!(matches!(error, PipelineError::EmptyResult { .. }));
        assert!(cache.get(&ana).expect("get").is_none());
    }

    #[test]
    fn tolerant_empty_result_is_cached_with_warning() {
        let (pipeline, cache) = pipeline();
        let ana = Principal::new("ana");
        let upload = Upload::new("clientes.csv", b"Codigo Ecom,Ciudad\n,\n".to_vec());

        let report = pipeline
            .normalize(&ana, &upload, DocumentType::Customers, None)
            .expect("tolerant");
        assert_eq!(report.artifact.rows, 0);
        assert!(
            report
                .warnings
                .iter()
                .any(|warning| warning.code == DiagnosticCode::EmptyResult)
        );
        assert!(cache.get(&ana).expect("get").is_some());
    }

    #[test]
    fn merge_replaces_period_and_caches_union() {
        let (pipeline, cache) = pipeline();
        let ana = Principal::new("ana");
        let cumulative = Upload::new(
            "ventas_acum.csv",
            "\u{feff}Cliente,Mes\n1,Enero\n2,Febrero\n".as_bytes().to_vec(),
        );
        let period = Upload::new("ventas_mes.csv", b"Cliente,Mes\n3,Febrero\n".to_vec());

        let report = pipeline.merge(&ana, &cumulative, &period).expect("merge");
        assert_eq!(report.operation, Operation::Merge);
        assert_eq!(report.document_type, DocumentType::SalesUnion);
        assert_eq!(report.artifact.name, "ventas_acum.csv");

        let entry = cache.get(&ana).expect("get").expect("cached");
        assert_eq!(entry.bytes, "\u{feff}Cliente,Mes\n1,Enero\n3,Febrero\n".as_bytes());
    }

    #[test]
    fn merge_names_the_file_missing_the_period_column() {
        let (pipeline, _) = pipeline();
        let error = pipeline
            .merge(
                &Principal::new("ana"),
                &Upload::new("acum.csv", b"Cliente,Otro\n1,x\n".to_vec()),
                &Upload::new("mes.csv", b"Cliente,Mes\n1,Enero\n".to_vec()),
            )
            .expect_err("cumulative lacks Mes");
        assert_eq!(error.code(), RefusalCode::MissingPeriodColumn);
        assert!(error.to_string().starts_with("acum.csv: "));
    }
}
