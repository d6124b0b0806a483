#![forbid(unsafe_code)]

pub mod cache;
pub mod cli;
pub mod config;
pub mod diagnostics;
pub mod document;
pub mod error;
pub mod logging;
pub mod normalize;
pub mod output;
pub mod pipeline;
pub mod refusal;
pub mod schema;

use cache::{DirCache, Principal};
use cli::{Cli, Command, Outcome};
use config::Config;
use error::PipelineError;
use pipeline::{BatchJob, Pipeline, RunReport, Upload};
use refusal::{RefusalEnvelope, envelope_for_error};
use schema::DocumentType;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Run the tabnorm CLI. Returns an exit code (0, 1, or 2).
pub fn run() -> u8 {
    use clap::Parser;

    // Parse CLI args (handles --version and --help via clap, then exits)
    let cli = Cli::parse();
    logging::init(cli.verbose);

    if matches!(cli.command, Command::Describe) {
        return handle_describe();
    }

    let mut config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(error) => return refuse(&error),
    };
    if let Some(dir) = cli.cache_dir.clone() {
        config.cache_dir = dir;
    }

    let principal = cli
        .principal
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(Principal::new)
        .unwrap_or_else(|| config::principal_from_env(|key| std::env::var(key).ok()));

    tracing::debug!(cache_dir = %config.cache_dir.display(), %principal, "configuration loaded");
    let cache = Arc::new(DirCache::new(config.cache_dir.clone()));
    let pipeline = Pipeline::new(cache, &config);

    let outcome = match cli.command {
        Command::Normalize {
            doc_type,
            period,
            file,
        } => handle_normalize(&pipeline, &principal, doc_type, period.as_deref(), &file),
        Command::Merge { cumulative, period } => {
            handle_merge(&pipeline, &principal, &cumulative, &period)
        }
        Command::Download { out } => handle_download(&pipeline, &principal, out.as_deref()),
        Command::Status => handle_status(&pipeline, &principal),
        Command::Batch { jobs, manifest } => {
            handle_batch(&pipeline, &principal, jobs, manifest.as_deref())
        }
        Command::Describe => return handle_describe(),
    };
    outcome.exit_code()
}

fn handle_normalize(
    pipeline: &Pipeline,
    principal: &Principal,
    document: DocumentType,
    period: Option<&str>,
    file: &Path,
) -> Outcome {
    let result = Upload::from_path(file)
        .and_then(|upload| pipeline.normalize(principal, &upload, document, period));
    report_or_refuse(result)
}

fn handle_merge(
    pipeline: &Pipeline,
    principal: &Principal,
    cumulative: &Path,
    period: &Path,
) -> Outcome {
    let result = Upload::from_path(cumulative).and_then(|cumulative| {
        let period = Upload::from_path(period)?;
        pipeline.merge(principal, &cumulative, &period)
    });
    report_or_refuse(result)
}

fn report_or_refuse(result: Result<RunReport, PipelineError>) -> Outcome {
    match result {
        Ok(report) => {
            let mut stdout = std::io::stdout();
            match output::jsonl::write_line(&mut stdout, &report) {
                Ok(()) => Outcome::Success,
                Err(error) => {
                    eprintln!("Error writing output: {error}");
                    Outcome::Refusal
                }
            }
        }
        Err(error) => {
            output_refusal_envelope(&envelope_for_error(&error));
            Outcome::Refusal
        }
    }
}

/// Handle `download`: write the cached bytes to `out` or stdout.
fn handle_download(pipeline: &Pipeline, principal: &Principal, out: Option<&Path>) -> Outcome {
    let entry = match pipeline.download(principal) {
        Ok(Some(entry)) => entry,
        Ok(None) => {
            eprintln!("nothing to download yet for principal '{principal}'");
            return Outcome::Partial;
        }
        Err(error) => {
            output_refusal_envelope(&envelope_for_error(&error));
            return Outcome::Refusal;
        }
    };

    let written = match out {
        Some(path) => std::fs::write(path, &entry.bytes)
            .map_err(|error| format!("failed to write '{}': {error}", path.display())),
        None => {
            let mut stdout = std::io::stdout();
            stdout
                .write_all(&entry.bytes)
                .and_then(|()| stdout.flush())
                .map_err(|error| format!("failed to write artifact: {error}"))
        }
    };

    match written {
        Ok(()) => {
            tracing::info!(artifact = %entry.metadata.name, size = entry.metadata.size, "downloaded");
            Outcome::Success
        }
        Err(message) => {
            output_refusal_envelope(&envelope_for_error(&PipelineError::Io(message)));
            Outcome::Refusal
        }
    }
}

/// Handle `status`: print the cached entry's metadata without its bytes.
fn handle_status(pipeline: &Pipeline, principal: &Principal) -> Outcome {
    match pipeline.download(principal) {
        Ok(Some(entry)) => {
            let status = serde_json::json!({
                "version": refusal::codes::ENVELOPE_VERSION,
                "outcome": "CACHED",
                "principal": principal,
                "entry": entry.metadata,
            });
            let mut stdout = std::io::stdout();
            match output::jsonl::write_line(&mut stdout, &status) {
                Ok(()) => Outcome::Success,
                Err(error) => {
                    eprintln!("Error writing output: {error}");
                    Outcome::Refusal
                }
            }
        }
        Ok(None) => {
            eprintln!("nothing to download yet for principal '{principal}'");
            Outcome::Partial
        }
        Err(error) => {
            output_refusal_envelope(&envelope_for_error(&error));
            Outcome::Refusal
        }
    }
}

/// Handle `batch`: run manifest jobs concurrently, one output line per job in input order.
fn handle_batch(
    pipeline: &Pipeline,
    principal: &Principal,
    jobs: Option<usize>,
    manifest: Option<&Path>,
) -> Outcome {
    let parsed = match read_manifest(manifest) {
        Ok(parsed) => parsed,
        Err(message) => {
            output_refusal_envelope(&envelope_for_error(&PipelineError::Io(message)));
            return Outcome::Refusal;
        }
    };

    let workers = jobs.unwrap_or_else(pipeline::parallel::default_jobs);
    tracing::info!(jobs = parsed.len(), workers, "running batch");
    let results = pipeline::parallel::process_parallel_with(parsed, workers, |job: BatchJob| {
        pipeline.run_job(&job, principal)
    });

    let mut outcome = Outcome::Success;
    let mut lines = Vec::with_capacity(results.len());
    for result in results {
        let line = match result {
            Ok(report) => serde_json::to_value(&report),
            Err(error) => {
                outcome = Outcome::Partial;
                serde_json::to_value(envelope_for_error(&error))
            }
        };
        match line {
            Ok(value) => lines.push(value),
            Err(error) => {
                eprintln!("Error serializing batch result: {error}");
                return Outcome::Refusal;
            }
        }
    }

    let mut stdout = std::io::stdout();
    if let Err(error) = output::jsonl::write_jsonl(&mut stdout, &lines) {
        eprintln!("Error writing output: {error}");
        return Outcome::Refusal;
    }
    outcome
}

fn read_manifest(manifest: Option<&Path>) -> Result<Vec<BatchJob>, String> {
    let (mut reader, base): (Box<dyn BufRead>, PathBuf) = match manifest {
        Some(path) => {
            let file = std::fs::File::open(path)
                .map_err(|error| format!("failed to open manifest '{}': {error}", path.display()))?;
            let base = path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default();
            (Box::new(BufReader::new(file)), base)
        }
        None => (Box::new(BufReader::new(std::io::stdin())), PathBuf::new()),
    };

    let jobs = pipeline::read_jobs(&mut reader)?;
    Ok(jobs
        .into_iter()
        .map(|job| job.resolve_paths(&base))
        .collect())
}

/// Handle `describe`: print operator.json and exit.
fn handle_describe() -> u8 {
    let documents: Vec<serde_json::Value> = [
        DocumentType::Customers,
        DocumentType::SalesByMaterial,
        DocumentType::Displays,
        DocumentType::SalesUnion,
    ]
    .into_iter()
    .map(|document| {
        let schema = document.schema();
        serde_json::json!({
            "document_type": document,
            "required_columns": schema.required,
            "period_column": schema.period_column,
            "output": {
                "file_name": schema.output.file_name,
                "delimiter": char::from(schema.output.delimiter).to_string(),
                "byte_order_mark": schema.output.byte_order_mark,
            },
        })
    })
    .collect();

    let operator = serde_json::json!({
        "name": "tabnorm",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Sniff, extract, clean and reshape uploaded spreadsheets into canonical CSV artifacts",
        "author": "CMD+RVL",
        "input_formats": ["xlsx", "xls", "html", "csv", "txt"],
        "output_format": "CSV",
        "report_format": "JSONL",
        "stdin_support": true,
        "file_support": true,
        "document_types": documents,
        "exit_codes": { "0": "success", "1": "nothing cached or partial batch", "2": "refusal" },
    });

    if let Ok(json) = serde_json::to_string_pretty(&operator) {
        println!("{}", json);
        Outcome::Success.exit_code()
    } else {
        eprintln!("Error: Failed to serialize operator metadata");
        Outcome::Refusal.exit_code()
    }
}

fn refuse(error: &PipelineError) -> u8 {
    output_refusal_envelope(&envelope_for_error(error));
    Outcome::Refusal.exit_code()
}

/// Output a refusal envelope to stdout.
fn output_refusal_envelope(envelope: &RefusalEnvelope) {
    match serde_json::to_string(envelope) {
        Ok(json) => println!("{}", json),
        Err(error) => eprintln!("Error: Failed to serialize refusal envelope: {error}"),
    }
}
