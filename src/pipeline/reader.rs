use crate::cache::Principal;
use crate::schema::DocumentType;
use serde::Deserialize;
use std::io::BufRead;
use std::path::PathBuf;

/// One line of a batch manifest.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum BatchJob {
    Normalize {
        #[serde(default)]
        principal: Option<Principal>,
        document_type: DocumentType,
        file: PathBuf,
        #[serde(default)]
        period: Option<String>,
    },
    Merge {
        #[serde(default)]
        principal: Option<Principal>,
        cumulative: PathBuf,
        file: PathBuf,
    },
}

impl BatchJob {
    pub fn principal(&self) -> Option<&Principal> {
        match self {
            BatchJob::Normalize { principal, .. } | BatchJob::Merge { principal, .. } => {
                principal.as_ref()
            }
        }
    }

    /// Relative paths are resolved against `base` (the manifest's directory).
    pub fn resolve_paths(mut self, base: &std::path::Path) -> Self {
        let resolve = |path: &mut PathBuf| {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        };
        match &mut self {
            BatchJob::Normalize { file, .. } => resolve(file),
            BatchJob::Merge {
                cumulative, file, ..
            } => {
                resolve(cumulative);
                resolve(file);
            }
        }
        self
    }
}

/// Read a JSONL manifest; blank lines are skipped, any invalid line fails the whole read.
pub fn read_jobs(input: &mut dyn BufRead) -> Result<Vec<BatchJob>, String> {
    let mut jobs = Vec::new();
    for (index, line) in input.lines().enumerate() {
        let line_number = index + 1;
        let line =
            line.map_err(|error| format!("failed to read manifest line {line_number}: {error}"))?;
        if line.trim().is_empty() {
            continue;
        }

        let job: BatchJob = serde_json::from_str(&line)
            .map_err(|error| format!("invalid manifest line {line_number}: {error}"))?;
        jobs.push(job);
    }
    Ok(jobs)
}
