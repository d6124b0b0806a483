use crate::cache::{CacheEntry, EntryMetadata, Principal, ResultCache};
use crate::error::PipelineError;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;

const ENTRY_EXTENSION: &str = "entry";

/// Filesystem cache: one file per principal holding a JSON metadata line followed by
/// the artifact bytes.
///
/// Entries are written to a temporary file in the same directory and renamed over
/// the previous one, so a reader sees either the old file or the new one.
#[derive(Debug, Clone)]
pub struct DirCache {
    root: PathBuf,
}

impl DirCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Entry file for `principal`. The id is hashed so any string is a safe file name.
    pub fn entry_path(&self, principal: &Principal) -> PathBuf {
        let key = blake3::hash(principal.as_str().as_bytes()).to_hex();
        self.root.join(format!("{key}.{ENTRY_EXTENSION}"))
    }
}

impl ResultCache for DirCache {
    fn put(
        &self,
        principal: &Principal,
        name: &str,
        bytes: Vec<u8>,
    ) -> Result<Arc<CacheEntry>, PipelineError> {
        fs::create_dir_all(&self.root).map_err(|error| {
            PipelineError::Cache(format!(
                "failed to create cache directory '{}': {error}",
                self.root.display()
            ))
        })?;

        let entry = CacheEntry::new(name, bytes);
        let header = serde_json::to_vec(&entry.metadata).map_err(|error| {
            PipelineError::Cache(format!("failed to serialize cache metadata: {error}"))
        })?;

        let path = self.entry_path(principal);
        let mut staged = NamedTempFile::new_in(&self.root).map_err(|error| {
            PipelineError::Cache(format!(
                "failed to stage cache entry in '{}': {error}",
                self.root.display()
            ))
        })?;
        staged
            .write_all(&header)
            .and_then(|()| staged.write_all(b"\n"))
            .and_then(|()| staged.write_all(&entry.bytes))
            .and_then(|()| staged.as_file().sync_all())
            .map_err(|error| {
                PipelineError::Cache(format!("failed to write cache entry: {error}"))
            })?;
        staged.persist(&path).map_err(|error| {
            PipelineError::Cache(format!(
                "failed to replace cache entry '{}': {}",
                path.display(),
                error.error
            ))
        })?;

        tracing::debug!(
            %principal,
            name,
            size = entry.metadata.size,
            path = %path.display(),
            "cached result on disk"
        );
        Ok(Arc::new(entry))
    }

    fn get(&self, principal: &Principal) -> Result<Option<Arc<CacheEntry>>, PipelineError> {
        let path = self.entry_path(principal);
        let raw = match fs::read(&path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(None),
            Err(error) => {
                return Err(PipelineError::Cache(format!(
                    "failed to read cache entry '{}': {error}",
                    path.display()
                )));
            }
        };

        let entry = parse_entry(&raw).map_err(|reason| {
            PipelineError::Cache(format!("corrupt cache entry '{}': {reason}", path.display()))
        })?;
        Ok(Some(Arc::new(entry)))
    }
}

fn parse_entry(raw: &[u8]) -> Result<CacheEntry, String> {
    let split = raw
        .iter()
        .position(|byte| *byte == b'\n')
        .ok_or_else(|| "missing metadata line".to_owned())?;
    let metadata: EntryMetadata = serde_json::from_slice(&raw[..split])
        .map_err(|error| format!("invalid metadata: {error}"))?;
    let entry = CacheEntry {
        metadata,
        bytes: raw[split + 1..].to_vec(),
    };

    if !entry.is_consistent() {
        return Err(format!(
            "metadata declares {} bytes ({}) but the entry holds {} bytes",
            entry.metadata.size,
            entry.metadata.content_hash,
            entry.bytes.len()
        ));
    }
    Ok(entry)
}
