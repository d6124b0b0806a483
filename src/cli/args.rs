use crate::schema::DocumentType;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "tabnorm", version)]
pub struct Cli {
    /// YAML config file (default: $TABNORM_CONFIG)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Result cache directory (overrides config and $TABNORM_CACHE_DIR)
    #[arg(long, global = true, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Principal the cached artifact belongs to (default: $TABNORM_PRINCIPAL, then $USER)
    #[arg(long, global = true, value_name = "ID")]
    pub principal: Option<String>,

    /// Log pipeline stages to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Clean and reshape one uploaded sheet, then cache the result
    Normalize {
        /// Document type the sheet holds
        #[arg(long = "doc-type", value_enum)]
        doc_type: DocumentType,

        /// Period label stamped on sales rows (e.g. "Enero")
        #[arg(long)]
        period: Option<String>,

        file: PathBuf,
    },
    /// Replace one period inside a cumulative sales sheet and cache the union
    Merge {
        cumulative: PathBuf,
        period: PathBuf,
    },
    /// Write the cached artifact to a file (default: stdout)
    Download {
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Show metadata of the cached artifact
    Status,
    /// Run a JSONL manifest of jobs concurrently
    Batch {
        /// Number of parallel workers (default: CPU count)
        #[arg(long)]
        jobs: Option<usize>,

        /// JSONL manifest file (default: stdin)
        #[arg(value_name = "MANIFEST")]
        manifest: Option<PathBuf>,
    },
    /// Print operator.json and exit
    Describe,
}
