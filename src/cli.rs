use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "icd10-index",
    version,
    about = "ICD-10-CM alphabetic index extraction and upload tooling"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Dump raw page text and table candidates from a PDF.
    Inspect(InspectArgs),
    /// Extract index entries from the alphabetic index PDF into a CSV file.
    Extract(ExtractArgs),
    /// Upload an extracted CSV to the hosted table store in batches.
    Upload(UploadArgs),
    /// Summarize the most recent extract and upload runs.
    Status(StatusArgs),
}

#[derive(Args, Debug, Clone)]
pub struct InspectArgs {
    #[arg(long)]
    pub pdf_path: PathBuf,

    #[arg(long, default_value_t = 5)]
    pub pages: usize,

    #[arg(long, default_value_t = 30)]
    pub lines: usize,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ExtractArgs {
    #[arg(long)]
    pub pdf_path: PathBuf,

    #[arg(long, default_value = "data/alphabetic_index.csv")]
    pub output_csv: PathBuf,

    #[arg(long, default_value = ".cache/icd10-index")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub manifest_path: Option<PathBuf>,

    #[arg(long)]
    pub max_pages: Option<usize>,

    #[arg(long, default_value = "ICD-10-CM")]
    pub header_marker: String,
}

#[derive(Args, Debug, Clone)]
pub struct UploadArgs {
    #[arg(long, default_value = "data/alphabetic_index.csv")]
    pub input_csv: PathBuf,

    #[arg(long, default_value = "alphabetical_index")]
    pub table: String,

    #[arg(long, default_value_t = 1000)]
    pub batch_size: usize,

    #[arg(long, default_value = ".")]
    pub env_dir: PathBuf,

    /// Load into a local SQLite database instead of the hosted store.
    #[arg(long)]
    pub sqlite_path: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub skip_verify: bool,

    #[arg(long, default_value_t = 30)]
    pub timeout_secs: u64,

    #[arg(long, default_value = ".cache/icd10-index")]
    pub cache_root: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[arg(long, default_value = ".cache/icd10-index")]
    pub cache_root: PathBuf,
}
