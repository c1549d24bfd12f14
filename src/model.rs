use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    Code,
    CodeWithSee,
    CodeWithSeeAlso,
    See,
    SeeAlso,
}

impl EntryType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Code => "code",
            Self::CodeWithSee => "code_with_see",
            Self::CodeWithSeeAlso => "code_with_see_also",
            Self::See => "see",
            Self::SeeAlso => "see_also",
        }
    }
}

/// One row of the alphabetic index. Field order is the CSV column order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub term: String,
    pub code: Option<String>,
    pub reference: Option<String>,
    pub see_also: Option<String>,
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    pub indent_level: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolVersions {
    pub pdftotext: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDocument {
    pub path: String,
    pub sha256: String,
    pub page_count: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractCounts {
    pub pages_total: usize,
    pub empty_pages: usize,
    pub lines_seen: usize,
    pub lines_skipped: usize,
    pub lines_unmatched: usize,
    pub entries_total: usize,
    pub entries_with_code: usize,
    pub entries_by_type: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractRunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub status: String,
    pub started_at: String,
    pub updated_at: String,
    pub command: String,
    pub tool_versions: ToolVersions,
    pub source: SourceDocument,
    pub output_csv: Option<String>,
    pub counts: ExtractCounts,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadTarget {
    pub kind: String,
    pub location: String,
    pub table: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedBatch {
    pub batch: usize,
    pub records: usize,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadRunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub started_at: String,
    pub updated_at: String,
    pub input_csv: String,
    pub target: UploadTarget,
    pub batch_size: usize,
    pub records_total: usize,
    pub batches_total: usize,
    pub batches_succeeded: usize,
    pub records_uploaded: usize,
    pub failed_batches: Vec<FailedBatch>,
    pub verified_row_count: Option<i64>,
    pub verification_error: Option<String>,
}
