use anyhow::Result;
use tracing::{info, warn};

use crate::cli::StatusArgs;
use crate::model::{ExtractRunManifest, UploadRunManifest};
use crate::util::{latest_manifest, read_json};

pub fn run(args: StatusArgs) -> Result<()> {
    let manifest_dir = args.cache_root.join("manifests");

    info!(cache_root = %args.cache_root.display(), "status requested");

    match latest_manifest(&manifest_dir, "extract_run_")? {
        Some(path) => {
            let manifest: ExtractRunManifest = read_json(&path)?;
            info!(
                path = %path.display(),
                run_id = %manifest.run_id,
                status = %manifest.status,
                updated_at = %manifest.updated_at,
                source = %manifest.source.path,
                source_sha256 = %manifest.source.sha256,
                pages = manifest.source.page_count,
                output_csv = %manifest.output_csv.clone().unwrap_or_default(),
                entries = manifest.counts.entries_total,
                with_code = manifest.counts.entries_with_code,
                unmatched_lines = manifest.counts.lines_unmatched,
                "latest extract run"
            );
            for (entry_type, count) in &manifest.counts.entries_by_type {
                info!(entry_type = %entry_type, count, "entries by type");
            }
        }
        None => warn!(path = %manifest_dir.display(), "no extract run manifest found"),
    }

    match latest_manifest(&manifest_dir, "upload_run_")? {
        Some(path) => {
            let manifest: UploadRunManifest = read_json(&path)?;
            info!(
                path = %path.display(),
                run_id = %manifest.run_id,
                updated_at = %manifest.updated_at,
                target = %manifest.target.kind,
                table = %manifest.target.table,
                records = manifest.records_total,
                records_uploaded = manifest.records_uploaded,
                batches = manifest.batches_total,
                failed_batches = manifest.failed_batches.len(),
                verified_rows = %manifest
                    .verified_row_count
                    .map(|count| count.to_string())
                    .unwrap_or_default(),
                "latest upload run"
            );
            for failed in &manifest.failed_batches {
                warn!(batch = failed.batch, records = failed.records, error = %failed.error, "failed batch");
            }
        }
        None => warn!(path = %manifest_dir.display(), "no upload run manifest found"),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::model::{ExtractCounts, SourceDocument, ToolVersions, UploadTarget};
    use crate::util::{scratch_dir, write_json_pretty};

    #[test]
    fn status_tolerates_missing_manifests() {
        let dir = scratch_dir("status-empty");
        run(StatusArgs {
            cache_root: dir.clone(),
        })
        .expect("missing manifests are warnings");
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn status_reads_written_manifests() {
        let dir = scratch_dir("status");
        let manifests = dir.join("manifests");

        let extract = ExtractRunManifest {
            manifest_version: 1,
            run_id: "extract-20261016T000000Z".to_string(),
            status: "completed".to_string(),
            started_at: "2026-10-16T00:00:00Z".to_string(),
            updated_at: "2026-10-16T00:01:00Z".to_string(),
            command: "icd10-index extract --pdf-path index.pdf".to_string(),
            tool_versions: ToolVersions { pdftotext: None },
            source: SourceDocument {
                path: "index.pdf".to_string(),
                sha256: "00".to_string(),
                page_count: 3,
            },
            output_csv: Some("data/alphabetic_index.csv".to_string()),
            counts: ExtractCounts::default(),
            warnings: Vec::new(),
        };
        write_json_pretty(&manifests.join("extract_run_20261016T000000Z.json"), &extract)
            .expect("write extract manifest");

        let upload = UploadRunManifest {
            manifest_version: 1,
            run_id: "upload-20261016T000500Z".to_string(),
            started_at: "2026-10-16T00:05:00Z".to_string(),
            updated_at: "2026-10-16T00:06:00Z".to_string(),
            input_csv: "data/alphabetic_index.csv".to_string(),
            target: UploadTarget {
                kind: "sqlite".to_string(),
                location: "index.sqlite".to_string(),
                table: "alphabetical_index".to_string(),
            },
            batch_size: 1000,
            records_total: 0,
            batches_total: 0,
            batches_succeeded: 0,
            records_uploaded: 0,
            failed_batches: Vec::new(),
            verified_row_count: Some(0),
            verification_error: None,
        };
        write_json_pretty(&manifests.join("upload_run_20261016T000500Z.json"), &upload)
            .expect("write upload manifest");

        run(StatusArgs {
            cache_root: dir.clone(),
        })
        .expect("status should read manifests");

        fs::remove_dir_all(&dir).ok();
    }
}
