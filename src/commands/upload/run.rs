use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use tracing::{info, warn};

use super::credentials::{self, EnvFiles};
use super::records::{Record, read_records};
use super::store::{RestTableStore, SqliteTableStore, TableStore};
use crate::cli::UploadArgs;
use crate::model::{FailedBatch, UploadRunManifest};
use crate::util::{now_utc_string, utc_compact_string, write_json_pretty};

#[derive(Debug, Default)]
struct BatchReport {
    batches_total: usize,
    batches_succeeded: usize,
    records_uploaded: usize,
    failed_batches: Vec<FailedBatch>,
}

type EnvLookup<'a> = &'a dyn Fn(&str) -> Option<String>;

pub fn run(args: UploadArgs) -> Result<()> {
    run_with_env(args, &|key: &str| std::env::var(key).ok())
}

fn run_with_env(args: UploadArgs, process_env: EnvLookup<'_>) -> Result<()> {
    let started_ts = Utc::now();
    let started_at = now_utc_string();
    let run_id = format!("upload-{}", utc_compact_string(started_ts));

    let mut store = open_store(&args, process_env)?;
    let target = store.target();
    info!(
        kind = %target.kind,
        location = %target.location,
        table = %target.table,
        run_id = %run_id,
        "upload target ready"
    );

    info!(path = %args.input_csv.display(), "reading csv");
    let records = read_records(&args.input_csv)?;
    info!(records = records.len(), "records loaded");

    let report = upload_batches(store.as_mut(), &records, args.batch_size);
    info!(
        batches = report.batches_total,
        succeeded = report.batches_succeeded,
        failed = report.failed_batches.len(),
        records_uploaded = report.records_uploaded,
        "upload complete"
    );

    let (verified_row_count, verification_error) = if args.skip_verify {
        (None, None)
    } else {
        verify_row_count(store.as_mut())
    };

    let manifest_path = args
        .cache_root
        .join("manifests")
        .join(format!("upload_run_{}.json", utc_compact_string(started_ts)));
    let manifest = UploadRunManifest {
        manifest_version: 1,
        run_id,
        started_at,
        updated_at: now_utc_string(),
        input_csv: args.input_csv.display().to_string(),
        target,
        batch_size: args.batch_size.max(1),
        records_total: records.len(),
        batches_total: report.batches_total,
        batches_succeeded: report.batches_succeeded,
        records_uploaded: report.records_uploaded,
        failed_batches: report.failed_batches,
        verified_row_count,
        verification_error,
    };
    write_json_pretty(&manifest_path, &manifest)?;
    info!(path = %manifest_path.display(), "wrote upload run manifest");

    Ok(())
}

/// Credentials are resolved here, before the csv is read or any request
/// is sent. The process environment wins over env files.
fn open_store(args: &UploadArgs, process_env: EnvLookup<'_>) -> Result<Box<dyn TableStore>> {
    if let Some(path) = &args.sqlite_path {
        return Ok(Box::new(SqliteTableStore::open(path, &args.table)?));
    }

    let files = EnvFiles::load(&args.env_dir)?;
    let credentials = credentials::resolve(|key| process_env(key).or_else(|| files.get(key)))?;
    info!(url = %credentials.url, key_source = credentials.key_var, "resolved credentials");

    Ok(Box::new(RestTableStore::new(
        &credentials.url,
        &credentials.key,
        &args.table,
        Duration::from_secs(args.timeout_secs),
    )?))
}

/// Sends every batch once. A failed batch is logged and recorded; the
/// remaining batches are still attempted.
fn upload_batches(store: &mut dyn TableStore, records: &[Record], batch_size: usize) -> BatchReport {
    let batch_size = batch_size.max(1);
    let mut report = BatchReport {
        batches_total: records.len().div_ceil(batch_size),
        ..BatchReport::default()
    };

    info!(
        records = records.len(),
        batches = report.batches_total,
        batch_size,
        "uploading"
    );

    for (index, batch) in records.chunks(batch_size).enumerate() {
        let batch_number = index + 1;
        match store.insert_batch(batch) {
            Ok(()) => {
                report.batches_succeeded += 1;
                report.records_uploaded += batch.len();
                info!(
                    batch = batch_number,
                    total = report.batches_total,
                    records = batch.len(),
                    "batch uploaded"
                );
            }
            Err(error) => {
                warn!(
                    batch = batch_number,
                    total = report.batches_total,
                    records = batch.len(),
                    error = %format!("{error:#}"),
                    "batch failed"
                );
                report.failed_batches.push(FailedBatch {
                    batch: batch_number,
                    records: batch.len(),
                    error: format!("{error:#}"),
                });
            }
        }
    }

    report
}

fn verify_row_count(store: &mut dyn TableStore) -> (Option<i64>, Option<String>) {
    match store.count_rows() {
        Ok(count) => {
            info!(rows = count, "rows in target table");
            (Some(count), None)
        }
        Err(error) => {
            let message = format!("{error:#}");
            warn!(error = %message, "could not verify row count");
            (None, Some(message))
        }
    }
}
