use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::classify::{LineClassifier, LineOutcome};
use crate::cli::ExtractArgs;
use crate::model::{
    ExtractCounts, ExtractRunManifest, IndexEntry, SourceDocument, ToolVersions,
};
use crate::pdf::{self, TextMode};
use crate::util::{
    command_line, ensure_parent_directory, now_utc_string, sha256_file, utc_compact_string,
    write_json_pretty,
};

const PROGRESS_EVERY_PAGES: usize = 10;
const SAMPLE_ENTRIES: usize = 20;

#[derive(Debug, Default)]
struct PageWalk {
    entries: Vec<IndexEntry>,
    counts: ExtractCounts,
}

pub fn run(args: ExtractArgs) -> Result<()> {
    let started_ts = Utc::now();
    let started_at = now_utc_string();
    let run_id = format!("extract-{}", utc_compact_string(started_ts));

    info!(
        input = %args.pdf_path.display(),
        output = %args.output_csv.display(),
        run_id = %run_id,
        "starting extraction"
    );

    let classifier = LineClassifier::new(&args.header_marker)?;
    let pages = pdf::extract_pages(&args.pdf_path, 1, page_limit(args.max_pages), TextMode::Raw)?;
    let sha256 = sha256_file(&args.pdf_path)?;
    info!(pages = pages.len(), "processing pages");

    let walk = walk_pages(&classifier, &pages);
    let mut warnings = Vec::new();
    let page_count = document_page_count(&args.pdf_path, pages.len(), &mut warnings);

    let wrote = write_entries_csv(&args.output_csv, &walk.entries)?;
    if wrote {
        info!(path = %args.output_csv.display(), entries = walk.entries.len(), "saved entries");
    } else {
        warn!(path = %args.output_csv.display(), "no entries extracted; output not written");
        warnings.push("no entries extracted; output not written".to_string());
    }

    log_summary(&walk);

    let manifest_path = args.manifest_path.clone().unwrap_or_else(|| {
        args.cache_root
            .join("manifests")
            .join(format!("extract_run_{}.json", utc_compact_string(started_ts)))
    });
    let manifest = ExtractRunManifest {
        manifest_version: 1,
        run_id,
        status: "completed".to_string(),
        started_at,
        updated_at: now_utc_string(),
        command: command_line(),
        tool_versions: ToolVersions {
            pdftotext: pdf::pdftotext_version(),
        },
        source: SourceDocument {
            path: args.pdf_path.display().to_string(),
            sha256,
            page_count,
        },
        output_csv: wrote.then(|| args.output_csv.display().to_string()),
        counts: walk.counts,
        warnings,
    };
    write_json_pretty(&manifest_path, &manifest)?;
    info!(path = %manifest_path.display(), "wrote extract run manifest");

    Ok(())
}

/// pdftotext reads `-l 0` as "no limit", so a zero cap still reads one page.
fn page_limit(max_pages: Option<usize>) -> Option<usize> {
    max_pages.map(|pages| pages.max(1))
}

/// Page count from `pdfinfo`; pdftotext output drops trailing blank pages,
/// so the processed count is only the fallback.
fn document_page_count(pdf_path: &Path, processed: usize, warnings: &mut Vec<String>) -> usize {
    match pdf::page_count(pdf_path) {
        Ok(count) => count,
        Err(error) => {
            warn!(error = %format!("{error:#}"), "could not read page count; using processed pages");
            warnings.push(format!("page count unavailable: {error:#}"));
            processed
        }
    }
}

/// Classifies every line of every page, keeping page order and line order.
fn walk_pages(classifier: &LineClassifier, pages: &[String]) -> PageWalk {
    let mut walk = PageWalk::default();
    let total_pages = pages.len();

    for (index, page) in pages.iter().enumerate() {
        let page_number = index + 1;
        if page_number % PROGRESS_EVERY_PAGES == 0 {
            info!(page = page_number, total_pages, "extraction progress");
        }

        walk.counts.pages_total += 1;
        if page.trim().is_empty() {
            walk.counts.empty_pages += 1;
            continue;
        }

        for line in page.lines() {
            walk.counts.lines_seen += 1;
            match classifier.classify(line) {
                LineOutcome::Entry(entry) => {
                    walk.counts.entries_total += 1;
                    if entry.code.is_some() {
                        walk.counts.entries_with_code += 1;
                    }
                    *walk
                        .counts
                        .entries_by_type
                        .entry(entry.entry_type.as_str().to_string())
                        .or_insert(0) += 1;
                    walk.entries.push(entry);
                }
                LineOutcome::Skipped => walk.counts.lines_skipped += 1,
                LineOutcome::Unmatched => walk.counts.lines_unmatched += 1,
            }
        }
    }

    walk
}

/// Writes entries as CSV. An empty entry list writes nothing and returns
/// `false`.
fn write_entries_csv(path: &Path, entries: &[IndexEntry]) -> Result<bool> {
    if entries.is_empty() {
        return Ok(false);
    }

    ensure_parent_directory(path)?;
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create csv file: {}", path.display()))?;
    for entry in entries {
        writer
            .serialize(entry)
            .with_context(|| format!("failed to write csv row: {}", path.display()))?;
    }
    writer
        .flush()
        .with_context(|| format!("failed to flush csv file: {}", path.display()))?;

    Ok(true)
}

fn log_summary(walk: &PageWalk) {
    let counts = &walk.counts;
    info!(
        pages = counts.pages_total,
        empty_pages = counts.empty_pages,
        lines = counts.lines_seen,
        skipped = counts.lines_skipped,
        unmatched = counts.lines_unmatched,
        entries = counts.entries_total,
        with_code = counts.entries_with_code,
        "extraction complete"
    );

    let breakdown: &BTreeMap<String, usize> = &counts.entries_by_type;
    for (entry_type, count) in breakdown {
        info!(entry_type = %entry_type, count, "entries by type");
    }

    for entry in walk.entries.iter().take(SAMPLE_ENTRIES) {
        debug!(
            term = %entry.term,
            code = %entry.code.as_deref().unwrap_or(""),
            reference = %entry.reference.as_deref().unwrap_or(""),
            see_also = %entry.see_also.as_deref().unwrap_or(""),
            entry_type = entry.entry_type.as_str(),
            indent_level = entry.indent_level,
            "sample entry"
        );
    }
}
