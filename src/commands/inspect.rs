use std::io::{self, Write};

use anyhow::{Context, Result};
use regex::Regex;
use serde::Serialize;
use tracing::{info, warn};

use crate::cli::InspectArgs;
use crate::pdf::{self, TextMode};

const MIN_TABLE_ROWS: usize = 2;
const MIN_TABLE_CELLS: usize = 2;
const SAMPLE_TABLE_ROWS: usize = 5;

#[derive(Debug, Clone, Serialize)]
struct InspectReport {
    pdf_path: String,
    total_pages: Option<usize>,
    pages: Vec<PageReport>,
}

#[derive(Debug, Clone, Serialize)]
struct PageReport {
    page: usize,
    line_count: usize,
    lines: Vec<String>,
    tables: Vec<Vec<Vec<String>>>,
}

pub fn run(args: InspectArgs) -> Result<()> {
    info!(path = %args.pdf_path.display(), pages = args.pages, "inspecting PDF");

    let total_pages = match pdf::page_count(&args.pdf_path) {
        Ok(count) => Some(count),
        Err(error) => {
            warn!(error = %error, "could not read page count");
            None
        }
    };

    let last_page = args.pages.max(1);
    let text_pages = pdf::extract_pages(&args.pdf_path, 1, Some(last_page), TextMode::Raw)?;
    let layout_pages = pdf::extract_pages(&args.pdf_path, 1, Some(last_page), TextMode::Layout)?;

    let splitter = Regex::new(r"\s{2,}").context("failed to compile column gap regex")?;
    let pages = text_pages
        .iter()
        .take(args.pages)
        .enumerate()
        .map(|(index, text)| {
            let layout = layout_pages.get(index).map(String::as_str).unwrap_or("");
            build_page_report(index + 1, text, layout, args.lines, &splitter)
        })
        .collect::<Vec<PageReport>>();

    let report = InspectReport {
        pdf_path: args.pdf_path.display().to_string(),
        total_pages,
        pages,
    };

    let mut output = io::BufWriter::new(io::stdout().lock());
    if args.json {
        serde_json::to_writer_pretty(&mut output, &report)
            .context("failed to serialize inspect json output")?;
        writeln!(output)?;
    } else {
        write_text_report(&mut output, &report)?;
    }
    output.flush()?;

    info!(pages = report.pages.len(), "inspection complete");
    Ok(())
}

fn build_page_report(
    page: usize,
    text: &str,
    layout: &str,
    max_lines: usize,
    splitter: &Regex,
) -> PageReport {
    let lines = if text.trim().is_empty() {
        Vec::new()
    } else {
        text.lines().map(ToOwned::to_owned).collect::<Vec<String>>()
    };

    PageReport {
        page,
        line_count: lines.len(),
        lines: lines.into_iter().take(max_lines).collect(),
        tables: detect_tables(layout, splitter),
    }
}

/// Groups consecutive layout lines that split into the same number of
/// cells (two or more) on wide gaps.
fn detect_tables(layout: &str, splitter: &Regex) -> Vec<Vec<Vec<String>>> {
    let mut tables = Vec::new();
    let mut current: Vec<Vec<String>> = Vec::new();

    let mut flush = |current: &mut Vec<Vec<String>>| {
        if current.len() >= MIN_TABLE_ROWS {
            tables.push(std::mem::take(current));
        } else {
            current.clear();
        }
    };

    for line in layout.lines() {
        let cells = splitter
            .split(line.trim())
            .filter(|cell| !cell.is_empty())
            .map(ToOwned::to_owned)
            .collect::<Vec<String>>();

        if cells.len() < MIN_TABLE_CELLS {
            flush(&mut current);
            continue;
        }

        let same_shape = current
            .last()
            .map(|previous| previous.len() == cells.len())
            .unwrap_or(true);
        if !same_shape {
            flush(&mut current);
        }
        current.push(cells);
    }
    flush(&mut current);

    tables
}

fn write_text_report<W: Write>(output: &mut W, report: &InspectReport) -> Result<()> {
    writeln!(output, "Inspecting PDF: {}", report.pdf_path)?;
    match report.total_pages {
        Some(total) => writeln!(output, "Total pages: {total}")?,
        None => writeln!(output, "Total pages: unknown")?,
    }

    let rule = "=".repeat(80);
    for page in &report.pages {
        writeln!(output)?;
        writeln!(output, "{rule}")?;
        writeln!(output, "PAGE {}", page.page)?;
        writeln!(output, "{rule}")?;

        if page.lines.is_empty() {
            writeln!(output, "No text extracted")?;
        } else {
            for (index, line) in page.lines.iter().enumerate() {
                writeln!(output, "{:3}: {}", index + 1, line)?;
            }
        }

        if let Some(first) = page.tables.first() {
            writeln!(output)?;
            writeln!(output, "Found {} table(s) on this page", page.tables.len())?;
            writeln!(output, "First table sample:")?;
            for row in first.iter().take(SAMPLE_TABLE_ROWS) {
                writeln!(output, "{row:?}")?;
            }
        }
    }

    Ok(())
}
