use std::path::Path;
use std::process::Command;

use anyhow::{Context, Result, bail};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TextMode {
    /// Reading-order text, one index line per output line.
    Raw,
    /// Physical layout with column gaps preserved.
    Layout,
}

/// Runs `pdftotext` and returns one string per page.
pub fn extract_pages(
    pdf_path: &Path,
    first_page: usize,
    last_page: Option<usize>,
    mode: TextMode,
) -> Result<Vec<String>> {
    if !pdf_path.is_file() {
        bail!("PDF not found: {}", pdf_path.display());
    }

    let mut command = Command::new("pdftotext");
    command
        .arg("-enc")
        .arg("UTF-8")
        .arg("-f")
        .arg(first_page.max(1).to_string());
    if let Some(last_page) = last_page {
        command.arg("-l").arg(last_page.to_string());
    }
    if mode == TextMode::Layout {
        command.arg("-layout");
    }
    command.arg(pdf_path).arg("-");

    let output = command
        .output()
        .with_context(|| format!("failed to execute pdftotext for {}", pdf_path.display()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!(
            "pdftotext returned non-zero exit status for {}: {}",
            pdf_path.display(),
            stderr.trim()
        );
    }

    Ok(split_pages(&String::from_utf8_lossy(&output.stdout)))
}

/// Splits pdftotext output on form feeds, dropping the empty tail it emits
/// after the last page.
pub fn split_pages(raw: &str) -> Vec<String> {
    let mut pages: Vec<String> = raw
        .split('\u{000C}')
        .map(|chunk| chunk.replace('\u{0000}', ""))
        .collect();

    while let Some(last_page) = pages.last() {
        if last_page.trim().is_empty() {
            pages.pop();
            continue;
        }
        break;
    }

    pages
}

/// Page count reported by `pdfinfo`.
pub fn page_count(pdf_path: &Path) -> Result<usize> {
    let output = Command::new("pdfinfo")
        .arg(pdf_path)
        .output()
        .with_context(|| format!("failed to execute pdfinfo for {}", pdf_path.display()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!(
            "pdfinfo returned non-zero exit status for {}: {}",
            pdf_path.display(),
            stderr.trim()
        );
    }

    parse_pdfinfo_pages(&String::from_utf8_lossy(&output.stdout))
        .with_context(|| format!("pdfinfo reported no page count for {}", pdf_path.display()))
}

fn parse_pdfinfo_pages(raw: &str) -> Option<usize> {
    raw.lines().find_map(|line| {
        let value = line.strip_prefix("Pages:")?;
        value.trim().parse::<usize>().ok()
    })
}

pub fn pdftotext_version() -> Option<String> {
    let output = Command::new("pdftotext").arg("-v").output().ok()?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    let source = if stdout.trim().is_empty() {
        stderr.trim()
    } else {
        stdout.trim()
    };

    source
        .lines()
        .next()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| line.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_pages_keeps_interior_empty_pages() {
        let pages = split_pages("Aaron X58\n\u{000C}\n\u{000C}Abasia F44.4\n\u{000C}\n\u{000C}");
        assert_eq!(pages.len(), 3);
        assert_eq!(pages[0], "Aaron X58\n");
        assert!(pages[1].trim().is_empty());
        assert_eq!(pages[2], "Abasia F44.4\n");
    }

    #[test]
    fn split_pages_strips_nul_bytes() {
        let pages = split_pages("Ab\u{0000}ortion O03.9");
        assert_eq!(pages, vec!["Abortion O03.9".to_string()]);
    }

    #[test]
    fn parse_pdfinfo_pages_reads_pages_field() {
        let raw = "Title:          ICD-10-CM Index\nProducer:       Acrobat\nPages:          1042\nEncrypted:      no\n";
        assert_eq!(parse_pdfinfo_pages(raw), Some(1042));
        assert_eq!(parse_pdfinfo_pages("Title: x\n"), None);
    }

    #[test]
    fn missing_pdf_is_an_error() {
        let path = std::env::temp_dir().join("icd10-index-no-such-file.pdf");
        let error = extract_pages(&path, 1, None, TextMode::Raw).expect_err("missing file");
        assert!(error.to_string().contains("PDF not found"));
    }
}
