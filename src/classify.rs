//! Line classifier for the ICD-10-CM alphabetic index text layer.
//!
//! Each line of page text becomes at most one [`IndexEntry`]. Patterns are
//! tried in a fixed order (trailing code, "see also", "see") and the first
//! match consumes the line. Anything else is dropped.

use anyhow::{Context, Result};
use regex::Regex;

use crate::model::{EntryType, IndexEntry};

const SEE_ALSO_MARKER: &str = " -see also ";
const SEE_MARKER: &str = " -see ";
const MIN_LINE_CHARS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineOutcome {
    Entry(IndexEntry),
    /// Too short, a page header, or an alphabetical section divider.
    Skipped,
    /// Looked like content but matched no entry pattern.
    Unmatched,
}

#[derive(Debug)]
pub struct LineClassifier {
    header_marker: String,
    code_suffix: Regex,
    see_also: Regex,
    see: Regex,
}

impl LineClassifier {
    pub fn new(header_marker: &str) -> Result<Self> {
        Ok(Self {
            header_marker: header_marker.to_string(),
            code_suffix: Regex::new(r"^(.+?)\s+([A-Z]\d{2}(?:\.\d{1,4})?)\s*$")
                .context("failed to compile code suffix regex")?,
            see_also: Regex::new(r"(?i)^(.+?)\s+-\s*see\s+also\s+(.+)$")
                .context("failed to compile see-also regex")?,
            see: Regex::new(r"(?i)^(.+?)\s+-\s*see\s+(.+)$")
                .context("failed to compile see regex")?,
        })
    }

    pub fn classify(&self, raw_line: &str) -> LineOutcome {
        let line = raw_line.trim_end();
        if line.chars().count() < MIN_LINE_CHARS || self.is_divider(line) {
            return LineOutcome::Skipped;
        }

        let indent_level = indent_level(raw_line);

        if let Some(captures) = self.code_suffix.captures(line) {
            let text = clean_term(&captures[1]);
            let code = Some(captures[2].trim().to_string());

            let entry = if text.contains(SEE_ALSO_MARKER) {
                let (term, target) = split_cross_reference(&text, SEE_ALSO_MARKER);
                IndexEntry {
                    term,
                    code,
                    reference: None,
                    see_also: Some(target),
                    entry_type: EntryType::CodeWithSeeAlso,
                    indent_level,
                }
            } else if text.contains(SEE_MARKER) {
                let (term, target) = split_cross_reference(&text, SEE_MARKER);
                IndexEntry {
                    term,
                    code,
                    reference: Some(target),
                    see_also: None,
                    entry_type: EntryType::CodeWithSee,
                    indent_level,
                }
            } else {
                IndexEntry {
                    term: text,
                    code,
                    reference: None,
                    see_also: None,
                    entry_type: EntryType::Code,
                    indent_level,
                }
            };
            return LineOutcome::Entry(entry);
        }

        if let Some(captures) = self.see_also.captures(line) {
            return LineOutcome::Entry(IndexEntry {
                term: clean_term(&captures[1]),
                code: None,
                reference: None,
                see_also: Some(clean_term(&captures[2])),
                entry_type: EntryType::SeeAlso,
                indent_level,
            });
        }

        if let Some(captures) = self.see.captures(line) {
            return LineOutcome::Entry(IndexEntry {
                term: clean_term(&captures[1]),
                code: None,
                reference: Some(clean_term(&captures[2])),
                see_also: None,
                entry_type: EntryType::See,
                indent_level,
            });
        }

        LineOutcome::Unmatched
    }

    fn is_divider(&self, line: &str) -> bool {
        if !self.header_marker.is_empty() && line.contains(&self.header_marker) {
            return true;
        }

        let mut chars = line.trim().chars();
        matches!(
            (chars.next(), chars.next()),
            (Some(letter), None) if letter.is_ascii_uppercase()
        )
    }
}

/// Strips leading dashes and whitespace, then collapses whitespace runs.
pub fn clean_term(input: &str) -> String {
    input
        .trim_start_matches(|character: char| character == '-' || character.is_whitespace())
        .split_whitespace()
        .collect::<Vec<&str>>()
        .join(" ")
}

pub fn indent_level(raw_line: &str) -> usize {
    raw_line
        .chars()
        .take_while(|character| character.is_whitespace())
        .count()
}

fn split_cross_reference(text: &str, marker: &str) -> (String, String) {
    let mut parts = text.split(marker);
    let term = parts.next().map(clean_term).unwrap_or_default();
    let target = parts.next().map(clean_term).unwrap_or_default();
    (term, target)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> LineClassifier {
        LineClassifier::new("ICD-10-CM").expect("classifier regexes should compile")
    }

    fn classify_page(classifier: &LineClassifier, text: &str) -> Vec<IndexEntry> {
        text.lines()
            .filter_map(|line| match classifier.classify(line) {
                LineOutcome::Entry(entry) => Some(entry),
                LineOutcome::Skipped | LineOutcome::Unmatched => None,
            })
            .collect()
    }

    fn expect_entry(outcome: LineOutcome) -> IndexEntry {
        match outcome {
            LineOutcome::Entry(entry) => entry,
            other => panic!("expected an entry, got {other:?}"),
        }
    }

    #[test]
    fn code_with_see_also_line_splits_term_and_target() {
        let entry = expect_entry(classifier().classify("Abandonment -see also Disorder, adjustment X58"));
        assert_eq!(
            entry,
            IndexEntry {
                term: "Abandonment".to_string(),
                code: Some("X58".to_string()),
                reference: None,
                see_also: Some("Disorder, adjustment".to_string()),
                entry_type: EntryType::CodeWithSeeAlso,
                indent_level: 0,
            }
        );
    }

    #[test]
    fn indented_see_line_strips_leading_dash() {
        let entry = expect_entry(classifier().classify("  -fetus or newborn -see Newborn, affected by"));
        assert_eq!(entry.term, "fetus or newborn");
        assert_eq!(entry.reference.as_deref(), Some("Newborn, affected by"));
        assert_eq!(entry.see_also, None);
        assert_eq!(entry.code, None);
        assert_eq!(entry.entry_type, EntryType::See);
        assert_eq!(entry.indent_level, 2);
    }

    #[test]
    fn plain_code_line_keeps_dotted_code() {
        let entry = expect_entry(classifier().classify("    - -complete   O03.9  "));
        assert_eq!(entry.term, "complete");
        assert_eq!(entry.code.as_deref(), Some("O03.9"));
        assert_eq!(entry.entry_type, EntryType::Code);
        assert_eq!(entry.indent_level, 4);
    }

    #[test]
    fn code_with_see_line_populates_reference() {
        let entry = expect_entry(classifier().classify("Ablepharia -see Ablepharon Q10.3"));
        assert_eq!(entry.term, "Ablepharia");
        assert_eq!(entry.code.as_deref(), Some("Q10.3"));
        assert_eq!(entry.reference.as_deref(), Some("Ablepharon"));
        assert_eq!(entry.entry_type, EntryType::CodeWithSee);
    }

    #[test]
    fn see_also_line_without_code() {
        let entry = expect_entry(classifier().classify("Abnormal -SEE ALSO Anomaly"));
        assert_eq!(entry.term, "Abnormal");
        assert_eq!(entry.see_also.as_deref(), Some("Anomaly"));
        assert_eq!(entry.reference, None);
        assert_eq!(entry.entry_type, EntryType::SeeAlso);
    }

    #[test]
    fn see_also_keyword_tolerates_extra_spacing() {
        let entry = expect_entry(classifier().classify("Abrasion -see also Injury, superficial"));
        assert_eq!(entry.entry_type, EntryType::SeeAlso);

        let entry = expect_entry(classifier().classify("Abrasion - see   also Injury"));
        assert_eq!(entry.entry_type, EntryType::SeeAlso);
        assert_eq!(entry.see_also.as_deref(), Some("Injury"));
    }

    #[test]
    fn see_also_lines_never_become_see_variants() {
        let classifier = classifier();
        for line in [
            "Abnormal -see also Anomaly",
            "Abnormal -see also Anomaly, congenital Q89.9",
            "  -with -see also Complications R69",
        ] {
            let entry = expect_entry(classifier.classify(line));
            assert!(
                !matches!(entry.entry_type, EntryType::See | EntryType::CodeWithSee),
                "{line} produced {:?}",
                entry.entry_type
            );
        }
    }

    #[test]
    fn trailing_code_takes_priority_over_cross_reference_patterns() {
        let entry = expect_entry(classifier().classify("Accident -see also Index to External Causes V99"));
        assert_eq!(entry.entry_type, EntryType::CodeWithSeeAlso);
        assert_eq!(entry.code.as_deref(), Some("V99"));
    }

    #[test]
    fn short_header_and_divider_lines_are_skipped() {
        let classifier = classifier();
        for line in ["", "ab", "  ", "M", "   Q   ", "ICD-10-CM Index to Diseases and Injuries 2026"] {
            assert_eq!(classifier.classify(line), LineOutcome::Skipped, "{line:?}");
        }
    }

    #[test]
    fn lowercase_single_letter_is_not_a_divider() {
        assert_eq!(classifier().classify("   q"), LineOutcome::Unmatched);
    }

    #[test]
    fn lines_without_pattern_are_unmatched() {
        let classifier = classifier();
        assert_eq!(classifier.classify("Abdomen, abdominal"), LineOutcome::Unmatched);
        assert_eq!(classifier.classify("  -acute"), LineOutcome::Unmatched);
        assert_eq!(classifier.classify("Code X5"), LineOutcome::Unmatched);
        assert_eq!(classifier.classify("Lowercase x58"), LineOutcome::Unmatched);
        assert_eq!(classifier.classify("Too long A01.12345"), LineOutcome::Unmatched);
    }

    #[test]
    fn extracted_codes_match_code_shape_and_rebuild_line() {
        let code_shape = Regex::new(r"^[A-Z]\d{2}(?:\.\d{1,4})?$").expect("regex");
        let classifier = classifier();
        for line in [
            "Abandonment X58",
            "  -affecting management of pregnancy   O09.89",
            "Abasia (-astasia) (hysterical) F44.4",
        ] {
            let entry = expect_entry(classifier.classify(line));
            let code = entry.code.clone().expect("code lines carry a code");
            assert!(code_shape.is_match(&code), "{code}");
            let rebuilt = format!("{} {}", entry.term, code);
            assert_eq!(rebuilt, clean_term(line));
        }
    }

    #[test]
    fn classifying_a_page_twice_gives_identical_ordered_entries() {
        let page = "A\nAbandonment X58\n  -newborn\nAbdomen, abdominal -see also condition\n\
                    Aberrant (congenital) -see also Malposition, congenital Q89.8\n";
        let classifier = classifier();

        let first = classify_page(&classifier, page);
        let second = classify_page(&classifier, page);
        assert_eq!(first, second);
        assert_eq!(
            first.iter().map(|entry| entry.term.as_str()).collect::<Vec<_>>(),
            vec!["Abandonment", "Abdomen, abdominal", "Aberrant (congenital)"]
        );
    }

    #[test]
    fn empty_header_marker_disables_header_filter() {
        let classifier = LineClassifier::new("").expect("classifier");
        let entry = expect_entry(classifier.classify("ICD-10-CM placeholder Z00"));
        assert_eq!(entry.term, "ICD-10-CM placeholder");
    }

    #[test]
    fn clean_term_strips_dashes_and_collapses_whitespace() {
        assert_eq!(clean_term(" - -  foo   bar\tbaz "), "foo bar baz");
        assert_eq!(clean_term("---"), "");
        assert_eq!(clean_term("term-with-dash"), "term-with-dash");
    }

    #[test]
    fn indent_level_counts_leading_whitespace_characters() {
        assert_eq!(indent_level("Abandonment"), 0);
        assert_eq!(indent_level("  -child"), 2);
        assert_eq!(indent_level("\t -x"), 2);
    }
}
