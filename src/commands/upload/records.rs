use std::path::Path;

use anyhow::{Context, Result};
use serde_json::{Map, Value};

pub type Record = Map<String, Value>;

/// Cell values treated as missing and sent as JSON null.
const MISSING_MARKERS: [&str; 11] = [
    "", "NaN", "nan", "NULL", "null", "None", "NA", "N/A", "n/a", "<NA>", "#N/A",
];

pub fn read_records(path: &Path) -> Result<Vec<Record>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("failed to open csv file: {}", path.display()))?;

    let headers = reader
        .headers()
        .with_context(|| format!("failed to read csv header: {}", path.display()))?
        .iter()
        .map(ToOwned::to_owned)
        .collect::<Vec<String>>();

    let mut rows = Vec::new();
    for (index, row) in reader.records().enumerate() {
        let row = row.with_context(|| {
            format!("failed to read csv row {} of {}", index + 1, path.display())
        })?;
        rows.push(
            (0..headers.len())
                .map(|column| row.get(column).and_then(normalize_cell))
                .collect::<Vec<Option<String>>>(),
        );
    }

    Ok(build_records(&headers, rows))
}

fn normalize_cell(raw: &str) -> Option<String> {
    if MISSING_MARKERS.contains(&raw) {
        None
    } else {
        Some(raw.to_string())
    }
}

/// Columns whose present values all parse as integers become JSON numbers.
fn build_records(headers: &[String], rows: Vec<Vec<Option<String>>>) -> Vec<Record> {
    let integer_columns = (0..headers.len())
        .map(|column| {
            let mut present = rows
                .iter()
                .filter_map(|row| row.get(column).and_then(Option::as_deref))
                .peekable();
            present.peek().is_some() && present.all(|value| value.parse::<i64>().is_ok())
        })
        .collect::<Vec<bool>>();

    rows.into_iter()
        .map(|row| {
            headers
                .iter()
                .zip(row)
                .zip(&integer_columns)
                .map(|((header, cell), is_integer)| {
                    let value = match cell {
                        None => Value::Null,
                        Some(text) if *is_integer => text
                            .parse::<i64>()
                            .map(Value::from)
                            .unwrap_or(Value::String(text)),
                        Some(text) => Value::String(text),
                    };
                    (header.clone(), value)
                })
                .collect::<Record>()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::fs;

    use serde_json::json;

    use super::*;
    use crate::util::scratch_dir;

    #[test]
    fn missing_cells_become_null_and_integer_columns_become_numbers() {
        let dir = scratch_dir("records");
        let path = dir.join("index.csv");
        fs::write(
            &path,
            "term,code,reference,see_also,type,indent_level\n\
             Abandonment,X58,,\"Disorder, adjustment\",code_with_see_also,0\n\
             fetus or newborn,NaN,\"Newborn, affected by\",,see,2\n",
        )
        .expect("write csv");

        let records = read_records(&path).expect("csv should parse");
        assert_eq!(records.len(), 2);

        assert_eq!(records[0]["term"], json!("Abandonment"));
        assert_eq!(records[0]["code"], json!("X58"));
        assert_eq!(records[0]["reference"], Value::Null);
        assert_eq!(records[0]["see_also"], json!("Disorder, adjustment"));
        assert_eq!(records[0]["indent_level"], json!(0));

        assert_eq!(records[1]["code"], Value::Null);
        assert_eq!(records[1]["see_also"], Value::Null);
        assert_eq!(records[1]["type"], json!("see"));
        assert_eq!(records[1]["indent_level"], json!(2));

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn every_missing_marker_normalizes_to_none() {
        for marker in MISSING_MARKERS {
            assert_eq!(normalize_cell(marker), None, "{marker:?}");
        }
        assert_eq!(normalize_cell("NA X58").as_deref(), Some("NA X58"));
        assert_eq!(normalize_cell(" ").as_deref(), Some(" "));
    }

    #[test]
    fn mixed_columns_stay_strings() {
        let headers = vec!["term".to_string(), "code".to_string()];
        let rows = vec![
            vec![Some("10".to_string()), None],
            vec![Some("Abasia".to_string()), None],
        ];

        let records = build_records(&headers, rows);
        assert_eq!(records[0]["term"], json!("10"));
        assert_eq!(records[1]["term"], json!("Abasia"));
        assert_eq!(records[0]["code"], Value::Null);
    }

    #[test]
    fn missing_csv_is_an_error() {
        let path = std::env::temp_dir().join("icd10-index-missing-input.csv");
        assert!(read_records(&path).is_err());
    }
}
