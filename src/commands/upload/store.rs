use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use regex::Regex;
use reqwest::blocking::Client;
use reqwest::header::CONTENT_RANGE;
use rusqlite::Connection;
use rusqlite::types::Value as SqlValue;
use serde_json::Value;

use super::records::Record;
use crate::model::UploadTarget;

/// Destination for uploaded rows. One `insert_batch` call is one remote
/// insert; implementations never retry.
pub trait TableStore {
    fn target(&self) -> UploadTarget;
    fn insert_batch(&mut self, rows: &[Record]) -> Result<()>;
    fn count_rows(&mut self) -> Result<i64>;
}

/// PostgREST-style table endpoint (`{url}/rest/v1/{table}`).
pub struct RestTableStore {
    client: Client,
    base_url: String,
    table: String,
    key: String,
}

impl RestTableStore {
    pub fn new(base_url: &str, key: &str, table: &str, timeout: Duration) -> Result<Self> {
        validate_identifier(&identifier_pattern()?, table)?;
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("icd10-index/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build http client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            table: table.to_string(),
            key: key.to_string(),
        })
    }

    fn endpoint(&self) -> String {
        table_endpoint(&self.base_url, &self.table)
    }
}

impl TableStore for RestTableStore {
    fn target(&self) -> UploadTarget {
        UploadTarget {
            kind: "rest".to_string(),
            location: self.base_url.clone(),
            table: self.table.clone(),
        }
    }

    fn insert_batch(&mut self, rows: &[Record]) -> Result<()> {
        let response = self
            .client
            .post(self.endpoint())
            .header("apikey", &self.key)
            .bearer_auth(&self.key)
            .header("Prefer", "return=minimal")
            .json(rows)
            .send()
            .with_context(|| format!("insert request to {} failed", self.table))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            bail!("insert into {} returned {}: {}", self.table, status, body.trim());
        }

        Ok(())
    }

    fn count_rows(&mut self) -> Result<i64> {
        let response = self
            .client
            .head(format!("{}?select=*", self.endpoint()))
            .header("apikey", &self.key)
            .bearer_auth(&self.key)
            .header("Prefer", "count=exact")
            .send()
            .with_context(|| format!("count request to {} failed", self.table))?;

        let status = response.status();
        if !status.is_success() {
            bail!("count on {} returned {}", self.table, status);
        }

        let range = response
            .headers()
            .get(CONTENT_RANGE)
            .and_then(|value| value.to_str().ok())
            .with_context(|| format!("count on {} returned no Content-Range header", self.table))?;

        parse_content_range_total(range)
            .with_context(|| format!("unexpected Content-Range for {}: {range}", self.table))
    }
}

/// Local SQLite table, created from the first batch's column names.
pub struct SqliteTableStore {
    connection: Connection,
    path: String,
    table: String,
    identifier: Regex,
}

impl SqliteTableStore {
    pub fn open(path: &Path, table: &str) -> Result<Self> {
        let connection = Connection::open(path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        Self::with_connection(connection, path.display().to_string(), table)
    }

    fn with_connection(connection: Connection, path: String, table: &str) -> Result<Self> {
        let identifier = identifier_pattern()?;
        validate_identifier(&identifier, table)?;
        Ok(Self {
            connection,
            path,
            table: table.to_string(),
            identifier,
        })
    }

    fn ensure_table(&self, columns: &[&str]) -> Result<()> {
        let column_defs = columns
            .iter()
            .map(|column| format!("\"{column}\""))
            .collect::<Vec<String>>()
            .join(",\n  ");
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS \"{}\" (\n  id INTEGER PRIMARY KEY AUTOINCREMENT,\n  {}\n)",
            self.table, column_defs
        );
        self.connection
            .execute(&sql, [])
            .with_context(|| format!("failed to create table {}", self.table))?;
        Ok(())
    }
}

impl TableStore for SqliteTableStore {
    fn target(&self) -> UploadTarget {
        UploadTarget {
            kind: "sqlite".to_string(),
            location: self.path.clone(),
            table: self.table.clone(),
        }
    }

    fn insert_batch(&mut self, rows: &[Record]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }

        let columns = rows
            .iter()
            .flat_map(|row| row.keys().map(String::as_str))
            .collect::<BTreeSet<&str>>()
            .into_iter()
            .collect::<Vec<&str>>();
        for column in &columns {
            validate_identifier(&self.identifier, column)?;
        }
        self.ensure_table(&columns)?;

        let sql = format!(
            "INSERT INTO \"{}\" ({}) VALUES ({})",
            self.table,
            columns
                .iter()
                .map(|column| format!("\"{column}\""))
                .collect::<Vec<String>>()
                .join(", "),
            (1..=columns.len())
                .map(|index| format!("?{index}"))
                .collect::<Vec<String>>()
                .join(", ")
        );

        let tx = self.connection.transaction()?;
        {
            let mut statement = tx
                .prepare(&sql)
                .with_context(|| format!("failed to prepare insert into {}", self.table))?;
            for row in rows {
                let values = columns
                    .iter()
                    .map(|column| to_sql_value(row.get(*column)))
                    .collect::<Vec<SqlValue>>();
                statement
                    .execute(rusqlite::params_from_iter(values))
                    .with_context(|| format!("failed to insert row into {}", self.table))?;
            }
        }
        tx.commit()?;

        Ok(())
    }

    fn count_rows(&mut self) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM \"{}\"", self.table);
        let count = self.connection.query_row(&sql, [], |row| row.get(0))?;
        Ok(count)
    }
}

pub fn table_endpoint(base_url: &str, table: &str) -> String {
    format!("{}/rest/v1/{}", base_url.trim_end_matches('/'), table)
}

/// Total from a `Content-Range` value such as `0-24/3573` or `*/0`.
pub fn parse_content_range_total(value: &str) -> Option<i64> {
    let (_, total) = value.trim().rsplit_once('/')?;
    total.trim().parse::<i64>().ok()
}

fn identifier_pattern() -> Result<Regex> {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").context("failed to compile identifier regex")
}

fn validate_identifier(pattern: &Regex, name: &str) -> Result<()> {
    if !pattern.is_match(name) {
        bail!("invalid table or column name: {name:?}");
    }
    Ok(())
}

fn to_sql_value(value: Option<&Value>) -> SqlValue {
    match value {
        None | Some(Value::Null) => SqlValue::Null,
        Some(Value::Bool(flag)) => SqlValue::Integer(i64::from(*flag)),
        Some(Value::Number(number)) => number
            .as_i64()
            .map(SqlValue::Integer)
            .or_else(|| number.as_f64().map(SqlValue::Real))
            .unwrap_or(SqlValue::Null),
        Some(Value::String(text)) => SqlValue::Text(text.clone()),
        Some(other) => SqlValue::Text(other.to_string()),
    }
}
