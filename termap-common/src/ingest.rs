//! Code list ingestion
//!
//! Uploaded code lists are headerless `code;description` text. The payload is
//! parsed as a whole before anything is written: one malformed line fails the
//! upload, and the rows of a good file are inserted in a single transaction.

use crate::config::DuplicatePolicy;
use crate::db::codes;
use crate::db::models::CodeRow;
use crate::{Error, Result};
use sqlx::SqlitePool;
use std::collections::HashSet;
use tracing::{debug, info};

/// Column separator of uploaded code lists
pub const SEPARATOR: char = ';';

const EXPECTED_COLUMNS: usize = 2;

/// Parse an uploaded code list.
///
/// Blank lines are skipped. Every other line must split into exactly two
/// columns; fields are kept verbatim apart from the line terminator.
pub fn parse_code_list(bytes: &[u8]) -> Result<Vec<CodeRow>> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| Error::InvalidInput(format!("File is not valid UTF-8: {}", e)))?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let mut rows = Vec::new();
    for (index, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }

        let line_number = index + 1;
        let fields: Vec<&str> = line.split(SEPARATOR).collect();
        if fields.len() != EXPECTED_COLUMNS {
            return Err(Error::InvalidInput(format!(
                "Line {}: expected {} columns (code;description), found {}",
                line_number,
                EXPECTED_COLUMNS,
                fields.len()
            )));
        }

        if fields[0].trim().is_empty() {
            return Err(Error::InvalidInput(format!("Line {}: empty code", line_number)));
        }

        rows.push(CodeRow {
            code: fields[0].to_string(),
            description: fields[1].to_string(),
        });
    }

    if rows.is_empty() {
        return Err(Error::InvalidInput("File contains no rows".to_string()));
    }

    Ok(rows)
}

/// Parse a code list and append it to `codes` for one terminology version.
///
/// All rows land in one transaction, so a storage failure part way leaves
/// the table untouched. Returns the number of rows inserted.
pub async fn ingest_code_list(
    pool: &SqlitePool,
    terminology: &str,
    year: i64,
    payload: &[u8],
    policy: DuplicatePolicy,
) -> Result<u64> {
    let rows = parse_code_list(payload)?;
    debug!(
        "Parsed {} rows for {} {} ({} bytes)",
        rows.len(),
        terminology,
        year,
        payload.len()
    );

    if policy == DuplicatePolicy::Reject {
        if let Some(repeated) = first_repeat(&rows) {
            return Err(Error::Conflict(format!(
                "Code {} appears more than once in the file",
                repeated
            )));
        }
    }

    let mut tx = pool.begin().await?;

    // Writing first makes the transaction take SQLite's write lock (waiting
    // out the busy timeout) before the duplicate check reads, so concurrent
    // uploads of one version are serialized.
    let inserted = codes::insert_codes(&mut *tx, terminology, year, &rows).await?;

    if policy == DuplicatePolicy::Reject {
        let duplicated = codes::duplicated_codes(&mut *tx, terminology, year).await?;
        if let Some(row) = rows.iter().find(|row| duplicated.contains(&row.code)) {
            return Err(Error::Conflict(format!(
                "Code {} already exists for {} {}",
                row.code, terminology, year
            )));
        }
    }

    tx.commit().await?;

    info!("Ingested {} codes for {} {}", inserted, terminology, year);
    Ok(inserted)
}

/// First code that occurs twice within `rows`
fn first_repeat(rows: &[CodeRow]) -> Option<&str> {
    let mut seen = HashSet::new();
    rows.iter()
        .find(|row| !seen.insert(row.code.as_str()))
        .map(|row| row.code.as_str())
}
