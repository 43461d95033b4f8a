//! `codes` table operations

use crate::db::models::{CodeEntry, CodeRow};
use crate::Result;
use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection, SqlitePool};
use std::collections::HashSet;

/// Rows per multi-VALUES statement. 4 binds per row keeps each statement
/// under SQLite's historical 999 parameter limit.
const INSERT_CHUNK_ROWS: usize = 200;

/// Append rows to `codes`, stamping each with `terminology` and `year`.
///
/// Runs on the caller's connection so the whole upload can share one
/// transaction. Returns the number of rows written.
pub async fn insert_codes(
    conn: &mut SqliteConnection,
    terminology: &str,
    year: i64,
    rows: &[CodeRow],
) -> Result<u64> {
    let mut inserted = 0u64;

    for chunk in rows.chunks(INSERT_CHUNK_ROWS) {
        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new("INSERT INTO codes (terminology, year, code, description) ");
        builder.push_values(chunk, |mut b, row| {
            b.push_bind(terminology)
                .push_bind(year)
                .push_bind(row.code.as_str())
                .push_bind(row.description.as_str());
        });

        inserted += builder.build().execute(&mut *conn).await?.rows_affected();
    }

    Ok(inserted)
}

/// Description of the first row matching the exact key, if any
pub async fn find_code_description(
    pool: &SqlitePool,
    terminology: &str,
    year: i64,
    code: &str,
) -> Result<Option<String>> {
    let description = sqlx::query_scalar::<_, String>(
        "SELECT description FROM codes WHERE terminology = ? AND year = ? AND code = ? LIMIT 1",
    )
    .bind(terminology)
    .bind(year)
    .bind(code)
    .fetch_optional(pool)
    .await?;

    Ok(description)
}

/// Codes stored more than once for a terminology version
pub async fn duplicated_codes(
    conn: &mut SqliteConnection,
    terminology: &str,
    year: i64,
) -> Result<HashSet<String>> {
    let codes = sqlx::query_scalar::<_, String>(
        r#"
        SELECT code FROM codes
        WHERE terminology = ? AND year = ?
        GROUP BY code
        HAVING COUNT(*) > 1
        "#,
    )
    .bind(terminology)
    .bind(year)
    .fetch_all(&mut *conn)
    .await?;

    Ok(codes.into_iter().collect())
}

/// Row count for a terminology version (duplicates included)
pub async fn count_codes(pool: &SqlitePool, terminology: &str, year: i64) -> Result<i64> {
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM codes WHERE terminology = ? AND year = ?",
    )
    .bind(terminology)
    .bind(year)
    .fetch_one(pool)
    .await?;

    Ok(count)
}

/// All rows for a terminology version, in insertion order
pub async fn list_codes(pool: &SqlitePool, terminology: &str, year: i64) -> Result<Vec<CodeEntry>> {
    let rows = sqlx::query(
        r#"
        SELECT terminology, year, code, description
        FROM codes
        WHERE terminology = ? AND year = ?
        ORDER BY rowid
        "#,
    )
    .bind(terminology)
    .bind(year)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| CodeEntry {
            terminology: row.get("terminology"),
            year: row.get("year"),
            code: row.get("code"),
            description: row.get("description"),
        })
        .collect())
}
