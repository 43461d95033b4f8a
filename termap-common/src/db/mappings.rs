//! `mappings` table operations and the mapping recorder

use crate::config::DuplicatePolicy;
use crate::db::models::{MappingEntry, NewMapping};
use crate::{time, Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::info;

const MAPPING_COLUMNS: &str = "id, source_terminology, source_year, source_code, \
     target_terminology, target_year, target_code, responsible, timestamp";

/// Record a crosswalk assertion.
///
/// Stamps the current UTC time and appends the row; the id comes from the
/// table's AUTOINCREMENT sequence. Existence of the referenced codes is not
/// checked. Under [`DuplicatePolicy::Reject`] a mapping repeating an existing
/// source+target tuple fails with [`Error::Conflict`].
pub async fn record_mapping(
    pool: &SqlitePool,
    mapping: &NewMapping,
    policy: DuplicatePolicy,
) -> Result<MappingEntry> {
    let timestamp = time::now();
    let stored_timestamp = time::to_storage(&timestamp);

    let id = match policy {
        DuplicatePolicy::Allow => Some(insert_mapping(pool, mapping, &stored_timestamp).await?),
        DuplicatePolicy::Reject => {
            insert_mapping_if_absent(pool, mapping, &stored_timestamp).await?
        }
    };

    let Some(id) = id else {
        return Err(Error::Conflict(format!(
            "Mapping {} {} {} -> {} {} {} already exists",
            mapping.source_terminology,
            mapping.source_year,
            mapping.source_code,
            mapping.target_terminology,
            mapping.target_year,
            mapping.target_code
        )));
    };

    info!(
        "Recorded mapping {}: {} {} {} -> {} {} {} ({})",
        id,
        mapping.source_terminology,
        mapping.source_year,
        mapping.source_code,
        mapping.target_terminology,
        mapping.target_year,
        mapping.target_code,
        mapping.responsible
    );

    Ok(MappingEntry {
        id,
        source_terminology: mapping.source_terminology.clone(),
        source_year: mapping.source_year,
        source_code: mapping.source_code.clone(),
        target_terminology: mapping.target_terminology.clone(),
        target_year: mapping.target_year,
        target_code: mapping.target_code.clone(),
        responsible: mapping.responsible.clone(),
        timestamp,
    })
}

/// Insert one row and return its id
pub async fn insert_mapping(
    pool: &SqlitePool,
    mapping: &NewMapping,
    timestamp: &str,
) -> Result<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO mappings (
            source_terminology, source_year, source_code,
            target_terminology, target_year, target_code,
            responsible, timestamp
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&mapping.source_terminology)
    .bind(mapping.source_year)
    .bind(&mapping.source_code)
    .bind(&mapping.target_terminology)
    .bind(mapping.target_year)
    .bind(&mapping.target_code)
    .bind(&mapping.responsible)
    .bind(timestamp)
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Insert one row unless the same source and target tuple is already stored.
///
/// Check and insert are a single statement, so it takes SQLite's write lock
/// (waiting out the busy timeout) before reading. Concurrent writers of one
/// tuple are serialized and every loser sees the winner's row.
/// Returns `None` when the tuple exists.
pub async fn insert_mapping_if_absent(
    pool: &SqlitePool,
    mapping: &NewMapping,
    timestamp: &str,
) -> Result<Option<i64>> {
    let result = sqlx::query(
        r#"
        INSERT INTO mappings (
            source_terminology, source_year, source_code,
            target_terminology, target_year, target_code,
            responsible, timestamp
        )
        SELECT ?, ?, ?, ?, ?, ?, ?, ?
        WHERE NOT EXISTS (
            SELECT 1 FROM mappings
            WHERE source_terminology = ? AND source_year = ? AND source_code = ?
              AND target_terminology = ? AND target_year = ? AND target_code = ?
        )
        "#,
    )
    .bind(&mapping.source_terminology)
    .bind(mapping.source_year)
    .bind(&mapping.source_code)
    .bind(&mapping.target_terminology)
    .bind(mapping.target_year)
    .bind(&mapping.target_code)
    .bind(&mapping.responsible)
    .bind(timestamp)
    .bind(&mapping.source_terminology)
    .bind(mapping.source_year)
    .bind(&mapping.source_code)
    .bind(&mapping.target_terminology)
    .bind(mapping.target_year)
    .bind(&mapping.target_code)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        Ok(None)
    } else {
        Ok(Some(result.last_insert_rowid()))
    }
}

/// Target code of the first mapping for a source reference and target year.
///
/// The target terminology is not part of the key: when several
/// target terminologies share a year, the earliest recorded row wins.
pub async fn find_target_code(
    pool: &SqlitePool,
    source_terminology: &str,
    source_year: i64,
    source_code: &str,
    target_year: i64,
) -> Result<Option<String>> {
    let target = sqlx::query_scalar::<_, String>(
        r#"
        SELECT target_code FROM mappings
        WHERE source_terminology = ? AND source_year = ? AND source_code = ? AND target_year = ?
        ORDER BY id
        LIMIT 1
        "#,
    )
    .bind(source_terminology)
    .bind(source_year)
    .bind(source_code)
    .bind(target_year)
    .fetch_optional(pool)
    .await?;

    Ok(target)
}

/// Load a mapping by id
pub async fn load_mapping(pool: &SqlitePool, id: i64) -> Result<Option<MappingEntry>> {
    let row = sqlx::query(&format!("SELECT {} FROM mappings WHERE id = ?", MAPPING_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await?;

    row.map(|r| mapping_from_row(&r)).transpose()
}

/// Every mapping recorded for a source reference, oldest first
pub async fn list_mappings_for_source(
    pool: &SqlitePool,
    source_terminology: &str,
    source_year: i64,
    source_code: &str,
) -> Result<Vec<MappingEntry>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM mappings \
         WHERE source_terminology = ? AND source_year = ? AND source_code = ? \
         ORDER BY id",
        MAPPING_COLUMNS
    ))
    .bind(source_terminology)
    .bind(source_year)
    .bind(source_code)
    .fetch_all(pool)
    .await?;

    rows.iter().map(mapping_from_row).collect()
}

fn mapping_from_row(row: &SqliteRow) -> Result<MappingEntry> {
    let timestamp: String = row.get("timestamp");

    Ok(MappingEntry {
        id: row.get("id"),
        source_terminology: row.get("source_terminology"),
        source_year: row.get("source_year"),
        source_code: row.get("source_code"),
        target_terminology: row.get("target_terminology"),
        target_year: row.get("target_year"),
        target_code: row.get("target_code"),
        responsible: row.get("responsible"),
        timestamp: time::from_storage(&timestamp)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_database;
    use crate::db::models::DEFAULT_RESPONSIBLE;

    fn icd_mapping(target_terminology: &str, target_code: &str) -> NewMapping {
        NewMapping {
            source_terminology: "ICD10".to_string(),
            source_year: 2024,
            source_code: "A01".to_string(),
            target_terminology: target_terminology.to_string(),
            target_year: 2025,
            target_code: target_code.to_string(),
            responsible: DEFAULT_RESPONSIBLE.to_string(),
        }
    }

    #[tokio::test]
    async fn test_record_assigns_increasing_ids_and_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        let pool = init_database(&dir.path().join("t.db")).await.unwrap();

        let before = time::now();
        let first = record_mapping(&pool, &icd_mapping("ICD11", "1A00"), DuplicatePolicy::Allow)
            .await
            .unwrap();
        let second = record_mapping(&pool, &icd_mapping("ICD11", "1A01"), DuplicatePolicy::Allow)
            .await
            .unwrap();

        assert!(second.id > first.id);
        assert!(first.timestamp >= before);

        let stored = load_mapping(&pool, first.id).await.unwrap().unwrap();
        assert_eq!(stored.target_code, "1A00");
        assert_eq!(stored.responsible, DEFAULT_RESPONSIBLE);
        assert_eq!(stored.timestamp.timestamp_micros(), first.timestamp.timestamp_micros());
    }

    #[tokio::test]
    async fn test_find_target_ignores_target_terminology() {
        let dir = tempfile::tempdir().unwrap();
        let pool = init_database(&dir.path().join("t.db")).await.unwrap();

        record_mapping(&pool, &icd_mapping("SNOMED", "S-1"), DuplicatePolicy::Allow)
            .await
            .unwrap();
        record_mapping(&pool, &icd_mapping("ICD11", "1A00"), DuplicatePolicy::Allow)
            .await
            .unwrap();

        let target = find_target_code(&pool, "ICD10", 2024, "A01", 2025).await.unwrap();
        assert_eq!(target.as_deref(), Some("S-1"));

        let listed = list_mappings_for_source(&pool, "ICD10", 2024, "A01").await.unwrap();
        assert_eq!(listed.len(), 2);
    }

    #[tokio::test]
    async fn test_find_target_misses_other_year() {
        let dir = tempfile::tempdir().unwrap();
        let pool = init_database(&dir.path().join("t.db")).await.unwrap();

        record_mapping(&pool, &icd_mapping("ICD11", "1A00"), DuplicatePolicy::Allow)
            .await
            .unwrap();

        assert!(find_target_code(&pool, "ICD10", 2024, "A01", 2026).await.unwrap().is_none());
        assert!(load_mapping(&pool, 9999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicates_allowed_by_default_policy() {
        let dir = tempfile::tempdir().unwrap();
        let pool = init_database(&dir.path().join("t.db")).await.unwrap();
        let mapping = icd_mapping("ICD11", "1A00");

        record_mapping(&pool, &mapping, DuplicatePolicy::Allow).await.unwrap();
        record_mapping(&pool, &mapping, DuplicatePolicy::Allow).await.unwrap();

        let listed = list_mappings_for_source(&pool, "ICD10", 2024, "A01").await.unwrap();
        assert_eq!(listed.len(), 2);
    }

    #[tokio::test]
    async fn test_reject_policy_refuses_repeat() {
        let dir = tempfile::tempdir().unwrap();
        let pool = init_database(&dir.path().join("t.db")).await.unwrap();
        let mapping = icd_mapping("ICD11", "1A00");

        record_mapping(&pool, &mapping, DuplicatePolicy::Reject).await.unwrap();
        let result = record_mapping(&pool, &mapping, DuplicatePolicy::Reject).await;
        assert!(matches!(result, Err(Error::Conflict(_))));

        // A contradictory target is a different tuple and still accepted
        record_mapping(&pool, &icd_mapping("ICD11", "1A01"), DuplicatePolicy::Reject)
            .await
            .unwrap();

        let listed = list_mappings_for_source(&pool, "ICD10", 2024, "A01").await.unwrap();
        assert_eq!(listed.len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_reject_writes_conflict_instead_of_failing() {
        let dir = tempfile::tempdir().unwrap();
        let pool = init_database(&dir.path().join("t.db")).await.unwrap();

        for round in 0..10 {
            let mut mapping = icd_mapping("ICD11", "1A00");
            mapping.source_code = format!("A{:02}", round);

            let handles: Vec<_> = (0..5)
                .map(|_| {
                    let pool = pool.clone();
                    let mapping = mapping.clone();
                    tokio::spawn(async move {
                        record_mapping(&pool, &mapping, DuplicatePolicy::Reject).await
                    })
                })
                .collect();

            let mut recorded = 0;
            let mut conflicts = 0;
            for handle in handles {
                match handle.await.unwrap() {
                    Ok(_) => recorded += 1,
                    Err(Error::Conflict(_)) => conflicts += 1,
                    Err(other) => panic!("round {}: unexpected error: {:?}", round, other),
                }
            }

            assert_eq!(recorded, 1, "round {}", round);
            assert_eq!(conflicts, 4, "round {}", round);

            let stored = list_mappings_for_source(&pool, "ICD10", 2024, &mapping.source_code)
                .await
                .unwrap();
            assert_eq!(stored.len(), 1);
        }
    }
}
