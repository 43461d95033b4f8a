//! Database models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Attribution stored when a mapping is recorded without `responsible`
pub const DEFAULT_RESPONSIBLE: &str = "Dummy";

/// One parsed `code;description` line, before it is stamped with a terminology
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeRow {
    pub code: String,
    pub description: String,
}

/// Row in `codes`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeEntry {
    pub terminology: String,
    pub year: i64,
    pub code: String,
    pub description: String,
}

/// A crosswalk assertion as submitted, before the id and timestamp are assigned
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMapping {
    pub source_terminology: String,
    pub source_year: i64,
    pub source_code: String,
    pub target_terminology: String,
    pub target_year: i64,
    pub target_code: String,
    #[serde(default = "default_responsible")]
    pub responsible: String,
}

fn default_responsible() -> String {
    DEFAULT_RESPONSIBLE.to_string()
}

/// Row in `mappings`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingEntry {
    /// Assigned by the `mappings` AUTOINCREMENT sequence
    pub id: i64,
    pub source_terminology: String,
    pub source_year: i64,
    pub source_code: String,
    pub target_terminology: String,
    pub target_year: i64,
    pub target_code: String,
    pub responsible: String,
    pub timestamp: DateTime<Utc>,
}
