//! # termap Common Library
//!
//! Shared code for the terminology mapping service:
//! - Database initialization and queries for `codes` and `mappings`
//! - Code list ingestion from `code;description` files
//! - Configuration loading and root folder resolution
//! - Error types and time utilities

pub mod config;
pub mod db;
pub mod error;
pub mod ingest;
pub mod time;

pub use config::DuplicatePolicy;
pub use error::{Error, Result};
