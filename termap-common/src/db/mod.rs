//! Database models and queries

pub mod codes;
pub mod init;
pub mod mappings;
pub mod models;

pub use init::*;
pub use models::*;
