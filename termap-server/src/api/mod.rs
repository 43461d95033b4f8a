//! HTTP API handlers for termap-server

pub mod buildinfo;
pub mod codes;
pub mod health;
pub mod mapping;
pub mod ui;
pub mod upload;

pub use buildinfo::get_build_info;
pub use codes::get_code;
pub use health::health_routes;
pub use mapping::{create_mapping, get_mapping};
pub use ui::serve_index;
pub use upload::upload_code_list;
