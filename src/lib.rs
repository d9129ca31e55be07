pub mod db;
pub mod detect;
pub mod error;
pub mod fetch;
pub mod logging;
pub mod parse;
pub mod relevance;
pub mod robots;
pub mod scheduler;
pub mod sweep;

pub const TARGET_WEB_REQUEST: &str = "web_request";
pub const TARGET_DB: &str = "db_query";
pub const TARGET_SWEEP: &str = "sweep";

pub use error::{IngestError, Result};
