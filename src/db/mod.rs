// Re-export the Database struct and other public items
mod article;
pub mod core;
mod schema;
mod source;

pub use self::article::Article;
pub use self::core::{Database, DbLockErrorExt};
pub use self::source::{Source, SourceKind};
pub use sqlx::Row;
