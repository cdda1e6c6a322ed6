#![doc = include_str!("../README.md")]

pub mod clock;
pub mod config;
pub mod db;
pub mod env;
pub mod error;

// Re-exports for convenience
pub use clock::{system_clock, Clock, SharedClock, SystemClock};
pub use config::StoreConfig;
pub use db::adapter::{SessionAndUser, SessionStoreAdapter};
pub use db::models::{Attributes, ColumnMap, DatabaseSession, DatabaseUser, NoAttributes};
pub use db::table::{SessionTable, UserTable};
pub use error::{BoxError, ConfigError, StoreError, StoreResult};
