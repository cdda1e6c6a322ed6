pub mod adapter;
pub mod models;
pub mod table;

pub use adapter::{SessionAndUser, SessionStoreAdapter};
pub use models::{extra_columns, Attributes, ColumnMap, DatabaseSession, DatabaseUser, NoAttributes};
pub use table::{validate_pair, SessionTable, UserTable};
