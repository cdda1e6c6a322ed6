// session-store-sea-orm: Sea-ORM backend for the session store.
//
// Statements are built with sea-query against the configured table
// descriptors and rendered for whichever backend the connection speaks, so
// every value is bound rather than spliced into SQL.

pub mod adapter;
pub mod error;
pub mod query;
pub mod schema;

pub use adapter::SeaOrmAdapter;
pub use error::{map_db_err, ConnectError};
pub use schema::create_tables;
