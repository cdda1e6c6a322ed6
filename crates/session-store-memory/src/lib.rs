// session-store-memory: in-memory backend for the session store contract.
//
// Keeps users and sessions in HashMap-backed tables behind a tokio RwLock and
// emulates primary-key and foreign-key constraints. Suited to tests,
// prototyping and single-process deployments.

pub mod adapter;

pub use adapter::{MemoryAdapter, MemoryDatabase, MemoryStoreError};
