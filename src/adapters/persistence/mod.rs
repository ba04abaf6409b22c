//! Repository implementations: SQLite (libsql) for production, in-memory for tests.

pub mod memory_repo;
pub mod sqlite_repo;

pub use memory_repo::MemoryRepo;
pub use sqlite_repo::SqliteRepo;
