pub mod database;
pub mod memory_store;

pub use database::Database;
pub use memory_store::{MemoryStore, SqliteMemoryStore};
