/// Document store abstraction and its backends.
pub mod collection_store;
/// Database model definitions.
pub mod models;
/// Storage abstraction layer for database operations.
pub mod storage;
