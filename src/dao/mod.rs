/// Session document storage and optimistic updates.
pub mod session_store;
/// Storage abstraction layer for database operations.
pub mod storage;
