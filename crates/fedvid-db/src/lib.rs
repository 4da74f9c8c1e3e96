//! Fedvid database layer
//!
//! Store abstraction consumed by the mutation pipeline, the Postgres
//! implementation with SERIALIZABLE transactions, and the conflict-retry
//! executor.

pub mod postgres;
pub mod retry;
pub mod store;

// Re-export commonly used types
pub use postgres::PgStore;
pub use retry::retry_on_conflict;
pub use store::{Store, StoreTransaction};
