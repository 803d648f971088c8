// MPA Infrastructure - SQLite Adapter
// Implements: ResultStore, CandidateSource

mod connection;
mod error;
mod migration;
mod result_store;

pub use connection::create_pool;
pub use migration::run_migrations;
pub use result_store::SqliteResultStore;

// Note: sqlx::Error conversion is handled by a helper function
// due to Rust's orphan rules (cannot implement From<sqlx::Error> for AppError here)
