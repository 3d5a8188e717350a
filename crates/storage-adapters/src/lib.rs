//! # storage-adapters
//!
//! Implementations of the `domains` repository ports.
//!
//! - [`MemoryStore`]: always compiled; used by tests and local tooling.
//! - [`PgStore`]: Postgres via sqlx, enabled with the `db-postgres` feature.

pub mod memory;
#[cfg(feature = "db-postgres")]
pub mod postgres;

pub use memory::MemoryStore;
#[cfg(feature = "db-postgres")]
pub use postgres::PgStore;
