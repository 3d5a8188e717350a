//! kitchen-helper/crates/domains/src/lib.rs
//!
//! The central domain logic and interface definitions for KitchenHelper.
//! Nothing in this crate performs I/O: adapters implement the ports,
//! services drive them.

pub mod error;
pub mod lifecycle;
pub mod models;
pub mod ports;
pub mod rating;

// Re-exporting for easier access in other crates
pub use error::*;
pub use lifecycle::*;
pub use models::*;
pub use ports::*;
pub use rating::*;
