//! `keygate-store` — storage implementations for the domain ports.
//!
//! The in-memory stores back dev and test wiring; the `postgres` feature
//! adds sqlx-backed implementations of the same ports.

pub mod in_memory;

#[cfg(feature = "postgres")]
pub mod postgres;

pub use in_memory::InMemoryStores;

#[cfg(feature = "postgres")]
pub use postgres::PostgresStores;
