//! SQLite persistence for the cutwise suggestion engine.
//!
//! [`SqlPatternStore`] and [`SqlOrderHistory`] are the production
//! implementations of the core storage traits; the `memory` module carries
//! in-memory stand-ins for tests and ephemeral runs.

pub mod connection;
pub mod migrations;
pub mod repositories;

pub use connection::{connect, connect_with_settings, DbPool};
pub use migrations::run_pending;
pub use repositories::{
    InMemoryOrderHistory, InMemoryPatternStore, RecordingCache, RepositoryError, SqlOrderHistory,
    SqlPatternStore,
};
