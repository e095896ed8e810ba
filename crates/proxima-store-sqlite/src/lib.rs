//! SQLite backend for the Proxima engine.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. [`SqliteStore`] implements both
//! [`proxima_core::store::EngineStore`] and, for single-binary deployments,
//! [`proxima_core::store::UserDirectory`].

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;
