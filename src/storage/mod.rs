//! # Storage Module
//!
//! Backends for the room index.
//!
//! - [`MemoryStore`]: DashMap-backed, always available, generic strategy only
//! - `Database`: SQLite-backed (`sqlite` feature), serves both strategies

#[cfg(feature = "sqlite")]
mod database;
mod memory;
#[cfg(feature = "sqlite")]
mod schema;

#[cfg(feature = "sqlite")]
pub use database::Database;
pub use memory::MemoryStore;
