//! # Storage Layer
//!
//! SQLite-backed implementation of the local store traits.

pub mod sqlite;

pub use sqlite::SqliteLocalStore;
