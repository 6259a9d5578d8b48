//! Shared test doubles and fixtures for the almanac workspace.
//!
//! The doubles mirror the production store semantics closely enough that
//! engine tests written against them also describe the real stores: the
//! remote stamps API writes with a manual clock and tracks the known-record
//! register; the local store gives clone-on-begin, swap-on-commit units of
//! work.

pub mod fixtures;
pub mod memory_local;
pub mod memory_remote;

pub use memory_local::MemoryLocalStore;
pub use memory_remote::MemoryRemote;
