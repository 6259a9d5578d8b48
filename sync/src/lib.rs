//! # Sync Engine
//!
//! Two-way reconciliation between the local relational store and the remote
//! document workspace.
//!
//! The pieces, roughly in the order a run touches them:
//! - [`request::SyncRequest`] describes what to sync and how conflicts are
//!   decided
//! - [`bootstrap::Bootstrapper`] finds or creates the remote containers and
//!   upgrades their schemas
//! - [`reconcile::Reconciler`] runs the per-collection algorithm through a
//!   [`reconcile::CollectionAdapter`]
//! - [`propagate::Propagator`] pushes select options and reference labels
//!   that depend on other collections
//! - [`driver::SyncDriver`] orders all of it, owns the units of work and
//!   produces the [`report::SyncReport`]
//!
//! The driver also carries the maintenance passes: duplicate-name gc and
//! person removal (the `gc` module).

pub mod adapters;
pub mod bootstrap;
pub mod catalog;
pub mod driver;
pub mod error;
pub mod gc;
pub mod lockfile;
pub mod propagate;
pub mod reconcile;
pub mod report;
pub mod request;
pub mod schedule;

#[cfg(test)]
mod proptests;

pub use driver::SyncDriver;
pub use error::{SyncError, SyncResult};
pub use report::{CollectionCounters, SyncIssue, SyncReport};
pub use request::SyncRequest;
