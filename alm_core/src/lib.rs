//! # Almanac Core
//!
//! Shared types and traits for the almanac organizer.
//!
//! This crate provides:
//! - Identifier and timestamp newtypes shared by both stores
//! - The entity model for every synchronized collection
//! - The remote record, field and schema wire model
//! - Store traits (`RemoteStore`, `LocalStore`, `UnitOfWork`)
//! - Error types with proper handling

pub mod entities;
pub mod error;
pub mod record;
pub mod traits;
pub mod types;

// Re-export commonly used types for convenience
pub use entities::{
    BigPlan, InboxTask, Metric, MetricEntry, Person, Project, RecurringTask, RemoteLink,
    SmartList, SmartListItem, SyncedEntity, Vacation, Workspace,
};
pub use error::{LocalError, LocalResult, RemoteError, RemoteResult};
pub use record::{
    CollectionAddr, ContainerHandle, FieldSpec, FieldTypeError, FieldValue, OptionColor,
    RemoteRecord, Schema, SelectOption,
};
pub use traits::{EntityRepository, LocalStore, RemoteLinkRepository, RemoteStore, UnitOfWork};
pub use types::{
    BigPlanStatus, CollectionKind, Difficulty, Eisenhower, EntityId, EntityMeta, InboxTaskSource,
    InboxTaskStatus, MetricUnit, PersonRelationship, RecurringTaskKind, RecurringTaskPeriod,
    RemoteId, SyncPrefer, SyncTarget, Timestamp,
};
