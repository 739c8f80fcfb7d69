//! Local-first order, favorites and visibility persistence with optional
//! mirroring onto registry labels.

#[cfg(test)]
pub(crate) mod fake;
pub mod labels;
pub mod remote;
pub mod scope;
pub mod service;
pub mod storage;

pub use labels::{HIDDEN_RANK, LabelCodec, LabelKind};
pub use remote::{Assignment, HubRegistry, LabelRegistry};
pub use scope::{Scope, Section, Target};
pub use service::{
    Migration, OrderMap, OrderSyncService, RemoteWrite, ReorderOutcome, SyncReport, WriteOutcome,
};
pub use storage::{FileStore, KeyValueStore, MemoryStore};

/// Default prefix of synchronised label names.
pub const DEFAULT_LABEL_PREFIX: &str = "hearth_";

// ── Storage keys ─────────────────────────────────────────────────────

pub const KEY_HIDDEN: &str = "hearth.hidden";
pub const KEY_SCOPES: &str = "hearth.scopes";
pub const KEY_SYNC_ENABLED: &str = "hearth.sync_enabled";
pub const KEY_MIGRATION_DONE: &str = "hearth.migration_done";
/// Values whose label mirror failed and must be retried.
pub const KEY_PENDING: &str = "hearth.pending";
pub const KEY_LAYOUT: &str = "hearth.layout";
