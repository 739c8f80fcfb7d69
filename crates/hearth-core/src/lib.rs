//! Domain layer between `hearth-api` and consumers (CLI, apps).
//!
//! - **[`Session`]**: Constructed per hub. [`connect()`](Session::connect)
//!   starts the socket; after every authentication the session resubscribes
//!   to push events, replaces the store from the registry lists, runs the
//!   first-run label migration and caches the layout.
//!
//! - **[`RegistryStore`]**: Entities, areas, floors and labels in
//!   `DashMap` + `watch` collections, with a per-frame state-change
//!   broadcast and a registry version channel. Mutated only by inbound
//!   frames and acknowledged writes.
//!
//! - **[`OptimisticOverlay`]**: Predicted toggle states with expiry,
//!   dropped as soon as a real state frame arrives.
//!
//! - **[`OrderEngine`]**: Integer ranks by bisection between unmoved
//!   neighbours, with a fixed-stride renumber when ranks are too dense.
//!
//! - **[`OrderSyncService`]**: Local-first order, favorites and visibility
//!   persistence, optionally mirrored onto registry labels.
//!
//! - **[`ReorderEngine`]**: Pointer-driven single and multi-item drag
//!   reordering over a [`SlotLayout`].

pub mod config;
pub mod convert;
pub mod error;
pub mod gesture;
pub mod layout;
pub mod model;
pub mod order;
pub mod overlay;
pub mod session;
pub mod store;
pub mod stream;
pub mod sync;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{Credential, SessionConfig, TlsVerification};
pub use error::CoreError;
pub use gesture::{
    GestureConfig, GestureOutcome, GridLayout, ListLayout, Point, PointerEvent, PointerPhase,
    ReorderEngine, SlotLayout,
};
pub use layout::{LayoutSnapshot, RoomLayout, order_entities, order_rooms};
pub use order::{OrderConfig, OrderEngine, RankPlan, RankedItem};
pub use overlay::OptimisticOverlay;
pub use session::Session;
pub use store::{RegistrySnapshot, RegistryStore, StateChange};
pub use stream::EntityStream;
pub use sync::{
    FileStore, KeyValueStore, LabelCodec, LabelKind, MemoryStore, Migration, OrderMap,
    OrderSyncService, RemoteWrite, ReorderOutcome, Scope, Section, SyncReport, Target,
    WriteOutcome,
};

// Re-export model types at the crate root for ergonomics.
pub use model::{Area, Domain, Entity, Floor, Label};

// Connection state is part of the session surface.
pub use hearth_api::{ConnectionState, ReconnectConfig};
