//! Pointer-driven reordering. Renders nothing: consumers draw from
//! [`ReorderEngine::ordered_items`], [`ReorderEngine::dragged_indices`]
//! and [`ReorderEngine::drag_offset`].

pub mod engine;
pub mod layout;
pub mod pointer;

pub use engine::{GestureConfig, GestureOutcome, ReorderEngine};
pub use layout::{Axis, GridLayout, ListLayout, SlotLayout};
pub use pointer::{Point, PointerEvent, PointerPhase};
