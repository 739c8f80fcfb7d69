// ── Domain model ──
//
// Canonical types consumed by the store, the sync service and the CLI.
// Wire shapes live in hearth-api; `convert` maps between the two.

mod area;
mod entity;

pub use area::{Area, Floor, Label};
pub use entity::{Domain, Entity, predict_toggle, toggle_service};
