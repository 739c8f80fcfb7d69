// ── Ordering ──

mod fractional;

pub use fractional::{OrderConfig, OrderEngine, RankPlan, RankedItem};
