// ── Area, floor and label types ──

use serde::{Deserialize, Serialize};

/// A room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Area {
    pub area_id: String,
    pub name: String,
    pub floor_id: Option<String>,
    /// Label ids, in registry order.
    pub labels: Vec<String>,
    pub icon: Option<String>,
}

impl Area {
    pub fn has_label(&self, label_id: &str) -> bool {
        self.labels.iter().any(|l| l == label_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Floor {
    pub floor_id: String,
    pub name: String,
    /// Ordering rank; lower floors first.
    pub level: Option<i32>,
    pub icon: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub label_id: String,
    pub name: String,
    pub color: Option<String>,
}
