// ── Wire-to-domain conversions ──
//
// Bridges hearth-api's wire shapes into the canonical domain model.

use hearth_api::{AreaEntry, EntityRegistryEntry, FloorEntry, LabelEntry, StateObject};

use crate::model::{Area, Entity, Floor, Label};

impl From<AreaEntry> for Area {
    fn from(entry: AreaEntry) -> Self {
        Self {
            area_id: entry.area_id,
            name: entry.name,
            floor_id: entry.floor_id,
            labels: entry.labels,
            icon: entry.icon,
        }
    }
}

impl From<FloorEntry> for Floor {
    fn from(entry: FloorEntry) -> Self {
        Self {
            floor_id: entry.floor_id,
            name: entry.name,
            level: entry.level,
            icon: entry.icon,
        }
    }
}

impl From<LabelEntry> for Label {
    fn from(entry: LabelEntry) -> Self {
        Self {
            label_id: entry.label_id,
            name: entry.name,
            color: entry.color,
        }
    }
}

impl Entity {
    /// Overwrite the registry half of this entity.
    pub(crate) fn apply_registry(&mut self, entry: EntityRegistryEntry) {
        self.registered = true;
        self.name = entry.name;
        self.original_name = entry.original_name;
        self.area_id = entry.area_id;
        self.device_id = entry.device_id;
        self.labels = entry.labels;
        self.hidden = entry.hidden_by.is_some();
        self.disabled = entry.disabled_by.is_some();
    }

    /// Forget the registry half, keeping live state.
    pub(crate) fn clear_registry(&mut self) {
        self.registered = false;
        self.name = None;
        self.original_name = None;
        self.area_id = None;
        self.device_id = None;
        self.labels.clear();
        self.hidden = false;
        self.disabled = false;
    }

    /// Overwrite the live-state half of this entity.
    pub(crate) fn apply_state(&mut self, state: StateObject) {
        self.state = Some(state.state);
        self.attributes = state.attributes;
        self.last_changed = state.last_changed;
    }
}

impl From<EntityRegistryEntry> for Entity {
    fn from(entry: EntityRegistryEntry) -> Self {
        let mut entity = Self::new(entry.entity_id.clone());
        entity.apply_registry(entry);
        entity
    }
}

impl From<StateObject> for Entity {
    fn from(state: StateObject) -> Self {
        let mut entity = Self::new(state.entity_id.clone());
        entity.apply_state(state);
        entity
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn registry_and_state_merge() {
        let entry: EntityRegistryEntry = serde_json::from_value(json!({
            "entity_id": "light.desk",
            "area_id": "study",
            "labels": ["hearth_order-000010"],
            "hidden_by": "user"
        }))
        .unwrap();
        let state: StateObject = serde_json::from_value(json!({
            "entity_id": "light.desk",
            "state": "on",
            "attributes": { "friendly_name": "Desk" }
        }))
        .unwrap();

        let mut entity = Entity::from(entry);
        entity.apply_state(state);

        assert!(entity.registered);
        assert!(entity.hidden);
        assert_eq!(entity.area_id.as_deref(), Some("study"));
        assert_eq!(entity.state.as_deref(), Some("on"));
        assert_eq!(entity.display_name(), "Desk");
    }
}
