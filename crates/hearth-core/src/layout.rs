// ── Ordered views and cached layout ──
//
// Pure sorting over store snapshots plus the rank maps held by the sync
// service. The cached snapshot lets a consumer render the last known
// layout before the socket authenticates.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::model::{Area, Entity, Floor};
use crate::store::RegistryStore;
use crate::sync::{KEY_LAYOUT, KeyValueStore, OrderMap, OrderSyncService, Scope};

/// Sort key placing `None` after every `Some`.
fn last_if_none<T: Copy + Default>(value: Option<T>) -> (bool, T) {
    (value.is_none(), value.unwrap_or_default())
}

/// Areas sorted by floor level, then room rank, then name.
pub fn order_rooms(areas: &[Arc<Area>], floors: &[Arc<Floor>], ranks: &OrderMap) -> Vec<Arc<Area>> {
    let levels: HashMap<&str, Option<i32>> = floors
        .iter()
        .map(|f| (f.floor_id.as_str(), f.level))
        .collect();

    let mut rooms = areas.to_vec();
    rooms.sort_by_cached_key(|area| {
        let level = area
            .floor_id
            .as_deref()
            .and_then(|id| levels.get(id).copied().flatten());
        (
            last_if_none(level),
            last_if_none(ranks.get(&area.area_id).copied()),
            area.name.to_lowercase(),
            area.area_id.clone(),
        )
    });
    rooms
}

/// Visible entities of one room and domain, by rank then display name.
///
/// Registry-hidden entities and entities with a visibility override
/// are left out.
pub fn order_entities(
    entities: &[Arc<Entity>],
    area_id: &str,
    domain: &str,
    ranks: &OrderMap,
    hidden: &BTreeSet<String>,
) -> Vec<Arc<Entity>> {
    let mut visible: Vec<Arc<Entity>> = entities
        .iter()
        .filter(|e| e.area_id.as_deref() == Some(area_id) && e.domain() == domain)
        .filter(|e| !e.hidden && !hidden.contains(&e.entity_id))
        .cloned()
        .collect();
    visible.sort_by_cached_key(|e| {
        (
            last_if_none(ranks.get(&e.entity_id).copied()),
            e.display_name().to_lowercase(),
            e.entity_id.clone(),
        )
    });
    visible
}

// ── Layout snapshot ──────────────────────────────────────────────────

/// One room in a cached layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomLayout {
    pub area: Area,
    /// `domain -> ordered entity ids`.
    pub domains: BTreeMap<String, Vec<String>>,
}

/// Last known floors, room order and per-room entity order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutSnapshot {
    pub floors: Vec<Floor>,
    pub rooms: Vec<RoomLayout>,
    pub captured_at: DateTime<Utc>,
}

impl LayoutSnapshot {
    /// Build from the current store contents and local ranks.
    pub async fn capture(store: &RegistryStore, sync: &OrderSyncService) -> Result<Self, CoreError> {
        let floors = store.floors_snapshot();
        let entities = store.entities_snapshot();
        let room_ranks = sync.order_map(&Scope::Rooms).await?;
        let hidden = sync.hidden().await?;

        let mut rooms = Vec::new();
        for area in order_rooms(&store.areas_snapshot(), &floors, &room_ranks) {
            let domains: BTreeSet<&str> = entities
                .iter()
                .filter(|e| e.area_id.as_deref() == Some(area.area_id.as_str()))
                .map(|e| e.domain())
                .collect();

            let mut ordered = BTreeMap::new();
            for domain in domains {
                let ranks = sync
                    .order_map(&Scope::room_domain(&area.area_id, domain))
                    .await?;
                let ids: Vec<String> =
                    order_entities(&entities, &area.area_id, domain, &ranks, &hidden)
                        .iter()
                        .map(|e| e.entity_id.clone())
                        .collect();
                if !ids.is_empty() {
                    ordered.insert(domain.to_owned(), ids);
                }
            }
            rooms.push(RoomLayout {
                area: (*area).clone(),
                domains: ordered,
            });
        }

        Ok(Self {
            floors: floors.iter().map(|f| (**f).clone()).collect(),
            rooms,
            captured_at: Utc::now(),
        })
    }

    pub async fn load(storage: &dyn KeyValueStore) -> Result<Option<Self>, CoreError> {
        match storage.get(KEY_LAYOUT).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    pub async fn save(&self, storage: &dyn KeyValueStore) -> Result<(), CoreError> {
        storage.set(KEY_LAYOUT, &serde_json::to_string(self)?).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn area(id: &str, name: &str, floor: Option<&str>) -> Arc<Area> {
        Arc::new(Area {
            area_id: id.into(),
            name: name.into(),
            floor_id: floor.map(Into::into),
            labels: Vec::new(),
            icon: None,
        })
    }

    fn floor(id: &str, level: Option<i32>) -> Arc<Floor> {
        Arc::new(Floor {
            floor_id: id.into(),
            name: id.into(),
            level,
            icon: None,
        })
    }

    fn light(id: &str, area: &str, name: &str) -> Arc<Entity> {
        let mut e = Entity::new(id);
        e.area_id = Some(area.into());
        e.name = Some(name.into());
        e.registered = true;
        Arc::new(e)
    }

    fn area_ids(rooms: &[Arc<Area>]) -> Vec<&str> {
        rooms.iter().map(|a| a.area_id.as_str()).collect()
    }

    #[test]
    fn rooms_sort_by_floor_then_rank_then_name() {
        let floors = vec![floor("ground", Some(0)), floor("upstairs", Some(1))];
        let areas = vec![
            area("bedroom", "Bedroom", Some("upstairs")),
            area("kitchen", "Kitchen", Some("ground")),
            area("hall", "Hall", Some("ground")),
            area("garage", "Garage", None),
            area("study", "Study", Some("upstairs")),
        ];
        let ranks = OrderMap::from([("study".into(), 10), ("kitchen".into(), 20)]);

        let ordered = order_rooms(&areas, &floors, &ranks);
        assert_eq!(
            area_ids(&ordered),
            vec!["kitchen", "hall", "study", "bedroom", "garage"]
        );
    }

    #[test]
    fn entities_exclude_hidden_and_sort_unranked_last() {
        let mut hidden_by_registry = Entity::new("light.closet");
        hidden_by_registry.area_id = Some("kitchen".into());
        hidden_by_registry.hidden = true;

        let entities = vec![
            light("light.ceiling", "kitchen", "Ceiling"),
            light("light.counter", "kitchen", "Counter"),
            light("light.accent", "kitchen", "Accent"),
            light("light.pantry", "kitchen", "Pantry"),
            light("light.desk", "office", "Desk"),
            Arc::new(hidden_by_registry),
        ];
        let ranks = OrderMap::from([("light.counter".into(), 10)]);
        let overrides = BTreeSet::from(["light.pantry".to_owned()]);

        let ordered = order_entities(&entities, "kitchen", "light", &ranks, &overrides);
        let ids: Vec<&str> = ordered.iter().map(|e| e.entity_id.as_str()).collect();
        assert_eq!(ids, vec!["light.counter", "light.accent", "light.ceiling"]);
    }
}
