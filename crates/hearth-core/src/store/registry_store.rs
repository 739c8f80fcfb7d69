// ── Registry state store ──
//
// Single mutable source of truth for remote-mirrored data. Mutated only
// by inbound frames and by acknowledged remote writes; never
// speculatively.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use hearth_api::{
    AreaEntry, EntityRegistryEntry, FloorEntry, LabelEntry, StateChangedData, StateObject,
};
use tokio::sync::{broadcast, watch};

use super::collection::Collection;
use crate::model::{Area, Entity, Floor, Label};
use crate::stream::EntityStream;

const STATE_CHANNEL_CAPACITY: usize = 1024;

/// One inbound state transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateChange {
    pub entity_id: String,
    pub old: Option<String>,
    /// `None` when the entity was removed.
    pub new: Option<String>,
}

/// Inputs of a full refresh.
#[derive(Debug, Default)]
pub struct RegistrySnapshot {
    pub entities: Vec<EntityRegistryEntry>,
    pub states: Vec<StateObject>,
    pub areas: Vec<AreaEntry>,
    pub floors: Vec<FloorEntry>,
    pub labels: Vec<LabelEntry>,
}

/// Reactive store for entities, areas, floors and labels.
///
/// Two notification channels: per-frame state changes (broadcast) and a
/// registry version (watch) bumped after any registry mutation.
pub struct RegistryStore {
    entities: Collection<Entity>,
    areas: Collection<Area>,
    floors: Collection<Floor>,
    labels: Collection<Label>,
    state_changes: broadcast::Sender<StateChange>,
    registry_version: watch::Sender<u64>,
    last_full_refresh: watch::Sender<Option<DateTime<Utc>>>,
}

impl Default for RegistryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistryStore {
    pub fn new() -> Self {
        let (state_changes, _) = broadcast::channel(STATE_CHANNEL_CAPACITY);
        let (registry_version, _) = watch::channel(0u64);
        let (last_full_refresh, _) = watch::channel(None);

        Self {
            entities: Collection::new(),
            areas: Collection::new(),
            floors: Collection::new(),
            labels: Collection::new(),
            state_changes,
            registry_version,
            last_full_refresh,
        }
    }

    // ── Bulk application ─────────────────────────────────────────────

    /// Replace everything from a full refresh.
    pub fn apply_snapshot(&self, snapshot: RegistrySnapshot) {
        let mut merged: HashMap<String, Entity> = HashMap::new();
        for entry in snapshot.entities {
            merged.insert(entry.entity_id.clone(), Entity::from(entry));
        }
        for state in snapshot.states {
            match merged.get_mut(&state.entity_id) {
                Some(entity) => entity.apply_state(state),
                None => {
                    merged.insert(state.entity_id.clone(), Entity::from(state));
                }
            }
        }

        self.entities.replace_all(merged);
        self.areas.replace_all(
            snapshot
                .areas
                .into_iter()
                .map(|a| (a.area_id.clone(), Area::from(a))),
        );
        self.floors.replace_all(
            snapshot
                .floors
                .into_iter()
                .map(|f| (f.floor_id.clone(), Floor::from(f))),
        );
        self.labels.replace_all(
            snapshot
                .labels
                .into_iter()
                .map(|l| (l.label_id.clone(), Label::from(l))),
        );

        let _ = self.last_full_refresh.send(Some(Utc::now()));
        self.bump_registry();
        tracing::debug!(
            entities = self.entities.len(),
            areas = self.areas.len(),
            floors = self.floors.len(),
            labels = self.labels.len(),
            "Registry snapshot applied"
        );
    }

    /// Re-list of the entity registry; live state is kept.
    pub fn replace_entity_registry(&self, entries: Vec<EntityRegistryEntry>) {
        let mut fresh: HashMap<String, EntityRegistryEntry> = entries
            .into_iter()
            .map(|e| (e.entity_id.clone(), e))
            .collect();

        let mut merged: Vec<(String, Entity)> = Vec::new();
        for key in self.entities.keys() {
            let Some(current) = self.entities.get(&key) else {
                continue;
            };
            let mut entity = (*current).clone();
            match fresh.remove(&key) {
                Some(entry) => entity.apply_registry(entry),
                None if entity.state.is_some() => entity.clear_registry(),
                None => continue,
            }
            merged.push((key, entity));
        }
        merged.extend(
            fresh
                .into_iter()
                .map(|(key, entry)| (key, Entity::from(entry))),
        );

        self.entities.replace_all(merged);
        self.bump_registry();
    }

    pub fn replace_areas(&self, areas: Vec<AreaEntry>) {
        self.areas
            .replace_all(areas.into_iter().map(|a| (a.area_id.clone(), Area::from(a))));
        self.bump_registry();
    }

    pub fn replace_floors(&self, floors: Vec<FloorEntry>) {
        self.floors.replace_all(
            floors
                .into_iter()
                .map(|f| (f.floor_id.clone(), Floor::from(f))),
        );
        self.bump_registry();
    }

    pub fn replace_labels(&self, labels: Vec<LabelEntry>) {
        self.labels.replace_all(
            labels
                .into_iter()
                .map(|l| (l.label_id.clone(), Label::from(l))),
        );
        self.bump_registry();
    }

    // ── Acknowledged writes ──────────────────────────────────────────

    /// Apply the entity entry returned by a successful registry update.
    pub fn apply_entity_entry(&self, entry: EntityRegistryEntry) {
        let key = entry.entity_id.clone();
        let mut entity = self
            .entities
            .get(&key)
            .map_or_else(|| Entity::new(key.clone()), |e| (*e).clone());
        entity.apply_registry(entry);
        self.entities.upsert(key, entity);
        self.bump_registry();
    }

    /// Apply the area entry returned by a successful registry update.
    pub fn apply_area_entry(&self, entry: AreaEntry) {
        self.areas.upsert(entry.area_id.clone(), Area::from(entry));
        self.bump_registry();
    }

    pub fn upsert_label(&self, entry: LabelEntry) {
        self.labels.upsert(entry.label_id.clone(), Label::from(entry));
        self.bump_registry();
    }

    pub fn remove_label(&self, label_id: &str) {
        if self.labels.remove(label_id).is_some() {
            self.bump_registry();
        }
    }

    // ── Push frames ──────────────────────────────────────────────────

    /// Apply a `state_changed` event verbatim and notify subscribers.
    pub fn apply_state_changed(&self, data: StateChangedData) -> StateChange {
        let key = data.entity_id.clone();
        let current = self.entities.get(&key);
        let old = current.as_ref().and_then(|e| e.state.clone());

        let new = match data.new_state {
            Some(state) => {
                let mut entity = current.map_or_else(|| Entity::new(key.clone()), |e| (*e).clone());
                entity.apply_state(state);
                let new = entity.state.clone();
                self.entities.upsert(key.clone(), entity);
                new
            }
            None => {
                match current {
                    Some(e) if e.registered => {
                        let mut entity = (*e).clone();
                        entity.state = None;
                        self.entities.upsert(key.clone(), entity);
                    }
                    Some(_) => {
                        self.entities.remove(&key);
                    }
                    None => {}
                }
                None
            }
        };

        let change = StateChange {
            entity_id: key,
            old,
            new,
        };
        // Nobody listening is fine.
        let _ = self.state_changes.send(change.clone());
        change
    }

    // ── Lookups ──────────────────────────────────────────────────────

    pub fn entity(&self, entity_id: &str) -> Option<Arc<Entity>> {
        self.entities.get(entity_id)
    }

    pub fn area(&self, area_id: &str) -> Option<Arc<Area>> {
        self.areas.get(area_id)
    }

    pub fn floor(&self, floor_id: &str) -> Option<Arc<Floor>> {
        self.floors.get(floor_id)
    }

    pub fn label(&self, label_id: &str) -> Option<Arc<Label>> {
        self.labels.get(label_id)
    }

    /// Find a label by its display name.
    pub fn label_by_name(&self, name: &str) -> Option<Arc<Label>> {
        self.labels
            .snapshot()
            .iter()
            .find(|l| l.name == name)
            .cloned()
    }

    // ── Snapshots ────────────────────────────────────────────────────

    pub fn entities_snapshot(&self) -> Arc<Vec<Arc<Entity>>> {
        self.entities.snapshot()
    }

    pub fn areas_snapshot(&self) -> Arc<Vec<Arc<Area>>> {
        self.areas.snapshot()
    }

    pub fn floors_snapshot(&self) -> Arc<Vec<Arc<Floor>>> {
        self.floors.snapshot()
    }

    pub fn labels_snapshot(&self) -> Arc<Vec<Arc<Label>>> {
        self.labels.snapshot()
    }

    // ── Subscriptions ────────────────────────────────────────────────

    pub fn subscribe_entities(&self) -> EntityStream<Entity> {
        EntityStream::new(self.entities.subscribe())
    }

    pub fn subscribe_areas(&self) -> EntityStream<Area> {
        EntityStream::new(self.areas.subscribe())
    }

    pub fn subscribe_floors(&self) -> EntityStream<Floor> {
        EntityStream::new(self.floors.subscribe())
    }

    pub fn subscribe_labels(&self) -> EntityStream<Label> {
        EntityStream::new(self.labels.subscribe())
    }

    /// High-frequency channel: one message per inbound state frame.
    pub fn subscribe_state_changes(&self) -> broadcast::Receiver<StateChange> {
        self.state_changes.subscribe()
    }

    /// Low-frequency channel: version bumped after registry mutations.
    pub fn registry_changed(&self) -> watch::Receiver<u64> {
        self.registry_version.subscribe()
    }

    pub fn registry_version(&self) -> u64 {
        *self.registry_version.borrow()
    }

    pub fn last_full_refresh(&self) -> Option<DateTime<Utc>> {
        *self.last_full_refresh.borrow()
    }

    // ── Counts ───────────────────────────────────────────────────────

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn area_count(&self) -> usize {
        self.areas.len()
    }

    fn bump_registry(&self) {
        self.registry_version.send_modify(|v| *v += 1);
    }
}
