// Registry wire models and typed commands.
//
// Field names follow the remote's JSON. Optional fields default so newer
// servers with extra or missing keys still deserialize.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::connection::{Connection, WsCommand};
use crate::error::Error;

// ── Wire models ──────────────────────────────────────────────────────

/// Entry of the entity registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRegistryEntry {
    pub entity_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub original_name: Option<String>,
    #[serde(default)]
    pub area_id: Option<String>,
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default)]
    pub labels: Vec<String>,
    /// Set when a user or integration hid the entity.
    #[serde(default)]
    pub hidden_by: Option<String>,
    #[serde(default)]
    pub disabled_by: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub platform: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaEntry {
    pub area_id: String,
    pub name: String,
    #[serde(default)]
    pub floor_id: Option<String>,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub icon: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FloorEntry {
    pub floor_id: String,
    pub name: String,
    #[serde(default)]
    pub level: Option<i32>,
    #[serde(default)]
    pub icon: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelEntry {
    pub label_id: String,
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
}

/// Live state of one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateObject {
    pub entity_id: String,
    pub state: String,
    #[serde(default)]
    pub attributes: Map<String, Value>,
    #[serde(default)]
    pub last_changed: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
}

/// `data` of a `state_changed` event. `new_state` is `None` on removal.
#[derive(Debug, Clone, Deserialize)]
pub struct StateChangedData {
    pub entity_id: String,
    #[serde(default)]
    pub old_state: Option<StateObject>,
    #[serde(default)]
    pub new_state: Option<StateObject>,
}

// ── Commands ─────────────────────────────────────────────────────────

macro_rules! list_command {
    ($name:ident, $kind:literal, $resp:ty) => {
        #[derive(Debug, Clone, Default, Serialize)]
        pub struct $name {}

        impl WsCommand for $name {
            const TYPE: &'static str = $kind;
            type Response = $resp;
        }
    };
}

list_command!(GetStates, "get_states", Vec<StateObject>);
list_command!(
    ListEntityRegistry,
    "config/entity_registry/list",
    Vec<EntityRegistryEntry>
);
list_command!(ListAreas, "config/area_registry/list", Vec<AreaEntry>);
list_command!(ListFloors, "config/floor_registry/list", Vec<FloorEntry>);
list_command!(ListLabels, "config/label_registry/list", Vec<LabelEntry>);
list_command!(Ping, "ping", Value);

#[derive(Debug, Clone, Serialize)]
pub struct SubscribeEvents {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
}

impl WsCommand for SubscribeEvents {
    const TYPE: &'static str = "subscribe_events";
    type Response = Value;
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateLabel {
    pub name: String,
}

impl WsCommand for CreateLabel {
    const TYPE: &'static str = "config/label_registry/create";
    type Response = LabelEntry;
}

#[derive(Debug, Clone, Serialize)]
pub struct DeleteLabel {
    pub label_id: String,
}

impl WsCommand for DeleteLabel {
    const TYPE: &'static str = "config/label_registry/delete";
    type Response = Value;
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdateEntityLabels {
    pub entity_id: String,
    pub labels: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EntityUpdateResponse {
    pub entity_entry: EntityRegistryEntry,
}

impl WsCommand for UpdateEntityLabels {
    const TYPE: &'static str = "config/entity_registry/update";
    type Response = EntityUpdateResponse;
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdateAreaLabels {
    pub area_id: String,
    pub labels: Vec<String>,
}

impl WsCommand for UpdateAreaLabels {
    const TYPE: &'static str = "config/area_registry/update";
    type Response = AreaEntry;
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceTarget {
    pub entity_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CallService {
    pub domain: String,
    pub service: String,
    pub target: ServiceTarget,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub service_data: Map<String, Value>,
}

impl CallService {
    pub fn for_entity(domain: &str, service: &str, entity_id: &str) -> Self {
        Self {
            domain: domain.to_owned(),
            service: service.to_owned(),
            target: ServiceTarget {
                entity_id: entity_id.to_owned(),
            },
            service_data: Map::new(),
        }
    }
}

impl WsCommand for CallService {
    const TYPE: &'static str = "call_service";
    type Response = Value;
}

// ── Convenience methods ──────────────────────────────────────────────

impl Connection {
    pub async fn get_states(&self) -> Result<Vec<StateObject>, Error> {
        self.request(&GetStates {}).await
    }

    pub async fn list_entity_registry(&self) -> Result<Vec<EntityRegistryEntry>, Error> {
        self.request(&ListEntityRegistry {}).await
    }

    pub async fn list_areas(&self) -> Result<Vec<AreaEntry>, Error> {
        self.request(&ListAreas {}).await
    }

    pub async fn list_floors(&self) -> Result<Vec<FloorEntry>, Error> {
        self.request(&ListFloors {}).await
    }

    pub async fn list_labels(&self) -> Result<Vec<LabelEntry>, Error> {
        self.request(&ListLabels {}).await
    }

    /// Subscribe to one event type; returns the subscription id.
    pub async fn subscribe_events(&self, event_type: &str) -> Result<u64, Error> {
        let command = SubscribeEvents {
            event_type: Some(event_type.to_owned()),
        };
        let (id, _) = self.request_tracked(&command).await?;
        Ok(id)
    }

    pub async fn create_label(&self, name: &str) -> Result<LabelEntry, Error> {
        self.request(&CreateLabel {
            name: name.to_owned(),
        })
        .await
    }

    pub async fn delete_label(&self, label_id: &str) -> Result<(), Error> {
        self.request(&DeleteLabel {
            label_id: label_id.to_owned(),
        })
        .await
        .map(|_| ())
    }

    /// Replace the full label set of an entity.
    pub async fn set_entity_labels(
        &self,
        entity_id: &str,
        labels: Vec<String>,
    ) -> Result<EntityRegistryEntry, Error> {
        let response = self
            .request(&UpdateEntityLabels {
                entity_id: entity_id.to_owned(),
                labels,
            })
            .await?;
        Ok(response.entity_entry)
    }

    /// Replace the full label set of an area.
    pub async fn set_area_labels(
        &self,
        area_id: &str,
        labels: Vec<String>,
    ) -> Result<AreaEntry, Error> {
        self.request(&UpdateAreaLabels {
            area_id: area_id.to_owned(),
            labels,
        })
        .await
    }

    pub async fn call_service(&self, command: &CallService) -> Result<(), Error> {
        self.request(command).await.map(|_| ())
    }
}
