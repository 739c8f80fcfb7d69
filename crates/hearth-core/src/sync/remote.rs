// ── Remote label registry ──
//
// The sync service sees the hub as a namespaced key-value store: list the
// labels, list which targets carry which labels, and replace a target's
// full label set. Reads come from the registry store; writes go over the
// socket and land in the store only once acknowledged.

use std::sync::Arc;

use async_trait::async_trait;
use hearth_api::Connection;

use super::scope::Target;
use crate::error::CoreError;
use crate::model::Label;
use crate::store::RegistryStore;

/// Current label set of one target, with the context needed to place
/// it in a scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub target: Target,
    /// Room of an entity (`None` for areas and unassigned entities).
    pub area_id: Option<String>,
    /// Domain of an entity (`None` for areas).
    pub domain: Option<String>,
    pub labels: Vec<String>,
}

/// Label operations the sync service needs.
#[async_trait]
pub trait LabelRegistry: Send + Sync {
    /// Every label currently defined.
    fn labels(&self) -> Vec<Label>;

    /// Every target that carries at least one label.
    fn assignments(&self) -> Vec<Assignment>;

    /// Current label ids of one target, or `None` if it does not exist.
    fn labels_of(&self, target: &Target) -> Option<Vec<String>>;

    async fn create_label(&self, name: &str) -> Result<Label, CoreError>;

    async fn delete_label(&self, label_id: &str) -> Result<(), CoreError>;

    /// Replace the full label set of a target.
    async fn set_labels(&self, target: &Target, labels: Vec<String>) -> Result<(), CoreError>;
}

/// [`LabelRegistry`] backed by the live socket and the registry store.
pub struct HubRegistry {
    connection: Connection,
    store: Arc<RegistryStore>,
}

impl HubRegistry {
    pub fn new(connection: Connection, store: Arc<RegistryStore>) -> Self {
        Self { connection, store }
    }
}

#[async_trait]
impl LabelRegistry for HubRegistry {
    fn labels(&self) -> Vec<Label> {
        self.store
            .labels_snapshot()
            .iter()
            .map(|l| (**l).clone())
            .collect()
    }

    fn assignments(&self) -> Vec<Assignment> {
        let areas = self.store.areas_snapshot();
        let entities = self.store.entities_snapshot();

        let area_rows = areas
            .iter()
            .filter(|a| !a.labels.is_empty())
            .map(|a| Assignment {
                target: Target::Area(a.area_id.clone()),
                area_id: None,
                domain: None,
                labels: a.labels.clone(),
            });
        let entity_rows = entities
            .iter()
            .filter(|e| e.registered && !e.labels.is_empty())
            .map(|e| Assignment {
                target: Target::Entity(e.entity_id.clone()),
                area_id: e.area_id.clone(),
                domain: Some(e.domain().to_owned()),
                labels: e.labels.clone(),
            });
        area_rows.chain(entity_rows).collect()
    }

    fn labels_of(&self, target: &Target) -> Option<Vec<String>> {
        match target {
            Target::Area(id) => self.store.area(id).map(|a| a.labels.clone()),
            Target::Entity(id) => self
                .store
                .entity(id)
                .filter(|e| e.registered)
                .map(|e| e.labels.clone()),
        }
    }

    async fn create_label(&self, name: &str) -> Result<Label, CoreError> {
        let entry = self.connection.create_label(name).await?;
        tracing::debug!(label = %entry.label_id, name, "Label created");
        self.store.upsert_label(entry.clone());
        Ok(Label::from(entry))
    }

    async fn delete_label(&self, label_id: &str) -> Result<(), CoreError> {
        self.connection.delete_label(label_id).await?;
        tracing::debug!(label = label_id, "Label deleted");
        self.store.remove_label(label_id);
        Ok(())
    }

    async fn set_labels(&self, target: &Target, labels: Vec<String>) -> Result<(), CoreError> {
        match target {
            Target::Entity(id) => {
                let entry = self.connection.set_entity_labels(id, labels).await?;
                self.store.apply_entity_entry(entry);
            }
            Target::Area(id) => {
                let entry = self.connection.set_area_labels(id, labels).await?;
                self.store.apply_area_entry(entry);
            }
        }
        Ok(())
    }
}
