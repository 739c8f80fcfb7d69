// In-memory label registry for sync tests.
#![allow(clippy::unwrap_used)]

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;

use super::remote::{Assignment, LabelRegistry};
use super::scope::Target;
use crate::error::CoreError;
use crate::model::Label;

#[derive(Default)]
struct State {
    labels: BTreeMap<String, Label>,
    targets: BTreeMap<Target, Assignment>,
}

#[derive(Default)]
pub(crate) struct FakeRegistry {
    state: Mutex<State>,
    pub(crate) fail_writes: AtomicBool,
    pub(crate) writes: AtomicUsize,
}

#[allow(clippy::unwrap_used)]
impl FakeRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add_area(&self, area_id: &str) {
        let target = Target::Area(area_id.to_owned());
        self.state.lock().unwrap().targets.insert(
            target.clone(),
            Assignment {
                target,
                area_id: None,
                domain: None,
                labels: Vec::new(),
            },
        );
    }

    pub(crate) fn add_entity(&self, entity_id: &str, area_id: &str) {
        let target = Target::Entity(entity_id.to_owned());
        let domain = entity_id.split_once('.').map(|(d, _)| d.to_owned());
        self.state.lock().unwrap().targets.insert(
            target.clone(),
            Assignment {
                target,
                area_id: Some(area_id.to_owned()),
                domain,
                labels: Vec::new(),
            },
        );
    }

    /// Label names attached to a target, sorted.
    pub(crate) fn names_on(&self, target: &Target) -> Vec<String> {
        let state = self.state.lock().unwrap();
        let mut names: Vec<String> = state
            .targets
            .get(target)
            .map(|a| a.labels.clone())
            .unwrap_or_default()
            .iter()
            .map(|id| state.labels.get(id).map_or_else(|| id.clone(), |l| l.name.clone()))
            .collect();
        names.sort();
        names
    }

    /// Every `(target, label name)` pair, sorted.
    pub(crate) fn all_names(&self) -> Vec<(Target, String)> {
        let targets: Vec<Target> = self.state.lock().unwrap().targets.keys().cloned().collect();
        let mut out = Vec::new();
        for target in targets {
            for name in self.names_on(&target) {
                out.push((target.clone(), name));
            }
        }
        out
    }

    pub(crate) fn label_count(&self) -> usize {
        self.state.lock().unwrap().labels.len()
    }

    /// Attach an arbitrary label directly, bypassing the service.
    pub(crate) fn attach_raw(&self, target: &Target, name: &str) {
        self.attach_with_id(target, &name.replace('-', "_"), name);
    }

    /// Like [`attach_raw`](Self::attach_raw) with an explicit label id.
    pub(crate) fn attach_with_id(&self, target: &Target, id: &str, name: &str) {
        let mut state = self.state.lock().unwrap();
        let id = id.to_owned();
        state.labels.insert(
            id.clone(),
            Label {
                label_id: id.clone(),
                name: name.to_owned(),
                color: None,
            },
        );
        if let Some(a) = state.targets.get_mut(target) {
            a.labels.push(id);
        }
    }

    fn check_writable(&self) -> Result<(), CoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(CoreError::Rejected {
                code: "unauthorized".into(),
                message: "write rejected".into(),
            });
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
#[allow(clippy::unwrap_used)]
impl LabelRegistry for FakeRegistry {
    fn labels(&self) -> Vec<Label> {
        self.state.lock().unwrap().labels.values().cloned().collect()
    }

    fn assignments(&self) -> Vec<Assignment> {
        self.state
            .lock()
            .unwrap()
            .targets
            .values()
            .filter(|a| !a.labels.is_empty())
            .cloned()
            .collect()
    }

    fn labels_of(&self, target: &Target) -> Option<Vec<String>> {
        self.state
            .lock()
            .unwrap()
            .targets
            .get(target)
            .map(|a| a.labels.clone())
    }

    async fn create_label(&self, name: &str) -> Result<Label, CoreError> {
        self.check_writable()?;
        let mut state = self.state.lock().unwrap();
        if state.labels.values().any(|l| l.name == name) {
            return Err(CoreError::Rejected {
                code: "invalid_info".into(),
                message: format!("label {name} already exists"),
            });
        }
        let label = Label {
            label_id: name.replace('-', "_"),
            name: name.to_owned(),
            color: None,
        };
        state.labels.insert(label.label_id.clone(), label.clone());
        Ok(label)
    }

    async fn delete_label(&self, label_id: &str) -> Result<(), CoreError> {
        self.check_writable()?;
        let mut state = self.state.lock().unwrap();
        state.labels.remove(label_id);
        for a in state.targets.values_mut() {
            a.labels.retain(|l| l != label_id);
        }
        Ok(())
    }

    async fn set_labels(&self, target: &Target, labels: Vec<String>) -> Result<(), CoreError> {
        self.check_writable()?;
        let mut state = self.state.lock().unwrap();
        let assignment = state
            .targets
            .get_mut(target)
            .ok_or_else(|| CoreError::not_found("Target", target.id()))?;
        assignment.labels = labels;
        Ok(())
    }
}
