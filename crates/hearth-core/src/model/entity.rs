// ── Entity domain types ──

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::{Display, EnumString};

/// Well-known entity domains. Anything else parses as [`Domain::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum Domain {
    Light,
    Switch,
    Fan,
    Cover,
    Lock,
    Scene,
    Script,
    Climate,
    MediaPlayer,
    Sensor,
    BinarySensor,
    #[strum(default)]
    Other(String),
}

impl Domain {
    pub fn of(entity_id: &str) -> Self {
        let prefix = entity_id
            .split_once('.')
            .map_or(entity_id, |(domain, _)| domain);
        prefix
            .parse()
            .unwrap_or_else(|_| Self::Other(prefix.to_owned()))
    }
}

/// A registry entity merged with its live state.
///
/// Registry fields come from the entity registry list; `state`,
/// `attributes` and `last_changed` from state frames. An entity seen only
/// in state frames has `registered == false`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub entity_id: String,
    pub registered: bool,
    pub name: Option<String>,
    pub original_name: Option<String>,
    pub area_id: Option<String>,
    pub device_id: Option<String>,
    /// Label ids, in registry order.
    pub labels: Vec<String>,
    /// Hidden in the registry by a user or integration.
    pub hidden: bool,
    pub disabled: bool,
    pub state: Option<String>,
    pub attributes: Map<String, Value>,
    pub last_changed: Option<DateTime<Utc>>,
}

impl Entity {
    /// Bare entity with only an id.
    pub fn new(entity_id: impl Into<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
            registered: false,
            name: None,
            original_name: None,
            area_id: None,
            device_id: None,
            labels: Vec::new(),
            hidden: false,
            disabled: false,
            state: None,
            attributes: Map::new(),
            last_changed: None,
        }
    }

    /// The prefix of the id before the first `.`.
    pub fn domain(&self) -> &str {
        self.entity_id
            .split_once('.')
            .map_or(self.entity_id.as_str(), |(domain, _)| domain)
    }

    pub fn domain_kind(&self) -> Domain {
        Domain::of(&self.entity_id)
    }

    /// `name` → `friendly_name` → `original_name` → `entity_id`.
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .or_else(|| self.attributes.get("friendly_name").and_then(Value::as_str))
            .or(self.original_name.as_deref())
            .unwrap_or(&self.entity_id)
    }

    pub fn has_label(&self, label_id: &str) -> bool {
        self.labels.iter().any(|l| l == label_id)
    }
}

/// Next state for a user toggle, or `None` if the state has no obvious
/// opposite (e.g. `unavailable`, sensors).
pub fn predict_toggle(state: &str) -> Option<&'static str> {
    match state {
        "on" => Some("off"),
        "off" => Some("on"),
        "open" | "opening" => Some("closed"),
        "closed" | "closing" => Some("open"),
        "locked" | "locking" => Some("unlocked"),
        "unlocked" | "unlocking" => Some("locked"),
        _ => None,
    }
}

/// Service that drives an entity of `domain` into `target` state.
pub fn toggle_service(domain: &Domain, target: &str) -> Option<&'static str> {
    match (domain, target) {
        (Domain::Cover, "open") => Some("open_cover"),
        (Domain::Cover, "closed") => Some("close_cover"),
        (Domain::Lock, "locked") => Some("lock"),
        (Domain::Lock, "unlocked") => Some("unlock"),
        (
            Domain::Sensor
            | Domain::BinarySensor
            | Domain::Scene
            | Domain::Script
            | Domain::Cover
            | Domain::Lock,
            _,
        ) => None,
        (_, "on") => Some("turn_on"),
        (_, "off") => Some("turn_off"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_is_prefix_before_first_dot() {
        let e = Entity::new("media_player.living.room");
        assert_eq!(e.domain(), "media_player");
        assert_eq!(e.domain_kind(), Domain::MediaPlayer);
        assert!(matches!(Domain::of("vacuum.robo"), Domain::Other(_)));
    }

    #[test]
    fn display_name_fallback_chain() {
        let mut e = Entity::new("light.desk");
        assert_eq!(e.display_name(), "light.desk");

        e.original_name = Some("Desk Lamp".into());
        assert_eq!(e.display_name(), "Desk Lamp");

        e.attributes
            .insert("friendly_name".into(), Value::from("Study Lamp"));
        assert_eq!(e.display_name(), "Study Lamp");

        e.name = Some("My Lamp".into());
        assert_eq!(e.display_name(), "My Lamp");
    }

    #[test]
    fn toggle_prediction_flips_binary_states() {
        assert_eq!(predict_toggle("on"), Some("off"));
        assert_eq!(predict_toggle("closed"), Some("open"));
        assert_eq!(predict_toggle("locked"), Some("unlocked"));
        assert_eq!(predict_toggle("unavailable"), None);
    }

    #[test]
    fn toggle_service_per_domain() {
        assert_eq!(toggle_service(&Domain::Cover, "open"), Some("open_cover"));
        assert_eq!(toggle_service(&Domain::Lock, "unlocked"), Some("unlock"));
        assert_eq!(toggle_service(&Domain::Light, "off"), Some("turn_off"));
        assert_eq!(toggle_service(&Domain::Sensor, "on"), None);
    }
}
