// ── Ordering scopes ──

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use super::labels::LabelKind;

/// A favorites section.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Section {
    Scenes,
    Rooms,
    Entities,
}

impl Section {
    pub fn label_kind(self) -> LabelKind {
        match self {
            Self::Scenes => LabelKind::FavScenes,
            Self::Rooms => LabelKind::FavRooms,
            Self::Entities => LabelKind::FavEntities,
        }
    }

    pub fn from_label_kind(kind: LabelKind) -> Option<Self> {
        match kind {
            LabelKind::FavScenes => Some(Self::Scenes),
            LabelKind::FavRooms => Some(Self::Rooms),
            LabelKind::FavEntities => Some(Self::Entities),
            LabelKind::Order | LabelKind::Hidden => None,
        }
    }
}

/// What a label is attached to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Target {
    Entity(String),
    Area(String),
}

impl Target {
    pub fn id(&self) -> &str {
        match self {
            Self::Entity(id) | Self::Area(id) => id,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Entity(id) => write!(f, "entity {id}"),
            Self::Area(id) => write!(f, "area {id}"),
        }
    }
}

/// One independently ordered collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum Scope {
    /// Room order.
    Rooms,
    /// Entity order within one room and domain.
    RoomDomain { area_id: String, domain: String },
    Favorites { section: Section },
}

impl Scope {
    pub fn room_domain(area_id: impl Into<String>, domain: impl Into<String>) -> Self {
        Self::RoomDomain {
            area_id: area_id.into(),
            domain: domain.into(),
        }
    }

    pub fn favorites(section: Section) -> Self {
        Self::Favorites { section }
    }

    /// Local storage key holding this scope's order map.
    pub fn storage_key(&self) -> String {
        match self {
            Self::Rooms => "hearth.order.rooms".to_owned(),
            Self::RoomDomain { area_id, domain } => {
                format!("hearth.order.room.{area_id}.{domain}")
            }
            Self::Favorites { section } => format!("hearth.favorites.{section}"),
        }
    }

    pub fn label_kind(&self) -> LabelKind {
        match self {
            Self::Rooms | Self::RoomDomain { .. } => LabelKind::Order,
            Self::Favorites { section } => section.label_kind(),
        }
    }

    /// Registry object an item id of this scope refers to.
    pub fn target(&self, id: &str) -> Target {
        match self {
            Self::Rooms
            | Self::Favorites {
                section: Section::Rooms,
            } => Target::Area(id.to_owned()),
            Self::RoomDomain { .. }
            | Self::Favorites {
                section: Section::Scenes | Section::Entities,
            } => Target::Entity(id.to_owned()),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rooms => f.write_str("rooms"),
            Self::RoomDomain { area_id, domain } => write!(f, "room {area_id}/{domain}"),
            Self::Favorites { section } => write!(f, "favorites/{section}"),
        }
    }
}
