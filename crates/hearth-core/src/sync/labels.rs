// ── Label name codec ──
//
// Synchronised metadata rides on registry labels named
// `<prefix><kind>-<rank:06>`. Label ids are slugs of the name, so the
// separator may come back as `_`; both decode.

use strum::{Display, EnumIter, EnumString};

/// What a synchronised label encodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum LabelKind {
    Order,
    FavScenes,
    FavRooms,
    FavEntities,
    Hidden,
}

/// Rank carried by `hidden` labels, which only mark presence.
pub const HIDDEN_RANK: i64 = 1;

/// Encodes and decodes owned label names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelCodec {
    prefix: String,
}

impl LabelCodec {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn encode(&self, kind: LabelKind, rank: i64) -> String {
        format!("{}{kind}-{rank:06}", self.prefix)
    }

    /// Decode a label name or id. Foreign labels yield `None`.
    pub fn decode(&self, name: &str) -> Option<(LabelKind, i64)> {
        let body = name.strip_prefix(&self.prefix)?;
        let (kind, digits) = body.rsplit_once(['-', '_'])?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let kind = kind.parse().ok()?;
        let rank = digits.parse().ok()?;
        Some((kind, rank))
    }

    /// Whether this client owns the label.
    pub fn is_owned(&self, name: &str) -> bool {
        self.decode(name).is_some()
    }
}
