use serde::{Deserialize, Serialize};

use crate::errors::{CollectorError, Result};

/// Identifier of an OSM object. Ids are only unique per item type.
pub type ObjectId = i64;

/// Member ref used for "no reference": either explicitly absent in the input
/// or rewritten by the collector for members it does not track.
pub const NO_REF: ObjectId = 0;

/// Number of fixed-point units per degree of longitude or latitude.
pub const COORDINATE_PRECISION: f64 = 10_000_000.0;

/// Kinds of items that can be stored in a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    Node,
    Way,
    Relation,
    Area,
}

#[allow(clippy::should_implement_trait)]
impl ItemType {
    /// Returns the string representation of this item type.
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemType::Node => "node",
            ItemType::Way => "way",
            ItemType::Relation => "relation",
            ItemType::Area => "area",
        }
    }

    /// Parses a string into an `ItemType`, returning `None` for unrecognized values.
    pub fn from_str(s: &str) -> Option<ItemType> {
        match s {
            "node" => Some(ItemType::Node),
            "way" => Some(ItemType::Way),
            "relation" => Some(ItemType::Relation),
            "area" => Some(ItemType::Area),
            _ => None,
        }
    }

    /// Single-character abbreviation (`n`, `w`, `r`, `a`).
    pub fn as_char(&self) -> char {
        match self {
            ItemType::Node => 'n',
            ItemType::Way => 'w',
            ItemType::Relation => 'r',
            ItemType::Area => 'a',
        }
    }

    pub fn from_char(c: char) -> Option<ItemType> {
        match c {
            'n' => Some(ItemType::Node),
            'w' => Some(ItemType::Way),
            'r' => Some(ItemType::Relation),
            'a' => Some(ItemType::Area),
            _ => None,
        }
    }

    /// Tag byte stored in buffer item headers.
    pub(crate) fn to_byte(self) -> u8 {
        match self {
            ItemType::Node => 1,
            ItemType::Way => 2,
            ItemType::Relation => 3,
            ItemType::Area => 4,
        }
    }

    pub(crate) fn from_byte(b: u8) -> Option<ItemType> {
        match b {
            1 => Some(ItemType::Node),
            2 => Some(ItemType::Way),
            3 => Some(ItemType::Relation),
            4 => Some(ItemType::Area),
            _ => None,
        }
    }

    /// Index into per-member-type tables. Only nodes, ways and relations
    /// can be relation members.
    pub(crate) fn member_index(self) -> Option<usize> {
        match self {
            ItemType::Node => Some(0),
            ItemType::Way => Some(1),
            ItemType::Relation => Some(2),
            ItemType::Area => None,
        }
    }
}

/// A single `key=value` tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

/// Ordered list of tags attached to an object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagList(pub Vec<Tag>);

impl TagList {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Builds a tag list from `(key, value)` pairs.
    pub fn from_pairs<K: Into<String>, V: Into<String>>(
        pairs: impl IntoIterator<Item = (K, V)>,
    ) -> Self {
        Self(
            pairs
                .into_iter()
                .map(|(k, v)| Tag {
                    key: k.into(),
                    value: v.into(),
                })
                .collect(),
        )
    }

    /// Returns the value of the first tag with the given key.
    pub fn get_value_by_key(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|t| t.key == key)
            .map(|t| t.value.as_str())
    }

    pub fn has_key(&self, key: &str) -> bool {
        self.get_value_by_key(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tag> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns a copy of this list without any tag with the given key.
    pub fn without_key(&self, key: &str) -> TagList {
        TagList(self.0.iter().filter(|t| t.key != key).cloned().collect())
    }
}

/// A location stored as fixed-point longitude/latitude so that equality is exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    pub x: i32,
    pub y: i32,
}

impl Location {
    /// Creates a location from degrees, rounding to the fixed-point grid.
    pub fn new(lon: f64, lat: f64) -> Self {
        Self {
            x: (lon * COORDINATE_PRECISION).round() as i32,
            y: (lat * COORDINATE_PRECISION).round() as i32,
        }
    }

    pub fn lon(&self) -> f64 {
        f64::from(self.x) / COORDINATE_PRECISION
    }

    pub fn lat(&self) -> f64 {
        f64::from(self.y) / COORDINATE_PRECISION
    }

    /// Whether the location lies within the valid WGS84 range.
    pub fn valid(&self) -> bool {
        let max_x = (180.0 * COORDINATE_PRECISION) as i32;
        let max_y = (90.0 * COORDINATE_PRECISION) as i32;
        (-max_x..=max_x).contains(&self.x) && (-max_y..=max_y).contains(&self.y)
    }
}

/// A node reference inside a way, optionally carrying the node location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WayNode {
    #[serde(rename = "ref")]
    pub node_ref: ObjectId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

impl WayNode {
    pub fn new(node_ref: ObjectId, location: Location) -> Self {
        Self {
            node_ref,
            location: Some(location),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: ObjectId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    #[serde(default)]
    pub tags: TagList,
}

/// A linear record: an ordered sequence of node references.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Way {
    pub id: ObjectId,
    #[serde(default)]
    pub tags: TagList,
    #[serde(default)]
    pub nodes: Vec<WayNode>,
}

impl Way {
    /// Whether the first and last node reference the same node id.
    pub fn is_closed(&self) -> bool {
        match (self.nodes.first(), self.nodes.last()) {
            (Some(first), Some(last)) => first.node_ref == last.node_ref,
            _ => false,
        }
    }

    /// Whether the first and last node have the same known location.
    pub fn ends_have_same_location(&self) -> bool {
        match (self.nodes.first(), self.nodes.last()) {
            (Some(first), Some(last)) => match (first.location, last.location) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
            _ => false,
        }
    }
}

/// A reference from a relation to another object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationMember {
    #[serde(rename = "type")]
    pub member_type: ItemType,
    #[serde(rename = "ref")]
    pub member_ref: ObjectId,
    #[serde(default)]
    pub role: String,
}

impl RelationMember {
    pub fn new(member_type: ItemType, member_ref: ObjectId, role: &str) -> Self {
        Self {
            member_type,
            member_ref,
            role: role.to_string(),
        }
    }

    pub fn way(member_ref: ObjectId, role: &str) -> Self {
        Self::new(ItemType::Way, member_ref, role)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    pub id: ObjectId,
    #[serde(default)]
    pub tags: TagList,
    #[serde(default)]
    pub members: Vec<RelationMember>,
}

/// A closed ring of locations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ring {
    pub nodes: Vec<WayNode>,
}

/// An assembled polygon, built from a single closed way or from a relation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Area {
    pub id: ObjectId,
    #[serde(default)]
    pub tags: TagList,
    #[serde(default)]
    pub outer_rings: Vec<Ring>,
    #[serde(default)]
    pub inner_rings: Vec<Ring>,
}

fn id_overflow(object_id: ObjectId) -> CollectorError {
    CollectorError::Assembler {
        message: "object id too large for an area id".to_string(),
        object_id,
    }
}

impl Area {
    /// Area id for an area built from a way: `2 * way_id`.
    pub fn id_from_way(way_id: ObjectId) -> Result<ObjectId> {
        way_id.checked_mul(2).ok_or_else(|| id_overflow(way_id))
    }

    /// Area id for an area built from a relation: `2 * relation_id + 1`,
    /// mirrored for negative ids.
    pub fn id_from_relation(relation_id: ObjectId) -> Result<ObjectId> {
        let sign = if relation_id < 0 { -1 } else { 1 };
        relation_id
            .checked_mul(2)
            .and_then(|id| id.checked_add(sign))
            .ok_or_else(|| id_overflow(relation_id))
    }

    /// Whether this area was built from a single way.
    pub fn from_way(&self) -> bool {
        self.id & 1 == 0
    }

    /// Id of the way or relation this area was built from.
    pub fn orig_id(&self) -> ObjectId {
        self.id / 2
    }
}

/// Any item that can live in a buffer or arrive from the input stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Item {
    Node(Node),
    Way(Way),
    Relation(Relation),
    Area(Area),
}

impl Item {
    pub fn item_type(&self) -> ItemType {
        match self {
            Item::Node(_) => ItemType::Node,
            Item::Way(_) => ItemType::Way,
            Item::Relation(_) => ItemType::Relation,
            Item::Area(_) => ItemType::Area,
        }
    }

    pub fn id(&self) -> ObjectId {
        match self {
            Item::Node(n) => n.id,
            Item::Way(w) => w.id,
            Item::Relation(r) => r.id,
            Item::Area(a) => a.id,
        }
    }

    pub fn tags(&self) -> &TagList {
        match self {
            Item::Node(n) => &n.tags,
            Item::Way(w) => &w.tags,
            Item::Relation(r) => &r.tags,
            Item::Area(a) => &a.tags,
        }
    }
}
