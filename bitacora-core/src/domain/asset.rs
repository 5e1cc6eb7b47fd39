//! Serviced assets: equipment and systems

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Equipment,
    System,
}

impl AssetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetKind::Equipment => "equipment",
            AssetKind::System => "system",
        }
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A piece of equipment or a system that can be serviced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Asset {
    pub id: Uuid,
    pub kind: AssetKind,
    pub name: String,
    pub client_id: Option<Uuid>,
    pub active: bool,
}

impl Asset {
    pub fn new(kind: AssetKind, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            name: name.into(),
            client_id: None,
            active: true,
        }
    }
}

/// The single asset a service log refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum AssetRef {
    Equipment(Uuid),
    System(Uuid),
}

impl AssetRef {
    /// Build from the two optional ids of an input; exactly one must be set
    pub fn from_ids(equipment_id: Option<Uuid>, system_id: Option<Uuid>) -> Result<Self, &'static str> {
        match (equipment_id, system_id) {
            (Some(id), None) => Ok(AssetRef::Equipment(id)),
            (None, Some(id)) => Ok(AssetRef::System(id)),
            (Some(_), Some(_)) => Err("only one of equipment_id or system_id may be set"),
            (None, None) => Err("one of equipment_id or system_id is required"),
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            AssetRef::Equipment(id) | AssetRef::System(id) => *id,
        }
    }

    pub fn kind(&self) -> AssetKind {
        match self {
            AssetRef::Equipment(_) => AssetKind::Equipment,
            AssetRef::System(_) => AssetKind::System,
        }
    }

    pub fn equipment_id(&self) -> Option<Uuid> {
        match self {
            AssetRef::Equipment(id) => Some(*id),
            AssetRef::System(_) => None,
        }
    }

    pub fn system_id(&self) -> Option<Uuid> {
        match self {
            AssetRef::System(id) => Some(*id),
            AssetRef::Equipment(_) => None,
        }
    }
}
