use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::ids::{ActorId, UserId};

/// A condition applied through the game system's condition API.
/// `value` is set for conditions with numeric stages (e.g. "frightened 2").
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    pub slug: String,
    pub value: Option<u8>,
    #[serde(default = "default_true")]
    pub in_hud: bool,
}

fn default_true() -> bool {
    true
}

/// A generic active effect carrying one or more status ids.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ActiveEffect {
    pub id: String,
    pub statuses: BTreeSet<String>,
    #[serde(default)]
    pub overlay: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Attribute {
    pub value: i32,
    pub max: Option<i32>,
}

/// Footprint and name used when a token is created for an actor.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Prototype {
    pub name: String,
    pub width: f32,
    pub height: f32,
}

impl Default for Prototype {
    fn default() -> Self {
        Prototype {
            name: String::new(),
            width: 100.0,
            height: 100.0,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct Actor {
    pub id: ActorId,
    pub name: String,
    pub kind: String,
    pub player_owned: bool,
    pub owners: BTreeSet<UserId>,
    pub conditions: Vec<Condition>,
    pub effects: Vec<ActiveEffect>,
    pub attributes: BTreeMap<String, Attribute>,
    /// Linked member actors; non-empty for a group that can deposit tokens.
    pub members: Vec<ActorId>,
    pub prototype: Prototype,
}

impl Actor {
    pub fn condition(&self, slug: &str) -> Option<&Condition> {
        self.conditions
            .iter()
            .find(|condition| condition.slug == slug && condition.in_hud)
    }

    pub fn is_group(&self) -> bool {
        !self.members.is_empty()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct User {
    pub id: UserId,
    pub name: String,
    #[serde(default)]
    pub is_gm: bool,
}

impl User {
    /// GMs may modify anything; players only actors they own.
    pub fn can_modify(&self, actor: &Actor) -> bool {
        self.is_gm || actor.owners.contains(&self.id)
    }
}
