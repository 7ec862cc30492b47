use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::geometry::{Point, Rect};
use super::ids::{ActorId, PieceId};

/// Namespaced key/value flags attached to a persisted token record.
pub type FlagMap = BTreeMap<String, BTreeMap<String, Value>>;

/// A token placed on the play surface.
///
/// Coordinates are world pixels; `x`/`y` is the top-left corner of the
/// token's footprint.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct Piece {
    pub id: PieceId,
    pub name: String,
    pub actor_id: Option<ActorId>,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    /// Hidden from every non-GM viewer.
    pub hidden: bool,
    pub elevation: f32,
    /// Z-layer used for draw ordering.
    pub sort: i32,
    pub locked: bool,
    pub in_combat: bool,
    pub movement_action: Option<String>,
    pub bar1: Option<String>,
    pub bar2: Option<String>,
    pub flags: FlagMap,
}

impl Piece {
    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn bounds(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }

    pub fn center(&self) -> Point {
        self.bounds().center()
    }

    pub fn flag(&self, namespace: &str, key: &str) -> Option<&Value> {
        self.flags.get(namespace).and_then(|scope| scope.get(key))
    }
}

/// Blueprint for a token that does not exist yet.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PieceSpec {
    pub name: String,
    pub actor_id: ActorId,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Partial update applied to one token. `None` fields are left untouched.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct PieceUpdate {
    pub x: Option<f32>,
    pub y: Option<f32>,
    pub hidden: Option<bool>,
    pub elevation: Option<f32>,
    pub sort: Option<i32>,
    /// `Some(None)` clears the movement action back to the default.
    pub movement_action: Option<Option<String>>,
}

impl PieceUpdate {
    pub fn position(point: Point) -> Self {
        PieceUpdate {
            x: Some(point.x),
            y: Some(point.y),
            ..Default::default()
        }
    }

    pub fn apply_to(&self, piece: &mut Piece) {
        if let Some(x) = self.x {
            piece.x = x;
        }
        if let Some(y) = self.y {
            piece.y = y;
        }
        if let Some(hidden) = self.hidden {
            piece.hidden = hidden;
        }
        if let Some(elevation) = self.elevation {
            piece.elevation = elevation;
        }
        if let Some(sort) = self.sort {
            piece.sort = sort;
        }
        if let Some(action) = &self.movement_action {
            piece.movement_action = action.clone();
        }
    }
}
