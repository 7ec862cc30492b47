//! In-memory [`Host`](crate::host::Host) backing the sandbox and the tests.
//!
//! Every persistence call resolves immediately. Individual operations can be
//! made to fail to exercise error paths.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{NoticeLevel, StoreError};
use crate::host::{Store, StoreResult, Surface};
use crate::submenu::SubmenuKind;
use crate::types::{
    ActiveEffect, Actor, ActorId, Condition, Piece, PieceId, PieceSpec, PieceUpdate, Point, Rect,
    Segment, Size, User,
};

/// Serialized scene contents.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SceneData {
    pub pieces: Vec<Piece>,
    pub actors: Vec<Actor>,
    pub users: Vec<User>,
    pub walls: Vec<Segment>,
    /// Condition slugs that carry a numeric stage when added.
    pub valued_conditions: BTreeSet<String>,
    pub grid_size: f32,
    pub viewport: Size,
    pub pan: Point,
    pub zoom: f32,
}

impl Default for SceneData {
    fn default() -> Self {
        SceneData {
            pieces: Vec::new(),
            actors: Vec::new(),
            users: Vec::new(),
            walls: Vec::new(),
            valued_conditions: BTreeSet::new(),
            grid_size: 100.0,
            viewport: Size::new(1920.0, 1080.0),
            pan: Point::default(),
            zoom: 1.0,
        }
    }
}

/// Rendering-side state that is never persisted.
#[derive(Debug, Default)]
struct SurfaceState {
    notices: Vec<(NoticeLevel, String)>,
    alphas: BTreeMap<PieceId, f32>,
    targets: BTreeSet<PieceId>,
    controlled: Vec<PieceId>,
    released: Vec<PieceId>,
    editors: Vec<PieceId>,
    triggers: BTreeMap<SubmenuKind, Rect>,
    submenus: BTreeMap<SubmenuKind, Size>,
}

#[derive(Debug, Default)]
pub struct MemoryScene {
    data: RefCell<SceneData>,
    surface: RefCell<SurfaceState>,
    failing: RefCell<BTreeSet<String>>,
    writes: RefCell<Vec<String>>,
    perception_refreshes: Cell<usize>,
    next_id: Cell<u64>,
}

const DEFAULT_TRIGGER: Rect = Rect::new(0.0, 0.0, 200.0, 30.0);
const DEFAULT_SUBMENU: Size = Size::new(220.0, 300.0);

impl MemoryScene {
    pub fn new(data: SceneData) -> Self {
        MemoryScene {
            data: RefCell::new(data),
            ..Default::default()
        }
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        Ok(MemoryScene::new(serde_json::from_str(json)?))
    }

    pub fn with<R>(&self, f: impl FnOnce(&SceneData) -> R) -> R {
        f(&self.data.borrow())
    }

    pub fn with_mut<R>(&self, f: impl FnOnce(&mut SceneData) -> R) -> R {
        f(&mut self.data.borrow_mut())
    }

    pub fn piece_count(&self) -> usize {
        self.with(|data| data.pieces.len())
    }

    /// Makes every later call of the named store operation fail.
    pub fn fail_on(&self, operation: &str) {
        self.failing.borrow_mut().insert(operation.to_string());
    }

    pub fn clear_failures(&self) {
        self.failing.borrow_mut().clear();
    }

    /// Names of the store writes that succeeded, in call order.
    pub fn writes(&self) -> Vec<String> {
        self.writes.borrow().clone()
    }

    pub fn perception_refreshes(&self) -> usize {
        self.perception_refreshes.get()
    }

    pub fn notices(&self) -> Vec<(NoticeLevel, String)> {
        self.surface.borrow().notices.clone()
    }

    pub fn alpha(&self, piece: &PieceId) -> Option<f32> {
        self.surface.borrow().alphas.get(piece).copied()
    }

    pub fn released(&self) -> Vec<PieceId> {
        self.surface.borrow().released.clone()
    }

    pub fn opened_editors(&self) -> Vec<PieceId> {
        self.surface.borrow().editors.clone()
    }

    pub fn set_controlled(&self, pieces: Vec<PieceId>) {
        self.surface.borrow_mut().controlled = pieces;
    }

    pub fn set_measurements(&self, kind: SubmenuKind, trigger: Rect, submenu: Size) {
        let mut surface = self.surface.borrow_mut();
        surface.triggers.insert(kind, trigger);
        surface.submenus.insert(kind, submenu);
    }

    /// Runs one store write, honoring injected failures. Only writes that
    /// succeed are recorded.
    fn write<R>(&self, operation: &str, f: impl FnOnce() -> StoreResult<R>) -> StoreResult<R> {
        if self.failing.borrow().contains(operation) {
            log::debug!("rejecting {operation}");
            return Err(StoreError(format!("{operation} rejected")));
        }
        let result = f()?;
        self.writes.borrow_mut().push(operation.to_string());
        Ok(result)
    }

    fn with_piece_mut<R>(&self, id: &PieceId, f: impl FnOnce(&mut Piece) -> R) -> StoreResult<R> {
        self.with_mut(|data| {
            data.pieces
                .iter_mut()
                .find(|piece| &piece.id == id)
                .map(f)
                .ok_or_else(|| StoreError(format!("unknown token {id}")))
        })
    }

    fn with_actor_mut<R>(&self, id: &ActorId, f: impl FnOnce(&mut Actor) -> R) -> StoreResult<R> {
        self.with_mut(|data| {
            data.actors
                .iter_mut()
                .find(|actor| &actor.id == id)
                .map(f)
                .ok_or_else(|| StoreError(format!("unknown actor {id}")))
        })
    }

    fn set_in_combat(&self, pieces: &[PieceId], in_combat: bool) {
        self.with_mut(|data| {
            for piece in data.pieces.iter_mut().filter(|piece| pieces.contains(&piece.id)) {
                piece.in_combat = in_combat;
            }
        })
    }
}

impl Store for MemoryScene {
    fn piece(&self, id: &PieceId) -> Option<Piece> {
        self.with(|data| data.pieces.iter().find(|piece| &piece.id == id).cloned())
    }

    fn pieces(&self) -> Vec<Piece> {
        self.with(|data| data.pieces.clone())
    }

    fn actor(&self, id: &ActorId) -> Option<Actor> {
        self.with(|data| data.actors.iter().find(|actor| &actor.id == id).cloned())
    }

    fn actors(&self) -> Vec<Actor> {
        self.with(|data| data.actors.clone())
    }

    fn users(&self) -> Vec<User> {
        self.with(|data| data.users.clone())
    }

    async fn set_flag(
        &self,
        piece: &PieceId,
        namespace: &str,
        key: &str,
        value: Value,
    ) -> StoreResult<()> {
        self.write("set_flag", || {
            self.with_piece_mut(piece, |piece| {
                piece
                    .flags
                    .entry(namespace.to_string())
                    .or_default()
                    .insert(key.to_string(), value);
            })
        })
    }

    async fn unset_flag(&self, piece: &PieceId, namespace: &str, key: &str) -> StoreResult<()> {
        self.write("unset_flag", || {
            self.with_piece_mut(piece, |piece| {
                if let Some(scope) = piece.flags.get_mut(namespace) {
                    scope.remove(key);
                    if scope.is_empty() {
                        piece.flags.remove(namespace);
                    }
                }
            })
        })
    }

    async fn update_pieces(&self, updates: Vec<(PieceId, PieceUpdate)>) -> StoreResult<()> {
        self.write("update_pieces", || {
            self.with_mut(|data| {
                if let Some((missing, _)) = updates
                    .iter()
                    .find(|(id, _)| !data.pieces.iter().any(|piece| &piece.id == id))
                {
                    return Err(StoreError(format!("unknown token {missing}")));
                }
                for (id, update) in &updates {
                    if let Some(piece) = data.pieces.iter_mut().find(|piece| &piece.id == id) {
                        update.apply_to(piece);
                    }
                }
                Ok(())
            })
        })
    }

    async fn create_pieces(&self, specs: Vec<PieceSpec>) -> StoreResult<Vec<PieceId>> {
        self.write("create_pieces", || {
            let mut ids = Vec::with_capacity(specs.len());
            self.with_mut(|data| {
                for spec in specs {
                    let serial = self.next_id.get() + 1;
                    self.next_id.set(serial);
                    let id = PieceId::new(format!("created-{serial}"));
                    data.pieces.push(Piece {
                        id: id.clone(),
                        name: spec.name,
                        actor_id: Some(spec.actor_id),
                        x: spec.x,
                        y: spec.y,
                        width: spec.width,
                        height: spec.height,
                        ..Default::default()
                    });
                    ids.push(id);
                }
            });
            Ok(ids)
        })
    }

    async fn delete_pieces(&self, ids: Vec<PieceId>) -> StoreResult<()> {
        self.write("delete_pieces", || {
            self.with_mut(|data| data.pieces.retain(|piece| !ids.contains(&piece.id)));
            Ok(())
        })
    }

    async fn wait_for_movement(&self, piece: &PieceId) -> StoreResult<()> {
        if self.failing.borrow().contains("wait_for_movement") {
            return Err(StoreError(format!("movement of {piece} interrupted")));
        }
        Ok(())
    }

    async fn add_condition(&self, actor: &ActorId, slug: &str) -> StoreResult<()> {
        self.write("add_condition", || {
            let valued = self.with(|data| data.valued_conditions.contains(slug));
            self.with_actor_mut(actor, |actor| {
                match actor.conditions.iter_mut().find(|c| c.slug == slug) {
                    Some(existing) => {
                        if let Some(value) = existing.value.as_mut() {
                            *value = value.saturating_add(1);
                        }
                    }
                    None => actor.conditions.push(Condition {
                        slug: slug.to_string(),
                        value: valued.then_some(1),
                        in_hud: true,
                    }),
                }
            })
        })
    }

    async fn set_condition_value(
        &self,
        actor: &ActorId,
        slug: &str,
        value: u8,
    ) -> StoreResult<()> {
        self.write("set_condition_value", || {
            self.with_actor_mut(actor, |actor| {
                if value == 0 {
                    actor.conditions.retain(|c| c.slug != slug);
                } else if let Some(existing) = actor.conditions.iter_mut().find(|c| c.slug == slug) {
                    existing.value = Some(value);
                }
            })
        })
    }

    async fn remove_condition(&self, actor: &ActorId, slug: &str) -> StoreResult<()> {
        self.write("remove_condition", || {
            self.with_actor_mut(actor, |actor| actor.conditions.retain(|c| c.slug != slug))
        })
    }

    async fn toggle_status_effect(
        &self,
        actor: &ActorId,
        status_id: &str,
        active: bool,
        overlay: bool,
    ) -> StoreResult<()> {
        self.write("toggle_status_effect", || {
            self.with_actor_mut(actor, |actor| {
                if !active {
                    actor
                        .effects
                        .retain(|effect| !effect.statuses.contains(status_id));
                    return;
                }
                match actor
                    .effects
                    .iter_mut()
                    .find(|effect| effect.statuses.contains(status_id))
                {
                    Some(effect) => effect.overlay = overlay,
                    None => actor.effects.push(ActiveEffect {
                        id: format!("effect-{status_id}"),
                        statuses: BTreeSet::from([status_id.to_string()]),
                        overlay,
                    }),
                }
            })
        })
    }

    async fn modify_attribute(
        &self,
        actor: &ActorId,
        attribute: &str,
        value: i32,
        is_delta: bool,
        is_bar: bool,
    ) -> StoreResult<()> {
        self.write("modify_attribute", || {
            self.with_actor_mut(actor, |actor| {
                let Some(current) = actor.attributes.get_mut(attribute) else {
                    return Err(StoreError(format!("unknown attribute {attribute}")));
                };
                let mut next = if is_delta {
                    current.value.saturating_add(value)
                } else {
                    value
                };
                if is_bar {
                    if let Some(max) = current.max {
                        next = next.clamp(0, max);
                    }
                }
                current.value = next;
                Ok(())
            })?
        })
    }

    async fn create_combatants(&self, pieces: Vec<PieceId>) -> StoreResult<()> {
        self.write("create_combatants", || {
            self.set_in_combat(&pieces, true);
            Ok(())
        })
    }

    async fn delete_combatants(&self, pieces: Vec<PieceId>) -> StoreResult<()> {
        self.write("delete_combatants", || {
            self.set_in_combat(&pieces, false);
            Ok(())
        })
    }

    fn refresh_perception(&self) {
        self.perception_refreshes
            .set(self.perception_refreshes.get() + 1);
    }
}

impl Surface for MemoryScene {
    fn viewport(&self) -> Size {
        self.with(|data| data.viewport)
    }

    fn world_to_screen(&self, point: Point) -> Point {
        self.with(|data| {
            Point::new(
                (point.x - data.pan.x) * data.zoom,
                (point.y - data.pan.y) * data.zoom,
            )
        })
    }

    fn grid_size(&self) -> f32 {
        self.with(|data| data.grid_size)
    }

    fn measure_trigger(&self, kind: SubmenuKind) -> Rect {
        self.surface
            .borrow()
            .triggers
            .get(&kind)
            .copied()
            .unwrap_or(DEFAULT_TRIGGER)
    }

    fn measure_submenu(&self, kind: SubmenuKind) -> Size {
        self.surface
            .borrow()
            .submenus
            .get(&kind)
            .copied()
            .unwrap_or(DEFAULT_SUBMENU)
    }

    fn blocks_movement(&self, from: Point, to: Point) -> bool {
        let path = Segment::new(from, to);
        self.with(|data| data.walls.iter().any(|wall| wall.intersects(&path)))
    }

    fn notify(&self, level: NoticeLevel, message: &str) {
        match level {
            NoticeLevel::Info => log::info!("{message}"),
            NoticeLevel::Warning => log::warn!("{message}"),
            NoticeLevel::Error => log::error!("{message}"),
        }
        self.surface
            .borrow_mut()
            .notices
            .push((level, message.to_string()));
    }

    fn is_targeted(&self, piece: &PieceId) -> bool {
        self.surface.borrow().targets.contains(piece)
    }

    fn set_target(&self, piece: &PieceId, targeted: bool) {
        let mut surface = self.surface.borrow_mut();
        if targeted {
            surface.targets.insert(piece.clone());
        } else {
            surface.targets.remove(piece);
        }
    }

    fn controlled_pieces(&self) -> Vec<PieceId> {
        self.surface.borrow().controlled.clone()
    }

    fn release(&self, piece: &PieceId) {
        self.surface.borrow_mut().released.push(piece.clone());
    }

    fn open_editor(&self, piece: &PieceId) {
        self.surface.borrow_mut().editors.push(piece.clone());
    }

    fn set_piece_alpha(&self, piece: &PieceId, alpha: f32) {
        self.surface.borrow_mut().alphas.insert(piece.clone(), alpha);
    }
}


#[cfg(test)]
pub(crate) mod fixtures {
    use std::rc::Rc;

    use super::*;
    use crate::types::{HudAvailability, StatusDefinition};

    pub const SCENE: &str = r#"{
        "grid_size": 50,
        "viewport": {"width": 1280, "height": 720},
        "valued_conditions": ["frightened"],
        "users": [
            {"id": "gm", "name": "Game Master", "is_gm": true},
            {"id": "alice", "name": "Alice"}
        ],
        "actors": [
            {"id": "hero", "name": "Hero", "kind": "character", "player_owned": true,
             "owners": ["alice"], "attributes": {"hp": {"value": 12, "max": 20}}},
            {"id": "rogue", "name": "Rogue", "kind": "character", "player_owned": true},
            {"id": "party", "name": "The Party", "kind": "party", "members": ["hero", "rogue"]},
            {"id": "goblin", "name": "Goblin", "kind": "npc"},
            {"id": "caravan", "name": "Caravan", "kind": "group", "owners": ["alice"],
             "members": ["mule", "guard"]},
            {"id": "mule", "name": "Mule", "kind": "npc",
             "prototype": {"name": "Mule", "width": 100, "height": 100}},
            {"id": "guard", "name": "Guard", "kind": "npc",
             "prototype": {"name": "Guard", "width": 50, "height": 50}}
        ],
        "pieces": [
            {"id": "hero-token", "name": "Hero", "actor_id": "hero", "x": 100, "y": 100,
             "width": 100, "height": 100, "bar1": "hp"},
            {"id": "goblin-token", "name": "Goblin", "actor_id": "goblin", "x": 300, "y": 300,
             "width": 100, "height": 100},
            {"id": "caravan-token", "name": "Caravan", "actor_id": "caravan", "x": 500, "y": 500,
             "width": 100, "height": 100},
            {"id": "orphan-token", "name": "Marker", "x": 0, "y": 0, "width": 50, "height": 50}
        ]
    }"#;

    pub fn scene() -> Rc<MemoryScene> {
        Rc::new(MemoryScene::from_json(SCENE).unwrap())
    }

    pub fn user(scene: &MemoryScene, id: &str) -> User {
        scene
            .users()
            .into_iter()
            .find(|user| user.id.as_str() == id)
            .unwrap()
    }

    pub fn catalog() -> Vec<StatusDefinition> {
        let entry = |id: &str, name: &str, hud: HudAvailability, condition: bool| StatusDefinition {
            id: id.to_string(),
            name: name.to_string(),
            img: format!("icons/{id}.svg"),
            hud,
            effect_id: None,
            condition,
        };
        vec![
            entry("frightened", "Frightened", HudAvailability::Always, true),
            entry("prone", "Prone", HudAvailability::Always, true),
            entry("blinded", "Blinded", HudAvailability::Always, false),
            entry("invisible", "Invisible", HudAvailability::Never, false),
        ]
    }
}
