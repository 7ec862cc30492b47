#![allow(dead_code)]

use std::rc::Rc;

use hud_core::errors::NoticeLevel;
use hud_core::host::{Store, StoreResult, Surface};
use hud_core::submenu::SubmenuKind;
use hud_core::types::{
    Actor, ActorId, HudAvailability, Piece, PieceId, PieceSpec, PieceUpdate, Point, Rect, Size,
    StatusDefinition, User,
};
use hud_core::MemoryScene;
use serde_json::Value;
use tokio::sync::Notify;

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
        {"id": "caravan", "name": "Caravan", "kind": "group", "owners": ["alice"],
         "members": ["mule", "guard", "scout"]},
        {"id": "mule", "name": "Mule", "kind": "npc",
         "prototype": {"name": "Mule", "width": 100, "height": 100}},
        {"id": "guard", "name": "Guard", "kind": "npc",
         "prototype": {"name": "Guard", "width": 50, "height": 50}},
        {"id": "scout", "name": "Scout", "kind": "npc",
         "prototype": {"name": "Scout", "width": 50, "height": 50}}
    ],
    "pieces": [
        {"id": "hero-token", "name": "Hero", "actor_id": "hero", "x": 100, "y": 100,
         "width": 100, "height": 100, "bar1": "hp"},
        {"id": "rogue-token", "name": "Rogue", "actor_id": "rogue", "x": 300, "y": 100,
         "width": 50, "height": 50},
        {"id": "caravan-token", "name": "Caravan", "actor_id": "caravan", "x": 500, "y": 500,
         "width": 100, "height": 100}
    ]
}"#;

pub fn scene() -> MemoryScene {
    MemoryScene::from_json(SCENE).unwrap()
}

pub fn user<S: Store>(store: &S, id: &str) -> User {
    store
        .users()
        .into_iter()
        .find(|user| user.id.as_str() == id)
        .unwrap()
}

pub fn catalog() -> Vec<StatusDefinition> {
    let entry = |id: &str, name: &str, condition: bool| StatusDefinition {
        id: id.to_string(),
        name: name.to_string(),
        img: format!("icons/{id}.svg"),
        hud: HudAvailability::Always,
        effect_id: None,
        condition,
    };
    vec![
        entry("frightened", "Frightened", true),
        entry("prone", "Prone", true),
        entry("blinded", "Blinded", false),
    ]
}

pub fn piece_id(id: &str) -> PieceId {
    PieceId::new(id)
}

/// Host whose `update_pieces` round trip stays in flight until released.
pub struct GatedScene {
    pub inner: MemoryScene,
    pub gate: Notify,
}

impl GatedScene {
    pub fn new(inner: MemoryScene) -> Rc<Self> {
        Rc::new(GatedScene {
            inner,
            gate: Notify::new(),
        })
    }

    pub fn release(&self) {
        self.gate.notify_one();
    }
}

impl Store for GatedScene {
    fn piece(&self, id: &PieceId) -> Option<Piece> {
        self.inner.piece(id)
    }

    fn pieces(&self) -> Vec<Piece> {
        self.inner.pieces()
    }

    fn actor(&self, id: &ActorId) -> Option<Actor> {
        self.inner.actor(id)
    }

    fn actors(&self) -> Vec<Actor> {
        self.inner.actors()
    }

    fn users(&self) -> Vec<User> {
        self.inner.users()
    }

    async fn set_flag(
        &self,
        piece: &PieceId,
        namespace: &str,
        key: &str,
        value: Value,
    ) -> StoreResult<()> {
        self.inner.set_flag(piece, namespace, key, value).await
    }

    async fn unset_flag(&self, piece: &PieceId, namespace: &str, key: &str) -> StoreResult<()> {
        self.inner.unset_flag(piece, namespace, key).await
    }

    async fn update_pieces(&self, updates: Vec<(PieceId, PieceUpdate)>) -> StoreResult<()> {
        self.gate.notified().await;
        self.inner.update_pieces(updates).await
    }

    async fn create_pieces(&self, specs: Vec<PieceSpec>) -> StoreResult<Vec<PieceId>> {
        self.inner.create_pieces(specs).await
    }

    async fn delete_pieces(&self, ids: Vec<PieceId>) -> StoreResult<()> {
        self.inner.delete_pieces(ids).await
    }

    async fn wait_for_movement(&self, piece: &PieceId) -> StoreResult<()> {
        self.inner.wait_for_movement(piece).await
    }

    async fn add_condition(&self, actor: &ActorId, slug: &str) -> StoreResult<()> {
        self.inner.add_condition(actor, slug).await
    }

    async fn set_condition_value(
        &self,
        actor: &ActorId,
        slug: &str,
        value: u8,
    ) -> StoreResult<()> {
        self.inner.set_condition_value(actor, slug, value).await
    }

    async fn remove_condition(&self, actor: &ActorId, slug: &str) -> StoreResult<()> {
        self.inner.remove_condition(actor, slug).await
    }

    async fn toggle_status_effect(
        &self,
        actor: &ActorId,
        status_id: &str,
        active: bool,
        overlay: bool,
    ) -> StoreResult<()> {
        self.inner
            .toggle_status_effect(actor, status_id, active, overlay)
            .await
    }

    async fn modify_attribute(
        &self,
        actor: &ActorId,
        attribute: &str,
        value: i32,
        is_delta: bool,
        is_bar: bool,
    ) -> StoreResult<()> {
        self.inner
            .modify_attribute(actor, attribute, value, is_delta, is_bar)
            .await
    }

    async fn create_combatants(&self, pieces: Vec<PieceId>) -> StoreResult<()> {
        self.inner.create_combatants(pieces).await
    }

    async fn delete_combatants(&self, pieces: Vec<PieceId>) -> StoreResult<()> {
        self.inner.delete_combatants(pieces).await
    }

    fn refresh_perception(&self) {
        self.inner.refresh_perception()
    }
}

impl Surface for GatedScene {
    fn viewport(&self) -> Size {
        self.inner.viewport()
    }

    fn world_to_screen(&self, point: Point) -> Point {
        self.inner.world_to_screen(point)
    }

    fn grid_size(&self) -> f32 {
        self.inner.grid_size()
    }

    fn measure_trigger(&self, kind: SubmenuKind) -> Rect {
        self.inner.measure_trigger(kind)
    }

    fn measure_submenu(&self, kind: SubmenuKind) -> Size {
        self.inner.measure_submenu(kind)
    }

    fn blocks_movement(&self, from: Point, to: Point) -> bool {
        self.inner.blocks_movement(from, to)
    }

    fn notify(&self, level: NoticeLevel, message: &str) {
        self.inner.notify(level, message)
    }

    fn is_targeted(&self, piece: &PieceId) -> bool {
        self.inner.is_targeted(piece)
    }

    fn set_target(&self, piece: &PieceId, targeted: bool) {
        self.inner.set_target(piece, targeted)
    }

    fn controlled_pieces(&self) -> Vec<PieceId> {
        self.inner.controlled_pieces()
    }

    fn release(&self, piece: &PieceId) {
        self.inner.release(piece)
    }

    fn open_editor(&self, piece: &PieceId) {
        self.inner.open_editor(piece)
    }

    fn set_piece_alpha(&self, piece: &PieceId, alpha: f32) {
        self.inner.set_piece_alpha(piece, alpha)
    }
}
