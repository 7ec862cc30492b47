//! Seams between the overlay engine and the platform hosting it.
//!
//! [`Store`] is the persisted world: reads are local and synchronous, every
//! write is a round trip that may be rejected. [`Surface`] is the rendering
//! side: geometry, pointer/selection state and user notifications.

use serde_json::Value;

use crate::errors::{NoticeLevel, StoreError};
use crate::submenu::SubmenuKind;
use crate::types::{Actor, ActorId, Piece, PieceId, PieceSpec, PieceUpdate, Point, Rect, Size, User};

pub type StoreResult<T> = Result<T, StoreError>;

#[allow(async_fn_in_trait)]
pub trait Store {
    fn piece(&self, id: &PieceId) -> Option<Piece>;
    fn pieces(&self) -> Vec<Piece>;
    fn actor(&self, id: &ActorId) -> Option<Actor>;
    fn actors(&self) -> Vec<Actor>;
    fn users(&self) -> Vec<User>;

    async fn set_flag(
        &self,
        piece: &PieceId,
        namespace: &str,
        key: &str,
        value: Value,
    ) -> StoreResult<()>;
    /// Removes the key entirely (as opposed to storing an empty value).
    async fn unset_flag(&self, piece: &PieceId, namespace: &str, key: &str) -> StoreResult<()>;

    async fn update_pieces(&self, updates: Vec<(PieceId, PieceUpdate)>) -> StoreResult<()>;
    async fn create_pieces(&self, specs: Vec<PieceSpec>) -> StoreResult<Vec<PieceId>>;
    async fn delete_pieces(&self, ids: Vec<PieceId>) -> StoreResult<()>;
    /// Resolves once the token's in-flight movement animation (if any) is done.
    async fn wait_for_movement(&self, piece: &PieceId) -> StoreResult<()>;

    async fn add_condition(&self, actor: &ActorId, slug: &str) -> StoreResult<()>;
    async fn set_condition_value(&self, actor: &ActorId, slug: &str, value: u8)
        -> StoreResult<()>;
    async fn remove_condition(&self, actor: &ActorId, slug: &str) -> StoreResult<()>;
    async fn toggle_status_effect(
        &self,
        actor: &ActorId,
        status_id: &str,
        active: bool,
        overlay: bool,
    ) -> StoreResult<()>;
    async fn modify_attribute(
        &self,
        actor: &ActorId,
        attribute: &str,
        value: i32,
        is_delta: bool,
        is_bar: bool,
    ) -> StoreResult<()>;

    async fn create_combatants(&self, pieces: Vec<PieceId>) -> StoreResult<()>;
    async fn delete_combatants(&self, pieces: Vec<PieceId>) -> StoreResult<()>;

    /// Asks the perception pipeline to recompute fields of view before the next frame.
    fn refresh_perception(&self);
}

pub trait Surface {
    fn viewport(&self) -> Size;
    /// Converts world coordinates to screen coordinates, including pan/zoom.
    fn world_to_screen(&self, point: Point) -> Point;
    fn grid_size(&self) -> f32;

    /// Screen rectangle of the trigger row for a submenu.
    fn measure_trigger(&self, kind: SubmenuKind) -> Rect;
    /// Rendered size of a submenu's content.
    fn measure_submenu(&self, kind: SubmenuKind) -> Size;

    /// Movement-collision test between two world points.
    fn blocks_movement(&self, from: Point, to: Point) -> bool;

    fn notify(&self, level: NoticeLevel, message: &str);

    fn is_targeted(&self, piece: &PieceId) -> bool;
    fn set_target(&self, piece: &PieceId, targeted: bool);
    fn controlled_pieces(&self) -> Vec<PieceId>;
    fn release(&self, piece: &PieceId);
    fn open_editor(&self, piece: &PieceId);
    fn set_piece_alpha(&self, piece: &PieceId, alpha: f32);
}

/// Everything an overlay needs from its host.
pub trait Host: Store + Surface {}

impl<T: Store + Surface> Host for T {}
