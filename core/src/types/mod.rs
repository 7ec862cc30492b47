//! Data types shared by every overlay component.

mod actor;
mod geometry;
mod ids;
mod piece;
mod status;

pub use actor::{ActiveEffect, Actor, Attribute, Condition, Prototype, User};
pub use geometry::{Point, Rect, Segment, Size};
pub use ids::{ActorId, PieceId, UserId};
pub use piece::{FlagMap, Piece, PieceSpec, PieceUpdate};
pub use status::{HudAvailability, StatusDefinition};
