//! Selective hiding of tokens from specific observers.

mod flags;
mod roster;
mod rules;

pub use flags::{FlagWrite, VisibilityFlagSet};
pub use roster::{is_hidden_from_all, resolve_roster, roster_signature, RosterEntry};
pub use rules::{
    install_visibility_gate, is_visible_to, on_piece_redraw, redraw_alpha, DetectionPipeline,
    DetectionTest, FnDetection, InterceptionStrategy, VisibilityGate, VisibilityQuery, VisibilityRules,
};
