//! Defaults shared by the configuration layer and the engine.

/// Namespace under which overlay flags are persisted on a token record.
pub const DEFAULT_FLAG_NAMESPACE: &str = "token-hud";

/// Key of the visibility flag list inside the namespace.
pub const HIDDEN_FROM_FLAG: &str = "hiddenFrom";

/// Actor kind that designates the party grouping used as the observer roster.
pub const DEFAULT_PARTY_KIND: &str = "party";

pub const SUBMENU_CLOSE_DELAY_MS: u64 = 100;
pub const HUD_LEAVE_DELAY_MS: u64 = 200;

pub const VIEWPORT_MARGIN: f32 = 20.0;
pub const HUD_WIDTH: f32 = 240.0;
pub const HUD_HEIGHT: f32 = 200.0;
pub const HUD_OFFSET: f32 = 15.0;

/// Deposit search radius, as a multiple of the container's width.
pub const SEARCH_RADIUS_FACTOR: f32 = 3.5;

/// Alpha used for tokens that are hidden from some (but not all) observers.
pub const DIM_ALPHA: f32 = 0.5;

/// Basic movement actions offered in addition to the default.
pub const MOVEMENT_ACTIONS: [&str; 4] = ["walk", "dash", "fly", "swim"];
