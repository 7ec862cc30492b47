use serde::{Deserialize, Serialize};

/// Whether a catalog entry shows up in the overlay.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum HudAvailability {
    #[default]
    Always,
    Never,
    /// Only for actors whose kind is in the list.
    ActorKinds(Vec<String>),
}

impl HudAvailability {
    pub fn allows(&self, actor_kind: &str) -> bool {
        match self {
            HudAvailability::Always => true,
            HudAvailability::Never => false,
            HudAvailability::ActorKinds(kinds) => kinds.iter().any(|kind| kind == actor_kind),
        }
    }
}

/// One entry of the externally supplied condition/status catalog.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct StatusDefinition {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub img: String,
    #[serde(default)]
    pub hud: HudAvailability,
    /// Bound effect id; when set only the effect with this id activates the status.
    #[serde(default)]
    pub effect_id: Option<String>,
    /// Handled through the condition API (may carry a numeric value).
    #[serde(default)]
    pub condition: bool,
}
