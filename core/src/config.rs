use std::{env, fs, path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_FLAG_NAMESPACE, DEFAULT_PARTY_KIND, DIM_ALPHA, HUD_HEIGHT, HUD_LEAVE_DELAY_MS,
    HUD_OFFSET, HUD_WIDTH, SEARCH_RADIUS_FACTOR, SUBMENU_CLOSE_DELAY_MS, VIEWPORT_MARGIN,
};

/// Environment variable that overrides [`HudConfig::flag_namespace`].
pub const NAMESPACE_ENV_VAR: &str = "HUD_FLAG_NAMESPACE";

/// Runtime settings for one overlay engine.
///
/// Every field has a default so partial JSON files are accepted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HudConfig {
    /// Namespace under which visibility flags are persisted.
    pub flag_namespace: String,
    /// Actor kind of the designated party grouping.
    pub party_actor_kind: String,
    pub submenu_close_delay_ms: u64,
    pub hud_leave_delay_ms: u64,
    pub viewport_margin: f32,
    pub hud_width: f32,
    pub hud_height: f32,
    pub hud_offset: f32,
    pub search_radius_factor: f32,
    pub dim_alpha: f32,
}

impl Default for HudConfig {
    fn default() -> Self {
        Self {
            flag_namespace: DEFAULT_FLAG_NAMESPACE.to_string(),
            party_actor_kind: DEFAULT_PARTY_KIND.to_string(),
            submenu_close_delay_ms: SUBMENU_CLOSE_DELAY_MS,
            hud_leave_delay_ms: HUD_LEAVE_DELAY_MS,
            viewport_margin: VIEWPORT_MARGIN,
            hud_width: HUD_WIDTH,
            hud_height: HUD_HEIGHT,
            hud_offset: HUD_OFFSET,
            search_radius_factor: SEARCH_RADIUS_FACTOR,
            dim_alpha: DIM_ALPHA,
        }
    }
}

impl HudConfig {
    pub fn submenu_close_delay(&self) -> Duration {
        Duration::from_millis(self.submenu_close_delay_ms)
    }

    pub fn hud_leave_delay(&self) -> Duration {
        Duration::from_millis(self.hud_leave_delay_ms)
    }

    /// Replaces the namespace when `namespace` is non-empty after trimming.
    pub fn with_namespace_override(mut self, namespace: Option<String>) -> Self {
        if let Some(value) = namespace {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                self.flag_namespace = trimmed.to_string();
            }
        }
        self
    }

    /// Applies [`NAMESPACE_ENV_VAR`] if it is set.
    pub fn with_env_overrides(self) -> Self {
        self.with_namespace_override(env::var(NAMESPACE_ENV_VAR).ok())
    }
}

/// Loads the configuration from a JSON file.
///
/// Missing or corrupt files fall back to defaults (the latter with a
/// warning) so a bad settings file never prevents the overlay from opening.
pub fn load_config(path: &Path) -> HudConfig {
    let Ok(raw) = fs::read_to_string(path) else {
        log::debug!("No overlay config at {}, using defaults", path.display());
        return HudConfig::default();
    };

    match serde_json::from_str::<HudConfig>(&raw) {
        Ok(config) => config,
        Err(err) => {
            log::warn!(
                "Failed to parse overlay config at {}: {}",
                path.display(),
                err
            );
            HudConfig::default()
        }
    }
}

/// Writes the configuration as pretty JSON, replacing the file atomically.
///
/// # Returns
/// * `Ok(())` on success, `Err(String)` with a description on I/O failure.
pub fn save_config(path: &Path, config: &HudConfig) -> Result<(), String> {
    let tmp_path = path.with_extension("json.tmp");
    let json = serde_json::to_string_pretty(config)
        .map_err(|err| format!("Failed to serialize overlay config: {err}"))?;

    fs::write(&tmp_path, json).map_err(|err| {
        format!(
            "Failed to write config temp file {}: {err}",
            tmp_path.display()
        )
    })?;
    fs::rename(&tmp_path, path)
        .map_err(|err| format!("Failed to replace config file {}: {err}", path.display()))?;
    Ok(())
}
