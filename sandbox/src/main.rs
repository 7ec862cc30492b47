use std::env;
use std::fs;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::{Duration, Instant};

use anyhow::Context;
use hud_core::config::load_config;
use hud_core::drag::{DragHandler, ObservedDrag};
use hud_core::host::Store;
use hud_core::hud::{KeyModifiers, SearchKey};
use hud_core::session::NamedInput;
use hud_core::submenu::SubmenuKind;
use hud_core::types::{PieceId, Point, StatusDefinition};
use hud_core::{HudAction, MemoryScene, TokenHud};
use log::{LevelFilter, error, info, warn};
use serde::Deserialize;

/// Scene file layout: the world plus the status catalog and acting user.
#[derive(Deserialize)]
struct Fixture {
    viewer: String,
    #[serde(default)]
    catalog: Vec<StatusDefinition>,
    scene: serde_json::Value,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "snake_case")]
enum Step {
    Bind(String),
    Close,
    Action(HudAction),
    ToggleSubmenu(SubmenuKind),
    Search(String),
    SearchEnter { shift: bool, ctrl: bool },
    Type { input: NamedInput, text: String },
    Submit(NamedInput),
    Drag { piece: String, to: Point, cancelled: bool },
    PointerLeave,
    /// Advances the script clock.
    Wait(u64),
    Redraw,
    Dump,
}

/// Drag controller that moves the dragged token on drop.
struct SceneDrag {
    scene: Rc<MemoryScene>,
}

impl DragHandler for SceneDrag {
    fn drag_start(&mut self, piece: &PieceId, _at: Point) -> bool {
        self.scene.piece(piece).is_some()
    }

    fn drag_move(&mut self, _piece: &PieceId, _at: Point) -> bool {
        true
    }

    fn drag_end(&mut self, piece: &PieceId, at: Point, cancelled: bool) -> bool {
        if cancelled {
            return false;
        }
        self.scene.with_mut(|data| {
            data.pieces
                .iter_mut()
                .find(|candidate| &candidate.id == piece)
                .map(|candidate| {
                    candidate.x = at.x;
                    candidate.y = at.y;
                })
                .is_some()
        })
    }
}

fn parse_log_level(value: &str) -> Option<LevelFilter> {
    match value.to_lowercase().as_str() {
        "off" => Some(LevelFilter::Off),
        "error" => Some(LevelFilter::Error),
        "warn" | "warning" => Some(LevelFilter::Warn),
        "info" => Some(LevelFilter::Info),
        "debug" => Some(LevelFilter::Debug),
        "trace" => Some(LevelFilter::Trace),
        _ => None,
    }
}

fn resolve_log_level() -> LevelFilter {
    env::var("HUD_LOG_LEVEL")
        .ok()
        .as_deref()
        .and_then(parse_log_level)
        .unwrap_or(LevelFilter::Info)
}

fn resolve_log_file() -> Option<String> {
    match env::var("HUD_LOG_FILE") {
        Ok(value) => {
            let trimmed = value.trim();
            if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("none") {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        Err(_) => None,
    }
}

struct Args {
    scene: PathBuf,
    script: PathBuf,
    config: Option<PathBuf>,
}

fn usage() -> anyhow::Error {
    anyhow::anyhow!("Usage: hud-sandbox --scene <path> --script <path> [--config <path>]")
}

fn parse_args() -> anyhow::Result<Args> {
    let args: Vec<String> = env::args().collect();
    let mut scene = None;
    let mut script = None;
    let mut config = None;
    let mut i = 1;
    while i < args.len() {
        let slot = match args[i].as_str() {
            "--scene" => &mut scene,
            "--script" => &mut script,
            "--config" => &mut config,
            other => {
                eprintln!("Unknown argument: {other}");
                return Err(usage());
            }
        };
        i += 1;
        let value = args.get(i).ok_or_else(usage)?;
        *slot = Some(PathBuf::from(value));
        i += 1;
    }
    Ok(Args {
        scene: scene.ok_or_else(usage)?,
        script: script.ok_or_else(usage)?,
        config,
    })
}

async fn run_step(
    hud: &Rc<TokenHud<MemoryScene>>,
    drag: &mut ObservedDrag<SceneDrag, Rc<TokenHud<MemoryScene>>>,
    clock: &mut Instant,
    step: Step,
) -> anyhow::Result<()> {
    match step {
        Step::Bind(piece) => hud.bind(&PieceId::new(piece))?,
        Step::Close => hud.close(false),
        Step::Action(action) => {
            if let Err(err) = hud.dispatch(action).await {
                warn!("action failed: {err}");
            }
        }
        Step::ToggleSubmenu(kind) => {
            let events = hud.toggle_submenu(kind);
            info!("{kind:?}: {events:?}");
        }
        Step::Search(text) => {
            hud.search_input(&text);
            info!("search {text:?} matches {:?}", hud.search_matches());
        }
        Step::SearchEnter { shift, ctrl } => {
            let modifiers = KeyModifiers {
                shift,
                ctrl,
                meta: false,
            };
            if let Err(err) = hud.search_key(SearchKey::Enter, modifiers).await {
                warn!("search enter failed: {err}");
            }
        }
        Step::Type { input, text } => {
            hud.focus_input(input);
            hud.type_input(input, &text);
        }
        Step::Submit(input) => {
            if let Err(err) = hud.submit_input(input).await {
                warn!("submit failed: {err}");
            }
        }
        Step::Drag {
            piece,
            to,
            cancelled,
        } => {
            let piece = PieceId::new(piece);
            let from = hud
                .host()
                .piece(&piece)
                .map(|piece| piece.position())
                .with_context(|| format!("no token {piece} to drag"))?;
            drag.drag_start(&piece, from);
            drag.drag_move(&piece, to);
            drag.drag_end(&piece, to, cancelled);
        }
        Step::PointerLeave => hud.pointer_leave(*clock),
        Step::Wait(millis) => {
            *clock += Duration::from_millis(millis);
            let events = hud.tick(*clock);
            if !events.is_empty() {
                info!("timers fired: {events:?}");
            }
        }
        Step::Redraw => {
            for piece in hud.host().pieces() {
                hud.redraw_piece(&piece);
            }
        }
        Step::Dump => {
            let context = hud.context();
            info!(
                "bound={:?} position={:?} open={:?} session={}",
                hud.bound_piece(),
                hud.position(),
                hud.open_submenu(),
                serde_json::to_string(&hud.session_state())?
            );
            if let Some(context) = context {
                info!("context: {context:#?}");
            }
        }
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let log_level = resolve_log_level();
    let log_file = resolve_log_file();
    hud_core::initialize_logger(log_level, log_file.as_deref())?;

    let args = parse_args()?;
    let config = args
        .config
        .as_deref()
        .map(load_config)
        .unwrap_or_default()
        .with_env_overrides();
    info!(
        "HUD sandbox starting (level={}, namespace={})",
        log_level, config.flag_namespace
    );

    let fixture: Fixture = serde_json::from_str(
        &fs::read_to_string(&args.scene)
            .with_context(|| format!("reading {}", args.scene.display()))?,
    )
    .context("parsing scene")?;
    let steps: Vec<Step> = serde_json::from_str(
        &fs::read_to_string(&args.script)
            .with_context(|| format!("reading {}", args.script.display()))?,
    )
    .context("parsing script")?;

    let scene = Rc::new(MemoryScene::new(serde_json::from_value(fixture.scene)?));
    let viewer = scene
        .users()
        .into_iter()
        .find(|user| user.id.as_str() == fixture.viewer)
        .with_context(|| format!("unknown viewer {}", fixture.viewer))?;

    let hud = Rc::new(TokenHud::new(scene.clone(), config, fixture.catalog, viewer));
    let mut drag = ObservedDrag::new(SceneDrag { scene: scene.clone() }, hud.clone());
    let mut clock = Instant::now();

    for (index, step) in steps.into_iter().enumerate() {
        info!("step {index}: {step:?}");
        if let Err(err) = run_step(&hud, &mut drag, &mut clock, step).await {
            error!("step {index} failed: {err:#}");
        }
    }

    for (level, message) in scene.notices() {
        info!("notice [{level:?}] {message}");
    }
    info!("writes: {:?}", scene.writes());
    Ok(())
}
