mod common;

use std::rc::Rc;

use common::{catalog, piece_id, scene, user, GatedScene};
use hud_core::host::Store;
use hud_core::hud::{HudAction, SortDirection, StepDirection};
use hud_core::session::NamedInput;
use hud_core::submenu::SubmenuKind;
use hud_core::types::{ActorId, Piece, PieceId, Point};
use hud_core::visibility::{
    install_visibility_gate, DetectionPipeline, FnDetection, InterceptionStrategy,
    VisibilityQuery, VisibilityRules,
};
use hud_core::{HudConfig, MemoryScene, TokenHud};

fn overlay(host: Rc<MemoryScene>, viewer: &str) -> TokenHud<MemoryScene> {
    let viewer = user(host.as_ref(), viewer);
    TokenHud::new(host, HudConfig::default(), catalog(), viewer)
}

#[tokio::test]
async fn deposit_then_retrieve_restores_the_scene() {
    let host = Rc::new(scene());
    let hud = overlay(host.clone(), "gm");
    let caravan = piece_id("caravan-token");
    hud.bind(&caravan).unwrap();
    let before = host.piece_count();

    hud.dispatch(HudAction::ToggleDepositRetrieve).await.unwrap();

    assert_eq!(host.piece_count(), before + 3);
    assert_eq!(hud.context().unwrap().group.unwrap().deployed, 3);

    let container = host.piece(&caravan).unwrap();
    let deployed: Vec<Piece> = host
        .pieces()
        .into_iter()
        .filter(|piece| piece.id.as_str().starts_with("created-"))
        .collect();
    for (i, a) in deployed.iter().enumerate() {
        assert!(!a.bounds().overlaps(&container.bounds()), "{} covers the container", a.id);
        for b in &deployed[i + 1..] {
            assert!(!a.bounds().overlaps(&b.bounds()), "{} overlaps {}", a.id, b.id);
        }
    }

    hud.dispatch(HudAction::ToggleDepositRetrieve).await.unwrap();

    assert_eq!(host.piece_count(), before);
    assert_eq!(hud.context().unwrap().group.unwrap().deployed, 0);
    assert_eq!(host.piece(&caravan).unwrap().position(), Point::new(500.0, 500.0));
}

#[tokio::test]
async fn open_search_survives_an_action() {
    let host = Rc::new(scene());
    let hud = overlay(host.clone(), "gm");
    hud.bind(&piece_id("hero-token")).unwrap();

    hud.toggle_submenu(SubmenuKind::StatusEffects);
    hud.search_input("fri");
    assert_eq!(hud.search_matches(), vec!["frightened".to_string()]);

    hud.dispatch(HudAction::ToggleCondition {
        id: "frightened".to_string(),
        direction: StepDirection::Increase,
    })
    .await
    .unwrap();

    assert_eq!(hud.open_submenu(), Some(SubmenuKind::StatusEffects));
    assert_eq!(hud.search_matches(), vec!["frightened".to_string()]);
    assert_eq!(hud.search_highlight().as_deref(), Some("frightened"));
    assert_eq!(hud.focused_input(), Some(NamedInput::Search));

    let context = hud.context().unwrap();
    let row = context
        .status_effects
        .iter()
        .find(|row| row.id == "frightened")
        .unwrap();
    assert!(row.active);
    assert_eq!(row.value, Some(1));
}

#[tokio::test]
async fn rendering_twice_keeps_the_session() {
    let host = Rc::new(scene());
    let hud = overlay(host, "gm");
    hud.bind(&piece_id("hero-token")).unwrap();
    hud.toggle_submenu(SubmenuKind::StatusEffects);
    hud.search_input("e");
    hud.scroll_to(42.0);

    let first = hud.session_state().unwrap();
    hud.render().unwrap();
    let second = hud.session_state().unwrap();
    hud.render().unwrap();

    assert_eq!(first, second);
    assert_eq!(second, hud.session_state().unwrap());
}

#[tokio::test]
async fn typed_bar_value_is_written_on_submit() {
    let host = Rc::new(scene());
    let hud = overlay(host.clone(), "gm");
    hud.bind(&piece_id("hero-token")).unwrap();

    hud.focus_input(NamedInput::Bar1);
    hud.type_input(NamedInput::Bar1, "-5");
    hud.submit_input(NamedInput::Bar1).await.unwrap();

    assert_eq!(hud.context().unwrap().bar1.unwrap().value, 7);
    assert_eq!(hud.focused_input(), None);
}

#[tokio::test]
async fn gate_hides_flagged_tokens_through_either_interception_point() {
    for supports_wrapping in [true, false] {
        let host = scene();
        let rules = VisibilityRules::new("token-hud", "party");
        let hero = piece_id("hero-token");
        rules
            .hide_from(&host, &hero, &ActorId::new("rogue"))
            .await
            .unwrap();

        let base = FnDetection::new(|_: &Piece, _: &str, _: &VisibilityQuery<'_>| true);
        let mut pipeline = DetectionPipeline::new(Box::new(base), supports_wrapping);
        let strategy = install_visibility_gate(&mut pipeline, "token-hud");
        let expected = if supports_wrapping {
            InterceptionStrategy::Wrap
        } else {
            InterceptionStrategy::Override
        };
        assert_eq!(strategy, expected);

        let target = host.piece(&hero).unwrap();
        let rogue = host.piece(&piece_id("rogue-token")).unwrap();
        let caravan = host.piece(&piece_id("caravan-token")).unwrap();
        let query = VisibilityQuery {
            target: Some(&target),
            tests: &[],
        };

        assert!(!pipeline.evaluate(&rogue, "sight", &query));
        assert!(pipeline.evaluate(&caravan, "sight", &query));

        let untargeted = VisibilityQuery {
            target: None,
            tests: &[],
        };
        assert!(pipeline.evaluate(&rogue, "sight", &untargeted));
    }
}

#[tokio::test]
async fn closing_during_a_write_skips_the_refresh() {
    let host = GatedScene::new(scene());
    let viewer = user(host.as_ref(), "gm");
    let hud = TokenHud::new(host.clone(), HudConfig::default(), catalog(), viewer);
    let hero: PieceId = piece_id("hero-token");
    hud.bind(&hero).unwrap();

    let (outcome, ()) = tokio::join!(hud.dispatch(HudAction::Reorder(SortDirection::Up)), async {
        tokio::task::yield_now().await;
        hud.close(true);
        host.release();
    });

    assert!(outcome.is_ok());
    assert!(!hud.is_rendered());
    assert_eq!(hud.bound_piece(), None);
    assert_eq!(host.piece(&hero).unwrap().sort, 1);
}

#[tokio::test]
async fn rebinding_during_a_write_keeps_the_new_overlay() {
    let host = GatedScene::new(scene());
    let viewer = user(host.as_ref(), "gm");
    let hud = TokenHud::new(host.clone(), HudConfig::default(), catalog(), viewer);
    let hero = piece_id("hero-token");
    let rogue = piece_id("rogue-token");
    hud.bind(&hero).unwrap();

    let (outcome, ()) = tokio::join!(hud.dispatch(HudAction::Reorder(SortDirection::Up)), async {
        tokio::task::yield_now().await;
        hud.bind(&rogue).unwrap();
        hud.toggle_submenu(SubmenuKind::Movement);
        host.release();
    });

    assert!(outcome.is_ok());
    assert_eq!(hud.bound_piece(), Some(rogue.clone()));
    assert_eq!(hud.context().unwrap().piece_id, rogue);
    assert_eq!(hud.open_submenu(), Some(SubmenuKind::Movement));
    assert_eq!(host.piece(&hero).unwrap().sort, 1);
}
