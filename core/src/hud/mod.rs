//! The token overlay bound to one token at a time.
//!
//! All state lives behind one `RefCell` and is only borrowed between await
//! points. Async handlers take a [`Ticket`] before their first round trip and
//! check it afterwards, so a handler whose overlay was closed or rebound in
//! the meantime leaves the new session alone.

mod actions;
mod deploy;

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Instant;

use bitflags::bitflags;

use crate::cache::{DerivedViewCache, ViewKind};
use crate::config::HudConfig;
use crate::drag::DragObserver;
use crate::errors::HudError;
use crate::host::Host;
use crate::session::{HudSessionState, HudView, NamedInput, SearchRow};
use crate::submenu::{place_submenu, Placement, SubmenuEvent, SubmenuKind};
use crate::types::{Piece, PieceId, Point, StatusDefinition, User};
use crate::views::{bar_view, movement_view, GroupView, HudContext};
use crate::visibility::{on_piece_redraw, VisibilityRules};

pub use actions::{HudAction, SortDirection, StepDirection, VisibilityDirection, VisibilityScope};
pub use deploy::deployed_pieces;

bitflags! {
    /// Controls disabled while their round trips are outstanding.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct HudControls: u8 {
        const DEPOSIT_RETRIEVE = 1 << 0;
        const COMBAT = 1 << 1;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeyModifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub meta: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchKey {
    ArrowDown,
    ArrowUp,
    Enter,
    Escape,
}

/// Identifies the binding an async handler started under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Ticket {
    piece: PieceId,
    epoch: u64,
}

#[derive(Debug)]
struct Session {
    view: HudView,
    context: HudContext,
}

#[derive(Debug, Default)]
struct HudState {
    epoch: u64,
    bound: Option<PieceId>,
    session: Option<Session>,
    cache: DerivedViewCache,
    disabled: HudControls,
    position: Option<Point>,
}

pub struct TokenHud<H> {
    host: Rc<H>,
    config: HudConfig,
    catalog: Vec<StatusDefinition>,
    viewer: User,
    rules: VisibilityRules,
    state: RefCell<HudState>,
}

impl<H: Host> TokenHud<H> {
    pub fn new(host: Rc<H>, config: HudConfig, catalog: Vec<StatusDefinition>, viewer: User) -> Self {
        let rules = VisibilityRules::new(&config.flag_namespace, &config.party_actor_kind);
        TokenHud {
            host,
            config,
            catalog,
            viewer,
            rules,
            state: RefCell::new(HudState::default()),
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn config(&self) -> &HudConfig {
        &self.config
    }

    pub fn viewer(&self) -> &User {
        &self.viewer
    }

    pub fn rules(&self) -> &VisibilityRules {
        &self.rules
    }

    pub fn bound_piece(&self) -> Option<PieceId> {
        self.state.borrow().bound.clone()
    }

    pub fn is_rendered(&self) -> bool {
        self.state.borrow().session.is_some()
    }

    pub fn context(&self) -> Option<HudContext> {
        self.with_session(|session| session.context.clone())
    }

    pub fn session_state(&self) -> Option<HudSessionState> {
        self.with_session(|session| session.view.snapshot())
    }

    pub fn open_submenu(&self) -> Option<SubmenuKind> {
        self.with_session(|session| session.view.submenus.open_kind())
            .flatten()
    }

    pub fn open_submenu_count(&self) -> usize {
        self.with_session(|session| session.view.submenus.open_count())
            .unwrap_or(0)
    }

    pub fn submenu_placement(&self, kind: SubmenuKind) -> Placement {
        self.with_session(|session| session.view.submenus.placement(kind))
            .unwrap_or_default()
    }

    pub fn search_highlight(&self) -> Option<String> {
        self.with_session(|session| session.view.search.highlighted().map(str::to_string))
            .flatten()
    }

    pub fn search_matches(&self) -> Vec<String> {
        self.with_session(|session| {
            session
                .view
                .search
                .matching_ids()
                .into_iter()
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
    }

    pub fn focused_input(&self) -> Option<NamedInput> {
        self.with_session(|session| session.view.inputs.focused())
            .flatten()
    }

    pub fn input_draft(&self, input: NamedInput) -> Option<String> {
        self.with_session(|session| session.view.inputs.draft(input).map(str::to_string))
            .flatten()
    }

    pub fn has_pending_timers(&self) -> bool {
        self.with_session(|session| session.view.submenus.has_pending_timers())
            .unwrap_or(false)
    }

    pub fn position(&self) -> Option<Point> {
        self.state.borrow().position
    }

    pub fn is_disabled(&self, control: HudControls) -> bool {
        self.state.borrow().disabled.contains(control)
    }

    pub fn cache_computations(&self, kind: ViewKind) -> u64 {
        self.state.borrow().cache.computations(kind)
    }

    fn with_session<R>(&self, f: impl FnOnce(&Session) -> R) -> Option<R> {
        self.state.borrow().session.as_ref().map(f)
    }

    /// Binds the overlay to `piece` and renders it. Any previous binding is
    /// dropped together with its cache and session.
    pub fn bind(&self, piece: &PieceId) -> Result<(), HudError> {
        if self.host.piece(piece).is_none() {
            return Err(HudError::PieceMissing(piece.clone()));
        }
        {
            let mut state = self.state.borrow_mut();
            if let Some(session) = state.session.as_mut() {
                session.view.submenus.cancel_timers();
            }
            *state = HudState {
                epoch: state.epoch + 1,
                bound: Some(piece.clone()),
                ..Default::default()
            };
        }
        log::debug!("overlay bound to {piece}");
        self.render()
    }

    /// Rebuilds the overlay from current data, carrying the interaction
    /// session and pending close deadlines across. A failed rebuild leaves the
    /// previous session intact.
    pub fn render(&self) -> Result<(), HudError> {
        let piece_id = self.state.borrow().bound.clone().ok_or(HudError::Unbound)?;
        let snapshot = self.session_state();
        let timers = self.with_session(|session| session.view.submenus.timers());

        let (context, mut view) = self.rebuild(&piece_id)?;

        if let Some(snapshot) = &snapshot {
            let events = view.restore(snapshot);
            view.apply(&events);
            self.place_opened(&mut view, &events);
        }
        if let Some(timers) = &timers {
            view.submenus.rearm(timers);
        }

        {
            let mut state = self.state.borrow_mut();
            if let Some(previous) = state.session.as_mut() {
                previous.view.submenus.cancel_timers();
            }
            state.session = Some(Session { view, context });
        }
        self.compute_position();
        Ok(())
    }

    fn rebuild(&self, piece_id: &PieceId) -> Result<(HudContext, HudView), HudError> {
        let piece = self
            .host
            .piece(piece_id)
            .ok_or_else(|| HudError::PieceMissing(piece_id.clone()))?;
        let actor = piece.actor_id.as_ref().and_then(|id| self.host.actor(id));
        let is_gm = self.viewer.is_gm;

        let (status_effects, visibility) = {
            let mut state = self.state.borrow_mut();
            let status_effects = match &actor {
                Some(actor) => state.cache.status_effects(&self.catalog, actor).to_vec(),
                None => Vec::new(),
            };
            let visibility = if is_gm {
                let flags = self.rules.flags(&piece);
                let roster = self.rules.roster(self.host.as_ref(), &piece);
                Some(state.cache.visibility(&piece, &flags, &roster).clone())
            } else {
                None
            };
            (status_effects, visibility)
        };

        let group = actor.as_ref().filter(|actor| actor.is_group()).map(|actor| GroupView {
            members: actor.members.len(),
            deployed: deployed_pieces(self.host.as_ref(), &piece, actor).len(),
        });

        let mut kinds = Vec::with_capacity(SubmenuKind::ALL.len());
        if actor.is_some() {
            kinds.push(SubmenuKind::StatusEffects);
        }
        if is_gm {
            kinds.push(SubmenuKind::Visibility);
        }
        kinds.push(SubmenuKind::Movement);

        let rows = status_effects
            .iter()
            .map(|row| SearchRow {
                id: row.id.clone(),
                label: row.title.clone(),
            })
            .collect();
        let view = HudView::build(
            &kinds,
            rows,
            self.config.submenu_close_delay(),
            self.config.hud_leave_delay(),
        );

        let context = HudContext {
            piece_id: piece.id.clone(),
            actor_name: actor.as_ref().map(|actor| actor.name.clone()),
            bar1: actor
                .as_ref()
                .and_then(|actor| bar_view(actor, piece.bar1.as_deref())),
            bar2: actor
                .as_ref()
                .and_then(|actor| bar_view(actor, piece.bar2.as_deref())),
            status_effects,
            visibility,
            hidden: piece.hidden,
            elevation: piece.elevation,
            locked: piece.locked,
            in_combat: piece.in_combat,
            targeted: self.host.is_targeted(&piece.id),
            sort: piece.sort,
            movement: movement_view(piece.movement_action.as_deref()),
            is_gm,
            can_configure: actor
                .as_ref()
                .map_or(is_gm, |actor| self.viewer.can_modify(actor)),
            group,
        };
        Ok((context, view))
    }

    /// Closes the overlay: cancels every timer, drops cache and session and
    /// releases the token unless `skip_release` is set.
    pub fn close(&self, skip_release: bool) {
        let bound = {
            let mut state = self.state.borrow_mut();
            if let Some(session) = state.session.as_mut() {
                session.view.submenus.cancel_timers();
            }
            let bound = state.bound.take();
            *state = HudState {
                epoch: state.epoch + 1,
                ..Default::default()
            };
            bound
        };

        if let Some(piece) = bound {
            if !skip_release {
                self.host.release(&piece);
            }
            log::debug!("overlay closed for {piece}");
        }
    }

    /// Screen position of the overlay's top-left corner: right of the token,
    /// flipped left on overflow, clamped inside the viewport margin.
    pub fn compute_position(&self) -> Option<Point> {
        let piece_id = self.bound_piece()?;
        let piece = self.host.piece(&piece_id)?;

        let top_left = self.host.world_to_screen(piece.position());
        let bottom_right = self
            .host
            .world_to_screen(Point::new(piece.x + piece.width, piece.y + piece.height));
        let viewport = self.host.viewport();
        let HudConfig {
            viewport_margin: margin,
            hud_width: width,
            hud_height: height,
            hud_offset: offset,
            ..
        } = self.config;

        let mut left = bottom_right.x + offset;
        let top = top_left.y + (bottom_right.y - top_left.y) / 2.0;
        if left + width > viewport.width - margin {
            left = top_left.x - width - offset;
        }

        let position = Point::new(
            margin.max(left.min(viewport.width - width - margin)),
            margin.max(top.min(viewport.height - height - margin)),
        );
        self.state.borrow_mut().position = Some(position);
        Some(position)
    }

    /// Redraw hook for any token, bound or not.
    pub fn redraw_piece(&self, piece: &Piece) {
        on_piece_redraw(
            self.host.as_ref(),
            &self.viewer,
            piece,
            self.rules.namespace(),
            self.config.dim_alpha,
        );
    }

    fn place_opened(&self, view: &mut HudView, events: &[SubmenuEvent]) {
        for event in events {
            if let SubmenuEvent::Opened { kind, .. } = *event {
                let placement = place_submenu(
                    self.host.measure_trigger(kind),
                    self.host.measure_submenu(kind),
                    self.host.viewport(),
                    self.config.viewport_margin,
                );
                view.submenus.set_placement(kind, placement);
            }
        }
    }

    /// Runs a submenu transition against the live view and applies its side
    /// effects.
    fn drive(&self, f: impl FnOnce(&mut HudView) -> Vec<SubmenuEvent>) -> Vec<SubmenuEvent> {
        let mut state = self.state.borrow_mut();
        let Some(session) = state.session.as_mut() else {
            return Vec::new();
        };
        let events = f(&mut session.view);
        session.view.apply(&events);
        self.place_opened(&mut session.view, &events);
        events
    }

    pub fn hover_enter_trigger(&self, kind: SubmenuKind) -> Vec<SubmenuEvent> {
        self.drive(|view| view.submenus.hover_enter_trigger(kind))
    }

    pub fn hover_leave_trigger(&self, kind: SubmenuKind, now: Instant) {
        self.drive(|view| {
            view.submenus.hover_leave_trigger(kind, now);
            Vec::new()
        });
    }

    pub fn hover_enter_submenu(&self, kind: SubmenuKind) {
        self.drive(|view| {
            view.submenus.hover_enter_content(kind);
            Vec::new()
        });
    }

    pub fn hover_leave_submenu(&self, kind: SubmenuKind, now: Instant) {
        self.drive(|view| {
            view.submenus.hover_leave_content(kind, now);
            Vec::new()
        });
    }

    pub fn pointer_enter(&self) {
        self.drive(|view| {
            view.submenus.pointer_enter_hud();
            Vec::new()
        });
    }

    pub fn pointer_leave(&self, now: Instant) {
        self.drive(|view| {
            view.submenus.pointer_leave_hud(now);
            Vec::new()
        });
    }

    pub fn toggle_submenu(&self, kind: SubmenuKind) -> Vec<SubmenuEvent> {
        self.drive(|view| view.submenus.toggle(kind))
    }

    pub fn escape_submenu(&self, kind: SubmenuKind) -> Vec<SubmenuEvent> {
        self.drive(|view| view.submenus.escape(kind).into_iter().collect())
    }

    pub fn close_submenus(&self) -> Vec<SubmenuEvent> {
        self.drive(|view| view.submenus.close_all())
    }

    /// Fires expired debounce timers. Called from the host's event loop.
    pub fn tick(&self, now: Instant) -> Vec<SubmenuEvent> {
        self.drive(|view| view.submenus.tick(now))
    }

    pub fn search_input(&self, text: &str) {
        self.drive(|view| {
            view.search.set_query(text);
            view.inputs.focus(NamedInput::Search);
            Vec::new()
        });
    }

    pub fn scroll_to(&self, offset: f32) {
        self.drive(|view| {
            view.scroll_offset = offset;
            Vec::new()
        });
    }

    pub fn focus_input(&self, input: NamedInput) {
        self.drive(|view| {
            view.inputs.focus(input);
            Vec::new()
        });
    }

    pub fn type_input(&self, input: NamedInput, text: &str) {
        if input == NamedInput::Search {
            return self.search_input(text);
        }
        self.drive(|view| {
            view.inputs.type_text(input, text);
            view.inputs.focus(input);
            Vec::new()
        });
    }

    /// Escape inside a named input blurs it and discards what was typed.
    pub fn escape_input(&self, input: NamedInput) {
        self.drive(|view| {
            if view.inputs.focused() == Some(input) {
                view.inputs.blur();
            }
            view.inputs.take_draft(input);
            Vec::new()
        });
    }

    /// Submits the text typed into a bar or elevation input.
    pub async fn submit_input(&self, input: NamedInput) -> Result<(), HudError> {
        let text = self
            .with_session_mut(|session| {
                if session.view.inputs.focused() == Some(input) {
                    session.view.inputs.blur();
                }
                session.view.inputs.take_draft(input)
            })
            .flatten();
        let Some(text) = text else {
            return Ok(());
        };
        self.dispatch(HudAction::EditAttribute { input, text }).await
    }

    /// Keyboard handling inside the status-effect search field.
    pub async fn search_key(&self, key: SearchKey, modifiers: KeyModifiers) -> Result<(), HudError> {
        match key {
            SearchKey::ArrowDown | SearchKey::ArrowUp => {
                let step = if key == SearchKey::ArrowDown { 1 } else { -1 };
                self.drive(|view| {
                    view.search.move_highlight(step);
                    Vec::new()
                });
                Ok(())
            }
            SearchKey::Escape => {
                self.escape_submenu(SubmenuKind::StatusEffects);
                Ok(())
            }
            SearchKey::Enter => {
                let Some(id) = self.search_highlight() else {
                    return Ok(());
                };
                let ticket = self.ticket()?;
                let close_after = modifiers.ctrl || modifiers.meta;
                let direction = if !close_after && modifiers.shift {
                    StepDirection::Decrease
                } else {
                    StepDirection::Increase
                };

                let outcome = self
                    .dispatch(HudAction::ToggleCondition { id, direction })
                    .await;
                if close_after && self.is_current(&ticket) {
                    self.drive(|view| view.submenus.close(SubmenuKind::StatusEffects).into_iter().collect());
                }
                outcome
            }
        }
    }

    fn with_session_mut<R>(&self, f: impl FnOnce(&mut Session) -> R) -> Option<R> {
        self.state.borrow_mut().session.as_mut().map(f)
    }

    pub(crate) fn ticket(&self) -> Result<Ticket, HudError> {
        let state = self.state.borrow();
        let piece = state.bound.clone().ok_or(HudError::Unbound)?;
        Ok(Ticket {
            piece,
            epoch: state.epoch,
        })
    }

    pub(crate) fn is_current(&self, ticket: &Ticket) -> bool {
        let state = self.state.borrow();
        state.epoch == ticket.epoch && state.bound.as_ref() == Some(&ticket.piece)
    }

    /// Marks `control` busy. Fails if it already is.
    pub(crate) fn disable(&self, control: HudControls) -> Result<(), HudError> {
        let mut state = self.state.borrow_mut();
        if state.disabled.contains(control) {
            return Err(HudError::NotApplicable(format!("{control:?} is busy")));
        }
        state.disabled.insert(control);
        Ok(())
    }

    /// Re-enables `control` if the overlay still belongs to `ticket`'s binding;
    /// a new binding starts with every control enabled.
    pub(crate) fn enable(&self, ticket: &Ticket, control: HudControls) {
        if self.is_current(ticket) {
            self.state.borrow_mut().disabled.remove(control);
        }
    }

    /// Re-renders after a successful action if the binding is unchanged.
    pub(crate) fn refresh(&self, ticket: &Ticket) -> Result<(), HudError> {
        if !self.is_current(ticket) {
            log::debug!("overlay for {} moved on, skipping refresh", ticket.piece);
            return Ok(());
        }
        self.render()
    }
}

impl<H: Host> DragObserver for TokenHud<H> {
    fn drag_started(&self, piece: &PieceId) {
        if self.bound_piece().as_ref() == Some(piece) {
            self.close_submenus();
        }
    }

    fn drag_ended(&self, piece: &PieceId, cancelled: bool) {
        if self.bound_piece().as_ref() == Some(piece) {
            log::debug!("drag of {piece} ended (cancelled: {cancelled})");
            self.compute_position();
        }
    }
}
