//! The logical actions the overlay's controls issue.

use serde::{Deserialize, Serialize};

use super::{HudControls, Ticket, TokenHud};
use crate::constants::MOVEMENT_ACTIONS;
use crate::errors::HudError;
use crate::host::Host;
use crate::input::AttributeInput;
use crate::session::NamedInput;
use crate::types::{Actor, ActorId, Condition, Piece, PieceUpdate};
use crate::views::{bar_view, status_effects_view};
use crate::visibility::is_hidden_from_all;

/// Left click increases, right click decreases.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StepDirection {
    Increase,
    Decrease,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VisibilityScope {
    /// The token's own hidden-from-everyone field.
    Token,
    /// Every observer in the roster.
    All,
    Observer(ActorId),
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum VisibilityDirection {
    #[default]
    Toggle,
    Hide,
    Reveal,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Up,
    Down,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HudAction {
    ToggleCondition {
        id: String,
        direction: StepDirection,
    },
    IncrementCondition(String),
    DecrementCondition(String),
    ToggleVisibility {
        scope: VisibilityScope,
        #[serde(default)]
        direction: VisibilityDirection,
    },
    ToggleCombat,
    ToggleDepositRetrieve,
    ToggleTarget,
    Reorder(SortDirection),
    /// `None` selects the platform default.
    SelectMovementAction(Option<String>),
    EditAttribute {
        input: NamedInput,
        text: String,
    },
    OpenEditor,
}

impl<H: Host> TokenHud<H> {
    /// Runs `action` against the bound token and re-renders on success.
    ///
    /// A failure raises at most one notification (none for
    /// [`HudError::NotApplicable`]) and is returned to the caller as well.
    pub async fn dispatch(&self, action: HudAction) -> Result<(), HudError> {
        log::debug!("dispatching {action:?}");
        let outcome = self.perform(action).await;
        if let Err(err) = &outcome {
            self.report(err);
        }
        outcome
    }

    pub(crate) fn report(&self, err: &HudError) {
        match err.notice_level() {
            Some(level) => self.host.notify(level, &err.to_string()),
            None => log::debug!("ignoring: {err}"),
        }
    }

    async fn perform(&self, action: HudAction) -> Result<(), HudError> {
        let ticket = self.ticket()?;
        match action {
            HudAction::ToggleCondition { id, direction } => {
                self.step_status(&ticket, &id, direction).await?
            }
            HudAction::IncrementCondition(id) => {
                self.step_status(&ticket, &id, StepDirection::Increase)
                    .await?
            }
            HudAction::DecrementCondition(id) => {
                self.step_status(&ticket, &id, StepDirection::Decrease)
                    .await?
            }
            HudAction::ToggleVisibility { scope, direction } => {
                self.toggle_visibility(&ticket, scope, direction).await?
            }
            HudAction::ToggleCombat => self.toggle_combat(&ticket).await?,
            HudAction::ToggleDepositRetrieve => self.toggle_deposit_retrieve(&ticket).await?,
            HudAction::ToggleTarget => {
                let targeted = !self.host.is_targeted(&ticket.piece);
                self.host.set_target(&ticket.piece, targeted);
            }
            HudAction::Reorder(direction) => {
                let piece = self.load_piece(&ticket)?;
                let sort = match direction {
                    SortDirection::Up => piece.sort.saturating_add(1),
                    SortDirection::Down => piece.sort.saturating_sub(1),
                };
                self.update_piece(&ticket, PieceUpdate {
                    sort: Some(sort),
                    ..Default::default()
                })
                .await?
            }
            HudAction::SelectMovementAction(action) => {
                if let Some(name) = &action {
                    if !MOVEMENT_ACTIONS.contains(&name.as_str()) {
                        return Err(HudError::NotApplicable(format!(
                            "unknown movement action {name}"
                        )));
                    }
                }
                self.update_piece(&ticket, PieceUpdate {
                    movement_action: Some(action),
                    ..Default::default()
                })
                .await?
            }
            HudAction::EditAttribute { input, text } => {
                self.edit_attribute(&ticket, input, &text).await?
            }
            HudAction::OpenEditor => {
                self.host.open_editor(&ticket.piece);
                return Ok(());
            }
        }
        self.refresh(&ticket)
    }

    pub(crate) fn load_piece(&self, ticket: &Ticket) -> Result<Piece, HudError> {
        self.host
            .piece(&ticket.piece)
            .ok_or_else(|| HudError::PieceMissing(ticket.piece.clone()))
    }

    pub(crate) fn owner(&self, piece: &Piece) -> Result<Actor, HudError> {
        piece
            .actor_id
            .as_ref()
            .and_then(|id| self.host.actor(id))
            .ok_or(HudError::MissingOwner)
    }

    fn require_gm(&self, operation: &'static str) -> Result<(), HudError> {
        if self.viewer.is_gm {
            Ok(())
        } else {
            Err(HudError::PermissionDenied { operation })
        }
    }

    async fn update_piece(&self, ticket: &Ticket, update: PieceUpdate) -> Result<(), HudError> {
        self.host
            .update_pieces(vec![(ticket.piece.clone(), update)])
            .await?;
        Ok(())
    }

    async fn step_status(
        &self,
        ticket: &Ticket,
        id: &str,
        direction: StepDirection,
    ) -> Result<(), HudError> {
        let piece = self.load_piece(ticket)?;
        let actor = self.owner(&piece)?;
        let definition = self
            .catalog
            .iter()
            .find(|status| status.id == id)
            .ok_or_else(|| HudError::NotApplicable(format!("unknown status {id}")))?;

        if definition.condition {
            return self.step_condition(&actor, id, direction).await;
        }

        let active = status_effects_view(&self.catalog, &actor)
            .iter()
            .any(|row| row.id == id && row.active);
        self.host
            .toggle_status_effect(
                &actor.id,
                id,
                !active,
                direction == StepDirection::Decrease,
            )
            .await?;
        Ok(())
    }

    /// Valued conditions move one stage at a time; a condition at its last
    /// stage (or without stages) is removed on decrease.
    async fn step_condition(
        &self,
        actor: &Actor,
        slug: &str,
        direction: StepDirection,
    ) -> Result<(), HudError> {
        let existing = actor.condition(slug).cloned();
        match (direction, existing) {
            (StepDirection::Increase, Some(Condition { value: Some(value), .. })) => {
                self.host
                    .set_condition_value(&actor.id, slug, value.saturating_add(1))
                    .await?
            }
            (StepDirection::Increase, _) => self.host.add_condition(&actor.id, slug).await?,
            (StepDirection::Decrease, Some(Condition { value: Some(value), .. })) if value > 1 => {
                self.host
                    .set_condition_value(&actor.id, slug, value - 1)
                    .await?
            }
            (StepDirection::Decrease, Some(_)) => {
                self.host.remove_condition(&actor.id, slug).await?
            }
            (StepDirection::Decrease, None) => {
                return Err(HudError::NotApplicable(format!(
                    "{slug} is not applied to {}",
                    actor.id
                )));
            }
        }
        Ok(())
    }

    async fn toggle_visibility(
        &self,
        ticket: &Ticket,
        scope: VisibilityScope,
        direction: VisibilityDirection,
    ) -> Result<(), HudError> {
        self.require_gm("change token visibility")?;
        let piece = self.load_piece(ticket)?;
        let flags = self.rules.flags(&piece);
        let resolve = |currently_hidden: bool| match direction {
            VisibilityDirection::Toggle => !currently_hidden,
            VisibilityDirection::Hide => true,
            VisibilityDirection::Reveal => false,
        };

        match scope {
            VisibilityScope::Token => {
                let hide = resolve(piece.hidden);
                if hide != piece.hidden {
                    self.update_piece(ticket, PieceUpdate {
                        hidden: Some(hide),
                        ..Default::default()
                    })
                    .await?;
                    self.host.refresh_perception();
                }
            }
            VisibilityScope::All => {
                let roster = self.rules.roster(self.host.as_ref(), &piece);
                if resolve(is_hidden_from_all(&flags, &roster)) {
                    self.rules.hide_from_all(self.host.as_ref(), &piece.id).await?;
                } else {
                    self.rules.reveal_to_all(self.host.as_ref(), &piece.id).await?;
                }
            }
            VisibilityScope::Observer(observer) => {
                if resolve(flags.contains(&observer)) {
                    self.rules
                        .hide_from(self.host.as_ref(), &piece.id, &observer)
                        .await?;
                } else {
                    self.rules
                        .reveal_to(self.host.as_ref(), &piece.id, &observer)
                        .await?;
                }
            }
        }
        Ok(())
    }

    /// Adds or removes the controlled tokens plus this one, depending on
    /// whether this token is in combat.
    async fn toggle_combat(&self, ticket: &Ticket) -> Result<(), HudError> {
        self.require_gm("toggle combat")?;
        let piece = self.load_piece(ticket)?;

        let mut pieces = self.host.controlled_pieces();
        if !pieces.contains(&piece.id) {
            pieces.push(piece.id.clone());
        }

        self.disable(HudControls::COMBAT)?;
        let outcome = if piece.in_combat {
            self.host.delete_combatants(pieces).await
        } else {
            self.host.create_combatants(pieces).await
        };
        self.enable(ticket, HudControls::COMBAT);
        outcome?;
        Ok(())
    }

    async fn edit_attribute(
        &self,
        ticket: &Ticket,
        input: NamedInput,
        text: &str,
    ) -> Result<(), HudError> {
        let parsed = AttributeInput::parse(text)?;
        let piece = self.load_piece(ticket)?;

        let attribute = match input {
            NamedInput::Search => {
                return Err(HudError::NotApplicable("search is not an attribute".to_string()));
            }
            NamedInput::Elevation => {
                let elevation = parsed.resolve(f64::from(piece.elevation)) as f32;
                return self
                    .update_piece(ticket, PieceUpdate {
                        elevation: Some(elevation),
                        ..Default::default()
                    })
                    .await;
            }
            NamedInput::Bar1 => piece.bar1.clone(),
            NamedInput::Bar2 => piece.bar2.clone(),
        };
        let attribute = attribute
            .ok_or_else(|| HudError::NotApplicable(format!("{input:?} has no attribute")))?;

        let actor = self.owner(&piece)?;
        let is_bar = bar_view(&actor, Some(attribute.as_str())).is_some_and(|bar| bar.is_bar());
        self.host
            .modify_attribute(
                &actor.id,
                &attribute,
                parsed.as_write_value(),
                parsed.is_delta,
                is_bar,
            )
            .await?;
        Ok(())
    }
}
