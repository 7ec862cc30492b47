//! Depositing a group's linked tokens around the group token and retrieving
//! them again.

use super::{HudControls, Ticket, TokenHud};
use crate::errors::{HudError, NoticeLevel};
use crate::host::{Host, Store};
use crate::placement::{candidate_cells, solve_deposit};
use crate::types::{Actor, Piece, PieceId, PieceSpec, PieceUpdate, Size};

/// Tokens of `group`'s members currently on the scene, excluding the
/// container token itself.
pub fn deployed_pieces<S: Store>(store: &S, container: &Piece, group: &Actor) -> Vec<Piece> {
    store
        .pieces()
        .into_iter()
        .filter(|piece| piece.id != container.id)
        .filter(|piece| {
            piece
                .actor_id
                .as_ref()
                .is_some_and(|actor| group.members.contains(actor))
        })
        .collect()
}

impl<H: Host> TokenHud<H> {
    pub(crate) async fn toggle_deposit_retrieve(&self, ticket: &Ticket) -> Result<(), HudError> {
        let (container, group) = self.load_group(ticket)?;
        if deployed_pieces(self.host.as_ref(), &container, &group).is_empty() {
            self.run_deploy(ticket, Deploy::Deposit).await
        } else {
            self.run_deploy(ticket, Deploy::Retrieve).await
        }
    }

    /// Scatters one new token per group member around the bound token.
    pub async fn deposit(&self) -> Result<(), HudError> {
        let outcome = self.deploy_and_refresh(Deploy::Deposit).await;
        if let Err(err) = &outcome {
            self.report(err);
        }
        outcome
    }

    /// Recalls every deployed member token into the bound token.
    pub async fn retrieve(&self) -> Result<(), HudError> {
        let outcome = self.deploy_and_refresh(Deploy::Retrieve).await;
        if let Err(err) = &outcome {
            self.report(err);
        }
        outcome
    }

    async fn deploy_and_refresh(&self, deploy: Deploy) -> Result<(), HudError> {
        let ticket = self.ticket()?;
        self.run_deploy(&ticket, deploy).await?;
        self.refresh(&ticket)
    }

    fn load_group(&self, ticket: &Ticket) -> Result<(Piece, Actor), HudError> {
        let container = self.load_piece(ticket)?;
        let group = self.owner(&container)?;
        if !self.viewer.can_modify(&group) {
            return Err(HudError::PermissionDenied {
                operation: "deposit or retrieve tokens",
            });
        }
        Ok((container, group))
    }

    /// Keeps the control disabled for the whole operation and re-enables it
    /// whatever the outcome.
    async fn run_deploy(&self, ticket: &Ticket, deploy: Deploy) -> Result<(), HudError> {
        let (container, group) = self.load_group(ticket)?;
        if group.members.is_empty() {
            log::debug!("{} has no members, nothing to deploy", group.id);
            return Ok(());
        }

        self.disable(HudControls::DEPOSIT_RETRIEVE)?;
        let outcome = match deploy {
            Deploy::Deposit => self.deposit_members(&container, &group).await,
            Deploy::Retrieve => self.retrieve_members(&container, &group).await,
        };
        self.enable(ticket, HudControls::DEPOSIT_RETRIEVE);
        outcome
    }

    async fn deposit_members(&self, container: &Piece, group: &Actor) -> Result<(), HudError> {
        let specs: Vec<PieceSpec> = group
            .members
            .iter()
            .filter_map(|member| {
                let actor = self.host.actor(member);
                if actor.is_none() {
                    log::warn!("group {} lists unknown member {member}", group.id);
                }
                actor
            })
            .map(|actor| PieceSpec {
                name: if actor.prototype.name.is_empty() {
                    actor.name.clone()
                } else {
                    actor.prototype.name.clone()
                },
                actor_id: actor.id.clone(),
                x: container.x,
                y: container.y,
                width: actor.prototype.width,
                height: actor.prototype.height,
            })
            .collect();
        if specs.is_empty() {
            return Ok(());
        }

        let sizes: Vec<Size> = specs
            .iter()
            .map(|spec| Size::new(spec.width, spec.height))
            .collect();
        let created = self.host.create_pieces(specs).await?;
        let pieces: Vec<(PieceId, Size)> = created.into_iter().zip(sizes).collect();

        let candidates = candidate_cells(
            container.bounds(),
            self.host.grid_size(),
            self.config.search_radius_factor,
            |from, to| self.host.blocks_movement(from, to),
        );
        let placements = solve_deposit(container.bounds(), &pieces, &candidates);

        let updates = placements
            .into_iter()
            .map(|(id, position)| (id, PieceUpdate::position(position)))
            .collect();
        self.host.update_pieces(updates).await?;

        log::info!(
            "deposited {} tokens around {}",
            pieces.len(),
            container.id
        );
        Ok(())
    }

    async fn retrieve_members(&self, container: &Piece, group: &Actor) -> Result<(), HudError> {
        let deployed: Vec<PieceId> = deployed_pieces(self.host.as_ref(), container, group)
            .into_iter()
            .map(|piece| piece.id)
            .collect();
        if deployed.is_empty() {
            self.host.notify(
                NoticeLevel::Warning,
                &format!("{} has no deployed tokens to retrieve", group.name),
            );
            return Ok(());
        }

        let updates = deployed
            .iter()
            .map(|id| (id.clone(), PieceUpdate::position(container.position())))
            .collect();
        self.host.update_pieces(updates).await?;

        for id in &deployed {
            self.host.wait_for_movement(id).await?;
        }

        let count = deployed.len();
        self.host.delete_pieces(deployed).await?;
        log::info!("retrieved {count} tokens into {}", container.id);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Deploy {
    Deposit,
    Retrieve,
}
