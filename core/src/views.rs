//! Derived views rendered by the overlay. Every builder here is a pure
//! function of its arguments so the fingerprint cache can memoize it.

use crate::constants::MOVEMENT_ACTIONS;
use crate::types::{Actor, ActorId, Piece, PieceId, StatusDefinition};
use crate::visibility::{is_hidden_from_all, roster_signature, RosterEntry, VisibilityFlagSet};

/// One row of the status-effect submenu.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusRow {
    pub id: String,
    pub title: String,
    pub img: String,
    pub value: Option<u8>,
    pub active: bool,
    pub overlay: bool,
    /// Handled through the condition API rather than a plain effect toggle.
    pub condition: bool,
}

impl StatusRow {
    pub fn css_class(&self) -> String {
        let mut classes = Vec::new();
        if self.active {
            classes.push("active");
        }
        if self.overlay {
            classes.push("overlay");
        }
        classes.join(" ")
    }
}

/// Builds the status-effect rows for `actor` from the catalog.
///
/// Catalog entries hidden from the HUD (globally or for this actor kind) are
/// skipped. Condition-backed entries are active when a matching in-HUD
/// condition exists; every other entry is active when a generic effect carries
/// the status (bound entries require the bound effect id, unbound ones an
/// effect with exactly that single status). Each row reads only the source its
/// toggle writes to.
pub fn status_effects_view(catalog: &[StatusDefinition], actor: &Actor) -> Vec<StatusRow> {
    let mut rows: Vec<StatusRow> = catalog
        .iter()
        .filter(|status| status.hud.allows(&actor.kind))
        .map(|status| StatusRow {
            id: status.id.clone(),
            title: status.name.clone(),
            img: status.img.clone(),
            value: None,
            active: false,
            overlay: false,
            condition: status.condition,
        })
        .collect();

    for condition in actor.conditions.iter().filter(|condition| condition.in_hud) {
        if let Some(row) = rows
            .iter_mut()
            .find(|row| row.condition && row.id == condition.slug)
        {
            row.active = true;
            row.value = condition.value;
        }
    }

    for effect in &actor.effects {
        for status_id in &effect.statuses {
            let Some(definition) = catalog
                .iter()
                .find(|status| !status.condition && &status.id == status_id)
            else {
                continue;
            };
            let matches = match &definition.effect_id {
                Some(bound) => bound == &effect.id,
                None => effect.statuses.len() == 1,
            };
            if !matches {
                continue;
            }
            if let Some(row) = rows.iter_mut().find(|row| &row.id == status_id) {
                row.active = true;
                row.overlay |= effect.overlay;
                break;
            }
        }
    }

    rows
}

/// Fingerprint of every input [`status_effects_view`] reads from the actor.
pub fn status_fingerprint(actor: &Actor) -> String {
    let mut conditions: Vec<String> = actor
        .conditions
        .iter()
        .filter(|condition| condition.in_hud)
        .map(|condition| match condition.value {
            Some(value) => format!("{}:{value}", condition.slug),
            None => format!("{}:-", condition.slug),
        })
        .collect();
    conditions.sort();

    let effects: Vec<String> = actor
        .effects
        .iter()
        .map(|effect| {
            let statuses = effect.statuses.iter().cloned().collect::<Vec<_>>().join("+");
            if effect.overlay {
                format!("{}:{statuses}:overlay", effect.id)
            } else {
                format!("{}:{statuses}", effect.id)
            }
        })
        .collect();

    format!(
        "{}|{}|{}|{}",
        actor.id,
        actor.kind,
        conditions.join(","),
        effects.join(",")
    )
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisibilityRow {
    pub actor_id: ActorId,
    pub name: String,
    pub hidden: bool,
}

/// Summary shown in the conditional-visibility submenu.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VisibilityView {
    /// The token's own hidden-from-everyone field.
    pub hidden: bool,
    pub observers: Vec<VisibilityRow>,
    pub hidden_from_any: bool,
    pub hidden_from_all: bool,
}

pub fn visibility_view(
    piece: &Piece,
    flags: &VisibilityFlagSet,
    roster: &[RosterEntry],
) -> VisibilityView {
    VisibilityView {
        hidden: piece.hidden,
        observers: roster
            .iter()
            .map(|entry| VisibilityRow {
                actor_id: entry.actor_id.clone(),
                name: entry.name.clone(),
                hidden: flags.contains(&entry.actor_id),
            })
            .collect(),
        hidden_from_any: !flags.is_empty(),
        hidden_from_all: is_hidden_from_all(flags, roster),
    }
}

pub fn visibility_fingerprint(
    piece: &Piece,
    flags: &VisibilityFlagSet,
    roster: &[RosterEntry],
) -> String {
    let actor = piece.actor_id.as_ref().map(ActorId::as_str).unwrap_or("");
    let flag_list = flags.iter().map(ActorId::as_str).collect::<Vec<_>>().join(",");
    format!(
        "{actor}|{}|{flag_list}|{}",
        piece.hidden,
        roster_signature(roster)
    )
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovementRow {
    /// `None` is the platform default.
    pub id: Option<String>,
    pub label: String,
    pub active: bool,
}

pub fn movement_view(current: Option<&str>) -> Vec<MovementRow> {
    let mut rows = vec![MovementRow {
        id: None,
        label: "Default".to_string(),
        active: current.is_none(),
    }];
    rows.extend(MOVEMENT_ACTIONS.iter().map(|action| {
        let mut label = action.to_string();
        label[..1].make_ascii_uppercase();
        MovementRow {
            id: Some(action.to_string()),
            label,
            active: current == Some(*action),
        }
    }));
    rows
}

/// A resource bar linked to an actor attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BarView {
    pub attribute: String,
    pub value: i32,
    pub max: Option<i32>,
}

impl BarView {
    /// Bars have a maximum; plain values do not.
    pub fn is_bar(&self) -> bool {
        self.max.is_some()
    }
}

pub fn bar_view(actor: &Actor, attribute: Option<&str>) -> Option<BarView> {
    let attribute = attribute?;
    let value = actor.attributes.get(attribute)?;
    Some(BarView {
        attribute: attribute.to_string(),
        value: value.value,
        max: value.max,
    })
}

/// Linked-group summary for the deposit/retrieve control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupView {
    pub members: usize,
    pub deployed: usize,
}

impl GroupView {
    /// The control retrieves when anything is deployed and deposits otherwise.
    pub fn deposits_next(&self) -> bool {
        self.deployed == 0
    }
}

/// Everything the overlay renders for one bound token.
#[derive(Debug, Clone, PartialEq)]
pub struct HudContext {
    pub piece_id: PieceId,
    pub actor_name: Option<String>,
    pub bar1: Option<BarView>,
    pub bar2: Option<BarView>,
    pub status_effects: Vec<StatusRow>,
    /// Only built for GM viewers.
    pub visibility: Option<VisibilityView>,
    pub hidden: bool,
    pub elevation: f32,
    pub locked: bool,
    pub in_combat: bool,
    pub targeted: bool,
    pub sort: i32,
    pub movement: Vec<MovementRow>,
    pub is_gm: bool,
    pub can_configure: bool,
    pub group: Option<GroupView>,
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::types::{ActiveEffect, Condition, HudAvailability};

    fn catalog() -> Vec<StatusDefinition> {
        vec![
            StatusDefinition {
                id: "frightened".to_string(),
                name: "Frightened".to_string(),
                img: "icons/frightened.svg".to_string(),
                hud: HudAvailability::Always,
                effect_id: None,
                condition: true,
            },
            StatusDefinition {
                id: "blind".to_string(),
                name: "Blind".to_string(),
                img: String::new(),
                hud: HudAvailability::Always,
                effect_id: None,
                condition: false,
            },
            StatusDefinition {
                id: "dead".to_string(),
                name: "Dead".to_string(),
                img: String::new(),
                hud: HudAvailability::ActorKinds(vec!["npc".to_string()]),
                effect_id: Some("dead-effect".to_string()),
                condition: false,
            },
            StatusDefinition {
                id: "secret".to_string(),
                name: "Secret".to_string(),
                img: String::new(),
                hud: HudAvailability::Never,
                effect_id: None,
                condition: false,
            },
        ]
    }

    fn effect(id: &str, statuses: &[&str], overlay: bool) -> ActiveEffect {
        ActiveEffect {
            id: id.to_string(),
            statuses: statuses.iter().map(|s| s.to_string()).collect::<BTreeSet<_>>(),
            overlay,
        }
    }

    #[test]
    fn catalog_filtering_respects_hud_availability() {
        let mut actor = Actor {
            kind: "character".to_string(),
            ..Default::default()
        };
        let ids: Vec<String> = status_effects_view(&catalog(), &actor)
            .into_iter()
            .map(|row| row.id)
            .collect();
        assert_eq!(ids, vec!["frightened", "blind"]);

        actor.kind = "npc".to_string();
        assert_eq!(status_effects_view(&catalog(), &actor).len(), 3);
    }

    #[test]
    fn conditions_and_effects_mark_rows_active() {
        let actor = Actor {
            kind: "npc".to_string(),
            conditions: vec![Condition {
                slug: "frightened".to_string(),
                value: Some(2),
                in_hud: true,
            }],
            effects: vec![
                effect("e1", &["blind"], true),
                effect("other", &["dead"], false),
            ],
            ..Default::default()
        };
        let rows = status_effects_view(&catalog(), &actor);

        assert!(rows[0].active);
        assert_eq!(rows[0].value, Some(2));
        assert!(rows[1].active);
        assert_eq!(rows[1].css_class(), "active overlay");
        // "dead" is bound to a specific effect id
        assert!(!rows[2].active);
    }

    #[test]
    fn multi_status_effects_do_not_activate_unbound_rows() {
        let actor = Actor {
            effects: vec![effect("e1", &["blind", "frightened"], false)],
            ..Default::default()
        };
        assert!(status_effects_view(&catalog(), &actor)
            .iter()
            .all(|row| !row.active));
    }

    #[test]
    fn rows_read_only_their_own_source() {
        let actor = Actor {
            conditions: vec![Condition {
                slug: "blind".to_string(),
                value: None,
                in_hud: true,
            }],
            effects: vec![effect("e1", &["frightened"], true)],
            ..Default::default()
        };
        let rows = status_effects_view(&catalog(), &actor);

        assert!(!rows[0].active);
        assert!(!rows[0].overlay);
        assert!(!rows[1].active);
    }

    #[test]
    fn status_fingerprint_sorts_conditions_but_keeps_effect_order() {
        let mut actor = Actor {
            id: ActorId::new("a1"),
            kind: "character".to_string(),
            conditions: vec![
                Condition {
                    slug: "stunned".to_string(),
                    value: Some(1),
                    in_hud: true,
                },
                Condition {
                    slug: "frightened".to_string(),
                    value: Some(2),
                    in_hud: true,
                },
            ],
            effects: vec![effect("e2", &["blind"], false), effect("e1", &["deaf"], true)],
            ..Default::default()
        };
        assert_eq!(
            status_fingerprint(&actor),
            "a1|character|frightened:2,stunned:1|e2:blind,e1:deaf:overlay"
        );

        actor.conditions.reverse();
        assert_eq!(
            status_fingerprint(&actor),
            "a1|character|frightened:2,stunned:1|e2:blind,e1:deaf:overlay"
        );
    }

    #[test]
    fn visibility_view_derives_all_from_roster() {
        let piece = Piece {
            actor_id: Some(ActorId::new("npc")),
            ..Default::default()
        };
        let roster = vec![
            RosterEntry {
                actor_id: ActorId::new("a"),
                name: "Amiri".to_string(),
            },
            RosterEntry {
                actor_id: ActorId::new("b"),
                name: "Boris".to_string(),
            },
        ];
        let flags = VisibilityFlagSet::from_ids([ActorId::new("a")]);
        let view = visibility_view(&piece, &flags, &roster);

        assert!(view.hidden_from_any);
        assert!(!view.hidden_from_all);
        assert!(view.observers[0].hidden);
        assert!(!view.observers[1].hidden);
        assert_eq!(
            visibility_fingerprint(&piece, &flags, &roster),
            "npc|false|a|a:Amiri,b:Boris"
        );
    }

    #[test]
    fn movement_rows_mark_current_action() {
        let rows = movement_view(Some("fly"));
        assert_eq!(rows.len(), 5);
        assert!(!rows[0].active);
        assert_eq!(rows[3].label, "Fly");
        assert!(rows[3].active);
        assert!(movement_view(None)[0].active);
    }
}
