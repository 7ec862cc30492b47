use crate::types::{Actor, ActorId};

use super::flags::VisibilityFlagSet;

/// One observer eligible to have a token hidden from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterEntry {
    pub actor_id: ActorId,
    pub name: String,
}

/// Resolves the observer roster.
///
/// Members of the first actor of kind `party_kind` with a non-empty member
/// list are used when any of them resolve; otherwise every player-owned
/// actor. `exclude` (the acting token's own actor) is always dropped.
/// Ordered by display name, then id, so enumeration is deterministic.
pub fn resolve_roster(
    actors: &[Actor],
    party_kind: &str,
    exclude: Option<&ActorId>,
) -> Vec<RosterEntry> {
    let party_members: Vec<&Actor> = actors
        .iter()
        .find(|actor| actor.kind == party_kind && !actor.members.is_empty())
        .map(|party| {
            party
                .members
                .iter()
                .filter_map(|member| actors.iter().find(|actor| &actor.id == member))
                .collect()
        })
        .unwrap_or_default();

    let candidates: Vec<&Actor> = if party_members.is_empty() {
        actors.iter().filter(|actor| actor.player_owned).collect()
    } else {
        party_members
    };

    let mut roster: Vec<RosterEntry> = candidates
        .into_iter()
        .filter(|actor| Some(&actor.id) != exclude)
        .map(|actor| RosterEntry {
            actor_id: actor.id.clone(),
            name: actor.name.clone(),
        })
        .collect();

    roster.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.actor_id.cmp(&b.actor_id)));
    roster.dedup_by(|a, b| a.actor_id == b.actor_id);
    roster
}

/// Compact signature of roster membership, used in cache fingerprints.
pub fn roster_signature(roster: &[RosterEntry]) -> String {
    roster
        .iter()
        .map(|entry| format!("{}:{}", entry.actor_id, entry.name))
        .collect::<Vec<_>>()
        .join(",")
}

/// "Hidden from all" is derived from the current roster on every read.
pub fn is_hidden_from_all(flags: &VisibilityFlagSet, roster: &[RosterEntry]) -> bool {
    !roster.is_empty() && roster.iter().all(|entry| flags.contains(&entry.actor_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn actor(id: &str, name: &str, player_owned: bool) -> Actor {
        Actor {
            id: ActorId::new(id),
            name: name.to_string(),
            kind: "character".to_string(),
            player_owned,
            ..Default::default()
        }
    }

    fn ids(roster: &[RosterEntry]) -> Vec<&str> {
        roster.iter().map(|entry| entry.actor_id.as_str()).collect()
    }

    #[test]
    fn falls_back_to_player_owned_sorted_by_name() {
        let actors = vec![
            actor("c", "Zed", true),
            actor("a", "Amiri", true),
            actor("m", "Goblin", false),
        ];
        let roster = resolve_roster(&actors, "party", None);
        assert_eq!(ids(&roster), vec!["a", "c"]);
    }

    #[test]
    fn party_members_take_precedence() {
        let mut party = actor("p", "The Party", false);
        party.kind = "party".to_string();
        party.members = vec![ActorId::new("b"), ActorId::new("ghost")];

        let actors = vec![
            party,
            actor("a", "Amiri", true),
            actor("b", "Boris", false),
        ];
        let roster = resolve_roster(&actors, "party", None);
        assert_eq!(ids(&roster), vec!["b"]);
    }

    #[test]
    fn unresolvable_party_falls_back_to_players() {
        let mut party = actor("p", "The Party", false);
        party.kind = "party".to_string();
        party.members = vec![ActorId::new("ghost")];

        let actors = vec![party, actor("a", "Amiri", true)];
        assert_eq!(ids(&resolve_roster(&actors, "party", None)), vec!["a"]);
    }

    #[test]
    fn acting_actor_is_excluded() {
        let actors = vec![actor("a", "Amiri", true), actor("b", "Boris", true)];
        let roster = resolve_roster(&actors, "party", Some(&ActorId::new("a")));
        assert_eq!(ids(&roster), vec!["b"]);
    }

    #[test]
    fn hidden_from_all_tracks_current_roster() {
        let actors = vec![actor("a", "Amiri", true), actor("b", "Boris", true)];
        let flags = VisibilityFlagSet::from_ids([ActorId::new("a"), ActorId::new("b")]);

        let roster = resolve_roster(&actors, "party", None);
        assert!(is_hidden_from_all(&flags, &roster));

        // A new player joins: the stored flags no longer cover everyone.
        let mut grown = actors.clone();
        grown.push(actor("c", "Cora", true));
        let roster = resolve_roster(&grown, "party", None);
        assert!(!is_hidden_from_all(&flags, &roster));

        assert!(!is_hidden_from_all(&flags, &[]));
    }

    #[test]
    fn signature_changes_with_membership() {
        let one = resolve_roster(&[actor("a", "Amiri", true)], "party", None);
        let two = resolve_roster(
            &[actor("a", "Amiri", true), actor("b", "Boris", true)],
            "party",
            None,
        );
        assert_eq!(roster_signature(&one), "a:Amiri");
        assert_ne!(roster_signature(&one), roster_signature(&two));
    }
}
