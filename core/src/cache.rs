//! Fingerprint-keyed memoization of derived views.
//!
//! Pull based: every read recomputes the fingerprint and compares it with the
//! stored one. There is no proactive invalidation.

use crate::types::{Actor, Piece, StatusDefinition};
use crate::views::{
    status_effects_view, status_fingerprint, visibility_fingerprint, visibility_view, StatusRow,
    VisibilityView,
};
use crate::visibility::{RosterEntry, VisibilityFlagSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewKind {
    StatusEffects,
    Visibility,
}

/// One `(fingerprint, value)` entry.
#[derive(Debug)]
pub struct Memo<V> {
    entry: Option<(String, V)>,
    computations: u64,
}

impl<V> Default for Memo<V> {
    fn default() -> Self {
        Memo {
            entry: None,
            computations: 0,
        }
    }
}

impl<V> Memo<V> {
    /// Returns the stored value if `fingerprint` matches, otherwise computes,
    /// stores and returns a fresh one.
    pub fn get_or_compute(&mut self, fingerprint: String, compute: impl FnOnce() -> V) -> &V {
        let entry = match self.entry.take() {
            Some((stored, value)) if stored == fingerprint => (stored, value),
            _ => {
                self.computations += 1;
                (fingerprint, compute())
            }
        };
        let (_, value) = self.entry.insert(entry);
        value
    }

    pub fn fingerprint(&self) -> Option<&str> {
        self.entry.as_ref().map(|(fingerprint, _)| fingerprint.as_str())
    }

    pub fn computations(&self) -> u64 {
        self.computations
    }
}

/// Per-overlay cache of the two expensive derived views.
#[derive(Debug, Default)]
pub struct DerivedViewCache {
    status: Memo<Vec<StatusRow>>,
    visibility: Memo<VisibilityView>,
}

impl DerivedViewCache {
    pub fn status_effects(&mut self, catalog: &[StatusDefinition], actor: &Actor) -> &[StatusRow] {
        self.status
            .get_or_compute(status_fingerprint(actor), || {
                status_effects_view(catalog, actor)
            })
    }

    pub fn visibility(
        &mut self,
        piece: &Piece,
        flags: &VisibilityFlagSet,
        roster: &[RosterEntry],
    ) -> &VisibilityView {
        self.visibility
            .get_or_compute(visibility_fingerprint(piece, flags, roster), || {
                visibility_view(piece, flags, roster)
            })
    }

    /// How many times the view of `kind` has been (re)computed.
    pub fn computations(&self, kind: ViewKind) -> u64 {
        match kind {
            ViewKind::StatusEffects => self.status.computations(),
            ViewKind::Visibility => self.visibility.computations(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ActorId, Condition, HudAvailability};

    fn catalog() -> Vec<StatusDefinition> {
        vec![StatusDefinition {
            id: "frightened".to_string(),
            name: "Frightened".to_string(),
            img: String::new(),
            hud: HudAvailability::Always,
            effect_id: None,
            condition: true,
        }]
    }

    #[test]
    fn memo_recomputes_only_on_fingerprint_change() {
        let mut memo = Memo::default();
        assert_eq!(*memo.get_or_compute("a".to_string(), || 1), 1);
        assert_eq!(*memo.get_or_compute("a".to_string(), || 2), 1);
        assert_eq!(memo.computations(), 1);

        assert_eq!(*memo.get_or_compute("b".to_string(), || 3), 3);
        assert_eq!(memo.computations(), 2);
        assert_eq!(memo.fingerprint(), Some("b"));
    }

    #[test]
    fn status_reads_without_changes_reuse_the_value() {
        let mut cache = DerivedViewCache::default();
        let mut actor = Actor {
            id: ActorId::new("a1"),
            ..Default::default()
        };

        let first = cache.status_effects(&catalog(), &actor).to_vec();
        let second = cache.status_effects(&catalog(), &actor).to_vec();
        assert_eq!(first, second);
        assert_eq!(cache.computations(ViewKind::StatusEffects), 1);

        actor.conditions.push(Condition {
            slug: "frightened".to_string(),
            value: Some(1),
            in_hud: true,
        });
        let third = cache.status_effects(&catalog(), &actor).to_vec();
        assert_eq!(cache.computations(ViewKind::StatusEffects), 2);
        assert!(third[0].active);

        actor.conditions[0].value = Some(2);
        assert_eq!(cache.status_effects(&catalog(), &actor)[0].value, Some(2));
        assert_eq!(cache.computations(ViewKind::StatusEffects), 3);
    }

    #[test]
    fn visibility_view_tracks_hidden_flags_and_roster() {
        let mut cache = DerivedViewCache::default();
        let mut piece = Piece::default();
        let flags = VisibilityFlagSet::default();
        let mut roster = vec![RosterEntry {
            actor_id: ActorId::new("a"),
            name: "Amiri".to_string(),
        }];

        cache.visibility(&piece, &flags, &roster);
        cache.visibility(&piece, &flags, &roster);
        assert_eq!(cache.computations(ViewKind::Visibility), 1);

        piece.hidden = true;
        assert!(cache.visibility(&piece, &flags, &roster).hidden);
        assert_eq!(cache.computations(ViewKind::Visibility), 2);

        let flags = VisibilityFlagSet::from_ids([ActorId::new("a")]);
        assert!(cache.visibility(&piece, &flags, &roster).hidden_from_all);
        assert_eq!(cache.computations(ViewKind::Visibility), 3);

        roster.push(RosterEntry {
            actor_id: ActorId::new("b"),
            name: "Boris".to_string(),
        });
        assert!(!cache.visibility(&piece, &flags, &roster).hidden_from_all);
        assert_eq!(cache.computations(ViewKind::Visibility), 4);
    }
}
