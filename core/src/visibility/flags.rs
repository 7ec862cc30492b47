use std::collections::BTreeSet;

use serde_json::Value;

use crate::constants::HIDDEN_FROM_FLAG;
use crate::types::{ActorId, Piece};

/// Observers a token is hidden from.
///
/// Entries are opaque actor ids resolved against the roster at read time; the
/// set never prunes ids that have since left the roster.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VisibilityFlagSet {
    ids: BTreeSet<ActorId>,
}

/// What has to be persisted after a mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum FlagWrite {
    Set(Value),
    /// The flag is removed from the record rather than stored empty.
    Unset,
}

impl VisibilityFlagSet {
    /// Reads the set from a token's namespaced flags. Non-string entries are ignored.
    pub fn read(piece: &Piece, namespace: &str) -> Self {
        let ids = match piece.flag(namespace, HIDDEN_FROM_FLAG) {
            Some(Value::Array(values)) => values
                .iter()
                .filter_map(Value::as_str)
                .map(ActorId::from)
                .collect(),
            Some(other) => {
                log::warn!(
                    "Ignoring malformed {namespace}.{HIDDEN_FROM_FLAG} on {}: {other}",
                    piece.id
                );
                BTreeSet::new()
            }
            None => BTreeSet::new(),
        };
        VisibilityFlagSet { ids }
    }

    pub fn from_ids<I: IntoIterator<Item = ActorId>>(ids: I) -> Self {
        VisibilityFlagSet {
            ids: ids.into_iter().collect(),
        }
    }

    pub fn contains(&self, id: &ActorId) -> bool {
        self.ids.contains(id)
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Ids in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = &ActorId> {
        self.ids.iter()
    }

    /// Returns `true` if the set changed.
    pub fn hide_from(&mut self, id: ActorId) -> bool {
        self.ids.insert(id)
    }

    /// Returns `true` if the set changed.
    pub fn reveal_to(&mut self, id: &ActorId) -> bool {
        self.ids.remove(id)
    }

    /// Returns `true` if the set changed.
    pub fn replace_with<I: IntoIterator<Item = ActorId>>(&mut self, ids: I) -> bool {
        let next: BTreeSet<ActorId> = ids.into_iter().collect();
        let changed = next != self.ids;
        self.ids = next;
        changed
    }

    pub fn to_write(&self) -> FlagWrite {
        if self.ids.is_empty() {
            FlagWrite::Unset
        } else {
            FlagWrite::Set(Value::from(
                self.ids
                    .iter()
                    .map(|id| id.as_str().to_string())
                    .collect::<Vec<_>>(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn piece_with_flag(value: Value) -> Piece {
        let mut piece = Piece::default();
        piece
            .flags
            .entry("token-hud".to_string())
            .or_default()
            .insert(HIDDEN_FROM_FLAG.to_string(), value);
        piece
    }

    #[test]
    fn read_dedupes_and_skips_non_strings() {
        let piece = piece_with_flag(serde_json::json!(["b", "a", "b", 7]));
        let flags = VisibilityFlagSet::read(&piece, "token-hud");
        assert_eq!(flags.len(), 2);
        assert!(flags.contains(&ActorId::new("a")));
        assert!(flags.contains(&ActorId::new("b")));
    }

    #[test]
    fn read_from_other_namespace_is_empty() {
        let piece = piece_with_flag(serde_json::json!(["a"]));
        assert!(VisibilityFlagSet::read(&piece, "other-module").is_empty());
    }

    #[test]
    fn hide_then_reveal_restores_prior_set() {
        let mut flags = VisibilityFlagSet::from_ids([ActorId::new("a")]);
        let before = flags.clone();

        assert!(flags.hide_from(ActorId::new("b")));
        assert!(!flags.hide_from(ActorId::new("b")));
        assert!(flags.reveal_to(&ActorId::new("b")));
        assert!(!flags.reveal_to(&ActorId::new("b")));

        assert_eq!(flags, before);
    }

    #[test]
    fn hide_sequences_never_duplicate() {
        let mut flags = VisibilityFlagSet::default();
        for id in ["a", "b", "a", "c", "b", "a"] {
            flags.hide_from(ActorId::new(id));
        }
        flags.reveal_to(&ActorId::new("c"));
        flags.hide_from(ActorId::new("a"));

        let ids: Vec<&str> = flags.iter().map(ActorId::as_str).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn empty_set_is_written_as_unset() {
        let mut flags = VisibilityFlagSet::from_ids([ActorId::new("a")]);
        assert_eq!(flags.to_write(), FlagWrite::Set(serde_json::json!(["a"])));
        flags.reveal_to(&ActorId::new("a"));
        assert_eq!(flags.to_write(), FlagWrite::Unset);
    }
}
