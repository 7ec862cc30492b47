//! Transient interaction state of one overlay and its snapshot/restore
//! protocol across a full rebuild.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::submenu::{SubmenuEvent, SubmenuKind, SubmenuSet};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum NamedInput {
    Search,
    Elevation,
    Bar1,
    Bar2,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FocusState {
    pub input: NamedInput,
    pub text: String,
}

/// Everything that cannot be derived from persisted data.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct HudSessionState {
    pub open_submenu: Option<SubmenuKind>,
    pub search: String,
    pub highlighted: Option<String>,
    pub scroll_offset: f32,
    pub focus: Option<FocusState>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRow {
    pub id: String,
    pub label: String,
}

/// A filterable list with a highlight that tracks rows by stable id.
#[derive(Debug, Clone, Default)]
pub struct SearchList {
    rows: Vec<SearchRow>,
    query: String,
    matches: Vec<usize>,
    highlighted: Option<String>,
}

impl SearchList {
    pub fn new(rows: Vec<SearchRow>) -> Self {
        let mut list = SearchList {
            rows,
            ..Default::default()
        };
        list.refilter();
        list
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn highlighted(&self) -> Option<&str> {
        self.highlighted.as_deref()
    }

    pub fn matching_ids(&self) -> Vec<&str> {
        self.matches
            .iter()
            .map(|&index| self.rows[index].id.as_str())
            .collect()
    }

    pub fn set_query(&mut self, query: &str) {
        self.query = query.to_string();
        self.refilter();
    }

    /// Clears the query and highlights the first row.
    pub fn reset(&mut self) {
        self.query.clear();
        self.highlighted = None;
        self.refilter();
    }

    /// Highlights `id` if it is currently matching; otherwise falls back to
    /// the first match.
    pub fn highlight(&mut self, id: Option<&str>) {
        self.highlighted = id
            .filter(|id| self.is_match(id))
            .map(str::to_string)
            .or_else(|| self.first_match());
    }

    /// Moves the highlight by `step` matching rows, wrapping at both ends.
    pub fn move_highlight(&mut self, step: isize) {
        if self.matches.is_empty() {
            return;
        }
        let len = self.matches.len() as isize;
        let current = self
            .highlighted
            .as_deref()
            .and_then(|id| self.matches.iter().position(|&i| self.rows[i].id == id));
        let next = match current {
            Some(position) => (position as isize + step).rem_euclid(len),
            None if step < 0 => len - 1,
            None => 0,
        };
        self.highlighted = Some(self.rows[self.matches[next as usize]].id.clone());
    }

    fn is_match(&self, id: &str) -> bool {
        self.matches.iter().any(|&index| self.rows[index].id == id)
    }

    fn first_match(&self) -> Option<String> {
        self.matches.first().map(|&index| self.rows[index].id.clone())
    }

    fn refilter(&mut self) {
        let needle = self.query.trim().to_lowercase();
        self.matches = self
            .rows
            .iter()
            .enumerate()
            .filter(|(_, row)| needle.is_empty() || row.label.to_lowercase().contains(&needle))
            .map(|(index, _)| index)
            .collect();
        let keep = self.highlighted.take();
        self.highlight(keep.as_deref());
    }
}

/// Focus and typed-but-unsubmitted text of the named inputs.
#[derive(Debug, Clone, Default)]
pub struct InputState {
    focused: Option<NamedInput>,
    drafts: BTreeMap<NamedInput, String>,
}

impl InputState {
    pub fn focused(&self) -> Option<NamedInput> {
        self.focused
    }

    pub fn focus(&mut self, input: NamedInput) {
        self.focused = Some(input);
    }

    pub fn blur(&mut self) -> Option<NamedInput> {
        self.focused.take()
    }

    pub fn type_text(&mut self, input: NamedInput, text: &str) {
        self.drafts.insert(input, text.to_string());
    }

    pub fn draft(&self, input: NamedInput) -> Option<&str> {
        self.drafts.get(&input).map(String::as_str)
    }

    pub fn take_draft(&mut self, input: NamedInput) -> Option<String> {
        self.drafts.remove(&input)
    }
}

/// The rebuilt interactive structure: submenus, search list, inputs and
/// scroll position. A fresh `HudView` knows nothing about the previous one.
#[derive(Debug)]
pub struct HudView {
    pub submenus: SubmenuSet,
    pub search: SearchList,
    pub inputs: InputState,
    pub scroll_offset: f32,
}

impl HudView {
    pub fn build(
        kinds: &[SubmenuKind],
        rows: Vec<SearchRow>,
        close_delay: Duration,
        leave_delay: Duration,
    ) -> Self {
        HudView {
            submenus: SubmenuSet::new(kinds, close_delay, leave_delay),
            search: SearchList::new(rows),
            inputs: InputState::default(),
            scroll_offset: 0.0,
        }
    }

    pub fn snapshot(&self) -> HudSessionState {
        let open_submenu = self.submenus.open_kind();
        let searching = open_submenu.is_some_and(SubmenuKind::is_searchable);

        let focus = self.inputs.focused().map(|input| FocusState {
            input,
            text: match input {
                NamedInput::Search => self.search.query().to_string(),
                _ => self.inputs.draft(input).unwrap_or_default().to_string(),
            },
        });

        HudSessionState {
            open_submenu,
            search: if searching {
                self.search.query().to_string()
            } else {
                String::new()
            },
            highlighted: if searching {
                self.search.highlighted().map(str::to_string)
            } else {
                None
            },
            scroll_offset: self.scroll_offset,
            focus,
        }
    }

    /// Reapplies a snapshot onto freshly built structure.
    pub fn restore(&mut self, state: &HudSessionState) -> Vec<SubmenuEvent> {
        let mut events = Vec::new();

        if let Some(kind) = state.open_submenu.filter(|kind| self.submenus.exists(*kind)) {
            events = self.submenus.open(kind, true);
            if kind.is_searchable() {
                self.search.set_query(&state.search);
                self.search.highlight(state.highlighted.as_deref());
            }
        }

        self.scroll_offset = state.scroll_offset;

        if let Some(focus) = &state.focus {
            let searchable_open = self
                .submenus
                .open_kind()
                .is_some_and(SubmenuKind::is_searchable);
            match focus.input {
                NamedInput::Search if !searchable_open => {}
                NamedInput::Search => self.inputs.focus(NamedInput::Search),
                input => {
                    self.inputs.type_text(input, &focus.text);
                    self.inputs.focus(input);
                }
            }
        }
        events
    }

    /// Applies side effects of submenu transitions to the rest of the view.
    pub fn apply(&mut self, events: &[SubmenuEvent]) {
        for event in events {
            match *event {
                SubmenuEvent::Opened { kind, restored } => {
                    if kind.is_searchable() && !restored {
                        self.search.reset();
                        self.inputs.focus(NamedInput::Search);
                    }
                }
                SubmenuEvent::Closed(kind) => {
                    if kind.is_searchable() && self.inputs.focused() == Some(NamedInput::Search) {
                        self.inputs.blur();
                    }
                }
            }
        }
    }
}
