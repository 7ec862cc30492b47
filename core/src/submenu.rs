//! Hover/toggle driven submenus with debounced closing.
//!
//! Invariant: at most one submenu is open. Opening always closes every other
//! open submenu first, synchronously.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::timer::Debounce;
use crate::types::{Rect, Size};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SubmenuKind {
    StatusEffects,
    Visibility,
    Movement,
}

impl SubmenuKind {
    pub const ALL: [SubmenuKind; 3] = [
        SubmenuKind::StatusEffects,
        SubmenuKind::Visibility,
        SubmenuKind::Movement,
    ];

    /// Only the status-effect submenu has a search field.
    pub fn is_searchable(self) -> bool {
        matches!(self, SubmenuKind::StatusEffects)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubmenuState {
    #[default]
    Closed,
    Open,
}

/// Edge flips applied after a submenu opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Placement {
    pub flip_horizontal: bool,
    pub flip_vertical: bool,
}

/// Decides independent horizontal/vertical flips so the submenu stays
/// `margin` pixels inside the viewport.
pub fn place_submenu(trigger: Rect, submenu: Size, viewport: Size, margin: f32) -> Placement {
    Placement {
        flip_horizontal: trigger.right() + submenu.width > viewport.width - margin,
        flip_vertical: trigger.y + submenu.height > viewport.height - margin,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmenuEvent {
    /// `restored` is set when the open replays state after a rebuild.
    Opened { kind: SubmenuKind, restored: bool },
    Closed(SubmenuKind),
}

/// Pointer state and pending deadlines of a [`SubmenuSet`], carried across a
/// rebuild so a rebuilt overlay still closes on time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubmenuTimers {
    leave: Option<Instant>,
    entries: Vec<EntryTimers>,
}

#[derive(Debug, Clone, PartialEq)]
struct EntryTimers {
    kind: SubmenuKind,
    close: Option<Instant>,
    trigger_hovered: bool,
    content_hovered: bool,
}

#[derive(Debug)]
struct Entry {
    kind: SubmenuKind,
    state: SubmenuState,
    close_timer: Debounce<()>,
    trigger_hovered: bool,
    content_hovered: bool,
    placement: Placement,
}

impl Entry {
    fn new(kind: SubmenuKind) -> Self {
        Entry {
            kind,
            state: SubmenuState::Closed,
            close_timer: Debounce::default(),
            trigger_hovered: false,
            content_hovered: false,
            placement: Placement::default(),
        }
    }

    fn hovered(&self) -> bool {
        self.trigger_hovered || self.content_hovered
    }
}

/// The submenus that exist in the current overlay structure.
#[derive(Debug)]
pub struct SubmenuSet {
    entries: Vec<Entry>,
    leave_timer: Debounce<()>,
    close_delay: Duration,
    leave_delay: Duration,
}

impl SubmenuSet {
    pub fn new(kinds: &[SubmenuKind], close_delay: Duration, leave_delay: Duration) -> Self {
        SubmenuSet {
            entries: kinds.iter().copied().map(Entry::new).collect(),
            leave_timer: Debounce::default(),
            close_delay,
            leave_delay,
        }
    }

    fn entry(&self, kind: SubmenuKind) -> Option<&Entry> {
        self.entries.iter().find(|entry| entry.kind == kind)
    }

    fn entry_mut(&mut self, kind: SubmenuKind) -> Option<&mut Entry> {
        self.entries.iter_mut().find(|entry| entry.kind == kind)
    }

    pub fn exists(&self, kind: SubmenuKind) -> bool {
        self.entry(kind).is_some()
    }

    pub fn state(&self, kind: SubmenuKind) -> SubmenuState {
        self.entry(kind)
            .map(|entry| entry.state)
            .unwrap_or(SubmenuState::Closed)
    }

    pub fn open_kind(&self) -> Option<SubmenuKind> {
        self.entries
            .iter()
            .find(|entry| entry.state == SubmenuState::Open)
            .map(|entry| entry.kind)
    }

    pub fn open_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.state == SubmenuState::Open)
            .count()
    }

    pub fn placement(&self, kind: SubmenuKind) -> Placement {
        self.entry(kind)
            .map(|entry| entry.placement)
            .unwrap_or_default()
    }

    pub fn set_placement(&mut self, kind: SubmenuKind, placement: Placement) {
        if let Some(entry) = self.entry_mut(kind) {
            entry.placement = placement;
        }
    }

    pub fn has_pending_timers(&self) -> bool {
        self.leave_timer.is_pending() || self.entries.iter().any(|e| e.close_timer.is_pending())
    }

    /// Opens `kind`, closing every other open submenu first.
    pub fn open(&mut self, kind: SubmenuKind, restored: bool) -> Vec<SubmenuEvent> {
        if !self.exists(kind) {
            return Vec::new();
        }
        let mut events = self.close_all_except(Some(kind));
        if let Some(entry) = self.entry_mut(kind) {
            entry.close_timer.cancel();
            if entry.state == SubmenuState::Closed {
                entry.state = SubmenuState::Open;
                events.push(SubmenuEvent::Opened { kind, restored });
            }
        }
        events
    }

    pub fn close(&mut self, kind: SubmenuKind) -> Option<SubmenuEvent> {
        let entry = self.entry_mut(kind)?;
        entry.close_timer.cancel();
        if entry.state == SubmenuState::Open {
            entry.state = SubmenuState::Closed;
            Some(SubmenuEvent::Closed(kind))
        } else {
            None
        }
    }

    fn close_all_except(&mut self, except: Option<SubmenuKind>) -> Vec<SubmenuEvent> {
        let kinds: Vec<SubmenuKind> = self
            .entries
            .iter()
            .map(|entry| entry.kind)
            .filter(|kind| Some(*kind) != except)
            .collect();
        kinds.into_iter().filter_map(|kind| self.close(kind)).collect()
    }

    pub fn close_all(&mut self) -> Vec<SubmenuEvent> {
        self.close_all_except(None)
    }

    pub fn hover_enter_trigger(&mut self, kind: SubmenuKind) -> Vec<SubmenuEvent> {
        self.leave_timer.cancel();
        match self.entry_mut(kind) {
            Some(entry) => entry.trigger_hovered = true,
            None => return Vec::new(),
        }
        self.open(kind, false)
    }

    pub fn hover_leave_trigger(&mut self, kind: SubmenuKind, now: Instant) {
        let delay = self.close_delay;
        if let Some(entry) = self.entry_mut(kind) {
            entry.trigger_hovered = false;
            entry.close_timer.schedule(now, delay, ());
        }
    }

    pub fn hover_enter_content(&mut self, kind: SubmenuKind) {
        self.leave_timer.cancel();
        if let Some(entry) = self.entry_mut(kind) {
            entry.content_hovered = true;
            entry.close_timer.cancel();
        }
    }

    pub fn hover_leave_content(&mut self, kind: SubmenuKind, now: Instant) {
        let delay = self.close_delay;
        if let Some(entry) = self.entry_mut(kind) {
            entry.content_hovered = false;
            entry.close_timer.schedule(now, delay, ());
        }
    }

    pub fn pointer_enter_hud(&mut self) {
        self.leave_timer.cancel();
    }

    /// Leaving the overlay entirely schedules closing everything.
    pub fn pointer_leave_hud(&mut self, now: Instant) {
        for entry in &mut self.entries {
            entry.trigger_hovered = false;
            entry.content_hovered = false;
        }
        self.leave_timer.schedule(now, self.leave_delay, ());
    }

    pub fn toggle(&mut self, kind: SubmenuKind) -> Vec<SubmenuEvent> {
        match self.state(kind) {
            SubmenuState::Open => self.close(kind).into_iter().collect(),
            SubmenuState::Closed => self.open(kind, false),
        }
    }

    /// Escape while focus is inside `kind` closes it immediately.
    pub fn escape(&mut self, kind: SubmenuKind) -> Option<SubmenuEvent> {
        self.close(kind)
    }

    /// Fires expired timers.
    pub fn tick(&mut self, now: Instant) -> Vec<SubmenuEvent> {
        let mut events = Vec::new();

        let expired: Vec<SubmenuKind> = self
            .entries
            .iter_mut()
            .filter_map(|entry| entry.close_timer.fire(now).map(|_| entry))
            .filter(|entry| !entry.hovered())
            .map(|entry| entry.kind)
            .collect();
        events.extend(expired.into_iter().filter_map(|kind| self.close(kind)));

        if self.leave_timer.fire(now).is_some() {
            events.extend(self.close_all());
        }
        events
    }

    pub fn timers(&self) -> SubmenuTimers {
        SubmenuTimers {
            leave: self.leave_timer.deadline(),
            entries: self
                .entries
                .iter()
                .map(|entry| EntryTimers {
                    kind: entry.kind,
                    close: entry.close_timer.deadline(),
                    trigger_hovered: entry.trigger_hovered,
                    content_hovered: entry.content_hovered,
                })
                .collect(),
        }
    }

    /// Re-arms deadlines and hover state taken from a previous set. Submenus
    /// that no longer exist are skipped.
    pub fn rearm(&mut self, timers: &SubmenuTimers) {
        if let Some(deadline) = timers.leave {
            self.leave_timer.schedule_at(deadline, ());
        }
        for saved in &timers.entries {
            if let Some(entry) = self.entry_mut(saved.kind) {
                entry.trigger_hovered = saved.trigger_hovered;
                entry.content_hovered = saved.content_hovered;
                if let Some(deadline) = saved.close {
                    entry.close_timer.schedule_at(deadline, ());
                }
            }
        }
    }

    pub fn cancel_timers(&mut self) {
        self.leave_timer.cancel();
        for entry in &mut self.entries {
            entry.close_timer.cancel();
        }
    }
}
