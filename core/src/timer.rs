use std::time::{Duration, Instant};

/// Single-slot cancellable debounce timer.
///
/// Scheduling replaces whatever was pending, so timers never stack. The host
/// drives expiry by calling [`Debounce::fire`] from its event loop.
#[derive(Debug)]
pub struct Debounce<A> {
    pending: Option<(Instant, A)>,
}

impl<A> Default for Debounce<A> {
    fn default() -> Self {
        Debounce { pending: None }
    }
}

impl<A> Debounce<A> {
    pub fn schedule(&mut self, now: Instant, delay: Duration, action: A) {
        self.pending = Some((now + delay, action));
    }

    /// Schedules `action` at an absolute deadline, replacing anything pending.
    pub fn schedule_at(&mut self, deadline: Instant, action: A) {
        self.pending = Some((deadline, action));
    }

    /// Returns `true` if a pending timer was cancelled.
    pub fn cancel(&mut self) -> bool {
        self.pending.take().is_some()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|(deadline, _)| *deadline)
    }

    /// Takes the pending action if its deadline has passed.
    pub fn fire(&mut self, now: Instant) -> Option<A> {
        match &self.pending {
            Some((deadline, _)) if *deadline <= now => {
                self.pending.take().map(|(_, action)| action)
            }
            _ => None,
        }
    }
}
