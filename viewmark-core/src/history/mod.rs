//! # History
//!
//! A bounded, linear undo/redo timeline of viewpoints. Viewport changes arrive far more often than a user
//! would want undo steps, so they're debounced: a burst of changes only becomes an entry once the viewport
//! has been quiet for the settle delay.
//!
//! States:
//! * Idle - no candidate, timer disarmed.
//! * Pending - a candidate snapshot is waiting for the timer. Every change replaces the candidate and
//!   restarts the timer.
//!
//! Time is never read here. Every operation that cares takes `now`, so the owner decides what clock drives it.

pub mod timer;

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::{Config, HISTORY_SIZE_RANGE};
use crate::snapshot::{Snapshot, Tolerance};
use timer::SettleTimer;

/// A committed point on the timeline. Never mutated after commit.
#[derive(Clone, Debug, PartialEq)]
pub struct HistoryEntry {
    pub snapshot: Snapshot,
    /// When the entry was committed.
    pub timestamp: Instant,
}

pub struct HistoryRecorder {
    /// Oldest first.
    entries: VecDeque<Arc<HistoryEntry>>,
    /// Index into `entries` of the current position. Meaningless while empty.
    cursor: usize,
    capacity: usize,
    timer: SettleTimer,
    candidate: Option<Snapshot>,
    grace: Duration,
    /// Change events before this instant are echoes of our own navigation.
    suppressed_until: Option<Instant>,
    tolerance: Tolerance,
}

impl HistoryRecorder {
    #[must_use]
    pub fn new(config: &Config) -> Self {
        let capacity = config.max_history_size.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity.min(*HISTORY_SIZE_RANGE.end())),
            cursor: 0,
            capacity,
            timer: SettleTimer::new(config.settle_delay()),
            candidate: None,
            grace: config.navigation_grace(),
            suppressed_until: None,
            tolerance: Tolerance::default(),
        }
    }
    #[must_use]
    pub fn with_tolerance(self, tolerance: Tolerance) -> Self {
        Self { tolerance, ..self }
    }
    /// Feed a viewport change. Returns whether it was accepted as the new candidate.
    pub fn observe(&mut self, live: &Snapshot, now: Instant) -> bool {
        if self.suppressed_until.is_some_and(|until| now < until) {
            log::trace!("history: change ignored, navigating");
            return false;
        }
        if self.candidate.is_none()
            && self
                .current()
                .is_some_and(|entry| entry.snapshot.perspective.approx_eq(&live.perspective, &self.tolerance))
        {
            // Still sitting exactly on the current entry, nothing happened.
            return false;
        }
        // Changing the view after going back abandons the redo branch.
        if !self.entries.is_empty() && self.cursor + 1 < self.entries.len() {
            log::trace!(
                "history: dropping {} redo entries",
                self.entries.len() - self.cursor - 1
            );
            self.entries.truncate(self.cursor + 1);
        }
        self.candidate = Some(live.clone());
        self.timer.arm(now);
        true
    }
    /// Commit the candidate if it has settled.
    pub fn poll(&mut self, now: Instant) -> Option<Arc<HistoryEntry>> {
        if self.timer.poll(now) {
            self.commit(now)
        } else {
            None
        }
    }
    /// Commit the candidate right away, settled or not.
    pub fn flush(&mut self, now: Instant) -> Option<Arc<HistoryEntry>> {
        if self.timer.cancel() {
            self.commit(now)
        } else {
            None
        }
    }
    fn commit(&mut self, now: Instant) -> Option<Arc<HistoryEntry>> {
        let snapshot = self.candidate.take()?;
        if self
            .entries
            .back()
            .is_some_and(|newest| newest.snapshot.perspective.approx_eq(&snapshot.perspective, &self.tolerance))
        {
            log::trace!("history: settled on the newest entry, not committing");
            self.cursor = self.entries.len() - 1;
            return None;
        }
        let entry = Arc::new(HistoryEntry {
            snapshot,
            timestamp: now,
        });
        self.entries.push_back(entry.clone());
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
        self.cursor = self.entries.len() - 1;
        log::trace!("history: committed entry {}", self.cursor);
        Some(entry)
    }
    /// Step back one entry, returning it for the caller to apply. `None` at the oldest entry.
    ///
    /// Any pending candidate is committed first, so it can be returned to with [`Self::forward`].
    /// On success, changes are suppressed for the grace period so that applying the entry is not recorded.
    pub fn back(&mut self, now: Instant) -> Option<Arc<HistoryEntry>> {
        self.flush(now);
        if self.entries.is_empty() || self.cursor == 0 {
            return None;
        }
        self.cursor -= 1;
        self.suppress(now);
        self.entries.get(self.cursor).cloned()
    }
    /// Step forward one entry. `None` at the newest entry.
    pub fn forward(&mut self, now: Instant) -> Option<Arc<HistoryEntry>> {
        self.flush(now);
        if self.cursor + 1 >= self.entries.len() {
            return None;
        }
        self.cursor += 1;
        self.suppress(now);
        self.entries.get(self.cursor).cloned()
    }
    /// Ignore change events for the grace period from `now`.
    pub fn suppress(&mut self, now: Instant) {
        self.suppressed_until = Some(now + self.grace);
    }
    /// Drop the candidate without committing it.
    pub fn cancel(&mut self) {
        if self.timer.cancel() {
            log::trace!("history: pending change cancelled");
        }
        self.candidate = None;
    }
    /// Forget everything.
    pub fn clear(&mut self) {
        self.cancel();
        self.entries.clear();
        self.cursor = 0;
        self.suppressed_until = None;
    }
    /// Change the capacity, evicting the oldest entries if over. The cursor stays on the same entry if it
    /// survives, otherwise lands on the oldest.
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity.max(1);
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
            self.cursor = self.cursor.saturating_sub(1);
        }
    }
    pub fn set_settle_delay(&mut self, delay: Duration) {
        self.timer.set_delay(delay);
    }
    pub fn set_navigation_grace(&mut self, grace: Duration) {
        self.grace = grace;
    }
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
    /// Index of the current entry, oldest being zero. `None` if empty.
    #[must_use]
    pub fn cursor(&self) -> Option<usize> {
        (!self.entries.is_empty()).then_some(self.cursor)
    }
    #[must_use]
    pub fn current(&self) -> Option<&Arc<HistoryEntry>> {
        self.entries.get(self.cursor)
    }
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
    /// Oldest first.
    pub fn entries(&self) -> impl ExactSizeIterator<Item = &Arc<HistoryEntry>> + '_ {
        self.entries.iter()
    }
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.candidate.is_some()
    }
    /// When [`Self::poll`] next needs calling, if at all.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.timer.deadline()
    }
}
