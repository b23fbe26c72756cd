//! One-shot timers advanced by simulation time
//!
//! Replaces chained wall-clock callbacks: every timer has a handle, and
//! clearing the queue on reset guarantees nothing fires against new state.

/// Handle to a scheduled timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(u64);

#[derive(Debug, Clone)]
struct Pending<E> {
    handle: TimerHandle,
    due_ms: f64,
    event: E,
}

/// Queue of pending one-shot timers carrying an event payload
#[derive(Debug, Clone)]
pub struct Timers<E> {
    now_ms: f64,
    next_id: u64,
    pending: Vec<Pending<E>>,
}

impl<E> Default for Timers<E> {
    fn default() -> Self {
        Self {
            now_ms: 0.0,
            next_id: 1,
            pending: Vec::new(),
        }
    }
}

impl<E> Timers<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire `event` after `delay_ms` of simulation time
    pub fn schedule(&mut self, delay_ms: f64, event: E) -> TimerHandle {
        let handle = TimerHandle(self.next_id);
        self.next_id += 1;
        self.pending.push(Pending {
            handle,
            due_ms: self.now_ms + delay_ms.max(0.0),
            event,
        });
        handle
    }

    /// Cancel a pending timer; false if it already fired or was cancelled
    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        let before = self.pending.len();
        self.pending.retain(|p| p.handle != handle);
        self.pending.len() != before
    }

    /// Drop every pending timer
    pub fn clear(&mut self) {
        self.pending.clear();
    }

    pub fn is_pending(&self, handle: TimerHandle) -> bool {
        self.pending.iter().any(|p| p.handle == handle)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Time until the earliest pending timer fires
    pub fn time_until_next(&self) -> Option<f64> {
        self.next_due()
            .map(|due| (due - self.now_ms).max(0.0))
    }

    fn next_due(&self) -> Option<f64> {
        self.pending
            .iter()
            .map(|p| p.due_ms)
            .min_by(|a, b| a.total_cmp(b))
    }

    /// Advance by `delta_ms` and return every event that came due, oldest first
    pub fn advance(&mut self, delta_ms: f64) -> Vec<E> {
        self.now_ms += delta_ms.max(0.0);
        self.drain_due()
    }

    /// Advance to the next due timer, but no further than `max_ms`
    ///
    /// Returns the time actually consumed and the events that fired. Landing
    /// exactly on the due time avoids float drift when callers split a frame
    /// at timer boundaries.
    pub fn advance_to_next(&mut self, max_ms: f64) -> (f64, Vec<E>) {
        let max_ms = max_ms.max(0.0);
        match self.next_due() {
            Some(due) if due - self.now_ms <= max_ms => {
                let consumed = (due - self.now_ms).max(0.0);
                self.now_ms = self.now_ms.max(due);
                (consumed, self.drain_due())
            }
            _ => {
                self.now_ms += max_ms;
                (max_ms, self.drain_due())
            }
        }
    }

    fn drain_due(&mut self) -> Vec<E> {
        let now = self.now_ms;
        let mut due: Vec<Pending<E>> = Vec::new();
        let mut i = 0;
        while i < self.pending.len() {
            if self.pending[i].due_ms <= now {
                due.push(self.pending.remove(i));
            } else {
                i += 1;
            }
        }
        due.sort_by(|a, b| a.due_ms.total_cmp(&b.due_ms).then(a.handle.0.cmp(&b.handle.0)));
        due.into_iter().map(|p| p.event).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fires_in_due_order() {
        let mut timers = Timers::new();
        timers.schedule(300.0, "c");
        timers.schedule(100.0, "a");
        timers.schedule(200.0, "b");
        assert!(timers.advance(50.0).is_empty());
        assert_eq!(timers.advance(200.0), vec!["a", "b"]);
        assert_eq!(timers.advance(50.0), vec!["c"]);
        assert!(timers.is_empty());
    }

    #[test]
    fn test_cancelled_timer_never_fires() {
        let mut timers = Timers::new();
        let handle = timers.schedule(100.0, 1);
        timers.schedule(150.0, 2);
        assert!(timers.cancel(handle));
        assert!(!timers.cancel(handle));
        assert!(!timers.is_pending(handle));
        assert_eq!(timers.advance(500.0), vec![2]);
    }

    #[test]
    fn test_clear_drops_everything() {
        let mut timers = Timers::new();
        timers.schedule(10.0, ());
        timers.schedule(20.0, ());
        timers.clear();
        assert!(timers.advance(100.0).is_empty());
        assert_eq!(timers.time_until_next(), None);
    }

    #[test]
    fn test_advance_to_next_splits_at_due_time() {
        let mut timers = Timers::new();
        timers.schedule(100.0, "x");
        let (consumed, fired) = timers.advance_to_next(30.0);
        assert_eq!(consumed, 30.0);
        assert!(fired.is_empty());
        assert_eq!(timers.time_until_next(), Some(70.0));

        let (consumed, fired) = timers.advance_to_next(500.0);
        assert_eq!(consumed, 70.0);
        assert_eq!(fired, vec!["x"]);
    }

    #[test]
    fn test_schedule_is_relative_to_current_time() {
        let mut timers = Timers::new();
        timers.advance(1000.0);
        timers.schedule(50.0, 7);
        assert_eq!(timers.time_until_next(), Some(50.0));
    }
}
