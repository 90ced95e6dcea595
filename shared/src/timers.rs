//! Game-time continuations.
//!
//! Nothing here runs on its own thread: the owner advances the queue once per
//! tick and gets back whatever came due. Dropping the queue drops every
//! pending continuation with it.

#[derive(Debug, Clone)]
struct Pending<T> {
    due: f64,
    item: T,
}

/// Items scheduled to come back after a delay, measured in whatever clock
/// the owner feeds into [`DelayQueue::advance`].
#[derive(Debug, Clone)]
pub struct DelayQueue<T> {
    now: f64,
    pending: Vec<Pending<T>>,
}

impl<T> Default for DelayQueue<T> {
    fn default() -> Self {
        Self {
            now: 0.0,
            pending: Vec::new(),
        }
    }
}

impl<T> DelayQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `item` to be returned once `delay` seconds have elapsed.
    /// Negative or non-finite delays come due on the next advance.
    pub fn schedule(&mut self, delay: f32, item: T) {
        let delay = if delay.is_finite() { delay.max(0.0) } else { 0.0 };
        self.pending.push(Pending {
            due: self.now + delay as f64,
            item,
        });
    }

    /// Move the clock forward and return every item whose deadline passed,
    /// in scheduling order.
    pub fn advance(&mut self, dt: f32) -> Vec<T> {
        if dt.is_finite() && dt > 0.0 {
            self.now += dt as f64;
        }
        let now = self.now;
        let (ready, waiting): (Vec<_>, Vec<_>) =
            self.pending.drain(..).partition(|p| p.due <= now);
        self.pending = waiting;
        ready.into_iter().map(|p| p.item).collect()
    }

    /// Seconds elapsed since the queue was created.
    pub fn elapsed(&self) -> f64 {
        self.now
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Drop every pending item without returning it.
    pub fn clear(&mut self) {
        self.pending.clear();
    }

    /// Remove pending items matching `predicate` and return them.
    pub fn cancel(&mut self, mut predicate: impl FnMut(&T) -> bool) -> Vec<T> {
        let (cancelled, waiting): (Vec<_>, Vec<_>) =
            self.pending.drain(..).partition(|p| predicate(&p.item));
        self.pending = waiting;
        cancelled.into_iter().map(|p| p.item).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn items_come_due_in_order() {
        let mut queue = DelayQueue::new();
        queue.schedule(2.0, "late");
        queue.schedule(1.0, "early");
        queue.schedule(1.0, "early-too");

        assert!(queue.advance(0.5).is_empty());
        assert_eq!(queue.advance(0.5), vec!["early", "early-too"]);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.advance(1.0), vec!["late"]);
        assert!(queue.is_empty());
    }

    #[test]
    fn zero_delay_fires_on_next_advance_even_without_time() {
        let mut queue = DelayQueue::new();
        queue.schedule(0.0, 7);
        queue.schedule(-3.0, 8);
        queue.schedule(f32::NAN, 9);
        assert_eq!(queue.advance(0.0), vec![7, 8, 9]);
    }

    #[test]
    fn cancel_removes_matching_items() {
        let mut queue = DelayQueue::new();
        queue.schedule(1.0, 1);
        queue.schedule(1.0, 2);
        queue.schedule(1.0, 3);
        assert_eq!(queue.cancel(|n| n % 2 == 1), vec![1, 3]);
        assert_eq!(queue.advance(1.0), vec![2]);
    }

    #[test]
    fn delays_are_relative_to_the_current_clock() {
        let mut queue = DelayQueue::new();
        queue.advance(10.0);
        queue.schedule(1.0, ());
        assert!(queue.advance(0.5).is_empty());
        assert_eq!(queue.advance(0.5).len(), 1);
        assert_eq!(queue.elapsed(), 11.0);
    }
}
