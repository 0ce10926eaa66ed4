use crate::core::event::{Event, EventKind};
use crate::error::Result;
use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// The narrow scheduler contract the cell list depends on.
///
/// The system-wide invariant: after initialization, exactly one live
/// transition event per particle exists in the queue at every quiescent
/// point. `invalidate_pending` must be called before the membership change
/// that obsoletes the old prediction, and a new event pushed before control
/// returns to the event loop.
pub trait Scheduler {
    /// Pop the earliest live event, discarding stale entries.
    fn pop_next_event(&mut self) -> Option<Event>;

    /// Time of the earliest live event without removing it.
    fn peek_time(&mut self) -> Option<f64>;

    /// Schedule the particle's next cell transition at absolute `time`.
    fn push_event(&mut self, particle: u32, time: f64) -> Result<()>;

    /// Discard the particle's currently pending transition event.
    fn invalidate_pending(&mut self, particle: u32);

    /// Re-establish ordering after the particle's event time changed.
    fn sort(&mut self, particle: u32);

    /// Invalidate and reschedule in one step.
    fn full_update(&mut self, particle: u32, time: f64) -> Result<()>;
}

/// Binary-heap event queue with lazy invalidation.
///
/// Removal from the middle of a heap is awkward, so each particle carries a
/// sequence counter: `invalidate_pending` bumps it, and entries whose
/// snapshot no longer matches are skipped on pop/peek. This keeps exactly
/// one *live* event per particle without heap surgery.
#[derive(Debug)]
pub struct EventQueue {
    heap: BinaryHeap<Reverse<Event>>,
    seq: Vec<u64>,
}

impl EventQueue {
    /// Create an empty queue for `num_particles` particles.
    pub fn new(num_particles: usize) -> Self {
        Self {
            heap: BinaryHeap::new(),
            seq: vec![0; num_particles],
        }
    }

    #[inline]
    fn is_live(&self, ev: &Event) -> bool {
        ev.seq == self.seq[ev.kind.particle() as usize]
    }

    /// Number of live events pending for a particle. O(n); intended for
    /// invariant checks and tests, not the hot path.
    pub fn pending_events(&self, particle: u32) -> usize {
        self.heap
            .iter()
            .filter(|Reverse(ev)| ev.kind.particle() == particle && self.is_live(ev))
            .count()
    }

    /// Total number of live events.
    pub fn live_len(&self) -> usize {
        self.heap.iter().filter(|Reverse(ev)| self.is_live(ev)).count()
    }

    /// Drop everything and reset all sequence counters.
    pub fn clear(&mut self) {
        self.heap.clear();
        for s in &mut self.seq {
            *s = 0;
        }
    }
}

impl Scheduler for EventQueue {
    fn pop_next_event(&mut self) -> Option<Event> {
        while let Some(Reverse(ev)) = self.heap.pop() {
            if self.is_live(&ev) {
                return Some(ev);
            }
        }
        None
    }

    fn peek_time(&mut self) -> Option<f64> {
        while let Some(Reverse(ev)) = self.heap.peek() {
            if self.is_live(ev) {
                return Some(ev.time_f64());
            }
            self.heap.pop();
        }
        None
    }

    fn push_event(&mut self, particle: u32, time: f64) -> Result<()> {
        let ev = Event::new(
            time,
            EventKind::CellTransition { particle },
            self.seq[particle as usize],
        )?;
        self.heap.push(Reverse(ev));
        Ok(())
    }

    fn invalidate_pending(&mut self, particle: u32) {
        self.seq[particle as usize] = self.seq[particle as usize].wrapping_add(1);
    }

    fn sort(&mut self, particle: u32) {
        // A binary heap re-establishes ordering on push; nothing to do.
        let _ = particle;
    }

    fn full_update(&mut self, particle: u32, time: f64) -> Result<()> {
        self.invalidate_pending(particle);
        self.push_event(particle, time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pops_in_time_order() -> Result<()> {
        let mut q = EventQueue::new(3);
        q.push_event(0, 3.0)?;
        q.push_event(1, 1.0)?;
        q.push_event(2, 2.0)?;
        let order: Vec<u32> = std::iter::from_fn(|| q.pop_next_event())
            .map(|ev| ev.kind.particle())
            .collect();
        assert_eq!(order, vec![1, 2, 0]);
        Ok(())
    }

    #[test]
    fn invalidation_skips_stale_entries() -> Result<()> {
        let mut q = EventQueue::new(2);
        q.push_event(0, 1.0)?;
        q.push_event(1, 2.0)?;
        q.invalidate_pending(0);
        q.push_event(0, 5.0)?;

        assert_eq!(q.pending_events(0), 1);
        assert!((q.peek_time().unwrap() - 2.0).abs() < 1e-12);
        assert_eq!(q.pop_next_event().unwrap().kind.particle(), 1);
        let last = q.pop_next_event().unwrap();
        assert_eq!(last.kind.particle(), 0);
        assert!((last.time_f64() - 5.0).abs() < 1e-12);
        assert!(q.pop_next_event().is_none());
        Ok(())
    }

    #[test]
    fn full_update_keeps_single_pending_event() -> Result<()> {
        let mut q = EventQueue::new(1);
        q.push_event(0, 1.0)?;
        q.full_update(0, 4.0)?;
        q.full_update(0, 2.0)?;
        assert_eq!(q.pending_events(0), 1);
        assert_eq!(q.live_len(), 1);
        assert!((q.peek_time().unwrap() - 2.0).abs() < 1e-12);
        Ok(())
    }

    #[test]
    fn infinite_events_sort_last() -> Result<()> {
        let mut q = EventQueue::new(2);
        q.push_event(0, f64::INFINITY)?;
        q.push_event(1, 10.0)?;
        assert_eq!(q.pop_next_event().unwrap().kind.particle(), 1);
        assert!(q.pop_next_event().unwrap().time_f64().is_infinite());
        Ok(())
    }
}
