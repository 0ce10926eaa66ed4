/// Callback invoked with (particle, other particle) or (particle, local id).
pub type PairHook = Box<dyn FnMut(u32, u32)>;

/// Callback invoked with (particle, old cell index) after a confirmed move.
pub type CellHook = Box<dyn FnMut(u32, usize)>;

/// Registry of notification callbacks keyed by event category.
///
/// Each `notify_*` call invokes every registered handler once, synchronously,
/// in registration order. The notifier performs no deduplication: the
/// transition logic is responsible for firing each true new relationship
/// exactly once, which keeps this a trivial dispatch point.
#[derive(Default)]
pub struct NeighborNotifier {
    new_neighbour: Vec<PairHook>,
    new_local: Vec<PairHook>,
    cell_changed: Vec<CellHook>,
}

impl NeighborNotifier {
    /// Register a handler for "particle sees a new neighbour particle".
    pub fn on_new_neighbour(&mut self, hook: PairHook) {
        self.new_neighbour.push(hook);
    }

    /// Register a handler for "particle is newly co-located with a local".
    pub fn on_new_local(&mut self, hook: PairHook) {
        self.new_local.push(hook);
    }

    /// Register a handler for "particle's cell assignment changed".
    pub fn on_cell_changed(&mut self, hook: CellHook) {
        self.cell_changed.push(hook);
    }

    pub(crate) fn notify_new_neighbour(&mut self, particle: u32, other: u32) {
        for hook in &mut self.new_neighbour {
            hook(particle, other);
        }
    }

    pub(crate) fn notify_new_local(&mut self, particle: u32, local_id: u32) {
        for hook in &mut self.new_local {
            hook(particle, local_id);
        }
    }

    pub(crate) fn notify_cell_changed(&mut self, particle: u32, old_cell: usize) {
        for hook in &mut self.cell_changed {
            hook(particle, old_cell);
        }
    }
}

impl std::fmt::Debug for NeighborNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NeighborNotifier")
            .field("new_neighbour", &self.new_neighbour.len())
            .field("new_local", &self.new_local.len())
            .field("cell_changed", &self.cell_changed.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn handlers_fire_in_registration_order() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut n = NeighborNotifier::default();
        for tag in ["first", "second"] {
            let seen = Rc::clone(&seen);
            n.on_new_neighbour(Box::new(move |p, o| {
                seen.borrow_mut().push((tag, p, o));
            }));
        }
        n.notify_new_neighbour(3, 8);
        assert_eq!(
            seen.borrow().as_slice(),
            &[("first", 3, 8), ("second", 3, 8)]
        );
    }

    #[test]
    fn categories_are_independent() {
        let count = Rc::new(RefCell::new(0usize));
        let mut n = NeighborNotifier::default();
        {
            let count = Rc::clone(&count);
            n.on_cell_changed(Box::new(move |_, _| *count.borrow_mut() += 1));
        }
        n.notify_new_neighbour(0, 1);
        n.notify_new_local(0, 1);
        assert_eq!(*count.borrow(), 0);
        n.notify_cell_changed(0, 5);
        assert_eq!(*count.borrow(), 1);
    }
}
