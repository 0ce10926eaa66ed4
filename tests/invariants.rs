//! Randomised runs checking the structural invariants of the cell list:
//! membership, single pending event per particle, exactly-once notification
//! within a transition, and symmetry of the neighbourhood relation.

use std::cell::RefCell;
use std::collections::{BTreeSet, HashSet};
use std::rc::Rc;

use shearcells::core::Simulation;
use shearcells::error::Result;

/// Every particle's reduced position stays inside its assigned cell, and
/// exactly one transition event stays pending per particle, sampled across
/// a run with many shear wraps.
#[test]
fn membership_and_single_pending_event_over_sheared_run() -> Result<()> {
    let mut sim = Simulation::new(48, [1.0, 1.0, 1.0], 0.3, 0.25, Some(2024))?;
    sim.check_membership()?;

    for step in 1..=10 {
        sim.advance_to(0.5 * step as f64)?;
        sim.check_membership()?;
        for id in 0..48 {
            assert_eq!(
                sim.pending_transition_events(id),
                1,
                "particle {id} at t={}",
                sim.time()
            );
        }
    }
    Ok(())
}

/// Within one transition no (particle, other) pair is announced twice, even
/// when a cell is reachable through both the cubic block and the boundary
/// strip.
#[test]
fn notifications_unique_within_each_transition() -> Result<()> {
    let mut sim = Simulation::new(32, [1.0, 1.0, 1.0], 0.25, 0.25, Some(11))?;

    let seen = Rc::new(RefCell::new(HashSet::new()));
    let duplicates = Rc::new(RefCell::new(0usize));
    let transitions = Rc::new(RefCell::new(0usize));
    {
        let seen = Rc::clone(&seen);
        let duplicates = Rc::clone(&duplicates);
        sim.cells.on_new_neighbour(Box::new(move |p, o| {
            if !seen.borrow_mut().insert((p, o)) {
                *duplicates.borrow_mut() += 1;
            }
        }));
    }
    {
        let seen = Rc::clone(&seen);
        let transitions = Rc::clone(&transitions);
        sim.cells.on_cell_changed(Box::new(move |_, _| {
            seen.borrow_mut().clear();
            *transitions.borrow_mut() += 1;
        }));
    }

    sim.advance_to(3.0)?;
    assert!(*transitions.borrow() > 50, "run too quiet to be meaningful");
    assert_eq!(*duplicates.borrow(), 0);
    Ok(())
}

/// The neighbourhood relation is symmetric: whenever `a` enumerates `b` as
/// a neighbour, `b` also enumerates `a`. Holds across the boundary strip
/// because both extreme layers span the full x extent of each other.
#[test]
fn neighbourhood_relation_is_symmetric() -> Result<()> {
    let n = 40u32;
    let mut sim = Simulation::new(n as usize, [1.0, 1.0, 1.0], 0.2, 0.25, Some(77))?;
    sim.advance_to(1.7)?;

    let mut sets: Vec<BTreeSet<u32>> = Vec::with_capacity(n as usize);
    for id in 0..n {
        let mut set = BTreeSet::new();
        sim.cells.for_each_neighbour(id, |o| {
            set.insert(o);
        })?;
        assert!(!set.contains(&id), "particle {id} listed itself");
        sets.push(set);
    }
    for a in 0..n {
        for &b in &sets[a as usize] {
            assert!(
                sets[b as usize].contains(&a),
                "asymmetric pair ({a}, {b}) at t={}",
                sim.time()
            );
        }
    }
    Ok(())
}

/// Each realized transition bumps the particle's event counter exactly once,
/// matching the cell-changed notifications observed outside.
#[test]
fn event_count_tracks_realized_transitions() -> Result<()> {
    let n = 24usize;
    let mut sim = Simulation::new(n, [1.0, 1.0, 1.0], 0.15, 0.25, Some(42))?;

    let counts = Rc::new(RefCell::new(vec![0u64; n]));
    {
        let counts = Rc::clone(&counts);
        sim.cells.on_cell_changed(Box::new(move |p, _| {
            counts.borrow_mut()[p as usize] += 1;
        }));
    }

    sim.advance_to(2.0)?;
    for (pid, p) in sim.particles.iter().enumerate() {
        assert_eq!(p.event_count, counts.borrow()[pid], "particle {pid}");
    }
    Ok(())
}
