//! Shearing cell list core for an event-driven particle simulator.
//!
//! Partitions an origin-centred simulation box into a regular grid of cells
//! under Lees-Edwards (shear-periodic) boundary conditions, keeps every
//! particle's cell membership current as it moves and as the sheared
//! boundary image drifts, and notifies registered callbacks of each new
//! pairwise-neighbour and local-object relationship a cell crossing creates.
//!
//! Cell transitions are "virtual" events on the global event queue: the
//! loop in [`core::Simulation`] pops the earliest event, and
//! [`core::ShearingCells::run_event`] migrates the particle, fires the
//! notifications, and schedules the successor transition before returning.
//! Physics beyond free flight (collisions, forces, walls) lives behind the
//! [`core::Integrator`] and local-object seams.

pub mod core;
pub mod error;

pub use crate::core::{
    BoundaryCondition, CellGrid, CellListConfig, EventQueue, FreeFlight, Integrator, LeesEdwards,
    NeighborNotifier, Particle, Periodic, Scheduler, ShearingCells, SimContext, Simulation,
};
pub use crate::error::{Error, Result};
