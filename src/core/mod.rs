#![allow(missing_docs)] // Doc comments are added on public items in submodules.

//! Core spatial indexing and neighbour maintenance for the shearing cell
//! list: the grid, the shear-aware transition machinery, the notification
//! registry, the virtual-event scheduler adapter, and the event-loop driver.

pub mod boundary;
pub mod event;
pub mod grid;
pub mod integrator;
pub mod notify;
pub mod particle;
pub mod scheduler;
pub mod shear;
pub mod sim;
pub mod transition;

pub use boundary::{BoundaryCondition, LeesEdwards, Periodic};
pub use event::{Event, EventKind};
pub use grid::CellGrid;
pub use integrator::{FreeFlight, Integrator};
pub use notify::NeighborNotifier;
pub use particle::Particle;
pub use scheduler::{EventQueue, Scheduler};
pub use sim::{SimContext, Simulation};
pub use transition::{classify, CellListConfig, ShearingCells, TransitionCase};
