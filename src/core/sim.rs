use crate::core::boundary::{BoundaryCondition, LeesEdwards};
use crate::core::event::EventKind;
use crate::core::integrator::{FreeFlight, Integrator};
use crate::core::particle::{Particle, DIM};
use crate::core::scheduler::{EventQueue, Scheduler};
use crate::core::transition::{CellListConfig, ShearingCells};
use crate::error::{Error, Result};
use rand::{rng, rngs::StdRng, Rng, SeedableRng};

/// Small numeric tolerance for time checks.
const EPS_TIME: f64 = 1e-12;

/// Tolerance for geometric membership checks, relative to the cell width.
const EPS_GEOM: f64 = 1e-9;

/// Explicit simulation context passed by reference to every core operation:
/// the current time plus the external collaborators (boundary condition and
/// integrator). Created once per event; never stored.
pub struct SimContext<'a> {
    /// Current simulation time.
    pub time: f64,
    /// Boundary-condition collaborator.
    pub boundary: &'a dyn BoundaryCondition,
    /// Dynamics collaborator.
    pub integrator: &'a dyn Integrator,
}

/// Deterministic single-threaded event-loop driver.
///
/// Owns the particles, the Lees-Edwards boundary, the free-flight
/// integrator, the event queue and the shearing cell list, and processes
/// virtual cell-transition events in non-decreasing time order. Exactly one
/// event executes at a time; shared structures are mutated only by the
/// currently-executing handler.
#[derive(Debug)]
pub struct Simulation {
    time_now: f64,
    pub particles: Vec<Particle>,
    boundary: LeesEdwards,
    integrator: FreeFlight,
    queue: EventQueue,
    pub cells: ShearingCells,
}

impl Simulation {
    /// Create a simulation of `num_particles` point particles placed
    /// uniformly in an origin-centred box under Lees-Edwards boundaries,
    /// with velocities sampled uniformly in [-1, 1] per component.
    pub fn new(
        num_particles: usize,
        box_size: [f64; DIM],
        strain_rate: f64,
        interaction_range: f64,
        seed: Option<u64>,
    ) -> Result<Self> {
        if num_particles == 0 {
            return Err(Error::InvalidParam("num_particles must be > 0".into()));
        }
        let boundary = LeesEdwards::new(box_size, strain_rate)?;

        let mut rng: StdRng = match seed {
            Some(s) => SeedableRng::seed_from_u64(s),
            None => SeedableRng::seed_from_u64(rng().random()),
        };

        let mut particles: Vec<Particle> = Vec::with_capacity(num_particles);
        for id in 0..(num_particles as u32) {
            let mut r = [0.0_f64; DIM];
            for (k, r_k) in r.iter_mut().enumerate() {
                *r_k = rng.random_range(-0.5 * box_size[k]..0.5 * box_size[k]);
            }
            let mut v = [0.0_f64; DIM];
            v.iter_mut().for_each(|x| *x = rng.random_range(-1.0..=1.0));
            particles.push(Particle::new(id, r, v)?);
        }

        let integrator = FreeFlight;
        let mut queue = EventQueue::new(num_particles);
        let config = CellListConfig {
            interaction_range,
            overlink: 1,
            validate: true,
        };
        let cells = {
            let ctx = SimContext {
                time: 0.0,
                boundary: &boundary,
                integrator: &integrator,
            };
            ShearingCells::new(&config, &ctx, &mut particles, &mut queue)?
        };

        Ok(Self {
            time_now: 0.0,
            particles,
            boundary,
            integrator,
            queue,
            cells,
        })
    }

    /// Returns current simulation time.
    pub fn time(&self) -> f64 {
        self.time_now
    }

    /// Number of particles.
    pub fn num_particles(&self) -> usize {
        self.particles.len()
    }

    /// The boundary condition in effect.
    pub fn boundary(&self) -> &LeesEdwards {
        &self.boundary
    }

    /// Positions streamed to the current time and reduced into the box.
    pub fn positions(&self) -> Vec<[f64; DIM]> {
        self.particles
            .iter()
            .map(|p| {
                let mut probe = p.clone();
                self.integrator
                    .update_particle(&self.boundary, self.time_now, &mut probe);
                probe.r
            })
            .collect()
    }

    /// Velocities as of the current time (the shear image kick applies on
    /// wrap, so velocities also stream through the boundary).
    pub fn velocities(&self) -> Vec<[f64; DIM]> {
        self.particles
            .iter()
            .map(|p| {
                let mut probe = p.clone();
                self.integrator
                    .update_particle(&self.boundary, self.time_now, &mut probe);
                probe.v
            })
            .collect()
    }

    /// Process every virtual event up to `target_time` (must be finite and
    /// not earlier than the current time), then settle at `target_time`.
    pub fn advance_to(&mut self, target_time: f64) -> Result<()> {
        if !target_time.is_finite() {
            return Err(Error::InvalidParam("target_time must be finite".into()));
        }
        if target_time < self.time_now - EPS_TIME {
            return Err(Error::InvalidParam(
                "target_time cannot be earlier than current time".into(),
            ));
        }

        while let Some(t_next) = self.queue.peek_time() {
            if t_next > target_time {
                break;
            }
            let Some(ev) = self.queue.pop_next_event() else {
                break;
            };
            self.time_now = ev.time_f64();
            let EventKind::CellTransition { particle } = ev.kind;
            let ctx = SimContext {
                time: self.time_now,
                boundary: &self.boundary,
                integrator: &self.integrator,
            };
            self.cells
                .run_event(&ctx, &mut self.particles, &mut self.queue, particle)?;
        }

        self.time_now = target_time;
        Ok(())
    }

    /// Overwrite one particle's kinematic state and rebuild all cell
    /// assignments and pending events to match.
    pub fn set_state(&mut self, particle: u32, r: [f64; DIM], v: [f64; DIM]) -> Result<()> {
        let p = self
            .particles
            .get_mut(particle as usize)
            .ok_or_else(|| Error::InvalidParam(format!("no particle with id {particle}")))?;
        p.set_position(r)?;
        p.set_velocity(v)?;
        p.sync_time = self.time_now;
        self.rebuild()
    }

    /// Re-derive cell membership and the event queue from current particle
    /// states. Call after externally modifying positions or velocities.
    pub fn rebuild(&mut self) -> Result<()> {
        let ctx = SimContext {
            time: self.time_now,
            boundary: &self.boundary,
            integrator: &self.integrator,
        };
        self.cells
            .rebuild(&ctx, &mut self.particles, &mut self.queue)
    }

    /// Number of live transition events pending for a particle (the
    /// single-pending-event invariant expects exactly 1).
    pub fn pending_transition_events(&self, particle: u32) -> usize {
        self.queue.pending_events(particle)
    }

    /// Verify the membership invariant: every particle's true position at
    /// the current time, reduced through the shear-aware minimum image,
    /// lies inside its assigned cell.
    pub fn check_membership(&self) -> Result<()> {
        let grid = self.cells.grid();
        let widths = grid.widths();
        for p in &self.particles {
            let cell = self.cells.cell_of_particle(p.id)?;
            let c = grid.cell(cell);

            let mut probe = p.clone();
            self.integrator
                .update_particle(&self.boundary, self.time_now, &mut probe);

            let mut disp = [0.0_f64; DIM];
            for k in 0..DIM {
                disp[k] = probe.r[k] - (c.origin[k] + 0.5 * widths[k]);
            }
            self.boundary.set_pbc(&mut disp, self.time_now);
            for (k, &d) in disp.iter().enumerate() {
                if d.abs() > 0.5 * widths[k] * (1.0 + EPS_GEOM) + EPS_GEOM {
                    return Err(Error::InvariantViolation(format!(
                        "particle {} at {:?} lies outside its assigned cell {:?} (axis {k} offset {d})",
                        p.id, probe.r, c.coords
                    )));
                }
            }
        }
        Ok(())
    }
}
