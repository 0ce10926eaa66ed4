use crate::core::boundary::BoundaryCondition;
use crate::core::particle::{Checkpoint, Particle, DIM};

/// Integrator collaborator contract (the dynamics/physics engine seam).
///
/// The cell list only needs three operations: stream a particle to the
/// current time, advance it speculatively (reversibly) for the shear probe,
/// and predict when it leaves an axis-aligned cell.
///
/// Contract: `update_particle(t)` followed by `advance_update_particle(dt)`
/// followed by `update_particle(t)` must be a no-op on the particle's
/// externally observable state. The shear-image resolver depends on this.
pub trait Integrator {
    /// Stream the particle to absolute `time` and reduce it through the
    /// boundary condition.
    fn update_particle(&self, bc: &dyn BoundaryCondition, time: f64, p: &mut Particle);

    /// Advance the particle by `dt` beyond `time`, recording a rewind
    /// checkpoint so the next `update_particle(time)` restores the
    /// pre-advance state exactly.
    fn advance_update_particle(&self, bc: &dyn BoundaryCondition, time: f64, p: &mut Particle, dt: f64);

    /// Earliest exit of the particle from the axis-aligned cell with the
    /// given lower corner and edge lengths. Returns `(axis, dt)` with `dt`
    /// relative to `time`; `dt` is `+inf` when the particle never leaves.
    ///
    /// The cell-relative position and the velocity are reduced through the
    /// boundary first, so a particle whose stored image sits across the box
    /// from its assigned cell (just after a shear wrap) still resolves.
    fn square_cell_collision(
        &self,
        bc: &dyn BoundaryCondition,
        time: f64,
        p: &Particle,
        origin: [f64; DIM],
        widths: [f64; DIM],
    ) -> (usize, f64);
}

/// Free-flight (ballistic) integrator: positions stream linearly between
/// events. This is the concrete dynamics used by the driver and tests.
#[derive(Debug, Clone, Default)]
pub struct FreeFlight;

impl Integrator for FreeFlight {
    fn update_particle(&self, bc: &dyn BoundaryCondition, time: f64, p: &mut Particle) {
        // An advance-then-update pair back to the checkpoint time must be an
        // exact no-op, so restore rather than re-stream.
        if let Some(cp) = p.rewind.take() {
            if cp.sync_time == time {
                p.r = cp.r;
                p.v = cp.v;
                p.sync_time = cp.sync_time;
                return;
            }
        }
        let dt = time - p.sync_time;
        if dt != 0.0 {
            for k in 0..DIM {
                p.r[k] += p.v[k] * dt;
            }
        }
        let (mut r, mut v) = (p.r, p.v);
        bc.apply_bc(&mut r, &mut v, time);
        p.r = r;
        p.v = v;
        p.sync_time = time;
    }

    fn advance_update_particle(&self, bc: &dyn BoundaryCondition, time: f64, p: &mut Particle, dt: f64) {
        self.update_particle(bc, time, p);
        p.rewind = Some(Checkpoint {
            r: p.r,
            v: p.v,
            sync_time: p.sync_time,
        });
        for k in 0..DIM {
            p.r[k] += p.v[k] * dt;
        }
        let cp = p.rewind;
        let (mut r, mut v) = (p.r, p.v);
        bc.apply_bc(&mut r, &mut v, time + dt);
        p.r = r;
        p.v = v;
        p.sync_time = time + dt;
        p.rewind = cp;
    }

    fn square_cell_collision(
        &self,
        bc: &dyn BoundaryCondition,
        time: f64,
        p: &Particle,
        origin: [f64; DIM],
        widths: [f64; DIM],
    ) -> (usize, f64) {
        let mut rel = [0.0_f64; DIM];
        for k in 0..DIM {
            rel[k] = p.r[k] - origin[k];
        }
        let mut vel = p.v;
        bc.apply_bc(&mut rel, &mut vel, time);

        let mut best_axis = 0usize;
        let mut best_dt = f64::INFINITY;
        for k in 0..DIM {
            let dt = if vel[k] > 0.0 {
                (widths[k] - rel[k]) / vel[k]
            } else if vel[k] < 0.0 {
                rel[k] / -vel[k]
            } else {
                continue;
            };
            // Roundoff can leave the reduced position a hair outside the cell.
            let dt = dt.max(0.0);
            if dt < best_dt {
                best_dt = dt;
                best_axis = k;
            }
        }
        (best_axis, best_dt)
    }
}
