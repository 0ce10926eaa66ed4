use crate::error::{Error, Result};

/// Fixed spatial dimension (3D).
pub const DIM: usize = 3;

/// Axis index of the shear (Lees-Edwards) direction: strain accumulates in x
/// as a function of displacement across the y boundary.
pub const SHEAR_AXIS: usize = 1;

/// Saved kinematic state used to rewind a speculative advance exactly.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Checkpoint {
    pub r: [f64; DIM],
    pub v: [f64; DIM],
    pub sync_time: f64,
}

/// A point particle tracked by the cell list.
///
/// Fields:
/// - `id`: stable identifier, doubles as the arena index
/// - `r`: position [x, y, z], kept reduced into the primary box image
/// - `v`: velocity [vx, vy, vz]
/// - `sync_time`: absolute time `r` was last streamed to
/// - `event_count`: incremented each time the particle participates in a
///   realized event (used for lazy queue invalidation)
#[derive(Debug, Clone)]
pub struct Particle {
    /// Stable particle identifier.
    pub id: u32,
    /// Position (x, y, z).
    pub r: [f64; DIM],
    /// Velocity (vx, vy, vz).
    pub v: [f64; DIM],
    /// Absolute time the position was last streamed to.
    pub sync_time: f64,
    /// Event participation counter.
    pub event_count: u64,
    /// Rewind state recorded by a speculative advance; consumed by the next
    /// update back to the recorded time.
    pub(crate) rewind: Option<Checkpoint>,
}

impl Particle {
    /// Create a new particle after validating invariants.
    ///
    /// Errors:
    /// - `Error::InvalidParam` if any component of `r` or `v` is NaN/inf.
    pub fn new(id: u32, r: [f64; DIM], v: [f64; DIM]) -> Result<Self> {
        if !r.iter().all(|x| x.is_finite()) {
            return Err(Error::InvalidParam("position must be finite".into()));
        }
        if !v.iter().all(|x| x.is_finite()) {
            return Err(Error::InvalidParam("velocity must be finite".into()));
        }
        Ok(Self {
            id,
            r,
            v,
            sync_time: 0.0,
            event_count: 0,
            rewind: None,
        })
    }

    /// Increment the event counter (used for queue invalidation).
    #[inline]
    pub fn bump_event_count(&mut self) {
        self.event_count = self.event_count.saturating_add(1);
    }

    /// Set position (validated as finite). Drops any pending rewind state.
    pub fn set_position(&mut self, r: [f64; DIM]) -> Result<()> {
        if !r.iter().all(|x| x.is_finite()) {
            return Err(Error::InvalidParam("position must be finite".into()));
        }
        self.r = r;
        self.rewind = None;
        Ok(())
    }

    /// Set velocity (validated as finite). Drops any pending rewind state.
    pub fn set_velocity(&mut self, v: [f64; DIM]) -> Result<()> {
        if !v.iter().all(|x| x.is_finite()) {
            return Err(Error::InvalidParam("velocity must be finite".into()));
        }
        self.v = v;
        self.rewind = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_particle_ok() -> Result<()> {
        let p = Particle::new(1, [0.0, 1.0, 2.0], [2.0, -3.0, 0.5])?;
        assert_eq!(p.id, 1);
        assert_eq!(p.r, [0.0, 1.0, 2.0]);
        assert_eq!(p.v, [2.0, -3.0, 0.5]);
        assert_eq!(p.sync_time, 0.0);
        assert_eq!(p.event_count, 0);
        Ok(())
    }

    #[test]
    fn non_finite_position_rejected() {
        let err = Particle::new(0, [f64::NAN, 0.0, 0.0], [0.0, 0.0, 0.0]).unwrap_err();
        assert!(err.to_string().contains("position"));
    }

    #[test]
    fn non_finite_velocity_rejected() {
        let err = Particle::new(0, [0.0, 0.0, 0.0], [f64::INFINITY, 0.0, 0.0]).unwrap_err();
        assert!(err.to_string().contains("velocity"));
    }

    #[test]
    fn bump_event_count() -> Result<()> {
        let mut p = Particle::new(1, [0.0, 0.0, 0.0], [0.0, 0.0, 0.0])?;
        assert_eq!(p.event_count, 0);
        p.bump_event_count();
        assert_eq!(p.event_count, 1);
        Ok(())
    }

    #[test]
    fn setters_drop_rewind_state() -> Result<()> {
        let mut p = Particle::new(1, [0.0, 0.0, 0.0], [1.0, 0.0, 0.0])?;
        p.rewind = Some(Checkpoint {
            r: p.r,
            v: p.v,
            sync_time: 0.0,
        });
        p.set_velocity([0.0, 1.0, 0.0])?;
        assert!(p.rewind.is_none());
        Ok(())
    }
}
