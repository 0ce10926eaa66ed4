use crate::core::particle::{DIM, SHEAR_AXIS};
use crate::error::{Error, Result};

/// Boundary-condition collaborator contract.
///
/// Positions live in a box centred on the origin: axis `k` spans
/// `[-L_k/2, +L_k/2)`. `apply_bc` reduces a position (and, for shearing
/// variants, the velocity) into the canonical image; `set_pbc` performs a
/// minimum-image reduction of a separation vector. Both are functions of
/// simulation time because the sheared image drifts.
pub trait BoundaryCondition {
    /// Reduce `pos` into the primary image, adjusting `vel` where the
    /// boundary imparts momentum (the Lees-Edwards x kick on a y wrap).
    fn apply_bc(&self, pos: &mut [f64; DIM], vel: &mut [f64; DIM], time: f64);

    /// Minimum-image reduction of a relative vector at the given time.
    fn set_pbc(&self, rel: &mut [f64; DIM], time: f64);

    /// Edge lengths of the primary box.
    fn box_size(&self) -> [f64; DIM];

    /// Downcast hook: `Some` only for the shearing (Lees-Edwards) variant.
    /// The shearing cell list refuses to initialize when this is `None`.
    fn as_shearing(&self) -> Option<&LeesEdwards> {
        None
    }
}

/// Lees-Edwards boundary conditions: periodic in all axes, with the images
/// above/below the y boundary displaced in x by the accumulated shear strain.
#[derive(Debug, Clone)]
pub struct LeesEdwards {
    box_size: [f64; DIM],
    strain_rate: f64,
}

impl LeesEdwards {
    /// Create shear-periodic boundaries with the given box and strain rate
    /// (d(gamma)/dt; the image displacement grows as `strain_rate * t * L_y`).
    pub fn new(box_size: [f64; DIM], strain_rate: f64) -> Result<Self> {
        validate_box(&box_size)?;
        if !strain_rate.is_finite() {
            return Err(Error::InvalidParam("strain_rate must be finite".into()));
        }
        Ok(Self {
            box_size,
            strain_rate,
        })
    }

    /// Strain rate d(gamma)/dt.
    #[inline]
    pub fn strain_rate(&self) -> f64 {
        self.strain_rate
    }

    /// Instantaneous x displacement of the image across the y boundary,
    /// wrapped into one x box length. Derived from time, never stored.
    #[inline]
    pub fn shear_displacement(&self, time: f64) -> f64 {
        let lx = self.box_size[0];
        let raw = self.strain_rate * time * self.box_size[SHEAR_AXIS];
        raw - lx * (raw / lx).round()
    }

    /// Velocity difference between adjacent y images.
    #[inline]
    pub fn image_velocity(&self) -> f64 {
        self.strain_rate * self.box_size[SHEAR_AXIS]
    }
}

/// Number of box lengths to subtract to land in the canonical half-open
/// range `[-l/2, +l/2)`. Floor-based so reduction is idempotent: a point
/// sitting exactly on the lower boundary stays put instead of flipping
/// between images on repeated application.
#[inline]
fn image_count(x: f64, l: f64) -> f64 {
    (x / l + 0.5).floor()
}

impl BoundaryCondition for LeesEdwards {
    fn apply_bc(&self, pos: &mut [f64; DIM], vel: &mut [f64; DIM], time: f64) {
        let [lx, ly, lz] = self.box_size;
        let y_img = image_count(pos[SHEAR_AXIS], ly);
        if y_img != 0.0 {
            pos[0] -= y_img * self.shear_displacement(time);
            vel[0] -= y_img * self.image_velocity();
            pos[SHEAR_AXIS] -= y_img * ly;
        }
        pos[0] -= lx * image_count(pos[0], lx);
        pos[2] -= lz * image_count(pos[2], lz);
    }

    fn set_pbc(&self, rel: &mut [f64; DIM], time: f64) {
        let [lx, ly, lz] = self.box_size;
        let y_img = image_count(rel[SHEAR_AXIS], ly);
        if y_img != 0.0 {
            rel[0] -= y_img * self.shear_displacement(time);
            rel[SHEAR_AXIS] -= y_img * ly;
        }
        rel[0] -= lx * image_count(rel[0], lx);
        rel[2] -= lz * image_count(rel[2], lz);
    }

    fn box_size(&self) -> [f64; DIM] {
        self.box_size
    }

    fn as_shearing(&self) -> Option<&LeesEdwards> {
        Some(self)
    }
}

/// Plain (non-shearing) periodic boundaries. The shearing cell list rejects
/// this variant at initialization; it exists for collaborators that do not
/// shear and for configuration-validation tests.
#[derive(Debug, Clone)]
pub struct Periodic {
    box_size: [f64; DIM],
}

impl Periodic {
    /// Create ordinary periodic boundaries with the given box.
    pub fn new(box_size: [f64; DIM]) -> Result<Self> {
        validate_box(&box_size)?;
        Ok(Self { box_size })
    }
}

impl BoundaryCondition for Periodic {
    fn apply_bc(&self, pos: &mut [f64; DIM], _vel: &mut [f64; DIM], _time: f64) {
        for (x, &l) in pos.iter_mut().zip(&self.box_size) {
            *x -= l * image_count(*x, l);
        }
    }

    fn set_pbc(&self, rel: &mut [f64; DIM], _time: f64) {
        for (x, &l) in rel.iter_mut().zip(&self.box_size) {
            *x -= l * image_count(*x, l);
        }
    }

    fn box_size(&self) -> [f64; DIM] {
        self.box_size
    }
}

fn validate_box(box_size: &[f64; DIM]) -> Result<()> {
    if !box_size.iter().all(|&l| l.is_finite() && l > 0.0) {
        return Err(Error::InvalidParam(
            "box_size components must be finite and > 0".into(),
        ));
    }
    Ok(())
}
