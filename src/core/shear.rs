use crate::core::grid::CellGrid;
use crate::core::particle::{Particle, SHEAR_AXIS};
use crate::core::sim::SimContext;
use crate::error::{Error, Result};

/// Resolve the destination cell of a particle crossing a y extreme, taking
/// the sheared boundary image into account.
///
/// Index arithmetic: strip the old cell's x contribution from the linear
/// index, shift one full y layer of cells in the crossing direction, then add
/// back the x index of the image the particle actually lands in. The x index
/// comes from a stateless probe: advance the particle to the predicted
/// crossing, nudge it half a cell width in y so the image is unambiguous,
/// rewind, and reduce the probed position through the boundary condition at
/// the crossing time.
///
/// The nudge direction follows the sign of `vy`, which must match the
/// convention used when the crossing was predicted; a mismatch places the
/// particle one cell off with no self-healing. A vanished `vy` therefore
/// means the prediction went stale, reported as an invariant violation when
/// validation is on.
pub fn resolve_wrap_cell(
    grid: &CellGrid,
    ctx: &SimContext<'_>,
    p: &mut Particle,
    old_cell: usize,
    vy: f64,
    validate: bool,
) -> Result<usize> {
    let counts = grid.counts();
    let (nx, ny) = (counts[0], counts[SHEAR_AXIS]);
    let coords = grid.coords_of(old_cell);

    if validate && vy == 0.0 {
        return Err(Error::InvariantViolation(format!(
            "particle {} reached a y-wrap transition with zero y velocity (stale crossing prediction)",
            p.id
        )));
    }
    let down = vy < 0.0;

    // x contribution removed; one full y layer shifted by crossing direction.
    let mut end = old_cell - coords[0];
    if down {
        end += nx * (ny - 1);
    } else {
        end -= nx * (ny - 1);
    }

    // Stateless probe: advance to the crossing, record the position, rewind.
    let origin = grid.cell(old_cell).origin;
    let (_, dt) = ctx
        .integrator
        .square_cell_collision(ctx.boundary, ctx.time, p, origin, grid.widths());
    let dt = if dt.is_finite() { dt } else { 0.0 };

    ctx.integrator
        .advance_update_particle(ctx.boundary, ctx.time, p, dt);
    let mut probe = p.r;
    ctx.integrator.update_particle(ctx.boundary, ctx.time, p);

    // Half-cell nudge into the destination image, then reduce at the
    // crossing time (fixed at prediction, even if other events interleave).
    let half = 0.5 * grid.widths()[SHEAR_AXIS];
    if down {
        probe[SHEAR_AXIS] -= half;
    } else {
        probe[SHEAR_AXIS] += half;
    }
    let mut vel = p.v;
    ctx.boundary.apply_bc(&mut probe, &mut vel, ctx.time + dt);

    // x position of the landed image, in cell coordinates.
    let lx = grid.box_size()[0];
    let ix_raw = ((probe[0] + 0.5 * lx) / grid.widths()[0]).floor() as isize;
    let ix = ix_raw.rem_euclid(nx as isize) as usize;

    Ok(end + ix)
}
