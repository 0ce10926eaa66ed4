use crate::core::grid::CellGrid;
use crate::core::notify::{CellHook, NeighborNotifier, PairHook};
use crate::core::particle::{Particle, DIM, SHEAR_AXIS};
use crate::core::scheduler::Scheduler;
use crate::core::shear::resolve_wrap_cell;
use crate::core::sim::SimContext;
use crate::error::{Error, Result};

/// Configuration for the shearing cell list.
#[derive(Debug, Clone)]
pub struct CellListConfig {
    /// Longest interaction range; sets the minimum cell edge length.
    pub interaction_range: f64,
    /// Spatial linking radius in cells. Anything but 1 is rejected at
    /// initialization: multi-cell shear handling is unsupported.
    pub overlink: u32,
    /// Always-compiled validation mode: invariant violations become
    /// structured errors instead of silent continuation.
    pub validate: bool,
}

impl Default for CellListConfig {
    fn default() -> Self {
        Self {
            interaction_range: 1.0,
            overlink: 1,
            validate: true,
        }
    }
}

/// The three qualitatively different cell crossings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionCase {
    /// Crossing a y extreme: the shear image decides the destination.
    FullWrap,
    /// Entering a y extreme layer from one layer inside it.
    BoundaryStrip,
    /// Any other crossing (x, z, or interior y).
    Interior,
}

/// Decide which transition case applies for a particle leaving its cell
/// along `axis` with velocity component `v_axis`.
pub fn classify(counts: [usize; DIM], coords: [usize; DIM], axis: usize, v_axis: f64) -> TransitionCase {
    if axis == SHEAR_AXIS {
        let ny = counts[SHEAR_AXIS];
        let extreme = if v_axis < 0.0 { 0 } else { ny - 1 };
        if coords[SHEAR_AXIS] == extreme {
            return TransitionCase::FullWrap;
        }
        let strip = if v_axis < 0.0 { 1 } else { ny - 2 };
        if coords[SHEAR_AXIS] == strip {
            return TransitionCase::BoundaryStrip;
        }
    }
    TransitionCase::Interior
}

/// Cell list specialized for Lees-Edwards (shearing) boundary conditions.
///
/// Owns the grid and the notification registry; mediates between the
/// integrator, the boundary condition and the scheduler without owning any
/// of them. All bookkeeping for one crossing happens inside a single
/// `run_event` call, so no outside code ever observes an inconsistent
/// intermediate state.
pub struct ShearingCells {
    grid: CellGrid,
    notifier: NeighborNotifier,
    validate: bool,
}

impl ShearingCells {
    /// Build the cell list, place every particle, and schedule one virtual
    /// transition event per particle.
    ///
    /// Fails fast with `Error::Config` when the boundary condition is not
    /// shear-periodic, when `overlink != 1`, or when the interaction range
    /// leaves fewer than 4 cells on some axis.
    pub fn new(
        config: &CellListConfig,
        ctx: &SimContext<'_>,
        particles: &mut [Particle],
        scheduler: &mut dyn Scheduler,
    ) -> Result<Self> {
        if ctx.boundary.as_shearing().is_none() {
            return Err(Error::Config(
                "the shearing cell list requires Lees-Edwards (shear-periodic) boundary conditions"
                    .into(),
            ));
        }
        if config.overlink != 1 {
            return Err(Error::Config(format!(
                "overlink factor {} is unsupported: the shearing cell list requires overlink == 1",
                config.overlink
            )));
        }
        if !config.interaction_range.is_finite() || config.interaction_range <= 0.0 {
            return Err(Error::InvalidParam(
                "interaction_range must be finite and > 0".into(),
            ));
        }

        let box_size = ctx.boundary.box_size();
        let mut counts = [0usize; DIM];
        for k in 0..DIM {
            counts[k] = (box_size[k] / config.interaction_range).floor() as usize;
        }
        // With 3 cells on an axis every cell already neighbours every other,
        // so the exposed-face delta would wrap onto cells that were adjacent
        // before the crossing and re-announce their particles.
        if counts.iter().any(|&n| n < 4) {
            return Err(Error::Config(format!(
                "interaction range {} leaves fewer than 4 cells per axis over box {:?}",
                config.interaction_range, box_size
            )));
        }

        let grid = CellGrid::new(box_size, counts, particles.len(), config.validate)?;
        let mut cells = Self {
            grid,
            notifier: NeighborNotifier::default(),
            validate: config.validate,
        };
        cells.populate(ctx, particles, scheduler)?;
        log::info!(
            "shearing cells initialized: {}x{}x{} cells over box {:?}",
            counts[0],
            counts[1],
            counts[2],
            box_size
        );
        Ok(cells)
    }

    fn populate(
        &mut self,
        ctx: &SimContext<'_>,
        particles: &mut [Particle],
        scheduler: &mut dyn Scheduler,
    ) -> Result<()> {
        for p in particles.iter_mut() {
            ctx.integrator.update_particle(ctx.boundary, ctx.time, p);
            let cell = self.grid.cell_of(p.r);
            self.grid.add_to_cell(p.id, cell);
            let (_, dt) = ctx.integrator.square_cell_collision(
                ctx.boundary,
                ctx.time,
                p,
                self.grid.cell(cell).origin,
                self.grid.widths(),
            );
            scheduler.full_update(p.id, ctx.time + dt)?;
        }
        Ok(())
    }

    /// Re-derive every cell assignment and pending event from the current
    /// particle states (after external position/velocity injection).
    pub fn rebuild(
        &mut self,
        ctx: &SimContext<'_>,
        particles: &mut [Particle],
        scheduler: &mut dyn Scheduler,
    ) -> Result<()> {
        self.grid.clear_membership();
        self.populate(ctx, particles, scheduler)
    }

    /// The underlying grid (read-only).
    #[inline]
    pub fn grid(&self) -> &CellGrid {
        &self.grid
    }

    /// Cell currently assigned to a particle.
    pub fn cell_of_particle(&self, particle: u32) -> Result<usize> {
        self.grid.cell_of_particle(particle).ok_or_else(|| {
            Error::InvariantViolation(format!("particle {particle} has no cell assignment"))
        })
    }

    /// Register a new-neighbour callback.
    pub fn on_new_neighbour(&mut self, hook: PairHook) {
        self.notifier.on_new_neighbour(hook);
    }

    /// Register a new-local callback.
    pub fn on_new_local(&mut self, hook: PairHook) {
        self.notifier.on_new_local(hook);
    }

    /// Register a cell-changed callback.
    pub fn on_cell_changed(&mut self, hook: CellHook) {
        self.notifier.on_cell_changed(hook);
    }

    /// Attach a local object to one cell.
    pub fn attach_local_to_cell(&mut self, cell: usize, local_id: u32) {
        self.grid.add_local(cell, local_id);
    }

    /// Attach a local object to every cell whose (origin, widths) satisfies
    /// the predicate.
    pub fn attach_local_where(
        &mut self,
        local_id: u32,
        pred: impl Fn([f64; DIM], [f64; DIM]) -> bool,
    ) {
        let widths = self.grid.widths();
        for cell in 0..self.grid.len() {
            if pred(self.grid.cell(cell).origin, widths) {
                self.grid.add_local(cell, local_id);
            }
        }
    }

    /// Process a cell-transition event for `particle`.
    ///
    /// Updates the particle to the event time, classifies the crossing,
    /// migrates the particle between cell lists, fires notifications for
    /// every newly visible particle and local (each exactly once), and
    /// schedules the particle's next transition before returning. No
    /// physical interaction is resolved here.
    pub fn run_event(
        &mut self,
        ctx: &SimContext<'_>,
        particles: &mut [Particle],
        scheduler: &mut dyn Scheduler,
        particle: u32,
    ) -> Result<()> {
        let pid = particle as usize;
        let p = &mut particles[pid];
        ctx.integrator.update_particle(ctx.boundary, ctx.time, p);

        let old_cell = self.cell_of_particle(particle)?;
        let old_coords = self.grid.coords_of(old_cell);
        let origin = self.grid.cell(old_cell).origin;

        let (axis, _) = ctx
            .integrator
            .square_cell_collision(ctx.boundary, ctx.time, p, origin, self.grid.widths());

        // Crossing direction comes from the boundary-reduced velocity, the
        // same convention the prediction used.
        let mut rel = [0.0_f64; DIM];
        for k in 0..DIM {
            rel[k] = p.r[k] - origin[k];
        }
        let mut vel = p.v;
        ctx.boundary.apply_bc(&mut rel, &mut vel, ctx.time);
        let v_axis = vel[axis];

        let counts = self.grid.counts();
        let ny = counts[SHEAR_AXIS];
        let case = classify(counts, old_coords, axis, v_axis);

        // All index computation happens before the first mutation.
        let (end_cell, mut scan) = match case {
            TransitionCase::FullWrap => {
                let end = resolve_wrap_cell(&self.grid, ctx, p, old_cell, v_axis, self.validate)?;
                // The shear image can make an arbitrary set of cells
                // adjacent: rescan the whole neighbourhood of the landing
                // cell, strip included.
                let mut cells = self.grid.neighbor_block(end, 1);
                cells.extend(self.strip_cells(self.grid.coords_of(end))?);
                (end, cells)
            }
            TransitionCase::BoundaryStrip => {
                let mut c = old_coords;
                c[SHEAR_AXIS] = if v_axis < 0.0 {
                    c[SHEAR_AXIS] - 1
                } else {
                    c[SHEAR_AXIS] + 1
                };
                // The geometric y-wrapped face is not a true neighbour under
                // shear; the opposite boundary strip replaces it.
                (self.grid.index_of(c), self.strip_cells(c)?)
            }
            TransitionCase::Interior => {
                let step: isize = if v_axis < 0.0 { -1 } else { 1 };
                let mut dest = old_coords;
                dest[axis] = self.grid.wrap_coord(old_coords[axis] as isize + step, axis);
                let end = self.grid.index_of(dest);

                // Only the newly exposed 3x3 face, centred two cells ahead:
                // the other 18 of 27 cells were already neighbours.
                let mut face_centre = old_coords;
                face_centre[axis] = self
                    .grid
                    .wrap_coord(old_coords[axis] as isize + 2 * step, axis);
                let mut cells = self.exposed_face(face_centre, axis);

                // A z move on a y extreme layer slides the strip window by
                // one row; only that row is newly visible.
                if axis == 2 && (old_coords[SHEAR_AXIS] == 0 || old_coords[SHEAR_AXIS] == ny - 1) {
                    let opp = if old_coords[SHEAR_AXIS] == 0 { ny - 1 } else { 0 };
                    let z_new = self.grid.wrap_coord(old_coords[2] as isize + 2 * step, 2);
                    for ix in 0..counts[0] {
                        cells.push(self.grid.index_of([ix, opp, z_new]));
                    }
                }
                (end, cells)
            }
        };

        // A cell can enter the scan set through more than one route (block
        // vs strip); notify each exactly once.
        scan.sort_unstable();
        scan.dedup();

        // Invalidate the stale prediction before the membership mutation so
        // there is never a window with two live events for this particle.
        scheduler.invalidate_pending(particle);
        self.grid.remove_from_cell(particle)?;
        self.grid.add_to_cell(particle, end_cell);
        particles[pid].bump_event_count();

        {
            let grid = &self.grid;
            let notifier = &mut self.notifier;
            for &cell in &scan {
                for other in grid.members(cell) {
                    if other != particle {
                        notifier.notify_new_neighbour(particle, other);
                    }
                }
            }
            for &local_id in grid.cell(end_cell).locals() {
                notifier.notify_new_local(particle, local_id);
            }
        }

        // Push the successor virtual event; exactly one live event per
        // particle again before control returns to the loop.
        let (_, dt_next) = ctx.integrator.square_cell_collision(
            ctx.boundary,
            ctx.time,
            &particles[pid],
            self.grid.cell(end_cell).origin,
            self.grid.widths(),
        );
        scheduler.push_event(particle, ctx.time + dt_next)?;
        scheduler.sort(particle);

        self.notifier.notify_cell_changed(particle, old_cell);

        log::trace!(
            "cell transition: particle {} {:?} -> {:?} at t={}",
            particle,
            old_coords,
            self.grid.coords_of(end_cell),
            ctx.time
        );
        Ok(())
    }

    /// Invoke `f` once per particle in the full neighbourhood of `particle`:
    /// the cubic block around its cell plus, on a y extreme layer, the extra
    /// Lees-Edwards strip. The particle itself is excluded.
    pub fn for_each_neighbour(&self, particle: u32, mut f: impl FnMut(u32)) -> Result<()> {
        let cell = self.cell_of_particle(particle)?;
        let coords = self.grid.coords_of(cell);
        let ny = self.grid.counts()[SHEAR_AXIS];

        let mut cells = self.grid.neighbor_block(cell, 1);
        if coords[SHEAR_AXIS] == 0 || coords[SHEAR_AXIS] == ny - 1 {
            cells.extend(self.strip_cells(coords)?);
        }
        cells.sort_unstable();
        cells.dedup();

        for &c in &cells {
            for other in self.grid.members(c) {
                if other != particle {
                    f(other);
                }
            }
        }
        Ok(())
    }

    /// The extra Lees-Edwards neighbourhood of a cell on a y extreme layer:
    /// the opposite extreme layer, every x, and z within one cell (wrapped).
    /// The full x extent is needed because the shear offset can align the
    /// opposite layer with this cell at any x.
    pub fn extra_le_neighbourhood(&self, cell: usize) -> Result<Vec<usize>> {
        self.strip_cells(self.grid.coords_of(cell))
    }

    fn strip_cells(&self, coords: [usize; DIM]) -> Result<Vec<usize>> {
        let [nx, ny, _] = self.grid.counts();
        if coords[SHEAR_AXIS] != 0 && coords[SHEAR_AXIS] != ny - 1 {
            return Err(Error::InvariantViolation(format!(
                "extra Lees-Edwards neighbourhood requested for cell {coords:?} not on a y extreme layer"
            )));
        }
        let opp = if coords[SHEAR_AXIS] == 0 { ny - 1 } else { 0 };
        let mut out = Vec::with_capacity(3 * nx);
        for dz in -1..=1isize {
            let z = self.grid.wrap_coord(coords[2] as isize + dz, 2);
            for ix in 0..nx {
                out.push(self.grid.index_of([ix, opp, z]));
            }
        }
        Ok(out)
    }

    /// The 3x3 face of cells at `centre`, spanning the two axes other than
    /// `axis`. Ordinary axes wrap; rows past a y extreme are skipped.
    fn exposed_face(&self, centre: [usize; DIM], axis: usize) -> Vec<usize> {
        let d1 = (axis + 1) % DIM;
        let d2 = (axis + 2) % DIM;
        let mut out = Vec::with_capacity(9);
        for o1 in -1..=1isize {
            let Some(c1) = self.offset_coord(centre[d1], d1, o1) else {
                continue;
            };
            for o2 in -1..=1isize {
                let Some(c2) = self.offset_coord(centre[d2], d2, o2) else {
                    continue;
                };
                let mut c = centre;
                c[d1] = c1;
                c[d2] = c2;
                out.push(self.grid.index_of(c));
            }
        }
        out
    }

    /// Offset a coordinate along an axis: wrap on x/z, clamp (skip) on y.
    fn offset_coord(&self, c: usize, axis: usize, delta: isize) -> Option<usize> {
        let raw = c as isize + delta;
        if axis == SHEAR_AXIS {
            (raw >= 0 && raw < self.grid.counts()[SHEAR_AXIS] as isize).then_some(raw as usize)
        } else {
            Some(self.grid.wrap_coord(raw, axis))
        }
    }
}

impl std::fmt::Debug for ShearingCells {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShearingCells")
            .field("counts", &self.grid.counts())
            .field("validate", &self.validate)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::boundary::LeesEdwards;
    use crate::core::integrator::FreeFlight;
    use crate::core::scheduler::EventQueue;

    const N: [usize; DIM] = [4, 4, 4];

    #[test]
    fn classify_covers_all_three_cases() {
        use TransitionCase::*;
        // y crossings at the extremes wrap.
        assert_eq!(classify(N, [2, 0, 1], 1, -1.0), FullWrap);
        assert_eq!(classify(N, [2, 3, 1], 1, 1.0), FullWrap);
        // One layer inside the extreme enters the boundary strip.
        assert_eq!(classify(N, [2, 1, 1], 1, -1.0), BoundaryStrip);
        assert_eq!(classify(N, [2, 2, 1], 1, 1.0), BoundaryStrip);
        // Everything else is an ordinary crossing.
        assert_eq!(classify(N, [2, 1, 1], 1, 1.0), Interior);
        assert_eq!(classify(N, [2, 2, 1], 1, -1.0), Interior);
        assert_eq!(classify(N, [0, 0, 0], 0, -1.0), Interior);
        assert_eq!(classify(N, [3, 3, 3], 2, 1.0), Interior);
    }

    fn empty_list() -> ShearingCells {
        let bc = LeesEdwards::new([1.0, 1.0, 1.0], 0.1).unwrap();
        let integ = FreeFlight;
        let ctx = SimContext {
            time: 0.0,
            boundary: &bc,
            integrator: &integ,
        };
        let mut queue = EventQueue::new(0);
        ShearingCells::new(&CellListConfig {
            interaction_range: 0.25,
            ..Default::default()
        }, &ctx, &mut [], &mut queue)
        .unwrap()
    }

    #[test]
    fn strip_spans_all_x_and_three_z_rows() -> Result<()> {
        let cells = empty_list();
        let g = cells.grid();
        let strip = cells.extra_le_neighbourhood(g.index_of([1, 0, 2]))?;
        assert_eq!(strip.len(), 12);
        for &c in &strip {
            let [_, iy, iz] = g.coords_of(c);
            assert_eq!(iy, 3);
            assert!(iz == 1 || iz == 2 || iz == 3);
        }
        // All four x columns present in each row.
        let xs: Vec<usize> = strip.iter().map(|&c| g.coords_of(c)[0]).collect();
        for x in 0..4 {
            assert_eq!(xs.iter().filter(|&&v| v == x).count(), 3);
        }
        Ok(())
    }

    #[test]
    fn strip_requires_an_extreme_layer() {
        let cells = empty_list();
        let g = cells.grid();
        let err = cells
            .extra_le_neighbourhood(g.index_of([1, 2, 2]))
            .unwrap_err();
        assert!(err.to_string().contains("extreme layer"));
    }

    #[test]
    fn exposed_face_is_nine_cells_with_wrap() {
        let cells = empty_list();
        let g = cells.grid();
        // z face at an interior y: full 3x3, x wraps.
        let face = cells.exposed_face([0, 2, 3], 2);
        assert_eq!(face.len(), 9);
        for &c in &face {
            let [ix, iy, iz] = g.coords_of(c);
            assert_eq!(iz, 3);
            assert!(ix == 3 || ix == 0 || ix == 1);
            assert!((1..=3).contains(&iy));
        }
    }

    #[test]
    fn exposed_face_clips_past_y_extremes() {
        let cells = empty_list();
        // x face touching the bottom y layer loses its y-1 row.
        let face = cells.exposed_face([2, 0, 2], 0);
        assert_eq!(face.len(), 6);
        for &c in &face {
            assert!(cells.grid().coords_of(c)[1] <= 1);
        }
    }
}
