use crate::core::particle::{DIM, SHEAR_AXIS};
use crate::error::{Error, Result};

/// Sentinel for "particle is in no cell".
const NO_CELL: usize = usize::MAX;

/// Sentinel terminating a cell's intrusive membership list.
const END_OF_LIST: i32 = -1;

/// One cell of the grid. Count and geometry are fixed after construction;
/// only list membership and attached locals mutate.
#[derive(Debug, Clone)]
pub struct Cell {
    /// Coordinate triple (ix, iy, iz).
    pub coords: [usize; DIM],
    /// Geometric lower corner in the origin-centred box.
    pub origin: [f64; DIM],
    /// Head of the intrusive membership list (particle id or -1).
    pub(crate) head: i32,
    /// Ordered ids of co-located local interaction objects.
    locals: Vec<u32>,
}

impl Cell {
    /// Local object ids attached to this cell, in attachment order.
    #[inline]
    pub fn locals(&self) -> &[u32] {
        &self.locals
    }
}

/// Intrusive link record: one per particle, forming each cell's list.
#[derive(Debug, Clone, Copy)]
struct MemberLink {
    cell: usize,
    next: i32,
}

/// A regular 3D grid of cells covering the origin-centred simulation box,
/// indexed in row-major mixed-radix order with x fastest.
///
/// Membership lists are intrusive: an arena of per-particle links with an
/// explicit next index and a -1 sentinel. The grid exclusively owns these
/// lists; callers must pair every `add_to_cell` with a prior removal.
#[derive(Debug, Clone)]
pub struct CellGrid {
    counts: [usize; DIM],
    widths: [f64; DIM],
    box_size: [f64; DIM],
    cells: Vec<Cell>,
    links: Vec<MemberLink>,
    validate: bool,
}

impl CellGrid {
    /// Build a grid of `counts` cells per axis over `box_size`, with link
    /// records for `num_particles` particles.
    pub fn new(
        box_size: [f64; DIM],
        counts: [usize; DIM],
        num_particles: usize,
        validate: bool,
    ) -> Result<Self> {
        if counts.iter().any(|&n| n == 0) {
            return Err(Error::InvalidParam("cell counts must be > 0".into()));
        }
        let mut widths = [0.0_f64; DIM];
        for k in 0..DIM {
            widths[k] = box_size[k] / counts[k] as f64;
        }

        let total = counts[0] * counts[1] * counts[2];
        let mut cells = Vec::with_capacity(total);
        for iz in 0..counts[2] {
            for iy in 0..counts[1] {
                for ix in 0..counts[0] {
                    let coords = [ix, iy, iz];
                    let mut origin = [0.0_f64; DIM];
                    for k in 0..DIM {
                        origin[k] = -0.5 * box_size[k] + coords[k] as f64 * widths[k];
                    }
                    cells.push(Cell {
                        coords,
                        origin,
                        head: END_OF_LIST,
                        locals: Vec::new(),
                    });
                }
            }
        }

        Ok(Self {
            counts,
            widths,
            box_size,
            cells,
            links: vec![
                MemberLink {
                    cell: NO_CELL,
                    next: END_OF_LIST,
                };
                num_particles
            ],
            validate,
        })
    }

    /// Cells per axis.
    #[inline]
    pub fn counts(&self) -> [usize; DIM] {
        self.counts
    }

    /// Cell edge lengths per axis.
    #[inline]
    pub fn widths(&self) -> [f64; DIM] {
        self.widths
    }

    /// Edge lengths of the covered box.
    #[inline]
    pub fn box_size(&self) -> [f64; DIM] {
        self.box_size
    }

    /// Total number of cells.
    #[inline]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// True when the grid has no cells (never, for a validly built grid).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Access a cell by linear index.
    #[inline]
    pub fn cell(&self, index: usize) -> &Cell {
        &self.cells[index]
    }

    /// Linear index of a coordinate triple.
    #[inline]
    pub fn index_of(&self, coords: [usize; DIM]) -> usize {
        coords[0] + self.counts[0] * (coords[1] + self.counts[1] * coords[2])
    }

    /// Coordinate triple of a linear index.
    #[inline]
    pub fn coords_of(&self, index: usize) -> [usize; DIM] {
        let ix = index % self.counts[0];
        let iy = (index / self.counts[0]) % self.counts[1];
        let iz = index / (self.counts[0] * self.counts[1]);
        [ix, iy, iz]
    }

    /// Wrap a signed coordinate onto axis `axis`.
    #[inline]
    pub(crate) fn wrap_coord(&self, c: isize, axis: usize) -> usize {
        let n = self.counts[axis] as isize;
        c.rem_euclid(n) as usize
    }

    /// Cell containing a point already reduced into the primary box image.
    ///
    /// Per-axis floor division by the cell width; components exactly on the
    /// upper box edge clamp into the last cell. Behaviour for positions
    /// outside the box is undefined (the caller applies boundary reduction
    /// first); this clamps them rather than panicking.
    pub fn cell_of(&self, pos: [f64; DIM]) -> usize {
        let mut coords = [0usize; DIM];
        for k in 0..DIM {
            let f = ((pos[k] + 0.5 * self.box_size[k]) / self.widths[k]).floor() as isize;
            coords[k] = f.clamp(0, self.counts[k] as isize - 1) as usize;
        }
        self.index_of(coords)
    }

    /// Cell the particle is currently assigned to, or `None` if unassigned.
    #[inline]
    pub fn cell_of_particle(&self, particle: u32) -> Option<usize> {
        let cell = self.links[particle as usize].cell;
        (cell != NO_CELL).then_some(cell)
    }

    /// Prepend the particle to the cell's membership list. O(1).
    ///
    /// No duplicate-membership check is made; the caller guarantees the
    /// particle was removed from its previous cell first.
    pub fn add_to_cell(&mut self, particle: u32, cell: usize) {
        let link = &mut self.links[particle as usize];
        link.next = self.cells[cell].head;
        link.cell = cell;
        self.cells[cell].head = particle as i32;
    }

    /// Unlink the particle from its current cell's list.
    ///
    /// A particle that is not on its recorded cell's list is a programming
    /// fault: with validation on this returns `Error::InvariantViolation`,
    /// otherwise the removal is silently skipped.
    pub fn remove_from_cell(&mut self, particle: u32) -> Result<()> {
        let pid = particle as i32;
        let cell = self.links[particle as usize].cell;
        if cell == NO_CELL {
            return self.missing(particle, cell);
        }

        if self.cells[cell].head == pid {
            self.cells[cell].head = self.links[particle as usize].next;
        } else {
            let mut cursor = self.cells[cell].head;
            loop {
                if cursor < 0 {
                    return self.missing(particle, cell);
                }
                let next = self.links[cursor as usize].next;
                if next == pid {
                    self.links[cursor as usize].next = self.links[particle as usize].next;
                    break;
                }
                cursor = next;
            }
        }

        self.links[particle as usize] = MemberLink {
            cell: NO_CELL,
            next: END_OF_LIST,
        };
        Ok(())
    }

    fn missing(&self, particle: u32, cell: usize) -> Result<()> {
        if self.validate {
            return Err(Error::InvariantViolation(format!(
                "particle {particle} not found in cell {cell} during removal"
            )));
        }
        Ok(())
    }

    /// Drop every membership link (used when rebuilding from injected state).
    pub fn clear_membership(&mut self) {
        for cell in &mut self.cells {
            cell.head = END_OF_LIST;
        }
        for link in &mut self.links {
            *link = MemberLink {
                cell: NO_CELL,
                next: END_OF_LIST,
            };
        }
    }

    /// Iterate the particle ids resident in a cell.
    #[inline]
    pub fn members(&self, cell: usize) -> Members<'_> {
        Members {
            grid: self,
            next: self.cells[cell].head,
        }
    }

    /// Attach a local object id to a cell.
    pub fn add_local(&mut self, cell: usize, local_id: u32) {
        self.cells[cell].locals.push(local_id);
    }

    /// The cubic block of cells around `cell` (the centre included), with
    /// wraparound on the ordinary periodic axes (x, z) but clamping on the
    /// shear axis (y): rows past a y extreme are skipped, since the sheared
    /// y image is the resolver's business, not plain adjacency.
    pub fn neighbor_block(&self, cell: usize, radius: usize) -> Vec<usize> {
        let c = self.cells[cell].coords;
        let r = radius as isize;
        let side = 2 * radius + 1;
        let mut out = Vec::with_capacity(side * side * side);
        for dy in -r..=r {
            let y = c[SHEAR_AXIS] as isize + dy;
            if y < 0 || y >= self.counts[SHEAR_AXIS] as isize {
                continue;
            }
            for dz in -r..=r {
                let z = self.wrap_coord(c[2] as isize + dz, 2);
                for dx in -r..=r {
                    let x = self.wrap_coord(c[0] as isize + dx, 0);
                    out.push(self.index_of([x, y as usize, z]));
                }
            }
        }
        out
    }
}

/// Iterator over a cell's intrusive membership list.
pub struct Members<'a> {
    grid: &'a CellGrid,
    next: i32,
}

impl Iterator for Members<'_> {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        if self.next < 0 {
            return None;
        }
        let id = self.next as u32;
        self.next = self.grid.links[id as usize].next;
        Some(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid4(validate: bool) -> CellGrid {
        CellGrid::new([1.0, 1.0, 1.0], [4, 4, 4], 8, validate).unwrap()
    }

    #[test]
    fn index_coords_round_trip() {
        let g = grid4(true);
        for idx in 0..g.len() {
            assert_eq!(g.index_of(g.coords_of(idx)), idx);
        }
        assert_eq!(g.index_of([1, 2, 3]), 1 + 4 * (2 + 4 * 3));
    }

    #[test]
    fn cell_of_maps_corners_and_centre() {
        let g = grid4(true);
        assert_eq!(g.coords_of(g.cell_of([-0.5, -0.5, -0.5])), [0, 0, 0]);
        assert_eq!(g.coords_of(g.cell_of([0.0, 0.0, 0.0])), [2, 2, 2]);
        // Exactly on the upper edge clamps into the last cell.
        assert_eq!(g.coords_of(g.cell_of([0.5, 0.5, 0.5])), [3, 3, 3]);
        assert_eq!(g.coords_of(g.cell_of([0.49, -0.26, 0.1])), [3, 0, 2]);
    }

    #[test]
    fn membership_list_prepends_and_unlinks() -> crate::error::Result<()> {
        let mut g = grid4(true);
        g.add_to_cell(3, 10);
        g.add_to_cell(5, 10);
        g.add_to_cell(7, 10);
        // Prepend order: most recent first.
        assert_eq!(g.members(10).collect::<Vec<_>>(), vec![7, 5, 3]);
        assert_eq!(g.cell_of_particle(5), Some(10));

        // Unlink from the middle, then the head, then the tail.
        g.remove_from_cell(5)?;
        assert_eq!(g.members(10).collect::<Vec<_>>(), vec![7, 3]);
        g.remove_from_cell(7)?;
        assert_eq!(g.members(10).collect::<Vec<_>>(), vec![3]);
        g.remove_from_cell(3)?;
        assert_eq!(g.members(10).count(), 0);
        assert_eq!(g.cell_of_particle(3), None);
        Ok(())
    }

    #[test]
    fn removal_of_absent_particle_is_a_violation_when_validating() {
        let mut g = grid4(true);
        let err = g.remove_from_cell(2).unwrap_err();
        assert!(err.to_string().contains("invariant violation"));

        let mut quiet = grid4(false);
        assert!(quiet.remove_from_cell(2).is_ok());
    }

    #[test]
    fn neighbor_block_wraps_x_z_but_clamps_y() {
        let g = grid4(true);
        // Interior cell: full 27 block.
        let interior = g.index_of([1, 2, 1]);
        assert_eq!(g.neighbor_block(interior, 1).len(), 27);

        // Bottom y layer: the y-1 row is clipped, 18 cells remain.
        let bottom = g.index_of([0, 0, 0]);
        let block = g.neighbor_block(bottom, 1);
        assert_eq!(block.len(), 18);
        // x and z wrapped: the x=3, z=3 corner is present.
        assert!(block.contains(&g.index_of([3, 0, 3])));
        // No wrapped y row.
        assert!(block.iter().all(|&c| g.coords_of(c)[1] <= 1));
    }

    #[test]
    fn locals_keep_attachment_order() {
        let mut g = grid4(true);
        g.add_local(4, 9);
        g.add_local(4, 2);
        assert_eq!(g.cell(4).locals(), &[9, 2]);
    }
}
