//! Topology bookkeeping for one coarse-system construction.
//!
//! [`CoarseSysMeta`] gathers, in one pass over the fine face-neighbour
//! pairs and the partition, every count and numbering the assembly needs:
//! per-block half-face and interior-face tallies, exact buffer maxima for
//! the scratch spaces, the block→cell CSR map, the active basis-function
//! numbering, and the block-local DOF numbering of coarse faces. It lives
//! for the duration of a single [`construct`](crate::coarse::builder::construct)
//! call and is dropped at its end.
//!
//! The `loc_fno` scratch (local fine-face numbering of the coarse face
//! currently being assembled) is owned here rather than shared globally;
//! it must read all-`None` between coarse faces.

use itertools::Itertools;

use crate::coarse::topology::CoarseTopology;
use crate::grid::Grid;
use crate::partition::{BlockCells, Partition};

/// Summary counts and numberings derived from grid + partition + topology.
#[derive(Clone, Debug)]
pub struct CoarseSysMeta {
    /// Largest per-cell face count, `max(diff(cell_facepos))`.
    pub max_ngconn: usize,
    /// `sum(diff(cell_facepos)^2)`; size of the packed fine-scale Binv.
    pub sum_ngconn2: usize,
    /// Largest number of cells in any block.
    pub max_blk_cells: usize,
    /// Largest number of half-faces in any block.
    pub max_blk_nhf: usize,
    /// Largest number of block-interior fine faces in any block.
    pub max_blk_nintf: usize,
    /// `max_b sum_{c in b} ncf(c)^2`; bounds one block's share of Binv.
    pub max_blk_sum_nhf2: usize,
    /// Largest number of fine faces in any coarse face.
    pub max_cf_nf: usize,
    /// Number of active basis functions (coarse faces with two real blocks).
    pub n_act_bf: usize,
    /// Half-faces per block.
    pub blk_nhf: Vec<usize>,
    /// Block-interior fine faces per block.
    pub blk_nintf: Vec<usize>,
    /// Face count per cell, `diff(cell_facepos)`.
    pub ncf: Vec<usize>,
    /// `cumsum([0; ncf.^2])`; offsets of per-cell Binv blocks.
    pub pconn2: Vec<usize>,
    /// Per-coarse-face local fine-face numbering scratch.
    pub loc_fno: Vec<Option<u32>>,
    /// Block→cell CSR map.
    pub block_cells: BlockCells,
    /// Active basis-function id per coarse face, `None` if inactive.
    pub bfno: Vec<Option<u32>>,
    /// Block-local DOF number of a coarse face, per adjacent block slot.
    pub loc_dofno: Vec<[Option<u32>; 2]>,
}

impl CoarseSysMeta {
    /// Build the summary for one construction pass.
    pub fn construct(grid: &Grid, partition: &Partition, topology: &CoarseTopology) -> Self {
        let nb = topology.num_blocks();
        let nc = grid.num_cells();

        let mut blk_nhf = vec![0usize; nb];
        let mut blk_nintf = vec![0usize; nb];
        for f in 0..grid.num_faces() {
            let [c1, c2] = grid.face_cells(f);
            let b1 = c1.map(|c| partition.block_of(c as usize));
            let b2 = c2.map(|c| partition.block_of(c as usize));
            if let (Some(b1), Some(b2)) = (b1, b2)
                && b1 == b2
            {
                blk_nintf[b1] += 1;
            }
            if let Some(b) = b1 {
                blk_nhf[b] += 1;
            }
            if let Some(b) = b2 {
                blk_nhf[b] += 1;
            }
        }
        let max_blk_nhf = blk_nhf.iter().copied().max().unwrap_or(0);
        let max_blk_nintf = blk_nintf.iter().copied().max().unwrap_or(0);

        let max_cf_nf = topology
            .subfacepos()
            .iter()
            .tuple_windows()
            .map(|(a, b)| b - a)
            .max()
            .unwrap_or(0);

        let mut ncf = Vec::with_capacity(nc);
        let mut pconn2 = Vec::with_capacity(nc + 1);
        pconn2.push(0);
        let mut max_ngconn = 0usize;
        let mut sum_ngconn2 = 0usize;
        for (a, b) in grid.cell_facepos().iter().tuple_windows() {
            let n = b - a;
            max_ngconn = max_ngconn.max(n);
            sum_ngconn2 += n * n;
            ncf.push(n);
            pconn2.push(pconn2.last().expect("seeded") + n * n);
        }

        let block_cells = partition.invert();
        let max_blk_cells = block_cells.max_block_size();

        let max_blk_sum_nhf2 = (0..nb)
            .map(|b| {
                block_cells
                    .cells_of(b)
                    .iter()
                    .map(|&c| pconn2[c + 1] - pconn2[c])
                    .sum()
            })
            .max()
            .unwrap_or(0);

        let mut meta = Self {
            max_ngconn,
            sum_ngconn2,
            max_blk_cells,
            max_blk_nhf,
            max_blk_nintf,
            max_blk_sum_nhf2,
            max_cf_nf,
            n_act_bf: 0,
            blk_nhf,
            blk_nintf,
            ncf,
            pconn2,
            loc_fno: vec![None; grid.num_faces()],
            block_cells,
            bfno: vec![None; topology.num_faces()],
            loc_dofno: vec![[None, None]; topology.num_faces()],
        };
        meta.n_act_bf = meta.enumerate_active_bf(topology);
        meta.compute_loc_dofno(topology);
        meta
    }

    /// Enumerate active basis functions by block proximity.
    ///
    /// A coarse face carries a basis function iff both of its adjacent
    /// blocks are real. Ids are assigned in first-visitation order of the
    /// per-block face traversal, so each qualifying face gets exactly one
    /// id regardless of which side visits it first.
    fn enumerate_active_bf(&mut self, topology: &CoarseTopology) -> usize {
        let mut act = 0u32;
        for b in 0..topology.num_blocks() {
            for &cf in topology.faces_of(b) {
                if self.bfno[cf].is_none() {
                    let [n1, n2] = topology.neighbours(cf);
                    debug_assert_ne!(n1, n2);
                    if n1.is_some() && n2.is_some() {
                        self.bfno[cf] = Some(act);
                        act += 1;
                    }
                }
            }
        }
        act as usize
    }

    /// Assign each block a 0-based local numbering of its active coarse
    /// faces, in visitation order.
    fn compute_loc_dofno(&mut self, topology: &CoarseTopology) {
        for b in 0..topology.num_blocks() {
            let mut locno = 0u32;
            for &cf in topology.faces_of(b) {
                if self.bfno[cf].is_some() {
                    let slot = usize::from(topology.neighbours(cf)[0] != Some(b as u32));
                    debug_assert!(self.loc_dofno[cf][slot].is_none());
                    self.loc_dofno[cf][slot] = Some(locno);
                    locno += 1;
                }
            }
        }
    }

    /// Number of active coarse-face DOFs of block `b`.
    pub fn block_num_dofs(&self, topology: &CoarseTopology, b: usize) -> usize {
        topology
            .faces_of(b)
            .iter()
            .filter(|&&cf| self.bfno[cf].is_some())
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(nx: usize, blocks: Vec<usize>) -> (Grid, Partition, CoarseTopology) {
        let g = Grid::cartesian(nx, 1, 1, [1.0, 1.0, 1.0]).unwrap();
        let p = Partition::new(blocks).unwrap();
        let ct = CoarseTopology::create(&g, &p).unwrap();
        (g, p, ct)
    }

    #[test]
    fn counts_on_two_cell_bar() {
        let (g, p, ct) = bar(2, vec![0, 1]);
        let m = CoarseSysMeta::construct(&g, &p, &ct);
        assert_eq!(m.max_ngconn, 6);
        assert_eq!(m.sum_ngconn2, 72);
        assert_eq!(m.blk_nhf, vec![6, 6]);
        assert_eq!(m.blk_nintf, vec![0, 0]);
        assert_eq!(m.max_blk_cells, 1);
        assert_eq!(m.pconn2, vec![0, 36, 72]);
        assert_eq!(m.n_act_bf, 1);
    }

    #[test]
    fn all_interior_topology_numbers_every_face() {
        // 4 cells in a row, 4 singleton blocks: 3 interior coarse faces,
        // all active; exterior faces inactive.
        let (g, p, ct) = bar(4, vec![0, 1, 2, 3]);
        let m = CoarseSysMeta::construct(&g, &p, &ct);
        assert_eq!(m.n_act_bf, 3);
        let mut assigned: Vec<u32> = m.bfno.iter().flatten().copied().collect();
        assigned.sort_unstable();
        assert_eq!(assigned, vec![0, 1, 2]);
        for cf in 0..ct.num_faces() {
            let active = ct.neighbours(cf).iter().all(Option::is_some);
            assert_eq!(m.bfno[cf].is_some(), active);
        }
    }

    #[test]
    fn single_block_has_no_active_bf() {
        let (g, p, ct) = bar(3, vec![0, 0, 0]);
        let m = CoarseSysMeta::construct(&g, &p, &ct);
        assert_eq!(m.n_act_bf, 0);
        assert!(m.bfno.iter().all(Option::is_none));
        assert_eq!(m.blk_nintf, vec![2]);
    }

    #[test]
    fn local_dof_numbering_is_per_block_and_dense() {
        let (g, p, ct) = bar(3, vec![0, 1, 2]);
        let m = CoarseSysMeta::construct(&g, &p, &ct);
        // Middle block sees two active faces, numbered 0 and 1 locally.
        assert_eq!(m.block_num_dofs(&ct, 1), 2);
        let mut middle: Vec<u32> = (0..ct.num_faces())
            .filter(|&cf| {
                ct.neighbours(cf)
                    .iter()
                    .flatten()
                    .any(|&b| b == 1)
                    && m.bfno[cf].is_some()
            })
            .map(|cf| {
                let slot = usize::from(ct.neighbours(cf)[0] != Some(1));
                m.loc_dofno[cf][slot].unwrap()
            })
            .collect();
        middle.sort_unstable();
        assert_eq!(middle, vec![0, 1]);
    }
}
