//! Coarse-grid topology derived from a fine grid and a partition.
//!
//! A *coarse face* is the union of fine faces separating two distinct
//! coarse blocks (or one block from the exterior). [`CoarseTopology`]
//! stores, in CSR form, which coarse faces touch each block
//! (`blkfacepos`/`blkfaces`) and which fine faces constitute each coarse
//! face (`subfacepos`/`subfaces`), plus the two block neighbours of every
//! coarse face.
//!
//! Construction sweeps the fine face-neighbour list once into a
//! [`BlockAdjacency`], then emits coarse faces by an in-order sweep of the
//! sorted adjacency lists. Coarse face ids are therefore deterministic:
//! ascending in `(owning block, neighbour)`, exterior connections last
//! within each block.

use serde::{Deserialize, Serialize};

use crate::coarse::adjacency::BlockAdjacency;
use crate::error::{Error, Result};
use crate::grid::Grid;
use crate::partition::Partition;

/// Block-face and face-block incidence of the coarse grid.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CoarseTopology {
    nblocks: usize,
    /// Two block neighbours per coarse face; `None` marks the exterior.
    neighbours: Vec<[Option<u32>; 2]>,
    blkfacepos: Vec<usize>,
    blkfaces: Vec<usize>,
    subfacepos: Vec<usize>,
    subfaces: Vec<usize>,
}

impl CoarseTopology {
    /// Derive the coarse topology of `partition` over `grid`.
    ///
    /// # Errors
    /// Returns [`Error::ArrayLength`] if the partition does not cover the
    /// grid's cells.
    pub fn create(grid: &Grid, partition: &Partition) -> Result<Self> {
        if partition.num_cells() != grid.num_cells() {
            return Err(Error::ArrayLength {
                array: "partition",
                expected: grid.num_cells(),
                found: partition.num_cells(),
            });
        }

        let nb = partition.num_blocks();
        let expected_nconn = grid.num_faces() / nb + 1;

        let mut adj = BlockAdjacency::new(nb);
        for f in 0..grid.num_faces() {
            let [c1, c2] = grid.face_cells(f);
            let b1 = c1.map(|c| partition.block_of(c as usize));
            let b2 = c2.map(|c| partition.block_of(c as usize));
            match (b1, b2) {
                (Some(b1), Some(b2)) if b1 != b2 => {
                    adj.insert(b1.min(b2), b1.max(b2), f as u32, expected_nconn);
                }
                (Some(_), Some(_)) => {} // block-interior fine face
                (Some(b), None) | (None, Some(b)) => {
                    adj.insert(b, BlockAdjacency::EXTERIOR, f as u32, expected_nconn);
                }
                (None, None) => unreachable!("face without neighbours rejected by Grid::new"),
            }
        }

        // Emit coarse faces in (owner, neighbour) order. Interior pairs are
        // stored once, keyed by the smaller block id.
        let mut neighbours = Vec::new();
        let mut subfacepos = vec![0usize];
        let mut subfaces = Vec::new();
        for b in 0..nb {
            for conn in adj.neighbours_of(b).iter() {
                let other = if conn.block == BlockAdjacency::EXTERIOR {
                    None
                } else {
                    debug_assert!(conn.block > b, "interior pairs keyed by smaller block");
                    Some(conn.block as u32)
                };
                neighbours.push([Some(b as u32), other]);
                subfaces.extend(conn.faces.sorted().into_iter().map(|f| f as usize));
                subfacepos.push(subfaces.len());
            }
        }
        let ncf = neighbours.len();

        // Block→coarse-face CSR via counting sort; each block's list ends up
        // ascending in coarse-face id.
        let mut blkfacepos = vec![0usize; nb + 1];
        for nbr in &neighbours {
            for b in nbr.iter().flatten() {
                blkfacepos[*b as usize + 1] += 1;
            }
        }
        for b in 0..nb {
            blkfacepos[b + 1] += blkfacepos[b];
        }
        let mut blkfaces = vec![0usize; blkfacepos[nb]];
        let mut cursor = blkfacepos.clone();
        for (cf, nbr) in neighbours.iter().enumerate() {
            for b in nbr.iter().flatten() {
                blkfaces[cursor[*b as usize]] = cf;
                cursor[*b as usize] += 1;
            }
        }

        log::debug!(
            "coarse topology: {nb} blocks, {ncf} coarse faces, {} fine subfaces",
            subfaces.len()
        );

        Ok(Self {
            nblocks: nb,
            neighbours,
            blkfacepos,
            blkfaces,
            subfacepos,
            subfaces,
        })
    }

    /// Number of coarse blocks.
    #[inline]
    pub fn num_blocks(&self) -> usize {
        self.nblocks
    }

    /// Number of coarse faces.
    #[inline]
    pub fn num_faces(&self) -> usize {
        self.neighbours.len()
    }

    /// Block neighbours of coarse face `cf`; `None` marks the exterior.
    #[inline]
    pub fn neighbours(&self, cf: usize) -> [Option<u32>; 2] {
        self.neighbours[cf]
    }

    /// Coarse faces incident to block `b`, ascending.
    #[inline]
    pub fn faces_of(&self, b: usize) -> &[usize] {
        &self.blkfaces[self.blkfacepos[b]..self.blkfacepos[b + 1]]
    }

    /// CSR offsets of the block→coarse-face map.
    #[inline]
    pub fn blkfacepos(&self) -> &[usize] {
        &self.blkfacepos
    }

    /// Fine faces constituting coarse face `cf`, ascending.
    #[inline]
    pub fn sub_faces(&self, cf: usize) -> &[usize] {
        &self.subfaces[self.subfacepos[cf]..self.subfacepos[cf + 1]]
    }

    /// CSR offsets of the coarse-face→fine-face map (used for sizing).
    #[inline]
    pub fn subfacepos(&self) -> &[usize] {
        &self.subfacepos
    }
}
