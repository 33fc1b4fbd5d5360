//! Coarse-block adjacency built from fine-face connections.
//!
//! While scanning the fine grid's face-neighbour pairs, every fine face
//! whose two cells land in different coarse blocks contributes one directed
//! connection `(block, neighbour)`. [`BlockNeighbours`] keeps a block's
//! connections sorted by neighbour id (binary-search insertion, geometric
//! growth) and tracks the constituent fine faces of each connection in a
//! [`FaceSet`], so the same fine face offered twice is counted once.
//!
//! The sorted order is load-bearing: coarse faces are later emitted by an
//! in-order sweep of these lists, which makes coarse-face numbering
//! deterministic for a given grid and partition.

use serde::{Deserialize, Serialize};

use crate::coarse::face_set::FaceSet;

/// One coarse connection: a neighbouring block and its fine faces.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BlockNeighbour {
    /// Neighbouring block id ([`BlockAdjacency::EXTERIOR`] for the boundary).
    pub block: usize,
    /// Distinct fine faces realizing this connection.
    pub faces: FaceSet,
}

/// Adjacency list of a single block, sorted by neighbour id.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct BlockNeighbours {
    neighbours: Vec<BlockNeighbour>,
}

impl BlockNeighbours {
    /// Record fine face `fine_face` on the connection towards `block`.
    ///
    /// A connection seen for the first time allocates its face set with room
    /// for `expected_nconn` fine faces.
    pub fn insert(&mut self, block: usize, fine_face: u32, expected_nconn: usize) {
        match self.neighbours.binary_search_by_key(&block, |n| n.block) {
            Ok(i) => self.neighbours[i].faces.insert(fine_face),
            Err(i) => {
                let mut faces = FaceSet::with_capacity(expected_nconn);
                faces.insert(fine_face);
                self.neighbours.insert(i, BlockNeighbour { block, faces });
            }
        }
    }

    /// Number of distinct neighbours.
    #[inline]
    pub fn len(&self) -> usize {
        self.neighbours.len()
    }

    /// Whether the block has no recorded connections.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.neighbours.is_empty()
    }

    /// Connections in ascending neighbour order.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &BlockNeighbour> {
        self.neighbours.iter()
    }

    /// Connection towards `block`, if recorded.
    pub fn get(&self, block: usize) -> Option<&BlockNeighbour> {
        self.neighbours
            .binary_search_by_key(&block, |n| n.block)
            .ok()
            .map(|i| &self.neighbours[i])
    }
}

/// Per-block adjacency lists for the whole coarse grid.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BlockAdjacency {
    blocks: Vec<BlockNeighbours>,
}

impl BlockAdjacency {
    /// Pseudo-neighbour id representing the exterior of the domain.
    ///
    /// Sorts after every real block id, so exterior connections come last in
    /// each adjacency list.
    pub const EXTERIOR: usize = usize::MAX;

    /// Empty adjacency for `num_blocks` blocks.
    pub fn new(num_blocks: usize) -> Self {
        Self {
            blocks: vec![BlockNeighbours::default(); num_blocks],
        }
    }

    /// Number of blocks.
    #[inline]
    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    /// Record `fine_face` on the connection `block` → `neighbour`.
    #[inline]
    pub fn insert(
        &mut self,
        block: usize,
        neighbour: usize,
        fine_face: u32,
        expected_nconn: usize,
    ) {
        self.blocks[block].insert(neighbour, fine_face, expected_nconn);
    }

    /// Adjacency list of `block`.
    #[inline]
    pub fn neighbours_of(&self, block: usize) -> &BlockNeighbours {
        &self.blocks[block]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neighbours_stay_sorted_and_distinct() {
        let mut bns = BlockNeighbours::default();
        for (nb, f) in [(5, 10), (2, 11), (9, 12), (2, 13), (5, 10), (0, 14)] {
            bns.insert(nb, f, 4);
        }
        let ids: Vec<usize> = bns.iter().map(|n| n.block).collect();
        assert_eq!(ids, vec![0, 2, 5, 9]);
        assert_eq!(bns.get(2).unwrap().faces.sorted(), vec![11, 13]);
        // Duplicate (5, 10) counted once.
        assert_eq!(bns.get(5).unwrap().faces.len(), 1);
        assert!(bns.get(7).is_none());
    }

    #[test]
    fn adjacency_tracks_per_pair_faces() {
        let mut adj = BlockAdjacency::new(3);
        adj.insert(0, 1, 100, 2);
        adj.insert(0, 1, 101, 2);
        adj.insert(0, 1, 100, 2);
        adj.insert(1, 0, 100, 2);
        adj.insert(2, BlockAdjacency::EXTERIOR, 7, 1);

        assert_eq!(adj.neighbours_of(0).get(1).unwrap().faces.len(), 2);
        assert_eq!(adj.neighbours_of(1).get(0).unwrap().faces.len(), 1);
        let ext = adj
            .neighbours_of(2)
            .get(BlockAdjacency::EXTERIOR)
            .unwrap();
        assert_eq!(ext.faces.sorted(), vec![7]);
    }
}
