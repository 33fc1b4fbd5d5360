//! Fine-cell → coarse-block partitions.
//!
//! A [`Partition`] is a dense map assigning every fine cell to a coarse
//! block. Block ids must form the contiguous range `[0, num_blocks)` and
//! every block must own at least one cell; both are enforced at
//! construction. [`Partition::invert`] produces the block→cell CSR map
//! (`pb2c`/`b2c`) used throughout the coarse-system construction, via a
//! stable counting sort.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Dense cell→block map with a validated contiguous block range.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Partition {
    blocks: Vec<usize>,
    num_blocks: usize,
}

/// Block→cell CSR map, the inverse of a [`Partition`].
///
/// Cells of block `b` occupy `b2c[pb2c[b]..pb2c[b + 1]]`, in ascending cell
/// order (the counting sort is stable).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BlockCells {
    /// CSR offsets, one entry past the last block.
    pub pb2c: Vec<usize>,
    /// Concatenated cell ids.
    pub b2c: Vec<usize>,
}

impl Partition {
    /// Wrap a raw cell→block array.
    ///
    /// The number of blocks is `max(blocks) + 1`.
    ///
    /// # Errors
    /// Returns [`Error::EmptyPartition`] for an empty array and
    /// [`Error::EmptyBlock`] if some id in `[0, num_blocks)` never occurs.
    pub fn new(blocks: Vec<usize>) -> Result<Self> {
        let num_blocks = match blocks.iter().max() {
            Some(&m) => m + 1,
            None => return Err(Error::EmptyPartition),
        };
        let mut seen = vec![false; num_blocks];
        for &b in &blocks {
            seen[b] = true;
        }
        if let Some(block) = seen.iter().position(|&s| !s) {
            return Err(Error::EmptyBlock { block });
        }
        Ok(Self { blocks, num_blocks })
    }

    /// Number of coarse blocks.
    #[inline]
    pub fn num_blocks(&self) -> usize {
        self.num_blocks
    }

    /// Number of fine cells covered.
    #[inline]
    pub fn num_cells(&self) -> usize {
        self.blocks.len()
    }

    /// Block of cell `c`.
    #[inline]
    pub fn block_of(&self, c: usize) -> usize {
        self.blocks[c]
    }

    /// Raw cell→block array.
    #[inline]
    pub fn as_slice(&self) -> &[usize] {
        &self.blocks
    }

    /// Invert the partition into a block→cell CSR map (stable counting sort).
    pub fn invert(&self) -> BlockCells {
        let nb = self.num_blocks;
        let mut pb2c = vec![0usize; nb + 1];
        for &b in &self.blocks {
            pb2c[b + 1] += 1;
        }
        for b in 0..nb {
            pb2c[b + 1] += pb2c[b];
        }
        let mut b2c = vec![0usize; self.blocks.len()];
        let mut cursor = pb2c.clone();
        for (c, &b) in self.blocks.iter().enumerate() {
            b2c[cursor[b]] = c;
            cursor[b] += 1;
        }
        BlockCells { pb2c, b2c }
    }
}

impl BlockCells {
    /// Cells of block `b`.
    #[inline]
    pub fn cells_of(&self, b: usize) -> &[usize] {
        &self.b2c[self.pb2c[b]..self.pb2c[b + 1]]
    }

    /// Number of cells in block `b`.
    #[inline]
    pub fn block_size(&self, b: usize) -> usize {
        self.pb2c[b + 1] - self.pb2c[b]
    }

    /// Largest block size.
    pub fn max_block_size(&self) -> usize {
        (0..self.pb2c.len() - 1)
            .map(|b| self.block_size(b))
            .max()
            .unwrap_or(0)
    }
}
