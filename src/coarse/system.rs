//! Coarse-system storage: basis functions, cell inner products, block `Binv`.
//!
//! [`CoarseSys`] holds the product of a multiscale construction in four
//! packed arrays, each addressed through a per-block offset table:
//!
//! - `blkdof` — the active basis functions of each block, in block-local
//!   DOF order;
//! - `basis` — the basis-function half-face fluxes, one column of length
//!   `blk_nhf[b]` per block DOF; cells appear in block→cell order and the
//!   faces of each cell in `cell_facepos` order;
//! - `cell_ip` — per fine cell, the `nbf × nbf` restriction of the mimetic
//!   inner product to the block's basis fluxes, packed upper triangular
//!   (column major: entry `(i1, i2)`, `i1 ≤ i2`, at `i2(i2+1)/2 + i1`);
//! - `binv` — per block, the dense `nbf × nbf` inverse coarse inner
//!   product.
//!
//! `cell_ip` is mobility independent by construction; only
//! [`compute_binv`](CoarseSys::compute_binv) needs rerunning when total
//! mobility changes, which is what makes the multiscale method cheap in a
//! time-stepping loop.

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::coarse::meta::CoarseSysMeta;
use crate::coarse::topology::CoarseTopology;
use crate::error::{Error, Result};
use crate::partition::BlockCells;

/// Packed multiscale basis functions and coarse inner products.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CoarseSys {
    blkdof_pos: Vec<usize>,
    blkdof: Vec<usize>,
    basis_pos: Vec<usize>,
    basis: Vec<f64>,
    cell_ip_pos: Vec<usize>,
    cell_ip: Vec<f64>,
    binv_pos: Vec<usize>,
    binv: Vec<f64>,
}

/// Number of packed upper-triangular entries of an `n × n` block.
#[inline]
pub(crate) fn num_pairs(n: usize) -> usize {
    n * (n + 1) / 2
}

/// Pack the upper triangle of a symmetric matrix, column major.
pub(crate) fn pack_upper(a: &DMatrix<f64>, out: &mut [f64]) {
    let n = a.nrows();
    debug_assert!(out.len() >= num_pairs(n));
    let mut k = 0;
    for i2 in 0..n {
        for i1 in 0..=i2 {
            out[k] = a[(i1, i2)];
            k += 1;
        }
    }
}

/// Expand a packed upper triangle back into a full symmetric matrix.
pub(crate) fn unpack_symmetric(packed: &[f64], n: usize) -> DMatrix<f64> {
    debug_assert!(packed.len() >= num_pairs(n));
    let mut a = DMatrix::zeros(n, n);
    let mut k = 0;
    for i2 in 0..n {
        for i1 in 0..=i2 {
            a[(i1, i2)] = packed[k];
            a[(i2, i1)] = packed[k];
            k += 1;
        }
    }
    a
}

/// Reusable scratch for [`CoarseSys::compute_binv`].
#[derive(Clone, Debug)]
pub struct BinvWorkspace {
    lti: Vec<f64>,
}

impl BinvWorkspace {
    /// Scratch sized for blocks of at most `max_bf` basis functions.
    pub fn new(max_bf: usize) -> Self {
        Self {
            lti: vec![0.0; num_pairs(max_bf)],
        }
    }
}

impl CoarseSys {
    /// Allocate zeroed storage sized exactly from the construction metadata
    /// and record each block's DOF list.
    pub fn allocate(topology: &CoarseTopology, meta: &CoarseSysMeta) -> Self {
        let nb = topology.num_blocks();

        let mut blkdof_pos = Vec::with_capacity(nb + 1);
        let mut blkdof = Vec::new();
        let mut basis_pos = Vec::with_capacity(nb + 1);
        let mut cell_ip_pos = Vec::with_capacity(nb + 1);
        let mut binv_pos = Vec::with_capacity(nb + 1);
        blkdof_pos.push(0);
        basis_pos.push(0);
        cell_ip_pos.push(0);
        binv_pos.push(0);

        let mut bf_asz = 0usize;
        let mut ip_asz = 0usize;
        let mut binv_asz = 0usize;
        for b in 0..nb {
            for &cf in topology.faces_of(b) {
                if let Some(bf) = meta.bfno[cf] {
                    blkdof.push(bf as usize);
                }
            }
            blkdof_pos.push(blkdof.len());

            let nf = blkdof_pos[b + 1] - blkdof_pos[b];
            let ncells = meta.block_cells.cells_of(b).len();
            bf_asz += nf * meta.blk_nhf[b];
            ip_asz += num_pairs(nf) * ncells;
            binv_asz += nf * nf;
            basis_pos.push(bf_asz);
            cell_ip_pos.push(ip_asz);
            binv_pos.push(binv_asz);
        }

        Self {
            blkdof_pos,
            blkdof,
            basis_pos,
            basis: vec![0.0; bf_asz],
            cell_ip_pos,
            cell_ip: vec![0.0; ip_asz],
            binv_pos,
            binv: vec![0.0; binv_asz],
        }
    }

    /// Number of coarse blocks.
    #[inline]
    pub fn num_blocks(&self) -> usize {
        self.blkdof_pos.len() - 1
    }

    /// Active basis-function ids of block `b`, in local DOF order.
    #[inline]
    pub fn block_dofs(&self, b: usize) -> &[usize] {
        &self.blkdof[self.blkdof_pos[b]..self.blkdof_pos[b + 1]]
    }

    /// All of block `b`'s basis columns, concatenated.
    #[inline]
    pub fn basis_of(&self, b: usize) -> &[f64] {
        &self.basis[self.basis_pos[b]..self.basis_pos[b + 1]]
    }

    /// Basis column of block `b`'s local DOF `l` (one flux per block
    /// half-face). Empty for a block with no active basis functions.
    pub fn basis_column(&self, b: usize, l: usize) -> &[f64] {
        let ndof = self.block_dofs(b).len();
        if ndof == 0 {
            return &[];
        }
        let nhf = (self.basis_pos[b + 1] - self.basis_pos[b]) / ndof;
        let lo = self.basis_pos[b] + l * nhf;
        &self.basis[lo..lo + nhf]
    }

    pub(crate) fn basis_column_mut(&mut self, b: usize, l: usize, nhf: usize) -> &mut [f64] {
        let lo = self.basis_pos[b] + l * nhf;
        &mut self.basis[lo..lo + nhf]
    }

    /// Packed per-cell inner products of block `b`.
    #[inline]
    pub fn cell_ip_of(&self, b: usize) -> &[f64] {
        &self.cell_ip[self.cell_ip_pos[b]..self.cell_ip_pos[b + 1]]
    }

    /// Dense row-major inverse coarse inner product of block `b`.
    #[inline]
    pub fn binv_of(&self, b: usize) -> &[f64] {
        &self.binv[self.binv_pos[b]..self.binv_pos[b + 1]]
    }

    /// Largest per-block basis-function count.
    pub fn max_block_dofs(&self) -> usize {
        (0..self.num_blocks())
            .map(|b| self.block_dofs(b).len())
            .max()
            .unwrap_or(0)
    }

    /// Project the fine-scale inner product onto the basis fluxes, cell by
    /// cell.
    ///
    /// For each block cell, gathers the basis columns restricted to the
    /// cell's half-faces into `Ψ`, solves `Binv_c X = Ψ` by Cholesky, and
    /// stores `ΨᵀX` packed. `binv` is the mobility-scaled fine-scale inverse
    /// inner product in `pconn2` layout; the per-cell result is weighted
    /// back by the construction mobility afterwards, keeping the stored
    /// products mobility independent.
    ///
    /// # Errors
    /// Returns [`Error::NonPositiveDefiniteCell`] if a cell's `Binv` block
    /// fails to factor.
    pub fn compute_cell_ip(
        &mut self,
        meta: &CoarseSysMeta,
        binv: &[f64],
        totmob: &[f64],
    ) -> Result<()> {
        for b in 0..self.num_blocks() {
            let nbf = self.block_dofs(b).len();
            if nbf == 0 {
                continue;
            }
            let npairs = num_pairs(nbf);
            let nhf = meta.blk_nhf[b];

            let mut bf_off = 0usize;
            for (i, &c) in meta.block_cells.cells_of(b).iter().enumerate() {
                let n = meta.ncf[c];
                let block = DMatrix::from_row_slice(
                    n,
                    n,
                    &binv[meta.pconn2[c]..meta.pconn2[c + 1]],
                );
                let chol = block
                    .cholesky()
                    .ok_or(Error::NonPositiveDefiniteCell { cell: c })?;

                let mut psi = DMatrix::zeros(n, nbf);
                for l in 0..nbf {
                    let col = &self.basis[self.basis_pos[b] + l * nhf..];
                    for r in 0..n {
                        psi[(r, l)] = col[bf_off + r];
                    }
                }
                let x = chol.solve(&psi);
                // The scaled Binv is λ_c times the unit-mobility one, so the
                // projected product comes out divided by λ_c; scale it back.
                let ip = psi.transpose() * x * totmob[c];

                let lo = self.cell_ip_pos[b] + i * npairs;
                pack_upper(&ip, &mut self.cell_ip[lo..lo + npairs]);
                bf_off += n;
            }
            debug_assert_eq!(bf_off, nhf);
        }
        Ok(())
    }

    /// Assemble and invert each block's coarse inner product for the given
    /// total mobility field.
    ///
    /// Accumulates `∑_{c ∈ b} IP_c / λ_c` in packed form, expands, and
    /// inverts by Cholesky. Cheap relative to basis construction; call it
    /// again whenever mobility changes.
    ///
    /// # Errors
    /// Returns [`Error::NonPositiveDefiniteBlock`] if a block's accumulated
    /// inner product fails to factor.
    pub fn compute_binv(
        &mut self,
        block_cells: &BlockCells,
        totmob: &[f64],
        work: &mut BinvWorkspace,
    ) -> Result<()> {
        for b in 0..self.num_blocks() {
            let nbf = self.block_dofs(b).len();
            if nbf == 0 {
                continue;
            }
            let npairs = num_pairs(nbf);
            let lti = &mut work.lti[..npairs];
            lti.fill(0.0);

            let ip = &self.cell_ip[self.cell_ip_pos[b]..self.cell_ip_pos[b + 1]];
            for (i, &c) in block_cells.cells_of(b).iter().enumerate() {
                let cell = &ip[i * npairs..(i + 1) * npairs];
                let w = 1.0 / totmob[c];
                for (acc, &v) in lti.iter_mut().zip(cell) {
                    *acc += w * v;
                }
            }

            let a = unpack_symmetric(lti, nbf);
            let inv = a
                .cholesky()
                .ok_or(Error::NonPositiveDefiniteBlock { block: b })?
                .inverse();
            let out = &mut self.binv[self.binv_pos[b]..self.binv_pos[b + 1]];
            for i in 0..nbf {
                for j in 0..nbf {
                    out[i * nbf + j] = inv[(i, j)];
                }
            }
        }
        Ok(())
    }
}
