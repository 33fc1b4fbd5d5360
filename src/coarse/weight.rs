//! Basis-function source weighting.
//!
//! Each basis function is driven by a synthetic source distribution: one
//! scalar weight per fine cell, positive, integrating to exactly one over
//! every block. The default weight is the trace of the cell's permeability
//! tensor times its volume; cells with a prescribed external source
//! override the synthetic weight for their entire block (the block's other
//! weights are zeroed first, then the raw source magnitudes are copied in).

use crate::error::{Error, Result};
use crate::grid::Grid;
use crate::partition::{BlockCells, Partition};

/// Unsigned per-cell weight, `tr(K_c) · |c|`.
fn perm_weighting(grid: &Grid, perm: &[f64]) -> Vec<f64> {
    let d = grid.dim();
    (0..grid.num_cells())
        .map(|c| {
            let k = &perm[c * d * d..(c + 1) * d * d];
            let trace: f64 = (0..d).map(|i| k[i * (d + 1)]).sum();
            trace * grid.cell_volume(c)
        })
        .collect()
}

/// Replace synthetic weights by prescribed sources where present.
fn enforce_explicit_source(
    partition: &Partition,
    block_cells: &BlockCells,
    src: &[f64],
    w: &mut [f64],
) {
    let nb = partition.num_blocks();
    let mut has_src = vec![false; nb];
    for (c, &s) in src.iter().enumerate() {
        if s.abs() > 0.0 {
            has_src[partition.block_of(c)] = true;
        }
    }
    for b in 0..nb {
        if has_src[b] {
            for &c in block_cells.cells_of(b) {
                w[c] = 0.0;
            }
        }
    }
    for (c, &s) in src.iter().enumerate() {
        if s.abs() > 0.0 {
            w[c] = s;
        }
    }
}

/// Scale weights so each block integrates to one.
fn normalize_weighting(partition: &Partition, w: &mut [f64]) -> Result<()> {
    let mut bw = vec![0.0f64; partition.num_blocks()];
    for (c, &wc) in w.iter().enumerate() {
        bw[partition.block_of(c)] += wc;
    }
    if let Some(block) = bw.iter().position(|&s| s.abs() == 0.0) {
        return Err(Error::ZeroBlockWeight { block });
    }
    for (c, wc) in w.iter_mut().enumerate() {
        *wc /= bw[partition.block_of(c)];
    }
    Ok(())
}

/// Compute the basis-function weighting term, one scalar per fine cell.
///
/// Satisfies `∑_{c ∈ b} w[c] == 1` for every block `b`.
///
/// # Errors
/// Returns [`Error::ZeroBlockWeight`] if a block's weights (after any
/// explicit-source override) sum to zero — e.g. a block whose sources
/// cancel exactly.
pub fn coarse_weight(
    grid: &Grid,
    partition: &Partition,
    block_cells: &BlockCells,
    perm: &[f64],
    src: &[f64],
) -> Result<Vec<f64>> {
    let mut w = perm_weighting(grid, perm);
    enforce_explicit_source(partition, block_cells, src, &mut w);
    normalize_weighting(partition, &mut w)?;
    Ok(w)
}
