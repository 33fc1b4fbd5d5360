//! Shared helpers for the integration tests.
#![allow(dead_code)]

use msmfem::prelude::*;

/// Row-major isotropic permeability tensors, `k · I₃` per cell.
pub fn iso_perm(nc: usize, k: f64) -> Vec<f64> {
    let mut perm = vec![0.0; nc * 9];
    for c in 0..nc {
        for i in 0..3 {
            perm[c * 9 + i * 4] = k;
        }
    }
    perm
}

/// `nx × ny` sheet of unit cells partitioned into `bx × by` blocks.
pub fn blocked_sheet(nx: usize, ny: usize, bx: usize, by: usize) -> (Grid, Partition) {
    let g = Grid::cartesian(nx, ny, 1, [1.0, 1.0, 1.0]).unwrap();
    let cx = nx / bx;
    let cy = ny / by;
    let part: Vec<usize> = (0..nx * ny)
        .map(|c| {
            let i = c % nx;
            let j = c / nx;
            (j / cy) * bx + i / cx
        })
        .collect();
    (g, Partition::new(part).unwrap())
}
