//! Two-point flux transmissibilities.
//!
//! A cheap companion to the mimetic inner product: per half-face,
//! `t = (K n̂) · d / |d|²` with `d` the cell-to-face centroid vector and
//! `n̂` the outward area-scaled normal; per face, the harmonic average of
//! its two half-face values. Used for quick fine-scale reference solves
//! and for sanity-checking mobility fields before a multiscale run.

use crate::error::{Error, Result};
use crate::grid::Grid;

/// Half-face transmissibilities, one per `(cell, face)` pair, laid out by
/// `cell_facepos`.
///
/// # Errors
/// Returns [`Error::ArrayLength`] if `perm` does not hold one row-major
/// `d × d` tensor per cell.
pub fn half_trans(grid: &Grid, perm: &[f64]) -> Result<Vec<f64>> {
    let d = grid.dim();
    let nc = grid.num_cells();
    if perm.len() != nc * d * d {
        return Err(Error::ArrayLength {
            array: "perm",
            expected: nc * d * d,
            found: perm.len(),
        });
    }

    let mut t = vec![0.0; grid.num_half_faces()];
    for c in 0..nc {
        let k = &perm[c * d * d..(c + 1) * d * d];
        let cc = grid.cell_centroid(c);
        let p1 = grid.cell_facepos()[c];
        for (i, &f) in grid.faces_of(c).iter().enumerate() {
            let sgn = grid.outward_sign(c, f);
            let normal = grid.face_normal(f);
            let fc = grid.face_centroid(f);
            let mut num = 0.0;
            let mut dd = 0.0;
            for r in 0..d {
                let dr = fc[r] - cc[r];
                dd += dr * dr;
                let kn: f64 = (0..d).map(|s| k[r * d + s] * sgn * normal[s]).sum();
                num += kn * dr;
            }
            t[p1 + i] = num / dd;
        }
    }
    Ok(t)
}

/// Face transmissibilities: harmonic average of the two half-face values,
/// the single half-face value on the boundary.
pub fn face_trans(grid: &Grid, htrans: &[f64]) -> Result<Vec<f64>> {
    if htrans.len() != grid.num_half_faces() {
        return Err(Error::ArrayLength {
            array: "htrans",
            expected: grid.num_half_faces(),
            found: htrans.len(),
        });
    }

    // Sum reciprocals per face, then invert.
    let mut acc = vec![0.0f64; grid.num_faces()];
    for c in 0..grid.num_cells() {
        let p1 = grid.cell_facepos()[c];
        for (i, &f) in grid.faces_of(c).iter().enumerate() {
            acc[f] += 1.0 / htrans[p1 + i];
        }
    }
    Ok(acc.into_iter().map(|s| 1.0 / s).collect())
}
