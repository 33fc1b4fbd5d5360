//! Fine-scale polyhedral grid view.
//!
//! [`Grid`] is the read-only input of every discretization routine in this
//! crate. It stores cell-face incidence as a CSR map (`cell_facepos` /
//! `cell_faces`), face-to-cell neighbourships, and the geometric quantities
//! (centroids, area-scaled normals, areas, volumes) the mimetic inner
//! product consumes. A *half-face* is one `(cell, incident face)` pair; it
//! is the unit of flux in the hybridized formulation.
//!
//! # Invariants
//!
//! - `cell_facepos` is non-decreasing with `cell_facepos[0] == 0`.
//! - Every face id in `cell_faces` is `< num_faces()`.
//! - Each face has one or two cell neighbours; `face_normals` are scaled by
//!   face area and oriented from the first neighbour towards the second.
//!
//! These are validated once by [`Grid::new`]; hot paths rely on them without
//! re-checking.

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Immutable unstructured grid with CSR cell-face incidence and geometry.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Grid {
    dim: usize,
    cell_facepos: Vec<usize>,
    cell_faces: Vec<usize>,
    face_cells: Vec<[Option<u32>; 2]>,
    face_centroids: Vec<f64>,
    face_normals: Vec<f64>,
    face_areas: Vec<f64>,
    cell_centroids: Vec<f64>,
    cell_volumes: Vec<f64>,
}

impl Grid {
    /// Build a grid from raw arrays, validating the structural invariants.
    ///
    /// # Errors
    /// Returns [`Error::EmptyGrid`] for an empty grid,
    /// [`Error::NonMonotoneOffsets`] for a decreasing `cell_facepos`,
    /// [`Error::IndexOutOfBounds`] for an out-of-range face id, and
    /// [`Error::ArrayLength`] when a geometry array does not match the
    /// cell/face counts.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        dim: usize,
        cell_facepos: Vec<usize>,
        cell_faces: Vec<usize>,
        face_cells: Vec<[Option<u32>; 2]>,
        face_centroids: Vec<f64>,
        face_normals: Vec<f64>,
        face_areas: Vec<f64>,
        cell_centroids: Vec<f64>,
        cell_volumes: Vec<f64>,
    ) -> Result<Self> {
        let nc = cell_facepos.len().saturating_sub(1);
        let nf = face_cells.len();
        if nc == 0 || nf == 0 {
            return Err(Error::EmptyGrid);
        }
        if let Some(position) = cell_facepos
            .iter()
            .tuple_windows()
            .position(|(a, b)| b < a)
        {
            return Err(Error::NonMonotoneOffsets {
                array: "cell_facepos",
                position,
            });
        }
        let nhf = *cell_facepos.last().expect("non-empty offsets");
        if cell_faces.len() != nhf {
            return Err(Error::ArrayLength {
                array: "cell_faces",
                expected: nhf,
                found: cell_faces.len(),
            });
        }
        if let Some(&f) = cell_faces.iter().find(|&&f| f >= nf) {
            return Err(Error::IndexOutOfBounds {
                array: "cell_faces",
                index: f,
                bound: nf,
            });
        }
        check_len("face_centroids", face_centroids.len(), nf * dim)?;
        check_len("face_normals", face_normals.len(), nf * dim)?;
        check_len("face_areas", face_areas.len(), nf)?;
        check_len("cell_centroids", cell_centroids.len(), nc * dim)?;
        check_len("cell_volumes", cell_volumes.len(), nc)?;
        for (f, nb) in face_cells.iter().enumerate() {
            for c in nb.iter().flatten() {
                if *c as usize >= nc {
                    return Err(Error::IndexOutOfBounds {
                        array: "face_cells",
                        index: *c as usize,
                        bound: nc,
                    });
                }
            }
            if nb[0].is_none() && nb[1].is_none() {
                return Err(Error::IndexOutOfBounds {
                    array: "face_cells",
                    index: f,
                    bound: nc,
                });
            }
        }
        Ok(Self {
            dim,
            cell_facepos,
            cell_faces,
            face_cells,
            face_centroids,
            face_normals,
            face_areas,
            cell_centroids,
            cell_volumes,
        })
    }

    /// Spatial dimension (2 or 3).
    #[inline]
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Number of cells.
    #[inline]
    pub fn num_cells(&self) -> usize {
        self.cell_facepos.len() - 1
    }

    /// Number of faces.
    #[inline]
    pub fn num_faces(&self) -> usize {
        self.face_cells.len()
    }

    /// Total number of half-faces, `cell_facepos[num_cells()]`.
    #[inline]
    pub fn num_half_faces(&self) -> usize {
        *self.cell_facepos.last().expect("non-empty offsets")
    }

    /// CSR offsets of the cell-face incidence map.
    #[inline]
    pub fn cell_facepos(&self) -> &[usize] {
        &self.cell_facepos
    }

    /// Concatenated face ids, addressed through [`cell_facepos`](Self::cell_facepos).
    #[inline]
    pub fn cell_faces(&self) -> &[usize] {
        &self.cell_faces
    }

    /// Faces incident to cell `c`.
    #[inline]
    pub fn faces_of(&self, c: usize) -> &[usize] {
        &self.cell_faces[self.cell_facepos[c]..self.cell_facepos[c + 1]]
    }

    /// Number of faces (half-faces) of cell `c`.
    #[inline]
    pub fn num_cell_faces(&self, c: usize) -> usize {
        self.cell_facepos[c + 1] - self.cell_facepos[c]
    }

    /// Cell neighbours of face `f`; `None` marks the exterior.
    #[inline]
    pub fn face_cells(&self, f: usize) -> [Option<u32>; 2] {
        self.face_cells[f]
    }

    /// Sign of the stored normal of `f` as seen outward from cell `c`.
    #[inline]
    pub fn outward_sign(&self, c: usize, f: usize) -> f64 {
        if self.face_cells[f][0] == Some(c as u32) {
            1.0
        } else {
            -1.0
        }
    }

    /// Centroid of face `f`.
    #[inline]
    pub fn face_centroid(&self, f: usize) -> &[f64] {
        &self.face_centroids[f * self.dim..(f + 1) * self.dim]
    }

    /// Area-scaled normal of face `f`, oriented first → second neighbour.
    #[inline]
    pub fn face_normal(&self, f: usize) -> &[f64] {
        &self.face_normals[f * self.dim..(f + 1) * self.dim]
    }

    /// Area of face `f`.
    #[inline]
    pub fn face_area(&self, f: usize) -> f64 {
        self.face_areas[f]
    }

    /// Centroid of cell `c`.
    #[inline]
    pub fn cell_centroid(&self, c: usize) -> &[f64] {
        &self.cell_centroids[c * self.dim..(c + 1) * self.dim]
    }

    /// Volume of cell `c`.
    #[inline]
    pub fn cell_volume(&self, c: usize) -> f64 {
        self.cell_volumes[c]
    }

    /// Largest per-cell face count.
    pub fn max_cell_faces(&self) -> usize {
        self.cell_facepos
            .iter()
            .tuple_windows()
            .map(|(a, b)| b - a)
            .max()
            .unwrap_or(0)
    }

    /// Tensor-product hexahedral grid on `[0, nx·hx] × [0, ny·hy] × [0, nz·hz]`.
    ///
    /// Faces are numbered x-constant first, then y-constant, then z-constant,
    /// each slab in lexicographic `(i, j, k)` order. Intended for tests and
    /// small driver programs; real models arrive through [`Grid::new`].
    pub fn cartesian(nx: usize, ny: usize, nz: usize, h: [f64; 3]) -> Result<Self> {
        let [hx, hy, hz] = h;
        let nc = nx * ny * nz;
        let nfx = (nx + 1) * ny * nz;
        let nfy = nx * (ny + 1) * nz;
        let nfz = nx * ny * (nz + 1);
        let nf = nfx + nfy + nfz;
        let dim = 3;

        let cell = |i: usize, j: usize, k: usize| (k * ny + j) * nx + i;
        let xface = |i: usize, j: usize, k: usize| (k * ny + j) * (nx + 1) + i;
        let yface = |i: usize, j: usize, k: usize| nfx + (k * (ny + 1) + j) * nx + i;
        let zface = |i: usize, j: usize, k: usize| nfx + nfy + (k * ny + j) * nx + i;

        let mut cell_facepos = Vec::with_capacity(nc + 1);
        let mut cell_faces = Vec::with_capacity(6 * nc);
        cell_facepos.push(0);
        for k in 0..nz {
            for j in 0..ny {
                for i in 0..nx {
                    cell_faces.extend_from_slice(&[
                        xface(i, j, k),
                        xface(i + 1, j, k),
                        yface(i, j, k),
                        yface(i, j + 1, k),
                        zface(i, j, k),
                        zface(i, j, k + 1),
                    ]);
                    cell_facepos.push(cell_faces.len());
                }
            }
        }

        let mut face_cells = vec![[None, None]; nf];
        let mut face_centroids = vec![0.0; nf * dim];
        let mut face_normals = vec![0.0; nf * dim];
        let mut face_areas = vec![0.0; nf];

        let ax = hy * hz;
        let ay = hx * hz;
        let az = hx * hy;
        for k in 0..nz {
            for j in 0..ny {
                for i in 0..=nx {
                    let f = xface(i, j, k);
                    face_cells[f] = [
                        (i > 0).then(|| cell(i - 1, j, k) as u32),
                        (i < nx).then(|| cell(i, j, k) as u32),
                    ];
                    face_centroids[f * dim..f * dim + 3].copy_from_slice(&[
                        i as f64 * hx,
                        (j as f64 + 0.5) * hy,
                        (k as f64 + 0.5) * hz,
                    ]);
                    face_normals[f * dim] = ax;
                    face_areas[f] = ax;
                }
            }
        }
        for k in 0..nz {
            for j in 0..=ny {
                for i in 0..nx {
                    let f = yface(i, j, k);
                    face_cells[f] = [
                        (j > 0).then(|| cell(i, j - 1, k) as u32),
                        (j < ny).then(|| cell(i, j, k) as u32),
                    ];
                    face_centroids[f * dim..f * dim + 3].copy_from_slice(&[
                        (i as f64 + 0.5) * hx,
                        j as f64 * hy,
                        (k as f64 + 0.5) * hz,
                    ]);
                    face_normals[f * dim + 1] = ay;
                    face_areas[f] = ay;
                }
            }
        }
        for k in 0..=nz {
            for j in 0..ny {
                for i in 0..nx {
                    let f = zface(i, j, k);
                    face_cells[f] = [
                        (k > 0).then(|| cell(i, j, k - 1) as u32),
                        (k < nz).then(|| cell(i, j, k) as u32),
                    ];
                    face_centroids[f * dim..f * dim + 3].copy_from_slice(&[
                        (i as f64 + 0.5) * hx,
                        (j as f64 + 0.5) * hy,
                        k as f64 * hz,
                    ]);
                    face_normals[f * dim + 2] = az;
                    face_areas[f] = az;
                }
            }
        }

        let mut cell_centroids = vec![0.0; nc * dim];
        for k in 0..nz {
            for j in 0..ny {
                for i in 0..nx {
                    let c = cell(i, j, k);
                    cell_centroids[c * dim..c * dim + 3].copy_from_slice(&[
                        (i as f64 + 0.5) * hx,
                        (j as f64 + 0.5) * hy,
                        (k as f64 + 0.5) * hz,
                    ]);
                }
            }
        }
        let cell_volumes = vec![hx * hy * hz; nc];

        Self::new(
            dim,
            cell_facepos,
            cell_faces,
            face_cells,
            face_centroids,
            face_normals,
            face_areas,
            cell_centroids,
            cell_volumes,
        )
    }
}

fn check_len(array: &'static str, found: usize, expected: usize) -> Result<()> {
    if found != expected {
        return Err(Error::ArrayLength {
            array,
            expected,
            found,
        });
    }
    Ok(())
}
