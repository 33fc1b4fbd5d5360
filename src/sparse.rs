//! Sparse coefficient matrices for the local basis-function systems.
//!
//! Every basis function is defined by a small linear system over the fine
//! faces of a block pair. The degrees of freedom differ per coarse face, so
//! the sparsity pattern is rebuilt each time — cheaply, by a two-pass
//! counting sort over the cell→DOF incidence lists — into a reusable
//! [`CsrMatrix`] allocation. Rows are sorted so that assembly can locate a
//! column by binary search.
//!
//! The clique expansion deliberately keeps duplicate column entries when a
//! DOF pair co-occurs in several cells; after sorting, scatter-adds land on
//! the first duplicate and the rest stay zero. The memory bound accounts
//! for this.

use crate::error::{Error, Result};

/// CSR matrix with a rebuildable pattern and reusable allocation.
#[derive(Clone, Debug)]
pub struct CsrMatrix {
    nrows: usize,
    ia: Vec<usize>,
    ja: Vec<usize>,
    values: Vec<f64>,
}

impl CsrMatrix {
    /// Empty matrix with room for `max_rows` rows and `max_nnz` entries.
    pub fn with_capacity(max_rows: usize, max_nnz: usize) -> Self {
        Self {
            nrows: 0,
            ia: Vec::with_capacity(max_rows + 1),
            ja: Vec::with_capacity(max_nnz),
            values: Vec::with_capacity(max_nnz),
        }
    }

    /// Number of rows.
    #[inline]
    pub fn num_rows(&self) -> usize {
        self.nrows
    }

    /// Number of stored entries (duplicates included).
    #[inline]
    pub fn num_entries(&self) -> usize {
        self.ja.len()
    }

    /// Row offsets.
    #[inline]
    pub fn row_offsets(&self) -> &[usize] {
        &self.ia
    }

    /// Column indices of row `i`, ascending after pattern construction.
    #[inline]
    pub fn row_cols(&self, i: usize) -> &[usize] {
        &self.ja[self.ia[i]..self.ia[i + 1]]
    }

    /// Stored values of row `i`.
    #[inline]
    pub fn row_values(&self, i: usize) -> &[f64] {
        &self.values[self.ia[i]..self.ia[i + 1]]
    }

    /// Rebuild the sparsity pattern of a symmetric local system.
    ///
    /// `pdof`/`dof` is the CSR incidence from local cells to the `ndof`
    /// local degrees of freedom they touch. The pattern contains every
    /// diagonal entry plus one entry per ordered DOF pair co-occurring in a
    /// cell (the cell-clique expansion). Values are zeroed.
    pub fn define_sparsity(&mut self, pdof: &[usize], dof: &[usize], ndof: usize) {
        let ncells = pdof.len() - 1;

        // Pass 1: count entries per row (self plus clique degree).
        self.ia.clear();
        self.ia.resize(ndof + 1, 0);
        for i in 0..ndof {
            self.ia[i + 1] = 1;
        }
        for c in 0..ncells {
            let n = pdof[c + 1] - pdof[c];
            for &d in &dof[pdof[c]..pdof[c + 1]] {
                debug_assert!(d < ndof);
                self.ia[d + 1] += n - 1;
            }
        }
        for i in 0..ndof {
            self.ia[i + 1] += self.ia[i];
        }
        let nnz = self.ia[ndof];

        // Pass 2: fill column indices, using a cursor per row.
        self.ja.clear();
        self.ja.resize(nnz, 0);
        let mut cursor: Vec<usize> = self.ia[..ndof].to_vec();
        for (i, cur) in cursor.iter_mut().enumerate() {
            self.ja[*cur] = i;
            *cur += 1;
        }
        for c in 0..ncells {
            let cell_dofs = &dof[pdof[c]..pdof[c + 1]];
            for (k1, &d1) in cell_dofs.iter().enumerate() {
                for (k2, &d2) in cell_dofs.iter().enumerate() {
                    if k1 != k2 {
                        self.ja[cursor[d1]] = d2;
                        cursor[d1] += 1;
                    }
                }
            }
        }
        debug_assert!(cursor.iter().zip(&self.ia[1..]).all(|(c, e)| c == e));

        self.nrows = ndof;
        self.values.clear();
        self.values.resize(nnz, 0.0);
        self.sort_rows();
    }

    /// Sort each row's column indices ascending, carrying values along.
    fn sort_rows(&mut self) {
        for i in 0..self.nrows {
            let lo = self.ia[i];
            let hi = self.ia[i + 1];
            let mut perm: Vec<usize> = (lo..hi).collect();
            perm.sort_unstable_by_key(|&k| self.ja[k]);
            let cols: Vec<usize> = perm.iter().map(|&k| self.ja[k]).collect();
            let vals: Vec<f64> = perm.iter().map(|&k| self.values[k]).collect();
            self.ja[lo..hi].copy_from_slice(&cols);
            self.values[lo..hi].copy_from_slice(&vals);
        }
    }

    /// Zero all stored values, keeping the pattern.
    pub fn zero(&mut self) {
        self.values.fill(0.0);
    }

    /// Index of the first stored entry at `(i, j)`, if present.
    pub fn entry_index(&self, i: usize, j: usize) -> Option<usize> {
        let row = &self.ja[self.ia[i]..self.ia[i + 1]];
        let k = row.partition_point(|&c| c < j);
        (k < row.len() && row[k] == j).then(|| self.ia[i] + k)
    }

    /// Scatter-add one cell's dense contribution into the matrix and RHS.
    ///
    /// `s` is the cell's `ndof × ndof` coefficient matrix (row-major) and
    /// `r` its RHS; `dofs` maps local cell indices to matrix rows.
    /// Contributions are additive within one assembly pass.
    ///
    /// # Errors
    /// Returns [`Error::MissingSparsityEntry`] if the pattern lacks a
    /// required entry — the incidence lists used by
    /// [`define_sparsity`](Self::define_sparsity) did not cover this cell.
    pub fn assemble_cell(
        &mut self,
        dofs: &[usize],
        s: &[f64],
        r: &[f64],
        rhs: &mut [f64],
    ) -> Result<()> {
        let n = dofs.len();
        debug_assert!(s.len() >= n * n && r.len() >= n);
        for (i, &di) in dofs.iter().enumerate() {
            rhs[di] += r[i];
            for (j, &dj) in dofs.iter().enumerate() {
                let k = self
                    .entry_index(di, dj)
                    .ok_or(Error::MissingSparsityEntry { row: di, col: dj })?;
                self.values[k] += s[i * n + j];
            }
        }
        Ok(())
    }

    /// Dense row-major copy, duplicates merged by addition.
    pub fn to_dense(&self) -> nalgebra::DMatrix<f64> {
        let mut a = nalgebra::DMatrix::zeros(self.nrows, self.nrows);
        for i in 0..self.nrows {
            for (&j, &v) in self.row_cols(i).iter().zip(self.row_values(i)) {
                a[(i, j)] += v;
            }
        }
        a
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// Two cells sharing DOF 1: 0-1 and 1-2 cliques.
    fn two_cell_pattern() -> CsrMatrix {
        let mut a = CsrMatrix::with_capacity(3, 16);
        a.define_sparsity(&[0, 2, 4], &[0, 1, 1, 2], 3);
        a
    }

    #[test]
    fn pattern_has_diagonal_and_cliques() {
        let a = two_cell_pattern();
        assert_eq!(a.num_rows(), 3);
        assert_eq!(a.row_cols(0), &[0, 1]);
        assert_eq!(a.row_cols(1), &[0, 1, 2]);
        assert_eq!(a.row_cols(2), &[1, 2]);
    }

    #[test]
    fn assembly_is_additive_and_reassembly_idempotent() {
        let mut a = two_cell_pattern();
        let mut rhs = vec![0.0; 3];
        let s = [2.0, -1.0, -1.0, 2.0];
        let r = [1.0, 1.0];
        a.assemble_cell(&[0, 1], &s, &r, &mut rhs).unwrap();
        a.assemble_cell(&[1, 2], &s, &r, &mut rhs).unwrap();
        // DOF 1 accumulates both cells' diagonals.
        let d = a.to_dense();
        assert_eq!(d[(1, 1)], 4.0);
        assert_eq!(d[(0, 1)], -1.0);
        assert_eq!(rhs, vec![1.0, 2.0, 1.0]);

        let before = d;
        a.zero();
        rhs.fill(0.0);
        a.assemble_cell(&[0, 1], &s, &r, &mut rhs).unwrap();
        a.assemble_cell(&[1, 2], &s, &r, &mut rhs).unwrap();
        assert_eq!(a.to_dense(), before);
    }

    #[test]
    fn missing_entry_is_reported() {
        let mut a = two_cell_pattern();
        let mut rhs = vec![0.0; 3];
        // DOFs 0 and 2 never co-occur.
        let err = a
            .assemble_cell(&[0, 2], &[1.0; 4], &[0.0; 2], &mut rhs)
            .unwrap_err();
        assert_eq!(err, Error::MissingSparsityEntry { row: 0, col: 2 });
    }

    proptest! {
        /// Diagonal always present; pattern symmetric; rows ascending.
        #[test]
        fn pattern_properties(cells in proptest::collection::vec(
            proptest::collection::vec(0usize..8, 1..5), 1..6))
        {
            let mut pdof = vec![0usize];
            let mut dof = Vec::new();
            for cell in &cells {
                let mut d = cell.clone();
                d.sort_unstable();
                d.dedup();
                dof.extend_from_slice(&d);
                pdof.push(dof.len());
            }
            let ndof = 8;
            let mut a = CsrMatrix::with_capacity(ndof, 256);
            a.define_sparsity(&pdof, &dof, ndof);

            for i in 0..ndof {
                prop_assert!(a.entry_index(i, i).is_some());
                let row = a.row_cols(i);
                prop_assert!(row.windows(2).all(|w| w[0] <= w[1]));
                for &j in row {
                    prop_assert!(a.entry_index(j, i).is_some());
                }
            }
        }
    }
}
