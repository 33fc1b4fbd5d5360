//! Hybridized mimetic cell systems and their Schur-complement reduction.
//!
//! Per cell, the mixed discretization couples half-face fluxes `v`, the
//! cell pressure `p`, and half-face pressures `π` through the block system
//! `[[B, C, D], [Cᵀ, 0, 0], [Dᵀ, 0, 0]]`, where `C` is a column of ones
//! (every half-face couples to the one cell pressure). Eliminating `v` and
//! `p` yields, per cell,
//!
//! - `F = Binv · 1` (a row per half-face),
//! - `L = 1ᵀ · Binv · 1` (a scalar),
//! - coefficient matrix `S = Binv − F Fᵀ / L`,
//! - right-hand side `r = F (src + Fᵀ g) / L − Binv g`,
//!
//! with `g` the gravity potential differences per half-face. The reduced
//! system is purely over half-face pressures; flux and cell pressure are
//! recovered by back-substitution afterwards.
//!
//! [`HybridSystem`] owns all scratch, sized once for the worst-case cell of
//! the assembly (`max_nconn`) and reused across cells; `s` and `r` hold the
//! *current* cell only and must be consumed before the next call. `Binv`
//! blocks are assumed symmetric positive definite; this module performs no
//! factorization and cannot fail numerically.

/// Reduced per-cell components and reusable assembly scratch.
#[derive(Clone, Debug)]
pub struct HybridSystem {
    max_nconn: usize,
    /// `1ᵀ Binv 1` per cell.
    pub l: Vec<f64>,
    /// `Binv · 1` per half-face.
    pub f: Vec<f64>,
    /// Current cell's RHS contribution (first `nconn` entries).
    pub r: Vec<f64>,
    /// Current cell's coefficient matrix, row-major (first `nconn²` entries).
    pub s: Vec<f64>,
    one: Vec<f64>,
    work: Vec<f64>,
}

impl HybridSystem {
    /// Scratch for an assembly over `ncells` cells with `total_nconn`
    /// half-faces and at most `max_nconn` faces per cell.
    pub fn new(max_nconn: usize, ncells: usize, total_nconn: usize) -> Self {
        Self {
            max_nconn,
            l: vec![0.0; ncells],
            f: vec![0.0; total_nconn],
            r: vec![0.0; max_nconn],
            s: vec![0.0; max_nconn * max_nconn],
            one: vec![1.0; max_nconn],
            work: vec![0.0; max_nconn],
        }
    }

    /// Largest per-cell face count this scratch was sized for.
    #[inline]
    pub fn max_nconn(&self) -> usize {
        self.max_nconn
    }

    /// Compute `F` and `L` for every cell of the assembly.
    ///
    /// `pconn` is the half-face CSR offset array (`cell_facepos`); `binv`
    /// holds the packed per-cell inverse inner products, cell `c`'s
    /// `n × n` block starting at the running sum of previous `n²`.
    pub fn schur_complement(&mut self, pconn: &[usize], binv: &[f64]) {
        let nc = pconn.len() - 1;
        let mut p2 = 0usize;
        for c in 0..nc {
            let p1 = pconn[c];
            let n = pconn[c + 1] - p1;
            debug_assert!(n <= self.max_nconn);
            let block = &binv[p2..p2 + n * n];
            let mut l = 0.0;
            for i in 0..n {
                let mut fi = 0.0;
                for j in 0..n {
                    fi += block[i * n + j] * self.one[j];
                }
                self.f[p1 + i] = fi;
                l += fi;
            }
            self.l[c] = l;
            p2 += n * n;
        }
    }

    /// Form the current cell's `S` and `r` into the reusable scratch.
    ///
    /// `p1`/`p2` are the cell's half-face and `Binv`-block offsets; `gpress`
    /// is indexed per half-face (global), `src` per cell. Must run after
    /// [`schur_complement`](Self::schur_complement).
    pub fn cell_contribution(
        &mut self,
        cell: usize,
        nconn: usize,
        p1: usize,
        p2: usize,
        gpress: &[f64],
        src: &[f64],
        binv: &[f64],
    ) {
        let n = nconn;
        debug_assert!(n <= self.max_nconn);
        let block = &binv[p2..p2 + n * n];
        let f = &self.f[p1..p1 + n];
        let g = &gpress[p1..p1 + n];
        let l = self.l[cell];

        // S <- Binv − F Fᵀ / L
        for i in 0..n {
            for j in 0..n {
                self.s[i * n + j] = block[i * n + j] - f[i] * f[j] / l;
            }
        }

        // r <- F (src + Fᵀ g) / L − Binv g
        let fg: f64 = f.iter().zip(g).map(|(fi, gi)| fi * gi).sum();
        let scale = (src[cell] + fg) / l;
        for i in 0..n {
            let mut bg = 0.0;
            for j in 0..n {
                bg += block[i * n + j] * g[j];
            }
            self.r[i] = f[i] * scale - bg;
        }
    }

    /// Recover one cell's pressure and outward half-face fluxes from the
    /// solved half-face pressures `pi_cell` (already gathered for the cell).
    ///
    /// Returns the cell pressure and writes `nconn` fluxes into `flux`.
    #[allow(clippy::too_many_arguments)]
    pub fn cell_press_flux(
        &mut self,
        cell: usize,
        nconn: usize,
        p1: usize,
        p2: usize,
        gpress: &[f64],
        src: &[f64],
        binv: &[f64],
        pi_cell: &[f64],
        flux: &mut [f64],
    ) -> f64 {
        let n = nconn;
        let block = &binv[p2..p2 + n * n];
        let f = &self.f[p1..p1 + n];

        for i in 0..n {
            self.work[i] = pi_cell[i] + gpress[p1 + i];
        }
        let fw: f64 = f.iter().zip(&self.work).map(|(fi, wi)| fi * wi).sum();
        let press = (src[cell] + fw) / self.l[cell];

        for i in 0..n {
            let mut bw = 0.0;
            for j in 0..n {
                bw += block[i * n + j] * self.work[j];
            }
            flux[i] = f[i] * press - bw;
        }
        press
    }

    /// Recover cell pressures and half-face fluxes for the whole assembly.
    ///
    /// `pi` is the globally solved face-pressure vector, indexed by the face
    /// ids in `conn` (`cell_faces`); `press` receives one pressure per cell
    /// and `flux` one value per half-face (outward per cell).
    #[allow(clippy::too_many_arguments)]
    pub fn press_flux(
        &mut self,
        pconn: &[usize],
        conn: &[usize],
        gpress: &[f64],
        src: &[f64],
        binv: &[f64],
        pi: &[f64],
        press: &mut [f64],
        flux: &mut [f64],
    ) {
        let nc = pconn.len() - 1;
        let mut p2 = 0usize;
        let mut pi_cell = vec![0.0; self.max_nconn];
        for c in 0..nc {
            let p1 = pconn[c];
            let n = pconn[c + 1] - p1;
            for (i, &f) in conn[p1..p1 + n].iter().enumerate() {
                pi_cell[i] = pi[f];
            }
            press[c] = self.cell_press_flux(
                c,
                n,
                p1,
                p2,
                gpress,
                src,
                binv,
                &pi_cell[..n],
                &mut flux[p1..p1 + n],
            );
            p2 += n * n;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// One cell, two half-faces, identity Binv.
    fn tiny() -> (HybridSystem, Vec<usize>, Vec<f64>) {
        let pconn = vec![0usize, 2];
        let binv = vec![1.0, 0.0, 0.0, 1.0];
        let mut sys = HybridSystem::new(2, 1, 2);
        sys.schur_complement(&pconn, &binv);
        (sys, pconn, binv)
    }

    #[test]
    fn schur_components_identity_binv() {
        let (sys, _, _) = tiny();
        assert_eq!(sys.f, vec![1.0, 1.0]);
        assert_eq!(sys.l, vec![2.0]);
    }

    #[test]
    fn cell_matrix_annihilates_constants() {
        let (mut sys, _, binv) = tiny();
        sys.cell_contribution(0, 2, 0, 0, &[0.0, 0.0], &[0.0], &binv);
        // S = I − (1/2) 1 1ᵀ has the constant vector in its kernel.
        let s = &sys.s[..4];
        assert!((s[0] + s[1]).abs() < 1e-15);
        assert!((s[2] + s[3]).abs() < 1e-15);
        assert!((s[0] - 0.5).abs() < 1e-15);
    }

    #[test]
    fn rhs_scales_with_source() {
        let (mut sys, _, binv) = tiny();
        sys.cell_contribution(0, 2, 0, 0, &[0.0, 0.0], &[3.0], &binv);
        // r = F src / L = [1, 1] · 3 / 2.
        assert!((sys.r[0] - 1.5).abs() < 1e-15);
        assert!((sys.r[1] - 1.5).abs() < 1e-15);
    }

    #[test]
    fn press_flux_recovers_linear_solution() {
        // Two unit cells in a row, scalar Binv = 2·I per cell (so B = I/2):
        // v = (π_left − π_right) ... check mass balance against the source.
        let pconn = vec![0usize, 2, 4];
        let conn = vec![0usize, 1, 1, 2];
        #[rustfmt::skip]
        let binv = vec![
            2.0, 0.0, 0.0, 2.0,
            2.0, 0.0, 0.0, 2.0,
        ];
        let mut sys = HybridSystem::new(2, 2, 4);
        sys.schur_complement(&pconn, &binv);

        let src = [1.0, -1.0];
        let gpress = [0.0; 4];
        // Face pressures solving the 1D problem: flux 1/2 leaves cell 0
        // through each of its faces... choose pi and verify conservation.
        let pi = [1.0, 0.5, 0.0];
        let mut press = [0.0; 2];
        let mut flux = [0.0; 4];
        sys.press_flux(&pconn, &conn, &gpress, &src, &binv, &pi, &mut press, &mut flux);

        // Mass balance: outward fluxes of each cell sum to its source.
        assert!(((flux[0] + flux[1]) - src[0]).abs() < 1e-14);
        assert!(((flux[2] + flux[3]) - src[1]).abs() < 1e-14);
        // Cell pressures stay within the range of their face pressures.
        assert!(press[0] <= pi[0] && press[0] >= pi[1]);
        assert!(press[1] <= pi[1] && press[1] >= pi[2]);
    }
}
