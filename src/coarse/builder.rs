//! Multiscale basis-function construction.
//!
//! For every active coarse face — one separating two real blocks — a local
//! flow problem is solved on the union of the two blocks: a synthetic
//! source distribution injects one unit of mass in the first block and
//! extracts it from the second, weighted per cell by the normalized
//! [`coarse_weight`](crate::coarse::weight::coarse_weight). The solve uses
//! the same hybridized mimetic discretization as the fine-scale pressure
//! system, with one degree of freedom per fine face of the pair's cells.
//! Faces on the pair's boundary keep their assembled equations, which state
//! zero flux there (no-flow conditions); the resulting pure-Neumann system
//! is singular with the constant face pressure in its kernel and a
//! consistent right-hand side, so one face pressure is pinned to zero
//! before factoring. Recovered half-face fluxes are symmetrized across
//! each fine face and stored as one basis column per adjacent block.
//!
//! All scratch is allocated once in [`BfAssembly`], sized by the maxima in
//! [`CoarseSysMeta`], and reused across coarse faces. Per-face state
//! (`loc_fno`, sources, face sums) is reset by revisiting exactly the
//! cells that set it.

use nalgebra::DVector;

use crate::coarse::meta::CoarseSysMeta;
use crate::coarse::system::CoarseSys;
use crate::coarse::topology::CoarseTopology;
use crate::coarse::weight::coarse_weight;
use crate::error::{Error, Result};
use crate::grid::Grid;
use crate::hybsys::HybridSystem;
use crate::mimetic::ip_simple_all;
use crate::partition::Partition;
use crate::sparse::CsrMatrix;

/// Reusable scratch for one construction pass.
struct BfAssembly {
    hybsys: HybridSystem,
    sparse: CsrMatrix,
    /// Local RHS / solution, sized for the worst-case DOF count.
    rhs: Vec<f64>,
    x: Vec<f64>,
    /// Half-face fluxes of the current block pair.
    v: Vec<f64>,
    /// Gravity contributions; identically zero during basis construction.
    gpress: Vec<f64>,
    /// Signed synthetic sources, nonzero only on the current block pair.
    src: Vec<f64>,
    pdof: Vec<usize>,
    dof: Vec<usize>,
    pi_cell: Vec<f64>,
    face_sum: Vec<f64>,
    face_cnt: Vec<u32>,
}

impl BfAssembly {
    fn new(grid: &Grid, meta: &CoarseSysMeta) -> Self {
        let max_dofs = 2 * meta.max_blk_nhf;
        Self {
            hybsys: HybridSystem::new(meta.max_ngconn, grid.num_cells(), grid.num_half_faces()),
            sparse: CsrMatrix::with_capacity(max_dofs, 2 * meta.max_blk_sum_nhf2),
            rhs: vec![0.0; max_dofs],
            x: vec![0.0; max_dofs],
            v: vec![0.0; 2 * meta.max_blk_nhf],
            gpress: vec![0.0; grid.num_half_faces()],
            src: vec![0.0; grid.num_cells()],
            pdof: Vec::with_capacity(2 * meta.max_blk_cells + 1),
            dof: Vec::with_capacity(2 * meta.max_blk_nhf),
            pi_cell: vec![0.0; meta.max_ngconn],
            face_sum: vec![0.0; grid.num_faces()],
            face_cnt: vec![0; grid.num_faces()],
        }
    }
}

/// Build the complete coarse system for one mobility field.
///
/// Computes the fine-scale SIMPLE inner products, scales them by `totmob`,
/// solves one local flow problem per active coarse face, and projects the
/// resulting basis fluxes into per-cell inner products. The returned system
/// still needs [`CoarseSys::compute_binv`] before coarse assembly; that
/// step is kept separate so mobility updates can rerun it alone.
///
/// `perm` holds one row-major `d × d` tensor per cell; `src` prescribed
/// external sources per cell; `totmob` the total mobility per cell.
///
/// # Errors
/// Propagates validation errors from the inputs,
/// [`Error::ZeroBlockWeight`] from the weighting,
/// [`Error::NonPositiveDefiniteCell`] from a bad inner-product block, and
/// [`Error::SingularLocalSystem`] if a block pair's cells do not form one
/// connected local problem.
pub fn construct(
    grid: &Grid,
    partition: &Partition,
    topology: &CoarseTopology,
    perm: &[f64],
    src: &[f64],
    totmob: &[f64],
) -> Result<CoarseSys> {
    check_len("src", src.len(), grid.num_cells())?;
    check_len("totmob", totmob.len(), grid.num_cells())?;
    if topology.num_blocks() != partition.num_blocks() {
        return Err(Error::ArrayLength {
            array: "topology",
            expected: partition.num_blocks(),
            found: topology.num_blocks(),
        });
    }

    let mut meta = CoarseSysMeta::construct(grid, partition, topology);
    let mut binv = ip_simple_all(grid, perm)?;
    let w = coarse_weight(grid, partition, &meta.block_cells, perm, src)?;

    // Mobility scaling of the inner products; λ enters the basis solves and
    // is divided back out of the stored cell products.
    for c in 0..grid.num_cells() {
        for e in &mut binv[meta.pconn2[c]..meta.pconn2[c + 1]] {
            *e *= totmob[c];
        }
    }

    let mut sys = CoarseSys::allocate(topology, &meta);
    let mut asm = BfAssembly::new(grid, &meta);
    asm.hybsys.schur_complement(grid.cell_facepos(), &binv);

    log::debug!(
        "basis construction: {} active coarse faces over {} blocks",
        meta.n_act_bf,
        topology.num_blocks()
    );

    for cf in 0..topology.num_faces() {
        if meta.bfno[cf].is_none() {
            continue;
        }
        let [Some(b1), Some(b2)] = topology.neighbours(cf) else {
            unreachable!("active coarse face has two real blocks");
        };
        let pair = [b1 as usize, b2 as usize];
        solve_local_sys(grid, &mut meta, &mut asm, &binv, &w, cf, pair)?;
        store_bf(&meta, &asm, &mut sys, cf, pair);
        unenumerate(grid, &mut meta, &mut asm, pair);
    }

    sys.compute_cell_ip(&meta, &binv, totmob)?;
    Ok(sys)
}

/// Assign local DOF numbers to every fine face of the pair's cells, set
/// signed sources, assemble, and solve the local system into `asm.x` and
/// the recovered fluxes into `asm.v`.
fn solve_local_sys(
    grid: &Grid,
    meta: &mut CoarseSysMeta,
    asm: &mut BfAssembly,
    binv: &[f64],
    w: &[f64],
    cf: usize,
    pair: [usize; 2],
) -> Result<()> {
    // DOF enumeration and source injection. The first block is the source
    // side, the second the sink; block weights sum to ±1. Every face of a
    // pair cell carries a DOF, including the pair's boundary faces, whose
    // assembled equations state zero flux there.
    let mut nlocf = 0usize;
    for (k, &b) in pair.iter().enumerate() {
        let sign = if k == 0 { 1.0 } else { -1.0 };
        for &c in meta.block_cells.cells_of(b) {
            asm.src[c] = sign * w[c];
            for &f in grid.faces_of(c) {
                if meta.loc_fno[f].is_none() {
                    meta.loc_fno[f] = Some(nlocf as u32);
                    nlocf += 1;
                }
            }
        }
    }

    // Cell→DOF incidence for the sparsity pattern. Doubles as the per-cell
    // DOF list during assembly below.
    asm.pdof.clear();
    asm.dof.clear();
    asm.pdof.push(0);
    for &b in &pair {
        for &c in meta.block_cells.cells_of(b) {
            for &f in grid.faces_of(c) {
                let id = meta.loc_fno[f].map_or(0, |id| id as usize);
                asm.dof.push(id);
            }
            asm.pdof.push(asm.dof.len());
        }
    }
    asm.sparse.define_sparsity(&asm.pdof, &asm.dof, nlocf);
    asm.rhs[..nlocf].fill(0.0);

    // Assemble the Schur-reduced cell systems.
    let mut lc = 0usize;
    for &b in &pair {
        for &c in meta.block_cells.cells_of(b) {
            let n = meta.ncf[c];
            let p1 = grid.cell_facepos()[c];
            asm.hybsys
                .cell_contribution(c, n, p1, meta.pconn2[c], &asm.gpress, &asm.src, binv);
            let dofs = &asm.dof[asm.pdof[lc]..asm.pdof[lc + 1]];
            asm.sparse.assemble_cell(
                dofs,
                &asm.hybsys.s[..n * n],
                &asm.hybsys.r[..n],
                &mut asm.rhs[..nlocf],
            )?;
            lc += 1;
        }
    }

    // The assembled system is a pure-Neumann problem: singular, with the
    // constant face-pressure vector in its kernel, and a consistent RHS
    // (the signed block weights sum to zero). Pin DOF 0 to zero and factor
    // the remaining principal submatrix, which is positive definite exactly
    // when the pair's cells form one connected problem. Row 0 then holds by
    // consistency.
    asm.x[0] = 0.0;
    let a = asm.sparse.to_dense();
    let reduced = a.view((1, 1), (nlocf - 1, nlocf - 1)).into_owned();
    let chol = reduced
        .cholesky()
        .ok_or(Error::SingularLocalSystem { coarse_face: cf })?;
    let sol = chol.solve(&DVector::from_column_slice(&asm.rhs[1..nlocf]));
    asm.x[1..nlocf].copy_from_slice(sol.as_slice());

    // Flux recovery per cell.
    let mut off = 0usize;
    for &b in &pair {
        for &c in meta.block_cells.cells_of(b) {
            let n = meta.ncf[c];
            let p1 = grid.cell_facepos()[c];
            for (i, &f) in grid.faces_of(c).iter().enumerate() {
                asm.pi_cell[i] = meta.loc_fno[f].map_or(0.0, |id| asm.x[id as usize]);
            }
            asm.hybsys.cell_press_flux(
                c,
                n,
                p1,
                meta.pconn2[c],
                &asm.gpress,
                &asm.src,
                binv,
                &asm.pi_cell[..n],
                &mut asm.v[off..off + n],
            );
            off += n;
        }
    }

    // The solved system already makes boundary fluxes vanish and interior
    // half-face pairs cancel, up to solver round-off. Subtracting each fine
    // face's mean half-face defect makes both exact.
    let mut off = 0usize;
    for &b in &pair {
        for &c in meta.block_cells.cells_of(b) {
            for (i, &f) in grid.faces_of(c).iter().enumerate() {
                asm.face_sum[f] += asm.v[off + i];
                asm.face_cnt[f] += 1;
            }
            off += meta.ncf[c];
        }
    }
    let mut off = 0usize;
    for &b in &pair {
        for &c in meta.block_cells.cells_of(b) {
            for (i, &f) in grid.faces_of(c).iter().enumerate() {
                asm.v[off + i] -= asm.face_sum[f] / f64::from(asm.face_cnt[f]);
            }
            off += meta.ncf[c];
        }
    }
    Ok(())
}

/// Copy the pair's recovered fluxes into the two blocks' basis columns.
fn store_bf(meta: &CoarseSysMeta, asm: &BfAssembly, sys: &mut CoarseSys, cf: usize, pair: [usize; 2]) {
    let mut off = 0usize;
    for (slot, &b) in pair.iter().enumerate() {
        let nhf = meta.blk_nhf[b];
        debug_assert!(meta.loc_dofno[cf][slot].is_some());
        let l = meta.loc_dofno[cf][slot].map_or(0, |l| l as usize);
        sys.basis_column_mut(b, l, nhf)
            .copy_from_slice(&asm.v[off..off + nhf]);
        off += nhf;
    }
}

/// Reset all per-pair scratch by revisiting exactly the cells that set it.
fn unenumerate(grid: &Grid, meta: &mut CoarseSysMeta, asm: &mut BfAssembly, pair: [usize; 2]) {
    for &b in &pair {
        for &c in meta.block_cells.cells_of(b) {
            asm.src[c] = 0.0;
            for &f in grid.faces_of(c) {
                meta.loc_fno[f] = None;
                asm.face_sum[f] = 0.0;
                asm.face_cnt[f] = 0;
            }
        }
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
