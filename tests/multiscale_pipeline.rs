//! End-to-end construction of a coarse system, from grid to block `Binv`.

mod util;

use msmfem::coarse;
use msmfem::prelude::*;
use util::{blocked_sheet, iso_perm};

#[test]
fn full_pipeline_on_a_blocked_sheet() {
    let (g, p) = blocked_sheet(4, 4, 2, 2);
    let ct = CoarseTopology::create(&g, &p).unwrap();
    let perm = iso_perm(g.num_cells(), 2.0);
    let totmob = vec![1.0; g.num_cells()];

    let mut sys = coarse::construct(&g, &p, &ct, &perm, &[0.0; 16], &totmob).unwrap();

    // 2×2 blocks: every block touches its two interior neighbours.
    assert_eq!(sys.num_blocks(), 4);
    for b in 0..4 {
        assert_eq!(sys.block_dofs(b).len(), 2);
        // One basis column per DOF, one flux per block half-face.
        let nhf = sys.basis_of(b).len() / 2;
        assert_eq!(sys.basis_column(b, 0).len(), nhf);
        assert_eq!(sys.basis_column(b, 1).len(), nhf);
        // Each column moves one unit of mass into or out of its block.
        for l in 0..2 {
            let net: f64 = sys.basis_column(b, l).iter().sum();
            assert!((net.abs() - 1.0).abs() < 1e-12, "block {b} dof {l}: net {net}");
        }
    }

    let bc = p.invert();
    let mut work = BinvWorkspace::new(sys.max_block_dofs());
    sys.compute_binv(&bc, &totmob, &mut work).unwrap();

    for b in 0..4 {
        let binv = sys.binv_of(b);
        // Symmetric positive definite 2×2 blocks.
        assert!((binv[1] - binv[2]).abs() < 1e-12);
        assert!(binv[0] > 0.0 && binv[3] > 0.0);
        assert!(binv[0] * binv[3] - binv[1] * binv[2] > 0.0);
    }
}

#[test]
fn one_dof_binv_is_the_reciprocal_coarse_product() {
    let g = Grid::cartesian(2, 1, 1, [1.0, 1.0, 1.0]).unwrap();
    let p = Partition::new(vec![0, 1]).unwrap();
    let ct = CoarseTopology::create(&g, &p).unwrap();
    let totmob = [2.0, 0.5];

    let mut sys =
        coarse::construct(&g, &p, &ct, &iso_perm(2, 1.0), &[0.0; 2], &totmob).unwrap();
    let bc = p.invert();
    let mut work = BinvWorkspace::new(sys.max_block_dofs());
    sys.compute_binv(&bc, &totmob, &mut work).unwrap();

    for (b, &lambda) in totmob.iter().enumerate() {
        assert_eq!(sys.block_dofs(b).len(), 1);
        let ip = sys.cell_ip_of(b)[0];
        assert!(ip > 0.0);
        assert!((sys.binv_of(b)[0] - lambda / ip).abs() < 1e-12 * (lambda / ip));
    }
}

#[test]
fn cell_ip_is_mobility_independent() {
    let (g, p) = blocked_sheet(4, 2, 2, 1);
    let ct = CoarseTopology::create(&g, &p).unwrap();
    let perm = iso_perm(g.num_cells(), 1.0);

    let a = coarse::construct(&g, &p, &ct, &perm, &[0.0; 8], &[1.0; 8]).unwrap();
    let b = coarse::construct(&g, &p, &ct, &perm, &[0.0; 8], &[3.0; 8]).unwrap();

    // Uniform mobility cancels out of the basis solve entirely, so both the
    // fluxes and the projected products must agree.
    for blk in 0..p.num_blocks() {
        let (va, vb) = (a.basis_of(blk), b.basis_of(blk));
        assert_eq!(va.len(), vb.len());
        for (x, y) in va.iter().zip(vb) {
            assert!((x - y).abs() < 1e-11, "{x} vs {y}");
        }
        for (x, y) in a.cell_ip_of(blk).iter().zip(b.cell_ip_of(blk)) {
            assert!((x - y).abs() < 1e-11, "{x} vs {y}");
        }
    }
}

#[test]
fn middle_block_of_a_bar_carries_two_dofs() {
    let g = Grid::cartesian(3, 1, 1, [1.0, 1.0, 1.0]).unwrap();
    let p = Partition::new(vec![0, 1, 2]).unwrap();
    let ct = CoarseTopology::create(&g, &p).unwrap();
    let totmob = vec![1.0; 3];

    let mut sys =
        coarse::construct(&g, &p, &ct, &iso_perm(3, 1.0), &[0.0; 3], &totmob).unwrap();
    assert_eq!(sys.block_dofs(0).len(), 1);
    assert_eq!(sys.block_dofs(1).len(), 2);
    assert_eq!(sys.block_dofs(2).len(), 1);

    let bc = p.invert();
    let mut work = BinvWorkspace::new(sys.max_block_dofs());
    sys.compute_binv(&bc, &totmob, &mut work).unwrap();
    let binv = sys.binv_of(1);
    assert!((binv[1] - binv[2]).abs() < 1e-12);
    assert!(binv[0] > 0.0 && binv[3] > 0.0);
}

#[test]
fn explicit_source_block_still_constructs() {
    let (g, p) = blocked_sheet(4, 2, 2, 1);
    let ct = CoarseTopology::create(&g, &p).unwrap();
    let mut src = vec![0.0; 8];
    src[0] = 5.0; // injector in block 0
    let sys = coarse::construct(&g, &p, &ct, &iso_perm(8, 1.0), &src, &[1.0; 8]).unwrap();
    assert_eq!(sys.block_dofs(0).len(), 1);
    // The driven block still produces a nonzero basis column.
    assert!(sys.basis_of(0).iter().any(|&v| v.abs() > 1e-14));
}
