use criterion::{Criterion, black_box, criterion_group, criterion_main};
use msmfem::coarse;
use msmfem::prelude::*;

fn iso_perm(nc: usize, k: f64) -> Vec<f64> {
    let mut perm = vec![0.0; nc * 9];
    for c in 0..nc {
        for i in 0..3 {
            perm[c * 9 + i * 4] = k;
        }
    }
    perm
}

fn blocked_box(nx: usize, ny: usize, nz: usize, bx: usize, by: usize) -> (Grid, Partition) {
    let g = Grid::cartesian(nx, ny, nz, [1.0, 1.0, 1.0]).unwrap();
    let (cx, cy) = (nx / bx, ny / by);
    let part: Vec<usize> = (0..nx * ny * nz)
        .map(|c| {
            let i = c % nx;
            let j = (c / nx) % ny;
            (j / cy) * bx + i / cx
        })
        .collect();
    (g, Partition::new(part).unwrap())
}

fn bench_construct(crit: &mut Criterion) {
    let (g, p) = blocked_box(16, 16, 4, 4, 4);
    let ct = CoarseTopology::create(&g, &p).unwrap();
    let perm = iso_perm(g.num_cells(), 1.0);
    let src = vec![0.0; g.num_cells()];
    let totmob = vec![1.0; g.num_cells()];

    crit.bench_function("coarse_construct/16x16x4_4x4", |b| {
        b.iter(|| {
            let sys = coarse::construct(
                black_box(&g),
                black_box(&p),
                &ct,
                black_box(&perm),
                &src,
                &totmob,
            )
            .unwrap();
            black_box(sys)
        })
    });
}

fn bench_binv_update(crit: &mut Criterion) {
    let (g, p) = blocked_box(16, 16, 4, 4, 4);
    let ct = CoarseTopology::create(&g, &p).unwrap();
    let perm = iso_perm(g.num_cells(), 1.0);
    let src = vec![0.0; g.num_cells()];
    let totmob: Vec<f64> = (0..g.num_cells()).map(|c| 1.0 + (c % 7) as f64 * 0.1).collect();

    let sys = coarse::construct(&g, &p, &ct, &perm, &src, &totmob).unwrap();
    let bc = p.invert();

    crit.bench_function("coarse_binv_update/16x16x4_4x4", |b| {
        let mut work = BinvWorkspace::new(sys.max_block_dofs());
        let mut s = sys.clone();
        b.iter(|| {
            s.compute_binv(&bc, black_box(&totmob), &mut work).unwrap();
        })
    });
}

criterion_group!(benches, bench_construct, bench_binv_update);
criterion_main!(benches);
