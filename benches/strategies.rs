use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::rngs::StdRng;
use rand::SeedableRng;

use nfft_flags::input::InputSet;
use nfft_flags::plan::{Geometry, Plan, Strategy, Workspace};
use nfft_flags::Complex64;

fn bench_trafo(c: &mut Criterion) {
    let mut group = c.benchmark_group("trafo");
    for (dims, big_n) in [(1usize, 256usize), (2, 32)] {
        let m_total = big_n.pow(dims as u32);
        let geometry = Geometry::new(dims, big_n, m_total, 2 * big_n, 4).unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        let inputs = InputSet::generate(&mut rng, dims, m_total, geometry.n_total_target()).unwrap();
        let mut workspace = Workspace::new(&geometry).unwrap();
        for strategy in Strategy::ALL {
            let mut plan = Plan::new(geometry, strategy, &inputs).unwrap();
            plan.precompute(None).unwrap();
            let id = BenchmarkId::new(strategy.name(), format!("d{}_N{}", dims, big_n));
            group.bench_function(id, |b| b.iter(|| plan.trafo(&mut workspace).unwrap()));
        }
    }
    group.finish();
}

fn bench_ndft(c: &mut Criterion) {
    let geometry = Geometry::new(1, 64, 64, 128, 4).unwrap();
    let mut rng = StdRng::seed_from_u64(0);
    let inputs = InputSet::generate(&mut rng, 1, 64, 64).unwrap();
    let plan = Plan::new(geometry, Strategy::Direct, &inputs).unwrap();
    let mut out = vec![Complex64::new(0.0, 0.0); 64];
    c.bench_function("ndft_d1_N64", |b| b.iter(|| plan.ndft_into(&mut out).unwrap()));
}

criterion_group!(benches, bench_trafo, bench_ndft);
criterion_main!(benches);
