use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use planfft::{alloc_1d, dft_1d, Complex64, Direction, Flag, Plan};

fn bench_plan_reuse_vs_one_shot(c: &mut Criterion) {
    let mut group = c.benchmark_group("dft_1d");
    for size in [256usize, 1024, 4096] {
        group.throughput(Throughput::Elements(size as u64));

        let mut input = alloc_1d(size);
        let mut output = alloc_1d(size);
        for (i, x) in input.iter_mut().enumerate() {
            *x = Complex64::new((i as f64 * 0.1).sin(), (i as f64 * 0.2).cos());
        }

        group.bench_with_input(BenchmarkId::new("one_shot", size), &size, |b, _| {
            b.iter(|| {
                dft_1d(&mut input, &mut output, Direction::Forward, Flag::Estimate).unwrap();
            });
        });

        group.bench_with_input(BenchmarkId::new("plan_reuse", size), &size, |b, _| {
            // SAFETY: the buffers outlive the plan, which is dropped at the
            // end of this closure.
            let mut plan = unsafe {
                Plan::dft_1d(&mut input, &mut output, Direction::Forward, Flag::Estimate)
            }
            .unwrap();
            b.iter(|| plan.execute().unwrap());
        });
    }
    group.finish();
}

fn bench_plan_creation(c: &mut Criterion) {
    let mut group = c.benchmark_group("plan_creation");
    for flag in [Flag::Estimate, Flag::Measure] {
        let mut input = alloc_1d(1024);
        let mut output = alloc_1d(1024);
        group.bench_with_input(
            BenchmarkId::new("flag", format!("{flag:?}")),
            &flag,
            |b, &flag| {
                b.iter(|| {
                    // SAFETY: the buffers outlive the plan.
                    let plan = unsafe {
                        Plan::dft_1d(&mut input, &mut output, Direction::Forward, flag)
                    }
                    .unwrap();
                    plan.fingerprint().scratch_bytes
                });
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_plan_reuse_vs_one_shot, bench_plan_creation);
criterion_main!(benches);
