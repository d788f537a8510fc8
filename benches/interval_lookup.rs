use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};
use hsis_prep::interval::{IntervalIndex, Segment, scan_matches};

fn generate_segments(routes: usize, per_route: usize) -> Vec<(String, Segment)> {
    let mut segments = Vec::with_capacity(routes * per_route);
    for route in 0..routes {
        for step in 0..per_route {
            let begin = step as f64 * 0.25;
            segments.push((
                format!("{}", 1000 + route),
                Segment {
                    row: route * per_route + step,
                    begin,
                    end: begin + 0.3,
                },
            ));
        }
    }
    segments
}

fn probes(routes: usize, per_route: usize) -> Vec<(String, f64)> {
    (0..1_000)
        .map(|i| {
            let route = (i * 7) % routes;
            let measure = ((i * 13) % (per_route * 4)) as f64 * 0.0625;
            (format!("{}", 1000 + route), measure)
        })
        .collect()
}

fn bench_interval_lookup(c: &mut Criterion) {
    let (routes, per_route) = (200, 250);
    let segments = generate_segments(routes, per_route);
    let index = IntervalIndex::from_segments(segments.clone());
    let probes = probes(routes, per_route);

    let mut group = c.benchmark_group("interval_lookup");
    group.sample_size(20);

    group.bench_function("indexed", |b| {
        b.iter(|| {
            for (inventory, measure) in &probes {
                black_box(index.matches(inventory, *measure).len());
            }
        });
    });

    group.bench_function("linear_scan", |b| {
        b.iter(|| {
            for (inventory, measure) in &probes {
                black_box(scan_matches(&segments, inventory, *measure).len());
            }
        });
    });

    group.finish();
}

criterion_group!(benches, bench_interval_lookup);
criterion_main!(benches);
