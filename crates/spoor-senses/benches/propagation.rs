use std::hint::black_box;
use std::sync::Arc;

use criterion::{Criterion, criterion_group, criterion_main};

use spoor_geom::{DistanceMetric, Point};
use spoor_grid::compute_outbound;
use spoor_senses::{
    LinearDecayPhysics, PropagationAlgorithm, RippleMode, SenseSourceData, SenseSourceDefinition,
};

// Scattered pillars every seventh cell, open elsewhere.
fn pillars(p: Point) -> f32 {
    if p.x.rem_euclid(7) == 3 && p.y.rem_euclid(7) == 3 { 1.0 } else { 0.0 }
}

fn bench_propagation(c: &mut Criterion) {
    let mut group = c.benchmark_group("propagation_radius_20");
    let def = SenseSourceDefinition::builder(20.0)
        .metric(DistanceMetric::Euclidean)
        .physics(Arc::new(LinearDecayPhysics::new(1.0)))
        .build()
        .unwrap();
    let cost = |x: i32, y: i32, _z: i32| 1.0 - pillars(Point::new(x, y));
    let dirs = |p: Point| compute_outbound(&cost, p, 0);

    let algorithms = [
        ("flood_fill", PropagationAlgorithm::flood_fill(1)),
        ("ripple_tight", PropagationAlgorithm::ripple(RippleMode::Tight, 1)),
        ("ripple_regular", PropagationAlgorithm::ripple(RippleMode::Regular, 1)),
    ];
    for (name, alg) in &algorithms {
        let mut data = SenseSourceData::new(0);
        group.bench_function(*name, |b| {
            b.iter(|| {
                alg.calculate(&def, Point::ZERO, &pillars, &dirs, &mut data)
                    .unwrap();
                black_box(data.intensity(Point::new(5, 5)));
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_propagation);
criterion_main!(benches);
