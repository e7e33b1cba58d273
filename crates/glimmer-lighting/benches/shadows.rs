use std::sync::Mutex;

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use glimmer_geom::{Location, Rgb};
use glimmer_lighting::{
    LightLock, LightSource, LightingMap, Obscurity, VIEW_BLOCKED, VIEW_CLEAR,
};

// Open floor with a pillar every fourth tile.
struct PillarMap {
    lit: Mutex<u64>,
    lock: LightLock,
}

impl LightingMap for PillarMap {
    fn accepts_light(&self, _loc: Location, _dx: i32, _dy: i32) -> bool {
        true
    }

    fn blocks_view(&self, loc: Location) -> Obscurity {
        if loc.x % 4 == 0 && loc.y % 4 == 0 { VIEW_BLOCKED } else { VIEW_CLEAR }
    }

    fn set_light(&self, _loc: Location, _color: Rgb) {
        *self.lit.lock().unwrap() += 1;
    }

    fn reset_lights(&self) {
        *self.lit.lock().unwrap() = 0;
    }

    fn light_lock(&self) -> &LightLock {
        &self.lock
    }
}

fn bench_calculate_shadows(c: &mut Criterion) {
    let mut group = c.benchmark_group("calculate_shadows");
    let map = PillarMap { lit: Mutex::new(0), lock: LightLock::new() };
    for size in [1u32, 3, 6] {
        let mut src = LightSource::new(Location::new(17, 18, 0), size * 10_000 + 9_999).unwrap();
        group.bench_function(format!("radius_{size}"), |b| {
            b.iter(|| {
                src.refresh();
                black_box(src.calculate_shadows(&map));
            })
        });
    }
    group.finish();
}

fn bench_apply(c: &mut Criterion) {
    let map = PillarMap { lit: Mutex::new(0), lock: LightLock::new() };
    let mut src = LightSource::new(Location::new(17, 18, 0), 69_999).unwrap();
    src.calculate_shadows(&map);
    c.bench_function("apply_radius_6", |b| {
        b.iter(|| {
            let _guard = map.light_lock().lock();
            src.apply(&map);
        })
    });
    black_box(*map.lit.lock().unwrap());
}

criterion_group!(benches, bench_calculate_shadows, bench_apply);
criterion_main!(benches);
