//! # Culling Benchmark
//!
//! Batch building for a grid of instances, half of them behind the camera.
//!
//! Run with: `cargo bench --package tandem_rendering`

#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use glam::{Mat4, Vec3};
use tandem_rendering::{Aabb, CullMode, Scene};

fn populated_scene(mode: CullMode, side: i32) -> Scene {
    let mut scene = Scene::new(mode);
    scene
        .register_mesh("cube", Aabb::from_half_extents(Vec3::splat(0.5)))
        .expect("register mesh");
    for x in -side..side {
        for z in -side..side {
            let id = scene
                .create_mesh_geometry("cube", Mat4::IDENTITY)
                .expect("create geometry");
            #[allow(clippy::cast_precision_loss)]
            let at = Vec3::new(x as f32 * 2.0, 0.0, z as f32 * 2.0);
            scene.set_geometry_world_transform(id, Mat4::from_translation(at));
        }
    }
    scene
}

fn bench_build_batches(c: &mut Criterion) {
    let mut group = c.benchmark_group("build_batches");

    for mode in [CullMode::AnyCorner, CullMode::PlaneOverlap] {
        group.bench_with_input(BenchmarkId::from_parameter(format!("{mode:?}")), &mode, |b, &mode| {
            let mut scene = populated_scene(mode, 50);
            b.iter(|| black_box(scene.build_batches()));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_build_batches);
criterion_main!(benches);
