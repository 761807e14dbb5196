use criterion::{black_box, criterion_group, criterion_main, Criterion};
use habitat_room::defaults::demo_room_state;
use habitat_room::geometry::{Quat, Vec3};
use habitat_room::ids::{FurnitureId, FurniturePlacementId, PlaneId, RoomId};
use habitat_room::ops::{FurniturePlacementPatch, Operation};
use habitat_room::planes::merge_planes;
use habitat_room::reducer::apply_operation;
use habitat_room::state::{ObservedPlane, RoomFurniturePlacement, RoomPlaneData};
use habitat_room::undo::compute_inverse;

fn synthetic_planes(count: usize) -> Vec<RoomPlaneData> {
    (0..count)
        .map(|i| RoomPlaneData {
            id: PlaneId::generate(),
            label: if i % 5 == 0 { "wall" } else { "storage" }.to_string(),
            origin: Vec3::new(i as f32 * 0.5, 1.0, (i % 7) as f32),
            orientation: Quat::IDENTITY,
            extents: [1.0 + (i % 3) as f32, 2.0],
        })
        .collect()
}

fn drifted_scan(planes: &[RoomPlaneData]) -> Vec<ObservedPlane> {
    planes
        .iter()
        .map(|p| {
            let mut obs = p.to_observed();
            obs.origin.x += 0.02;
            obs
        })
        .collect()
}

fn bench_merge_planes_small(c: &mut Criterion) {
    let existing = synthetic_planes(8);
    let scan = drifted_scan(&existing);

    c.bench_function("merge_planes_8", |b| {
        b.iter(|| {
            black_box(merge_planes(black_box(&existing), black_box(&scan)));
        })
    });
}

fn bench_merge_planes_large(c: &mut Criterion) {
    // a full multi-room scan on a LiDAR device
    let existing = synthetic_planes(100);
    let scan = drifted_scan(&existing);

    c.bench_function("merge_planes_100", |b| {
        b.iter(|| {
            black_box(merge_planes(black_box(&existing), black_box(&scan)));
        })
    });
}

fn bench_apply_furniture_move(c: &mut Criterion) {
    let mut state = demo_room_state(RoomId::generate());
    let layout_id = state.layouts.keys().next().unwrap().clone();
    let placement = RoomFurniturePlacement {
        id: FurniturePlacementId::generate(),
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        furniture_id: FurnitureId::generate(),
    };
    let placement_id = placement.id.clone();
    apply_operation(
        &mut state,
        &Operation::add_furniture(state.id.clone(), layout_id.clone(), placement),
    )
    .unwrap();

    c.bench_function("apply_furniture_move", |b| {
        let mut x = 0.0f32;
        b.iter(|| {
            x += 0.01;
            let op = Operation::update_furniture(
                state.id.clone(),
                layout_id.clone(),
                FurniturePlacementPatch {
                    id: placement_id.clone(),
                    position: Some(Vec3::new(x, 0.0, 0.0)),
                    rotation: None,
                    furniture_id: None,
                },
            );
            apply_operation(black_box(&mut state), black_box(&op)).unwrap();
        })
    });
}

fn bench_compute_inverse(c: &mut Criterion) {
    let state = demo_room_state(RoomId::generate());
    let light_id = state.lights.keys().next().unwrap().clone();
    let op = Operation::remove_light(state.id.clone(), light_id);

    c.bench_function("compute_inverse_remove_light", |b| {
        b.iter(|| {
            black_box(compute_inverse(black_box(&state), black_box(&op)));
        })
    });
}

fn bench_operation_json_roundtrip(c: &mut Criterion) {
    let state = demo_room_state(RoomId::generate());
    let scan: Vec<ObservedPlane> = state.planes.iter().map(|p| p.to_observed()).collect();
    let op = Operation::update_planes(state.id.clone(), scan, 0);
    let json = serde_json::to_string(&op).unwrap();

    c.bench_function("operation_json_roundtrip", |b| {
        b.iter(|| {
            let encoded = serde_json::to_string(black_box(&op)).unwrap();
            black_box(serde_json::from_str::<Operation>(&encoded).unwrap());
            black_box(&encoded);
        })
    });

    c.bench_function("operation_json_decode", |b| {
        b.iter(|| {
            black_box(serde_json::from_str::<Operation>(black_box(&json)).unwrap());
        })
    });
}

criterion_group!(
    benches,
    bench_merge_planes_small,
    bench_merge_planes_large,
    bench_apply_furniture_move,
    bench_compute_inverse,
    bench_operation_json_roundtrip,
);
criterion_main!(benches);
