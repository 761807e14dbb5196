//! Seed documents for rooms with no persisted state.
//!
//! The demo room is a synthetic 4m x 4m box so devices without scanning
//! hardware still get something to stand in. Its `planes_updated_at` is
//! `None`, so the first real scan replaces the geometry wholesale.

use std::collections::BTreeMap;
use std::f32::consts::FRAC_1_SQRT_2;

use crate::geometry::{Quat, Vec3};
use crate::ids::{LightPlacementId, PlaneId, RoomId};
use crate::state::{
    default_layout, now_ms, GlobalLighting, RoomLightPlacement, RoomPlaneData, RoomState,
};

/// A room with no planes, no lights, and a single empty default layout.
pub fn empty_room_state(id: RoomId) -> RoomState {
    let now = now_ms();
    let layout = default_layout();
    let mut layouts = BTreeMap::new();
    layouts.insert(layout.id.clone(), layout);
    RoomState {
        id,
        version: crate::state::ROOM_STATE_VERSION,
        created_at: now,
        updated_at: now,
        planes: Vec::new(),
        planes_updated_at: None,
        layouts,
        lights: BTreeMap::new(),
        global_lighting: GlobalLighting::default(),
        editor: None,
    }
}

fn plane(label: &str, origin: Vec3, orientation: Quat, extents: [f32; 2]) -> RoomPlaneData {
    RoomPlaneData {
        id: PlaneId::generate(),
        label: label.to_string(),
        origin,
        orientation,
        extents,
    }
}

/// A synthetic 4m x 4m x 2.5m room: floor, ceiling, four walls, a door on
/// the north wall, and two ceiling lights.
pub fn demo_room_state(id: RoomId) -> RoomState {
    let mut state = empty_room_state(id);

    // Orientations rotate world up onto the plane normal. Walls face
    // inward, the ceiling faces down.
    let north_wall = Quat::new(FRAC_1_SQRT_2, 0.0, 0.0, FRAC_1_SQRT_2); // +Z
    let south_wall = Quat::new(-FRAC_1_SQRT_2, 0.0, 0.0, FRAC_1_SQRT_2); // -Z
    let west_wall = Quat::new(0.0, 0.0, -FRAC_1_SQRT_2, FRAC_1_SQRT_2); // +X
    let east_wall = Quat::new(0.0, 0.0, FRAC_1_SQRT_2, FRAC_1_SQRT_2); // -X
    let ceiling = Quat::new(1.0, 0.0, 0.0, 0.0); // -Y

    state.planes = vec![
        plane("floor", Vec3::ZERO, Quat::IDENTITY, [4.0, 4.0]),
        plane("ceiling", Vec3::new(0.0, 2.5, 0.0), ceiling, [4.0, 4.0]),
        plane("wall", Vec3::new(0.0, 1.25, -2.0), north_wall, [4.0, 2.5]),
        plane("wall", Vec3::new(0.0, 1.25, 2.0), south_wall, [4.0, 2.5]),
        plane("wall", Vec3::new(-2.0, 1.25, 0.0), west_wall, [4.0, 2.5]),
        plane("wall", Vec3::new(2.0, 1.25, 0.0), east_wall, [4.0, 2.5]),
        plane("door", Vec3::new(1.0, 1.0, -2.0), north_wall, [0.9, 2.0]),
    ];

    for position in [Vec3::new(-1.0, 2.4, -1.0), Vec3::new(1.0, 2.4, 1.0)] {
        let light = RoomLightPlacement { id: LightPlacementId::generate(), position };
        state.lights.insert(light.id.clone(), light);
    }

    state
}
