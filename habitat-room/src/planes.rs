//! Plane reconciliation.
//!
//! Devices rescan the room and produce fresh plane observations with no
//! identity. Reconciliation matches each observation against the planes the
//! room already knows so furniture anchored to a wall stays anchored to the
//! *same* wall across scans; unmatched observations get fresh ids.

use crate::ids::PlaneId;
use crate::state::{ObservedPlane, RoomPlaneData};

/// Two plane origins within this distance (meters) can match.
pub const ORIGIN_TOLERANCE_M: f32 = 0.1;

/// Orientation match threshold: |q1 · q2| must exceed `1 - ORIENTATION_TOLERANCE`.
pub const ORIENTATION_TOLERANCE: f32 = 0.01;

/// Extents match threshold: |Δwidth| + |Δdepth| must stay below this (meters).
pub const EXTENTS_TOLERANCE_M: f32 = 0.1;

/// A plane set older than this (milliseconds) is due for a rescan.
pub const PLANE_STALENESS_MS: i64 = 60_000;

fn planes_match(existing: &RoomPlaneData, observed: &ObservedPlane) -> bool {
    if existing.label != observed.label {
        return false;
    }
    // q and -q encode the same rotation, so compare the absolute dot.
    if existing.orientation.dot(&observed.orientation).abs() <= 1.0 - ORIENTATION_TOLERANCE {
        return false;
    }
    if existing.origin.distance(&observed.origin) >= ORIGIN_TOLERANCE_M {
        return false;
    }
    let extents_delta = (existing.extents[0] - observed.extents[0]).abs()
        + (existing.extents[1] - observed.extents[1]).abs();
    extents_delta < EXTENTS_TOLERANCE_M
}

/// Reconciles a fresh scan against the room's existing planes.
///
/// The result contains exactly one plane per observation, with the
/// observation's geometry. An observation that matches an existing plane
/// (same label, near-identical orientation, origin, and extents) inherits
/// that plane's id; otherwise it gets a fresh one. Each existing plane is
/// consumed by at most one observation; when several qualify, the one with
/// the closest origin wins. Existing planes no observation matched are
/// dropped.
pub fn merge_planes(existing: &[RoomPlaneData], observed: &[ObservedPlane]) -> Vec<RoomPlaneData> {
    let mut unclaimed: Vec<&RoomPlaneData> = existing.iter().collect();

    observed
        .iter()
        .map(|obs| {
            let best = unclaimed
                .iter()
                .enumerate()
                .filter(|(_, plane)| planes_match(plane, obs))
                .min_by(|(_, a), (_, b)| {
                    let da = a.origin.distance(&obs.origin);
                    let db = b.origin.distance(&obs.origin);
                    da.total_cmp(&db)
                })
                .map(|(idx, _)| idx);

            let id = match best {
                Some(idx) => unclaimed.swap_remove(idx).id.clone(),
                None => PlaneId::generate(),
            };
            RoomPlaneData::from_observed(id, obs)
        })
        .collect()
}

/// Whether a room is due for a fresh scan: never scanned, or last scanned
/// more than [`PLANE_STALENESS_MS`] ago.
pub fn scan_is_due(planes_updated_at: Option<i64>, now_ms: i64) -> bool {
    match planes_updated_at {
        None => true,
        Some(at) => now_ms.saturating_sub(at) > PLANE_STALENESS_MS,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Quat, Vec3};

    fn wall(origin: Vec3) -> RoomPlaneData {
        RoomPlaneData {
            id: PlaneId::generate(),
            label: "wall".to_string(),
            origin,
            orientation: Quat::IDENTITY,
            extents: [4.0, 2.5],
        }
    }

    fn observe(plane: &RoomPlaneData) -> ObservedPlane {
        plane.to_observed()
    }

    #[test]
    fn matching_observation_keeps_the_id() {
        let existing = wall(Vec3::new(0.0, 1.25, -2.0));
        let mut obs = observe(&existing);
        obs.origin.x += 0.05; // within tolerance
        let merged = merge_planes(&[existing.clone()], &[obs]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].id, existing.id);
        // geometry comes from the observation, not the stale record
        assert!((merged[0].origin.x - 0.05).abs() < 1e-6);
    }

    #[test]
    fn moved_plane_gets_a_fresh_id() {
        let existing = wall(Vec3::new(0.0, 1.25, -2.0));
        let mut obs = observe(&existing);
        obs.origin.x += 0.5; // beyond tolerance
        let merged = merge_planes(&[existing.clone()], &[obs]);
        assert_ne!(merged[0].id, existing.id);
    }

    #[test]
    fn label_mismatch_never_matches() {
        let existing = wall(Vec3::ZERO);
        let mut obs = observe(&existing);
        obs.label = "door".to_string();
        let merged = merge_planes(&[existing.clone()], &[obs]);
        assert_ne!(merged[0].id, existing.id);
    }

    #[test]
    fn rotated_plane_gets_a_fresh_id() {
        let existing = wall(Vec3::ZERO);
        let mut obs = observe(&existing);
        // well past the orientation threshold (~8° about X)
        obs.orientation = Quat::new(0.07, 0.0, 0.0, 0.997_546_9);
        let merged = merge_planes(&[existing.clone()], &[obs]);
        assert_ne!(merged[0].id, existing.id);
    }

    #[test]
    fn negated_quaternion_still_matches() {
        let existing = wall(Vec3::ZERO);
        let mut obs = observe(&existing);
        let q = existing.orientation;
        obs.orientation = Quat::new(-q.x, -q.y, -q.z, -q.w);
        let merged = merge_planes(&[existing.clone()], &[obs]);
        assert_eq!(merged[0].id, existing.id);
    }

    #[test]
    fn resized_plane_gets_a_fresh_id() {
        let existing = wall(Vec3::ZERO);
        let mut obs = observe(&existing);
        obs.extents = [4.08, 2.55]; // deltas sum to 0.13
        let merged = merge_planes(&[existing.clone()], &[obs]);
        assert_ne!(merged[0].id, existing.id);
    }

    #[test]
    fn each_existing_plane_is_claimed_once() {
        let existing = wall(Vec3::ZERO);
        let near = observe(&existing);
        let mut far = observe(&existing);
        far.origin.x += 0.05;
        // both observations qualify; only the closer one inherits the id
        let merged = merge_planes(&[existing.clone()], &[far, near]);
        assert_eq!(merged.len(), 2);
        let inherited: Vec<_> = merged.iter().filter(|p| p.id == existing.id).collect();
        assert_eq!(inherited.len(), 1);
        assert_eq!(inherited[0].origin, Vec3::ZERO);
    }

    #[test]
    fn unobserved_planes_are_dropped() {
        let a = wall(Vec3::new(0.0, 1.25, -2.0));
        let b = wall(Vec3::new(0.0, 1.25, 2.0));
        let merged = merge_planes(&[a.clone(), b], &[observe(&a)]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].id, a.id);
    }

    #[test]
    fn rescan_reuses_matches_mints_new_drops_missing() {
        // four known planes, three observed: the floor and one wall come
        // back with sub-centimeter drift, the other wall comes back at its
        // exact pose but much larger, and the ceiling is not seen at all
        let floor = RoomPlaneData {
            id: PlaneId::generate(),
            label: "floor".to_string(),
            origin: Vec3::ZERO,
            orientation: Quat::IDENTITY,
            extents: [4.0, 4.0],
        };
        let wall_n = wall(Vec3::new(0.0, 1.25, -2.0));
        let wall_s = wall(Vec3::new(0.0, 1.25, 2.0));
        let ceiling = RoomPlaneData {
            id: PlaneId::generate(),
            label: "ceiling".to_string(),
            origin: Vec3::new(0.0, 2.5, 0.0),
            orientation: Quat::IDENTITY,
            extents: [4.0, 4.0],
        };
        let existing = [floor.clone(), wall_n.clone(), wall_s.clone(), ceiling.clone()];

        let mut drifted_floor = observe(&floor);
        drifted_floor.origin.x += 0.005;
        let mut drifted_wall = observe(&wall_n);
        drifted_wall.origin.z -= 0.008;
        let mut grown_wall = observe(&wall_s);
        grown_wall.extents = [5.0, 3.0]; // +1.0 m / +0.5 m
        let scan = vec![drifted_floor, drifted_wall, grown_wall];

        let merged = merge_planes(&existing, &scan);
        assert_eq!(merged.len(), 3);
        // drifted observations inherit their plane's id and carry the
        // fresh geometry
        assert_eq!(merged[0].id, floor.id);
        assert!((merged[0].origin.x - 0.005).abs() < 1e-6);
        assert_eq!(merged[1].id, wall_n.id);
        // identical pose does not save a wall that grew past the extents
        // tolerance
        assert_ne!(merged[2].id, wall_s.id);
        assert_eq!(merged[2].extents, [5.0, 3.0]);
        // the unobserved ceiling is gone
        assert!(!merged.iter().any(|p| p.id == ceiling.id || p.id == wall_s.id));
    }

    #[test]
    fn staleness_window() {
        assert!(scan_is_due(None, 0));
        assert!(!scan_is_due(Some(1_000), 30_000));
        assert!(!scan_is_due(Some(1_000), 61_000));
        assert!(scan_is_due(Some(1_000), 61_001));
    }
}
