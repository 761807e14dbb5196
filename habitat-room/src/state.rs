//! Room state schema and document migration.
//!
//! A [`RoomState`] is the canonical document for one room: its detected
//! planes, its furniture layouts, its lights, and global lighting settings.
//! The wire and persisted encodings are the same camelCase JSON, so a
//! document written by any device can be loaded by any other.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::RoomError;
use crate::geometry::{Quat, Vec3};
use crate::ids::{
    FurnitureId, FurniturePlacementId, LayoutId, LightPlacementId, ObjectId, PlaneId, RoomId,
};

/// Current schema version. Documents with a newer version are rejected;
/// older/unversioned documents are migrated on load.
pub const ROOM_STATE_VERSION: u32 = 1;

/// Milliseconds since the Unix epoch.
pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

/// A detected (or synthetic) flat surface of the room.
///
/// All planes are positioned relative to one primary plane, usually the
/// floor, whose transform is close to identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RoomPlaneData {
    pub id: PlaneId,
    /// Semantic label assigned by the scanning device: floor, wall,
    /// ceiling, door, window, storage, …
    pub label: String,
    pub origin: Vec3,
    pub orientation: Quat,
    /// Local plane width and depth, in meters.
    pub extents: [f32; 2],
}

/// A freshly observed plane: same geometry as [`RoomPlaneData`] but with no
/// id yet. Scans produce these; reconciliation assigns ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ObservedPlane {
    pub label: String,
    pub origin: Vec3,
    pub orientation: Quat,
    pub extents: [f32; 2],
}

impl RoomPlaneData {
    /// Binds an observation to an id.
    pub fn from_observed(id: PlaneId, observed: &ObservedPlane) -> Self {
        Self {
            id,
            label: observed.label.clone(),
            origin: observed.origin,
            orientation: observed.orientation,
            extents: observed.extents,
        }
    }

    pub fn to_observed(&self) -> ObservedPlane {
        ObservedPlane {
            label: self.label.clone(),
            origin: self.origin,
            orientation: self.orientation,
            extents: self.extents,
        }
    }
}

/// Placement of a single piece of catalog furniture within a layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RoomFurniturePlacement {
    pub id: FurniturePlacementId,
    pub position: Vec3,
    /// Unit quaternion.
    pub rotation: Quat,
    pub furniture_id: FurnitureId,
}

/// Placement of a single directional light, usually a ceiling light.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RoomLightPlacement {
    pub id: LightPlacementId,
    pub position: Vec3,
}

/// Ambient lighting applied to the whole room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GlobalLighting {
    /// Color temperature scalar (thousands of kelvin).
    pub color: f32,
    pub intensity: f32,
}

impl Default for GlobalLighting {
    fn default() -> Self {
        Self { color: 6.5, intensity: 1.7 }
    }
}

/// A named furniture arrangement. A room may hold several layouts sharing
/// the same physical planes; a room always retains at least one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RoomLayout {
    pub id: LayoutId,
    #[serde(default)]
    pub furniture: BTreeMap<FurniturePlacementId, RoomFurniturePlacement>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// Room-type tag, e.g. `living-room`.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

/// Which panel of the layout editor is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditorMode {
    Layouts,
    Furniture,
    Lighting,
    Settings,
}

/// Per-connection editor state: selections and mode.
///
/// Ephemeral — broadcast to other sessions for UX convenience, never part
/// of the canonical persisted document and never undoable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorState {
    pub selected_layout_id: Option<LayoutId>,
    pub selected_object_id: Option<ObjectId>,
    pub placing_furniture_id: Option<FurnitureId>,
    pub mode: EditorMode,
}

impl Default for EditorState {
    fn default() -> Self {
        Self {
            selected_layout_id: None,
            selected_object_id: None,
            placing_furniture_id: None,
            mode: EditorMode::Layouts,
        }
    }
}

/// The canonical state document for one room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomState {
    pub id: RoomId,
    /// Schema version, see [`ROOM_STATE_VERSION`].
    pub version: u32,
    /// Milliseconds since epoch.
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub updated_at: i64,
    /// Unique by id.
    pub planes: Vec<RoomPlaneData>,
    /// When the plane set was last replaced by a scan. `None` means the
    /// planes are demo/synthetic and should be overwritten by any real scan.
    pub planes_updated_at: Option<i64>,
    pub layouts: BTreeMap<LayoutId, RoomLayout>,
    pub lights: BTreeMap<LightPlacementId, RoomLightPlacement>,
    pub global_lighting: GlobalLighting,
    /// Ephemeral per-connection editor state. The canonical authority keeps
    /// this `None`; only a device's local optimistic copy carries `Some`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub editor: Option<EditorState>,
}

impl RoomState {
    pub fn layout(&self, id: &LayoutId) -> Option<&RoomLayout> {
        self.layouts.get(id)
    }

    pub fn furniture(
        &self,
        layout_id: &LayoutId,
        placement_id: &FurniturePlacementId,
    ) -> Option<&RoomFurniturePlacement> {
        self.layouts.get(layout_id)?.furniture.get(placement_id)
    }

    pub fn light(&self, id: &LightPlacementId) -> Option<&RoomLightPlacement> {
        self.lights.get(id)
    }

    /// A copy with ephemeral editor state stripped, suitable for
    /// persistence and for `roomUpdate` snapshots.
    pub fn canonical(&self) -> RoomState {
        let mut copy = self.clone();
        copy.editor = None;
        copy
    }
}

/// Ensures proper state shape for a persisted room document.
///
/// - Unversioned documents are migrated collection by collection: every
///   plane/layout/light record is validated independently and dropped if
///   invalid; the rest of the document survives.
/// - Version-1 documents are parsed strictly; a corrupt one falls back to
///   the unversioned path rather than failing the load.
/// - Documents newer than [`ROOM_STATE_VERSION`] fail with
///   [`RoomError::SchemaVersionUnsupported`] — there is no forward
///   migration.
pub fn migrate_room_state(doc: Value) -> Result<RoomState, RoomError> {
    match doc.get("version").and_then(Value::as_u64) {
        None | Some(0) => Ok(migrate_unversioned(doc)),
        Some(v) if v == ROOM_STATE_VERSION as u64 => {
            match serde_json::from_value::<RoomState>(doc.clone()) {
                Ok(mut state) => {
                    state.editor = None;
                    Ok(state)
                }
                Err(err) => {
                    log::warn!("room document failed strict parse, re-migrating: {err}");
                    let mut doc = doc;
                    if let Some(obj) = doc.as_object_mut() {
                        obj.remove("version");
                    }
                    Ok(migrate_unversioned(doc))
                }
            }
        }
        Some(v) => Err(RoomError::SchemaVersionUnsupported(v as u32)),
    }
}

fn migrate_unversioned(doc: Value) -> RoomState {
    let id = doc
        .get("id")
        .cloned()
        .and_then(|v| serde_json::from_value::<RoomId>(v).ok())
        .unwrap_or_else(RoomId::generate);

    let planes: Vec<RoomPlaneData> = doc
        .get("planes")
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(|p| serde_json::from_value(p.clone()).ok())
                .collect()
        })
        .unwrap_or_default();

    let mut layouts: BTreeMap<LayoutId, RoomLayout> = doc
        .get("layouts")
        .and_then(Value::as_object)
        .map(|obj| {
            obj.values()
                .filter_map(|l| serde_json::from_value::<RoomLayout>(l.clone()).ok())
                .map(|l| (l.id.clone(), l))
                .collect()
        })
        .unwrap_or_default();
    if layouts.is_empty() {
        // a room always retains at least one layout
        let layout = default_layout();
        layouts.insert(layout.id.clone(), layout);
    }

    let lights: BTreeMap<LightPlacementId, RoomLightPlacement> = doc
        .get("lights")
        .and_then(Value::as_object)
        .map(|obj| {
            obj.values()
                .filter_map(|l| serde_json::from_value::<RoomLightPlacement>(l.clone()).ok())
                .map(|l| (l.id.clone(), l))
                .collect()
        })
        .unwrap_or_default();

    let global_lighting = doc
        .get("globalLighting")
        .cloned()
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or_default();

    let now = now_ms();
    RoomState {
        id,
        version: ROOM_STATE_VERSION,
        created_at: doc.get("createdAt").and_then(Value::as_i64).unwrap_or(now),
        updated_at: doc.get("updatedAt").and_then(Value::as_i64).unwrap_or(now),
        planes,
        planes_updated_at: doc.get("planesUpdatedAt").and_then(Value::as_i64),
        layouts,
        lights,
        global_lighting,
        editor: None,
    }
}

pub(crate) fn default_layout() -> RoomLayout {
    RoomLayout {
        id: LayoutId::generate(),
        furniture: BTreeMap::new(),
        name: Some("Default layout".to_string()),
        icon: None,
        kind: Some("living-room".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn room_state_json_field_names_are_camel_case() {
        let state = crate::defaults::empty_room_state(RoomId::generate());
        let value = serde_json::to_value(&state).unwrap();
        assert!(value.get("planesUpdatedAt").is_some());
        assert!(value.get("globalLighting").is_some());
        assert!(value.get("editor").is_none());
    }

    #[test]
    fn layout_kind_serializes_as_type() {
        let layout = default_layout();
        let value = serde_json::to_value(&layout).unwrap();
        assert_eq!(value.get("type"), Some(&json!("living-room")));
    }

    #[test]
    fn migrates_unversioned_document_dropping_invalid_records() {
        let good_plane = json!({
            "id": "rp-1",
            "label": "floor",
            "origin": {"x": 0.0, "y": 0.0, "z": 0.0},
            "orientation": {"x": 0.0, "y": 0.0, "z": 0.0, "w": 1.0},
            "extents": [4.0, 4.0],
        });
        let bad_plane = json!({ "id": "rp-2", "label": "wall" }); // missing geometry
        let doc = json!({
            "id": "r-abc",
            "planes": [good_plane, bad_plane],
            "layouts": {
                "rl-1": {"id": "rl-1", "furniture": {}, "name": "A"},
                "rl-2": {"id": "rl-2"}, // valid: furniture defaults
                "rl-3": {"name": "missing id"},
            },
            "lights": {
                "lp-1": {"id": "lp-1", "position": {"x": 0.0, "y": 2.0, "z": 0.0}},
                "lp-2": {"id": "lp-2"}, // missing position, dropped
            },
            "globalLighting": {"color": 5.0, "intensity": 1.0},
        });

        let state = migrate_room_state(doc).unwrap();
        assert_eq!(state.version, ROOM_STATE_VERSION);
        assert_eq!(state.id.as_str(), "r-abc");
        assert_eq!(state.planes.len(), 1);
        assert_eq!(state.layouts.len(), 2);
        assert_eq!(state.lights.len(), 1);
        assert_eq!(state.global_lighting.color, 5.0);
    }

    #[test]
    fn migration_falls_back_to_defaults_per_collection() {
        let state = migrate_room_state(json!({})).unwrap();
        assert_eq!(state.version, ROOM_STATE_VERSION);
        assert!(state.planes.is_empty());
        // a room always retains at least one layout
        assert_eq!(state.layouts.len(), 1);
        assert_eq!(state.global_lighting, GlobalLighting::default());
    }

    #[test]
    fn current_version_round_trips() {
        let state = crate::defaults::demo_room_state(RoomId::generate());
        let doc = serde_json::to_value(&state).unwrap();
        let migrated = migrate_room_state(doc).unwrap();
        assert_eq!(migrated, state);
    }

    #[test]
    fn newer_version_is_rejected() {
        let doc = json!({ "id": "r-abc", "version": 2 });
        assert_eq!(
            migrate_room_state(doc),
            Err(RoomError::SchemaVersionUnsupported(2))
        );
    }

    #[test]
    fn corrupt_versioned_document_is_remigrated() {
        let doc = json!({
            "id": "r-abc",
            "version": 1,
            "planes": "not an array",
        });
        let state = migrate_room_state(doc).unwrap();
        assert!(state.planes.is_empty());
        assert_eq!(state.id.as_str(), "r-abc");
    }
}
