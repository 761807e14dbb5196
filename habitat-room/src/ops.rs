//! The closed set of mutations against a room.
//!
//! Every mutation — from a device drag to a fresh room scan — travels as
//! one [`Operation`], tagged by a `type` field on the wire. Payload structs
//! reject unknown fields, so a message from a newer client that this build
//! does not understand fails validation instead of being half-applied.
//!
//! Partial updates are explicit "all fields optional except id" patch
//! structs merged over the existing record, never untyped maps.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::geometry::{Quat, Vec3};
use crate::ids::{
    FurnitureId, FurniturePlacementId, LayoutId, LightPlacementId, ObjectId, OperationId, RoomId,
};
use crate::state::{
    EditorMode, GlobalLighting, ObservedPlane, RoomFurniturePlacement, RoomLayout,
    RoomLightPlacement,
};

/// Patch for a furniture placement. Fields left `None` keep their value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FurniturePlacementPatch {
    pub id: FurniturePlacementId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Vec3>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<Quat>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub furniture_id: Option<FurnitureId>,
}

impl FurniturePlacementPatch {
    /// A patch carrying every field of `placement` — the full-snapshot form
    /// used by inverse operations.
    pub fn snapshot(placement: &RoomFurniturePlacement) -> Self {
        Self {
            id: placement.id.clone(),
            position: Some(placement.position),
            rotation: Some(placement.rotation),
            furniture_id: Some(placement.furniture_id.clone()),
        }
    }

    pub fn apply_to(&self, placement: &mut RoomFurniturePlacement) {
        if let Some(position) = self.position {
            placement.position = position;
        }
        if let Some(rotation) = self.rotation {
            placement.rotation = rotation;
        }
        if let Some(furniture_id) = &self.furniture_id {
            placement.furniture_id = furniture_id.clone();
        }
    }
}

/// Patch for a light placement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LightPlacementPatch {
    pub id: LightPlacementId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Vec3>,
}

impl LightPlacementPatch {
    pub fn snapshot(light: &RoomLightPlacement) -> Self {
        Self { id: light.id.clone(), position: Some(light.position) }
    }

    pub fn apply_to(&self, light: &mut RoomLightPlacement) {
        if let Some(position) = self.position {
            light.position = position;
        }
    }
}

/// Patch for global lighting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GlobalLightingPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intensity: Option<f32>,
}

impl GlobalLightingPatch {
    pub fn snapshot(lighting: &GlobalLighting) -> Self {
        Self { color: Some(lighting.color), intensity: Some(lighting.intensity) }
    }

    pub fn apply_to(&self, lighting: &mut GlobalLighting) {
        if let Some(color) = self.color {
            lighting.color = color;
        }
        if let Some(intensity) = self.intensity {
            lighting.intensity = intensity;
        }
    }
}

/// Patch for layout metadata. The furniture map is not patchable here;
/// furniture changes go through the furniture operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LayoutPatch {
    pub id: LayoutId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl LayoutPatch {
    pub fn apply_to(&self, layout: &mut RoomLayout) {
        if let Some(name) = &self.name {
            layout.name = Some(name.clone());
        }
        if let Some(icon) = &self.icon {
            layout.icon = Some(icon.clone());
        }
        if let Some(kind) = &self.kind {
            layout.kind = Some(kind.clone());
        }
    }
}

// ─── Operation payloads ─────────────────────────────────────────────────

/// Replace the room's plane set with a fresh scan, via reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdatePlanesOperation {
    pub op_id: OperationId,
    pub room_id: RoomId,
    pub planes: Vec<ObservedPlane>,
    /// Milliseconds since epoch when the scan was taken.
    pub time: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AddFurnitureOperation {
    pub op_id: OperationId,
    pub room_id: RoomId,
    pub room_layout_id: LayoutId,
    pub data: RoomFurniturePlacement,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateFurnitureOperation {
    pub op_id: OperationId,
    pub room_id: RoomId,
    pub room_layout_id: LayoutId,
    pub data: FurniturePlacementPatch,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RemoveFurnitureOperation {
    pub op_id: OperationId,
    pub room_id: RoomId,
    pub room_layout_id: LayoutId,
    pub id: FurniturePlacementId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AddLightOperation {
    pub op_id: OperationId,
    pub room_id: RoomId,
    pub data: RoomLightPlacement,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateLightOperation {
    pub op_id: OperationId,
    pub room_id: RoomId,
    pub data: LightPlacementPatch,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RemoveLightOperation {
    pub op_id: OperationId,
    pub room_id: RoomId,
    pub id: LightPlacementId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateGlobalLightingOperation {
    pub op_id: OperationId,
    pub room_id: RoomId,
    pub data: GlobalLightingPatch,
}

/// Create a layout. `data.furniture` is usually empty; an inverse of
/// `deleteLayout` carries the full furniture map so undo restores it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateLayoutOperation {
    pub op_id: OperationId,
    pub room_id: RoomId,
    pub data: RoomLayout,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateLayoutOperation {
    pub op_id: OperationId,
    pub room_id: RoomId,
    pub data: LayoutPatch,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DeleteLayoutOperation {
    pub op_id: OperationId,
    pub room_id: RoomId,
    pub room_layout_id: LayoutId,
}

// Editor operations: per-connection ephemeral state only.

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SelectLayoutOperation {
    pub op_id: OperationId,
    pub room_id: RoomId,
    pub layout_id: LayoutId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SelectObjectOperation {
    pub op_id: OperationId,
    pub room_id: RoomId,
    pub object_id: Option<ObjectId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SetPlacingFurnitureOperation {
    pub op_id: OperationId,
    pub room_id: RoomId,
    pub furniture_id: Option<FurnitureId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SetEditorModeOperation {
    pub op_id: OperationId,
    pub room_id: RoomId,
    pub mode: EditorMode,
}

/// One schema-validated mutation request against a room's canonical state.
///
/// The enum is closed and the reducer matches exhaustively, so adding a
/// variant without handling it everywhere is a compile error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Operation {
    UpdatePlanes(UpdatePlanesOperation),
    AddFurniture(AddFurnitureOperation),
    UpdateFurniture(UpdateFurnitureOperation),
    RemoveFurniture(RemoveFurnitureOperation),
    AddLight(AddLightOperation),
    UpdateLight(UpdateLightOperation),
    RemoveLight(RemoveLightOperation),
    UpdateGlobalLighting(UpdateGlobalLightingOperation),
    CreateLayout(CreateLayoutOperation),
    UpdateLayout(UpdateLayoutOperation),
    DeleteLayout(DeleteLayoutOperation),
    SelectLayout(SelectLayoutOperation),
    SelectObject(SelectObjectOperation),
    SetPlacingFurniture(SetPlacingFurnitureOperation),
    SetEditorMode(SetEditorModeOperation),
}

impl Operation {
    // ─── Constructors (each mints a fresh op id) ────────────────────────

    pub fn update_planes(room_id: RoomId, planes: Vec<ObservedPlane>, time: i64) -> Self {
        Operation::UpdatePlanes(UpdatePlanesOperation {
            op_id: OperationId::generate(),
            room_id,
            planes,
            time,
        })
    }

    pub fn add_furniture(
        room_id: RoomId,
        room_layout_id: LayoutId,
        data: RoomFurniturePlacement,
    ) -> Self {
        Operation::AddFurniture(AddFurnitureOperation {
            op_id: OperationId::generate(),
            room_id,
            room_layout_id,
            data,
        })
    }

    pub fn update_furniture(
        room_id: RoomId,
        room_layout_id: LayoutId,
        data: FurniturePlacementPatch,
    ) -> Self {
        Operation::UpdateFurniture(UpdateFurnitureOperation {
            op_id: OperationId::generate(),
            room_id,
            room_layout_id,
            data,
        })
    }

    pub fn remove_furniture(
        room_id: RoomId,
        room_layout_id: LayoutId,
        id: FurniturePlacementId,
    ) -> Self {
        Operation::RemoveFurniture(RemoveFurnitureOperation {
            op_id: OperationId::generate(),
            room_id,
            room_layout_id,
            id,
        })
    }

    pub fn add_light(room_id: RoomId, data: RoomLightPlacement) -> Self {
        Operation::AddLight(AddLightOperation {
            op_id: OperationId::generate(),
            room_id,
            data,
        })
    }

    pub fn update_light(room_id: RoomId, data: LightPlacementPatch) -> Self {
        Operation::UpdateLight(UpdateLightOperation {
            op_id: OperationId::generate(),
            room_id,
            data,
        })
    }

    pub fn remove_light(room_id: RoomId, id: LightPlacementId) -> Self {
        Operation::RemoveLight(RemoveLightOperation {
            op_id: OperationId::generate(),
            room_id,
            id,
        })
    }

    pub fn update_global_lighting(room_id: RoomId, data: GlobalLightingPatch) -> Self {
        Operation::UpdateGlobalLighting(UpdateGlobalLightingOperation {
            op_id: OperationId::generate(),
            room_id,
            data,
        })
    }

    pub fn create_layout(room_id: RoomId, data: RoomLayout) -> Self {
        Operation::CreateLayout(CreateLayoutOperation {
            op_id: OperationId::generate(),
            room_id,
            data,
        })
    }

    pub fn update_layout(room_id: RoomId, data: LayoutPatch) -> Self {
        Operation::UpdateLayout(UpdateLayoutOperation {
            op_id: OperationId::generate(),
            room_id,
            data,
        })
    }

    pub fn delete_layout(room_id: RoomId, room_layout_id: LayoutId) -> Self {
        Operation::DeleteLayout(DeleteLayoutOperation {
            op_id: OperationId::generate(),
            room_id,
            room_layout_id,
        })
    }

    pub fn select_layout(room_id: RoomId, layout_id: LayoutId) -> Self {
        Operation::SelectLayout(SelectLayoutOperation {
            op_id: OperationId::generate(),
            room_id,
            layout_id,
        })
    }

    pub fn select_object(room_id: RoomId, object_id: Option<ObjectId>) -> Self {
        Operation::SelectObject(SelectObjectOperation {
            op_id: OperationId::generate(),
            room_id,
            object_id,
        })
    }

    pub fn set_placing_furniture(room_id: RoomId, furniture_id: Option<FurnitureId>) -> Self {
        Operation::SetPlacingFurniture(SetPlacingFurnitureOperation {
            op_id: OperationId::generate(),
            room_id,
            furniture_id,
        })
    }

    pub fn set_editor_mode(room_id: RoomId, mode: EditorMode) -> Self {
        Operation::SetEditorMode(SetEditorModeOperation {
            op_id: OperationId::generate(),
            room_id,
            mode,
        })
    }

    // ─── Accessors ──────────────────────────────────────────────────────

    pub fn op_id(&self) -> &OperationId {
        match self {
            Operation::UpdatePlanes(op) => &op.op_id,
            Operation::AddFurniture(op) => &op.op_id,
            Operation::UpdateFurniture(op) => &op.op_id,
            Operation::RemoveFurniture(op) => &op.op_id,
            Operation::AddLight(op) => &op.op_id,
            Operation::UpdateLight(op) => &op.op_id,
            Operation::RemoveLight(op) => &op.op_id,
            Operation::UpdateGlobalLighting(op) => &op.op_id,
            Operation::CreateLayout(op) => &op.op_id,
            Operation::UpdateLayout(op) => &op.op_id,
            Operation::DeleteLayout(op) => &op.op_id,
            Operation::SelectLayout(op) => &op.op_id,
            Operation::SelectObject(op) => &op.op_id,
            Operation::SetPlacingFurniture(op) => &op.op_id,
            Operation::SetEditorMode(op) => &op.op_id,
        }
    }

    pub fn room_id(&self) -> &RoomId {
        match self {
            Operation::UpdatePlanes(op) => &op.room_id,
            Operation::AddFurniture(op) => &op.room_id,
            Operation::UpdateFurniture(op) => &op.room_id,
            Operation::RemoveFurniture(op) => &op.room_id,
            Operation::AddLight(op) => &op.room_id,
            Operation::UpdateLight(op) => &op.room_id,
            Operation::RemoveLight(op) => &op.room_id,
            Operation::UpdateGlobalLighting(op) => &op.room_id,
            Operation::CreateLayout(op) => &op.room_id,
            Operation::UpdateLayout(op) => &op.room_id,
            Operation::DeleteLayout(op) => &op.room_id,
            Operation::SelectLayout(op) => &op.room_id,
            Operation::SelectObject(op) => &op.room_id,
            Operation::SetPlacingFurniture(op) => &op.room_id,
            Operation::SetEditorMode(op) => &op.room_id,
        }
    }

    fn op_id_mut(&mut self) -> &mut OperationId {
        match self {
            Operation::UpdatePlanes(op) => &mut op.op_id,
            Operation::AddFurniture(op) => &mut op.op_id,
            Operation::UpdateFurniture(op) => &mut op.op_id,
            Operation::RemoveFurniture(op) => &mut op.op_id,
            Operation::AddLight(op) => &mut op.op_id,
            Operation::UpdateLight(op) => &mut op.op_id,
            Operation::RemoveLight(op) => &mut op.op_id,
            Operation::UpdateGlobalLighting(op) => &mut op.op_id,
            Operation::CreateLayout(op) => &mut op.op_id,
            Operation::UpdateLayout(op) => &mut op.op_id,
            Operation::DeleteLayout(op) => &mut op.op_id,
            Operation::SelectLayout(op) => &mut op.op_id,
            Operation::SelectObject(op) => &mut op.op_id,
            Operation::SetPlacingFurniture(op) => &mut op.op_id,
            Operation::SetEditorMode(op) => &mut op.op_id,
        }
    }

    /// A copy with a fresh op id. Undo/redo re-submits operations as
    /// brand-new ones, so echoes and replays stay distinguishable.
    pub fn reissued(&self) -> Operation {
        let mut copy = self.clone();
        *copy.op_id_mut() = OperationId::generate();
        copy
    }

    /// Whether this operation touches only ephemeral per-connection editor
    /// state. Editor operations are broadcast but never persisted.
    pub fn is_editor(&self) -> bool {
        matches!(
            self,
            Operation::SelectLayout(_)
                | Operation::SelectObject(_)
                | Operation::SetPlacingFurniture(_)
                | Operation::SetEditorMode(_)
        )
    }

    /// Whether this operation mutates the canonical room document (and
    /// therefore must be persisted after application).
    pub fn mutates_room(&self) -> bool {
        !self.is_editor()
    }

    /// The layout created by this operation, if it is a `createLayout`.
    pub fn created_layout(&self) -> Option<&RoomLayout> {
        match self {
            Operation::CreateLayout(op) => Some(&op.data),
            _ => None,
        }
    }
}

/// Convenience for building a fresh layout payload for `createLayout`.
pub fn new_layout(name: Option<String>, icon: Option<String>, kind: Option<String>) -> RoomLayout {
    RoomLayout {
        id: LayoutId::generate(),
        furniture: BTreeMap::new(),
        name,
        icon,
        kind,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room() -> RoomId {
        RoomId::generate()
    }

    #[test]
    fn wire_tag_is_camel_case() {
        let op = Operation::remove_light(room(), LightPlacementId::generate());
        let value = serde_json::to_value(&op).unwrap();
        assert_eq!(value.get("type").unwrap(), "removeLight");
        assert!(value.get("opId").is_some());
        assert!(value.get("roomId").is_some());
    }

    #[test]
    fn decodes_wire_form() {
        let json = r#"{
            "type": "addLight",
            "opId": "op-1",
            "roomId": "r-1",
            "data": {"id": "lp-1", "position": {"x": 1.0, "y": 2.0, "z": 3.0}}
        }"#;
        let op: Operation = serde_json::from_str(json).unwrap();
        match op {
            Operation::AddLight(add) => assert_eq!(add.data.id.as_str(), "lp-1"),
            other => panic!("wrong variant: {other:?}"),
        }
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let json = r#"{
            "type": "removeLight",
            "opId": "op-1",
            "roomId": "r-1",
            "id": "lp-1",
            "bogus": true
        }"#;
        assert!(serde_json::from_str::<Operation>(json).is_err());
    }

    #[test]
    fn missing_fields_are_rejected() {
        let json = r#"{"type": "removeLight", "opId": "op-1", "roomId": "r-1"}"#;
        assert!(serde_json::from_str::<Operation>(json).is_err());
    }

    #[test]
    fn unknown_type_is_rejected() {
        let json = r#"{"type": "teleportFurniture", "opId": "op-1", "roomId": "r-1"}"#;
        assert!(serde_json::from_str::<Operation>(json).is_err());
    }

    #[test]
    fn patch_merges_only_present_fields() {
        let mut placement = RoomFurniturePlacement {
            id: FurniturePlacementId::generate(),
            position: Vec3::new(1.0, 0.0, 1.0),
            rotation: Quat::IDENTITY,
            furniture_id: FurnitureId::generate(),
        };
        let original_furniture = placement.furniture_id.clone();
        let patch = FurniturePlacementPatch {
            id: placement.id.clone(),
            position: Some(Vec3::new(2.0, 0.0, 2.0)),
            rotation: None,
            furniture_id: None,
        };
        patch.apply_to(&mut placement);
        assert_eq!(placement.position, Vec3::new(2.0, 0.0, 2.0));
        assert_eq!(placement.rotation, Quat::IDENTITY);
        assert_eq!(placement.furniture_id, original_furniture);
    }

    #[test]
    fn reissued_changes_only_op_id() {
        let op = Operation::remove_light(room(), LightPlacementId::generate());
        let reissued = op.reissued();
        assert_ne!(op.op_id(), reissued.op_id());
        assert_eq!(op.room_id(), reissued.room_id());
    }

    #[test]
    fn editor_classification() {
        let r = room();
        assert!(Operation::set_editor_mode(r.clone(), EditorMode::Lighting).is_editor());
        assert!(!Operation::update_planes(r.clone(), vec![], 0).is_editor());
        assert!(Operation::update_planes(r, vec![], 0).mutates_room());
    }

    #[test]
    fn operation_round_trip() {
        let op = Operation::update_furniture(
            room(),
            LayoutId::generate(),
            FurniturePlacementPatch {
                id: FurniturePlacementId::generate(),
                position: Some(Vec3::new(0.5, 0.0, -0.5)),
                rotation: None,
                furniture_id: None,
            },
        );
        let json = serde_json::to_string(&op).unwrap();
        let back: Operation = serde_json::from_str(&json).unwrap();
        assert_eq!(op, back);
    }
}
