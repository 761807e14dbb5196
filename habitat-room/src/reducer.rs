//! The room reducer: one operation in, one state transition out.
//!
//! `apply_operation` is the single write path for room state, shared by the
//! session host (against the canonical document) and by devices (against
//! their optimistic local copy), so both sides compute identical states
//! from the same operation stream.
//!
//! Every arm validates before its first write: on `Err` the state is
//! exactly what it was.

use crate::error::RoomError;
use crate::ops::Operation;
use crate::planes::merge_planes;
use crate::state::RoomState;

/// Applies one operation to a room state.
///
/// Editor operations mutate only the ephemeral `editor` field and are
/// silently skipped when the state carries no editor (the canonical
/// document never does).
pub fn apply_operation(state: &mut RoomState, op: &Operation) -> Result<(), RoomError> {
    if op.room_id() != &state.id {
        return Err(RoomError::validation(format!(
            "operation {} targets room {}, not {}",
            op.op_id(),
            op.room_id(),
            state.id
        )));
    }

    match op {
        Operation::UpdatePlanes(op) => {
            state.planes = merge_planes(&state.planes, &op.planes);
            state.planes_updated_at = Some(op.time);
            Ok(())
        }

        Operation::AddFurniture(op) => {
            let layout = state
                .layouts
                .get_mut(&op.room_layout_id)
                .ok_or_else(|| RoomError::not_found(format!("layout {}", op.room_layout_id)))?;
            if layout.furniture.contains_key(&op.data.id) {
                return Err(RoomError::conflict(format!(
                    "furniture placement {} already exists",
                    op.data.id
                )));
            }
            layout.furniture.insert(op.data.id.clone(), op.data.clone());
            Ok(())
        }

        Operation::UpdateFurniture(op) => {
            let layout = state
                .layouts
                .get_mut(&op.room_layout_id)
                .ok_or_else(|| RoomError::not_found(format!("layout {}", op.room_layout_id)))?;
            let placement = layout
                .furniture
                .get_mut(&op.data.id)
                .ok_or_else(|| RoomError::not_found(format!("furniture placement {}", op.data.id)))?;
            op.data.apply_to(placement);
            Ok(())
        }

        Operation::RemoveFurniture(op) => {
            let layout = state
                .layouts
                .get_mut(&op.room_layout_id)
                .ok_or_else(|| RoomError::not_found(format!("layout {}", op.room_layout_id)))?;
            if layout.furniture.remove(&op.id).is_none() {
                return Err(RoomError::not_found(format!("furniture placement {}", op.id)));
            }
            Ok(())
        }

        Operation::AddLight(op) => {
            if state.lights.contains_key(&op.data.id) {
                return Err(RoomError::conflict(format!(
                    "light placement {} already exists",
                    op.data.id
                )));
            }
            state.lights.insert(op.data.id.clone(), op.data.clone());
            Ok(())
        }

        Operation::UpdateLight(op) => {
            let light = state
                .lights
                .get_mut(&op.data.id)
                .ok_or_else(|| RoomError::not_found(format!("light placement {}", op.data.id)))?;
            op.data.apply_to(light);
            Ok(())
        }

        Operation::RemoveLight(op) => {
            if state.lights.remove(&op.id).is_none() {
                return Err(RoomError::not_found(format!("light placement {}", op.id)));
            }
            Ok(())
        }

        Operation::UpdateGlobalLighting(op) => {
            op.data.apply_to(&mut state.global_lighting);
            Ok(())
        }

        Operation::CreateLayout(op) => {
            if state.layouts.contains_key(&op.data.id) {
                return Err(RoomError::conflict(format!("layout {} already exists", op.data.id)));
            }
            state.layouts.insert(op.data.id.clone(), op.data.clone());
            Ok(())
        }

        Operation::UpdateLayout(op) => {
            let layout = state
                .layouts
                .get_mut(&op.data.id)
                .ok_or_else(|| RoomError::not_found(format!("layout {}", op.data.id)))?;
            op.data.apply_to(layout);
            Ok(())
        }

        Operation::DeleteLayout(op) => {
            if !state.layouts.contains_key(&op.room_layout_id) {
                return Err(RoomError::not_found(format!("layout {}", op.room_layout_id)));
            }
            // a room always retains at least one layout
            if state.layouts.len() == 1 {
                return Err(RoomError::conflict(format!(
                    "layout {} is the room's last layout",
                    op.room_layout_id
                )));
            }
            state.layouts.remove(&op.room_layout_id);
            if let Some(editor) = &mut state.editor {
                if editor.selected_layout_id.as_ref() == Some(&op.room_layout_id) {
                    editor.selected_layout_id = None;
                }
            }
            Ok(())
        }

        Operation::SelectLayout(op) => {
            // selecting a layout that no longer exists is a no-op, not an
            // error: the deletion may simply have raced the selection
            if state.layouts.contains_key(&op.layout_id) {
                if let Some(editor) = &mut state.editor {
                    editor.selected_layout_id = Some(op.layout_id.clone());
                    // the selected object belonged to the previous layout
                    editor.selected_object_id = None;
                }
            }
            Ok(())
        }

        Operation::SelectObject(op) => {
            if let Some(editor) = &mut state.editor {
                editor.selected_object_id = op.object_id.clone();
            }
            Ok(())
        }

        Operation::SetPlacingFurniture(op) => {
            if let Some(editor) = &mut state.editor {
                // entering placement mode deselects whatever was selected
                editor.selected_object_id = None;
                editor.placing_furniture_id = op.furniture_id.clone();
            }
            Ok(())
        }

        Operation::SetEditorMode(op) => {
            if let Some(editor) = &mut state.editor {
                editor.mode = op.mode;
            }
            Ok(())
        }
    }
}
