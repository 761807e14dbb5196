//! Inverse-operation generation and the per-session undo stack.
//!
//! There is no snapshot-based undo: undoing means submitting the *inverse
//! operation* through the normal pipeline, so an undo behaves exactly like
//! any other edit — validated by the reducer, broadcast to peers, and
//! itself undoable by them in principle.

use crate::ops::{FurniturePlacementPatch, GlobalLightingPatch, LightPlacementPatch, Operation};
use crate::state::RoomState;

/// Computes the operation that reverses `op`, given the state it is about
/// to be applied to.
///
/// Must be called with the *pre-application* state: updates and removals
/// need the prior record to build their inverse. Returns `None` for
/// operations that are not undoable (plane scans, layout metadata edits,
/// editor state) and when the record the inverse would need no longer
/// exists.
pub fn compute_inverse(before: &RoomState, op: &Operation) -> Option<Operation> {
    match op {
        // scans overwrite derived sensor data; replaying an old scan is
        // never what the user means by undo
        Operation::UpdatePlanes(_) => None,

        Operation::AddFurniture(op) => Some(Operation::remove_furniture(
            op.room_id.clone(),
            op.room_layout_id.clone(),
            op.data.id.clone(),
        )),

        Operation::UpdateFurniture(op) => {
            let prior = before.furniture(&op.room_layout_id, &op.data.id)?;
            Some(Operation::update_furniture(
                op.room_id.clone(),
                op.room_layout_id.clone(),
                FurniturePlacementPatch::snapshot(prior),
            ))
        }

        Operation::RemoveFurniture(op) => {
            let prior = before.furniture(&op.room_layout_id, &op.id)?;
            Some(Operation::add_furniture(
                op.room_id.clone(),
                op.room_layout_id.clone(),
                prior.clone(),
            ))
        }

        Operation::AddLight(op) => {
            Some(Operation::remove_light(op.room_id.clone(), op.data.id.clone()))
        }

        Operation::UpdateLight(op) => {
            let prior = before.light(&op.data.id)?;
            Some(Operation::update_light(
                op.room_id.clone(),
                LightPlacementPatch::snapshot(prior),
            ))
        }

        Operation::RemoveLight(op) => {
            let prior = before.light(&op.id)?;
            Some(Operation::add_light(op.room_id.clone(), prior.clone()))
        }

        Operation::UpdateGlobalLighting(op) => Some(Operation::update_global_lighting(
            op.room_id.clone(),
            GlobalLightingPatch::snapshot(&before.global_lighting),
        )),

        Operation::CreateLayout(op) => {
            Some(Operation::delete_layout(op.room_id.clone(), op.data.id.clone()))
        }

        // a layout patch cannot clear a field, so no patch can restore
        // name/icon/kind that were unset before the edit; metadata edits
        // are not undoable
        Operation::UpdateLayout(_) => None,

        // the inverse carries the full layout, furniture included, so undo
        // restores everything the deletion destroyed
        Operation::DeleteLayout(op) => {
            let prior = before.layout(&op.room_layout_id)?;
            Some(Operation::create_layout(op.room_id.clone(), prior.clone()))
        }

        Operation::SelectLayout(_)
        | Operation::SelectObject(_)
        | Operation::SetPlacingFurniture(_)
        | Operation::SetEditorMode(_) => None,
    }
}

/// Default [`UndoStack`] capacity.
pub const DEFAULT_UNDO_CAPACITY: usize = 128;

#[derive(Debug, Clone)]
struct UndoEntry {
    op: Operation,
    inverse: Operation,
}

/// An ordered history of `(operation, inverse)` pairs with a cursor.
///
/// Owned by one editing session; it tracks only that session's own
/// operations. `undo`/`redo` do not mutate any room state themselves —
/// they hand back the operation to submit through the normal pipeline,
/// reissued under a fresh op id.
#[derive(Debug)]
pub struct UndoStack {
    entries: Vec<UndoEntry>,
    /// Number of entries currently applied; entries past the cursor are
    /// redoable.
    cursor: usize,
    capacity: usize,
}

impl UndoStack {
    pub fn new(capacity: usize) -> Self {
        Self { entries: Vec::new(), cursor: 0, capacity: capacity.max(1) }
    }

    /// Records an operation this session just applied. Truncates any redo
    /// tail and evicts the oldest entry once at capacity.
    pub fn record(&mut self, op: Operation, inverse: Operation) {
        self.entries.truncate(self.cursor);
        if self.entries.len() == self.capacity {
            self.entries.remove(0);
        }
        self.entries.push(UndoEntry { op, inverse });
        self.cursor = self.entries.len();
    }

    /// Steps the cursor back and returns the inverse to submit, or `None`
    /// when there is nothing left to undo.
    pub fn undo(&mut self) -> Option<Operation> {
        if self.cursor == 0 {
            return None;
        }
        self.cursor -= 1;
        Some(self.entries[self.cursor].inverse.reissued())
    }

    /// Steps the cursor forward and returns the original operation to
    /// re-submit, or `None` when there is nothing to redo.
    pub fn redo(&mut self) -> Option<Operation> {
        let entry = self.entries.get(self.cursor)?;
        self.cursor += 1;
        Some(entry.op.reissued())
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor < self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.cursor = 0;
    }
}

impl Default for UndoStack {
    fn default() -> Self {
        Self::new(DEFAULT_UNDO_CAPACITY)
    }
}
