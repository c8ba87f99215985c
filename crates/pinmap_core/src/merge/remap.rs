//! Identity remapping for imported entities.
//!
//! # Responsibility
//! - Give every imported note, frame and connection a fresh identifier.
//! - Rewrite internal references through explicit old-to-new lookup tables.
//!
//! # Invariants
//! - Notes and frames use separate lookup tables.
//! - A `group_id` missing from the frame table is cleared.
//! - A connection with an endpoint missing from the note table is dropped.
//! - An id shared by several input entities of one kind is ambiguous and
//!   left out of its table, so references to it resolve to nothing.
//! - The result does not depend on input iteration order.

use crate::model::connection::Connection;
use crate::model::frame::{Frame, FrameId};
use crate::model::note::{Note, NoteId};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// Imported entities after identity remapping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemappedEntities {
    pub notes: Vec<Note>,
    pub frames: Vec<Frame>,
    pub connections: Vec<Connection>,
    /// Original note id -> fresh note id.
    pub note_ids: HashMap<NoteId, NoteId>,
    /// Original frame id -> fresh frame id.
    pub frame_ids: HashMap<FrameId, FrameId>,
    pub cleared_group_ids: usize,
    pub dropped_connections: usize,
}

pub(crate) fn fresh_id() -> String {
    Uuid::new_v4().to_string()
}

/// Assigns fresh ids to all entities and rewrites their references.
///
/// Entities sharing an id each still receive their own fresh id, but
/// references to that id are cleared or dropped.
pub fn remap(
    mut notes: Vec<Note>,
    mut frames: Vec<Frame>,
    connections: Vec<Connection>,
) -> RemappedEntities {
    let frame_ids = assign_fresh_ids(frames.iter_mut().map(|frame| &mut frame.id));
    let note_ids = assign_fresh_ids(notes.iter_mut().map(|note| &mut note.id));

    let mut cleared_group_ids = 0;
    for note in &mut notes {
        if let Some(old_group) = note.group_id.take() {
            match frame_ids.get(&old_group) {
                Some(new_group) => note.group_id = Some(new_group.clone()),
                None => cleared_group_ids += 1,
            }
        }
    }

    let mut dropped_connections = 0;
    let mut remapped_connections = Vec::with_capacity(connections.len());
    for connection in connections {
        match (
            note_ids.get(&connection.from_note_id),
            note_ids.get(&connection.to_note_id),
        ) {
            (Some(from), Some(to)) => remapped_connections.push(Connection {
                id: fresh_id(),
                from_note_id: from.clone(),
                to_note_id: to.clone(),
            }),
            _ => dropped_connections += 1,
        }
    }

    RemappedEntities {
        notes,
        frames,
        connections: remapped_connections,
        note_ids,
        frame_ids,
        cleared_group_ids,
        dropped_connections,
    }
}

/// Replaces every id with a fresh one and returns the unambiguous
/// old-to-new table.
fn assign_fresh_ids<'a>(ids: impl Iterator<Item = &'a mut String>) -> HashMap<String, String> {
    let mut table = HashMap::new();
    let mut ambiguous = HashSet::new();
    for id in ids {
        let old_id = std::mem::replace(id, fresh_id());
        if table.insert(old_id.clone(), id.clone()).is_some() {
            ambiguous.insert(old_id);
        }
    }
    table.retain(|old_id, _| !ambiguous.contains(old_id));
    table
}
