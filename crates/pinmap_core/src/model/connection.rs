//! Connection domain model: directed link between two notes.

use crate::model::deserialize_id;
use crate::model::note::NoteId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque connection identifier.
pub type ConnectionId = String;

/// Directed link `from_note_id -> to_note_id`.
///
/// Both endpoints are strong references; a connection whose endpoint cannot be
/// resolved is dropped, never kept dangling.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    #[serde(default, deserialize_with = "deserialize_id")]
    pub id: ConnectionId,
    #[serde(deserialize_with = "deserialize_id")]
    pub from_note_id: NoteId,
    #[serde(deserialize_with = "deserialize_id")]
    pub to_note_id: NoteId,
}

impl Connection {
    pub fn new(from_note_id: impl Into<NoteId>, to_note_id: impl Into<NoteId>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            from_note_id: from_note_id.into(),
            to_note_id: to_note_id.into(),
        }
    }

    /// Whether both endpoints name the same note.
    pub fn is_self_link(&self) -> bool {
        self.from_note_id == self.to_note_id
    }
}
