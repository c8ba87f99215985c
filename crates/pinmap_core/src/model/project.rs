//! Project aggregate root.
//!
//! # Responsibility
//! - Own notes, frames and connections of one annotated map or image.
//! - Provide reference-integrity checks and pruning.
//!
//! # Invariants
//! - `kind` is fixed at creation and never changes.
//! - Every set `note.group_id` names a frame of this project, or is stale.
//! - Every connection endpoint names a note of this project.

use crate::model::connection::Connection;
use crate::model::frame::{Frame, FrameId};
use crate::model::image::ImageSource;
use crate::model::note::{Note, NoteId};
use crate::model::{deserialize_epoch_ms_or_now, deserialize_id, now_epoch_ms};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Opaque project identifier.
pub type ProjectId = String;

/// Surface a project annotates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectType {
    /// Geographic map; notes carry `lat/lng`.
    #[default]
    Map,
    /// Arbitrary image or free-form board; notes carry `boardX/boardY`.
    Image,
}

impl ProjectType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Map => "map",
            Self::Image => "image",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "map" => Some(Self::Map),
            "image" | "board" => Some(Self::Image),
            _ => None,
        }
    }

    /// Whether notes live on the unbounded pixel plane.
    pub fn is_board(self) -> bool {
        matches!(self, Self::Image)
    }
}

/// Aggregate root persisted as one unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: ProjectId,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ProjectType,
    #[serde(default)]
    pub background_image: Option<ImageSource>,
    #[serde(default = "now_epoch_ms", deserialize_with = "deserialize_epoch_ms_or_now")]
    pub created_at: i64,
    #[serde(default)]
    pub notes: Vec<Note>,
    #[serde(default)]
    pub frames: Vec<Frame>,
    #[serde(default)]
    pub connections: Vec<Connection>,
}

/// Counts produced by [`Project::prune_dangling_references`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PruneReport {
    pub cleared_group_ids: usize,
    pub dropped_connections: usize,
}

impl PruneReport {
    pub fn is_empty(&self) -> bool {
        self.cleared_group_ids == 0 && self.dropped_connections == 0
    }
}

/// One reference-integrity violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntegrityViolation {
    StaleGroup { note_id: NoteId, group_id: FrameId },
    DanglingConnection { connection_id: String, missing_note_id: NoteId },
    PlacementMismatch { note_id: NoteId },
    DuplicateNoteId(NoteId),
}

impl Display for IntegrityViolation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StaleGroup { note_id, group_id } => {
                write!(f, "note {note_id} references missing frame {group_id}")
            }
            Self::DanglingConnection {
                connection_id,
                missing_note_id,
            } => write!(
                f,
                "connection {connection_id} references missing note {missing_note_id}"
            ),
            Self::PlacementMismatch { note_id } => {
                write!(f, "note {note_id} placement does not match project type")
            }
            Self::DuplicateNoteId(note_id) => write!(f, "note id {note_id} is not unique"),
        }
    }
}

impl Error for IntegrityViolation {}

impl Project {
    /// Creates an empty project with a generated id.
    pub fn new(name: impl Into<String>, kind: ProjectType) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), name, kind)
    }

    /// Creates an empty project with a caller-provided id.
    pub fn with_id(id: impl Into<ProjectId>, name: impl Into<String>, kind: ProjectType) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            background_image: None,
            created_at: now_epoch_ms(),
            notes: Vec::new(),
            frames: Vec::new(),
            connections: Vec::new(),
        }
    }

    pub fn note(&self, note_id: &str) -> Option<&Note> {
        self.notes.iter().find(|note| note.id == note_id)
    }

    pub fn note_mut(&mut self, note_id: &str) -> Option<&mut Note> {
        self.notes.iter_mut().find(|note| note.id == note_id)
    }

    pub fn frame(&self, frame_id: &str) -> Option<&Frame> {
        self.frames.iter().find(|frame| frame.id == frame_id)
    }

    /// Notes in display order (`created_at`, then id).
    pub fn notes_in_display_order(&self) -> Vec<&Note> {
        let mut notes: Vec<&Note> = self.notes.iter().collect();
        notes.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        notes
    }

    /// Group labels for a note: resolved frame title first, then cached names.
    ///
    /// A stale `group_id` contributes nothing; the cached names still apply.
    pub fn group_labels(&self, note: &Note) -> Vec<String> {
        let mut labels = Vec::new();
        if let Some(frame) = note.group_id.as_deref().and_then(|id| self.frame(id)) {
            if !frame.title.trim().is_empty() {
                labels.push(frame.title.trim().to_string());
            }
        }
        for name in &note.group_names {
            if !labels.iter().any(|label| label == name) {
                labels.push(name.clone());
            }
        }
        labels
    }

    /// Clears stale group ids and drops connections with missing endpoints.
    pub fn prune_dangling_references(&mut self) -> PruneReport {
        let frame_ids: HashSet<&str> = self.frames.iter().map(|frame| frame.id.as_str()).collect();
        let mut report = PruneReport::default();
        for note in &mut self.notes {
            let stale = note
                .group_id
                .as_deref()
                .is_some_and(|group_id| !frame_ids.contains(group_id));
            if stale {
                note.group_id = None;
                report.cleared_group_ids += 1;
            }
        }

        let note_ids: HashSet<&str> = self.notes.iter().map(|note| note.id.as_str()).collect();
        let before = self.connections.len();
        self.connections.retain(|connection| {
            note_ids.contains(connection.from_note_id.as_str())
                && note_ids.contains(connection.to_note_id.as_str())
        });
        report.dropped_connections = before - self.connections.len();
        report
    }

    /// Lists every reference-integrity violation; empty means consistent.
    pub fn integrity_violations(&self) -> Vec<IntegrityViolation> {
        let mut violations = Vec::new();
        let frame_ids: HashSet<&str> = self.frames.iter().map(|frame| frame.id.as_str()).collect();
        let mut note_ids: HashSet<&str> = HashSet::with_capacity(self.notes.len());

        for note in &self.notes {
            if !note_ids.insert(note.id.as_str()) {
                violations.push(IntegrityViolation::DuplicateNoteId(note.id.clone()));
            }
            if note.placement.project_type() != self.kind {
                violations.push(IntegrityViolation::PlacementMismatch {
                    note_id: note.id.clone(),
                });
            }
            if let Some(group_id) = note.group_id.as_deref() {
                if !frame_ids.contains(group_id) {
                    violations.push(IntegrityViolation::StaleGroup {
                        note_id: note.id.clone(),
                        group_id: group_id.to_string(),
                    });
                }
            }
        }

        for connection in &self.connections {
            for endpoint in [&connection.from_note_id, &connection.to_note_id] {
                if !note_ids.contains(endpoint.as_str()) {
                    violations.push(IntegrityViolation::DanglingConnection {
                        connection_id: connection.id.clone(),
                        missing_note_id: endpoint.clone(),
                    });
                }
            }
        }

        violations
    }

    /// Every image field of the project, background included.
    pub fn image_fields_mut(&mut self) -> impl Iterator<Item = &mut ImageSource> {
        self.background_image.iter_mut().chain(
            self.notes
                .iter_mut()
                .flat_map(|note| note.images.iter_mut().chain(note.sketch.iter_mut())),
        )
    }
}
