//! Note domain model.
//!
//! # Responsibility
//! - Define the pinned annotation record and its placement.
//! - Translate between the external JSON shape and the canonical record.
//!
//! # Invariants
//! - `placement` is exactly one of map coordinates or board offsets.
//! - `group_names` is trimmed, non-empty and free of repeats.
//! - Rendered width is derived from `variant` and never stored.

use crate::model::image::ImageSource;
use crate::model::project::ProjectType;
use crate::model::{deserialize_epoch_ms, deserialize_id, deserialize_optional_id, now_epoch_ms};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Opaque note identifier.
pub type NoteId = String;

/// Rendered width of compact notes in board pixels.
pub const COMPACT_NOTE_WIDTH: f64 = 180.0;
/// Rendered width of standard and text notes in board pixels.
pub const STANDARD_NOTE_WIDTH: f64 = 256.0;

/// Visual variant of a note.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteVariant {
    #[default]
    Standard,
    Compact,
    Text,
}

impl NoteVariant {
    /// Width used for spatial reasoning on boards.
    pub fn rendered_width(self) -> f64 {
        match self {
            Self::Compact => COMPACT_NOTE_WIDTH,
            Self::Standard | Self::Text => STANDARD_NOTE_WIDTH,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Compact => "compact",
            Self::Text => "text",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "standard" => Some(Self::Standard),
            "compact" => Some(Self::Compact),
            "text" => Some(Self::Text),
            _ => None,
        }
    }
}

/// Colored label attached to a note. Labels need not be unique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteTag {
    #[serde(default, deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub color: String,
}

/// Geographic coordinate pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

/// Where a note sits: on a map or on an unbounded board plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Placement {
    Map { lat: f64, lng: f64 },
    Board { x: f64, y: f64 },
}

impl Placement {
    /// Project type this placement belongs to.
    pub fn project_type(&self) -> ProjectType {
        match self {
            Self::Map { .. } => ProjectType::Map,
            Self::Board { .. } => ProjectType::Image,
        }
    }
}

/// Pinned annotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "NoteWire", into = "NoteWire")]
pub struct Note {
    pub id: NoteId,
    pub text: String,
    pub variant: NoteVariant,
    pub tags: Vec<NoteTag>,
    /// Weak reference to a frame in the same project.
    pub group_id: Option<String>,
    /// Denormalized group display titles, canonical ordered form.
    pub group_names: Vec<String>,
    /// Epoch milliseconds; also the manual ordering key within a group.
    pub created_at: i64,
    pub placement: Placement,
    pub images: Vec<ImageSource>,
    pub sketch: Option<ImageSource>,
}

impl Note {
    /// Creates a note with a generated id and the current timestamp.
    pub fn new(text: impl Into<String>, placement: Placement) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            text: text.into(),
            variant: NoteVariant::Standard,
            tags: Vec::new(),
            group_id: None,
            group_names: Vec::new(),
            created_at: now_epoch_ms(),
            placement,
            images: Vec::new(),
            sketch: None,
        }
    }

    pub fn map(text: impl Into<String>, lat: f64, lng: f64) -> Self {
        Self::new(text, Placement::Map { lat, lng })
    }

    pub fn board(text: impl Into<String>, x: f64, y: f64) -> Self {
        Self::new(text, Placement::Board { x, y })
    }

    pub fn rendered_width(&self) -> f64 {
        self.variant.rendered_width()
    }

    /// Board offsets, `None` for map notes.
    pub fn board_position(&self) -> Option<(f64, f64)> {
        match self.placement {
            Placement::Board { x, y } => Some((x, y)),
            Placement::Map { .. } => None,
        }
    }

    /// Map coordinates, `None` for board notes.
    pub fn coords(&self) -> Option<LatLng> {
        match self.placement {
            Placement::Map { lat, lng } => Some(LatLng { lat, lng }),
            Placement::Board { .. } => None,
        }
    }

    /// Moves a board note by the given delta. Map notes are left unchanged.
    pub fn translate(&mut self, dx: f64, dy: f64) {
        if let Placement::Board { x, y } = self.placement {
            self.placement = Placement::Board {
                x: x + dx,
                y: y + dy,
            };
        }
    }

    pub fn has_images(&self) -> bool {
        !self.images.is_empty()
    }

    pub fn has_sketch(&self) -> bool {
        self.sketch.is_some()
    }

    /// Iterates every image-bearing field of this note.
    pub fn image_fields_mut(&mut self) -> impl Iterator<Item = &mut ImageSource> {
        self.images.iter_mut().chain(self.sketch.iter_mut())
    }
}

/// Shape errors raised when a wire note cannot become a canonical note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoteShapeError {
    /// Neither `coords` nor `boardX/boardY` present.
    MissingPlacement,
    /// Both coordinate systems populated and no project type to disambiguate.
    AmbiguousPlacement,
    /// Placement kind does not match the owning project.
    PlacementMismatch { expected: ProjectType },
    /// A coordinate is NaN or infinite.
    NonFiniteCoordinate,
}

impl Display for NoteShapeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingPlacement => write!(f, "note has neither coords nor boardX/boardY"),
            Self::AmbiguousPlacement => {
                write!(f, "note has both coords and boardX/boardY")
            }
            Self::PlacementMismatch { expected } => {
                write!(f, "note placement does not match `{}` project", expected.as_str())
            }
            Self::NonFiniteCoordinate => write!(f, "note coordinate is not a finite number"),
        }
    }
}

impl Error for NoteShapeError {}

/// External JSON shape of a note, including legacy fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteWire {
    #[serde(default, deserialize_with = "deserialize_id")]
    id: String,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    variant: Option<NoteVariant>,
    #[serde(default)]
    tags: Option<Vec<NoteTag>>,
    #[serde(
        default,
        deserialize_with = "deserialize_optional_id",
        skip_serializing_if = "Option::is_none"
    )]
    group_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    group_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    group_names: Option<Vec<String>>,
    #[serde(default, deserialize_with = "deserialize_epoch_ms")]
    created_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    coords: Option<LatLng>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    board_x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    board_y: Option<f64>,
    #[serde(default)]
    images: Option<Vec<ImageSource>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sketch: Option<ImageSource>,
}

impl NoteWire {
    /// Converts into a canonical note owned by a project of `project_type`.
    ///
    /// The placement matching `project_type` wins when both are present.
    pub(crate) fn into_note_for(self, project_type: ProjectType) -> Result<Note, NoteShapeError> {
        let map = self.map_placement();
        let board = self.board_placement();
        let placement = match (project_type, map, board) {
            (ProjectType::Map, Some(placement), _) => placement,
            (ProjectType::Image, _, Some(placement)) => placement,
            (_, None, None) => return Err(NoteShapeError::MissingPlacement),
            (expected, _, _) => return Err(NoteShapeError::PlacementMismatch { expected }),
        };
        self.finish(placement)
    }

    fn into_note(self) -> Result<Note, NoteShapeError> {
        let placement = match (self.map_placement(), self.board_placement()) {
            (Some(placement), None) | (None, Some(placement)) => placement,
            (None, None) => return Err(NoteShapeError::MissingPlacement),
            (Some(_), Some(_)) => return Err(NoteShapeError::AmbiguousPlacement),
        };
        self.finish(placement)
    }

    fn map_placement(&self) -> Option<Placement> {
        self.coords.map(|coords| Placement::Map {
            lat: coords.lat,
            lng: coords.lng,
        })
    }

    fn board_placement(&self) -> Option<Placement> {
        match (self.board_x, self.board_y) {
            (Some(x), Some(y)) => Some(Placement::Board { x, y }),
            _ => None,
        }
    }

    fn finish(self, placement: Placement) -> Result<Note, NoteShapeError> {
        let finite = match placement {
            Placement::Map { lat, lng } => lat.is_finite() && lng.is_finite(),
            Placement::Board { x, y } => x.is_finite() && y.is_finite(),
        };
        if !finite {
            return Err(NoteShapeError::NonFiniteCoordinate);
        }

        Ok(Note {
            id: self.id,
            text: self.text.unwrap_or_default(),
            variant: self.variant.unwrap_or_default(),
            tags: self.tags.unwrap_or_default(),
            group_id: self.group_id,
            group_names: normalize_group_names(self.group_names, self.group_name),
            created_at: self.created_at.unwrap_or_else(now_epoch_ms),
            placement,
            images: self.images.unwrap_or_default(),
            sketch: self.sketch,
        })
    }
}

impl TryFrom<NoteWire> for Note {
    type Error = NoteShapeError;

    fn try_from(value: NoteWire) -> Result<Self, Self::Error> {
        value.into_note()
    }
}

impl From<Note> for NoteWire {
    fn from(note: Note) -> Self {
        let (coords, board_x, board_y) = match note.placement {
            Placement::Map { lat, lng } => (Some(LatLng { lat, lng }), None, None),
            Placement::Board { x, y } => (None, Some(x), Some(y)),
        };
        Self {
            id: note.id,
            text: Some(note.text),
            variant: Some(note.variant),
            tags: Some(note.tags),
            group_id: note.group_id,
            // Legacy single-group readers still look at `groupName`.
            group_name: note.group_names.first().cloned(),
            group_names: if note.group_names.is_empty() {
                None
            } else {
                Some(note.group_names)
            },
            created_at: Some(note.created_at),
            coords,
            board_x,
            board_y,
            images: Some(note.images),
            sketch: note.sketch,
        }
    }
}

/// Folds the legacy single `groupName` field into the ordered group list.
///
/// `groupNames` wins when present and non-empty; otherwise the legacy value is
/// used. Entries are trimmed, blanks dropped and repeats removed keeping the
/// first occurrence.
pub fn normalize_group_names(
    group_names: Option<Vec<String>>,
    legacy_group_name: Option<String>,
) -> Vec<String> {
    let source = match group_names {
        Some(names) if names.iter().any(|name| !name.trim().is_empty()) => names,
        _ => legacy_group_name.into_iter().collect(),
    };

    let mut normalized: Vec<String> = Vec::with_capacity(source.len());
    for name in source {
        let trimmed = name.trim();
        if trimmed.is_empty() || normalized.iter().any(|seen| seen == trimmed) {
            continue;
        }
        normalized.push(trimmed.to_string());
    }
    normalized
}
