//! Duplicate detection for imported notes and frames.
//!
//! # Invariants
//! - Text must match exactly; a different text is never a duplicate.
//! - Only declared, already-decoded fields are compared; image bytes never are.
//! - All note variants participate identically.

use crate::model::frame::Frame;
use crate::model::note::{Note, Placement};
use crate::model::project::ProjectType;
use serde::{Deserialize, Serialize};

/// Map tolerance in degrees on both axes (about 11 m at the equator).
pub const MAP_TOLERANCE_DEGREES: f64 = 0.0001;
/// Board tolerance in pixels on both axes.
pub const BOARD_TOLERANCE_PX: f64 = 10.0;

/// Which binary payloads an incoming duplicate carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadClass {
    Image,
    Sketch,
    Both,
    None,
}

impl PayloadClass {
    pub fn of(note: &Note) -> Self {
        match (note.has_images(), note.has_sketch()) {
            (true, true) => Self::Both,
            (true, false) => Self::Image,
            (false, true) => Self::Sketch,
            (false, false) => Self::None,
        }
    }

    pub fn includes_images(self) -> bool {
        matches!(self, Self::Image | Self::Both)
    }

    pub fn includes_sketch(self) -> bool {
        matches!(self, Self::Sketch | Self::Both)
    }
}

/// Decides whether `candidate` duplicates `existing` inside a `project_type` project.
pub fn is_duplicate(candidate: &Note, existing: &Note, project_type: ProjectType) -> bool {
    if candidate.text != existing.text {
        return false;
    }

    match (project_type, candidate.placement, existing.placement) {
        (
            ProjectType::Map,
            Placement::Map { lat, lng },
            Placement::Map {
                lat: existing_lat,
                lng: existing_lng,
            },
        ) => {
            (lat - existing_lat).abs() < MAP_TOLERANCE_DEGREES
                && (lng - existing_lng).abs() < MAP_TOLERANCE_DEGREES
        }
        (
            ProjectType::Image,
            Placement::Board { x, y },
            Placement::Board {
                x: existing_x,
                y: existing_y,
            },
        ) => {
            (x - existing_x).abs() < BOARD_TOLERANCE_PX
                && (y - existing_y).abs() < BOARD_TOLERANCE_PX
        }
        _ => false,
    }
}

/// Frames duplicate when titles match and positions are within board tolerance.
pub fn is_duplicate_frame(candidate: &Frame, existing: &Frame) -> bool {
    candidate.title == existing.title
        && (candidate.x - existing.x).abs() < BOARD_TOLERANCE_PX
        && (candidate.y - existing.y).abs() < BOARD_TOLERANCE_PX
}

/// First existing note duplicated by `candidate`, if any.
pub fn find_duplicate<'a>(
    candidate: &Note,
    existing: &'a [Note],
    project_type: ProjectType,
) -> Option<&'a Note> {
    existing
        .iter()
        .find(|note| is_duplicate(candidate, note, project_type))
}

/// First existing frame duplicated by `candidate`, if any.
pub fn find_duplicate_frame<'a>(candidate: &Frame, existing: &'a [Frame]) -> Option<&'a Frame> {
    existing
        .iter()
        .find(|frame| is_duplicate_frame(candidate, frame))
}
