//! Frame domain model: named rectangular grouping on board projects.

use crate::model::deserialize_id;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque frame identifier. Notes and frames do not share an id space.
pub type FrameId = String;

/// Named grouping container positioned by its top-left corner.
///
/// A frame's identity is independent of its member notes; membership lives on
/// `Note::group_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Frame {
    #[serde(default, deserialize_with = "deserialize_id")]
    pub id: FrameId,
    #[serde(default)]
    pub title: String,
    pub x: f64,
    pub y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
}

impl Frame {
    /// Creates a frame with a generated id and no explicit size.
    pub fn new(title: impl Into<String>, x: f64, y: f64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            x,
            y,
            width: None,
            height: None,
        }
    }

    pub fn translate(&mut self, dx: f64, dy: f64) {
        self.x += dx;
        self.y += dy;
    }
}
