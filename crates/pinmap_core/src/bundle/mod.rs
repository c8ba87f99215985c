//! Project file format: parsing import bundles and rendering full exports.
//!
//! # Responsibility
//! - Turn raw file bytes into a transient `ImportBundle`.
//! - Render a self-contained `{version, project}` export document.
//!
//! # Invariants
//! - A bundle without `project` or `project.name` is rejected outright.
//! - Individually malformed notes/frames/connections are dropped and counted,
//!   never silently coerced.
//! - Parsing never touches persisted state.

use crate::model::connection::Connection;
use crate::model::frame::Frame;
use crate::model::image::ImageSource;
use crate::model::note::{Note, NoteWire};
use crate::model::project::{Project, ProjectType};
use log::{debug, warn};
use serde::Serialize;
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Format version written by exports and assumed for unversioned files.
pub const BUNDLE_VERSION: &str = "1.0";

/// Why a file could not be read as a project bundle.
#[derive(Debug)]
pub enum BundleError {
    NotUtf8(std::str::Utf8Error),
    Json(serde_json::Error),
    MissingProject,
    MissingProjectName,
    InvalidField { field: &'static str, message: String },
}

impl Display for BundleError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotUtf8(err) => write!(f, "file is not valid UTF-8 text: {err}"),
            Self::Json(err) => write!(f, "file is not valid JSON: {err}"),
            Self::MissingProject => write!(f, "file has no `project` object"),
            Self::MissingProjectName => write!(f, "file has no `project.name`"),
            Self::InvalidField { field, message } => {
                write!(f, "invalid `{field}` in file: {message}")
            }
        }
    }
}

impl Error for BundleError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::NotUtf8(err) => Some(err),
            Self::Json(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::str::Utf8Error> for BundleError {
    fn from(value: std::str::Utf8Error) -> Self {
        Self::NotUtf8(value)
    }
}

impl From<serde_json::Error> for BundleError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

/// Project payload of an import file, before any identity remap.
#[derive(Debug, Clone, PartialEq)]
pub struct BundleProject {
    /// Id the project had on the exporting device, informational only.
    pub source_id: Option<String>,
    pub name: String,
    pub kind: ProjectType,
    pub background_image: Option<ImageSource>,
    pub created_at: Option<i64>,
    pub notes: Vec<Note>,
    pub frames: Vec<Frame>,
    pub connections: Vec<Connection>,
}

/// Transient parse result of one external file.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportBundle {
    pub version: String,
    pub project: BundleProject,
    /// Notes dropped because their shape or placement was unusable.
    pub invalid_notes: usize,
    /// Frames or connections dropped because their shape was unusable.
    pub invalid_links: usize,
}

/// Parses raw file bytes into an import bundle.
///
/// # Errors
/// - `NotUtf8` / `Json` when the bytes are not a JSON document.
/// - `MissingProject` / `MissingProjectName` for structurally incomplete files.
/// - `InvalidField` for an unknown project `type`.
pub fn parse_bundle(bytes: &[u8]) -> Result<ImportBundle, BundleError> {
    let text = std::str::from_utf8(bytes)?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let root: Value = serde_json::from_str(text)?;

    let project = root
        .get("project")
        .filter(|value| value.is_object())
        .ok_or(BundleError::MissingProject)?;
    let name = project
        .get("name")
        .and_then(Value::as_str)
        .ok_or(BundleError::MissingProjectName)?
        .to_string();

    let version = match root.get("version") {
        Some(Value::String(value)) => value.clone(),
        Some(Value::Number(value)) => value.to_string(),
        _ => BUNDLE_VERSION.to_string(),
    };

    let kind = match project.get("type") {
        None | Some(Value::Null) => ProjectType::Map,
        Some(Value::String(value)) => {
            ProjectType::parse(value).ok_or_else(|| BundleError::InvalidField {
                field: "project.type",
                message: format!("unknown project type `{value}`"),
            })?
        }
        Some(other) => {
            return Err(BundleError::InvalidField {
                field: "project.type",
                message: format!("expected a string, got {other}"),
            })
        }
    };

    let background_image = project
        .get("backgroundImage")
        .and_then(Value::as_str)
        .filter(|value| !value.trim().is_empty())
        .map(ImageSource::from);
    let source_id = match project.get("id") {
        Some(Value::String(value)) => Some(value.clone()),
        Some(Value::Number(value)) => Some(value.to_string()),
        _ => None,
    };
    let created_at = project
        .get("createdAt")
        .and_then(Value::as_f64)
        .filter(|value| value.is_finite())
        .map(|value| value.round() as i64);

    let mut invalid_notes = 0;
    let mut notes = Vec::new();
    for value in array_field(project, "notes") {
        match serde_json::from_value::<NoteWire>(value.clone())
            .map_err(|err| err.to_string())
            .and_then(|wire| wire.into_note_for(kind).map_err(|err| err.to_string()))
        {
            Ok(note) => notes.push(note),
            Err(reason) => {
                invalid_notes += 1;
                debug!("event=bundle_note_dropped module=bundle status=warn reason={reason}");
            }
        }
    }

    let mut invalid_links = 0;
    let frames = parse_each::<Frame>(array_field(project, "frames"), &mut invalid_links);
    let connections =
        parse_each::<Connection>(array_field(project, "connections"), &mut invalid_links);

    if invalid_notes > 0 || invalid_links > 0 {
        warn!(
            "event=bundle_parse module=bundle status=warn invalid_notes={} invalid_links={}",
            invalid_notes, invalid_links
        );
    }

    Ok(ImportBundle {
        version,
        project: BundleProject {
            source_id,
            name,
            kind,
            background_image,
            created_at,
            notes,
            frames,
            connections,
        },
        invalid_notes,
        invalid_links,
    })
}

fn array_field<'a>(object: &'a Value, field: &str) -> &'a [Value] {
    object
        .get(field)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn parse_each<T: serde::de::DeserializeOwned>(values: &[Value], invalid: &mut usize) -> Vec<T> {
    let mut parsed = Vec::with_capacity(values.len());
    for value in values {
        match serde_json::from_value::<T>(value.clone()) {
            Ok(item) => parsed.push(item),
            Err(_) => *invalid += 1,
        }
    }
    parsed
}

/// Full-project export document.
#[derive(Debug, Serialize)]
pub struct ExportBundle<'a> {
    pub version: &'static str,
    pub project: &'a Project,
}

impl<'a> ExportBundle<'a> {
    pub fn new(project: &'a Project) -> Self {
        Self {
            version: BUNDLE_VERSION,
            project,
        }
    }

    /// Renders pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
